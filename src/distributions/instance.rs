//! Concrete, parameterised distribution instances.

use super::types::{Distribution, Params};
use crate::error::{Error, Result};
use crate::random::Stream;
use crate::table::{Column, DType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One column's generating distribution: a subtype of a family together
/// with parameters drawn from that subtype's limits.
///
/// Instances are immutable once created. Equality compares the family key,
/// subtype id and parameters, not the capability handle.
#[derive(Clone)]
pub struct Instance {
    distribution: Arc<dyn Distribution>,
    subtype_id: usize,
    params: Params,
}

impl Instance {
    pub(crate) fn new(distribution: Arc<dyn Distribution>, subtype_id: usize, params: Params) -> Self {
        Self {
            distribution,
            subtype_id,
            params,
        }
    }

    /// Name of the owning family's distribution.
    pub fn family(&self) -> &str {
        self.distribution.name()
    }

    pub fn subtype_id(&self) -> usize {
        self.subtype_id
    }

    pub fn dtype(&self) -> DType {
        self.distribution.dtype()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn distribution(&self) -> &Arc<dyn Distribution> {
        &self.distribution
    }

    /// Whether this instance was made by subtype `subtype_id` of `family`.
    pub fn is_subtype(&self, family: &str, subtype_id: usize) -> bool {
        self.family() == family && self.subtype_id == subtype_id
    }

    /// Samples `nrows` values.
    ///
    /// Fails if the distribution returns the wrong number or type of values.
    pub fn sample(&self, nrows: usize, rng: &mut Stream) -> Result<Column> {
        let column = self.distribution.sample(&self.params, nrows, rng)?;
        if column.dtype() != self.dtype() || column.len() != nrows {
            return Err(Error::Distribution {
                name: self.family().to_string(),
                reason: format!(
                    "expected {nrows} {} values, got {} {} values",
                    self.dtype(),
                    column.len(),
                    column.dtype()
                ),
            });
        }
        Ok(column)
    }

    pub fn to_record(&self) -> InstanceRecord {
        InstanceRecord {
            family: self.family().to_string(),
            subtype_id: self.subtype_id,
            params: self.params.clone(),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.family() == other.family()
            && self.subtype_id == other.subtype_id
            && self.params == other.params
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("family", &self.family())
            .field("subtype_id", &self.subtype_id)
            .field("params", &self.params)
            .finish()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        write!(
            f,
            "{}#{}({})",
            self.family(),
            self.subtype_id,
            params.join(", ")
        )
    }
}

/// Serialisable description of an [`Instance`], as stored in `main.meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub family: String,
    pub subtype_id: usize,
    pub params: Params,
}
