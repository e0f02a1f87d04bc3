//! Distribution families and their subtypes.
//!
//! A [`Family`] wraps one [`Distribution`] and hands out
//! [`Instance`]s of independently parameterised copies of it, called
//! subtypes. Subtypes are created lazily, live in a per-family arena keyed by
//! id and can be pruned from the active set without being forgotten. Their
//! parameter limits are what [`shrink`](crate::operators::shrink) narrows.
//!
//! # On-disk layout
//!
//! ```text
//! <root>/subtypes/<distribution>/state.bin   family stream
//! <root>/subtypes/<distribution>/<id>.bin    one record per subtype
//! ```

mod picker;

pub(crate) use picker::FamilyPicker;

use crate::distributions::{Distribution, Instance, ParamLimits, ParamRange};
use crate::error::{Error, Result};
use crate::persist::{read_blob, write_blob};
use crate::random::{entropy_stream, Stream};
use crate::table::DType;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One independently parameterised copy of a family's distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtype {
    /// Name of the owning family's distribution.
    pub family: String,
    pub subtype_id: usize,
    /// Current limits parameters are drawn from.
    pub param_limits: ParamLimits,
}

/// Persisted form of a subtype.
#[derive(Debug, Serialize, Deserialize)]
struct SubtypeBlob {
    name: String,
    dtype: DType,
    hard_limits: ParamLimits,
    param_limits: ParamLimits,
}

/// The set of all subtypes of one distribution.
#[derive(Debug, Clone)]
pub struct Family {
    distribution: Arc<dyn Distribution>,
    param_limits: ParamLimits,
    max_subtypes: Option<usize>,
    subtype_id: usize,
    subtypes: BTreeSet<usize>,
    all_subtypes: BTreeMap<usize, Subtype>,
    stream: Stream,
}

impl Family {
    /// Creates an empty family with no limit on active subtypes.
    ///
    /// New subtypes start from the distribution's hard limits.
    pub fn new(distribution: Arc<dyn Distribution>) -> Self {
        let param_limits = distribution.hard_limits();
        Self {
            distribution,
            param_limits,
            max_subtypes: None,
            subtype_id: 0,
            subtypes: BTreeSet::new(),
            all_subtypes: BTreeMap::new(),
            stream: entropy_stream(),
        }
    }

    /// Caps the number of simultaneously active subtypes.
    pub fn with_max_subtypes(mut self, max: usize) -> Self {
        self.max_subtypes = Some(max);
        self
    }

    /// Overrides the limits new subtypes start from.
    ///
    /// Each range is clipped to the distribution's hard limits; parameters
    /// not named in `limits` keep their current range.
    pub fn with_param_limits(mut self, limits: ParamLimits) -> Self {
        let hard = self.distribution.hard_limits();
        for (name, range) in limits {
            let clipped = match hard.get(&name) {
                Some(h) => ParamRange::new(
                    range.lower.max(h.lower),
                    range.upper.min(h.upper),
                ),
                None => continue,
            };
            self.param_limits.insert(name, clipped);
        }
        self
    }

    /// Replaces the family's stream.
    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.stream = stream;
        self
    }

    /// Distribution name followed by `Family`, e.g. `NormalFamily`.
    pub fn name(&self) -> String {
        format!("{}Family", self.distribution.name())
    }

    /// Name of the wrapped distribution. Instances and metadata refer to the
    /// family by this key.
    pub fn key(&self) -> &str {
        self.distribution.name()
    }

    pub fn distribution(&self) -> &Arc<dyn Distribution> {
        &self.distribution
    }

    pub fn dtype(&self) -> DType {
        self.distribution.dtype()
    }

    pub fn max_subtypes(&self) -> Option<usize> {
        self.max_subtypes
    }

    /// Id the next created subtype will receive.
    pub fn next_subtype_id(&self) -> usize {
        self.subtype_id
    }

    /// Ids of the subtypes currently in use, ascending.
    pub fn active_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.subtypes.iter().copied()
    }

    /// Number of active subtypes.
    pub fn n_active(&self) -> usize {
        self.subtypes.len()
    }

    /// Every subtype created since the last reset, keyed by id.
    pub fn all_subtypes(&self) -> &BTreeMap<usize, Subtype> {
        &self.all_subtypes
    }

    pub fn subtype(&self, subtype_id: usize) -> Option<&Subtype> {
        self.all_subtypes.get(&subtype_id)
    }

    pub(crate) fn subtype_mut(&mut self, subtype_id: usize) -> Option<&mut Subtype> {
        self.all_subtypes.get_mut(&subtype_id)
    }

    pub(crate) fn stream(&self) -> &Stream {
        &self.stream
    }

    pub(crate) fn set_stream(&mut self, stream: Stream) {
        self.stream = stream;
    }

    /// Creates a new active subtype and returns its id.
    ///
    /// The subtype starts from `param_limits` if given, otherwise from the
    /// family's base limits.
    pub fn add_subtype(&mut self, param_limits: Option<ParamLimits>) -> usize {
        let id = self.subtype_id;
        let subtype = Subtype {
            family: self.key().to_string(),
            subtype_id: id,
            param_limits: param_limits.unwrap_or_else(|| self.param_limits.clone()),
        };
        self.all_subtypes.insert(id, subtype);
        self.subtypes.insert(id);
        self.subtype_id += 1;
        log::debug!("{}: created subtype {id}", self.name());
        id
    }

    /// Returns an instance of an active subtype, or of a fresh one if the
    /// family has room.
    ///
    /// The subtype is chosen uniformly with the family's own stream;
    /// parameters are drawn with `rng`.
    ///
    /// # Errors
    /// [`Error::Capacity`] if there are no active subtypes and no room for a
    /// new one.
    pub fn make_instance(&mut self, rng: &mut Stream) -> Result<Instance> {
        let mut choices: Vec<usize> = self.subtypes.iter().copied().collect();
        if self.has_room() {
            choices.push(self.subtype_id);
        }

        let choice = *choices.choose(&mut self.stream).ok_or_else(|| Error::Capacity {
            family: self.name(),
            max: self.max_subtypes.unwrap_or(0),
        })?;
        if choice == self.subtype_id {
            self.add_subtype(None);
        }

        let limits = &self.all_subtypes[&choice].param_limits;
        let params = self.distribution.draw_params(limits, rng);
        Ok(Instance::new(Arc::clone(&self.distribution), choice, params))
    }

    fn has_room(&self) -> bool {
        self.max_subtypes
            .map_or(true, |max| self.subtypes.len() < max)
    }

    /// Restricts the active set to `ids`. Pruned subtypes stay in
    /// [`all_subtypes`](Self::all_subtypes).
    pub fn retain_subtypes(&mut self, ids: &BTreeSet<usize>) {
        let before = self.subtypes.len();
        self.subtypes.retain(|id| ids.contains(id));
        if self.subtypes.len() != before {
            log::debug!(
                "{}: pruned active subtypes {before} -> {}",
                self.name(),
                self.subtypes.len()
            );
        }
    }

    /// Directory this family is cached in under `root`.
    pub fn cache_dir(&self, root: &Path) -> PathBuf {
        subtype_dir(root, self.key())
    }

    /// Writes every subtype and the family stream under `root`.
    ///
    /// Cached subtypes this family does not hold are removed, so a later
    /// [`load`](Self::load) rebuilds exactly this registry.
    pub fn save(&self, root: &Path) -> Result<()> {
        let dir = self.cache_dir(root);
        fs::create_dir_all(&dir)?;
        write_blob(&dir.join("state.bin"), &self.stream)?;

        let hard_limits = self.distribution.hard_limits();
        for (id, subtype) in &self.all_subtypes {
            let blob = SubtypeBlob {
                name: self.key().to_string(),
                dtype: self.dtype(),
                hard_limits: hard_limits.clone(),
                param_limits: subtype.param_limits.clone(),
            };
            write_blob(&dir.join(format!("{id}.bin")), &blob)?;
        }

        for id in cached_ids(&dir)? {
            if !self.all_subtypes.contains_key(&id) {
                fs::remove_file(dir.join(format!("{id}.bin")))?;
                log::debug!("{}: removed stale cached subtype {id}", self.name());
            }
        }
        Ok(())
    }

    /// Snapshot of the registry, active set and stream.
    pub(crate) fn state(&self) -> FamilyState {
        FamilyState {
            key: self.key().to_string(),
            next_id: self.subtype_id,
            subtypes: self
                .all_subtypes
                .iter()
                .map(|(&id, s)| (id, s.param_limits.clone()))
                .collect(),
            active: self.subtypes.iter().copied().collect(),
            stream: self.stream.clone(),
        }
    }

    /// Replaces the registry, active set and stream with `state`.
    pub(crate) fn set_state(&mut self, state: FamilyState) {
        self.all_subtypes = state
            .subtypes
            .into_iter()
            .map(|(id, param_limits)| {
                let subtype = Subtype {
                    family: state.key.clone(),
                    subtype_id: id,
                    param_limits,
                };
                (id, subtype)
            })
            .collect();
        self.subtypes = state.active.into_iter().collect();
        self.subtype_id = state.next_id;
        self.stream = state.stream;
    }

    /// Loads a family for `distribution` from its cache under `root`.
    pub fn load(distribution: Arc<dyn Distribution>, root: &Path) -> Result<Self> {
        let mut family = Self::new(distribution);
        family.restore(root)?;
        Ok(family)
    }

    /// Replaces this family's subtypes and stream with those cached under
    /// `root`, keeping its settings.
    ///
    /// Subtypes keep their saved ids and are all marked active.
    pub fn restore(&mut self, root: &Path) -> Result<()> {
        let dir = self.cache_dir(root);
        let stream: Stream = read_blob(&dir.join("state.bin"))?;

        let ids = cached_ids(&dir)?;

        let mut all_subtypes = BTreeMap::new();
        for id in ids {
            let path = dir.join(format!("{id}.bin"));
            let blob: SubtypeBlob = read_blob(&path)?;
            if blob.name != self.key() || blob.dtype != self.dtype() {
                return Err(Error::Corrupt {
                    path,
                    reason: format!(
                        "subtype of {} ({}) found in cache of {}",
                        blob.name,
                        blob.dtype,
                        self.key()
                    ),
                });
            }
            all_subtypes.insert(
                id,
                Subtype {
                    family: blob.name,
                    subtype_id: id,
                    param_limits: blob.param_limits,
                },
            );
        }

        self.subtype_id = all_subtypes.keys().next_back().map_or(0, |id| id + 1);
        self.subtypes = all_subtypes.keys().copied().collect();
        self.all_subtypes = all_subtypes;
        self.stream = stream;
        Ok(())
    }

    /// Forgets every subtype and reseeds the family stream from entropy.
    ///
    /// If `root` is given, the family's cache directory is deleted as well.
    pub fn reset(&mut self, root: Option<&Path>) -> Result<()> {
        self.subtype_id = 0;
        self.subtypes.clear();
        self.all_subtypes.clear();
        self.stream = entropy_stream();

        if let Some(root) = root {
            match fs::remove_dir_all(self.cache_dir(root)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(subtypes={})", self.name(), self.subtype_id)
    }
}

/// Everything a family mutates during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FamilyState {
    pub(crate) key: String,
    next_id: usize,
    subtypes: Vec<(usize, ParamLimits)>,
    active: Vec<usize>,
    stream: Stream,
}

/// Ids of the `<id>.bin` subtype records in `dir`, ascending.
fn cached_ids(dir: &Path) -> Result<Vec<usize>> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_blob = path.extension().is_some_and(|ext| ext == "bin");
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<usize>().ok());
        if let (true, Some(id)) = (is_blob, id) {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

pub(crate) fn subtype_dir(root: &Path, key: &str) -> PathBuf {
    root.join("subtypes").join(key)
}

/// Position of the family with key `key`.
pub(crate) fn family_index(families: &[Family], key: &str) -> Result<usize> {
    families
        .iter()
        .position(|f| f.key() == key)
        .ok_or_else(|| Error::UnknownFamily(key.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
