//! Reading and writing individuals.
//!
//! An individual occupies one directory:
//!
//! ```text
//! main.csv    table, header row of column indices
//! main.meta   JSON list of {family, subtype_id, params}
//! main.state  row count and stream state (versioned binary)
//! ```
//!
//! The row count is stored with the stream, so a table with no columns
//! keeps its rows.

use super::Individual;
use crate::distributions::{Instance, InstanceRecord};
use crate::error::{Error, Result};
use crate::family::{family_index, Family};
use crate::persist::{read_blob, write_blob};
use crate::random::Stream;
use crate::table::{DType, Table};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

const TABLE_FILE: &str = "main.csv";
const META_FILE: &str = "main.meta";
const STATE_FILE: &str = "main.state";

#[derive(Serialize, Deserialize)]
struct IndividualState {
    nrows: usize,
    stream: Stream,
}

impl Individual {
    /// Writes this individual to `dir`, creating it if needed.
    pub fn to_file(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        self.table.write_csv(&dir.join(TABLE_FILE))?;

        let records: Vec<InstanceRecord> = self.metadata.iter().map(Instance::to_record).collect();
        let mut writer = BufWriter::new(File::create(dir.join(META_FILE))?);
        serde_json::to_writer_pretty(&mut writer, &records)?;
        writer.flush()?;

        let state = IndividualState {
            nrows: self.table.nrows(),
            stream: self.stream.clone(),
        };
        write_blob(&dir.join(STATE_FILE), &state)
    }

    /// Reads an individual from `dir`.
    ///
    /// Each metadata record is bound to the family in `families` with the
    /// same key.
    ///
    /// # Errors
    /// [`Error::UnknownFamily`](crate::Error::UnknownFamily) if a record names
    /// a family that is not supplied; [`Error::Corrupt`] if the CSV row
    /// count disagrees with the stored one; any I/O or format error.
    pub fn from_file(dir: &Path, families: &[Family]) -> Result<Self> {
        let reader = BufReader::new(File::open(dir.join(META_FILE))?);
        let records: Vec<InstanceRecord> = serde_json::from_reader(reader)?;

        let mut metadata = Vec::with_capacity(records.len());
        for record in records {
            let family = &families[family_index(families, &record.family)?];
            metadata.push(Instance::new(
                Arc::clone(family.distribution()),
                record.subtype_id,
                record.params,
            ));
        }

        let state: IndividualState = read_blob(&dir.join(STATE_FILE))?;
        let table = if metadata.is_empty() {
            Table::new(state.nrows)
        } else {
            let dtypes: Vec<DType> = metadata.iter().map(Instance::dtype).collect();
            let path = dir.join(TABLE_FILE);
            let table = Table::read_csv(&path, &dtypes)?;
            if table.nrows() != state.nrows {
                return Err(Error::Corrupt {
                    path,
                    reason: format!("{} rows stored, {} expected", table.nrows(), state.nrows),
                });
            }
            table
        };

        Individual::new(table, metadata, state.stream)
    }
}
