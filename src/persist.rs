//! Versioned binary blobs.
//!
//! Stream states and subtype records are written as a bincode-encoded
//! format version followed by the bincode-encoded body.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

pub(crate) fn write_blob<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &FORMAT_VERSION)?;
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

pub(crate) fn read_blob<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut reader = BufReader::new(File::open(path)?);
    let version: u32 = bincode::deserialize_from(&mut reader)?;
    if version != FORMAT_VERSION {
        return Err(Error::FormatVersion {
            path: path.to_path_buf(),
            found: version,
            expected: FORMAT_VERSION,
        });
    }
    Ok(bincode::deserialize_from(&mut reader)?)
}
