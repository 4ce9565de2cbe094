//! Binary artifact persistence (bincode)

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Serialize `value` to `path`, replacing any existing file
pub fn save<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Deserialize a value previously written with [`save`]
pub fn load<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> anyhow::Result<T> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(bincode::deserialize_from(reader)?)
}

/// Deserialize from an in-memory buffer
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
