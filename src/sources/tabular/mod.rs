
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::database::RawRecord;
use crate::{AgentError, Result};

/// Read chat rows from a headered CSV file
///
/// Expected columns: `ID, SenderName, Content, Timestamp` plus optional
/// `Sender, Duration, Offset`. Values are validated later, at import time.
#[inline]
pub fn read_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let file = std::fs::File::open(path)?;
    let rows = read_csv_from(file).map_err(|e| match e {
        AgentError::Source(message) => {
            AgentError::Source(format!("{}: {}", path.display(), message))
        }
        other => other,
    })?;

    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Read chat rows from any CSV reader
#[inline]
pub fn read_csv_from<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    csv_reader
        .deserialize::<RawRecord>()
        .enumerate()
        .map(|(row, result)| {
            result.map_err(|e| AgentError::Source(format!("CSV row {}: {}", row, e)))
        })
        .collect()
}
