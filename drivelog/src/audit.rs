//! Outlier audit log.
//!
//! Every point the outlier filter removes is appended to a CSV file so the
//! removal can be reviewed later. The header is written once, when the file
//! is new or empty.

use std::fs::OpenOptions;
use std::path::Path;

use serde::Serialize;
use tracknorm::OutlierRecord;

use crate::error::{PathContext, Result};
use crate::store::encode_time;

#[derive(Debug, Serialize)]
struct AuditRow<'a> {
    file: &'a str,
    time: String,
    latitude: f64,
    longitude: f64,
    reason: &'static str,
}

/// Append records to the audit file. Returns the number written.
pub fn append_outliers(path: &Path, records: &[OutlierRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let has_header = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_path(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!has_header)
        .from_writer(file);

    for record in records {
        writer
            .serialize(AuditRow {
                file: &record.file_name,
                time: encode_time(record.time),
                latitude: record.latitude,
                longitude: record.longitude,
                reason: record.kind.reason(),
            })
            .with_path(path)?;
    }
    writer.flush().with_path(path)?;

    log::info!(
        "[Outliers] Logged {} removed points to {}",
        records.len(),
        path.display()
    );
    Ok(records.len())
}
