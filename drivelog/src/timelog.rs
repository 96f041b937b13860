//! Engine timelog CSV reading.
//!
//! Two columns, `time` and `status`, where status is `+` for engine start
//! and `-` for engine stop. Times are RFC 3339; times without an offset are
//! taken as UTC.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracknorm::{Timelog, TimelogEntry, TimelogStatus};

use crate::error::{DriveLogError, PathContext, Result};
use crate::gpx::parse_time;

#[derive(Debug, Deserialize)]
struct TimelogRow {
    time: String,
    status: String,
}

pub fn load_timelog(path: &Path) -> Result<Timelog> {
    let file = std::fs::File::open(path).with_path(path)?;
    let timelog = read_timelog(file, &path.display().to_string())?;
    log::info!(
        "[Timelog] Loaded {} intervals from {}",
        timelog.intervals().len(),
        path.display()
    );
    Ok(timelog)
}

/// Read a timelog from any CSV source. `name` is used in errors.
pub fn read_timelog<R: Read>(source: R, name: &str) -> Result<Timelog> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut entries = Vec::new();
    for (line, row) in reader.deserialize::<TimelogRow>().enumerate() {
        let row = row.with_path(name)?;
        let parse_error = |message: String| DriveLogError::Parse {
            file: name.to_string(),
            message: format!("row {}: {}", line + 1, message),
        };

        let time = parse_time(&row.time)
            .ok_or_else(|| parse_error(format!("invalid time '{}'", row.time)))?;
        let status = TimelogStatus::from_symbol(&row.status)
            .ok_or_else(|| parse_error(format!("invalid status '{}'", row.status)))?;
        entries.push(TimelogEntry { time, status });
    }

    Ok(Timelog::from_entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_read_timelog() {
        let csv = "time,status\n\
                   2024-05-01T14:00:00Z,+\n\
                   2024-05-01T14:30:00Z,-\n\
                   2024-05-01 16:00:00, +\n";
        let timelog = read_timelog(csv.as_bytes(), "timelog.csv").unwrap();
        let intervals = timelog.intervals();
        assert_eq!(intervals.len(), 2);
        assert_eq!(
            intervals[0].start,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap())
        );
        assert_eq!(
            intervals[0].stop,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap())
        );
        // Trailing start with no stop stays open.
        assert_eq!(intervals[1].stop, None);
    }

    #[test]
    fn test_invalid_status() {
        let csv = "time,status\n2024-05-01T14:00:00Z,on\n";
        let err = read_timelog(csv.as_bytes(), "timelog.csv").unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_timelog(Path::new("/nonexistent/timelog.csv")),
            Err(DriveLogError::Io { .. })
        ));
    }
}
