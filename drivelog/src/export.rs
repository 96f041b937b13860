//! Helpers for rendering the driving log.

use chrono::{DateTime, Utc};
use tracknorm::DrivingTrack;

/// Time span covering whole UTC days: midnight before the earliest start to
/// midnight after the latest start.
pub fn document_time_span(tracks: &[DrivingTrack]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = tracks.iter().map(|t| t.utc_start).min()?;
    let last = tracks.iter().map(|t| t.utc_start).max()?;

    let begin = first.date_naive().and_hms_opt(0, 0, 0)?.and_utc();
    let end = last.date_naive().succ_opt()?.and_hms_opt(0, 0, 0)?.and_utc();
    Some((begin, end))
}
