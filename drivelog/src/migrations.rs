//! Schema of the driving log store.
//!
//! Stores copied from a template may already contain the table, so every
//! step is written to be a no-op against an existing schema.

use log::info;
use rusqlite::{Connection, Result as SqlResult};
use rusqlite_migration::{Migrations, M};

/// Name of the track table.
pub const TRACK_TABLE: &str = "driving_tracks";

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "CREATE TABLE IF NOT EXISTS driving_tracks (
                fid INTEGER PRIMARY KEY AUTOINCREMENT,
                geometry BLOB,
                utc_start TEXT,
                utc_stop TEXT,
                creator TEXT,
                role TEXT,
                vehicle_owner TEXT,
                comments TEXT,
                source_track_timestamp TEXT NOT NULL
            );",
        ),
        // The store rejects a second row for the same source track even if
        // a caller skips the dedup engine.
        M::up(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_driving_tracks_source
                ON driving_tracks(source_track_timestamp);
             CREATE INDEX IF NOT EXISTS idx_driving_tracks_start
                ON driving_tracks(utc_start);",
        ),
    ])
}

/// Bring the schema up to date.
pub fn migrate(conn: &mut Connection) -> crate::Result<()> {
    let existed = table_exists(conn)?;
    migrations().to_latest(conn)?;
    if existed {
        info!("[DrivingLog] Schema up to date (existing {} table)", TRACK_TABLE);
    } else {
        info!("[DrivingLog] Created {} table", TRACK_TABLE);
    }
    Ok(())
}

/// Whether the track table is present.
pub fn table_exists(conn: &Connection) -> SqlResult<bool> {
    let count: i64 = conn
        .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")?
        .query_row([TRACK_TABLE], |row| row.get(0))?;
    Ok(count > 0)
}
