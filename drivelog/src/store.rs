//! SQLite-backed append-only driving log.
//!
//! One row per track. Geometry is stored as a MessagePack blob of line
//! parts, times as fixed-width RFC 3339 UTC text so that text order is time
//! order. Every mutating write requires a [`BackupToken`], which can only be
//! obtained by copying the store to its backup path first.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use geo::{Coord, LineString, MultiLineString};
use log::{info, warn};
use rusqlite::{params, Connection, DatabaseName, OptionalExtension};
use tracknorm::{DrivingTrack, TrackMetadata, TrackStore};

use crate::config::DriveLogConfig;
use crate::error::{DriveLogError, PathContext, Result};
use crate::migrations;

/// Proof that the store was backed up before a write.
#[derive(Debug)]
pub struct BackupToken {
    path: PathBuf,
}

impl BackupToken {
    /// Where the backup was written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Updatable descriptive column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackAttribute {
    Creator,
    Role,
    VehicleOwner,
    Comments,
}

impl TrackAttribute {
    pub fn column(&self) -> &'static str {
        match self {
            TrackAttribute::Creator => "creator",
            TrackAttribute::Role => "role",
            TrackAttribute::VehicleOwner => "vehicle_owner",
            TrackAttribute::Comments => "comments",
        }
    }
}

impl fmt::Display for TrackAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for TrackAttribute {
    type Err = DriveLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "creator" => Ok(TrackAttribute::Creator),
            "role" => Ok(TrackAttribute::Role),
            "vehicle_owner" | "vehicle owner" => Ok(TrackAttribute::VehicleOwner),
            "comments" | "description" => Ok(TrackAttribute::Comments),
            _ => Err(DriveLogError::UnknownAttribute(s.to_string())),
        }
    }
}

/// The canonical driving log.
pub struct DrivingLog {
    conn: Connection,
    path: PathBuf,
    backup_path: PathBuf,
}

impl DrivingLog {
    /// Open the store named by the configuration.
    pub fn open(config: &DriveLogConfig) -> Result<Self> {
        Self::open_at(
            &config.store_path,
            config.backup_path(),
            config.template_path.as_deref(),
        )
    }

    /// Open (or create) a store at `path`.
    ///
    /// A missing store is copied from `template` when one is given; the
    /// schema is then brought up to date either way.
    pub fn open_at(path: &Path, backup_path: PathBuf, template: Option<&Path>) -> Result<Self> {
        if !path.exists() {
            if let Some(template) = template {
                std::fs::copy(template, path).with_path(template)?;
                info!(
                    "[DrivingLog] Created {} from template {}",
                    path.display(),
                    template.display()
                );
            }
        }

        let mut conn = Connection::open(path)?;
        migrations::migrate(&mut conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            backup_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn track_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM driving_tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Check that every record has a geometry.
    pub fn verify_integrity(&self) -> Result<()> {
        let (records, geometries): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(geometry) FROM driving_tracks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if records != geometries {
            warn!(
                "[DrivingLog] {} has {} records but {} geometries",
                self.path.display(),
                records,
                geometries
            );
            return Err(DriveLogError::StoreIntegrity {
                records: records as usize,
                geometries: geometries as usize,
            });
        }
        Ok(())
    }

    /// Identity keys of every stored track.
    pub fn existing_timestamps(&self) -> Result<HashSet<DateTime<Utc>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_track_timestamp FROM driving_tracks")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        keys.iter().map(|k| self.decode_time(k)).collect()
    }

    /// Copy the whole store to the backup path.
    pub fn backup(&self) -> Result<BackupToken> {
        self.conn.backup(DatabaseName::Main, &self.backup_path, None)?;
        info!(
            "[DrivingLog] Backed up {} to {}",
            self.path.display(),
            self.backup_path.display()
        );
        Ok(BackupToken {
            path: self.backup_path.clone(),
        })
    }

    /// Writer for appending tracks. Consumes the backup proof.
    pub fn writer(&mut self, token: BackupToken) -> StoreWriter<'_> {
        StoreWriter { log: self, _backup: token }
    }

    /// Look up a track by identity key.
    pub fn get(&self, key: DateTime<Utc>) -> Result<Option<DrivingTrack>> {
        let row = self
            .conn
            .query_row(
                &format!("{} WHERE source_track_timestamp = ?", SELECT_TRACK),
                params![encode_time(key)],
                TrackRow::from_row,
            )
            .optional()?;
        row.map(|r| r.into_track(self)).transpose()
    }

    /// Every stored track, ordered by start time.
    pub fn tracks_by_start(&self) -> Result<Vec<DrivingTrack>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY utc_start, fid", SELECT_TRACK))?;
        let rows = stmt
            .query_map([], TrackRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(|r| r.into_track(self)).collect()
    }

    /// Set a descriptive attribute on every track whose start time lies in
    /// `start..=thru`. The store is backed up first. Returns the number of
    /// rows changed.
    pub fn update_attribute(
        &mut self,
        start: DateTime<Utc>,
        thru: DateTime<Utc>,
        attribute: TrackAttribute,
        value: Option<&str>,
    ) -> Result<usize> {
        let _token = self.backup()?;
        let sql = format!(
            "UPDATE driving_tracks SET {} = ?1 WHERE utc_start >= ?2 AND utc_start <= ?3",
            attribute.column()
        );
        let changed = self
            .conn
            .execute(&sql, params![value, encode_time(start), encode_time(thru)])?;

        info!(
            "[DrivingLog] Set {} = {:?} on {} tracks starting {} thru {}",
            attribute, value, changed, start, thru
        );
        Ok(changed)
    }

    fn decode_time(&self, text: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| DriveLogError::Parse {
                file: self.path.display().to_string(),
                message: format!("invalid timestamp '{}': {}", text, e),
            })
    }

    fn insert_all(&mut self, tracks: &[DrivingTrack]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO driving_tracks
                    (geometry, utc_start, utc_stop, creator, role, vehicle_owner, comments, source_track_timestamp)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for track in tracks {
                let geometry = encode_geometry(track)?;
                let m = &track.metadata;
                stmt.execute(params![
                    geometry,
                    encode_time(track.utc_start),
                    encode_time(track.utc_stop),
                    m.creator,
                    m.role,
                    m.vehicle_owner,
                    m.description,
                    encode_time(track.source_track_timestamp),
                ])?;
            }
        }
        tx.commit()?;

        info!(
            "[DrivingLog] Appended {} tracks to {}",
            tracks.len(),
            self.path.display()
        );
        Ok(tracks.len())
    }
}

/// Appending view of a [`DrivingLog`], available only after a backup.
pub struct StoreWriter<'a> {
    log: &'a mut DrivingLog,
    _backup: BackupToken,
}

impl TrackStore for StoreWriter<'_> {
    type Error = DriveLogError;

    fn existing_timestamps(&self) -> Result<HashSet<DateTime<Utc>>> {
        self.log.existing_timestamps()
    }

    /// One transaction: a failing row rolls back the whole batch.
    fn append(&mut self, tracks: &[DrivingTrack]) -> Result<usize> {
        self.log.insert_all(tracks)
    }
}

const SELECT_TRACK: &str = "SELECT geometry, utc_start, utc_stop, creator, role, vehicle_owner, comments, source_track_timestamp FROM driving_tracks";

struct TrackRow {
    geometry: Option<Vec<u8>>,
    utc_start: String,
    utc_stop: String,
    metadata: TrackMetadata,
    source_track_timestamp: String,
}

impl TrackRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            geometry: row.get(0)?,
            utc_start: row.get(1)?,
            utc_stop: row.get(2)?,
            metadata: TrackMetadata {
                creator: row.get(3)?,
                role: row.get(4)?,
                vehicle_owner: row.get(5)?,
                description: row.get(6)?,
            },
            source_track_timestamp: row.get(7)?,
        })
    }

    fn into_track(self, log: &DrivingLog) -> Result<DrivingTrack> {
        let parts: Vec<Vec<(f64, f64)>> = match &self.geometry {
            Some(blob) => rmp_serde::from_slice(blob).map_err(|e| DriveLogError::GeometryEncoding {
                message: e.to_string(),
            })?,
            None => Vec::new(),
        };

        let coords: Vec<Coord<f64>> = parts
            .iter()
            .flatten()
            .map(|&(x, y)| Coord { x, y })
            .collect();
        let geometry = (!parts.is_empty()).then(|| {
            MultiLineString::new(
                parts
                    .iter()
                    .map(|part| LineString::from(part.clone()))
                    .collect(),
            )
        });

        Ok(DrivingTrack {
            source_track_timestamp: log.decode_time(&self.source_track_timestamp)?,
            coords,
            geometry,
            utc_start: log.decode_time(&self.utc_start)?,
            utc_stop: log.decode_time(&self.utc_stop)?,
            metadata: self.metadata,
        })
    }
}

/// Fixed-width UTC text, e.g. `2024-05-01T14:00:00.000000000Z`.
pub fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn encode_geometry(track: &DrivingTrack) -> Result<Vec<u8>> {
    if !track.has_geometry() {
        return Err(DriveLogError::GeometryEncoding {
            message: format!("track {} has no geometry", track.source_track_timestamp),
        });
    }
    rmp_serde::to_vec(&track.line_parts()).map_err(|e| DriveLogError::GeometryEncoding {
        message: e.to_string(),
    })
}
