//! # Drivelog
//!
//! Persistent, append-only driving log fed by the [`tracknorm`] pipeline.
//!
//! - GPX reading with vendor extensions kept as auxiliary fields
//! - SQLite store with backups before every write
//! - Batch import with per-file failure isolation and idempotent merge
//! - Engine timelog and outlier audit CSV files
//!
//! ```no_run
//! use drivelog::{import_files, DriveLogConfig};
//!
//! let config = DriveLogConfig::load("drivelog.toml")?;
//! let summary = import_files(&config, &["2024-05-01.gpx", "2024-05-02.gpx"])?;
//! println!("{} tracks appended", summary.appended());
//! # Ok::<(), drivelog::DriveLogError>(())
//! ```

pub mod error;
pub use error::{DriveLogError, Result};

pub mod config;
pub use config::{DriveLogConfig, DEFAULT_STORE_PATH};

pub mod gpx;
pub use gpx::{parse_gpx, read_gpx_file};

pub mod migrations;

pub mod store;
pub use store::{BackupToken, DrivingLog, StoreWriter, TrackAttribute};

pub mod timelog;
pub use timelog::{load_timelog, read_timelog};

pub mod audit;
pub use audit::append_outliers;

pub mod export;
pub use export::document_time_span;

pub mod import;
pub use import::{import_files, import_into, FailedFile, ImportSummary};
