//! Error type for the driving log.

use std::path::PathBuf;

use thiserror::Error;
use tracknorm::TrackNormError;

#[derive(Debug, Error)]
pub enum DriveLogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Schema migration failed: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file could not be read into the track model.
    #[error("Failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("{file}: missing required field {field}")]
    MissingField { file: String, field: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("CSV error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Pipeline(#[from] TrackNormError),

    /// Record count and geometry count of the store disagree. Imports are
    /// refused until the store is repaired.
    #[error("Driving log integrity check failed: {records} records but {geometries} geometries")]
    StoreIntegrity { records: usize, geometries: usize },

    #[error("Geometry encoding error: {message}")]
    GeometryEncoding { message: String },

    #[error("Unknown track attribute '{0}'")]
    UnknownAttribute(String),
}

pub type Result<T> = std::result::Result<T, DriveLogError>;

/// Attach a path to I/O and CSV errors.
pub(crate) trait PathContext<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> PathContext<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| DriveLogError::Io {
            path: path.into(),
            source,
        })
    }
}

impl<T> PathContext<T> for std::result::Result<T, csv::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| DriveLogError::Csv {
            path: path.into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_carries_path() {
        let err = std::fs::read("/nonexistent/drivelog.gpkg")
            .with_path("/nonexistent/drivelog.gpkg")
            .unwrap_err();
        assert!(matches!(err, DriveLogError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/drivelog.gpkg"));
    }

    #[test]
    fn test_pipeline_error_is_transparent() {
        let err: DriveLogError = TrackNormError::Config {
            message: "bad window".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Configuration error: bad window");
    }
}
