//! Driving log configuration, read from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracknorm::PipelineConfig;

use crate::error::{PathContext, Result};

/// Default store file name.
pub const DEFAULT_STORE_PATH: &str = "driving_log.sqlite";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriveLogConfig {
    /// The canonical store file.
    pub store_path: PathBuf,
    /// Copy taken before every write. Defaults to the store path with a
    /// `.bak` suffix.
    pub backup_path: Option<PathBuf>,
    /// Copied when the store does not exist yet; without one the schema is
    /// created from scratch.
    pub template_path: Option<PathBuf>,
    /// Removed outliers are appended here when set.
    pub audit_csv: Option<PathBuf>,
    /// Engine timelog for the timelog stage.
    pub timelog_csv: Option<PathBuf>,
    pub pipeline: PipelineConfig,
}

impl Default for DriveLogConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            backup_path: None,
            template_path: None,
            audit_csv: None,
            timelog_csv: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl DriveLogConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_path(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("[DrivingLog] Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Configuration for a store at `store_path` with everything else
    /// at defaults.
    pub fn for_store(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            ..Default::default()
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        self.backup_path.clone().unwrap_or_else(|| {
            let mut name = self.store_path.clone().into_os_string();
            name.push(".bak");
            PathBuf::from(name)
        })
    }
}
