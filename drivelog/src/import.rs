//! Batch import of GPX files into the driving log.
//!
//! Files are read and normalized in the order given. A file that fails to
//! parse, or fails a strict timelog check, is reported and skipped; the rest
//! of the batch proceeds. All candidates are then merged in one write after
//! a backup.

use std::path::{Path, PathBuf};

use log::{error, info};
use tracknorm::{merge_into_store, DrivingTrack, MergeReport, OutlierRecord, Pipeline, Timelog};

use crate::audit::append_outliers;
use crate::config::DriveLogConfig;
use crate::error::Result;
use crate::gpx::read_gpx_file;
use crate::store::DrivingLog;
use crate::timelog::load_timelog;

/// A file left out of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// Result of one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub files_processed: usize,
    pub failed_files: Vec<FailedFile>,
    /// Track candidates produced across all files, before dedup.
    pub candidates: usize,
    pub outliers_removed: usize,
    pub report: MergeReport,
}

impl ImportSummary {
    pub fn appended(&self) -> usize {
        self.report.appended
    }
}

/// Open the configured store and import `paths` into it.
pub fn import_files<P: AsRef<Path>>(config: &DriveLogConfig, paths: &[P]) -> Result<ImportSummary> {
    let mut log = DrivingLog::open(config)?;
    import_into(&mut log, config, paths)
}

/// Import `paths` into an open store.
///
/// The store's integrity is checked before anything is read; a failed
/// check aborts the run without writing.
pub fn import_into<P: AsRef<Path>>(
    log: &mut DrivingLog,
    config: &DriveLogConfig,
    paths: &[P],
) -> Result<ImportSummary> {
    log.verify_integrity()?;

    let timelog = match &config.timelog_csv {
        Some(path) => load_timelog(path)?,
        None => Timelog::default(),
    };
    let pipeline = Pipeline::new(config.pipeline.clone()).with_timelog(timelog);

    let mut summary = ImportSummary::default();
    let mut candidates: Vec<DrivingTrack> = Vec::new();
    let mut outliers: Vec<OutlierRecord> = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let outcome = read_gpx_file(path)
            .and_then(|file| pipeline.process_file(&file).map_err(Into::into));

        match outcome {
            Ok(outcome) => {
                info!(
                    "[Import] {}: {} candidates, {} outliers removed",
                    path.display(),
                    outcome.tracks.len(),
                    outcome.outliers.len()
                );
                summary.files_processed += 1;
                candidates.extend(outcome.tracks);
                outliers.extend(outcome.outliers);
            }
            Err(e) => {
                error!("[Import] Skipping {}: {}", path.display(), e);
                summary.failed_files.push(FailedFile {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
    }

    summary.candidates = candidates.len();
    summary.outliers_removed = outliers.len();
    if let Some(audit) = &config.audit_csv {
        append_outliers(audit, &outliers)?;
    }

    if !candidates.is_empty() {
        let token = log.backup()?;
        let mut writer = log.writer(token);
        summary.report = merge_into_store(&mut writer, &candidates, config.pipeline.min_points)?;
    }

    info!(
        "[Import] {} files processed, {} failed, {} tracks appended, {} skipped",
        summary.files_processed,
        summary.failed_files.len(),
        summary.report.appended,
        summary.report.skipped_count()
    );
    Ok(summary)
}
