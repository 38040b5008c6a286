//! Routes staged files to their destinations, backing up whatever they replace.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::StagedFile;
use crate::backup::{swap_in, BackupVault};
use crate::classifier::{is_accepted_extension, Classifier, TargetMode};
use crate::report::OperationLog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovedFile {
    pub relative_path: String,
    pub destination: PathBuf,
}

/// A file that could not be placed. Never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyFailure {
    pub relative_path: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionReport {
    pub mode: TargetMode,
    pub iso_code: String,
    pub imported: usize,
    pub backed_up: usize,
    pub backup_dir: Option<PathBuf>,
    pub moved: Vec<MovedFile>,
    pub failures: Vec<CopyFailure>,
}

impl DistributionReport {
    fn new(mode: TargetMode, iso_code: &str) -> Self {
        Self {
            mode,
            iso_code: iso_code.to_string(),
            imported: 0,
            backed_up: 0,
            backup_dir: None,
            moved: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Failures first, then the summary banner, then one line per moved file.
    pub fn to_log(&self) -> OperationLog {
        let mut log = OperationLog::new();
        for failure in &self.failures {
            log.error(format!(
                "Failed to copy {}: {}",
                failure.relative_path, failure.message
            ));
        }

        log.success(format!(
            "Imported {} files successfully to {}.",
            self.imported, self.mode
        ));
        if self.backed_up > 0 {
            if let Some(dir) = &self.backup_dir {
                log.info(format!(
                    "Backed up {} existing files to {}",
                    self.backed_up,
                    dir.display()
                ));
            }
        }
        for moved in &self.moved {
            log.info(format!(
                "moved {} to {}",
                moved.relative_path,
                moved.destination.display()
            ));
        }
        log
    }
}

/// Copies every accepted file to the directory the classifier picks.
///
/// Files with other extensions are ignored entirely. A pre-existing file of
/// the same name is copied into `vault` before being overwritten; when that
/// backup fails the destination is left untouched and the file is reported
/// as a failure.
pub fn distribute(
    files: &[StagedFile],
    mode: TargetMode,
    iso_code: &str,
    classifier: &Classifier<'_>,
    vault: &mut BackupVault,
) -> DistributionReport {
    let mut report = DistributionReport::new(mode, iso_code);

    for file in files {
        if !is_accepted_extension(&file.extension) {
            log::debug!("skipping {}", file.relative_path);
            continue;
        }

        let destination_dir =
            classifier.classify(&file.relative_path, &file.filename, mode, iso_code);
        match place_file(file, &destination_dir, vault) {
            Ok(Placement { target, backed_up }) => {
                if backed_up {
                    report.backed_up += 1;
                }
                report.imported += 1;
                report.moved.push(MovedFile {
                    relative_path: file.relative_path.clone(),
                    destination: target,
                });
            }
            Err(message) => {
                log::warn!("failed to copy {}: {}", file.relative_path, message);
                report.failures.push(CopyFailure {
                    relative_path: file.relative_path.clone(),
                    message,
                });
            }
        }
    }

    report.backup_dir = vault.run_dir().map(Path::to_path_buf);
    log::info!(
        "distributed {} files ({} backed up, {} failed) for {} in {} mode",
        report.imported,
        report.backed_up,
        report.failures.len(),
        iso_code,
        mode
    );
    report
}

struct Placement {
    target: PathBuf,
    backed_up: bool,
}

fn place_file(
    file: &StagedFile,
    destination_dir: &Path,
    vault: &mut BackupVault,
) -> Result<Placement, String> {
    fs::create_dir_all(destination_dir)
        .map_err(|err| format!("could not create {}: {}", destination_dir.display(), err))?;

    let target = destination_dir.join(&file.filename);
    let mut backed_up = false;
    if target.exists() {
        vault
            .preserve(&target)
            .map_err(|err| format!("backup failed, destination left unchanged: {err}"))?;
        backed_up = true;
    }

    swap_in(&file.path, &target).map_err(|err| err.to_string())?;
    Ok(Placement { target, backed_up })
}
