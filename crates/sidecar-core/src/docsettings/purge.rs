//! Removing superseded sidecar files and emptied directories.

use super::DocSettings;
use crate::paths::backup_path;
use crate::safe_io::temp_path;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// What a purge removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed_files: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
}

impl PurgeReport {
    pub fn is_empty(&self) -> bool {
        self.removed_files.is_empty() && self.removed_dirs.is_empty()
    }
}

impl DocSettings {
    /// Delete the candidates from the last load, except `keep` and its
    /// backup, then drop emptied sidecar directories.
    ///
    /// The in-place directory is removed alone; the centralized directory is
    /// removed together with empty ancestors below the centralized root.
    /// Temp files left by an interrupted write are removed first so they
    /// cannot keep a directory alive. Failures are logged and skipped.
    pub fn purge(&self, keep: Option<&Path>) -> PurgeReport {
        let mut report = PurgeReport::default();
        let keep_backup = keep.map(backup_path);

        for candidate in self.candidates.iter().flatten() {
            let path = candidate.path.as_path();
            if Some(path) == keep || Some(path) == keep_backup.as_deref() {
                continue;
            }
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => {
                    debug!("sidecar: purged {}", path.display());
                    report.removed_files.push(path.to_path_buf());
                }
                Err(e) => warn!("sidecar: cannot purge {}: {}", path.display(), e),
            }
        }

        let Some(locations) = &self.locations else {
            return report;
        };

        for target in [&locations.doc_file, &locations.dir_file] {
            remove_stale_temp(target, &mut report);
        }

        remove_if_empty(&locations.doc_dir, &mut report);

        let root = self.config.docsettings_dir.as_path();
        let mut dir = Some(locations.dir_dir.as_path());
        while let Some(current) = dir {
            if current == root || !current.starts_with(root) {
                break;
            }
            if !remove_if_empty(current, &mut report) {
                break;
            }
            dir = current.parent();
        }

        report
    }
}

fn remove_stale_temp(target: &Path, report: &mut PurgeReport) {
    let tmp = temp_path(target);
    if !tmp.is_file() {
        return;
    }
    match fs::remove_file(&tmp) {
        Ok(()) => {
            debug!("sidecar: removed stale {}", tmp.display());
            report.removed_files.push(tmp);
        }
        Err(e) => warn!("sidecar: cannot remove {}: {}", tmp.display(), e),
    }
}

/// Remove `dir` if it is an empty directory. True when it was removed.
fn remove_if_empty(dir: &Path, report: &mut PurgeReport) -> bool {
    let empty = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => return false,
    };
    if !empty {
        return false;
    }
    match fs::remove_dir(dir) {
        Ok(()) => {
            debug!("sidecar: removed empty {}", dir.display());
            report.removed_dirs.push(dir.to_path_buf());
            true
        }
        Err(e) => {
            warn!("sidecar: cannot remove {}: {}", dir.display(), e);
            false
        }
    }
}
