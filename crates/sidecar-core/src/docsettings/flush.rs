//! Persisting a settings handle.

use super::DocSettings;
use crate::config::StorageMode;
use crate::error::{Result, SidecarError, TargetFailure};
use crate::paths::{SidecarPaths, backup_path};
use crate::payload::{SettingsBlob, encode};
use crate::safe_io::{sync_dir, write_durable};
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

impl DocSettings {
    /// Files to try, in order, for the configured storage mode.
    pub fn write_targets(&self) -> Vec<PathBuf> {
        let doc = self.doc_id.as_str();
        let modes: &[StorageMode] = match self.config.storage_mode {
            StorageMode::Doc => &[StorageMode::Doc, StorageMode::Dir],
            StorageMode::Dir => &[StorageMode::Dir],
        };
        modes
            .iter()
            .filter_map(|&mode| self.config.sidecar_file(doc, mode))
            .collect()
    }

    /// Persist the current blob.
    ///
    /// Returns the file that was written. Superseded candidates are purged
    /// afterwards.
    pub fn write(&mut self) -> Result<PathBuf> {
        let blob = self.data.clone();
        self.write_blob(blob)
    }

    /// Persist `blob`, which becomes the current blob on success.
    ///
    /// Targets are tried in order and the first success wins. If every target
    /// fails the in-memory blob is left as it was.
    pub fn write_blob(&mut self, mut blob: SettingsBlob) -> Result<PathBuf> {
        if self.doc_id.is_empty() {
            return Err(SidecarError::NoDocument);
        }
        if blob.is_empty() {
            return Err(SidecarError::EmptyPayload {
                doc: self.doc_id.clone(),
            });
        }
        blob.stamp_doc_path(&self.doc_id);
        let contents = encode(&blob);

        let mut attempts = Vec::new();
        for target in self.write_targets() {
            match write_target(&target, contents.as_bytes(), self.config.backup_min_age()) {
                Ok(()) => {
                    debug!("sidecar: wrote {}", target.display());
                    self.data = blob;
                    self.purge(Some(&target));
                    return Ok(target);
                }
                Err(source) => {
                    warn!("sidecar: cannot write {}: {}", target.display(), source);
                    attempts.push(TargetFailure {
                        path: target,
                        source,
                    });
                }
            }
        }

        Err(SidecarError::AllTargetsFailed {
            doc: self.doc_id.clone(),
            attempts,
        })
    }
}

fn write_target(target: &Path, contents: &[u8], backup_min_age: Duration) -> io::Result<()> {
    let dir = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;
    fs::create_dir_all(dir)?;

    rotate_backup(target, backup_min_age);
    write_durable(target, contents)?;

    if let Err(e) = sync_dir(dir) {
        warn!("sidecar: cannot sync {}: {}", dir.display(), e);
    }
    Ok(())
}

/// Move an existing target aside to `.old` once it is old enough, so a burst
/// of writes keeps a backup from before the burst.
fn rotate_backup(target: &Path, min_age: Duration) {
    let Ok(metadata) = fs::metadata(target) else {
        return;
    };
    if !metadata.is_file() {
        return;
    }
    let Ok(modified) = metadata.modified() else {
        return;
    };
    let old_enough = SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age > min_age);
    if !old_enough {
        return;
    }

    let backup = backup_path(target);
    match fs::rename(target, &backup) {
        Ok(()) => debug!("sidecar: rotated {} to {}", target.display(), backup.display()),
        Err(e) => warn!("sidecar: cannot rotate {}: {}", target.display(), e),
    }
}
