//! Per-document advisory locking.
//!
//! The sidecar protocol assumes one writer per document. Callers that may run
//! concurrently (several processes, or threads of one process) serialize on
//! an fs2 lock file named after the document's in-place sidecar directory.
//! Lock files live under `lock_dir`, never inside a sidecar directory, so
//! they do not keep emptied directories alive.

use crate::config::{SidecarConfig, StorageMode};
use crate::docsettings::DocSettings;
use crate::error::{Result, SidecarError};
use crate::paths::SidecarPaths;
use crate::safe_io::FileLock;
use log::debug;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Lock file guarding a document, or `None` for an empty identifier.
pub fn lock_path_for(config: &SidecarConfig, doc_id: &str) -> Option<PathBuf> {
    let sidecar_dir = config.sidecar_dir(doc_id, StorageMode::Doc)?;
    let mut hasher = Sha256::new();
    hasher.update(sidecar_dir.to_string_lossy().as_bytes());
    Some(config.lock_dir.join(format!("{:x}.lock", hasher.finalize())))
}

/// Run `f` on a freshly loaded handle while holding the document's lock.
///
/// The lock is released when `f` returns, whether it wrote or not.
pub fn with_document<T>(
    config: &SidecarConfig,
    doc_id: &str,
    f: impl FnOnce(&mut DocSettings) -> Result<T>,
) -> Result<T> {
    let _guard = lock_documents(config, &[doc_id])?;
    let mut settings = DocSettings::open(config, doc_id);
    f(&mut settings)
}

/// Held locks for a set of documents; released on drop.
pub struct DocumentLocks {
    _locks: Vec<FileLock>,
}

/// Lock several documents at once.
///
/// Locks are taken in lock-path order so two callers locking the same pair
/// cannot deadlock. Duplicate documents are locked once.
pub fn lock_documents(config: &SidecarConfig, doc_ids: &[&str]) -> Result<DocumentLocks> {
    let mut paths = Vec::with_capacity(doc_ids.len());
    for doc_id in doc_ids {
        paths.push(lock_path_for(config, doc_id).ok_or(SidecarError::NoDocument)?);
    }
    paths.sort();
    paths.dedup();

    let mut locks = Vec::with_capacity(paths.len());
    for path in &paths {
        debug!("sidecar: locking {}", path.display());
        locks.push(FileLock::acquire(path)?);
    }
    Ok(DocumentLocks { _locks: locks })
}
