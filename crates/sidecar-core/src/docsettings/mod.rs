//! Per-document settings handle.
//!
//! A [`DocSettings`] is created by [`DocSettings::resolve`], filled by
//! [`DocSettings::load`], mutated by the application, and persisted with
//! [`DocSettings::write`], which purges superseded copies on success. The
//! handle has no identity of its own and is simply dropped afterwards.

mod flush;
mod purge;
mod scan;


pub use purge::PurgeReport;
pub use scan::{CandidateSlot, SidecarCandidate, StorageLocation, scan};

use crate::config::{SidecarConfig, StorageMode};
use crate::paths::{self, SidecarPaths, backup_path};
use crate::payload::{self, SettingsBlob, Value};
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Every resolved location for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarLocations {
    /// In-place sidecar directory (`S.sdr` beside the document).
    pub doc_dir: PathBuf,
    pub doc_file: PathBuf,
    /// Centralized sidecar directory under the docsettings root.
    pub dir_dir: PathBuf,
    pub dir_file: PathBuf,
    pub legacy_file: PathBuf,
    pub history_file: PathBuf,
    pub kpdfview_file: PathBuf,
}

impl SidecarLocations {
    /// Resolve all locations; `None` for an empty identifier.
    pub fn resolve(config: &SidecarConfig, doc_id: &str) -> Option<Self> {
        Some(Self {
            doc_dir: config.sidecar_dir(doc_id, StorageMode::Doc)?,
            doc_file: config.sidecar_file(doc_id, StorageMode::Doc)?,
            dir_dir: config.sidecar_dir(doc_id, StorageMode::Dir)?,
            dir_file: config.sidecar_file(doc_id, StorageMode::Dir)?,
            legacy_file: config.legacy_sidecar_file(doc_id)?,
            history_file: config.history_path(doc_id)?,
            kpdfview_file: paths::kpdfview_file(doc_id)?,
        })
    }

    /// The eight candidate slots in canonical preference order.
    pub fn candidate_slots(&self) -> Vec<CandidateSlot> {
        let slot = |path: &Path, location, backup| CandidateSlot {
            path: if backup {
                backup_path(path)
            } else {
                path.to_path_buf()
            },
            location,
            backup,
        };
        vec![
            slot(&self.doc_file, StorageLocation::InPlace, false),
            slot(&self.doc_file, StorageLocation::InPlace, true),
            slot(&self.legacy_file, StorageLocation::LegacyInPlace, false),
            slot(&self.dir_file, StorageLocation::Centralized, false),
            slot(&self.dir_file, StorageLocation::Centralized, true),
            slot(&self.history_file, StorageLocation::LegacyHistory, false),
            slot(&self.history_file, StorageLocation::LegacyHistory, true),
            slot(&self.kpdfview_file, StorageLocation::LegacyKpdfview, false),
        ]
    }
}

/// Settings session for one document.
#[derive(Debug, Clone)]
pub struct DocSettings {
    doc_id: String,
    config: SidecarConfig,
    locations: Option<SidecarLocations>,
    /// Freshness-ordered candidates from the last load.
    candidates: Option<Vec<SidecarCandidate>>,
    data: SettingsBlob,
}

impl DocSettings {
    /// Resolve paths for a document without touching the filesystem.
    pub fn resolve(config: &SidecarConfig, doc_id: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            config: config.clone(),
            locations: SidecarLocations::resolve(config, doc_id),
            candidates: None,
            data: SettingsBlob::new(),
        }
    }

    /// Resolve and load in one step.
    pub fn open(config: &SidecarConfig, doc_id: &str) -> Self {
        let mut settings = Self::resolve(config, doc_id);
        settings.load();
        settings
    }

    /// Scan candidates and load the newest valid one.
    ///
    /// Zero-length, unparsable and empty candidates are evicted (when the
    /// configuration allows) and skipped. Loading stops at the first valid
    /// candidate; older ones stay on disk until the next purge. The
    /// `doc_path` key is always set to this handle's identifier.
    pub fn load(&mut self) -> &SettingsBlob {
        let candidates = self.scan_candidates();
        self.load_from(candidates)
    }

    /// Files that fail to read are skipped and left on disk; only content
    /// problems count as corruption.
    fn load_from(&mut self, candidates: Vec<SidecarCandidate>) -> &SettingsBlob {
        let mut data = SettingsBlob::new();
        for candidate in &candidates {
            match read_candidate(&candidate.path) {
                Ok(blob) => {
                    debug!(
                        "sidecar: loaded {} ({})",
                        candidate.path.display(),
                        candidate.label()
                    );
                    data = blob;
                    break;
                }
                Err(Rejection::Unreadable(e)) => {
                    warn!("sidecar: skipping unreadable {}: {}", candidate.path.display(), e);
                }
                Err(Rejection::Corrupt(reason)) => self.evict(&candidate.path, &reason),
            }
        }

        data.stamp_doc_path(&self.doc_id);
        self.data = data;
        self.candidates = Some(candidates);
        &self.data
    }

    /// Existing candidates, freshly scanned; does not touch the loaded state.
    pub fn scan_candidates(&self) -> Vec<SidecarCandidate> {
        match &self.locations {
            Some(locations) => scan(&locations.candidate_slots()),
            None => Vec::new(),
        }
    }

    fn evict(&self, path: &Path, reason: &str) {
        if !self.config.evict_corrupt {
            warn!("sidecar: skipping corrupt {} ({})", path.display(), reason);
            return;
        }
        warn!("sidecar: evicting corrupt {} ({})", path.display(), reason);
        if let Err(e) = fs::remove_file(path) {
            warn!("sidecar: could not remove {}: {}", path.display(), e);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn locations(&self) -> Option<&SidecarLocations> {
        self.locations.as_ref()
    }

    /// Candidates recorded by the last load, or `None` if never loaded.
    pub fn candidates(&self) -> Option<&[SidecarCandidate]> {
        self.candidates.as_deref()
    }

    pub fn data(&self) -> &SettingsBlob {
        &self.data
    }

    pub fn into_data(self) -> SettingsBlob {
        self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.data.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.data.set(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// True only when the key holds `true`.
    pub fn is_true(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool) == Some(true)
    }

    /// True only when the key holds `false`.
    pub fn is_false(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool) == Some(false)
    }

    /// Toggle a boolean; a missing or non-boolean value becomes `true`.
    pub fn flip_bool(&mut self, key: &str) -> bool {
        let flipped = !self.is_true(key);
        self.set(key, flipped);
        flipped
    }
}

/// Why a candidate was not loaded.
#[derive(Debug)]
enum Rejection {
    /// The file could not be read; its content is unknown.
    Unreadable(io::Error),
    /// The content is not a usable settings table.
    Corrupt(String),
}

/// Read and validate one candidate.
fn read_candidate(path: &Path) -> Result<SettingsBlob, Rejection> {
    let bytes = fs::read(path).map_err(Rejection::Unreadable)?;
    if bytes.is_empty() {
        return Err(Rejection::Corrupt("zero-length file".to_string()));
    }
    let text = std::str::from_utf8(&bytes)
        .map_err(|e| Rejection::Corrupt(format!("not UTF-8: {}", e)))?;
    let blob = payload::decode(text)
        .map_err(|e| Rejection::Corrupt(format!("parse error: {}", e)))?;
    if blob.is_empty() {
        return Err(Rejection::Corrupt("empty table".to_string()));
    }
    Ok(blob)
}

/// First existing current sidecar file: in place, then centralized, then
/// (with `include_legacy`) the history mirror. Returns the mode it was found
/// under, `None` for the history mirror.
pub fn find_sidecar_file(
    config: &SidecarConfig,
    doc_id: &str,
    include_legacy: bool,
) -> Option<(PathBuf, Option<StorageMode>)> {
    for mode in [StorageMode::Doc, StorageMode::Dir] {
        if let Some(file) = config.sidecar_file(doc_id, mode)
            && file.is_file()
        {
            return Some((file, Some(mode)));
        }
    }
    if include_legacy
        && let Some(file) = config.history_path(doc_id)
        && file.is_file()
    {
        return Some((file, None));
    }
    None
}

/// Whether any current or history sidecar file exists for the document.
pub fn exists(config: &SidecarConfig, doc_id: &str) -> bool {
    find_sidecar_file(config, doc_id, true).is_some()
}
