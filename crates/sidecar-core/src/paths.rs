//! Sidecar path computation.
//!
//! All path methods are pure computations with no I/O. An empty document
//! identifier means "no document" and every function returns `None` for it.
//!
//! Layout for a document `D` with stem `S` (D without its final extension):
//!
//! - in place: `S.sdr/metadata.<ext>.lua`
//! - centralized: `<docsettings_dir>/S.sdr/metadata.<ext>.lua`
//! - legacy in place: `S.sdr/<basename>.lua`
//! - legacy history: `<history_dir>/[<dir with '/' as '#'>] <basename>.lua`
//! - legacy kpdfview: `D.kpdfview.lua`
//!
//! Backups append `.old` to the file name.

use crate::config::{SidecarConfig, StorageMode};
use std::path::{Path, PathBuf};

/// Suffix of sidecar directories.
pub const SIDECAR_DIR_SUFFIX: &str = ".sdr";

/// Suffix of rotated backups.
pub const BACKUP_SUFFIX: &str = ".old";

/// Stands in for path separators in legacy history file names.
pub const HISTORY_SEPARATOR: char = '#';

/// Trait providing path computation for sidecar locations.
pub trait SidecarPaths {
    /// Root of the centralized mirror.
    fn docsettings_dir(&self) -> &Path;

    /// Root of the flat legacy history mirror.
    fn history_dir(&self) -> &Path;

    /// Sidecar directory for a document under the given storage mode.
    fn sidecar_dir(&self, doc_id: &str, mode: StorageMode) -> Option<PathBuf> {
        if doc_id.is_empty() {
            return None;
        }
        let stem = format!("{}{}", strip_extension(doc_id), SIDECAR_DIR_SUFFIX);
        Some(match mode {
            StorageMode::Doc => PathBuf::from(stem),
            StorageMode::Dir => self.docsettings_dir().join(stem.trim_start_matches('/')),
        })
    }

    /// Current sidecar file: `<sidecar_dir>/metadata.<ext>.lua`.
    fn sidecar_file(&self, doc_id: &str, mode: StorageMode) -> Option<PathBuf> {
        let dir = self.sidecar_dir(doc_id, mode)?;
        Some(dir.join(sidecar_file_name(doc_id)))
    }

    /// Oldest in-place naming: `<sidecar_dir>/<basename>.lua`.
    fn legacy_sidecar_file(&self, doc_id: &str) -> Option<PathBuf> {
        let dir = self.sidecar_dir(doc_id, StorageMode::Doc)?;
        Some(dir.join(format!("{}.lua", basename(doc_id))))
    }

    /// Flat legacy history mirror file.
    fn history_path(&self, doc_id: &str) -> Option<PathBuf> {
        history_name_for(doc_id).map(|name| self.history_dir().join(name))
    }
}

impl SidecarPaths for SidecarConfig {
    fn docsettings_dir(&self) -> &Path {
        &self.docsettings_dir
    }

    fn history_dir(&self) -> &Path {
        &self.history_dir
    }
}

/// File name of the current sidecar file. The extension is empty when the
/// document has none, which yields `metadata..lua`.
pub fn sidecar_file_name(doc_id: &str) -> String {
    format!("metadata.{}.lua", extension(doc_id))
}

/// Single-file legacy naming: `<document>.kpdfview.lua`.
pub fn kpdfview_file(doc_id: &str) -> Option<PathBuf> {
    if doc_id.is_empty() {
        return None;
    }
    Some(PathBuf::from(format!("{}.kpdfview.lua", doc_id)))
}

/// `<path>.old`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(BACKUP_SUFFIX);
    PathBuf::from(os)
}

/// Legacy history file name: `[<dir with separators as '#'>] <basename>.lua`.
pub fn history_name_for(doc_id: &str) -> Option<String> {
    if doc_id.is_empty() {
        return None;
    }
    let (dir, base) = match doc_id.rfind('/') {
        Some(i) => doc_id.split_at(i + 1),
        None => ("", doc_id),
    };
    let dir = dir.replace('/', &HISTORY_SEPARATOR.to_string());
    Some(format!("[{}] {}.lua", dir, base))
}

/// Recover the document identifier from a legacy history file name.
///
/// Returns `None` for malformed names and for `.lua.old` backups.
pub fn doc_id_from_history_name(name: &str) -> Option<String> {
    let (dir, base) = split_history_name(name)?;
    Some(format!(
        "{}{}",
        dir.replace(HISTORY_SEPARATOR, "/"),
        base
    ))
}

/// Recover the document basename from a legacy history file name.
pub fn basename_from_history_name(name: &str) -> Option<String> {
    split_history_name(name).map(|(_, base)| base.to_string())
}

/// Split `[<dir>] <base>.lua` into `(dir, base)`. The bracketed part is the
/// first balanced `[...]` group.
fn split_history_name(name: &str) -> Option<(&str, &str)> {
    let stem = name.strip_suffix(".lua")?;
    let open = stem.find('[')?;
    if open != 0 {
        return None;
    }

    let mut depth = 0usize;
    let mut close = None;
    for (i, c) in stem.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;

    let base = stem[close + 1..].strip_prefix(' ')?;
    if base.is_empty() {
        return None;
    }
    Some((&stem[1..close], base))
}

/// Final path component.
pub fn basename(doc_id: &str) -> &str {
    match doc_id.rfind('/') {
        Some(i) => &doc_id[i + 1..],
        None => doc_id,
    }
}

/// Extension of the final component, without the dot. Leading dots of hidden
/// files do not start an extension.
pub fn extension(doc_id: &str) -> &str {
    let base = basename(doc_id);
    match base.rfind('.') {
        Some(i) if i > 0 => &base[i + 1..],
        _ => "",
    }
}

/// Document path without the extension of its final component.
pub fn strip_extension(doc_id: &str) -> &str {
    let ext = extension(doc_id);
    let base = basename(doc_id);
    if ext.is_empty() && !base.ends_with('.') {
        return doc_id;
    }
    &doc_id[..doc_id.len() - ext.len() - 1]
}
