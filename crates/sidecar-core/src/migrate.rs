//! Following a document that moved, was copied, or was deleted.

use crate::config::SidecarConfig;
use crate::docsettings::{DocSettings, find_sidecar_file};
use crate::error::Result;
use crate::payload::CACHE_FILE_KEY;
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// Carry a document's settings to a new identifier, or drop them.
///
/// - `new = Some(..)`: the settings of `old` replace whatever `new` had, and
///   `new`'s stale candidates are purged by the write.
/// - `new = None`: the cache artifact named by `cache_file_path` is removed.
///
/// Unless `copy` is set, every candidate of `old` is purged afterwards. A
/// failed write returns the error and leaves `old` untouched. Nothing happens
/// when `old` has no sidecar or `old == new`.
pub fn update_location(
    config: &SidecarConfig,
    old: &str,
    new: Option<&str>,
    copy: bool,
) -> Result<()> {
    if find_sidecar_file(config, old, true).is_none() {
        debug!("sidecar: nothing to migrate for {}", old);
        return Ok(());
    }
    if new == Some(old) {
        return Ok(());
    }

    let old_settings = DocSettings::open(config, old);

    match new {
        Some(new) => {
            let mut new_settings = DocSettings::open(config, new);
            let written = new_settings.write_blob(old_settings.data().clone())?;
            debug!("sidecar: migrated {} to {}", old, written.display());
        }
        None => remove_cache_file(&old_settings),
    }

    if !copy {
        old_settings.purge(None);
    }
    Ok(())
}

fn remove_cache_file(settings: &DocSettings) {
    let Some(cache_file) = settings.get(CACHE_FILE_KEY).and_then(|v| v.as_str()) else {
        return;
    };
    let cache_file = Path::new(cache_file);
    if !cache_file.is_file() {
        return;
    }
    match fs::remove_file(cache_file) {
        Ok(()) => debug!("sidecar: removed cache {}", cache_file.display()),
        Err(e) => warn!("sidecar: cannot remove cache {}: {}", cache_file.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageMode;
    use crate::error::SidecarError;
    use crate::paths::SidecarPaths;
    use crate::payload::Value;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Library {
        temp: TempDir,
        config: SidecarConfig,
    }

    impl Library {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let config = SidecarConfig::with_home(&temp.path().join("home"));
            fs::create_dir_all(temp.path().join("books")).unwrap();
            Self { temp, config }
        }

        fn doc(&self, name: &str) -> String {
            let path = self.temp.path().join("books").join(name);
            fs::write(&path, b"doc").unwrap();
            path.to_str().unwrap().to_string()
        }

        fn save(&self, doc: &str, page: i64) {
            let mut settings = DocSettings::open(&self.config, doc);
            settings.set("page", page);
            settings.write().unwrap();
        }

        fn page(&self, doc: &str) -> Option<i64> {
            DocSettings::open(&self.config, doc)
                .get("page")
                .and_then(Value::as_i64)
        }

        fn sidecar_dir(&self, doc: &str) -> PathBuf {
            self.config.sidecar_dir(doc, StorageMode::Doc).unwrap()
        }
    }

    #[test]
    fn test_move_carries_settings_and_purges_old() {
        let lib = Library::new();
        let old = lib.doc("novel.epub");
        let new = lib.doc("renamed.epub");
        lib.save(&old, 42);

        update_location(&lib.config, &old, Some(&new), false).unwrap();

        assert_eq!(lib.page(&new), Some(42));
        let moved = DocSettings::open(&lib.config, &new);
        assert_eq!(moved.data().doc_path(), Some(new.as_str()));
        assert!(!lib.sidecar_dir(&old).exists());
        assert!(!crate::docsettings::exists(&lib.config, &old));
    }

    #[test]
    fn test_copy_keeps_old() {
        let lib = Library::new();
        let old = lib.doc("novel.epub");
        let new = lib.doc("copy.epub");
        lib.save(&old, 7);

        update_location(&lib.config, &old, Some(&new), true).unwrap();

        assert_eq!(lib.page(&old), Some(7));
        assert_eq!(lib.page(&new), Some(7));
    }

    #[test]
    fn test_move_replaces_existing_settings() {
        let lib = Library::new();
        let old = lib.doc("novel.epub");
        let new = lib.doc("target.epub");
        lib.save(&old, 1);

        let mut existing = DocSettings::open(&lib.config, &new);
        existing.set("page", 99);
        existing.set("bookmark", "chapter 3");
        existing.write().unwrap();

        update_location(&lib.config, &old, Some(&new), false).unwrap();

        let moved = DocSettings::open(&lib.config, &new);
        assert_eq!(moved.get("page").and_then(Value::as_i64), Some(1));
        assert!(!moved.has("bookmark"));
    }

    #[test]
    fn test_delete_removes_cache_artifact() {
        let lib = Library::new();
        let doc = lib.doc("novel.epub");
        let cache = lib.temp.path().join("cache.bin");
        fs::write(&cache, b"rendered").unwrap();

        let mut settings = DocSettings::open(&lib.config, &doc);
        settings.set(CACHE_FILE_KEY, cache.to_str().unwrap());
        settings.write().unwrap();

        update_location(&lib.config, &doc, None, false).unwrap();

        assert!(!cache.exists());
        assert!(!lib.sidecar_dir(&doc).exists());
    }

    #[test]
    fn test_no_sidecar_is_a_no_op() {
        let lib = Library::new();
        let old = lib.doc("novel.epub");
        let new = lib.doc("renamed.epub");

        update_location(&lib.config, &old, Some(&new), false).unwrap();
        assert!(!crate::docsettings::exists(&lib.config, &new));
    }

    #[test]
    fn test_same_location_is_a_no_op() {
        let lib = Library::new();
        let doc = lib.doc("novel.epub");
        lib.save(&doc, 5);

        update_location(&lib.config, &doc, Some(&doc), false).unwrap();
        assert_eq!(lib.page(&doc), Some(5));
    }

    #[test]
    fn test_failed_write_keeps_old() {
        let mut lib = Library::new();
        let old = lib.doc("novel.epub");
        lib.save(&old, 3);

        let blocker = lib.temp.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        lib.config.storage_mode = StorageMode::Dir;
        lib.config.docsettings_dir = blocker;
        let new = lib.doc("renamed.epub");

        let err = update_location(&lib.config, &old, Some(&new), false).unwrap_err();
        assert!(matches!(err, SidecarError::AllTargetsFailed { .. }));
        assert_eq!(lib.page(&old), Some(3));
    }
}
