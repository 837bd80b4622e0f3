//! Configuration for sidecar storage.
//!
//! The configuration is an explicit value threaded into every operation that
//! needs it; nothing reads process-wide state after [`SidecarConfig::load`].
//!
//! `config.toml` lives in the sidecar home directory. Every field is optional:
//!
//! ```toml
//! document_metadata_folder = "doc"   # or "dir"
//! docsettings_dir = "/mnt/onboard/.sidecar/docsettings"
//! history_dir = "/mnt/onboard/.sidecar/history"
//! backup_min_age_seconds = 60
//! evict_corrupt = true
//! ```

use crate::error::{Result, SidecarError};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum::{AsRefStr, EnumString};

/// Environment variable overriding the sidecar home directory.
pub const HOME_ENV: &str = "SIDECAR_HOME";

/// A file is only rotated to `.old` when it is at least this old.
/// Younger files may still be in the OS write-back cache, and a backup with
/// the same timestamp as the new write would be indistinguishable from it.
pub const DEFAULT_BACKUP_MIN_AGE_SECONDS: u64 = 60;

/// Where sidecar directories live.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageMode {
    /// Beside the document, with the centralized root as fallback for
    /// read-only media.
    #[default]
    Doc,
    /// Only under the centralized settings root.
    Dir,
}

/// On-disk form of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document_metadata_folder: Option<StorageMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    docsettings_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    history_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lock_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup_min_age_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    evict_corrupt: Option<bool>,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidecarConfig {
    #[serde(rename = "document_metadata_folder")]
    pub storage_mode: StorageMode,
    /// Root of the centralized sidecar mirror.
    pub docsettings_dir: PathBuf,
    /// Root of the flat legacy history mirror.
    pub history_dir: PathBuf,
    /// Where per-document advisory lock files are kept.
    pub lock_dir: PathBuf,
    pub backup_min_age_seconds: u64,
    /// Delete zero-length or unparsable candidates found during load.
    pub evict_corrupt: bool,
}

impl SidecarConfig {
    /// Build the default configuration rooted at `home`.
    pub fn with_home(home: &Path) -> Self {
        Self {
            storage_mode: StorageMode::default(),
            docsettings_dir: home.join("docsettings"),
            history_dir: home.join("history"),
            lock_dir: home.join("locks"),
            backup_min_age_seconds: DEFAULT_BACKUP_MIN_AGE_SECONDS,
            evict_corrupt: true,
        }
    }

    /// Load configuration with optional home directory override.
    ///
    /// Precedence for the sidecar home:
    /// 1. `home_override` parameter (from the --home CLI flag)
    /// 2. `SIDECAR_HOME` environment variable
    /// 3. `~/.sidecar` default
    ///
    /// A missing `config.toml` yields the defaults.
    pub fn load(home_override: Option<PathBuf>) -> Result<Self> {
        let home = resolve_home(home_override)?;
        Self::from_home(&home)
    }

    /// Load `config.toml` from an explicit home directory.
    pub fn from_home(home: &Path) -> Result<Self> {
        let config_path = home.join("config.toml");
        let mut config = Self::with_home(home);
        if !config_path.exists() {
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path)?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| SidecarError::Config {
            path: config_path.clone(),
            message: e.to_string(),
        })?;
        config.apply(file);
        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(mode) = file.document_metadata_folder {
            self.storage_mode = mode;
        }
        if let Some(dir) = file.docsettings_dir {
            self.docsettings_dir = dir;
        }
        if let Some(dir) = file.history_dir {
            self.history_dir = dir;
        }
        if let Some(dir) = file.lock_dir {
            self.lock_dir = dir;
        }
        if let Some(secs) = file.backup_min_age_seconds {
            self.backup_min_age_seconds = secs;
        }
        if let Some(evict) = file.evict_corrupt {
            self.evict_corrupt = evict;
        }
    }

    pub fn backup_min_age(&self) -> Duration {
        Duration::from_secs(self.backup_min_age_seconds)
    }

    /// Copy of this configuration with a different storage mode.
    pub fn with_mode(&self, mode: StorageMode) -> Self {
        Self {
            storage_mode: mode,
            ..self.clone()
        }
    }
}

fn resolve_home(home_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = home_override {
        return Ok(path);
    }
    if let Ok(home) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    let home = home_dir()
        .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "Home directory not found"))?;
    Ok(home.join(".sidecar"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::str::FromStr;
    use tempfile::TempDir;

    #[test]
    fn test_storage_mode_parse() {
        assert_eq!(StorageMode::from_str("doc").unwrap(), StorageMode::Doc);
        assert_eq!(StorageMode::from_str("dir").unwrap(), StorageMode::Dir);
        assert!(StorageMode::from_str("hash").is_err());
        assert_eq!(StorageMode::Dir.as_ref(), "dir");
    }

    #[test]
    fn test_defaults_without_config_file() {
        let temp = TempDir::new().unwrap();
        let config = SidecarConfig::from_home(temp.path()).unwrap();
        assert_eq!(config.storage_mode, StorageMode::Doc);
        assert_eq!(config.docsettings_dir, temp.path().join("docsettings"));
        assert_eq!(config.history_dir, temp.path().join("history"));
        assert_eq!(config.backup_min_age_seconds, 60);
        assert!(config.evict_corrupt);
    }

    #[test]
    fn test_config_file_overrides() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.toml"),
            r#"
document_metadata_folder = "dir"
docsettings_dir = "/srv/settings"
backup_min_age_seconds = 5
evict_corrupt = false
"#,
        )
        .unwrap();

        let config = SidecarConfig::from_home(temp.path()).unwrap();
        assert_eq!(config.storage_mode, StorageMode::Dir);
        assert_eq!(config.docsettings_dir, PathBuf::from("/srv/settings"));
        assert_eq!(config.history_dir, temp.path().join("history"));
        assert_eq!(config.backup_min_age_seconds, 5);
        assert!(!config.evict_corrupt);
    }

    #[test]
    fn test_invalid_mode_is_config_error() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.toml"),
            "document_metadata_folder = \"hash\"\n",
        )
        .unwrap();

        let err = SidecarConfig::from_home(temp.path()).unwrap_err();
        assert!(matches!(err, SidecarError::Config { .. }));
    }

    #[test]
    #[serial]
    fn test_home_override_beats_env() {
        let env_home = TempDir::new().unwrap();
        let explicit = TempDir::new().unwrap();
        // SAFETY: serialized with other env-mutating tests.
        unsafe { std::env::set_var(HOME_ENV, env_home.path()) };

        let config = SidecarConfig::load(Some(explicit.path().to_path_buf())).unwrap();
        assert_eq!(config.docsettings_dir, explicit.path().join("docsettings"));

        let config = SidecarConfig::load(None).unwrap();
        assert_eq!(config.docsettings_dir, env_home.path().join("docsettings"));

        unsafe { std::env::remove_var(HOME_ENV) };
    }
}
