//! sidecar-core: per-document settings stored in sidecar files
//!
//! Every document gets a small settings table kept beside it
//! (`novel.sdr/metadata.epub.lua`) or under a centralized mirror. Loading
//! picks the newest valid copy among all current and legacy locations;
//! writing is crash-consistent and cleans up the copies it supersedes.
//!
//! # Quick Start
//!
//! ```no_run
//! use sidecar_core::{DocSettings, SidecarConfig};
//!
//! fn main() -> sidecar_core::Result<()> {
//!     let config = SidecarConfig::load(None)?;
//!     let mut settings = DocSettings::open(&config, "/books/novel.epub");
//!     settings.set("last_page", 42);
//!     settings.write()?;
//!     Ok(())
//! }
//! ```
//!
//! Callers that may race on the same document should go through
//! [`lock::with_document`].

pub mod config;
pub mod docsettings;
pub mod error;
pub mod lock;
pub mod migrate;
pub mod paths;
pub mod payload;
pub mod safe_io;

// Re-export commonly used types
pub use config::{SidecarConfig, StorageMode};
pub use docsettings::{
    DocSettings, PurgeReport, SidecarCandidate, SidecarLocations, StorageLocation, exists,
    find_sidecar_file,
};
pub use error::{Result, SidecarError};
pub use migrate::update_location;
pub use paths::SidecarPaths;
pub use payload::{Key, SettingsBlob, Value};
