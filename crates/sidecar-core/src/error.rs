//! Error types surfaced by sidecar operations.
//!
//! Most failure modes are recovered locally: a missing sidecar yields an empty
//! blob, corrupt candidates are evicted during load, an unwritable target is
//! skipped in favour of the next one, and purge failures are only logged.
//! What remains here is what a caller actually has to handle.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// One failed attempt at persisting to a storage target.
#[derive(Debug)]
pub struct TargetFailure {
    pub path: PathBuf,
    pub source: io::Error,
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.source)
    }
}

#[derive(Debug, Error)]
pub enum SidecarError {
    /// The operation needs a document, but the identifier was empty.
    #[error("no document: the document identifier is empty")]
    NoDocument,

    /// Refusing to persist a blob with no entries.
    #[error("refusing to write empty settings for '{doc}'")]
    EmptyPayload { doc: String },

    /// Every configured storage target failed; nothing was written.
    #[error("could not write settings for '{doc}' to any target ({})", join_failures(.attempts))]
    AllTargetsFailed {
        doc: String,
        attempts: Vec<TargetFailure>,
    },

    #[error("failed to parse config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn join_failures(attempts: &[TargetFailure]) -> String {
    if attempts.is_empty() {
        return "no targets configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<SidecarError> for io::Error {
    fn from(err: SidecarError) -> Self {
        match err {
            SidecarError::Io(e) => e,
            SidecarError::NoDocument | SidecarError::EmptyPayload { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
            }
            SidecarError::Config { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, err.to_string())
            }
            SidecarError::AllTargetsFailed { .. } => io::Error::other(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SidecarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_targets_failed_lists_every_attempt() {
        let err = SidecarError::AllTargetsFailed {
            doc: "/books/a.epub".to_string(),
            attempts: vec![
                TargetFailure {
                    path: PathBuf::from("/books/a.sdr/metadata.epub.lua"),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
                },
                TargetFailure {
                    path: PathBuf::from("/home/docsettings/books/a.sdr/metadata.epub.lua"),
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("/books/a.epub"));
        assert!(msg.contains("read-only"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_into_io_error_kinds() {
        let e: io::Error = SidecarError::NoDocument.into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);

        let e: io::Error = SidecarError::Config {
            path: PathBuf::from("config.toml"),
            message: "bad".to_string(),
        }
        .into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
    }
}
