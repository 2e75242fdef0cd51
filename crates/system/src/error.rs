//! Error types for destination backends

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading or mutating a destination
#[derive(Debug, Error)]
pub enum Error {
    /// Path (or key) is absent
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Permission denied
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// Malformed glob syntax
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// External command exited non-zero or could not be spawned
    #[error("command failed: {command}: {message}")]
    CommandFailed { command: String, message: String },

    /// Write attempted after the archive was finalized
    #[error("archive is already closed")]
    ArchiveClosed,

    /// Mutation the backend cannot represent
    #[error("{operation} is not supported by this backend: {}", .path.display())]
    UnsupportedOperation {
        operation: &'static str,
        path: PathBuf,
    },

    /// Any other IO failure
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Persistent state database error
    #[error("state database error: {0}")]
    State(#[from] rusqlite::Error),

    /// Encryption tool failure
    #[error("encryption error: {0}")]
    Encryption(String),
}

impl Error {
    /// Classify an IO error raised while operating on `path`
    pub fn from_io(path: impl AsRef<Path>, err: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(path),
            _ => Error::Io { path, source: err },
        }
    }

    /// Returns true if this error means the path or key does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result type for destination operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classification() {
        let err = Error::from_io("/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());

        let err = Error::from_io("/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, Error::PermissionDenied(p) if p == Path::new("/x")));

        let err = Error::from_io("/x", io::Error::other("boom"));
        assert!(matches!(err, Error::Io { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_display_mentions_path() {
        let err = Error::UnsupportedOperation {
            operation: "rename",
            path: PathBuf::from("a/b"),
        };
        assert_eq!(err.to_string(), "rename is not supported by this backend: a/b");
    }
}
