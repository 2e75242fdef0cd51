//! Error types for reconciliation

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reconciling entries
#[derive(Debug, Error)]
pub enum Error {
    /// A destination operation failed
    #[error(transparent)]
    System(#[from] system::Error),

    /// Template evaluation failed
    #[error("template {name}: {message}")]
    Template { name: String, message: String },

    /// A stored script record could not be decoded
    #[error("corrupt {bucket} record {key}: {source}")]
    CorruptRecord {
        bucket: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The destination root cannot be used; aborts the whole pass
    #[error("destination {} is not accessible: {source}", .path.display())]
    DestinationRoot {
        path: PathBuf,
        #[source]
        source: system::Error,
    },

    /// The destination root exists but is not a directory; aborts the whole pass
    #[error("destination {} is a {kind}, not a directory", .path.display())]
    DestinationNotDir {
        path: PathBuf,
        kind: system::FileKind,
    },
}

impl Error {
    /// Whether this error stops the whole pass rather than one entry
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DestinationRoot { .. } | Error::DestinationNotDir { .. }
        )
    }
}

/// Result type for reconciliation
pub type Result<T> = std::result::Result<T, Error>;
