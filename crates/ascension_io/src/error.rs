//! Error types for world-state storage.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    /// The file holds nothing but whitespace.
    #[error("World document is empty")]
    EmptyDocument,

    /// The document parsed but its top level is not an object.
    #[error("World document must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("Invalid world JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{op} {path:?}: {source}")]
    File {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The background writer thread is gone.
    #[error("Store writer unavailable during {0}")]
    WriterGone(&'static str),

    /// Deliberate failure from a test store.
    #[error("Injected {0} failure")]
    Injected(&'static str),
}

pub type Result<T> = std::result::Result<T, IoError>;

impl IoError {
    pub fn file(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same operation later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, IoError::File { .. } | IoError::Injected(_))
    }
}
