//! Error types for dataset reduction and splitting.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reducing or splitting a dataset
#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("Source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Malformed annotation file ({context}): {reason}")]
    MalformedAnnotation { context: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("No label file {} for image {}", label.display(), image.display())]
    MissingPair { image: PathBuf, label: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Backend failed: {0}")]
    Backend(String),
}

impl ReduceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReduceError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        ReduceError::MalformedAnnotation {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReduceError>;
