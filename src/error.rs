//! Error taxonomy for context document operations.
//!
//! Batch operations (sync, check) catch these per document and keep going;
//! only the CLI boundary turns them into a non-zero exit.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the registry, parser, and engines.
#[derive(Debug, Error)]
pub enum ContextError {
    /// No project registry between the start directory and the filesystem root.
    #[error("no project registry found; run `ctx init` first")]
    NotInitialized,

    /// The global registry under the home directory does not exist.
    #[error("global registry not initialized; run `ctx init --global` first")]
    GlobalNotInitialized,

    /// A document is missing required preview fields.
    #[error("invalid context document {document}: {}", errors.join("; "))]
    Validation { document: String, errors: Vec<String> },

    /// A metadata block is absent or malformed where one is required.
    #[error("failed to parse {document}: {reason}")]
    Parse { document: String, reason: String },

    /// A bound entry's target cannot be found on disk.
    #[error("target {target} of {document} not found")]
    TargetMissing { document: String, target: String },

    /// No entry with this identifier exists in the registry.
    #[error("no context registered as {0}")]
    UnknownContext(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ContextError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(document: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            document: document.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;
