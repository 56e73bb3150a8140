//! Build pipeline errors.

use std::path::PathBuf;

use fabric_core::{DesignError, ElaborationError};
use thiserror::Error;

/// Errors that can occur while building a design.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("elaboration failed: {0}")]
    Elaboration(#[from] ElaborationError),

    #[error("{tool} failed: {detail}\n{log}")]
    ToolchainFailure {
        tool: String,
        detail: String,
        /// Tail of the tool output.
        log: String,
    },

    #[error("toolchain program '{program}' not found on PATH")]
    ToolchainNotFound { program: String },

    #[error("no HDL sources given for '{build_name}': pass sources or skip compilation")]
    NoSources { build_name: String },

    #[error("invalid build name '{name}': use letters, digits, '_' and '-'")]
    InvalidBuildName { name: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("design graph error: {0}")]
    Design(#[from] DesignError),
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;
