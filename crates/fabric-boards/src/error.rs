//! Error types for board operations.

use std::path::PathBuf;

/// Errors that can occur while loading or validating board records.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading/writing board files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Board file not found.
    #[error("board file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// No built-in or project-local board with this name.
    #[error("unknown board: '{name}'")]
    UnknownBoard {
        /// The requested board name.
        name: String,
    },

    /// Validation error in a board definition.
    #[error("validation error: {detail}")]
    Validation {
        /// Description of the validation failure.
        detail: String,
    },
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;
