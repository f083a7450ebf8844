//! Defines application-specific error types.
//!
//! This module provides the `ApiError` enum, which categorizes the narrow set
//! of error kinds an operation can surface to the HTTP layer, offering more
//! context than generic I/O or `anyhow` errors. Nothing here is allowed to
//! propagate to a client as an unhandled fault; handlers map each variant
//! into a structured JSON envelope.

use thiserror::Error;

/// Categorized errors surfaced by file, directory and VCS operations.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Error occurring during file or directory access (read, write, metadata).
    #[error("I/O error accessing path '{path}': {source}")]
    Io {
        /// The path that caused the I/O error.
        path: String,
        /// The underlying `std::io::Error`.
        #[source]
        source: std::io::Error,
    },

    /// The request escaped the configured base path or was otherwise refused.
    #[error("Access denied.")]
    Denied,

    /// The requested file or directory does not exist.
    #[error("File not found")]
    NotFound,

    /// The client supplied a missing or malformed parameter.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The home-automation API (or another upstream) failed or is unreachable.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A VCS operation failed. Callers degrade gracefully.
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

/// Helper to create an `ApiError::Io` with path context.
pub fn io_error_with_path<P: AsRef<std::path::Path>>(source: std::io::Error, path: P) -> ApiError {
    ApiError::Io {
        path: path.as_ref().display().to_string(),
        source,
    }
}
