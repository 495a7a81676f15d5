//! I/O error types.

use thiserror::Error;

/// Result type for layout I/O.
pub type Result<T> = std::result::Result<T, Error>;

/// Layout I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON that is not a usable layout.
    #[error("invalid layout format: {0}")]
    InvalidFormat(String),

    /// Geometry rejected by the catalog.
    #[error("core error: {0}")]
    Core(#[from] telgeo_core::Error),
}
