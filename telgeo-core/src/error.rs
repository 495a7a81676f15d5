//! Error types for telgeo-core.

use thiserror::Error;

/// Result type alias for telgeo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for telescope geometry operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Geometry definition or usage is inconsistent (unknown plane in a
    /// frame query, malformed flip matrix, bad exclusion list, hit frame
    /// mismatch).
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Sensor ID or z-order rank is not present in the catalog.
    #[error("not found: {0}")]
    NotFound(String),

    /// Geometry description is unavailable (empty layout, model not built).
    #[error("geometry unavailable: {0}")]
    MissingGeometry(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Shorthand for an unknown-plane [`Error::InvalidGeometry`].
    pub fn unknown_plane(context: &str, sensor_id: i32) -> Self {
        Self::InvalidGeometry(format!("{context}: could not find plane ID {sensor_id}"))
    }
}
