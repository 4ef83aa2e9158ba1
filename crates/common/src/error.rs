//! Error types for imgreg

use thiserror::Error;

/// Result type alias using imgreg Error
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure errors.
///
/// Form validation failures are not errors; they are reported through
/// [`crate::form::Rejection`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),
}
