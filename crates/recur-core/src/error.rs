//! Error types for Recur

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A submitted transaction failed structural validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A submitted transaction belongs to someone other than the caller
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Empty transaction list")]
    EmptyBatch,

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
