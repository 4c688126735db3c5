//! Error types of the collaborators around the engine
//!
//! The engine itself cannot fail; these cover storage, authentication,
//! configuration and report export.

use thiserror::Error;

/// Authentication and user store errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    Unauthorized,

    #[error("Account is disabled")]
    InactiveUser,

    #[error("Username already exists")]
    UserExists,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User store error: {0}")]
    Storage(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

impl AuthError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Form session persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Codec(String),

    #[error("Invalid session name: {0}")]
    InvalidName(String),
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Report export and chart rendering errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("XLSX export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Nothing to report: {0}")]
    Empty(&'static str),
}

impl ReportError {
    pub fn chart(err: impl std::fmt::Display) -> Self {
        Self::Chart(err.to_string())
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),
}
