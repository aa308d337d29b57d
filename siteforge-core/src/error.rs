//! Error types for siteforge-core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A spend (or negative adjustment) would drive the balance below zero.
    /// The ledger is left untouched when this is returned.
    #[error("Insufficient credits: {requested} requested, {available} available")]
    InsufficientCredits { available: i64, requested: i64 },

    #[error("Subdomain is already taken")]
    SubdomainTaken,

    #[error("Site not found")]
    SiteNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}
