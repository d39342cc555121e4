//! Error taxonomy of the sync pipeline.
//!
//! Per-item failures (`FetchError`, validation) are contained by the
//! orchestrator; only list unavailability and persistence write failures end a
//! run.

use thiserror::Error;

/// Failure of a single upstream request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS or timeout failure.
    #[error("Network error: {message}")]
    Network { message: String },

    /// HTTP 429 persisted after all retries.
    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Any other non-200 status.
    #[error("HTTP status {code} from {url}")]
    HttpStatus { code: u16, url: String },

    /// Body was not the expected JSON.
    #[error("Parse error: {message}")]
    Parse { message: String },
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::parse(err.to_string())
    }
}

/// Errors surfaced by the sync core and its repositories.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Record violates a `GameRecord` invariant and is dropped.
    #[error("Validation error for app {id}: {message}")]
    Validation { id: i64, message: String },

    /// Durable storage could not be written or queried.
    #[error("Persistence error: {0}")]
    Persistence(#[from] sea_orm::DbErr),

    /// Stored state exists but cannot be decoded.
    #[error("Persistence corruption: {message}")]
    PersistenceCorruption { message: String },

    /// Neither the primary nor the fallback catalog list could be fetched.
    #[error("Catalog list unavailable: primary: {primary}; fallback: {fallback}")]
    ListUnavailable {
        primary: FetchError,
        fallback: FetchError,
    },
}

impl SyncError {
    pub fn validation(id: i64, message: impl Into<String>) -> Self {
        Self::Validation {
            id,
            message: message.into(),
        }
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Self::PersistenceCorruption {
            message: message.into(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
