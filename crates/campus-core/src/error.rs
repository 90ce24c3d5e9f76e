//! Error types for Campus operations.
//!
//! Every variant is a normal, recoverable outcome of one request. Callers
//! map them onto whatever their transport presents to users.

use thiserror::Error;

use crate::db::DatabaseError;

/// Result type alias using Campus Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No matching entity.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Burst cap of OTP issuances reached; blocked until the lockout ends.
    #[error("Too many OTP requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    /// Cooldown between two OTP issuances has not elapsed.
    #[error("OTP was sent recently, retry in {retry_after_secs}s")]
    ResendTooSoon { retry_after_secs: i64 },

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Verification code has expired")]
    Expired,

    /// Actor lacks rights over the target entity.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bootcamp is not open for registration")]
    NotOpenForRegistration,

    #[error("Already registered for this bootcamp")]
    AlreadyRegistered,

    /// Notification collaborator failed. State written before the send is kept.
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Invoice is already paid")]
    AlreadyPaid,

    #[error("Post is already liked")]
    AlreadyLiked,

    #[error("Invalid {entity} transition from {from} on {event}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        event: String,
    },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Token error: {0}")]
    Token(String),

    /// Password hashing or verification failed for a reason other than a mismatch.
    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DatabaseError> for Error {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            DatabaseError::Conflict(what) => Self::Conflict(what),
            other => Self::Database(other.to_string()),
        }
    }
}
