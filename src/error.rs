//! # Error Handling
//!
//! Error taxonomy for the bank synchronization engine. The transport layer
//! classifies outcomes without retrying; retry policy lives in the
//! orchestrator.

use thiserror::Error;
use uuid::Uuid;

use crate::crypto::CryptoError;

/// Classification of a single bank API request outcome.
///
/// Produced by the transport adapter. `Forbidden` is deliberately distinct
/// from `Auth`: a 403 is the upstream firewall rejecting the request shape
/// and is answered with a header rotation, not a re-login.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials or token rejected (HTTP 401)
    #[error("authentication rejected by the bank: {0}")]
    Auth(String),

    /// Firewall/WAF rejection (HTTP 403)
    #[error("request blocked upstream (HTTP 403): {0}")]
    Forbidden(String),

    /// Bank-side fault: HTTP 5xx or an application-level exception payload
    #[error("bank-side failure (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Connect/read timeout or DNS failure
    #[error("network failure: {0}")]
    Network(String),

    /// Response body did not match the documented wire format
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the orchestrator's bounded retry policy applies.
    ///
    /// Auth failures get exactly one forced token refresh instead, and
    /// decode failures are never retried: the same bytes would fail again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Forbidden(_) | ApiError::Server { .. } | ApiError::Network(_)
        )
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Failure of a whole synchronization pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The per-connection gate rejected a concurrent trigger
    #[error("a sync pass is already running for connection {0}")]
    AlreadyRunning(Uuid),

    #[error("connection {0} not found")]
    ConnectionNotFound(Uuid),

    #[error("unknown bank environment '{0}'")]
    UnknownEnvironment(String),

    #[error("invalid API base url '{0}'")]
    InvalidBaseUrl(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("credential handling failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage failure: {0}")]
    Storage(anyhow::Error),
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Storage(err)
    }
}

impl From<sea_orm::DbErr> for SyncError {
    fn from(err: sea_orm::DbErr) -> Self {
        SyncError::Storage(err.into())
    }
}

/// Detect a unique-constraint violation so duplicate inserts can be treated
/// as no-ops rather than errors.
pub fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code = code.as_ref();
        code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code)
    })
}
