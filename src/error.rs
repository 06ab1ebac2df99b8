use std::time::Duration;

use redis::{ErrorKind, RedisError};
use serde::Serialize;
use thiserror::Error;

// ─── Classification ──────────────────────────────────────────────

/// Stable category of a check failure, used by callers to decide alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    AuthRequired,
    InvalidCredentials,
    PermissionDenied,
    Transport,
    Command,
    Config,
}

/// A classified check failure.
///
/// The message always starts with a fixed prefix per class followed by the
/// server (or client) detail, so text matching on e.g. `wrongpass` or
/// `authentication required` keeps working.
#[derive(Error, Debug, Clone)]
pub enum CheckError {
    #[error("authentication required: {0}")]
    AuthRequired(String),

    #[error("invalid password: {0}")]
    InvalidCredentials(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("command failed: {0}")]
    Command(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CheckError>;

impl CheckError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AuthRequired(_) => ErrorClass::AuthRequired,
            Self::InvalidCredentials(_) => ErrorClass::InvalidCredentials,
            Self::PermissionDenied(_) => ErrorClass::PermissionDenied,
            Self::Transport(_) => ErrorClass::Transport,
            Self::Command(_) => ErrorClass::Command,
            Self::Config(_) => ErrorClass::Config,
        }
    }

    /// Errors an optional sub-collection may swallow. Everything else ends
    /// the check.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::Command(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthRequired(_) | Self::InvalidCredentials(_))
    }

    pub fn timed_out(what: &str, after: Duration) -> Self {
        Self::Transport(format!("timed out after {after:?} waiting for {what}"))
    }
}

impl From<RedisError> for CheckError {
    fn from(err: RedisError) -> Self {
        let message = err.to_string();
        match classify(&err) {
            ErrorClass::AuthRequired => Self::AuthRequired(message),
            ErrorClass::InvalidCredentials => Self::InvalidCredentials(message),
            ErrorClass::PermissionDenied => Self::PermissionDenied(message),
            ErrorClass::Transport => Self::Transport(message),
            ErrorClass::Command | ErrorClass::Config => Self::Command(message),
        }
    }
}

/// Map a client error or server error reply onto an [`ErrorClass`].
///
/// Error codes are checked first, message text second: older servers answer
/// `ERR invalid password` / `ERR operation not permitted` instead of the
/// dedicated codes.
pub fn classify(err: &RedisError) -> ErrorClass {
    if err.is_timeout()
        || err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
    {
        return ErrorClass::Transport;
    }

    let code = err.code().unwrap_or_default().to_ascii_uppercase();
    let text = err.to_string().to_lowercase();

    if code == "NOAUTH"
        || text.contains("authentication required")
        || text.contains("operation not permitted")
    {
        return ErrorClass::AuthRequired;
    }

    if code == "WRONGPASS"
        || err.kind() == ErrorKind::AuthenticationFailed
        || text.contains("invalid password")
        || text.contains("wrongpass")
        || text.contains("invalid username-password")
    {
        return ErrorClass::InvalidCredentials;
    }

    if code == "NOPERM" || text.contains("no permissions") {
        return ErrorClass::PermissionDenied;
    }

    ErrorClass::Command
}
