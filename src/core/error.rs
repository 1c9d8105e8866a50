//! Core error types.

use std::fmt;

use crate::config::ConfigError;

/// Errors raised while discovering and applying resource limits.
#[derive(Debug)]
pub enum Error {
    /// Configuration rejected during validation. Fatal: the component never starts.
    InvalidConfig(String),

    /// The cgroup hierarchy, the process's group or one of its limit files
    /// could not be used. Recoverable: tuning for that dimension is skipped.
    ResourceUnavailable {
        resource: String,
        reason: String,
    },

    /// The ECS metadata endpoint could not be queried. Recoverable: the
    /// orchestrator fallback is skipped.
    MetadataUnavailable(String),

    /// Operation not permitted in the component's current lifecycle state.
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

impl Error {
    /// Shorthand for [`Error::ResourceUnavailable`].
    pub fn resource(resource: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::ResourceUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure only disables tuning for one dimension.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ResourceUnavailable { .. } | Error::MetadataUnavailable(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            Error::ResourceUnavailable { resource, reason } => {
                write!(f, "resource unavailable: {}: {}", resource, reason)
            }
            Error::MetadataUnavailable(msg) => write!(f, "metadata unavailable: {}", msg),
            Error::InvalidState { operation, state } => {
                write!(f, "cannot {} while {}", operation, state)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::MetadataUnavailable(format!("request timed out: {}", e))
        } else if e.is_decode() {
            Error::MetadataUnavailable(format!("malformed response: {}", e))
        } else {
            Error::MetadataUnavailable(e.to_string())
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
