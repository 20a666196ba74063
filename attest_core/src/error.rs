//! Error types for the attestation broker.
//!
//! Every request failure falls into one of four kinds. None of them is
//! fatal to the process; each is reported back to the caller as a typed
//! outcome and mapped onto a transport status by [`BrokerError::status`].

use thiserror::Error;

use crate::command::Status;

/// Root error type for the broker core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Wrong argument count, unparsable endpoint, bad address or port.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Attempted creation of a principal or image id that already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A principal, image, object or property lookup found nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An access-control predicate evaluated to deny.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BrokerError {
    /// The transport-neutral status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::MalformedInput(_) | Self::Config(_) => Status::BadRequest,
            Self::Conflict(_) => Status::Conflict,
            Self::NotFound(_) => Status::NotFound,
            Self::Forbidden(_) => Status::Forbidden,
        }
    }

    /// The bare message carried by this error, without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::MalformedInput(msg)
            | Self::Conflict(msg)
            | Self::NotFound(msg)
            | Self::Forbidden(msg)
            | Self::Config(msg) => msg,
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Result alias used throughout the core.
pub type Result<T, E = BrokerError> = std::result::Result<T, E>;
