use std::ops::Range;

use crate::transport::{ResponseHead, TransportError};

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum ActitoError {
    /// An operation that needs a launched SDK ran before `launch` completed.
    #[error("actito is not ready, call launch() first")]
    NotReady,
    /// `launch` ran before `configure`.
    #[error("actito is not configured, call configure() first")]
    NotConfigured,
    /// The application info has not been loaded.
    #[error("application information is unavailable")]
    ApplicationUnavailable,
    /// No device identity has been registered yet.
    #[error("device information is unavailable")]
    DeviceUnavailable,
    /// The application does not have the named service enabled.
    #[error("service '{0}' is not enabled for this application")]
    ServiceUnavailable(String),
    /// Invalid or missing configuration values.
    #[error("configuration error: {0}")]
    Config(String),
    /// Caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Request execution failure.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Response or persisted payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// Local database file could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    /// The database task is no longer running.
    #[error("storage task is closed")]
    StorageClosed,
    /// An in-app message is already on screen.
    #[error("in-app message '{0}' is already being presented")]
    AlreadyPresenting(String),
}

impl ActitoError {
    /// Whether a failed delivery is worth queueing for a later attempt.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(err) => err.is_recoverable(),
            _ => false,
        }
    }
}

/// Failure of a single [`crate::RequestExecutor::perform`] call chain.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Network or request execution error below HTTP.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Response status outside the accepted range.
    #[error("http error {}: expected status in {}..{}", response.status, accepted.start, accepted.end)]
    Validation {
        /// Status line and headers of the rejected response.
        response: ResponseHead,
        /// Raw response body, if any was returned.
        body: Option<Vec<u8>>,
        /// Status codes the executor accepts as success.
        accepted: Range<u16>,
    },
    /// The caller needed a response body and the server sent none.
    #[error("response contained no data")]
    NoResponseData,
    /// Every attempt failed with a retryable error.
    #[error("service inaccessible after {attempts} attempts")]
    Inaccessible {
        /// Total attempts made, including the first.
        attempts: usize,
        /// Error of the final attempt.
        #[source]
        last: Box<NetworkError>,
    },
}

impl NetworkError {
    /// Whether another attempt of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::Validation { response, .. } => {
                let status = response.status.as_u16();
                status == 408 || status == 429 || (500..600).contains(&status)
            }
            Self::NoResponseData | Self::Inaccessible { .. } => false,
        }
    }

    /// Retryable errors plus exhausted retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Inaccessible { .. }) || self.is_retryable()
    }

    /// HTTP status of a validation failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { response, .. } => Some(response.status.as_u16()),
            Self::Inaccessible { last, .. } => last.status(),
            _ => None,
        }
    }
}
