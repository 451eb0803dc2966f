//! crates/pcas_core/src/ports.rs
//!
//! Defines the service contracts (traits) the portal's stores are written against.
//! These traits form the boundary of the hexagonal architecture, allowing the stores
//! to be independent of the HTTP client and of the storage medium backing the cache.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::ServerEnvelope;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// The `Display` output of every variant is the single human-readable message
/// shown to the user, so stores can keep `error.to_string()` as their error field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// No response was received at all.
    #[error("{0}")]
    Network(String),
    /// The server answered 401, or no credential was available.
    #[error("{0}")]
    Unauthorized(String),
    /// A list of field errors, either from the server or from local input checks.
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),
    /// The server answered with a failure status and a single message.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    /// Input that could not be turned into a request payload.
    #[error("{0}")]
    InvalidInput(String),
    /// The local cache could not be read or written.
    #[error("Local storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// The message used when a request never reached the server.
    pub const NETWORK_MESSAGE: &'static str = "Network error. Please try again.";

    pub fn network() -> Self {
        Self::Network(Self::NETWORK_MESSAGE.to_string())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// The Remote API Gateway.
///
/// Implementations attach the current credential to every request, evict it on a
/// 401 before returning, and normalise every failure into a `PortError` whose
/// message is ready for display. One attempt per call; no retries.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> PortResult<ServerEnvelope>;

    /// Liveness check against `/api/health`.
    async fn health(&self) -> PortResult<()>;
}

/// Durable key/value storage, the equivalent of browser local storage.
///
/// Operations are synchronous; callers treat every failure as non-fatal.
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> PortResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> PortResult<()>;

    fn remove(&self, key: &str) -> PortResult<()>;

    /// Every key currently stored, in no particular order.
    fn keys(&self) -> PortResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_display_joined() {
        let error = PortError::Validation(vec![
            "Email is required".to_string(),
            "Password is too short".to_string(),
        ]);
        assert_eq!(error.to_string(), "Email is required, Password is too short");
    }

    #[test]
    fn rejected_displays_server_message_only() {
        let error = PortError::Rejected {
            status: 500,
            message: "server error".to_string(),
        };
        assert_eq!(error.to_string(), "server error");
    }

    #[test]
    fn network_uses_generic_message() {
        assert_eq!(PortError::network().to_string(), "Network error. Please try again.");
    }
}
