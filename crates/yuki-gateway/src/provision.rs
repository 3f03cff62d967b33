//! Endpoint provisioning collaborator seam.
//!
//! A fresh gateway URL must be obtained over HTTP before each socket
//! open; the `fromDisconnect` flag selects fresh-session versus resume
//! semantics server-side.

use std::future::Future;

use thiserror::Error;

/// Parameters for an endpoint provisioning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    /// Whether to negotiate payload compression.
    pub compress: bool,
    /// Whether this request resumes an existing session.
    pub from_disconnect: bool,
    /// Last processed sequence number; meaningful when resuming.
    pub last_sn: u64,
    /// Session identifier to resume onto; meaningful when resuming.
    pub session_id: String,
}

impl GatewayRequest {
    /// Build a fresh-session request.
    #[must_use]
    pub fn fresh(compress: bool) -> Self {
        Self {
            compress,
            from_disconnect: false,
            last_sn: 0,
            session_id: String::new(),
        }
    }

    /// Build a resume request for an existing session.
    #[must_use]
    pub fn resume(compress: bool, last_sn: u64, session_id: impl Into<String>) -> Self {
        Self {
            compress,
            from_disconnect: true,
            last_sn,
            session_id: session_id.into(),
        }
    }
}

/// A provisioned connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    /// URL to open the event-stream socket against.
    pub url: String,
}

/// Failures of an endpoint provisioning request.
///
/// Transient and rate-limited failures are retried by the session
/// according to its current tier; protocol violations are fatal.
#[derive(Debug, Clone, Error)]
pub enum ProvisionError {
    /// Network failure or structured error response; retryable.
    #[error("transient provisioning failure: {0}")]
    Transient(String),

    /// Locally or globally rate limited; retryable.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// An assumption about the remote protocol broke; fatal.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl ProvisionError {
    /// Whether this failure must terminate the session.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// The endpoint provisioning service consumed by the session.
///
/// Implemented over HTTP in production ([`crate::RestProvisioner`])
/// and by mocks in tests.
pub trait Provisioner: Send + Sync + 'static {
    /// Request a connection endpoint.
    fn open_gateway(
        &self,
        request: GatewayRequest,
    ) -> impl Future<Output = Result<GatewayEndpoint, ProvisionError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_request_has_no_resume_parameters() {
        let request = GatewayRequest::fresh(true);
        assert!(request.compress);
        assert!(!request.from_disconnect);
        assert_eq!(request.last_sn, 0);
        assert!(request.session_id.is_empty());
    }

    #[test]
    fn test_resume_request_carries_continuity() {
        let request = GatewayRequest::resume(true, 42, "sess-1");
        assert!(request.from_disconnect);
        assert_eq!(request.last_sn, 42);
        assert_eq!(request.session_id, "sess-1");
    }

    #[test]
    fn test_only_protocol_errors_are_fatal() {
        assert!(!ProvisionError::Transient("net down".into()).is_fatal());
        assert!(!ProvisionError::RateLimited("bucket low".into()).is_fatal());
        assert!(ProvisionError::Protocol("bucket mismatch".into()).is_fatal());
    }
}
