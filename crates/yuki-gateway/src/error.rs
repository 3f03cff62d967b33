//! Error types for the yuki-gateway crate.

use thiserror::Error;

/// Errors that can occur while running a gateway session.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The control plane could not be reached within the bounded
    /// startup retries. Fatal: the host should terminate.
    #[error("gateway control plane unreachable: {0}")]
    ControlPlaneUnreachable(String),

    /// An assumption about the remote protocol was violated. Fatal:
    /// continuing risks further corruption.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Transport-level failure (socket open or send).
    #[error("transport error: {0}")]
    Transport(String),

    /// Wire protocol error.
    #[error("protocol error: {0}")]
    Proto(#[from] yuki_proto::ProtoError),
}
