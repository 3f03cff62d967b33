//! # yuki-gateway
//!
//! The gateway session core for the yuki bot: establishes, maintains,
//! and recovers the persistent event-stream connection to the chat
//! platform. Covers endpoint provisioning with rate-limit awareness,
//! the WebSocket transport wrapper, heartbeat liveness supervision,
//! multi-tier retry/backoff, and session resumption with
//! at-most-one-loss sequencing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod demux;
pub mod error;
pub mod events;
pub mod provision;
pub mod rest;
pub mod session;
pub mod socket;
pub mod state;
pub mod tracker;

pub use backoff::BackoffConfig;
pub use error::GatewayError;
pub use events::SessionEvent;
pub use provision::{GatewayEndpoint, GatewayRequest, ProvisionError, Provisioner};
pub use rest::{RateLimitIndication, RequestGate, RestProvisioner};
pub use session::{GatewaySession, SessionConfig, SessionHandle};
pub use socket::{SocketHandle, Transport, WebSocketTransport};
pub use state::{AtomicSessionState, SessionState};
pub use tracker::SequenceTracker;
