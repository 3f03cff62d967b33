//! Session state types.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// State of the gateway session. Exactly one is active at a time for
/// the single connection the bot maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Requesting a fresh connection endpoint (first startup attempt).
    OpeningGateway,
    /// First bounded retry of the startup endpoint request.
    OpeningGatewayFirstRetry,
    /// Last bounded retry of the startup endpoint request; failure
    /// here is fatal.
    OpeningGatewayLastRetry,
    /// Re-provisioning after a live session was lost; retried with
    /// unbounded exponential backoff, never fatal.
    OpeningGatewayAfterDisconnect,
    /// Socket opened, waiting for the handshake-result envelope.
    WaitingForHandshake,
    /// Steady state: heartbeats flowing, events being consumed.
    Connected,
    /// Heartbeat sent, waiting for the reply.
    WaitingForPong,
    /// First heartbeat timeout: extra probes scheduled.
    WaitingForPongFirstRetry,
    /// Heartbeat retries exhausted: resume requests scheduled.
    WaitingForPongLastRetry,
    /// Resume requests sent, waiting for the acknowledgement.
    WaitingForResumeOk,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpeningGateway => "opening-gateway",
            Self::OpeningGatewayFirstRetry => "opening-gateway-1st-retry",
            Self::OpeningGatewayLastRetry => "opening-gateway-last-retry",
            Self::OpeningGatewayAfterDisconnect => "opening-gateway-after-disconnect",
            Self::WaitingForHandshake => "waiting-for-handshake",
            Self::Connected => "connected",
            Self::WaitingForPong => "waiting-for-pong",
            Self::WaitingForPongFirstRetry => "waiting-for-pong-1st-retry",
            Self::WaitingForPongLastRetry => "waiting-for-pong-last-retry",
            Self::WaitingForResumeOk => "waiting-for-resume-ok",
        };
        f.write_str(name)
    }
}

impl SessionState {
    const fn as_u32(self) -> u32 {
        match self {
            Self::OpeningGateway => 0,
            Self::OpeningGatewayFirstRetry => 1,
            Self::OpeningGatewayLastRetry => 2,
            Self::OpeningGatewayAfterDisconnect => 3,
            Self::WaitingForHandshake => 4,
            Self::Connected => 5,
            Self::WaitingForPong => 6,
            Self::WaitingForPongFirstRetry => 7,
            Self::WaitingForPongLastRetry => 8,
            Self::WaitingForResumeOk => 9,
        }
    }

    const fn from_u32(raw: u32) -> Self {
        match raw {
            0 => Self::OpeningGateway,
            1 => Self::OpeningGatewayFirstRetry,
            2 => Self::OpeningGatewayLastRetry,
            3 => Self::OpeningGatewayAfterDisconnect,
            4 => Self::WaitingForHandshake,
            5 => Self::Connected,
            6 => Self::WaitingForPong,
            7 => Self::WaitingForPongFirstRetry,
            8 => Self::WaitingForPongLastRetry,
            _ => Self::WaitingForResumeOk,
        }
    }
}

/// Atomic wrapper for session state, used as a read-only mirror for
/// the host and for tests. Written only by the session actor.
#[derive(Debug)]
pub struct AtomicSessionState(AtomicU32);

impl AtomicSessionState {
    /// Create a new atomic state.
    #[must_use]
    pub const fn new(state: SessionState) -> Self {
        Self(AtomicU32::new(state.as_u32()))
    }

    /// Load the current state.
    #[must_use]
    pub fn load(&self) -> SessionState {
        SessionState::from_u32(self.0.load(Ordering::SeqCst))
    }

    /// Store a new state.
    pub fn store(&self, state: SessionState) {
        self.0.store(state.as_u32(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_u32_roundtrip() {
        let all = [
            SessionState::OpeningGateway,
            SessionState::OpeningGatewayFirstRetry,
            SessionState::OpeningGatewayLastRetry,
            SessionState::OpeningGatewayAfterDisconnect,
            SessionState::WaitingForHandshake,
            SessionState::Connected,
            SessionState::WaitingForPong,
            SessionState::WaitingForPongFirstRetry,
            SessionState::WaitingForPongLastRetry,
            SessionState::WaitingForResumeOk,
        ];
        for state in all {
            assert_eq!(SessionState::from_u32(state.as_u32()), state);
        }
    }

    #[test]
    fn test_atomic_session_state() {
        let state = AtomicSessionState::new(SessionState::OpeningGateway);
        assert_eq!(state.load(), SessionState::OpeningGateway);

        state.store(SessionState::Connected);
        assert_eq!(state.load(), SessionState::Connected);

        state.store(SessionState::WaitingForResumeOk);
        assert_eq!(state.load(), SessionState::WaitingForResumeOk);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Connected.to_string(), "connected");
        assert_eq!(
            SessionState::OpeningGatewayAfterDisconnect.to_string(),
            "opening-gateway-after-disconnect"
        );
    }
}
