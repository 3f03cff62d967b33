//! Sequence and session tracking for resumption.

/// Tracks the last processed event sequence number and the session
/// identifier, the two values a resume request is built from.
///
/// Owned exclusively by the session actor; mutated only on the
/// event-handling and reconnect paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceTracker {
    last_sn: u64,
    session_id: String,
}

impl SequenceTracker {
    /// Create a fresh tracker (sequence 0, no session).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed event sequence number. Forward-only: a
    /// smaller value than the current one is ignored.
    pub fn observe(&mut self, sn: u64) {
        if sn > self.last_sn {
            self.last_sn = sn;
        }
    }

    /// The last processed sequence number.
    #[must_use]
    pub fn last_sn(&self) -> u64 {
        self.last_sn
    }

    /// The current session identifier, empty when no session exists.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record the session identifier from a handshake result or
    /// resume acknowledgement.
    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = session_id.into();
    }

    /// Wipe all continuity. Only the server-initiated reconnect
    /// instruction triggers this.
    pub fn reset(&mut self) {
        self.last_sn = 0;
        self.session_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_is_monotonic() {
        let mut tracker = SequenceTracker::new();
        for sn in [1, 5, 3, 7, 2, 7] {
            tracker.observe(sn);
        }
        assert_eq!(tracker.last_sn(), 7);
    }

    #[test]
    fn test_observe_never_decreases() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(100);
        tracker.observe(10);
        assert_eq!(tracker.last_sn(), 100);
    }

    #[test]
    fn test_reset_wipes_continuity() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(42);
        tracker.set_session_id("sess-1");

        tracker.reset();

        assert_eq!(tracker.last_sn(), 0);
        assert!(tracker.session_id().is_empty());
    }

    #[test]
    fn test_session_id_updates() {
        let mut tracker = SequenceTracker::new();
        assert!(tracker.session_id().is_empty());

        tracker.set_session_id("sess-1");
        assert_eq!(tracker.session_id(), "sess-1");

        tracker.set_session_id("sess-2");
        assert_eq!(tracker.session_id(), "sess-2");
    }
}
