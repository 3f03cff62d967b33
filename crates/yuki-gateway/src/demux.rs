//! Inbound event routing.

use tracing::warn;
use yuki_proto::{ChannelEvent, Envelope};

use crate::events::SessionEvent;

/// Route an Event envelope to a host-facing event.
///
/// Returns the sequence number to record alongside the routed event.
/// Envelopes without a sequence number or with an undecodable payload
/// are dropped with a log line and never feed the sequence tracker.
#[must_use]
pub fn route_event(envelope: &Envelope) -> Option<(u64, SessionEvent)> {
    let Some(sn) = envelope.sn else {
        warn!("event envelope without sequence number, dropping");
        return None;
    };
    let event: ChannelEvent = match serde_json::from_value(envelope.payload.clone()) {
        Ok(event) => event,
        Err(error) => {
            warn!(sn, %error, "undecodable event payload, dropping");
            return None;
        }
    };
    let routed = if event.is_system() {
        SessionEvent::System(event)
    } else {
        SessionEvent::TextChannel(event)
    };
    Some((sn, routed))
}
