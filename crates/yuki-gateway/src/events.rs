//! Events emitted by the session to the host application.

use yuki_proto::ChannelEvent;

/// Events the host consumes from the session's output channel.
///
/// All connection recovery is invisible here; the host only learns of
/// content, session discontinuity, and the fatal path.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A text/media channel event arrived.
    TextChannel(ChannelEvent),
    /// A system notification arrived.
    System(ChannelEvent),
    /// The server forced a full reconnect; application-level context
    /// should be treated as possibly stale.
    Reset,
    /// The session hit a fatal condition and is about to stop.
    SevereError(String),
}
