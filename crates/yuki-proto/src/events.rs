//! Domain event payloads carried by Event envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The numeric event type carried in an event payload's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum EventKind {
    /// Plain text message.
    Text,
    /// Image attachment.
    Image,
    /// Video attachment.
    Video,
    /// File attachment.
    File,
    /// Audio attachment.
    Audio,
    /// Markdown-formatted message.
    Markdown,
    /// Card message.
    Card,
    /// System notification (member joined, channel updated, ...).
    System,
    /// Unrecognized event type, kept verbatim.
    Other(u16),
}

impl From<u16> for EventKind {
    fn from(value: u16) -> Self {
        match value {
            1 => Self::Text,
            2 => Self::Image,
            3 => Self::Video,
            4 => Self::File,
            8 => Self::Audio,
            9 => Self::Markdown,
            10 => Self::Card,
            255 => Self::System,
            other => Self::Other(other),
        }
    }
}

impl From<EventKind> for u16 {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Text => 1,
            EventKind::Image => 2,
            EventKind::Video => 3,
            EventKind::File => 4,
            EventKind::Audio => 8,
            EventKind::Markdown => 9,
            EventKind::Card => 10,
            EventKind::System => 255,
            EventKind::Other(other) => other,
        }
    }
}

/// A decoded domain event.
///
/// Fields beyond the discriminating ones are platform metadata the
/// host handlers consume; they are kept lenient so unknown server
/// additions never break dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    /// Channel classification reported by the server ("GROUP",
    /// "PERSON", "BROADCAST").
    #[serde(default)]
    pub channel_type: String,
    /// Event type.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Channel (or user, for direct messages) the event targets.
    #[serde(default)]
    pub target_id: String,
    /// User that authored the event.
    #[serde(default)]
    pub author_id: String,
    /// Raw message content.
    #[serde(default)]
    pub content: String,
    /// Server-assigned message identifier.
    #[serde(default)]
    pub msg_id: String,
    /// Server timestamp, milliseconds.
    #[serde(default)]
    pub msg_timestamp: u64,
    /// Kind-specific extra data, passed through untyped.
    #[serde(default)]
    pub extra: Value,
}

impl ChannelEvent {
    /// Whether this is a system notification rather than channel
    /// content.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.kind == EventKind::System
    }
}
