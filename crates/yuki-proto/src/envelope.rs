//! The signalling envelope and its wire codec.
//!
//! Every frame exchanged with the gateway is one envelope:
//! `{"s": <kind>, "sn": <sequence?>, "d": <payload>}`. Inbound frames
//! may additionally be deflate-compressed when compression was
//! negotiated at provisioning time.

use std::io::Read;

use flate2::read::ZlibDecoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtoError;

/// The kind discriminant of an envelope, as it appears in the `s` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EnvelopeKind {
    /// A domain event (carries a sequence number).
    Event,
    /// Handshake result, first envelope after the socket opens.
    HandshakeResult,
    /// Heartbeat probe.
    Ping,
    /// Heartbeat reply.
    Pong,
    /// Resume request (client asks the server to replay events).
    Resume,
    /// Server instruction to drop all session continuity and restart.
    Reconnect,
    /// Server acknowledgement of a resume request.
    ResumeAck,
}

impl TryFrom<u8> for EnvelopeKind {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Event),
            1 => Ok(Self::HandshakeResult),
            2 => Ok(Self::Ping),
            3 => Ok(Self::Pong),
            4 => Ok(Self::Resume),
            5 => Ok(Self::Reconnect),
            6 => Ok(Self::ResumeAck),
            other => Err(ProtoError::UnknownKind(other)),
        }
    }
}

impl From<EnvelopeKind> for u8 {
    fn from(kind: EnvelopeKind) -> Self {
        match kind {
            EnvelopeKind::Event => 0,
            EnvelopeKind::HandshakeResult => 1,
            EnvelopeKind::Ping => 2,
            EnvelopeKind::Pong => 3,
            EnvelopeKind::Resume => 4,
            EnvelopeKind::Reconnect => 5,
            EnvelopeKind::ResumeAck => 6,
        }
    }
}

/// A signalling envelope.
///
/// Immutable once constructed; built on send or parsed on receive,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope kind.
    #[serde(rename = "s")]
    pub kind: EnvelopeKind,
    /// Sequence number. Present on Event envelopes and on outbound
    /// Ping/Resume envelopes.
    #[serde(rename = "sn", skip_serializing_if = "Option::is_none", default)]
    pub sn: Option<u64>,
    /// Kind-specific payload.
    #[serde(rename = "d", default)]
    pub payload: Value,
}

impl Envelope {
    /// Build an outbound heartbeat carrying the last processed sequence
    /// number.
    #[must_use]
    pub fn ping(sn: u64) -> Self {
        Self {
            kind: EnvelopeKind::Ping,
            sn: Some(sn),
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Build an outbound probe reply.
    #[must_use]
    pub fn pong() -> Self {
        Self {
            kind: EnvelopeKind::Pong,
            sn: None,
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Build an outbound resume request carrying the last processed
    /// sequence number.
    #[must_use]
    pub fn resume(sn: u64) -> Self {
        Self {
            kind: EnvelopeKind::Resume,
            sn: Some(sn),
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Build an Event envelope.
    #[must_use]
    pub fn event(sn: u64, payload: Value) -> Self {
        Self {
            kind: EnvelopeKind::Event,
            sn: Some(sn),
            payload,
        }
    }

    /// Build a handshake-result envelope for the given session.
    #[must_use]
    pub fn handshake_result(session_id: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::HandshakeResult,
            sn: None,
            payload: serde_json::json!({ "session_id": session_id.into() }),
        }
    }

    /// Build a server reconnect instruction.
    #[must_use]
    pub fn reconnect() -> Self {
        Self {
            kind: EnvelopeKind::Reconnect,
            sn: None,
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Build a resume acknowledgement for the given session.
    #[must_use]
    pub fn resume_ack(session_id: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::ResumeAck,
            sn: None,
            payload: serde_json::json!({ "session_id": session_id.into() }),
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn encode(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encoding(e.to_string()))
    }

    /// Parse an inbound frame.
    ///
    /// When `compressed` is set the frame is inflated (zlib) before
    /// parsing. A failure here indicates a protocol violation by the
    /// sender and is propagated to the caller to log and drop.
    pub fn decode(raw: &[u8], compressed: bool) -> Result<Self, ProtoError> {
        if compressed {
            let mut decoder = ZlibDecoder::new(raw);
            let mut inflated = Vec::new();
            decoder
                .read_to_end(&mut inflated)
                .map_err(|e| ProtoError::Decompression(e.to_string()))?;
            serde_json::from_slice(&inflated).map_err(|e| ProtoError::Decoding(e.to_string()))
        } else {
            serde_json::from_slice(raw).map_err(|e| ProtoError::Decoding(e.to_string()))
        }
    }
}

/// Payload of a `HandshakeResult` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakePayload {
    /// Session identifier assigned by the server.
    pub session_id: String,
}

/// Payload of a `ResumeAck` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeAckPayload {
    /// Session identifier the resume re-attached to.
    pub session_id: String,
}
