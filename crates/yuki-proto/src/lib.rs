//! # yuki-proto
//!
//! Wire protocol definitions for the yuki gateway connection: the
//! signalling envelope, its JSON codec with optional deflate payload
//! compression, and the domain event payloads carried by Event
//! envelopes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod events;

pub use envelope::{Envelope, EnvelopeKind, HandshakePayload, ResumeAckPayload};
pub use error::ProtoError;
pub use events::{ChannelEvent, EventKind};
