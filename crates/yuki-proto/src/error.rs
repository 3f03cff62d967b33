//! Error types for the yuki-proto crate.

use thiserror::Error;

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to encode an envelope.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Failed to decode an envelope.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Failed to inflate a compressed frame.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Unknown envelope kind discriminant.
    #[error("unknown envelope kind: {0}")]
    UnknownKind(u8),
}
