//! Error types for the VNC client library.

use std::io;
use thiserror::Error;

/// Result type for VNC operations.
pub type Result<T> = std::result::Result<T, VncError>;

/// Errors that can occur in VNC client operations.
///
/// Every error is fatal to the operation that produced it; the RFB protocol
/// offers no way to resynchronize a partially-read stream. After an error the
/// connection should be closed.
#[derive(Debug, Error)]
pub enum VncError {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended before a complete protocol field was read.
    #[error("connection closed mid-message")]
    ShortRead,

    /// A self-describing length or field value does not fit the protocol.
    #[error("bad framing: {0}")]
    BadFraming(String),

    /// The server speaks an RFB version this client does not support.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// The server offered no security types and aborted the handshake.
    #[error("server offered no security types: {0}")]
    NoSecurityTypes(String),

    /// None of the configured authentication schemes matched the server's offer.
    #[error("no suitable authentication scheme, server offered {0:?}")]
    NoSuitableAuth(Vec<u8>),

    /// The server rejected the security handshake.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The DES cipher rejected the prepared key.
    #[error("invalid DES key")]
    InvalidKey,

    /// A rectangle arrived with an encoding type that has no registered decoder.
    #[error("unsupported encoding type: {0}")]
    UnsupportedEncoding(i32),

    /// A server message arrived with an id that has no registered reader.
    #[error("unknown server message id: {0}")]
    UnknownServerMessage(u8),

    /// Outgoing cut text contains a character outside Latin-1.
    #[error("character {0:?} is not valid Latin-1")]
    InvalidText(char),

    /// A palette index or color-map update range exceeds the 256-entry map.
    #[error("color map index out of range: {0}")]
    OutOfRange(u32),

    /// PNG serialization of decoded pixel data failed.
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
}
