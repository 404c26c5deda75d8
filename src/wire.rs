// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Low-level wire codec for the RFB protocol.
//!
//! All multi-byte integers on the wire are network byte order (big-endian),
//! which is what Tokio's `read_u16`/`read_u32`/`read_i32` produce. This module
//! wraps those primitives so that an end-of-stream in the middle of a field
//! surfaces as [`VncError::ShortRead`] rather than a bare I/O error, and adds
//! the length-prefixed string format used by error reasons, desktop names and
//! cut text.

use crate::error::{Result, VncError};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// Read half of the connection's byte-stream transport.
pub type StreamReader<'a> = dyn AsyncRead + Unpin + Send + 'a;

/// Write half of the connection's byte-stream transport.
pub type StreamWriter<'a> = dyn AsyncWrite + Unpin + Send + 'a;

/// Upper bound on any self-describing string length.
///
/// RFB strings (error reasons, desktop names, cut text) carry a u32 byte
/// length. A stream has no "remaining data" to validate against, so lengths
/// beyond this cap are treated as framing corruption.
pub const MAX_STRING_LEN: u32 = 1 << 20;

fn map_eof(err: io::Error) -> VncError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        VncError::ShortRead
    } else {
        VncError::Io(err)
    }
}

/// Reads a single byte.
pub async fn read_u8(reader: &mut StreamReader<'_>) -> Result<u8> {
    reader.read_u8().await.map_err(map_eof)
}

/// Reads a big-endian u16.
pub async fn read_u16(reader: &mut StreamReader<'_>) -> Result<u16> {
    reader.read_u16().await.map_err(map_eof)
}

/// Reads a big-endian u32.
pub async fn read_u32(reader: &mut StreamReader<'_>) -> Result<u32> {
    reader.read_u32().await.map_err(map_eof)
}

/// Reads a big-endian i32.
pub async fn read_i32(reader: &mut StreamReader<'_>) -> Result<i32> {
    reader.read_i32().await.map_err(map_eof)
}

/// Reads exactly `n` bytes into a fresh buffer.
pub async fn read_exact_vec(reader: &mut StreamReader<'_>, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    reader.read_exact(&mut buf).await.map_err(map_eof)?;
    Ok(buf)
}

/// Consumes `n` padding bytes.
///
/// RFB layouts include explicit padding that is neither zero-checked nor
/// meaningful; it only has to be consumed at the documented offsets.
pub async fn skip_padding(reader: &mut StreamReader<'_>, n: usize) -> Result<()> {
    let mut buf = [0u8; 4];
    debug_assert!(n <= buf.len());
    reader.read_exact(&mut buf[..n]).await.map_err(map_eof)?;
    Ok(())
}

/// Reads a u32-length-prefixed Latin-1 string.
///
/// # Errors
///
/// Returns [`VncError::BadFraming`] when the declared length exceeds
/// [`MAX_STRING_LEN`], [`VncError::ShortRead`] when the stream ends early.
pub async fn read_u32_string(reader: &mut StreamReader<'_>) -> Result<String> {
    let len = read_u32(reader).await?;
    if len > MAX_STRING_LEN {
        return Err(VncError::BadFraming(format!(
            "string length {len} exceeds limit {MAX_STRING_LEN}"
        )));
    }
    let bytes = read_exact_vec(reader, len as usize).await?;
    Ok(latin1_to_string(&bytes))
}

/// Decodes Latin-1 (ISO 8859-1) bytes, where every byte value maps directly
/// to the Unicode code point of the same value.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encodes a string as Latin-1 bytes.
///
/// # Errors
///
/// Returns [`VncError::InvalidText`] on the first character above `U+00FF`.
/// Nothing is produced in that case, so callers can validate before any
/// bytes reach the wire.
pub fn string_to_latin1(text: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let code = u32::from(ch);
        if code > 0xFF {
            return Err(VncError::InvalidText(ch));
        }
        bytes.push(code as u8);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scalar_reads_are_big_endian() {
        let mut data: &[u8] = &[0x12, 0x34, 0x00, 0x00, 0x00, 0x2A, 0xFF, 0xFF, 0xFF, 0x21];
        assert_eq!(read_u16(&mut data).await.unwrap(), 0x1234);
        assert_eq!(read_u32(&mut data).await.unwrap(), 42);
        assert_eq!(read_i32(&mut data).await.unwrap(), -223);
    }

    #[tokio::test]
    async fn test_short_read_on_eof() {
        let mut data: &[u8] = &[0x12];
        assert!(matches!(
            read_u32(&mut data).await,
            Err(VncError::ShortRead)
        ));
    }

    #[tokio::test]
    async fn test_read_u32_string() {
        let mut data: &[u8] = &[0, 0, 0, 2, b'h', b'i'];
        assert_eq!(read_u32_string(&mut data).await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_oversized_string_is_bad_framing() {
        let mut data: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            read_u32_string(&mut data).await,
            Err(VncError::BadFraming(_))
        ));
    }

    #[test]
    fn test_latin1_round_trip() {
        let text = "caf\u{E9}"; // é is Latin-1 0xE9
        let bytes = string_to_latin1(text).unwrap();
        assert_eq!(bytes, b"caf\xE9");
        assert_eq!(latin1_to_string(&bytes), text);
    }

    #[test]
    fn test_non_latin1_rejected() {
        match string_to_latin1("\u{100}") {
            Err(VncError::InvalidText(ch)) => assert_eq!(ch, '\u{100}'),
            other => panic!("expected InvalidText, got {other:?}"),
        }
    }
}
