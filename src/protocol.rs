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

//! VNC Remote Framebuffer (RFB) protocol constants and structures.
//!
//! This module provides the fundamental building blocks for VNC protocol
//! communication, including protocol version negotiation, message types,
//! security handshakes, encodings, and pixel format definitions. It implements
//! the RFB protocol as specified in RFC 6143.
//!
//! # Protocol Overview
//!
//! An RFB client session passes through the following phases:
//! 1. **Protocol Version** - Server and client agree on protocol version
//! 2. **Security Handshake** - Authentication method selection and execution
//! 3. **Initialization** - Exchange of framebuffer parameters and capabilities
//! 4. **Normal Operation** - Ongoing message exchange for input events and screen updates

use crate::encoding::RectData;
use crate::error::{Result, VncError};
use bytes::{Buf, BufMut, BytesMut};
use std::io;

/// RFB protocol version 3.3 token.
pub const PROTOCOL_VERSION_3_3: &str = "RFB 003.003\n";

/// RFB protocol version 3.7 token.
pub const PROTOCOL_VERSION_3_7: &str = "RFB 003.007\n";

/// RFB protocol version 3.8 token.
///
/// The newest version this client implements. Servers reporting anything
/// higher are negotiated down to 3.8. The version string must be exactly
/// 12 bytes including the newline character as specified by the RFB protocol.
pub const PROTOCOL_VERSION_3_8: &str = "RFB 003.008\n";

// Client-to-Server Message Types

/// Message type: Client requests to change the pixel format.
///
/// This message allows the client to specify its preferred pixel format
/// for receiving framebuffer updates.
pub const CLIENT_MSG_SET_PIXEL_FORMAT: u8 = 0;

/// Message type: Client specifies supported encodings.
///
/// The client sends a list of encoding types it supports, ordered by
/// preference. The server will use the first mutually supported encoding.
pub const CLIENT_MSG_SET_ENCODINGS: u8 = 2;

/// Message type: Client requests a framebuffer update.
///
/// The client can request either an incremental update (changes only) or
/// a full refresh of a specified rectangular region.
pub const CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;

/// Message type: Client sends a keyboard event.
///
/// Contains information about a key press or release event, including
/// the key symbol and the press/release state.
pub const CLIENT_MSG_KEY_EVENT: u8 = 4;

/// Message type: Client sends a pointer (mouse) event.
///
/// Contains the current pointer position and button state.
pub const CLIENT_MSG_POINTER_EVENT: u8 = 5;

/// Message type: Client sends cut text (clipboard data).
///
/// Allows the client to transfer clipboard contents to the server.
pub const CLIENT_MSG_CLIENT_CUT_TEXT: u8 = 6;

// Server-to-Client Message Types

/// Message type: Server sends a framebuffer update.
///
/// Contains one or more rectangles of pixel data representing screen changes.
/// This is the primary message for transmitting visual updates to the client.
pub const SERVER_MSG_FRAMEBUFFER_UPDATE: u8 = 0;

/// Message type: Server sets colour map entries.
///
/// Used for indexed color modes to define the color palette.
pub const SERVER_MSG_SET_COLOUR_MAP_ENTRIES: u8 = 1;

/// Message type: Server sends a bell (beep) notification.
///
/// Signals the client to produce an audible or visual alert.
pub const SERVER_MSG_BELL: u8 = 2;

/// Message type: Server sends cut text (clipboard data).
///
/// Allows the server to transfer clipboard contents to the client.
pub const SERVER_MSG_SERVER_CUT_TEXT: u8 = 3;

// Encoding Types

/// Encoding type: Raw pixel data.
///
/// The simplest encoding that sends uncompressed pixel data directly.
/// High bandwidth but universally supported; every client must decode it.
pub const ENCODING_RAW: i32 = 0;

/// Encoding type: Copy Rectangle.
///
/// Instructs the client to copy a rectangular region from one location
/// to another on the screen. Highly efficient for scrolling operations.
pub const ENCODING_COPYRECT: i32 = 1;

/// Encoding type: Hextile.
///
/// Divides rectangles into 16x16 tiles for efficient encoding.
pub const ENCODING_HEXTILE: i32 = 5;

/// Encoding type: Tight.
///
/// A highly efficient encoding using JPEG compression for gradient content
/// and other compression methods for different types of screen content.
/// Recognized only when a caller registers a decoder for it.
pub const ENCODING_TIGHT: i32 = 7;

/// Encoding type: `TightPng`.
///
/// Like Tight encoding but uses PNG compression instead of JPEG.
/// Recognized only when a caller registers a decoder for it.
pub const ENCODING_TIGHTPNG: i32 = -260;

/// Pseudo-encoding: Rich Cursor.
///
/// Allows the server to send cursor shape and hotspot information.
pub const ENCODING_CURSOR: i32 = -239;

/// Pseudo-encoding: Desktop Size.
///
/// Notifies the client of framebuffer dimension changes.
pub const ENCODING_DESKTOP_SIZE: i32 = -223;

/// Pseudo-encoding: Continuous Updates.
///
/// Advertises support for the `ContinuousUpdates` extension. Recognized only
/// when a caller registers a decoder for it.
pub const ENCODING_CONTINUOUS_UPDATES: i32 = -313;

// Hextile subencoding flags

/// Hextile: Raw pixel data for this tile.
pub const HEXTILE_RAW: u8 = 1 << 0;

/// Hextile: Background color is specified.
pub const HEXTILE_BACKGROUND_SPECIFIED: u8 = 1 << 1;

/// Hextile: Foreground color is specified.
pub const HEXTILE_FOREGROUND_SPECIFIED: u8 = 1 << 2;

/// Hextile: Tile contains subrectangles.
pub const HEXTILE_ANY_SUBRECTS: u8 = 1 << 3;

/// Hextile: Subrectangles are colored (not monochrome).
pub const HEXTILE_SUBRECTS_COLOURED: u8 = 1 << 4;

// Security Types

/// Security type: Invalid/Unknown.
///
/// Sent by the server in place of a type list to signal a failed connection.
pub const SECURITY_TYPE_INVALID: u8 = 0;

/// Security type: None (no authentication).
///
/// No authentication is required. The connection proceeds directly
/// to the initialization phase.
pub const SECURITY_TYPE_NONE: u8 = 1;

/// Security type: VNC Authentication.
///
/// Standard VNC authentication using DES-encrypted challenge-response.
/// The server sends a 16-byte challenge, which the client encrypts with
/// the password and returns.
pub const SECURITY_TYPE_VNC_AUTH: u8 = 2;

// Security Results

/// Security result: Authentication successful.
pub const SECURITY_RESULT_OK: u32 = 0;

/// Security result: Authentication failed.
pub const SECURITY_RESULT_FAILED: u32 = 1;

/// Security result: Authentication failed, too many attempts.
pub const SECURITY_RESULT_TOO_MANY: u32 = 2;

/// A negotiated RFB protocol version.
///
/// Ordering follows the protocol: `V3_3 < V3_7 < V3_8`. The security
/// handshake and the security-result phase differ between 3.3, 3.7 and 3.8,
/// so the negotiated version steers the whole handshake state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolVersion {
    /// RFB 3.3: the server dictates the security type.
    V3_3,
    /// RFB 3.7: the client picks from a server list; no security result for None.
    V3_7,
    /// RFB 3.8: like 3.7 plus a security result (and reason) in every case.
    V3_8,
}

impl ProtocolVersion {
    /// Returns the 12-byte version token sent on the wire.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            ProtocolVersion::V3_3 => PROTOCOL_VERSION_3_3,
            ProtocolVersion::V3_7 => PROTOCOL_VERSION_3_7,
            ProtocolVersion::V3_8 => PROTOCOL_VERSION_3_8,
        }
    }
}

/// Represents the pixel format of the VNC framebuffer.
///
/// This struct defines how pixel data is interpreted, including color depth,
/// endianness, and RGB component details. The server declares its native
/// format during initialization; the client may replace it with
/// `SetPixelFormat`.
#[derive(Debug, Clone)]
pub struct PixelFormat {
    /// Number of bits per pixel. Must be 8, 16 or 32.
    pub bits_per_pixel: u8,
    /// Depth of the pixel in bits. Never exceeds `bits_per_pixel`.
    pub depth: u8,
    /// Flag indicating if pixel values are big-endian (1) or little-endian (0).
    ///
    /// This is independent of the wire protocol's own byte order, which is
    /// always big-endian for message framing.
    pub big_endian_flag: u8,
    /// Flag indicating if the pixel format is true-colour (1) or colormapped (0).
    pub true_colour_flag: u8,
    /// Maximum red color value.
    pub red_max: u16,
    /// Maximum green color value.
    pub green_max: u16,
    /// Maximum blue color value.
    pub blue_max: u16,
    /// Number of shifts to apply to get the red color component.
    pub red_shift: u8,
    /// Number of shifts to apply to get the green color component.
    pub green_shift: u8,
    /// Number of shifts to apply to get the blue color component.
    pub blue_shift: u8,
}

impl PixelFormat {
    /// Creates a standard 32-bit RGBA pixel format.
    ///
    /// # Returns
    ///
    /// A `PixelFormat` instance configured for 32-bit RGBA.
    #[must_use]
    pub fn rgba32() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian_flag: 0,
            true_colour_flag: 1,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 0,
            green_shift: 8,
            blue_shift: 16,
        }
    }

    /// Creates a 16-bit RGB565 pixel format.
    ///
    /// RGB565 uses 5 bits for red, 6 bits for green, and 5 bits for blue.
    /// This is a common format for bandwidth-constrained connections.
    ///
    /// # Returns
    ///
    /// A `PixelFormat` instance configured for 16-bit RGB565.
    #[must_use]
    pub fn rgb565() -> Self {
        Self {
            bits_per_pixel: 16,
            depth: 16,
            big_endian_flag: 0,
            true_colour_flag: 1,
            red_max: 31,   // 5 bits
            green_max: 63, // 6 bits
            blue_max: 31,  // 5 bits
            red_shift: 11,
            green_shift: 5,
            blue_shift: 0,
        }
    }

    /// Number of bytes each pixel occupies on the wire.
    #[must_use]
    pub fn bytes_per_pixel(&self) -> usize {
        usize::from(self.bits_per_pixel / 8)
    }

    /// Validates that this pixel format is one the client can decode.
    ///
    /// Checks that bits-per-pixel is 8, 16 or 32 and that the declared depth
    /// does not exceed it.
    ///
    /// # Returns
    ///
    /// `true` if the format is valid and supported, `false` otherwise.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.bits_per_pixel != 8 && self.bits_per_pixel != 16 && self.bits_per_pixel != 32 {
            return false;
        }

        if self.depth == 0 || self.depth > self.bits_per_pixel {
            return false;
        }

        // For truecolor, shifts beyond the pixel width can never contribute bits
        if self.true_colour_flag != 0
            && (self.red_shift >= 32 || self.green_shift >= 32 || self.blue_shift >= 32)
        {
            return false;
        }

        true
    }

    /// Writes the pixel format data into a `BytesMut` buffer.
    ///
    /// This function serializes the `PixelFormat` into the 16-byte RFB wire
    /// record, including the trailing padding.
    ///
    /// # Arguments
    ///
    /// * `buf` - A mutable reference to the `BytesMut` buffer to write into.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.bits_per_pixel);
        buf.put_u8(self.depth);
        buf.put_u8(self.big_endian_flag);
        buf.put_u8(self.true_colour_flag);
        buf.put_u16(self.red_max);
        buf.put_u16(self.green_max);
        buf.put_u16(self.blue_max);
        buf.put_u8(self.red_shift);
        buf.put_u8(self.green_shift);
        buf.put_u8(self.blue_shift);
        buf.put_bytes(0, 3); // padding
    }

    /// Reads and deserializes a `PixelFormat` from a `BytesMut` buffer.
    ///
    /// This function extracts pixel format information from the RFB protocol
    /// stream.
    ///
    /// # Arguments
    ///
    /// * `buf` - A mutable reference to the `BytesMut` buffer to read from.
    ///
    /// # Returns
    ///
    /// `Ok(Self)` containing the parsed `PixelFormat`.
    ///
    /// # Errors
    ///
    /// Returns `Err(io::Error)` if there are not enough bytes in the buffer
    /// to read a complete `PixelFormat`.
    pub fn from_bytes(buf: &mut BytesMut) -> io::Result<Self> {
        if buf.len() < 16 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Not enough bytes for PixelFormat",
            ));
        }

        let pf = Self {
            bits_per_pixel: buf.get_u8(),
            depth: buf.get_u8(),
            big_endian_flag: buf.get_u8(),
            true_colour_flag: buf.get_u8(),
            red_max: buf.get_u16(),
            green_max: buf.get_u16(),
            blue_max: buf.get_u16(),
            red_shift: buf.get_u8(),
            green_shift: buf.get_u8(),
            blue_shift: buf.get_u8(),
        };
        buf.advance(3);
        Ok(pf)
    }
}

/// A single color-map entry with 16-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    /// Red intensity.
    pub r: u16,
    /// Green intensity.
    pub g: u16,
    /// Blue intensity.
    pub b: u16,
}

/// Number of entries in a connection's color map.
///
/// Always 256 for colormapped pixel formats, regardless of the declared
/// depth, matching the behavior every deployed server expects.
pub const COLOR_MAP_SIZE: usize = 256;

/// The palette used by colormapped (non-true-color) pixel formats.
///
/// Allocated whenever a pixel format with `true_colour_flag == 0` is
/// installed on a connection and updated by `SetColorMapEntries` messages.
#[derive(Debug, Clone)]
pub struct ColorMap {
    entries: Vec<Color>,
}

impl ColorMap {
    /// Creates a color map with all entries black.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![Color { r: 0, g: 0, b: 0 }; COLOR_MAP_SIZE],
        }
    }

    /// Writes `colors` into positions `[first_color, first_color + colors.len())`.
    ///
    /// # Errors
    ///
    /// Returns [`VncError::OutOfRange`] if the range exceeds the map's fixed
    /// 256 entries; no entries are modified in that case.
    pub fn set_entries(&mut self, first_color: u16, colors: &[Color]) -> Result<()> {
        let first = usize::from(first_color);
        let end = first + colors.len();
        if end > self.entries.len() {
            return Err(VncError::OutOfRange(end.saturating_sub(1) as u32));
        }
        self.entries[first..end].copy_from_slice(colors);
        Ok(())
    }

    /// Looks up a palette entry by pixel value.
    ///
    /// # Errors
    ///
    /// Returns [`VncError::OutOfRange`] for indices at or beyond 256. The
    /// protocol does not forbid a server from sending such pixels; rejecting
    /// them beats returning undefined color data.
    pub fn lookup(&self, index: u32) -> Result<Color> {
        self.entries
            .get(index as usize)
            .copied()
            .ok_or(VncError::OutOfRange(index))
    }
}

impl Default for ColorMap {
    fn default() -> Self {
        Self::new()
    }
}

/// A rectangle from a framebuffer update, together with its decoded payload.
///
/// The header fields specify where the rectangle lands in the framebuffer
/// (for the cursor pseudo-encoding, `x`/`y` are the hotspot coordinates
/// instead). The payload is whatever the rectangle's encoding decoder
/// produced.
#[derive(Debug)]
pub struct Rectangle {
    /// X coordinate of the top-left corner.
    pub x: u16,
    /// Y coordinate of the top-left corner.
    pub y: u16,
    /// Width of the rectangle in pixels.
    pub width: u16,
    /// Height of the rectangle in pixels.
    pub height: u16,
    /// The decoded payload for this rectangle.
    pub data: RectData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_round_trip() {
        let pf = PixelFormat::rgb565();
        let mut buf = BytesMut::new();
        pf.write_to(&mut buf);
        assert_eq!(buf.len(), 16);

        let parsed = PixelFormat::from_bytes(&mut buf).unwrap();
        assert_eq!(parsed.bits_per_pixel, 16);
        assert_eq!(parsed.depth, 16);
        assert_eq!(parsed.red_max, 31);
        assert_eq!(parsed.green_max, 63);
        assert_eq!(parsed.red_shift, 11);
    }

    #[test]
    fn test_pixel_format_validity() {
        assert!(PixelFormat::rgba32().is_valid());
        assert!(PixelFormat::rgb565().is_valid());

        let mut pf = PixelFormat::rgba32();
        pf.bits_per_pixel = 24;
        assert!(!pf.is_valid());

        let mut pf = PixelFormat::rgba32();
        pf.depth = 33;
        assert!(!pf.is_valid());

        let mut pf = PixelFormat::rgba32();
        pf.bits_per_pixel = 16;
        pf.depth = 24;
        assert!(!pf.is_valid());
    }

    #[test]
    fn test_color_map_update_and_lookup() {
        let mut map = ColorMap::new();
        let colors = [
            Color { r: 0, g: 0, b: 0 },
            Color { r: 65535, g: 0, b: 0 },
            Color { r: 0, g: 65535, b: 0 },
        ];
        map.set_entries(10, &colors).unwrap();

        assert_eq!(map.lookup(10).unwrap(), colors[0]);
        assert_eq!(map.lookup(11).unwrap(), colors[1]);
        assert_eq!(map.lookup(12).unwrap(), colors[2]);
        // neighbors untouched
        assert_eq!(map.lookup(13).unwrap(), Color { r: 0, g: 0, b: 0 });
    }

    #[test]
    fn test_color_map_range_checks() {
        let mut map = ColorMap::new();
        let colors = [Color { r: 1, g: 2, b: 3 }; 3];
        assert!(matches!(
            map.set_entries(254, &colors),
            Err(VncError::OutOfRange(_))
        ));
        assert!(matches!(map.lookup(256), Err(VncError::OutOfRange(256))));
        // the failed update must not have written the in-range prefix
        assert_eq!(map.lookup(254).unwrap(), Color { r: 0, g: 0, b: 0 });
    }

    #[test]
    fn test_version_ordering() {
        assert!(ProtocolVersion::V3_3 < ProtocolVersion::V3_7);
        assert!(ProtocolVersion::V3_7 < ProtocolVersion::V3_8);
        assert_eq!(ProtocolVersion::V3_8.token(), PROTOCOL_VERSION_3_8);
        assert_eq!(PROTOCOL_VERSION_3_3.len(), 12);
        assert_eq!(PROTOCOL_VERSION_3_7.len(), 12);
        assert_eq!(PROTOCOL_VERSION_3_8.len(), 12);
    }
}
