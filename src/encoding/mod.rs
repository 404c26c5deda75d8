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

//! VNC rectangle encoding decoders.
//!
//! Each rectangle in a framebuffer update names an encoding; this module
//! provides the decoder for every encoding the client supports and the
//! registry that dispatches on the on-wire encoding type.
//!
//! # Supported Encodings
//!
//! - **Raw**: Uncompressed pixel data. Simple but bandwidth-intensive.
//! - **CopyRect**: A reference to another framebuffer region; carries no pixels.
//! - **Hextile**: 16x16 tiles, each raw, solid, or subrectangle-encoded.
//! - **Cursor** (pseudo): Cursor shape with a transparency bitmask.
//! - **DesktopSize** (pseudo): Framebuffer resize notification, no payload.
//!
//! # Architecture
//!
//! The module uses a trait-based design allowing easy addition of new
//! decoders. Each encoding implements the [`Decoder`] trait, which reads the
//! encoding-specific payload off the stream and produces a normalized
//! [`RectData`] value; pixel-bearing payloads come out as RGBA. Encodings the
//! client did not register (Tight, TightPng, ContinuousUpdates, ...) are
//! rejected during dispatch.

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{
    ColorMap, PixelFormat, ENCODING_COPYRECT, ENCODING_CURSOR, ENCODING_DESKTOP_SIZE,
    ENCODING_HEXTILE, ENCODING_RAW,
};
use crate::translate;
use crate::wire::StreamReader;

// Module declarations
pub mod copyrect;
pub mod cursor;
pub mod desktop_size;
pub mod hextile;
pub mod raw;

// Re-export decoder implementations
pub use copyrect::CopyRectDecoder;
pub use cursor::CursorDecoder;
pub use desktop_size::DesktopSizeDecoder;
pub use hextile::HextileDecoder;
pub use raw::RawDecoder;

/// Everything a decoder may touch while reading a rectangle payload.
///
/// Borrowed from the connection for the duration of one rectangle: the read
/// half of the transport plus the negotiated pixel format and, for
/// colormapped formats, the palette.
pub struct DecodeContext<'a> {
    /// The connection's buffered read half.
    pub reader: &'a mut StreamReader<'a>,
    /// The pixel format currently in effect.
    pub format: &'a PixelFormat,
    /// The connection's palette, present only for colormapped formats.
    pub color_map: Option<&'a ColorMap>,
}

impl DecodeContext<'_> {
    /// Reads `count` pixels through the connection's pixel format,
    /// producing RGBA bytes.
    pub async fn read_pixels(&mut self, count: usize) -> Result<Vec<u8>> {
        translate::read_pixels(&mut *self.reader, self.format, self.color_map, count).await
    }
}

/// The decoded payload of one framebuffer-update rectangle.
///
/// Pixel-bearing variants hold row-major RGBA, 4 bytes per pixel, alpha
/// last, `4 * width * height` bytes in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RectData {
    /// Raw pixel data converted to RGBA.
    Raw {
        /// The rectangle's pixels.
        rgba: Vec<u8>,
    },
    /// A region copy within the client's framebuffer.
    ///
    /// Only the source position is parsed here; performing the copy against
    /// a local framebuffer is the consumer's job.
    CopyRect {
        /// X coordinate of the source region.
        src_x: u16,
        /// Y coordinate of the source region.
        src_y: u16,
    },
    /// A Hextile-encoded rectangle assembled into RGBA.
    Hextile {
        /// The rectangle's pixels.
        rgba: Vec<u8>,
    },
    /// Cursor shape from the cursor pseudo-encoding.
    ///
    /// Pixels outside the cursor mask are fully transparent `(0,0,0,0)`;
    /// the rectangle's `x`/`y` carry the hotspot. The RGBA is premultiplied.
    Cursor {
        /// The cursor's pixels.
        rgba: Vec<u8>,
    },
    /// Desktop-size pseudo-encoding; the new size is the rectangle's
    /// width and height. No payload.
    DesktopSize,
}

impl RectData {
    /// The decoded RGBA pixels, if this payload carries any.
    #[must_use]
    pub fn rgba(&self) -> Option<&[u8]> {
        match self {
            RectData::Raw { rgba } | RectData::Hextile { rgba } | RectData::Cursor { rgba } => {
                Some(rgba)
            }
            RectData::CopyRect { .. } | RectData::DesktopSize => None,
        }
    }
}

/// A trait defining the interface for VNC rectangle decoders.
///
/// A decoder reads the payload of one rectangle from the stream, using the
/// connection's pixel format where the encoding carries pixels, and returns
/// the normalized [`RectData`].
#[async_trait]
pub trait Decoder: Send + Sync {
    /// The number that uniquely identifies this encoding on the wire.
    fn encoding_type(&self) -> i32;

    /// Reads one rectangle's payload.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Stream and pixel-format context borrowed from the connection.
    /// * `width` - The rectangle's width in pixels.
    /// * `height` - The rectangle's height in pixels.
    ///
    /// # Errors
    ///
    /// Transport failures and malformed payloads; any error leaves the
    /// stream unusable since the remaining payload length is unknown.
    async fn decode(
        &self,
        ctx: &mut DecodeContext<'_>,
        width: u16,
        height: u16,
    ) -> Result<RectData>;
}

/// Creates a decoder instance for the specified encoding type.
///
/// This factory function returns a boxed trait object implementing the
/// [`Decoder`] trait for the requested encoding type. Encodings outside the
/// built-in set (such as Tight or TightPng) have no factory entry and must
/// be supplied by the caller.
///
/// # Arguments
///
/// * `encoding_type` - The RFB encoding type constant.
///
/// # Returns
///
/// `Some(Box<dyn Decoder>)` if the encoding type is supported, `None` otherwise.
#[must_use]
pub fn get_decoder(encoding_type: i32) -> Option<Box<dyn Decoder>> {
    match encoding_type {
        ENCODING_RAW => Some(Box::new(RawDecoder)),
        ENCODING_COPYRECT => Some(Box::new(CopyRectDecoder)),
        ENCODING_HEXTILE => Some(Box::new(HextileDecoder)),
        ENCODING_CURSOR => Some(Box::new(CursorDecoder)),
        ENCODING_DESKTOP_SIZE => Some(Box::new(DesktopSizeDecoder)),
        _ => None,
    }
}

/// Serializes an RGBA buffer as a PNG image.
///
/// Decoded rectangles expose RGBA as the ground truth; this producer is for
/// callers that want a ready-to-store image instead.
///
/// # Arguments
///
/// * `rgba` - Row-major RGBA pixel data, 4 bytes per pixel.
/// * `width` - Image width in pixels.
/// * `height` - Image height in pixels.
///
/// # Errors
///
/// Returns [`crate::VncError::Png`] if the PNG encoder fails.
pub fn rgba_to_png(rgba: &[u8], width: u16, height: u16) -> Result<Vec<u8>> {
    use png::{BitDepth, ColorType, Encoder};

    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, u32::from(width), u32::from(height));
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(rgba)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_covers_builtins() {
        for tag in [
            ENCODING_RAW,
            ENCODING_COPYRECT,
            ENCODING_HEXTILE,
            ENCODING_CURSOR,
            ENCODING_DESKTOP_SIZE,
        ] {
            let decoder = get_decoder(tag).expect("builtin decoder");
            assert_eq!(decoder.encoding_type(), tag);
        }
    }

    #[test]
    fn test_factory_rejects_unregistered() {
        assert!(get_decoder(crate::protocol::ENCODING_TIGHT).is_none());
        assert!(get_decoder(crate::protocol::ENCODING_TIGHTPNG).is_none());
        assert!(get_decoder(99).is_none());
    }

    #[test]
    fn test_rgba_to_png_magic() {
        let rgba = vec![255u8, 0, 0, 255, 0, 255, 0, 255];
        let data = rgba_to_png(&rgba, 2, 1).unwrap();
        assert_eq!(&data[0..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_rect_data_rgba_accessor() {
        let raw = RectData::Raw {
            rgba: vec![1, 2, 3, 255],
        };
        assert_eq!(raw.rgba(), Some(&[1u8, 2, 3, 255][..]));
        assert_eq!(RectData::DesktopSize.rgba(), None);
        assert_eq!(RectData::CopyRect { src_x: 0, src_y: 0 }.rgba(), None);
    }
}
