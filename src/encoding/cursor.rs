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

//! VNC Cursor pseudo-encoding decoder.
//!
//! A cursor rectangle carries the cursor shape: `width * height` pixels in
//! the negotiated format followed by a 1-bit transparency mask with
//! `ceil(width / 8)` bytes per row, most significant bit first. The
//! rectangle's `x`/`y` are the hotspot, not a framebuffer position.
//!
//! Masked-out pixels have all four RGBA channels zeroed, not just alpha,
//! since the output is premultiplied.

use async_trait::async_trait;

use super::{DecodeContext, Decoder, RectData};
use crate::error::Result;
use crate::protocol::ENCODING_CURSOR;
use crate::wire;

/// Decodes the "Cursor" pseudo-encoding (RFC 6143 Section 7.8.1).
pub struct CursorDecoder;

#[async_trait]
impl Decoder for CursorDecoder {
    fn encoding_type(&self) -> i32 {
        ENCODING_CURSOR
    }

    async fn decode(
        &self,
        ctx: &mut DecodeContext<'_>,
        width: u16,
        height: u16,
    ) -> Result<RectData> {
        let width = usize::from(width);
        let height = usize::from(height);

        let mut rgba = ctx.read_pixels(width * height).await?;

        let mask_stride = width.div_ceil(8);
        let mask = wire::read_exact_vec(ctx.reader, mask_stride * height).await?;

        for y in 0..height {
            for x in 0..width {
                let mask_byte = mask[y * mask_stride + x / 8];
                let mask_bit = 7 - (x % 8);
                if mask_byte & (1 << mask_bit) == 0 {
                    let offset = (y * width + x) * 4;
                    rgba[offset..offset + 4].fill(0);
                }
            }
        }

        Ok(RectData::Cursor { rgba })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PixelFormat;

    #[tokio::test]
    async fn test_mask_clears_hidden_pixels() {
        // 32bpp big-endian 0x00RRGGBB
        let format = PixelFormat {
            big_endian_flag: 1,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
            ..PixelFormat::rgba32()
        };

        // 2x2 all-red cursor; mask rows 0b10000000 and 0b01000000:
        // visible pixels are (0,0) and (1,1)
        let mut data: &[u8] = &[
            0x00, 0xFF, 0x00, 0x00, //
            0x00, 0xFF, 0x00, 0x00, //
            0x00, 0xFF, 0x00, 0x00, //
            0x00, 0xFF, 0x00, 0x00, //
            0b1000_0000,
            0b0100_0000,
        ];
        let mut ctx = DecodeContext {
            reader: &mut data,
            format: &format,
            color_map: None,
        };

        let decoded = CursorDecoder.decode(&mut ctx, 2, 2).await.unwrap();
        let rgba = decoded.rgba().unwrap();
        assert_eq!(
            rgba,
            &[
                255, 0, 0, 255, // (0,0) visible
                0, 0, 0, 0, //     (1,0) masked
                0, 0, 0, 0, //     (0,1) masked
                255, 0, 0, 255, // (1,1) visible
            ]
        );
    }

    #[tokio::test]
    async fn test_mask_rows_are_byte_padded() {
        // 9x2 cursor: each mask row occupies 2 bytes. All pixels visible.
        let format = PixelFormat {
            bits_per_pixel: 8,
            depth: 8,
            big_endian_flag: 0,
            true_colour_flag: 1,
            red_max: 7,
            green_max: 7,
            blue_max: 3,
            red_shift: 0,
            green_shift: 3,
            blue_shift: 6,
        };

        let mut stream = vec![0x07u8; 18]; // 18 red pixels
        stream.extend_from_slice(&[0xFF, 0x80, 0xFF, 0x80]); // two 2-byte mask rows
        let mut data: &[u8] = &stream;
        let mut ctx = DecodeContext {
            reader: &mut data,
            format: &format,
            color_map: None,
        };

        let decoded = CursorDecoder.decode(&mut ctx, 9, 2).await.unwrap();
        assert!(data.is_empty());
        let rgba = decoded.rgba().unwrap();
        assert_eq!(rgba.len(), 9 * 2 * 4);
        assert!(rgba
            .chunks_exact(4)
            .all(|px| px == [255, 0, 0, 255]));
    }
}
