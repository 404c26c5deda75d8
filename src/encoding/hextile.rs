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

//! VNC Hextile encoding decoder.
//!
//! Hextile divides the rectangle into 16x16 tiles in raster order; the
//! rightmost column and bottom row of tiles are truncated when the rectangle
//! is not a multiple of 16. Each tile starts with a subencoding byte whose
//! bits select raw pixels, a new background or foreground color, and an
//! optional list of packed subrectangles.
//!
//! The background and foreground colors persist from tile to tile until a
//! later tile overwrites them, so tiles cannot be decoded independently.

use async_trait::async_trait;

use super::{DecodeContext, Decoder, RectData};
use crate::error::Result;
use crate::protocol::{
    ENCODING_HEXTILE, HEXTILE_ANY_SUBRECTS, HEXTILE_BACKGROUND_SPECIFIED,
    HEXTILE_FOREGROUND_SPECIFIED, HEXTILE_RAW, HEXTILE_SUBRECTS_COLOURED,
};
use crate::wire;

/// Decodes the VNC "Hextile" encoding (RFC 6143 Section 7.7.4).
pub struct HextileDecoder;

#[async_trait]
impl Decoder for HextileDecoder {
    #[allow(clippy::similar_names)] // bg and fg are standard VNC Hextile terminology
    async fn decode(
        &self,
        ctx: &mut DecodeContext<'_>,
        width: u16,
        height: u16,
    ) -> Result<RectData> {
        let width = usize::from(width);
        let height = usize::from(height);
        let mut rgba = vec![0u8; width * height * 4];

        // Background and foreground start as opaque black and persist
        // across tiles until a tile overwrites them.
        let mut bg: [u8; 4] = [0, 0, 0, 255];
        let mut fg: [u8; 4] = [0, 0, 0, 255];

        for tile_y in (0..height).step_by(16) {
            let tile_h = std::cmp::min(16, height - tile_y);

            for tile_x in (0..width).step_by(16) {
                let tile_w = std::cmp::min(16, width - tile_x);

                let subencoding = wire::read_u8(ctx.reader).await?;

                if subencoding & HEXTILE_RAW != 0 {
                    let pixels = ctx.read_pixels(tile_w * tile_h).await?;
                    blit_tile(&mut rgba, width, tile_x, tile_y, tile_w, tile_h, &pixels);
                    // raw tiles leave bg/fg untouched for the next tile
                    continue;
                }

                if subencoding & HEXTILE_BACKGROUND_SPECIFIED != 0 {
                    bg = read_one_pixel(ctx).await?;
                }
                if subencoding & HEXTILE_FOREGROUND_SPECIFIED != 0 {
                    fg = read_one_pixel(ctx).await?;
                }

                fill_rect(&mut rgba, width, height, tile_x, tile_y, tile_w, tile_h, bg);

                if subencoding & HEXTILE_ANY_SUBRECTS == 0 {
                    continue;
                }
                let colored = subencoding & HEXTILE_SUBRECTS_COLOURED != 0;

                let count = wire::read_u8(ctx.reader).await?;
                for _ in 0..count {
                    let color = if colored { read_one_pixel(ctx).await? } else { fg };

                    let xy = wire::read_u8(ctx.reader).await?;
                    let wh = wire::read_u8(ctx.reader).await?;
                    let sub_x = tile_x + usize::from(xy >> 4);
                    let sub_y = tile_y + usize::from(xy & 0xF);
                    let sub_w = usize::from(wh >> 4) + 1;
                    let sub_h = usize::from(wh & 0xF) + 1;

                    fill_rect(&mut rgba, width, height, sub_x, sub_y, sub_w, sub_h, color);
                }
            }
        }

        Ok(RectData::Hextile { rgba })
    }

    fn encoding_type(&self) -> i32 {
        ENCODING_HEXTILE
    }
}

/// Reads a single pixel as an RGBA color.
async fn read_one_pixel(ctx: &mut DecodeContext<'_>) -> Result<[u8; 4]> {
    let pixel = ctx.read_pixels(1).await?;
    Ok([pixel[0], pixel[1], pixel[2], pixel[3]])
}

/// Fills a solid rectangle, clipping anything that falls outside the
/// destination buffer (subrectangle geometry is server-controlled).
#[allow(clippy::too_many_arguments)]
fn fill_rect(
    rgba: &mut [u8],
    stride: usize,
    height: usize,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    color: [u8; 4],
) {
    let x_end = std::cmp::min(x + w, stride);
    let y_end = std::cmp::min(y + h, height);
    for row in y..y_end {
        for col in x..x_end {
            let offset = (row * stride + col) * 4;
            rgba[offset..offset + 4].copy_from_slice(&color);
        }
    }
}

/// Copies a decoded tile into the rectangle buffer row by row.
fn blit_tile(
    rgba: &mut [u8],
    stride: usize,
    x: usize,
    y: usize,
    tile_w: usize,
    tile_h: usize,
    pixels: &[u8],
) {
    for row in 0..tile_h {
        let src = row * tile_w * 4;
        let dst = ((y + row) * stride + x) * 4;
        rgba[dst..dst + tile_w * 4].copy_from_slice(&pixels[src..src + tile_w * 4]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PixelFormat;

    /// 8-bit true color: rrrgggbb with 3/3/2 bits, so one byte per pixel
    /// keeps the test streams readable.
    fn bgr233() -> PixelFormat {
        PixelFormat {
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
        }
    }

    async fn decode(stream: &[u8], width: u16, height: u16) -> Vec<u8> {
        let format = bgr233();
        let mut data = stream;
        let mut ctx = DecodeContext {
            reader: &mut data,
            format: &format,
            color_map: None,
        };
        let decoded = HextileDecoder.decode(&mut ctx, width, height).await.unwrap();
        assert!(data.is_empty(), "decoder must consume the whole payload");
        decoded.rgba().unwrap().to_vec()
    }

    fn pixel_at(rgba: &[u8], stride: usize, x: usize, y: usize) -> [u8; 4] {
        let offset = (y * stride + x) * 4;
        [
            rgba[offset],
            rgba[offset + 1],
            rgba[offset + 2],
            rgba[offset + 3],
        ]
    }

    const RED: u8 = 0x07; // 3-bit red, max
    const RED_RGBA: [u8; 4] = [255, 0, 0, 255];
    const BLACK_RGBA: [u8; 4] = [0, 0, 0, 255];

    #[tokio::test]
    async fn test_background_fill_covers_rect() {
        // 20x18 rect: 2x2 tile grid with truncated right column (4 wide)
        // and bottom row (2 high). First tile sets a red background, the
        // rest inherit it.
        let stream = [
            [HEXTILE_BACKGROUND_SPECIFIED, RED].as_slice(),
            [0u8].as_slice(), // tile (16,0): inherited background
            [0u8].as_slice(), // tile (0,16)
            [0u8].as_slice(), // tile (16,16)
        ]
        .concat();

        let rgba = decode(&stream, 20, 18).await;
        assert_eq!(rgba.len(), 20 * 18 * 4);
        // every pixel was written with the persisting background
        for y in 0..18 {
            for x in 0..20 {
                assert_eq!(pixel_at(&rgba, 20, x, y), RED_RGBA, "pixel ({x},{y})");
            }
        }
    }

    #[tokio::test]
    async fn test_raw_tile_and_edge_sizes() {
        // 17x1 rect: one full 16x1 tile plus one truncated 1x1 tile,
        // both raw. The raw payload sizes prove the edge-tile geometry.
        let mut stream = vec![HEXTILE_RAW];
        stream.extend(std::iter::repeat(RED).take(16));
        stream.push(HEXTILE_RAW);
        stream.push(0x00); // single black pixel

        let rgba = decode(&stream, 17, 1).await;
        for x in 0..16 {
            assert_eq!(pixel_at(&rgba, 17, x, 0), RED_RGBA);
        }
        assert_eq!(pixel_at(&rgba, 17, 16, 0), BLACK_RGBA);
    }

    #[tokio::test]
    async fn test_subrects_use_foreground() {
        // 8x8 rect, single tile: black background, red foreground, two
        // uncolored subrects: 2x1 at (1,1) and 1x3 at (4,2).
        let stream = vec![
            HEXTILE_BACKGROUND_SPECIFIED
                | HEXTILE_FOREGROUND_SPECIFIED
                | HEXTILE_ANY_SUBRECTS,
            0x00, // background black
            RED,  // foreground
            2,    // subrect count
            0x11, // x=1 y=1
            0x10, // w=2 h=1
            0x42, // x=4 y=2
            0x02, // w=1 h=3
        ];

        let rgba = decode(&stream, 8, 8).await;
        for y in 0..8 {
            for x in 0..8 {
                let expected = if (y == 1 && (x == 1 || x == 2)) || (x == 4 && (2..5).contains(&y))
                {
                    RED_RGBA
                } else {
                    BLACK_RGBA
                };
                assert_eq!(pixel_at(&rgba, 8, x, y), expected, "pixel ({x},{y})");
            }
        }
    }

    #[tokio::test]
    async fn test_colored_subrects_and_fg_persistence() {
        // Two 16x16 tiles side by side. The first sets fg=red and draws one
        // colored subrect (green, overriding nothing); the second draws an
        // uncolored subrect that must still use the red foreground from the
        // first tile.
        const GREEN: u8 = 0x38; // 3-bit green at shift 3
        let stream = vec![
            // tile 0: bg black, fg red, one colored subrect
            HEXTILE_BACKGROUND_SPECIFIED
                | HEXTILE_FOREGROUND_SPECIFIED
                | HEXTILE_ANY_SUBRECTS
                | HEXTILE_SUBRECTS_COLOURED,
            0x00,
            RED,
            1,
            GREEN, // subrect color
            0x00,  // x=0 y=0
            0x00,  // w=1 h=1
            // tile 1: inherited bg/fg, one uncolored subrect at (0,0)
            HEXTILE_ANY_SUBRECTS,
            1,
            0x00,
            0x00,
        ];

        let rgba = decode(&stream, 32, 16).await;
        assert_eq!(pixel_at(&rgba, 32, 0, 0), [0, 255, 0, 255]);
        assert_eq!(pixel_at(&rgba, 32, 1, 0), BLACK_RGBA);
        // second tile starts at x=16; its subrect uses the persisted fg
        assert_eq!(pixel_at(&rgba, 32, 16, 0), RED_RGBA);
        assert_eq!(pixel_at(&rgba, 32, 17, 0), BLACK_RGBA);
    }
}
