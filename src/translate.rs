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

//! Pixel translation from the server's wire format to RGBA.
//!
//! Every pixel-bearing encoding reads pixels through this module, so decoded
//! rectangle payloads always come out as row-major RGBA with 4 bytes per
//! pixel and an opaque alpha channel, regardless of the pixel format the
//! server negotiated.
//!
//! Pixel values use the byte order the server declared in its pixel format,
//! which is independent of the big-endian framing of the wire protocol
//! itself. For 8-bit pixels the byte order is immaterial.

use crate::error::{Result, VncError};
use crate::protocol::{ColorMap, PixelFormat};
use crate::wire::{self, StreamReader};

/// Reads `count` pixels from the stream and converts them to RGBA.
///
/// Consumes `count * bytes_per_pixel` bytes and produces `4 * count` bytes
/// with alpha forced to 255.
///
/// # Arguments
///
/// * `reader` - The connection's read half.
/// * `format` - The pixel format currently negotiated on the connection.
/// * `color_map` - The connection's palette; required when the format is
///   colormapped, ignored for true-color formats.
/// * `count` - Number of pixels to read.
///
/// # Errors
///
/// Propagates transport errors, and fails with [`VncError::OutOfRange`] when
/// a colormapped pixel indexes outside the palette.
pub async fn read_pixels(
    reader: &mut StreamReader<'_>,
    format: &PixelFormat,
    color_map: Option<&ColorMap>,
    count: usize,
) -> Result<Vec<u8>> {
    let bypp = format.bytes_per_pixel();
    let raw = wire::read_exact_vec(reader, count * bypp).await?;

    let mut rgba = Vec::with_capacity(count * 4);
    for pixel_bytes in raw.chunks_exact(bypp) {
        let (r, g, b) = pixel_to_rgb(pixel_bytes, format, color_map)?;
        rgba.extend_from_slice(&[r, g, b, 255]);
    }
    Ok(rgba)
}

/// Converts one wire pixel to 8-bit RGB components.
///
/// # Arguments
///
/// * `pixel` - The pixel's raw bytes (`bytes_per_pixel` of them).
/// * `format` - The pixel format describing how to interpret the data.
/// * `color_map` - The palette for colormapped formats.
///
/// # Returns
///
/// A tuple `(r, g, b)` with each component scaled to 0-255.
pub fn pixel_to_rgb(
    pixel: &[u8],
    format: &PixelFormat,
    color_map: Option<&ColorMap>,
) -> Result<(u8, u8, u8)> {
    // Assemble the pixel value honoring the format's declared byte order
    let pixel_value = match format.bits_per_pixel {
        8 => u32::from(pixel[0]),
        16 => {
            if format.big_endian_flag != 0 {
                u32::from(u16::from_be_bytes([pixel[0], pixel[1]]))
            } else {
                u32::from(u16::from_le_bytes([pixel[0], pixel[1]]))
            }
        }
        _ => {
            if format.big_endian_flag != 0 {
                u32::from_be_bytes([pixel[0], pixel[1], pixel[2], pixel[3]])
            } else {
                u32::from_le_bytes([pixel[0], pixel[1], pixel[2], pixel[3]])
            }
        }
    };

    if format.true_colour_flag != 0 {
        let r_raw = (pixel_value >> format.red_shift) & u32::from(format.red_max);
        let g_raw = (pixel_value >> format.green_shift) & u32::from(format.green_max);
        let b_raw = (pixel_value >> format.blue_shift) & u32::from(format.blue_max);

        Ok((
            scale_component(r_raw, format.red_max),
            scale_component(g_raw, format.green_max),
            scale_component(b_raw, format.blue_max),
        ))
    } else {
        let map = color_map.ok_or(VncError::OutOfRange(pixel_value))?;
        let color = map.lookup(pixel_value)?;
        Ok((
            scale_component(u32::from(color.r), 65535),
            scale_component(u32::from(color.g), 65535),
            scale_component(u32::from(color.b), 65535),
        ))
    }
}

/// Scales a color component from its format-specific range to 8-bit (0-255).
///
/// Rounds half away from zero, so a component exactly between two output
/// values lands on the larger one.
///
/// # Arguments
///
/// * `value` - The component value in its native range (0..=max)
/// * `max` - The maximum value for this component in the source format
///
/// # Returns
///
/// The scaled value in 0-255 range.
#[inline]
#[allow(clippy::cast_possible_truncation)] // quotient is bounded by 255
fn scale_component(value: u32, max: u16) -> u8 {
    if max == 0 {
        return 0;
    }
    if max == 255 {
        return value as u8;
    }

    // value * 255 / max, rounded; 64-bit to avoid overflow
    let max = u64::from(max);
    ((u64::from(value) * 255 * 2 + max) / (max * 2)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Color;

    /// 32bpp big-endian true color with channels laid out as 0x00RRGGBB.
    fn bgr888_be() -> PixelFormat {
        PixelFormat {
            bits_per_pixel: 32,
            depth: 24,
            big_endian_flag: 1,
            true_colour_flag: 1,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }

    #[test]
    fn test_truecolor_identity() {
        let format = bgr888_be();
        for (r, g, b) in [(0u8, 0u8, 0u8), (255, 255, 255), (0x12, 0x34, 0x56)] {
            let pixel = [0x00, r, g, b];
            assert_eq!(
                pixel_to_rgb(&pixel, &format, None).unwrap(),
                (r, g, b),
                "pixel 0x00{r:02X}{g:02X}{b:02X}"
            );
        }
    }

    #[test]
    fn test_little_endian_assembly() {
        let mut format = bgr888_be();
        format.big_endian_flag = 0;
        // 0x00123456 in little-endian byte order
        let pixel = [0x56, 0x34, 0x12, 0x00];
        assert_eq!(
            pixel_to_rgb(&pixel, &format, None).unwrap(),
            (0x12, 0x34, 0x56)
        );
    }

    #[test]
    fn test_rgb565_scaling() {
        let format = PixelFormat::rgb565();
        // full red: 31 << 11 = 0xF800, little-endian on the wire
        let pixel = 0xF800u16.to_le_bytes();
        assert_eq!(pixel_to_rgb(&pixel, &format, None).unwrap(), (255, 0, 0));

        // mid green: 32 << 5; 32 * 255 / 63 = 129.52... rounds to 130
        let pixel = (32u16 << 5).to_le_bytes();
        assert_eq!(pixel_to_rgb(&pixel, &format, None).unwrap(), (0, 130, 0));
    }

    #[test]
    fn test_scale_component_rounding() {
        assert_eq!(scale_component(0, 31), 0);
        assert_eq!(scale_component(31, 31), 255);
        assert_eq!(scale_component(15, 31), 123); // 123.38 rounds down
        assert_eq!(scale_component(1, 2), 128); // 127.5 rounds away from zero
        assert_eq!(scale_component(128, 255), 128);
        assert_eq!(scale_component(7, 0), 0);
    }

    #[test]
    fn test_palette_lookup() {
        let mut format = PixelFormat {
            true_colour_flag: 0,
            bits_per_pixel: 8,
            depth: 8,
            ..PixelFormat::rgba32()
        };
        format.big_endian_flag = 0;

        let mut map = ColorMap::new();
        map.set_entries(
            1,
            &[Color {
                r: 65535,
                g: 0,
                b: 32768,
            }],
        )
        .unwrap();

        assert_eq!(
            pixel_to_rgb(&[1], &format, Some(&map)).unwrap(),
            (255, 0, 128)
        );
        assert_eq!(pixel_to_rgb(&[0], &format, Some(&map)).unwrap(), (0, 0, 0));
        assert!(matches!(
            pixel_to_rgb(&[9], &format, None),
            Err(VncError::OutOfRange(9))
        ));
    }

    #[tokio::test]
    async fn test_read_pixels_forces_opaque_alpha() {
        let format = bgr888_be();
        let mut data: &[u8] = &[0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00];
        let rgba = read_pixels(&mut data, &format, None, 2).await.unwrap();
        assert_eq!(rgba, vec![255, 0, 0, 255, 0, 255, 0, 255]);
    }
}
