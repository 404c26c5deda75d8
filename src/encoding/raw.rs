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

//! VNC Raw encoding decoder.
//!
//! The simplest encoding: `width * height` pixels in the negotiated pixel
//! format, row-major, no compression. High bandwidth but universally
//! supported, and the one decoder every connection must keep registered.

use async_trait::async_trait;

use super::{DecodeContext, Decoder, RectData};
use crate::error::Result;
use crate::protocol::ENCODING_RAW;

/// Decodes the VNC "Raw" encoding (RFC 6143 Section 7.7.1).
pub struct RawDecoder;

#[async_trait]
impl Decoder for RawDecoder {
    fn encoding_type(&self) -> i32 {
        ENCODING_RAW
    }

    async fn decode(
        &self,
        ctx: &mut DecodeContext<'_>,
        width: u16,
        height: u16,
    ) -> Result<RectData> {
        let rgba = ctx
            .read_pixels(usize::from(width) * usize::from(height))
            .await?;
        Ok(RectData::Raw { rgba })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PixelFormat;

    #[tokio::test]
    async fn test_raw_decode_2x2() {
        // 32bpp big-endian 0x00RRGGBB
        let format = PixelFormat {
            big_endian_flag: 1,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
            ..PixelFormat::rgba32()
        };
        let mut data: &[u8] = &[
            0x00, 0xFF, 0x00, 0x00, // red
            0x00, 0x00, 0xFF, 0x00, // green
            0x00, 0x00, 0x00, 0xFF, // blue
            0x00, 0x10, 0x20, 0x30,
        ];
        let mut ctx = DecodeContext {
            reader: &mut data,
            format: &format,
            color_map: None,
        };

        let decoded = RawDecoder.decode(&mut ctx, 2, 2).await.unwrap();
        let rgba = decoded.rgba().unwrap();
        assert_eq!(
            rgba,
            &[
                255, 0, 0, 255, //
                0, 255, 0, 255, //
                0, 0, 255, 255, //
                0x10, 0x20, 0x30, 255,
            ]
        );
    }
}
