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

//! VNC DesktopSize pseudo-encoding decoder.
//!
//! A rectangle with this encoding announces that the server's framebuffer
//! changed size; the new dimensions travel in the rectangle header and there
//! is no payload to read. The session updates its stored framebuffer
//! dimensions when it dispatches the rectangle.

use async_trait::async_trait;

use super::{DecodeContext, Decoder, RectData};
use crate::error::Result;
use crate::protocol::ENCODING_DESKTOP_SIZE;

/// Decodes the "DesktopSize" pseudo-encoding (RFC 6143 Section 7.8.2).
pub struct DesktopSizeDecoder;

#[async_trait]
impl Decoder for DesktopSizeDecoder {
    fn encoding_type(&self) -> i32 {
        ENCODING_DESKTOP_SIZE
    }

    async fn decode(
        &self,
        _ctx: &mut DecodeContext<'_>,
        _width: u16,
        _height: u16,
    ) -> Result<RectData> {
        Ok(RectData::DesktopSize)
    }
}
