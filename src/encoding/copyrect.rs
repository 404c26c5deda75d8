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

//! VNC CopyRect encoding decoder.
//!
//! CopyRect carries no pixel data at all: the payload is the source position
//! of a region already present in the client's framebuffer. Highly efficient
//! for scrolling. The actual pixel copy is left to whatever composites the
//! framebuffer; this decoder only parses the reference.

use async_trait::async_trait;

use super::{DecodeContext, Decoder, RectData};
use crate::error::Result;
use crate::protocol::ENCODING_COPYRECT;
use crate::wire;

/// Decodes the VNC "CopyRect" encoding (RFC 6143 Section 7.7.2).
pub struct CopyRectDecoder;

#[async_trait]
impl Decoder for CopyRectDecoder {
    fn encoding_type(&self) -> i32 {
        ENCODING_COPYRECT
    }

    async fn decode(
        &self,
        ctx: &mut DecodeContext<'_>,
        _width: u16,
        _height: u16,
    ) -> Result<RectData> {
        let src_x = wire::read_u16(ctx.reader).await?;
        let src_y = wire::read_u16(ctx.reader).await?;
        Ok(RectData::CopyRect { src_x, src_y })
    }
}
