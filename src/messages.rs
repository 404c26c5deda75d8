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

//! Typed RFB message codecs.
//!
//! The server-to-client direction is a registry of [`MessageReader`]s keyed
//! by the one-byte message id; the session reads the id and delegates the
//! rest of the message to the reader for that kind. The four RFC-required
//! kinds are always registered; callers can register additional readers for
//! protocol extensions.
//!
//! The client-to-server direction is the [`ClientMessage`] enum, serialized
//! into a single buffer so each message reaches the transport in one write.

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use log::warn;
use std::collections::HashMap;

use crate::client::ConnectionState;
use crate::encoding::{DecodeContext, Decoder, RectData};
use crate::error::{Result, VncError};
use crate::protocol::{
    Color, PixelFormat, Rectangle, CLIENT_MSG_CLIENT_CUT_TEXT, CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST,
    CLIENT_MSG_KEY_EVENT, CLIENT_MSG_POINTER_EVENT, CLIENT_MSG_SET_ENCODINGS,
    CLIENT_MSG_SET_PIXEL_FORMAT, SERVER_MSG_BELL, SERVER_MSG_FRAMEBUFFER_UPDATE,
    SERVER_MSG_SERVER_CUT_TEXT, SERVER_MSG_SET_COLOUR_MAP_ENTRIES,
};
use crate::wire::{self, StreamReader};

/// A message received from the server.
#[derive(Debug)]
pub enum ServerMessage {
    /// A framebuffer update with its rectangles already decoded, in the
    /// order the server sent them.
    FramebufferUpdate {
        /// The update's rectangles.
        rectangles: Vec<Rectangle>,
    },

    /// A palette update for colormapped pixel formats.
    ///
    /// The update has already been applied to the connection's color map
    /// when this value is returned; the colors are included for consumers
    /// that track the palette themselves.
    SetColorMapEntries {
        /// Index of the first entry to replace.
        first_color: u16,
        /// The replacement colors.
        colors: Vec<Color>,
    },

    /// The server rang the bell.
    Bell,

    /// New clipboard text from the server.
    ServerCutText {
        /// The clipboard contents (Latin-1 on the wire).
        text: String,
    },

    /// A message kind handled by a caller-registered [`MessageReader`].
    Extension {
        /// The message id byte.
        id: u8,
        /// Whatever the custom reader collected.
        payload: Vec<u8>,
    },
}

/// Everything a [`MessageReader`] may touch while decoding one message.
///
/// Borrowed from the connection for the duration of one message: the read
/// half of the transport, the mutable connection state (pixel format,
/// palette, framebuffer geometry), and the rectangle-decoder registry.
pub struct MessageContext<'a> {
    /// The connection's buffered read half.
    pub reader: &'a mut StreamReader<'a>,
    /// Connection state; message side effects (palette updates, desktop
    /// resizes) are applied here during the read.
    pub state: &'a mut ConnectionState,
    /// The rectangle decoders currently registered on the connection.
    pub decoders: &'a HashMap<i32, Box<dyn Decoder>>,
}

/// A decoder for one server-message kind.
///
/// Implementations read everything after the message-id byte. Custom kinds
/// should return [`ServerMessage::Extension`].
#[async_trait]
pub trait MessageReader: Send + Sync {
    /// The message id this reader handles.
    fn id(&self) -> u8;

    /// Reads the message body (the id byte has already been consumed).
    async fn read(&self, ctx: &mut MessageContext<'_>) -> Result<ServerMessage>;
}

/// Builds the four RFC-required message readers every connection installs.
#[must_use]
pub fn default_readers() -> Vec<Box<dyn MessageReader>> {
    vec![
        Box::new(FramebufferUpdateReader),
        Box::new(SetColorMapEntriesReader),
        Box::new(BellReader),
        Box::new(ServerCutTextReader),
    ]
}

/// Reads `FramebufferUpdate` messages (RFC 6143 Section 7.6.1).
pub struct FramebufferUpdateReader;

#[async_trait]
impl MessageReader for FramebufferUpdateReader {
    fn id(&self) -> u8 {
        SERVER_MSG_FRAMEBUFFER_UPDATE
    }

    async fn read(&self, ctx: &mut MessageContext<'_>) -> Result<ServerMessage> {
        wire::skip_padding(ctx.reader, 1).await?;
        let count = wire::read_u16(ctx.reader).await?;

        let mut rectangles = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let x = wire::read_u16(ctx.reader).await?;
            let y = wire::read_u16(ctx.reader).await?;
            let width = wire::read_u16(ctx.reader).await?;
            let height = wire::read_u16(ctx.reader).await?;
            let encoding = wire::read_i32(ctx.reader).await?;

            if x.checked_add(width).is_none() || y.checked_add(height).is_none() {
                return Err(VncError::BadFraming(format!(
                    "rectangle {x},{y} {width}x{height} exceeds the u16 coordinate space"
                )));
            }

            let decoder = ctx
                .decoders
                .get(&encoding)
                .ok_or(VncError::UnsupportedEncoding(encoding))?;

            let data = {
                let mut decode_ctx = DecodeContext {
                    reader: &mut *ctx.reader,
                    format: &ctx.state.pixel_format,
                    color_map: ctx.state.color_map.as_ref(),
                };
                decoder.decode(&mut decode_ctx, width, height).await?
            };

            // A desktop resize takes effect as soon as it is dispatched
            if matches!(data, RectData::DesktopSize) {
                ctx.state.framebuffer_width = width;
                ctx.state.framebuffer_height = height;
            }

            rectangles.push(Rectangle {
                x,
                y,
                width,
                height,
                data,
            });
        }

        Ok(ServerMessage::FramebufferUpdate { rectangles })
    }
}

/// Reads `SetColorMapEntries` messages (RFC 6143 Section 7.6.2).
///
/// Besides returning the colors, the reader installs them into the
/// connection's color map so that subsequent colormapped pixels resolve
/// against the updated palette.
pub struct SetColorMapEntriesReader;

#[async_trait]
impl MessageReader for SetColorMapEntriesReader {
    fn id(&self) -> u8 {
        SERVER_MSG_SET_COLOUR_MAP_ENTRIES
    }

    async fn read(&self, ctx: &mut MessageContext<'_>) -> Result<ServerMessage> {
        wire::skip_padding(ctx.reader, 1).await?;
        let first_color = wire::read_u16(ctx.reader).await?;
        let count = wire::read_u16(ctx.reader).await?;

        let mut colors = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            colors.push(Color {
                r: wire::read_u16(ctx.reader).await?,
                g: wire::read_u16(ctx.reader).await?,
                b: wire::read_u16(ctx.reader).await?,
            });
        }

        match ctx.state.color_map.as_mut() {
            Some(map) => map.set_entries(first_color, &colors)?,
            None => warn!(
                "ignoring SetColorMapEntries for true-color connection ({} colors)",
                colors.len()
            ),
        }

        Ok(ServerMessage::SetColorMapEntries {
            first_color,
            colors,
        })
    }
}

/// Reads `Bell` messages (RFC 6143 Section 7.6.3). There is no body.
pub struct BellReader;

#[async_trait]
impl MessageReader for BellReader {
    fn id(&self) -> u8 {
        SERVER_MSG_BELL
    }

    async fn read(&self, _ctx: &mut MessageContext<'_>) -> Result<ServerMessage> {
        Ok(ServerMessage::Bell)
    }
}

/// Reads `ServerCutText` messages (RFC 6143 Section 7.6.4).
pub struct ServerCutTextReader;

#[async_trait]
impl MessageReader for ServerCutTextReader {
    fn id(&self) -> u8 {
        SERVER_MSG_SERVER_CUT_TEXT
    }

    async fn read(&self, ctx: &mut MessageContext<'_>) -> Result<ServerMessage> {
        wire::skip_padding(ctx.reader, 3).await?;
        let text = wire::read_u32_string(ctx.reader).await?;
        Ok(ServerMessage::ServerCutText { text })
    }
}

/// Represents all possible message types that can be sent from a VNC client
/// to the server.
///
/// This enum encapsulates the various client messages defined in the RFB
/// protocol, making it easier to send client input in a type-safe manner.
/// Serialization produces the exact RFC 6143 layouts including padding.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// Client requests a specific pixel format for framebuffer updates.
    SetPixelFormat(PixelFormat),

    /// Client specifies the list of encodings it supports, by type code,
    /// ordered by preference.
    SetEncodings(Vec<i32>),

    /// Client requests a framebuffer update for a specific region.
    FramebufferUpdateRequest {
        /// If true, only send changes since the last update; if false, send a
        /// full refresh.
        incremental: bool,
        /// X coordinate of the requested region.
        x: u16,
        /// Y coordinate of the requested region.
        y: u16,
        /// Width of the requested region.
        width: u16,
        /// Height of the requested region.
        height: u16,
    },

    /// Client sends a keyboard key event.
    KeyEvent {
        /// True if the key is pressed, false if released.
        down: bool,
        /// The X Window System keysym value of the key.
        key: u32,
    },

    /// Client sends a pointer (mouse) event.
    PointerEvent {
        /// Bitmask of currently pressed mouse buttons.
        button_mask: u8,
        /// X coordinate of the pointer.
        x: u16,
        /// Y coordinate of the pointer.
        y: u16,
    },

    /// Client sends clipboard (cut text) data. Latin-1 only.
    ClientCutText(String),
}

impl ClientMessage {
    /// Serializes the message into a byte buffer, including the message id.
    ///
    /// # Errors
    ///
    /// Returns [`VncError::InvalidText`] for `ClientCutText` containing
    /// characters above `U+00FF`; the buffer is left untouched in that case.
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            ClientMessage::SetPixelFormat(format) => {
                buf.put_u8(CLIENT_MSG_SET_PIXEL_FORMAT);
                buf.put_bytes(0, 3); // padding
                format.write_to(buf);
            }
            ClientMessage::SetEncodings(encodings) => {
                buf.put_u8(CLIENT_MSG_SET_ENCODINGS);
                buf.put_bytes(0, 1); // padding
                buf.put_u16(encodings.len() as u16);
                for &encoding in encodings {
                    buf.put_i32(encoding);
                }
            }
            ClientMessage::FramebufferUpdateRequest {
                incremental,
                x,
                y,
                width,
                height,
            } => {
                buf.put_u8(CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST);
                buf.put_u8(u8::from(*incremental));
                buf.put_u16(*x);
                buf.put_u16(*y);
                buf.put_u16(*width);
                buf.put_u16(*height);
            }
            ClientMessage::KeyEvent { down, key } => {
                buf.put_u8(CLIENT_MSG_KEY_EVENT);
                buf.put_u8(u8::from(*down));
                buf.put_bytes(0, 2); // padding
                buf.put_u32(*key);
            }
            ClientMessage::PointerEvent { button_mask, x, y } => {
                buf.put_u8(CLIENT_MSG_POINTER_EVENT);
                buf.put_u8(*button_mask);
                buf.put_u16(*x);
                buf.put_u16(*y);
            }
            ClientMessage::ClientCutText(text) => {
                // Validate and encode before touching the buffer so a
                // rejected message never emits partial bytes.
                let bytes = wire::string_to_latin1(text)?;
                buf.put_u8(CLIENT_MSG_CLIENT_CUT_TEXT);
                buf.put_bytes(0, 3); // padding
                buf.put_u32(bytes.len() as u32);
                buf.put_slice(&bytes);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize(msg: &ClientMessage) -> Vec<u8> {
        let mut buf = BytesMut::new();
        msg.write_to(&mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn test_set_pixel_format_layout() {
        let bytes = serialize(&ClientMessage::SetPixelFormat(PixelFormat::rgba32()));
        assert_eq!(bytes.len(), 20); // id + 3 pad + 16-byte record
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
        assert_eq!(bytes[4], 32); // bits per pixel
        assert_eq!(bytes[5], 24); // depth
        assert_eq!(&bytes[8..10], &[0, 255]); // red max, big-endian
    }

    #[test]
    fn test_set_encodings_layout() {
        let bytes = serialize(&ClientMessage::SetEncodings(vec![5, 1, -239]));
        assert_eq!(
            bytes,
            vec![
                2, 0, // id, padding
                0, 3, // count
                0, 0, 0, 5, // Hextile
                0, 0, 0, 1, // CopyRect
                0xFF, 0xFF, 0xFF, 0x11, // Cursor (-239)
            ]
        );
    }

    #[test]
    fn test_framebuffer_update_request_layout() {
        let bytes = serialize(&ClientMessage::FramebufferUpdateRequest {
            incremental: true,
            x: 10,
            y: 20,
            width: 640,
            height: 480,
        });
        assert_eq!(
            bytes,
            vec![3, 1, 0, 10, 0, 20, 0x02, 0x80, 0x01, 0xE0]
        );
    }

    #[test]
    fn test_key_event_layout() {
        let bytes = serialize(&ClientMessage::KeyEvent {
            down: true,
            key: 0xFF0D, // Return keysym
        });
        assert_eq!(bytes, vec![4, 1, 0, 0, 0x00, 0x00, 0xFF, 0x0D]);
    }

    #[test]
    fn test_pointer_event_layout() {
        let bytes = serialize(&ClientMessage::PointerEvent {
            button_mask: 0b0000_0001,
            x: 300,
            y: 200,
        });
        assert_eq!(bytes, vec![5, 1, 0x01, 0x2C, 0x00, 0xC8]);
    }

    #[test]
    fn test_client_cut_text_layout() {
        let bytes = serialize(&ClientMessage::ClientCutText("hi".to_string()));
        assert_eq!(bytes, vec![6, 0, 0, 0, 0, 0, 0, 2, b'h', b'i']);
    }

    #[test]
    fn test_client_cut_text_rejects_non_latin1() {
        let mut buf = BytesMut::new();
        let msg = ClientMessage::ClientCutText("\u{100}".to_string());
        assert!(matches!(
            msg.write_to(&mut buf),
            Err(VncError::InvalidText('\u{100}'))
        ));
        assert!(buf.is_empty(), "no bytes may be emitted for rejected text");
    }
}
