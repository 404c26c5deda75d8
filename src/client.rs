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

//! VNC client connection handling and protocol implementation.
//!
//! This module manages a single VNC client session, handling:
//! - RFB protocol handshake and negotiation
//! - Server message dispatch (framebuffer updates, palette changes, etc.)
//! - Client message transmission (input events, update requests, etc.)
//! - Connection state management (pixel format, decoder registry, geometry)
//!
//! # Protocol Flow
//!
//! 1. **Handshake**: Protocol version exchange and security negotiation
//! 2. **Initialization**: Receive framebuffer dimensions and pixel format
//! 3. **Message Loop**: Receive server messages and send client messages
//!
//! The session is a plain owned value: one consumer calls
//! [`VncClient::receive_message`] in a loop while the producer methods send
//! input events. Both take `&mut self`, so the two directions are serialized
//! by ownership; callers that want concurrent halves wrap the client in
//! their own lock. Closing (or dropping) the transport cancels a pending
//! receive with an error.

use bytes::BytesMut;
use log::debug;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::auth::{ClientAuth, NoneAuth};
use crate::encoding::{Decoder, RawDecoder};
use crate::error::{Result, VncError};
use crate::messages::{self, ClientMessage, MessageContext, MessageReader, ServerMessage};
use crate::protocol::{
    ColorMap, PixelFormat, ProtocolVersion, ENCODING_RAW, SECURITY_RESULT_FAILED,
    SECURITY_RESULT_OK, SECURITY_RESULT_TOO_MANY, SECURITY_TYPE_NONE,
};
use crate::wire::{self, StreamReader, StreamWriter};

type BoxedReader = BufReader<Box<dyn AsyncRead + Unpin + Send>>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Configuration for opening a VNC client connection.
#[derive(Default)]
pub struct ClientConfig {
    /// Authentication schemes to offer, in preference order. The first
    /// scheme whose type appears in the server's list is used. When empty,
    /// [`NoneAuth`] is assumed.
    pub auth: Vec<Box<dyn ClientAuth>>,

    /// Whether the connection should be exclusive. If true, the server
    /// disconnects all other clients when this connection is established.
    pub exclusive: bool,

    /// Additional server-message readers beyond the four RFC-required kinds,
    /// which are always installed.
    pub server_messages: Vec<Box<dyn MessageReader>>,
}

/// Per-connection protocol state.
///
/// Mutated only by protocol events: `SetPixelFormat` replaces the format
/// (and its palette), `SetColorMapEntries` updates the palette, and the
/// DesktopSize pseudo-encoding resizes the framebuffer. All mutations happen
/// during message dispatch on the consumer side.
#[derive(Debug)]
pub struct ConnectionState {
    /// The pixel format in effect for incoming pixel data.
    pub pixel_format: PixelFormat,
    /// The palette; allocated exactly when the format is colormapped.
    pub color_map: Option<ColorMap>,
    /// Width of the framebuffer in pixels, as last reported by the server.
    pub framebuffer_width: u16,
    /// Height of the framebuffer in pixels, as last reported by the server.
    pub framebuffer_height: u16,
    /// Name associated with the desktop, sent by the server.
    pub desktop_name: String,
}

impl ConnectionState {
    fn new(width: u16, height: u16, desktop_name: String, format: PixelFormat) -> Self {
        let mut state = Self {
            pixel_format: PixelFormat::rgba32(),
            color_map: None,
            framebuffer_width: width,
            framebuffer_height: height,
            desktop_name,
        };
        state.install_pixel_format(format);
        state
    }

    /// Replaces the pixel format, resetting the palette as the RFC requires:
    /// colormapped formats always get a fresh 256-entry map, true-color
    /// formats get none.
    pub(crate) fn install_pixel_format(&mut self, format: PixelFormat) {
        self.color_map = if format.true_colour_flag == 0 {
            Some(ColorMap::new())
        } else {
            None
        };
        self.pixel_format = format;
    }
}

/// A VNC client session in the `Ready` state.
///
/// Created by [`VncClient::connect`] or [`VncClient::from_stream`], both of
/// which run the full RFB handshake before returning. Any error from the
/// handshake or from a later receive/send is fatal to the session; drop the
/// client (or call [`VncClient::close`]) and reconnect.
pub struct VncClient {
    reader: BoxedReader,
    writer: BoxedWriter,
    version: ProtocolVersion,
    security_type: u8,
    state: ConnectionState,
    decoders: HashMap<i32, Box<dyn Decoder>>,
    message_readers: HashMap<u8, Box<dyn MessageReader>>,
}

impl VncClient {
    /// Connects to a VNC server over TCP and performs the RFB handshake.
    ///
    /// # Arguments
    ///
    /// * `address` - The server address as `host:port`.
    /// * `config` - Connection configuration.
    ///
    /// # Errors
    ///
    /// Any transport or handshake failure; see [`VncError`].
    pub async fn connect(address: &str, config: ClientConfig) -> Result<Self> {
        let stream = TcpStream::connect(address).await?;
        // Disable Nagle's algorithm so input events go out immediately
        stream.set_nodelay(true)?;
        Self::from_stream(stream, config).await
    }

    /// Opens a session over an already-established byte stream.
    ///
    /// The transport can be anything implementing `AsyncRead + AsyncWrite +
    /// Unpin + Send`: a TCP stream, a TLS wrapper, a WebSocket adapter, an
    /// in-memory pipe for tests.
    ///
    /// # Arguments
    ///
    /// * `stream` - The byte-stream transport to the server.
    /// * `config` - Connection configuration.
    ///
    /// # Errors
    ///
    /// Any transport or handshake failure; see [`VncError`].
    pub async fn from_stream<S>(stream: S, config: ClientConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader: BoxedReader =
            BufReader::new(Box::new(read_half) as Box<dyn AsyncRead + Unpin + Send>);
        let mut writer: BoxedWriter = Box::new(write_half);

        let mut auth = config.auth;
        if auth.is_empty() {
            auth.push(Box::new(NoneAuth));
        }

        let version = negotiate_version(&mut reader, &mut writer).await?;
        let security_type = negotiate_security(&mut reader, &mut writer, version, &auth).await?;

        // The security result is implicit for the None scheme before 3.8
        if security_type != SECURITY_TYPE_NONE || version >= ProtocolVersion::V3_8 {
            read_security_result(&mut reader, version).await?;
        }

        let state = initialize(&mut reader, &mut writer, config.exclusive).await?;

        // Raw is mandatory and always registered
        let mut decoders: HashMap<i32, Box<dyn Decoder>> = HashMap::new();
        decoders.insert(ENCODING_RAW, Box::new(RawDecoder));

        let mut message_readers: HashMap<u8, Box<dyn MessageReader>> = HashMap::new();
        for reader_impl in messages::default_readers() {
            message_readers.insert(reader_impl.id(), reader_impl);
        }
        for reader_impl in config.server_messages {
            message_readers.insert(reader_impl.id(), reader_impl);
        }

        Ok(Self {
            reader,
            writer,
            version,
            security_type,
            state,
            decoders,
            message_readers,
        })
    }

    /// Receives the next server message, blocking until one arrives.
    ///
    /// The consumer is expected to call this in a loop and react: redraw on
    /// [`ServerMessage::FramebufferUpdate`], ring on [`ServerMessage::Bell`],
    /// and so on. Palette and desktop-size changes have already been applied
    /// to the connection state when the message is returned.
    ///
    /// # Errors
    ///
    /// [`VncError::UnknownServerMessage`] for unregistered ids, decoding
    /// errors and transport errors. All errors leave the stream unusable.
    pub async fn receive_message(&mut self) -> Result<ServerMessage> {
        let id = wire::read_u8(&mut self.reader).await?;
        let reader_impl = self
            .message_readers
            .get(&id)
            .ok_or(VncError::UnknownServerMessage(id))?;

        let mut ctx = MessageContext {
            reader: &mut self.reader,
            state: &mut self.state,
            decoders: &self.decoders,
        };
        reader_impl.read(&mut ctx).await
    }

    /// Serializes and sends a client message.
    ///
    /// The message is fully serialized before any bytes reach the transport,
    /// so a failed validation (such as non-Latin-1 cut text) sends nothing.
    ///
    /// # Errors
    ///
    /// [`VncError::InvalidText`] and transport errors.
    pub async fn send_message(&mut self, message: &ClientMessage) -> Result<()> {
        let mut buf = BytesMut::new();
        message.write_to(&mut buf)?;
        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Asks the server to switch to a new pixel format and installs it on
    /// the connection, allocating a fresh palette for colormapped formats.
    ///
    /// # Errors
    ///
    /// [`VncError::BadFraming`] for formats the client could never decode
    /// (bits per pixel outside 8/16/32), transport errors otherwise.
    pub async fn set_pixel_format(&mut self, format: PixelFormat) -> Result<()> {
        if !format.is_valid() {
            return Err(VncError::BadFraming(format!(
                "refusing to request undecodable pixel format {format:?}"
            )));
        }
        self.send_message(&ClientMessage::SetPixelFormat(format.clone()))
            .await?;
        self.state.install_pixel_format(format);
        Ok(())
    }

    /// Announces the encodings the client accepts and rebuilds the decoder
    /// registry to exactly these decoders plus the always-required Raw.
    ///
    /// # Arguments
    ///
    /// * `decoders` - Decoder instances in preference order; their type codes
    ///   are sent to the server in the same order.
    ///
    /// # Errors
    ///
    /// Transport errors.
    pub async fn set_encodings(&mut self, decoders: Vec<Box<dyn Decoder>>) -> Result<()> {
        let types: Vec<i32> = decoders.iter().map(|d| d.encoding_type()).collect();
        self.send_message(&ClientMessage::SetEncodings(types)).await?;

        let mut map: HashMap<i32, Box<dyn Decoder>> = HashMap::new();
        map.insert(ENCODING_RAW, Box::new(RawDecoder));
        for decoder in decoders {
            map.insert(decoder.encoding_type(), decoder);
        }
        self.decoders = map;
        Ok(())
    }

    /// Requests a framebuffer update for a region.
    ///
    /// # Arguments
    ///
    /// * `incremental` - If true, only changes since the last update.
    /// * `x`, `y`, `width`, `height` - The region of interest.
    ///
    /// # Errors
    ///
    /// Transport errors.
    pub async fn framebuffer_update_request(
        &mut self,
        incremental: bool,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    ) -> Result<()> {
        self.send_message(&ClientMessage::FramebufferUpdateRequest {
            incremental,
            x,
            y,
            width,
            height,
        })
        .await
    }

    /// Sends a key press or release.
    ///
    /// # Arguments
    ///
    /// * `down` - True for press, false for release.
    /// * `key` - The X Window System keysym.
    ///
    /// # Errors
    ///
    /// Transport errors.
    pub async fn key_event(&mut self, down: bool, key: u32) -> Result<()> {
        self.send_message(&ClientMessage::KeyEvent { down, key }).await
    }

    /// Sends a pointer position and button state.
    ///
    /// # Arguments
    ///
    /// * `button_mask` - Bitmask of pressed buttons (bit 0 = left).
    /// * `x`, `y` - Pointer position.
    ///
    /// # Errors
    ///
    /// Transport errors.
    pub async fn pointer_event(&mut self, button_mask: u8, x: u16, y: u16) -> Result<()> {
        self.send_message(&ClientMessage::PointerEvent { button_mask, x, y })
            .await
    }

    /// Sends clipboard text to the server.
    ///
    /// # Errors
    ///
    /// [`VncError::InvalidText`] if `text` contains characters above
    /// `U+00FF`; nothing is sent in that case.
    pub async fn cut_text(&mut self, text: &str) -> Result<()> {
        self.send_message(&ClientMessage::ClientCutText(text.to_string()))
            .await
    }

    /// Shuts down the write half of the transport, ending the session.
    ///
    /// # Errors
    ///
    /// Transport errors.
    pub async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// The protocol version agreed during the handshake.
    #[must_use]
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.version
    }

    /// The security type chosen during the handshake.
    #[must_use]
    pub fn security_type(&self) -> u8 {
        self.security_type
    }

    /// Current framebuffer width in pixels.
    #[must_use]
    pub fn framebuffer_width(&self) -> u16 {
        self.state.framebuffer_width
    }

    /// Current framebuffer height in pixels.
    #[must_use]
    pub fn framebuffer_height(&self) -> u16 {
        self.state.framebuffer_height
    }

    /// The desktop name announced by the server.
    #[must_use]
    pub fn desktop_name(&self) -> &str {
        &self.state.desktop_name
    }

    /// The pixel format currently in effect.
    #[must_use]
    pub fn pixel_format(&self) -> &PixelFormat {
        &self.state.pixel_format
    }
}

/// Reads the server's version token and answers with the version the session
/// will use (RFC 6143 Section 7.1.1).
async fn negotiate_version(
    reader: &mut StreamReader<'_>,
    writer: &mut StreamWriter<'_>,
) -> Result<ProtocolVersion> {
    let token = wire::read_exact_vec(reader, 12).await?;
    let (major, minor) = parse_version(&token)?;

    if major != 3 || minor < 3 {
        return Err(VncError::UnsupportedVersion(format!("RFB {major}.{minor}")));
    }

    // Later minors fall back to the newest handshake we speak
    let version = if minor < 7 {
        ProtocolVersion::V3_3
    } else if minor == 7 {
        ProtocolVersion::V3_7
    } else {
        ProtocolVersion::V3_8
    };

    writer.write_all(version.token().as_bytes()).await?;
    writer.flush().await?;
    debug!("negotiated protocol version {version:?}");
    Ok(version)
}

/// Parses a 12-byte `RFB xxx.yyy\n` token.
fn parse_version(token: &[u8]) -> Result<(u32, u32)> {
    let unsupported = || VncError::UnsupportedVersion(String::from_utf8_lossy(token).into_owned());

    let text = std::str::from_utf8(token).map_err(|_| unsupported())?;
    if text.len() != 12 || !text.starts_with("RFB ") || text.as_bytes()[7] != b'.' || !text.ends_with('\n')
    {
        return Err(unsupported());
    }

    let major = text[4..7].parse().map_err(|_| unsupported())?;
    let minor = text[8..11].parse().map_err(|_| unsupported())?;
    Ok((major, minor))
}

/// Runs the security phase (RFC 6143 Sections 7.1.2 and 7.2) and returns the
/// chosen security type.
async fn negotiate_security(
    reader: &mut StreamReader<'_>,
    writer: &mut StreamWriter<'_>,
    version: ProtocolVersion,
    auth: &[Box<dyn ClientAuth>],
) -> Result<u8> {
    let scheme: &dyn ClientAuth = if version >= ProtocolVersion::V3_7 {
        let count = wire::read_u8(reader).await?;
        if count == 0 {
            let reason = wire::read_u32_string(reader).await?;
            return Err(VncError::NoSecurityTypes(reason));
        }

        let offered = wire::read_exact_vec(reader, usize::from(count)).await?;
        let scheme = auth
            .iter()
            .find(|scheme| offered.contains(&scheme.security_type()))
            .ok_or_else(move || VncError::NoSuitableAuth(offered))?;

        writer.write_all(&[scheme.security_type()]).await?;
        writer.flush().await?;
        scheme.as_ref()
    } else {
        // In 3.3 the server dictates the type as a u32 and expects no reply
        let requested = wire::read_u32(reader).await?;
        if requested == 0 {
            let reason = wire::read_u32_string(reader).await?;
            return Err(VncError::NoSecurityTypes(reason));
        }

        auth.iter()
            .find(|scheme| u32::from(scheme.security_type()) == requested)
            .ok_or_else(|| VncError::NoSuitableAuth(vec![requested as u8]))?
            .as_ref()
    };

    debug!("authenticating with security type {}", scheme.security_type());
    scheme.handshake(reader, writer).await?;
    Ok(scheme.security_type())
}

/// Reads the security result (RFC 6143 Section 7.1.3).
async fn read_security_result(reader: &mut StreamReader<'_>, version: ProtocolVersion) -> Result<()> {
    let result = wire::read_u32(reader).await?;
    if result == SECURITY_RESULT_OK {
        return Ok(());
    }

    let mut message = match result {
        SECURITY_RESULT_FAILED => "security handshake failed".to_string(),
        SECURITY_RESULT_TOO_MANY => "security handshake failed (too many attempts)".to_string(),
        other => format!("security handshake failed (result {other})"),
    };

    // 3.8 follows every failure with a reason string
    if version >= ProtocolVersion::V3_8 {
        if let Ok(reason) = wire::read_u32_string(reader).await {
            message = format!("{message}: {reason}");
        }
    }

    Err(VncError::AuthFailed(message))
}

/// Exchanges ClientInit/ServerInit (RFC 6143 Section 7.3) and builds the
/// connection state from the server's answer.
async fn initialize(
    reader: &mut StreamReader<'_>,
    writer: &mut StreamWriter<'_>,
    exclusive: bool,
) -> Result<ConnectionState> {
    writer.write_all(&[u8::from(!exclusive)]).await?;
    writer.flush().await?;

    let width = wire::read_u16(reader).await?;
    let height = wire::read_u16(reader).await?;

    let format_bytes = wire::read_exact_vec(reader, 16).await?;
    let format = PixelFormat::from_bytes(&mut BytesMut::from(&format_bytes[..]))?;
    if !format.is_valid() {
        return Err(VncError::BadFraming(format!(
            "server announced undecodable pixel format {format:?}"
        )));
    }

    let desktop_name = wire::read_u32_string(reader).await?;
    debug!("session ready: {width}x{height} \"{desktop_name}\"");

    Ok(ConnectionState::new(width, height, desktop_name, format))
}
