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


//! # rustvncclient
//!
//! A pure Rust implementation of a VNC (Virtual Network Computing) client.
//!
//! This library implements the client side of the RFB (Remote Framebuffer)
//! protocol specification (RFC 6143): the version/security/init handshake,
//! typed server and client messages, and decoders for the standard rectangle
//! encodings, all producing normalized RGBA pixel data.
//!
//! ## Features
//!
//! - **Protocol versions**: RFB 3.3, 3.7 and 3.8 (newer servers negotiate down)
//! - **Authentication**: None and VNC (DES challenge-response)
//! - **Encodings**: Raw, CopyRect, Hextile, plus the Cursor and DesktopSize
//!   pseudo-encodings; additional decoders can be registered at runtime
//! - **Pixel formats**: 8/16/32-bit, true-color and colormapped, either
//!   byte order
//! - **Async I/O**: Built on Tokio; any `AsyncRead + AsyncWrite` transport
//! - **Memory safe**: Pure Rust with no unsafe code
//!
//! ## Quick Start
//!
//! ```no_run
//! use rustvncclient::{ClientConfig, VncClient, ServerMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run the RFB handshake
//!     let mut client = VncClient::connect("127.0.0.1:5900", ClientConfig::default()).await?;
//!
//!     // Ask for the whole framebuffer...
//!     let (width, height) = (client.framebuffer_width(), client.framebuffer_height());
//!     client.framebuffer_update_request(false, 0, 0, width, height).await?;
//!
//!     // ...and react to whatever the server sends
//!     loop {
//!         match client.receive_message().await? {
//!             ServerMessage::FramebufferUpdate { rectangles } => {
//!                 println!("update with {} rectangles", rectangles.len());
//!             }
//!             ServerMessage::Bell => println!("bell!"),
//!             _ => {}
//!         }
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Your Application              │
//! │                                         │
//! │  • Composite decoded rectangles         │
//! │  • Send input events                    │
//! │  • Control session lifecycle            │
//! └──────────────────┬──────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │           VncClient (Public)            │
//! │                                         │
//! │  • Handshake state machine              │
//! │  • Server message dispatch              │
//! │  • Client message serialization         │
//! └──────────────────┬──────────────────────┘
//!                    │
//!        ┌───────────┼───────────┐
//!        ▼           ▼           ▼
//!   ┌────────┐ ┌──────────┐ ┌─────────┐
//!   │messages│ │ encoding │ │  auth   │
//!   └────────┘ └──────────┘ └─────────┘
//!        │           │           │
//!        └───────────┴───────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │        wire / translate (Internal)      │
//! │                                         │
//! │  • Big-endian scalar codec              │
//! │  • Pixel-format → RGBA conversion       │
//! └─────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod client;
pub mod encoding;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod translate;
pub mod wire;

// Re-exports
pub use auth::{ClientAuth, NoneAuth, VncAuth};
pub use client::{ClientConfig, ConnectionState, VncClient};
pub use encoding::{Decoder, RectData};
pub use error::{Result, VncError};
pub use messages::{ClientMessage, MessageReader, ServerMessage};
pub use protocol::{Color, ColorMap, PixelFormat, ProtocolVersion, Rectangle};

/// Default VNC port.
pub const DEFAULT_PORT: u16 = 5900;
