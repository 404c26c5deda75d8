//! VNC session event logger.
//!
//! Connects to a VNC server and logs every server message as it arrives,
//! continuously requesting incremental updates. Useful for watching what a
//! server actually sends.
//!
//! Usage:
//!   cargo run --example event_logger -- [host:port] [password]

use rustvncclient::encoding::{CursorDecoder, DesktopSizeDecoder, HextileDecoder};
use rustvncclient::{ClientConfig, ServerMessage, VncAuth, VncClient};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "127.0.0.1:5900".to_string());

    let mut config = ClientConfig::default();
    if let Some(password) = args.next() {
        config.auth.push(Box::new(VncAuth::new(password)));
    }

    let mut client = VncClient::connect(&address, config).await?;
    println!(
        "Connected to \"{}\" ({}x{}), protocol {:?}",
        client.desktop_name(),
        client.framebuffer_width(),
        client.framebuffer_height(),
        client.protocol_version()
    );

    client
        .set_encodings(vec![
            Box::new(HextileDecoder),
            Box::new(CursorDecoder),
            Box::new(DesktopSizeDecoder),
        ])
        .await?;

    let (width, height) = (client.framebuffer_width(), client.framebuffer_height());
    client
        .framebuffer_update_request(false, 0, 0, width, height)
        .await?;

    loop {
        match client.receive_message().await? {
            ServerMessage::FramebufferUpdate { rectangles } => {
                for rect in &rectangles {
                    println!(
                        "rect {}x{} at ({},{}): {}",
                        rect.width,
                        rect.height,
                        rect.x,
                        rect.y,
                        rect.data.rgba().map_or("no pixels".to_string(), |rgba| {
                            format!("{} RGBA bytes", rgba.len())
                        })
                    );
                }
                // keep the updates flowing
                let (width, height) = (client.framebuffer_width(), client.framebuffer_height());
                client
                    .framebuffer_update_request(true, 0, 0, width, height)
                    .await?;
            }
            ServerMessage::Bell => println!("bell!"),
            ServerMessage::ServerCutText { text } => println!("server clipboard: {text:?}"),
            ServerMessage::SetColorMapEntries { first_color, colors } => {
                println!("palette update: {} colors from {first_color}", colors.len());
            }
            ServerMessage::Extension { id, payload } => {
                println!("extension message {id}: {} bytes", payload.len());
            }
        }
    }
}
