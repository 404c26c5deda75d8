//! VNC screenshot example.
//!
//! Connects to a VNC server, requests one full framebuffer update, composites
//! the decoded rectangles into a single image and writes it out as PNG.
//!
//! Usage:
//!   cargo run --example screenshot -- [host:port] [password] [output.png]

use rustvncclient::encoding::{self, HextileDecoder};
use rustvncclient::{ClientConfig, RectData, ServerMessage, VncAuth, VncClient};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "127.0.0.1:5900".to_string());
    let password = args.next();
    let output = args.next().unwrap_or_else(|| "screenshot.png".to_string());

    let mut config = ClientConfig::default();
    if let Some(password) = password {
        config.auth.push(Box::new(VncAuth::new(password)));
    }

    println!("Connecting to {address}...");
    let mut client = VncClient::connect(&address, config).await?;
    let width = client.framebuffer_width();
    let height = client.framebuffer_height();
    println!(
        "Connected to \"{}\" ({}x{})",
        client.desktop_name(),
        width,
        height
    );

    // Hextile preferred, Raw is implied
    client.set_encodings(vec![Box::new(HextileDecoder)]).await?;
    client
        .framebuffer_update_request(false, 0, 0, width, height)
        .await?;

    // Composite rectangles until the whole framebuffer has been painted once
    let mut framebuffer = vec![0u8; usize::from(width) * usize::from(height) * 4];
    let mut painted = 0usize;
    let total = usize::from(width) * usize::from(height);

    while painted < total {
        match client.receive_message().await? {
            ServerMessage::FramebufferUpdate { rectangles } => {
                for rect in &rectangles {
                    if let Some(rgba) = rect.data.rgba() {
                        blit(&mut framebuffer, usize::from(width), rect.x, rect.y, rect.width, rect.height, rgba);
                        painted += usize::from(rect.width) * usize::from(rect.height);
                    }
                    if let RectData::CopyRect { src_x, src_y } = rect.data {
                        copy_rect(&mut framebuffer, usize::from(width), src_x, src_y, rect.x, rect.y, rect.width, rect.height);
                        painted += usize::from(rect.width) * usize::from(rect.height);
                    }
                }
                println!("painted {} rectangles", rectangles.len());
            }
            ServerMessage::Bell => println!("bell!"),
            other => println!("ignoring {other:?}"),
        }
    }

    std::fs::write(&output, encoding::rgba_to_png(&framebuffer, width, height)?)?;
    println!("Saved {output}");

    client.close().await?;
    Ok(())
}

fn blit(fb: &mut [u8], stride: usize, x: u16, y: u16, w: u16, h: u16, rgba: &[u8]) {
    let (x, y, w, h) = (usize::from(x), usize::from(y), usize::from(w), usize::from(h));
    for row in 0..h {
        let src = row * w * 4;
        let dst = ((y + row) * stride + x) * 4;
        fb[dst..dst + w * 4].copy_from_slice(&rgba[src..src + w * 4]);
    }
}

#[allow(clippy::too_many_arguments)]
fn copy_rect(fb: &mut [u8], stride: usize, src_x: u16, src_y: u16, x: u16, y: u16, w: u16, h: u16) {
    let (w, h) = (usize::from(w), usize::from(h));
    for row in 0..h {
        let src = ((usize::from(src_y) + row) * stride + usize::from(src_x)) * 4;
        let dst = ((usize::from(y) + row) * stride + usize::from(x)) * 4;
        let line: Vec<u8> = fb[src..src + w * 4].to_vec();
        fb[dst..dst + w * 4].copy_from_slice(&line);
    }
}
