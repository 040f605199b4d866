//! Screenshot capture and encoding

use base64::{engine::general_purpose, Engine as _};
use std::io::Cursor;
use tracing::{debug, warn};

use super::connection::AdbConnection;
use crate::error::Result;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// A captured screen, ready for the wire
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub base64_data: String,
    pub width: u32,
    pub height: u32,
}

/// Capture the screen as PNG bytes.
///
/// Secure windows make `screencap` emit nothing (or an error line); that is
/// reported as `None` rather than an error.
pub async fn capture_png(conn: &AdbConnection) -> Result<Option<Vec<u8>>> {
    let bytes = conn.exec_out(&["screencap", "-p"]).await?;
    debug!("screencap returned {} bytes", bytes.len());

    if !bytes.starts_with(PNG_SIGNATURE) {
        warn!(
            "screencap produced no PNG ({}), screen is probably protected",
            String::from_utf8_lossy(&bytes[..bytes.len().min(64)]).trim()
        );
        return Ok(None);
    }
    Ok(Some(bytes))
}

/// Decode `png` to learn its size and re-encode it as base64 PNG.
pub fn encode_screenshot(png: &[u8]) -> Result<Screenshot> {
    let img = image::load_from_memory(png)?;
    let (width, height) = (img.width(), img.height());
    debug!("Screenshot dimensions: {}x{}", width, height);

    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)?;

    Ok(Screenshot {
        base64_data: general_purpose::STANDARD.encode(&buffer),
        width,
        height,
    })
}

#[cfg(test)]
pub(crate) fn solid_png(width: u32, height: u32) -> Vec<u8> {
    use image::{ImageBuffer, Rgb};

    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(width, height, Rgb([12, 34, 56]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}
