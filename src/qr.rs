use std::io::Cursor;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

/// Absolute URL of the admin surface, suitable for a QR code on the frame.
///
/// A configured public URL wins; otherwise the request's `Host` header, and
/// finally the bind address.
pub fn admin_url(public_url: Option<&str>, host: Option<&str>, bind: SocketAddr) -> String {
    if let Some(url) = public_url.map(str::trim).filter(|url| !url.is_empty()) {
        return format!("{}/", url.trim_end_matches('/'));
    }
    match host.map(str::trim).filter(|host| !host.is_empty()) {
        Some(host) => format!("http://{host}/"),
        None => format!("http://{bind}/"),
    }
}

pub fn render_png(url: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(url.as_bytes()).context("failed to generate QR code")?;
    let image = code.render::<Luma<u8>>().min_dimensions(256, 256).build();
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("failed to encode QR code")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_public_url_then_host_then_bind() {
        let bind: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        assert_eq!(
            admin_url(Some("https://frame.example/"), Some("ignored:1"), bind),
            "https://frame.example/"
        );
        assert_eq!(
            admin_url(None, Some("192.168.1.20:8080"), bind),
            "http://192.168.1.20:8080/"
        );
        assert_eq!(admin_url(Some("  "), None, bind), "http://0.0.0.0:8080/");
    }

    #[test]
    fn renders_png_bytes() {
        let png = render_png("http://frame.local:8080/").unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
