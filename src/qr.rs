use crate::error::QrError;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;

/// Turns a payload into encoded image bytes (PNG or JPEG) that the sink can
/// place. Implementations must be deterministic for a given payload.
pub trait QrEncoder: Send + Sync {
    fn encode(&self, payload: &str) -> Result<Vec<u8>, QrError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrCodeEncoder {
    /// Minimum rendered edge in pixels.
    pub min_pixels: u32,
}

impl Default for QrCodeEncoder {
    fn default() -> Self {
        Self { min_pixels: 240 }
    }
}

impl QrEncoder for QrCodeEncoder {
    fn encode(&self, payload: &str) -> Result<Vec<u8>, QrError> {
        if payload.trim().is_empty() {
            return Err(QrError::Encode("empty payload".to_string()));
        }
        let code = QrCode::new(payload.as_bytes()).map_err(|e| QrError::Encode(e.to_string()))?;
        let pixels = code
            .render::<Luma<u8>>()
            .min_dimensions(self.min_pixels, self.min_pixels)
            .quiet_zone(true)
            .build();
        let mut out = Vec::new();
        DynamicImage::ImageLuma8(pixels)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| QrError::Image(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_wallet_address_as_png() {
        let bytes = QrCodeEncoder::default()
            .encode("0x52908400098527886E0F7030069857D2E4169EE7")
            .expect("encodes");
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
        let decoded = image::load_from_memory(&bytes).expect("decodes");
        assert!(decoded.width() >= 240);
        assert_eq!(decoded.width(), decoded.height());
    }

    #[test]
    fn encoding_is_deterministic() {
        let encoder = QrCodeEncoder::default();
        assert_eq!(
            encoder.encode("bc1qexample").expect("first"),
            encoder.encode("bc1qexample").expect("second")
        );
    }

    #[test]
    fn empty_and_oversized_payloads_fail() {
        let encoder = QrCodeEncoder::default();
        assert!(matches!(encoder.encode("  "), Err(QrError::Encode(_))));
        let huge = "x".repeat(8000);
        assert!(matches!(encoder.encode(&huge), Err(QrError::Encode(_))));
    }
}
