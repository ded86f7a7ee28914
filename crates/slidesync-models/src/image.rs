//! Encoded image payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// JPEG MIME type used for sampled frames.
pub const MIME_JPEG: &str = "image/jpeg";
/// PNG MIME type, the usual output of page rasterizers.
pub const MIME_PNG: &str = "image/png";

/// An encoded image held in memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    /// MIME type of `data` (e.g. "image/jpeg")
    pub mime_type: String,
    /// Encoded bytes
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
            width,
            height,
        }
    }

    /// Create a JPEG payload.
    pub fn jpeg(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::new(MIME_JPEG, data, width, height)
    }

    /// Standard base64 encoding of the bytes, as inline request payloads expect.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Size of the encoded payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Hand-written so logs never dump megabytes of pixel data.
impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_encoding() {
        let image = ImageData::jpeg(b"hello".to_vec(), 1, 1);
        assert_eq!(image.to_base64(), "aGVsbG8=");
        assert_eq!(image.mime_type, MIME_JPEG);
        assert_eq!(image.len(), 5);
    }

    #[test]
    fn test_debug_omits_bytes() {
        let image = ImageData::new(MIME_PNG, vec![0u8; 4096], 64, 16);
        let rendered = format!("{:?}", image);
        assert!(rendered.contains("bytes: 4096"));
        assert!(!rendered.contains("0, 0, 0"));
    }
}
