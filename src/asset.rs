//! Image assets coming from the character, scene and panel libraries

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::StudioResult;

/// An externally generated image record.
///
/// `base64` holds the encoded pixel payload (JPEG or PNG) without the
/// `data:` URL prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub prompt: String,
    pub base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Asset {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            base64: base64.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name if present, otherwise the generation prompt
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.prompt)
    }

    /// Raw encoded bytes of the payload
    pub fn payload_bytes(&self) -> StudioResult<Vec<u8>> {
        Ok(STANDARD.decode(strip_data_url(&self.base64).trim())?)
    }

    /// Decode the payload into pixels
    pub fn decode(&self) -> StudioResult<DynamicImage> {
        let bytes = self.payload_bytes()?;
        Ok(image::load_from_memory(&bytes)?)
    }
}

/// Content of a panel slot: either an unfilled placeholder or an asset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PanelImage {
    #[default]
    Empty,
    Filled(Asset),
}

impl PanelImage {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, PanelImage::Empty)
    }

    pub fn asset(&self) -> Option<&Asset> {
        match self {
            PanelImage::Empty => None,
            PanelImage::Filled(asset) => Some(asset),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PanelImage::Empty => "Empty",
            PanelImage::Filled(asset) => asset.label(),
        }
    }
}

impl From<Asset> for PanelImage {
    fn from(asset: Asset) -> Self {
        PanelImage::Filled(asset)
    }
}

/// Strips a `data:<mime>;base64,` prefix if present
pub fn strip_data_url(payload: &str) -> &str {
    if payload.starts_with("data:") {
        match payload.split_once(',') {
            Some((_, data)) => data,
            None => payload,
        }
    } else {
        payload
    }
}

/// Encode raw image bytes as a library payload
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_payload(color: [u8; 3]) -> String {
        let img = RgbImage::from_pixel(4, 4, Rgb(color));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        encode_payload(&out.into_inner())
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
    }

    #[test]
    fn test_decode_png_payload() {
        let asset = Asset::new("scene-1", "red room", png_payload([255, 0, 0]));
        let img = asset.decode().unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (4, 4));
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_decode_data_url_payload() {
        let payload = format!("data:image/png;base64,{}", png_payload([0, 0, 255]));
        let asset = Asset::new("p", "blue", payload);
        assert!(asset.decode().is_ok());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let asset = Asset::new("p", "broken", "not base64 at all!");
        assert!(asset.decode().is_err());
        let asset = Asset::new("p", "not an image", encode_payload(b"hello"));
        assert!(asset.decode().is_err());
    }

    #[test]
    fn test_label_prefers_name() {
        let asset = Asset::new("c", "a tall hero", "").with_name("Max");
        assert_eq!(asset.label(), "Max");
        assert_eq!(PanelImage::Empty.label(), "Empty");
        assert!(PanelImage::Empty.is_placeholder());
        assert!(!PanelImage::from(asset).is_placeholder());
    }

    #[test]
    fn test_optional_name_serialization() {
        let asset = Asset::new("s", "forest", "AAAA");
        let json = serde_json::to_string(&asset).unwrap();
        assert!(!json.contains("name"));
        let back: Asset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, asset);
    }
}
