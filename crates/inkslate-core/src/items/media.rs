//! Resource-backed items: images, PDF pages, audio/video and widgets.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Image format for embedded or linked image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
    Bmp,
}

impl ImageFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/webp" => Some(ImageFormat::WebP),
            "image/gif" => Some(ImageFormat::Gif),
            "image/bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::WebP),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }

        if data.starts_with(b"GIF8") {
            return Some(ImageFormat::Gif);
        }

        if data.starts_with(b"BM") {
            return Some(ImageFormat::Bmp);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }

        None
    }
}

/// Content of a resource-backed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResourceRef {
    /// A file on disk. `missing` is set when the reader could not find it.
    File { path: PathBuf, missing: bool },
    /// Image data stored inline, base64 encoded.
    Embedded { format: ImageFormat, data_base64: String },
}

impl ResourceRef {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ResourceRef::File {
            path: path.into(),
            missing: false,
        }
    }

    pub fn embedded(format: ImageFormat, data: &[u8]) -> Self {
        ResourceRef::Embedded {
            format,
            data_base64: STANDARD.encode(data),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ResourceRef::File { path, .. } => Some(path),
            ResourceRef::Embedded { .. } => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ResourceRef::File { missing: true, .. })
    }

    /// Raw bytes of embedded data (decoded from base64).
    pub fn data(&self) -> Option<Vec<u8>> {
        match self {
            ResourceRef::Embedded { data_base64, .. } => STANDARD.decode(data_base64).ok(),
            ResourceRef::File { .. } => None,
        }
    }

    /// `data:` URI for embedded data.
    pub fn data_uri(&self) -> Option<String> {
        match self {
            ResourceRef::Embedded { format, data_base64 } => {
                Some(format!("data:{};base64,{}", format.mime_type(), data_base64))
            }
            ResourceRef::File { .. } => None,
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime = header.strip_suffix(";base64")?;
        let format = ImageFormat::from_mime_type(mime)?;
        let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(&payload).ok()?;
        Some(ResourceRef::Embedded {
            format,
            data_base64: payload,
        })
    }
}

/// Raster image, optionally the page background.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PixmapItem {
    /// `None` for a placeholder whose link was absent.
    pub resource: Option<ResourceRef>,
    pub background: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VectorImageItem {
    pub resource: Option<ResourceRef>,
}

/// One page of a PDF file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfPageItem {
    pub resource: Option<ResourceRef>,
    /// 1-based page number.
    pub page: u32,
}

impl Default for PdfPageItem {
    fn default() -> Self {
        Self { resource: None, page: 1 }
    }
}

/// Audio or video clip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaItem {
    pub resource: Option<ResourceRef>,
    pub muted: bool,
}

/// Native or web widget with its persisted key/value state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WidgetItem {
    pub resource: Option<ResourceRef>,
    pub preferences: Vec<(String, String)>,
    pub datastore: Vec<(String, String)>,
}

impl WidgetItem {
    pub fn preference(&self, key: &str) -> Option<&str> {
        self.preferences
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace a preference, keeping insertion order.
    pub fn set_preference(&mut self, key: impl Into<String>, value: impl Into<String>) {
        set_entry(&mut self.preferences, key.into(), value.into());
    }

    pub fn set_datastore_entry(&mut self, key: impl Into<String>, value: impl Into<String>) {
        set_entry(&mut self.datastore, key.into(), value.into());
    }
}

fn set_entry(entries: &mut Vec<(String, String)>, key: String, value: String) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}
