use bytes::Bytes;
use std::time::SystemTime;

/// An in-memory file: what the browser would hand over as a `File`.
///
/// Used both for uploads going into the compressor and for the re-encoded
/// result coming out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
    pub last_modified: SystemTime,
    /// Pixel size, known only once the compressor has decoded the file.
    pub dimensions: Option<(u32, u32)>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
            last_modified: SystemTime::now(),
            dimensions: None,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Case-sensitive `image/` prefix check, as browsers report MIME types.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Guesses a MIME type from the file extension, for uploads that arrive
    /// without a content type.
    pub fn mime_from_name(name: &str) -> &'static str {
        let extension = std::path::Path::new(name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match extension.as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            Some("tif") | Some("tiff") => "image/tiff",
            _ => "application/octet-stream",
        }
    }
}
