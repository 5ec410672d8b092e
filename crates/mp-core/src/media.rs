//! Media attachments sent inline with a user turn.

use serde::{Deserialize, Serialize};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Broad category of an attachment, derived from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            MediaKind::Image
        } else if mime_type.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Unknown
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub mime_type: String,
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl MediaAttachment {
    /// Build an attachment, resolving its MIME type.
    ///
    /// Resolution order: a declared type that is not the generic octet-stream,
    /// then the file extension, then content sniffing, then octet-stream.
    pub fn new(data: Vec<u8>, declared_mime: Option<&str>, file_name: Option<&str>) -> Self {
        let mime_type = resolve_mime_type(&data, declared_mime, file_name);
        Self {
            mime_type,
            data,
            file_name: file_name.map(str::to_string),
        }
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub fn resolve_mime_type(data: &[u8], declared: Option<&str>, file_name: Option<&str>) -> String {
    if let Some(mime) = declared.map(str::trim) {
        if !mime.is_empty() && mime != OCTET_STREAM {
            return mime.to_ascii_lowercase();
        }
    }

    if let Some(mime) = file_name.and_then(mime_from_extension) {
        return mime.to_string();
    }

    infer::get(data)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

pub fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "3gp" => "video/3gpp",
        "mpg" | "mpeg" => "video/mpeg",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_declared_mime_wins() {
        let media = MediaAttachment::new(vec![1, 2, 3], Some("video/mp4"), Some("clip.jpg"));
        assert_eq!(media.mime_type, "video/mp4");
        assert_eq!(media.kind(), MediaKind::Video);
    }

    #[test]
    fn test_octet_stream_falls_through_to_extension() {
        let media = MediaAttachment::new(vec![1, 2, 3], Some(OCTET_STREAM), Some("Flood.JPG"));
        assert_eq!(media.mime_type, "image/jpeg");
    }

    #[test]
    fn test_sniffed_when_no_hints() {
        let media = MediaAttachment::new(PNG_MAGIC.to_vec(), None, Some("upload"));
        assert_eq!(media.mime_type, "image/png");
        assert_eq!(media.kind(), MediaKind::Image);
    }

    #[test]
    fn test_unknown_defaults_to_octet_stream() {
        let media = MediaAttachment::new(vec![0, 0, 0], None, None);
        assert_eq!(media.mime_type, OCTET_STREAM);
        assert_eq!(media.kind(), MediaKind::Unknown);
    }
}
