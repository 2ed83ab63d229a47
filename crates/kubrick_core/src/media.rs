//! Raw media payloads attached to chat turns or uploaded to the video library.

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Infers the kind from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" => Some(Self::Image),
            "mp4" | "mov" | "webm" | "mkv" | "avi" | "m4v" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Message text used when the user sends this kind of media without text.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::Image => "Shared an image",
            Self::Video => "Shared a video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file the user selected, held fully in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaFile {
    name: String,
    kind: MediaKind,
    bytes: Bytes,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, kind: MediaKind, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Best-effort MIME type for multipart uploads.
    pub fn mime_type(&self) -> &'static str {
        let ext = Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "bmp" => "image/bmp",
            "mp4" => "video/mp4",
            "m4v" => "video/x-m4v",
            "mov" => "video/quicktime",
            "webm" => "video/webm",
            "mkv" => "video/x-matroska",
            "avi" => "video/x-msvideo",
            _ => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_inferred_from_extension() {
        assert_eq!(MediaKind::from_file_name("clip.MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_file_name("frame.jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_file_name("notes.txt"), None);
        assert_eq!(MediaKind::from_file_name("no_extension"), None);
    }

    #[test]
    fn placeholders_depend_on_kind() {
        assert_eq!(MediaKind::Image.placeholder(), "Shared an image");
        assert_eq!(MediaKind::Video.placeholder(), "Shared a video");
    }

    #[test]
    fn mime_type_falls_back_to_octet_stream() {
        let clip = MediaFile::new("clip.mov", MediaKind::Video, vec![0u8; 4]);
        assert_eq!(clip.mime_type(), "video/quicktime");
        assert_eq!(clip.len(), 4);

        let odd = MediaFile::new("clip.xyz", MediaKind::Video, Vec::new());
        assert_eq!(odd.mime_type(), "application/octet-stream");
        assert!(odd.is_empty());
    }
}
