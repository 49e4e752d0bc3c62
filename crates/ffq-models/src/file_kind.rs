//! File-type classification by extension.

use serde::{Deserialize, Serialize};

/// Coarse output file classification, keyed on the lowercased extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Subtitle,
    File,
}

impl FileKind {
    /// Classify a file extension (with or without the leading dot).
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tiff" => FileKind::Image,
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "flv" | "wmv" => FileKind::Video,
            "mp3" | "wav" | "aac" | "flac" | "ogg" | "m4a" => FileKind::Audio,
            "srt" | "vtt" | "ass" | "ssa" => FileKind::Subtitle,
            _ => FileKind::File,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Audio => "audio",
            FileKind::Subtitle => "subtitle",
            FileKind::File => "file",
        }
    }

    /// Whether dimension probing makes sense for this kind.
    pub fn has_dimensions(&self) -> bool {
        matches!(self, FileKind::Image | FileKind::Video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(FileKind::from_extension("MP4"), FileKind::from_extension("mp4"));
        assert_eq!(FileKind::from_extension("MP4"), FileKind::Video);
        assert_eq!(FileKind::from_extension("JPEG"), FileKind::Image);
    }

    #[test]
    fn leading_dot_is_tolerated() {
        assert_eq!(FileKind::from_extension(".gif"), FileKind::Image);
        assert_eq!(FileKind::from_extension(".srt"), FileKind::Subtitle);
    }

    #[test]
    fn unknown_extensions_are_plain_files() {
        assert_eq!(FileKind::from_extension("bin"), FileKind::File);
        assert_eq!(FileKind::from_extension(""), FileKind::File);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FileKind::Video).unwrap(), "\"video\"");
        assert_eq!(serde_json::to_string(&FileKind::File).unwrap(), "\"file\"");
    }

    #[test]
    fn dimension_probing_only_for_visual_kinds() {
        assert!(FileKind::Video.has_dimensions());
        assert!(FileKind::Image.has_dimensions());
        assert!(!FileKind::Audio.has_dimensions());
        assert!(!FileKind::Subtitle.has_dimensions());
    }
}
