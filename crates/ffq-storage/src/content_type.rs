//! MIME type lookup by file extension.

use std::path::Path;

/// Content type for an upload, derived from the local file's extension.
pub fn from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_map_to_mime_types() {
        assert_eq!(from_path(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(from_path(Path::new("a.JPEG")), "image/jpeg");
        assert_eq!(from_path(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(from_path(Path::new("song.mp3")), "audio/mpeg");
    }

    #[test]
    fn unknown_extensions_fall_back_to_octet_stream() {
        assert_eq!(from_path(Path::new("blob")), "application/octet-stream");
        assert_eq!(from_path(Path::new("data.xyz")), "application/octet-stream");
    }
}
