//! Declared content types accepted by the upload endpoints.

/// The only container accepted for video uploads.
pub const VIDEO_MP4: &str = "video/mp4";

/// Image types accepted for thumbnails.
pub const THUMBNAIL_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Strip parameters and normalize case: `Video/MP4; codecs=avc1` -> `video/mp4`.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_video_mp4(content_type: &str) -> bool {
    essence(content_type) == VIDEO_MP4
}

pub fn is_thumbnail_type(content_type: &str) -> bool {
    let essence = essence(content_type);
    THUMBNAIL_TYPES.contains(&essence.as_str())
}

/// File extension for a supported content type.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match essence(content_type).as_str() {
        "video/mp4" => Some("mp4"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_essence_strips_parameters() {
        assert_eq!(essence("Video/MP4; codecs=\"avc1\""), "video/mp4");
        assert_eq!(essence(""), "");
    }

    #[test]
    fn test_video_check() {
        assert!(is_video_mp4("video/mp4"));
        assert!(!is_video_mp4("image/gif"));
        assert!(!is_video_mp4("video/quicktime"));
    }

    #[test]
    fn test_thumbnail_types() {
        assert!(is_thumbnail_type("image/png"));
        assert!(is_thumbnail_type("image/jpeg"));
        assert!(!is_thumbnail_type("image/gif"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("application/zip"), None);
    }
}
