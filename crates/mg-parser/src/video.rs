//! Recognized video container extensions.

use std::path::Path;

/// Extensions (lowercase, without the dot) treated as video files.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "3gp", "ts", "mts",
];

/// Whether `ext` (without the dot, any case) is a video extension.
pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
}

/// Whether `path` names a video file by extension.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(is_video_extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert!(is_video_file(Path::new("/m/Heat.1995.mkv")));
        assert!(is_video_file(Path::new("clip.MP4")));
        assert!(is_video_file(Path::new("broadcast.ts")));
    }

    #[test]
    fn other_files_rejected() {
        assert!(!is_video_file(Path::new("poster.jpg")));
        assert!(!is_video_file(Path::new("movie.srt")));
        assert!(!is_video_file(Path::new("Makefile")));
    }
}
