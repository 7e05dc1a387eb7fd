//! Thumbnail embedding through an external transcoder.
//!
//! The [`Transcoder`] trait is the seam the apply layer depends on;
//! [`FfmpegTranscoder`] is the production implementation. Existing streams
//! are always stream-copied, never re-encoded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::command::ToolCommand;

/// Default timeout for a full remux.
pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(300);
/// Default timeout for the attached-picture probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability to attach a still image to a video container.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Write `output`: every stream of `video` plus `image` as an
    /// attached-picture stream. Must not touch `video`.
    async fn embed(&self, video: &Path, image: &Path, output: &Path) -> mg_core::Result<()>;

    /// Whether `video` already carries an attached picture.
    async fn probe(&self, video: &Path) -> mg_core::Result<bool>;

    /// Copy the attached picture of `video` out to `output`.
    async fn extract(&self, video: &Path, output: &Path) -> mg_core::Result<()>;
}

/// [`Transcoder`] backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    embed_timeout: Duration,
    probe_timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self {
            ffmpeg,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Build from the tool registry, or `None` if ffmpeg is unavailable.
    pub fn from_registry(registry: &crate::ToolRegistry) -> Option<Self> {
        registry.get("ffmpeg").map(|p| Self::new(p.to_path_buf()))
    }

    pub fn with_timeouts(mut self, embed: Duration, probe: Duration) -> Self {
        self.embed_timeout = embed;
        self.probe_timeout = probe;
        self
    }

    pub fn path(&self) -> &Path {
        &self.ffmpeg
    }
}

/// Arguments that remux `video` with `image` attached as cover art.
pub fn embed_args(video: &Path, image: &Path, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-i".into(),
        image.to_string_lossy().into_owned(),
        "-map".into(),
        "0".into(),
        "-map".into(),
        "1".into(),
        "-c".into(),
        "copy".into(),
        "-c:v:1".into(),
        "mjpeg".into(),
        "-disposition:v:1".into(),
        "attached_pic".into(),
        "-y".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Arguments that copy the attached-picture stream of `video` to `output`.
pub fn extract_args(video: &Path, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "-0:V".into(),
        "-c".into(),
        "copy".into(),
        "-frames:v".into(),
        "1".into(),
        "-y".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Whether ffmpeg's stream listing on stderr mentions an attached picture.
pub fn has_attached_pic_marker(stderr: &str) -> bool {
    stderr.lines().any(|line| {
        let line = line.to_ascii_lowercase();
        line.contains("(attached pic)") || line.contains("attached_pic")
    })
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn embed(&self, video: &Path, image: &Path, output: &Path) -> mg_core::Result<()> {
        ToolCommand::new(self.ffmpeg.clone())
            .args(embed_args(video, image, output))
            .timeout(self.embed_timeout)
            .execute()
            .await?;
        Ok(())
    }

    async fn probe(&self, video: &Path) -> mg_core::Result<bool> {
        // Without an output ffmpeg exits non-zero after printing the stream
        // listing, so the exit status carries no information here.
        let out = ToolCommand::new(self.ffmpeg.clone())
            .arg("-hide_banner")
            .arg("-i")
            .arg(video.to_string_lossy())
            .timeout(self.probe_timeout)
            .output()
            .await?;
        Ok(has_attached_pic_marker(&out.stderr))
    }

    async fn extract(&self, video: &Path, output: &Path) -> mg_core::Result<()> {
        ToolCommand::new(self.ffmpeg.clone())
            .args(extract_args(video, output))
            .timeout(self.probe_timeout)
            .execute()
            .await?;

        let len = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            let _ = std::fs::remove_file(output);
            return Err(mg_core::Error::tool(
                "ffmpeg",
                format!("no attached picture in {}", video.display()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_args_copy_streams_and_flag_attached_pic() {
        let args = embed_args(
            Path::new("/m/Heat.mkv"),
            Path::new("/c/thumb.jpg"),
            Path::new("/m/Heat.temp.mkv"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-i /m/Heat.mkv -i /c/thumb.jpg"));
        assert!(joined.contains("-map 0 -map 1 -c copy"));
        assert!(joined.contains("-c:v:1 mjpeg -disposition:v:1 attached_pic"));
        assert_eq!(args.last().map(String::as_str), Some("/m/Heat.temp.mkv"));
    }

    #[test]
    fn extract_args_select_attached_pictures_only() {
        let args = extract_args(Path::new("/m/Heat.mkv"), Path::new("/tmp/cover.jpg"));
        let joined = args.join(" ");
        assert!(joined.contains("-map 0:v -map -0:V"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/cover.jpg"));
    }

    #[test]
    fn attached_pic_marker() {
        let with = "  Stream #0:2: Video: mjpeg (Baseline), yuvj420p, 400x600 (attached pic)\n";
        let without = "  Stream #0:0: Video: h264 (High), yuv420p, 1920x1080\n";
        assert!(has_attached_pic_marker(with));
        assert!(!has_attached_pic_marker(without));
        assert!(has_attached_pic_marker("disposition: ATTACHED_PIC=1"));
    }

    #[tokio::test]
    async fn missing_binary_fails_cleanly() {
        let t = FfmpegTranscoder::new(PathBuf::from("/nonexistent/ffmpeg_xyz"));
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("a.mkv");
        std::fs::write(&video, b"data").unwrap();

        assert!(t.probe(&video).await.is_err());
        assert!(t
            .embed(&video, &dir.path().join("t.jpg"), &dir.path().join("a.temp.mkv"))
            .await
            .is_err());
        assert_eq!(std::fs::read(&video).unwrap(), b"data");
    }
}
