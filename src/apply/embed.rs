//! Cover thumbnails embedded into movie files.
//!
//! The original file is only ever replaced by a single same-directory
//! rename of a fully written, non-empty output. Every failure path leaves
//! it byte-for-byte untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mg_av::{SiblingWorkspace, Transcoder};
use mg_core::{ApplyOutcome, MediaFlavor, MediaItem};

use crate::batch::Applier;
use crate::images::{artifact_key, AssetPipeline};
use crate::metadata::ProviderRegistry;

/// Attaches poster thumbnails to video files.
pub struct ThumbnailEmbedder {
    transcoder: Option<Arc<dyn Transcoder>>,
    pipeline: Arc<AssetPipeline>,
    registry: Arc<ProviderRegistry>,
    backup: bool,
}

impl ThumbnailEmbedder {
    /// `transcoder` is `None` when no transcoding tool could be found; every
    /// embed then fails while icon work is unaffected.
    pub fn new(
        transcoder: Option<Arc<dyn Transcoder>>,
        pipeline: Arc<AssetPipeline>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            transcoder,
            pipeline,
            registry,
            backup: true,
        }
    }

    /// Keep a `.backup` copy of each original before replacing it.
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn is_available(&self) -> bool {
        self.transcoder.is_some()
    }

    fn transcoder(&self) -> Result<&dyn Transcoder> {
        self.transcoder
            .as_deref()
            .context("no transcoding tool available (is ffmpeg installed?)")
    }

    /// Whether `video` already carries an attached picture.
    pub async fn has_embedded_thumbnail(&self, video: &Path) -> Result<bool> {
        Ok(self.transcoder()?.probe(video).await?)
    }

    /// Resolve a poster for `item` and embed it.
    pub async fn embed_item(&self, item: &MediaItem) -> Result<ApplyOutcome> {
        let transcoder = self.transcoder()?;
        let video = item.path.as_path();
        if !mg_parser::is_video_file(video) {
            return Ok(ApplyOutcome::failed("not a recognised video file"));
        }

        match transcoder.probe(video).await {
            Ok(true) => return Ok(ApplyOutcome::SkippedAlreadyDone),
            Ok(false) => {}
            Err(e) => tracing::warn!(path = %video.display(), "Thumbnail probe failed: {e}"),
        }

        let Some(url) = self
            .registry
            .resolve_image(&item.title, item.year, MediaFlavor::Movie)
            .await?
        else {
            return Ok(ApplyOutcome::failed("no poster found"));
        };

        let key = artifact_key(MediaFlavor::Movie, &item.title);
        let thumbnail = self.pipeline.build_thumbnail(&key, &url).await?;
        self.embed_file(video, &thumbnail).await?;

        tracing::info!(title = %item.title, path = %video.display(), "Embedded thumbnail");
        Ok(ApplyOutcome::Applied)
    }

    /// Attach `thumbnail` to `video` in place, optionally keeping a backup.
    pub async fn embed_file(&self, video: &Path, thumbnail: &Path) -> Result<PathBuf> {
        let transcoder = self.transcoder()?;
        let workspace = SiblingWorkspace::new(video)?;

        if self.backup {
            let (backup, created) = workspace.ensure_backup()?;
            if created {
                tracing::debug!(backup = %backup.display(), "Backed up original");
            }
        }

        transcoder
            .embed(workspace.input(), thumbnail, workspace.output())
            .await
            .with_context(|| format!("{} failed on {}", transcoder.name(), video.display()))?;

        Ok(workspace.commit()?)
    }

    /// Copy the attached picture of `video` to `output`.
    pub async fn extract_thumbnail(&self, video: &Path, output: &Path) -> Result<()> {
        self.transcoder()?
            .extract(video, output)
            .await
            .with_context(|| format!("Failed to extract thumbnail from {}", video.display()))
    }
}

#[async_trait]
impl Applier for ThumbnailEmbedder {
    async fn apply(&self, item: &MediaItem) -> Result<ApplyOutcome> {
        self.embed_item(item).await
    }
}
