//! Media-domain types shared across crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// MediaKind / MediaFlavor
// ---------------------------------------------------------------------------

/// What the scanner found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A single video file.
    Movie,
    /// A directory containing season subdirectories.
    ShowFolder,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::ShowFolder => write!(f, "show_folder"),
        }
    }
}

/// Classified flavour of an item. Decides which lookup provider resolves its
/// poster and namespaces its cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFlavor {
    Movie,
    Tv,
    Anime,
}

impl MediaFlavor {
    /// Prefix used in cache keys.
    pub fn prefix(&self) -> &'static str {
        match self {
            MediaFlavor::Movie => "movie",
            MediaFlavor::Tv => "tv",
            MediaFlavor::Anime => "anime",
        }
    }
}

impl fmt::Display for MediaFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

// ---------------------------------------------------------------------------
// MediaItem
// ---------------------------------------------------------------------------

/// A movie file or show folder discovered by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub path: PathBuf,
    /// File or folder name as found on disk.
    pub raw_name: String,
    /// Normalized title.
    pub title: String,
    pub year: Option<u16>,
    pub kind: MediaKind,
}

impl MediaItem {
    pub fn new(
        path: PathBuf,
        raw_name: impl Into<String>,
        title: impl Into<String>,
        year: Option<u16>,
        kind: MediaKind,
    ) -> Self {
        Self {
            path,
            raw_name: raw_name.into(),
            title: title.into(),
            year,
            kind,
        }
    }

    /// Title with the year appended when known, for logs and progress output.
    pub fn display_name(&self) -> String {
        match self.year {
            Some(y) => format!("{} ({y})", self.title),
            None => self.title.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cache keys and artifacts
// ---------------------------------------------------------------------------

/// Deterministic, filesystem-safe join key between media items and cached
/// artifacts: `{flavor}_{safe_title}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from a flavor and an already-sanitized title.
    pub fn new(flavor: MediaFlavor, safe_title: &str) -> Self {
        Self(format!("{}_{safe_title}", flavor.prefix()))
    }

    /// Wrap a raw key string, e.g. one recovered from a cache file name.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of files held in the artifact cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Downloaded poster, re-encoded as JPEG.
    SourceImage,
    /// Multi-resolution `.ico`.
    Icon,
    /// Bounded-size JPEG for embedding in video containers.
    Thumbnail,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::SourceImage,
        ArtifactKind::Icon,
        ArtifactKind::Thumbnail,
    ];

    /// Subdirectory of the cache root holding this kind.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::SourceImage => "posters",
            ArtifactKind::Icon => "icons",
            ArtifactKind::Thumbnail => "thumbnails",
        }
    }

    /// File name for `key` inside [`dir_name`](Self::dir_name).
    pub fn file_name(&self, key: &CacheKey) -> String {
        match self {
            ArtifactKind::SourceImage => format!("{key}.jpg"),
            ArtifactKind::Icon => format!("{key}.ico"),
            ArtifactKind::Thumbnail => format!("{key}_thumb.jpg"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::SourceImage => write!(f, "source_image"),
            ArtifactKind::Icon => write!(f, "icon"),
            ArtifactKind::Thumbnail => write!(f, "thumbnail"),
        }
    }
}

// ---------------------------------------------------------------------------
// Apply outcomes
// ---------------------------------------------------------------------------

/// Result of applying an artifact to one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied,
    /// Already carried the artifact; nothing was changed.
    SkippedAlreadyDone,
    Failed(String),
}

impl ApplyOutcome {
    pub fn failed(reason: impl fmt::Display) -> Self {
        ApplyOutcome::Failed(reason.to_string())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ApplyOutcome::Failed(_))
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyOutcome::Applied => write!(f, "applied"),
            ApplyOutcome::SkippedAlreadyDone => write!(f, "skipped"),
            ApplyOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Per-item outcome paired with the item it refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub path: PathBuf,
    pub title: String,
    pub outcome: ApplyOutcome,
}

impl ApplyResult {
    pub fn new(item: &MediaItem, outcome: ApplyOutcome) -> Self {
        Self {
            path: item.path.clone(),
            title: item.title.clone(),
            outcome,
        }
    }
}

/// Aggregate counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    /// Count one outcome.
    pub fn record(&mut self, outcome: &ApplyOutcome) {
        self.total += 1;
        match outcome {
            ApplyOutcome::Applied => self.successful += 1,
            ApplyOutcome::SkippedAlreadyDone => self.skipped += 1,
            ApplyOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Sum of two summaries.
    pub fn merge(self, other: BatchSummary) -> BatchSummary {
        BatchSummary {
            total: self.total + other.total,
            successful: self.successful + other.successful,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} applied, {} skipped, {} failed",
            self.total, self.successful, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_format() {
        let key = CacheKey::new(MediaFlavor::Anime, "Attack_on_Titan");
        assert_eq!(key.as_str(), "anime_Attack_on_Titan");
    }

    #[test]
    fn artifact_file_names() {
        let key = CacheKey::new(MediaFlavor::Movie, "The_Matrix");
        assert_eq!(ArtifactKind::SourceImage.file_name(&key), "movie_The_Matrix.jpg");
        assert_eq!(ArtifactKind::Icon.file_name(&key), "movie_The_Matrix.ico");
        assert_eq!(
            ArtifactKind::Thumbnail.file_name(&key),
            "movie_The_Matrix_thumb.jpg"
        );
    }

    #[test]
    fn artifact_dirs_are_distinct() {
        let dirs: std::collections::HashSet<_> =
            ArtifactKind::ALL.iter().map(|k| k.dir_name()).collect();
        assert_eq!(dirs.len(), 3);
    }

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = BatchSummary::default();
        summary.record(&ApplyOutcome::Applied);
        summary.record(&ApplyOutcome::Applied);
        summary.record(&ApplyOutcome::SkippedAlreadyDone);
        summary.record(&ApplyOutcome::failed("no poster"));

        assert_eq!(
            summary,
            BatchSummary {
                total: 4,
                successful: 2,
                failed: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn summary_merge() {
        let a = BatchSummary { total: 2, successful: 1, failed: 1, skipped: 0 };
        let b = BatchSummary { total: 3, successful: 1, failed: 0, skipped: 2 };
        let m = a.merge(b);
        assert_eq!(m.total, 5);
        assert_eq!(m.successful, 2);
        assert_eq!(m.failed, 1);
        assert_eq!(m.skipped, 2);
    }

    #[test]
    fn display_name_includes_year() {
        let item = MediaItem::new(
            PathBuf::from("/m/Heat.1995.mkv"),
            "Heat.1995.mkv",
            "Heat",
            Some(1995),
            MediaKind::Movie,
        );
        assert_eq!(item.display_name(), "Heat (1995)");
    }

    #[test]
    fn outcome_serializes_with_reason() {
        let json = serde_json::to_string(&ApplyOutcome::failed("boom")).unwrap();
        assert_eq!(json, r#"{"outcome":"failed","reason":"boom"}"#);
        let json = serde_json::to_string(&ApplyOutcome::Applied).unwrap();
        assert_eq!(json, r#"{"outcome":"applied"}"#);
    }
}
