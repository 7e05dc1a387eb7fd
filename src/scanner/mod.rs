//! Media directory scanner.
//!
//! Walks a library root and buckets what it finds into movie files and show
//! folders (directories that contain season subdirectories). Unreadable
//! branches are logged and skipped; only an invalid root is an error.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mg_core::config::ScanConfig;
use mg_core::{MediaItem, MediaKind};
use mg_parser::{is_season_folder, is_video_file, parse_movie};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Scanner settings.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Deepest level (1 = direct children of the root) at which a directory
    /// can be a show folder.
    pub show_depth: usize,
    pub follow_links: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            show_depth: 1,
            follow_links: true,
        }
    }
}

impl From<&ScanConfig> for ScanOptions {
    fn from(cfg: &ScanConfig) -> Self {
        Self {
            show_depth: cfg.show_depth.max(1),
            ..Self::default()
        }
    }
}

/// Items discovered under one root.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub root: PathBuf,
    pub movies: Vec<MediaItem>,
    pub show_folders: Vec<MediaItem>,
    /// Regular files visited, video or not.
    pub files_seen: usize,
    /// Entries that could not be read and were skipped.
    pub errors: usize,
    pub scanned_at: DateTime<Utc>,
}

/// Counts from [`quick_scan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub video_files: usize,
    pub show_folders: usize,
    pub total_folders: usize,
}

/// Fail with a validation error unless `root` is an existing directory.
pub fn validate_root(root: &Path) -> mg_core::Result<()> {
    if !root.exists() {
        return Err(mg_core::Error::validation(format!(
            "directory does not exist: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(mg_core::Error::validation(format!(
            "not a directory: {}",
            root.display()
        )));
    }
    Ok(())
}

/// Scan `root` for movie files and show folders.
///
/// # Errors
///
/// Returns [`mg_core::Error::Validation`] before walking if `root` does not
/// exist or is not a directory. Nothing found during the walk is an error.
pub fn scan(root: &Path, opts: &ScanOptions) -> mg_core::Result<ScanResult> {
    validate_root(root)?;
    info!(root = %root.display(), "Scanning media directory");

    let mut result = ScanResult {
        root: root.to_path_buf(),
        movies: Vec::new(),
        show_folders: Vec::new(),
        files_seen: 0,
        errors: 0,
        scanned_at: Utc::now(),
    };

    let walker = WalkDir::new(root)
        .follow_links(opts.follow_links)
        .min_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                result.errors += 1;
                continue;
            }
        };
        let path = entry.path();

        if entry.file_type().is_dir() {
            if entry.depth() <= opts.show_depth && has_season_subfolder(path) {
                if let Some(item) = media_item(path, MediaKind::ShowFolder) {
                    debug!(title = %item.title, path = %path.display(), "Found show folder");
                    result.show_folders.push(item);
                }
            }
            continue;
        }

        result.files_seen += 1;
        if !is_video_file(path) || mg_av::workspace::is_workspace_artifact(path) {
            continue;
        }
        if let Some(item) = media_item(path, MediaKind::Movie) {
            debug!(title = %item.title, year = ?item.year, "Found movie");
            result.movies.push(item);
        }
    }

    info!(
        movies = result.movies.len(),
        show_folders = result.show_folders.len(),
        errors = result.errors,
        "Scan complete"
    );
    Ok(result)
}

/// Count video files and show folders without parsing titles.
pub fn quick_scan(root: &Path, opts: &ScanOptions) -> mg_core::Result<ScanStats> {
    validate_root(root)?;

    let mut stats = ScanStats::default();
    for entry in WalkDir::new(root)
        .follow_links(opts.follow_links)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                None
            }
        })
    {
        if entry.file_type().is_dir() {
            stats.total_folders += 1;
            if entry.depth() <= opts.show_depth && has_season_subfolder(entry.path()) {
                stats.show_folders += 1;
            }
        } else if is_video_file(entry.path())
            && !mg_av::workspace::is_workspace_artifact(entry.path())
        {
            stats.video_files += 1;
        }
    }
    Ok(stats)
}

/// Whether any immediate subdirectory of `dir` is a season folder.
fn has_season_subfolder(dir: &Path) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), "Cannot list directory: {e}");
            return false;
        }
    };

    entries.filter_map(|e| e.ok()).any(|e| {
        e.path().is_dir() && e.file_name().to_str().is_some_and(is_season_folder)
    })
}

/// Build an item from a file or folder name; `None` if no title remains.
fn media_item(path: &Path, kind: MediaKind) -> Option<MediaItem> {
    let raw_name = path.file_name()?.to_string_lossy().to_string();
    let parsed = parse_movie(&raw_name);
    let title = parsed.title.trim();
    if title.is_empty() {
        return None;
    }
    Some(MediaItem::new(
        path.to_path_buf(),
        raw_name.as_str(),
        title,
        parsed.year,
        kind,
    ))
}
