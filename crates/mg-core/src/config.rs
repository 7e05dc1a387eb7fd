//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Locations searched by [`Config::load_or_default`] when no explicit path is
/// given, in order.
const DEFAULT_LOCATIONS: &[&str] = &["./mediaglyph.json", "~/.config/mediaglyph/config.json"];

/// Valid range for [`ScheduleConfig::scan_frequency_hours`].
pub const SCAN_FREQUENCY_RANGE: std::ops::RangeInclusive<u64> = 1..=168;

/// Valid range for [`ScheduleConfig::cleanup_interval_hours`] (one year max).
pub const CLEANUP_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 1..=8_760;

const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;

/// `days` as a [`Duration`], saturating instead of overflowing.
pub fn duration_from_days(days: u64) -> Duration {
    Duration::from_secs(days.saturating_mul(SECS_PER_DAY))
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the media library that scheduled and `run` invocations scan.
    pub media_directory: Option<PathBuf>,
    pub features: FeaturesConfig,
    pub cache: CacheConfig,
    pub tools: ToolsConfig,
    pub metadata: MetadataConfig,
    pub embed: EmbedConfig,
    pub scan: ScanConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    ///
    /// The document must be a JSON object; serde would otherwise accept a
    /// sequence for the struct.
    pub fn from_json(json_str: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json_str)
            .map_err(|e| Error::Config(format!("parse error: {e}")))?;
        if !value.is_object() {
            return Err(Error::Config(
                "parse error: top level must be a JSON object".into(),
            ));
        }
        serde_json::from_value(value).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Serialize this config as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Internal(e.to_string()))
    }

    /// Load configuration from an explicit file, failing if it cannot be
    /// read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    /// Load configuration from `path`, or from the first default location
    /// that exists when `path` is `None`. Defaults are used only when no
    /// path was given and no default location has a file.
    ///
    /// # Errors
    ///
    /// An explicit path that is missing, unreadable or malformed, or a
    /// malformed file at a default location.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match default_location() {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            None => {
                tracing::debug!("No config file found in default locations; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match &self.media_directory {
            None => warnings.push("media_directory is not set".into()),
            Some(dir) if !dir.is_dir() => warnings.push(format!(
                "media_directory {} does not exist or is not a directory",
                dir.display()
            )),
            Some(_) => {}
        }

        if !self.features.any_enabled() {
            warnings.push("all features are disabled; runs will do nothing".into());
        }

        if (self.features.tv_shows || self.features.movies)
            && self.metadata.tmdb_api_key.as_deref().unwrap_or("").is_empty()
        {
            warnings.push(
                "metadata.tmdb_api_key is not set; movie and TV posters cannot be resolved".into(),
            );
        }

        if let Some(ref ffmpeg) = self.tools.ffmpeg_path {
            if !ffmpeg.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path {} does not exist; falling back to PATH",
                    ffmpeg.display()
                ));
            }
        }

        if !SCAN_FREQUENCY_RANGE.contains(&self.schedule.scan_frequency_hours) {
            warnings.push(format!(
                "schedule.scan_frequency_hours {} is outside {}..={}; it will be clamped",
                self.schedule.scan_frequency_hours,
                SCAN_FREQUENCY_RANGE.start(),
                SCAN_FREQUENCY_RANGE.end()
            ));
        }

        if !CLEANUP_INTERVAL_RANGE.contains(&self.schedule.cleanup_interval_hours) {
            warnings.push(format!(
                "schedule.cleanup_interval_hours {} is outside {}..={}; it will be clamped",
                self.schedule.cleanup_interval_hours,
                CLEANUP_INTERVAL_RANGE.start(),
                CLEANUP_INTERVAL_RANGE.end()
            ));
        }

        if self.cache.max_age_days == 0 {
            warnings.push("cache.max_age_days is 0; every cleanup empties the cache".into());
        }

        if self.embed.probe_timeout_secs > self.embed.timeout_secs {
            warnings.push("embed.probe_timeout_secs exceeds embed.timeout_secs".into());
        }

        warnings
    }
}

fn default_location() -> Option<PathBuf> {
    DEFAULT_LOCATIONS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
        .find(|p| p.is_file())
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Per-feature toggles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Embed thumbnails into movie files.
    pub movies: bool,
    /// Apply folder icons to TV show folders.
    pub tv_shows: bool,
    /// Apply folder icons to anime show folders.
    pub anime: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            movies: true,
            tv_shows: true,
            anime: true,
        }
    }
}

impl FeaturesConfig {
    pub fn any_enabled(&self) -> bool {
        self.movies || self.tv_shows || self.anime
    }
}

/// Artifact cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    /// Artifacts older than this are removed by cleanup sweeps.
    pub max_age_days: u64,
}

impl CacheConfig {
    /// [`dir`](Self::dir) with a leading `~` expanded.
    pub fn resolved_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.dir.to_string_lossy()).into_owned())
    }

    /// [`max_age_days`](Self::max_age_days) as a duration.
    pub fn max_age(&self) -> Duration {
        duration_from_days(self.max_age_days)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./cache"),
            max_age_days: 30,
        }
    }
}

/// External tool path overrides. `None` means search `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
}

/// Metadata lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub tmdb_api_key: Option<String>,
    pub language: String,
    pub request_timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            language: "en-US".into(),
            request_timeout_secs: 30,
        }
    }
}

/// Thumbnail embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Keep a `.backup` copy of each original before it is replaced.
    pub backup: bool,
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            backup: true,
            timeout_secs: 300,
            probe_timeout_secs: 30,
        }
    }
}

/// Directory scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum depth (relative to the root) at which show folders are
    /// detected. `1` means only top-level directories.
    pub show_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { show_depth: 1 }
    }
}

/// Periodic run settings used by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub scan_frequency_hours: u64,
    pub cleanup_interval_hours: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            scan_frequency_hours: 24,
            cleanup_interval_hours: 168,
        }
    }
}

impl ScheduleConfig {
    /// Scan frequency clamped to the supported range.
    pub fn effective_scan_frequency_hours(&self) -> u64 {
        self.scan_frequency_hours
            .clamp(*SCAN_FREQUENCY_RANGE.start(), *SCAN_FREQUENCY_RANGE.end())
    }

    /// Cleanup interval clamped to the supported range.
    pub fn effective_cleanup_interval_hours(&self) -> u64 {
        self.cleanup_interval_hours
            .clamp(*CLEANUP_INTERVAL_RANGE.start(), *CLEANUP_INTERVAL_RANGE.end())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.effective_scan_frequency_hours() * SECS_PER_HOUR)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.effective_cleanup_interval_hours() * SECS_PER_HOUR)
    }
}
