use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediaglyph")]
#[command(author, version, about = "Folder icons and embedded thumbnails for media libraries")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a media directory and list what was found
    Scan {
        /// Directory to scan
        #[arg(required = true)]
        dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Do not query AniList to split anime from TV shows
        #[arg(long)]
        no_anime: bool,

        /// Only count videos and show folders, without parsing titles
        #[arg(long, conflicts_with = "no_anime")]
        quick: bool,
    },

    /// Scan and apply icons and thumbnails once
    Run {
        /// Media directory (defaults to `media_directory` from the config)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Re-apply folder icons that are already set
        #[arg(long)]
        force: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run on the configured schedule until interrupted
    Daemon,

    /// Remove the custom icon from a folder
    RemoveIcon {
        /// Folder to restore
        #[arg(required = true)]
        folder: PathBuf,
    },

    /// Embed a poster thumbnail into a single video file
    Embed {
        /// Video file
        #[arg(required = true)]
        file: PathBuf,

        /// Title to look up (parsed from the file name if omitted)
        #[arg(long)]
        title: Option<String>,

        /// Release year to narrow the lookup
        #[arg(long)]
        year: Option<u16>,

        /// Do not keep a .backup copy of the original
        #[arg(long)]
        no_backup: bool,
    },

    /// Extract an embedded thumbnail from a video file
    ExtractThumbnail {
        /// Video file
        #[arg(required = true)]
        file: PathBuf,

        /// Output image path
        #[arg(required = true)]
        output: PathBuf,
    },

    /// Delete cached artifacts older than the given age
    CleanCache {
        /// Maximum age in days (defaults to `cache.max_age_days`)
        #[arg(long)]
        max_age_days: Option<u64>,
    },

    /// Show artifact cache usage
    CacheStats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination path
        #[arg(long, default_value = "mediaglyph.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}
