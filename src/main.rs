mod cli;

use mediaglyph::{
    apply::{folder_icon, DesktopIniMarker},
    cache::ArtifactCache,
    metadata::{AnimeOracle, ProviderRegistry},
    processor::MediaProcessor,
    scanner::{self, ScanOptions},
};
use mg_core::config::Config;
use mg_core::events::RunTrigger;
use mg_core::{ApplyOutcome, MediaFlavor, MediaItem, MediaKind};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediaglyph=trace,mg_core=trace,mg_av=trace,mg_parser=trace".to_string()
        } else {
            "mediaglyph=info,mg_core=info,mg_av=info,mg_parser=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Scan {
            dir,
            json,
            no_anime,
            quick,
        } => {
            if quick {
                return quick_scan(&dir, config_path, json);
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scan_dir(&dir, config_path, json, no_anime))
        }
        Commands::Run { dir, force, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_once(dir.as_deref(), config_path, force, json))
        }
        Commands::Daemon => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_daemon(config_path))
        }
        Commands::RemoveIcon { folder } => remove_icon(&folder),
        Commands::Embed {
            file,
            title,
            year,
            no_backup,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(embed_file(&file, title, year, no_backup, config_path))
        }
        Commands::ExtractThumbnail { file, output } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(extract_thumbnail(&file, &output, config_path))
        }
        Commands::CleanCache { max_age_days } => clean_cache(config_path, max_age_days),
        Commands::CacheStats { json } => cache_stats(config_path, json),
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::InitConfig { output, force } => init_config(&output, force),
        Commands::Version => {
            println!("mediaglyph {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct ScanOutput {
    root: std::path::PathBuf,
    movies: Vec<MediaItem>,
    tv_shows: Vec<MediaItem>,
    anime: Vec<MediaItem>,
    files_seen: usize,
    errors: usize,
}

async fn scan_dir(dir: &Path, config_path: Option<&Path>, json: bool, no_anime: bool) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let opts = ScanOptions::from(&config.scan);
    let root = dir.to_path_buf();
    let result = tokio::task::spawn_blocking(move || scanner::scan(&root, &opts))
        .await
        .context("scan task panicked")??;

    let (tv_shows, anime) = if no_anime || !config.features.anime {
        (result.show_folders, Vec::new())
    } else {
        let registry = ProviderRegistry::from_config(&config.metadata)?;
        let provider = registry
            .get(MediaFlavor::Anime)
            .context("no anime lookup provider registered")?;
        AnimeOracle::new(provider).partition(result.show_folders).await
    };

    let output = ScanOutput {
        root: result.root,
        movies: result.movies,
        tv_shows,
        anime,
        files_seen: result.files_seen,
        errors: result.errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Scanned: {}", output.root.display());
    for (label, items) in [
        ("Movies", &output.movies),
        ("TV shows", &output.tv_shows),
        ("Anime", &output.anime),
    ] {
        println!("\n{label}: {}", items.len());
        for item in items {
            println!("  {}", item.display_name());
        }
    }
    if output.errors > 0 {
        println!("\n{} entries could not be read", output.errors);
    }
    Ok(())
}

fn quick_scan(dir: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let stats = scanner::quick_scan(dir, &ScanOptions::from(&config.scan))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Video files:   {}", stats.video_files);
        println!("Show folders:  {}", stats.show_folders);
        println!("Total folders: {}", stats.total_folders);
    }
    Ok(())
}

fn print_progress(index: usize, total: usize, item: &MediaItem, outcome: &ApplyOutcome) {
    println!("[{index}/{total}] {}: {outcome}", item.display_name());
}

async fn run_once(dir: Option<&Path>, config_path: Option<&Path>, force: bool, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let processor = MediaProcessor::from_config(config)?.with_force(force);

    let progress: Option<&mediaglyph::batch::ProgressFn<'_>> =
        if json { None } else { Some(&print_progress) };
    let Some(report) = processor.run_once(dir, RunTrigger::Manual, progress).await? else {
        println!("Another run is already in progress");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\nRun complete: {}", report.summary());
        if let Some(s) = report.tv_shows {
            println!("  TV shows: {s}");
        }
        if let Some(s) = report.anime {
            println!("  Anime:    {s}");
        }
        if let Some(s) = report.movies {
            println!("  Movies:   {s}");
        }
    }
    Ok(())
}

async fn run_daemon(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    if config.media_directory.is_none() {
        anyhow::bail!("media_directory must be set in the config to run as a daemon");
    }
    let processor = Arc::new(MediaProcessor::from_config(config)?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let scheduler = {
        let processor = processor.clone();
        tokio::spawn(async move { processor.run_scheduled(shutdown_rx).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(()).await;
    let _ = scheduler.await;
    Ok(())
}

fn remove_icon(folder: &Path) -> Result<()> {
    if !folder.is_dir() {
        anyhow::bail!("Not a directory: {}", folder.display());
    }
    if folder_icon::remove_icon(&DesktopIniMarker, folder)? {
        println!("Removed custom icon from {}", folder.display());
    } else {
        println!("No custom icon on {}", folder.display());
    }
    Ok(())
}

async fn embed_file(
    file: &Path,
    title: Option<String>,
    year: Option<u16>,
    no_backup: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let mut config = Config::load_or_default(config_path)?;
    if no_backup {
        config.embed.backup = false;
    }
    let processor = MediaProcessor::from_config(config)?;
    let embedder = processor.embedder();
    if !embedder.is_available() {
        anyhow::bail!("ffmpeg not found; install it or set tools.ffmpeg_path");
    }

    let raw_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let parsed = mg_parser::parse_movie(&raw_name);
    let item = MediaItem::new(
        file.to_path_buf(),
        raw_name,
        title.unwrap_or(parsed.title),
        year.or(parsed.year),
        MediaKind::Movie,
    );

    println!("Embedding thumbnail for {}", item.display_name());
    match embedder.embed_item(&item).await? {
        ApplyOutcome::Failed(reason) => anyhow::bail!("Embed failed: {reason}"),
        outcome => println!("{outcome}"),
    }
    Ok(())
}

async fn extract_thumbnail(file: &Path, output: &Path, config_path: Option<&Path>) -> Result<()> {
    let processor = MediaProcessor::from_config(Config::load_or_default(config_path)?)?;
    processor.embedder().extract_thumbnail(file, output).await?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn clean_cache(config_path: Option<&Path>, max_age_days: Option<u64>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let cache = ArtifactCache::open(config.cache.resolved_dir())?;
    let days = max_age_days.unwrap_or(config.cache.max_age_days);
    let removed = cache.evict(mg_core::config::duration_from_days(days));
    println!("Removed {removed} cached files older than {days} days");
    Ok(())
}

fn cache_stats(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let cache = ArtifactCache::open(config.cache.resolved_dir())?;
    let stats = cache.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Cache: {}", stats.root.display());
    println!("  Posters:    {} files, {} bytes", stats.posters.files, stats.posters.bytes);
    println!("  Icons:      {} files, {} bytes", stats.icons.files, stats.icons.bytes);
    println!(
        "  Thumbnails: {} files, {} bytes",
        stats.thumbnails.files, stats.thumbnails.bytes
    );
    println!("  Total:      {} files, {} bytes", stats.total_files(), stats.total_bytes());
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path)?;
    let tools = mg_av::ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Folder icons still work; thumbnail embedding is disabled.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            Config::load(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("✓ Configuration is valid");
    match &config.media_directory {
        Some(dir) => println!("  Media directory: {}", dir.display()),
        None => println!("  Media directory: (not set)"),
    }
    println!(
        "  Features: movies={} tv_shows={} anime={}",
        config.features.movies, config.features.tv_shows, config.features.anime
    );
    println!("  Cache: {}", config.cache.dir.display());

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}

fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists; use --force to overwrite",
            output.display()
        );
    }
    let json = Config::default().to_json_pretty()?;
    std::fs::write(output, json + "\n")
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote default configuration to {}", output.display());
    Ok(())
}
