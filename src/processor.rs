//! Full library runs: scan, classify, then apply per flavor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mg_av::{FfmpegTranscoder, ToolRegistry, Transcoder};
use mg_core::config::Config;
use mg_core::events::{EventBus, EventPayload, RunTrigger};
use mg_core::{ApplyOutcome, BatchSummary, MediaFlavor, MediaItem};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::apply::{DesktopIniMarker, FolderIconApplier, FolderMarker, ThumbnailEmbedder};
use crate::batch::{run_batch, Applier, ProgressFn, RunGate};
use crate::cache::ArtifactCache;
use crate::images::AssetPipeline;
use crate::metadata::{AnimeOracle, ProviderRegistry};
use crate::scanner::{self, ScanOptions};

/// What one run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub trigger: RunTrigger,
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub movies_found: usize,
    pub tv_shows_found: usize,
    pub anime_found: usize,
    pub tv_shows: Option<BatchSummary>,
    pub anime: Option<BatchSummary>,
    pub movies: Option<BatchSummary>,
}

impl RunReport {
    pub fn summary(&self) -> BatchSummary {
        [self.tv_shows, self.anime, self.movies]
            .into_iter()
            .flatten()
            .fold(BatchSummary::default(), BatchSummary::merge)
    }
}

/// Drives scan, classification and the per-flavor batches.
pub struct MediaProcessor {
    config: Config,
    registry: Arc<ProviderRegistry>,
    oracle: Arc<AnimeOracle>,
    pipeline: Arc<AssetPipeline>,
    embedder: Arc<ThumbnailEmbedder>,
    marker: Arc<dyn FolderMarker>,
    events: Arc<EventBus>,
    gate: RunGate,
    force: bool,
}

impl MediaProcessor {
    pub fn new(
        config: Config,
        registry: Arc<ProviderRegistry>,
        oracle: Arc<AnimeOracle>,
        pipeline: Arc<AssetPipeline>,
        embedder: Arc<ThumbnailEmbedder>,
    ) -> Self {
        Self {
            config,
            registry,
            oracle,
            pipeline,
            embedder,
            marker: Arc::new(DesktopIniMarker),
            events: Arc::new(EventBus::default()),
            gate: RunGate::new(),
            force: false,
        }
    }

    /// Wire up the production providers, cache and transcoder.
    pub fn from_config(config: Config) -> Result<Self> {
        let cache = Arc::new(ArtifactCache::open(config.cache.resolved_dir())?);
        let timeout = Duration::from_secs(config.metadata.request_timeout_secs);
        let pipeline = Arc::new(AssetPipeline::new(cache, timeout)?);

        let registry = Arc::new(ProviderRegistry::from_config(&config.metadata)?);
        let anime_provider = registry
            .get(MediaFlavor::Anime)
            .context("no anime lookup provider registered")?;
        let oracle = Arc::new(AnimeOracle::new(anime_provider));

        let tools = ToolRegistry::discover(&config.tools);
        let transcoder = FfmpegTranscoder::from_registry(&tools).map(|t| {
            Arc::new(t.with_timeouts(
                Duration::from_secs(config.embed.timeout_secs),
                Duration::from_secs(config.embed.probe_timeout_secs),
            )) as Arc<dyn Transcoder>
        });
        if transcoder.is_none() {
            tracing::warn!("ffmpeg not found; thumbnail embedding is disabled");
        }
        let embedder = Arc::new(
            ThumbnailEmbedder::new(transcoder, pipeline.clone(), registry.clone())
                .with_backup(config.embed.backup),
        );

        Ok(Self::new(config, registry, oracle, pipeline, embedder))
    }

    pub fn with_marker(mut self, marker: Arc<dyn FolderMarker>) -> Self {
        self.marker = marker;
        self
    }

    /// Re-apply folder icons that are already set.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        self.pipeline.cache()
    }

    pub fn embedder(&self) -> &Arc<ThumbnailEmbedder> {
        &self.embedder
    }

    pub fn is_running(&self) -> bool {
        self.gate.is_active()
    }

    fn icon_applier(&self, flavor: MediaFlavor) -> FolderIconApplier {
        let applier = FolderIconApplier::new(self.pipeline.clone(), self.registry.clone(), flavor)
            .with_marker(self.marker.clone())
            .with_force(self.force);
        match flavor {
            MediaFlavor::Anime => applier.with_oracle(self.oracle.clone()),
            _ => applier,
        }
    }

    /// Scan `root` (or the configured media directory) and apply artifacts.
    ///
    /// Returns `Ok(None)` without doing anything if another run is active.
    ///
    /// # Errors
    ///
    /// Missing or invalid root and scanner failures. Per-item problems are
    /// counted in the report instead.
    pub async fn run_once(
        &self,
        root: Option<&Path>,
        trigger: RunTrigger,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<Option<RunReport>> {
        let Some(_permit) = self.gate.try_acquire() else {
            tracing::info!(?trigger, "A run is already in progress; skipping");
            self.events.broadcast(EventPayload::RunSkipped { trigger });
            return Ok(None);
        };

        let run_id = Uuid::new_v4();
        self.events
            .broadcast(EventPayload::RunStarted { run_id, trigger });

        match self.run_inner(run_id, root, trigger, progress).await {
            Ok(report) => {
                let summary = report.summary();
                tracing::info!(%run_id, "Run complete: {summary}");
                self.events
                    .broadcast(EventPayload::RunCompleted { run_id, summary });
                Ok(Some(report))
            }
            Err(e) => {
                tracing::error!(%run_id, "Run failed: {e:#}");
                self.events.broadcast(EventPayload::RunFailed {
                    run_id,
                    error: format!("{e:#}"),
                });
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        root: Option<&Path>,
        trigger: RunTrigger,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let root = root
            .map(Path::to_path_buf)
            .or_else(|| self.config.media_directory.clone())
            .context("no media directory configured")?;
        scanner::validate_root(&root)?;

        let features = self.config.features;
        let opts = ScanOptions::from(&self.config.scan);
        let scan_root = root.clone();
        let scan = tokio::task::spawn_blocking(move || scanner::scan(&scan_root, &opts))
            .await
            .context("scan task panicked")??;

        let (tv, anime) = if features.anime {
            self.oracle.partition(scan.show_folders).await
        } else {
            (scan.show_folders, Vec::new())
        };

        self.events.broadcast(EventPayload::ScanCompleted {
            run_id,
            movies: scan.movies.len(),
            tv_shows: tv.len(),
            anime: anime.len(),
        });

        let mut report = RunReport {
            run_id,
            trigger,
            root,
            started_at,
            finished_at: started_at,
            movies_found: scan.movies.len(),
            tv_shows_found: tv.len(),
            anime_found: anime.len(),
            tv_shows: None,
            anime: None,
            movies: None,
        };

        if features.tv_shows {
            let applier = self.icon_applier(MediaFlavor::Tv);
            report.tv_shows =
                Some(self.run_flavor(run_id, MediaFlavor::Tv, &tv, &applier, progress).await);
        }
        if features.anime {
            let applier = self.icon_applier(MediaFlavor::Anime);
            report.anime = Some(
                self.run_flavor(run_id, MediaFlavor::Anime, &anime, &applier, progress)
                    .await,
            );
        }
        if features.movies {
            if self.embedder.is_available() {
                report.movies = Some(
                    self.run_flavor(
                        run_id,
                        MediaFlavor::Movie,
                        &scan.movies,
                        self.embedder.as_ref(),
                        progress,
                    )
                    .await,
                );
            } else {
                tracing::warn!(
                    movies = scan.movies.len(),
                    "Skipping thumbnail embedding: no transcoding tool"
                );
            }
        }

        report.finished_at = Utc::now();
        Ok(report)
    }

    async fn run_flavor(
        &self,
        run_id: Uuid,
        flavor: MediaFlavor,
        items: &[MediaItem],
        applier: &dyn Applier,
        progress: Option<&ProgressFn<'_>>,
    ) -> BatchSummary {
        let events = self.events.clone();
        let report = move |index: usize, total: usize, item: &MediaItem, outcome: &ApplyOutcome| {
            events.broadcast(EventPayload::ItemProcessed {
                run_id,
                flavor,
                index,
                total,
                title: item.title.clone(),
                outcome: outcome.clone(),
            });
            if let Some(progress) = progress {
                progress(index, total, item, outcome);
            }
        };

        let summary = run_batch(items, applier, Some(&report)).await;
        self.events.broadcast(EventPayload::BatchCompleted {
            run_id,
            flavor,
            summary,
        });
        summary
    }

    /// Evict artifacts older than the configured maximum age.
    pub fn clean_cache(&self) -> usize {
        self.clean_cache_older_than(self.config.cache.max_age())
    }

    pub fn clean_cache_older_than(&self, max_age: Duration) -> usize {
        let removed = self.cache().evict(max_age);
        self.events.broadcast(EventPayload::CacheCleaned { removed });
        removed
    }

    /// Run on the configured schedule until `shutdown_rx` fires or closes.
    ///
    /// Both timers fire once immediately. A tick that lands while a manual
    /// run is active is skipped by the run gate.
    pub async fn run_scheduled(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        let schedule = &self.config.schedule;
        let mut scan_tick = tokio::time::interval(schedule.scan_interval());
        let mut cleanup_tick = tokio::time::interval(schedule.cleanup_interval());
        scan_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        cleanup_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            scan_hours = schedule.effective_scan_frequency_hours(),
            cleanup_hours = schedule.effective_cleanup_interval_hours(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
                _ = scan_tick.tick() => {
                    if let Err(e) = self.run_once(None, RunTrigger::Scheduled, None).await {
                        tracing::error!("Scheduled run failed: {e:#}");
                    }
                }
                _ = cleanup_tick.tick() => {
                    self.clean_cache();
                }
            }
        }
    }
}
