//! On-disk artifact cache keyed by [`CacheKey`] and [`ArtifactKind`].
//!
//! Layout under the cache root:
//!
//! ```text
//! posters/{key}.jpg
//! icons/{key}.ico
//! thumbnails/{key}_thumb.jpg
//! ```
//!
//! Producer output is written to a temporary file in the destination
//! directory, flushed, and renamed into place, so a reader never observes a
//! partial artifact. A recorded artifact whose file has vanished or is empty
//! is a miss and is regenerated.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use dashmap::DashMap;
use mg_core::{ArtifactKind, CacheKey};
use serde::Serialize;
use tracing::{debug, info, warn};

/// A live cache entry.
#[derive(Debug, Clone)]
pub struct ArtifactRecord {
    pub key: CacheKey,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub mtime: SystemTime,
}

/// File count and size for one artifact kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindStats {
    pub files: usize,
    pub bytes: u64,
}

/// Disk usage of the cache.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub root: PathBuf,
    pub posters: KindStats,
    pub icons: KindStats,
    pub thumbnails: KindStats,
}

impl CacheStats {
    pub fn total_files(&self) -> usize {
        self.posters.files + self.icons.files + self.thumbnails.files
    }

    pub fn total_bytes(&self) -> u64 {
        self.posters.bytes + self.icons.bytes + self.thumbnails.bytes
    }

    fn kind_mut(&mut self, kind: ArtifactKind) -> &mut KindStats {
        match kind {
            ArtifactKind::SourceImage => &mut self.posters,
            ArtifactKind::Icon => &mut self.icons,
            ArtifactKind::Thumbnail => &mut self.thumbnails,
        }
    }
}

type EntryKey = (CacheKey, ArtifactKind);

/// Thread-safe artifact cache.
pub struct ArtifactCache {
    root: PathBuf,
    records: DashMap<EntryKey, ArtifactRecord>,
    /// Serializes producers for the same entry.
    locks: DashMap<EntryKey, Arc<tokio::sync::Mutex<()>>>,
}

impl ArtifactCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for kind in ArtifactKind::ALL {
            let dir = root.join(kind.dir_name());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        }
        Ok(Self {
            root,
            records: DashMap::new(),
            locks: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic location of an artifact, whether or not it exists.
    pub fn path_for(&self, key: &CacheKey, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir_name()).join(kind.file_name(key))
    }

    /// Path of a live artifact, or `None` on a miss.
    pub fn lookup(&self, key: &CacheKey, kind: ArtifactKind) -> Option<PathBuf> {
        let entry = (key.clone(), kind);
        let path = self
            .records
            .get(&entry)
            .map(|r| r.path.clone())
            .unwrap_or_else(|| self.path_for(key, kind));

        match live_mtime(&path) {
            Some(mtime) => {
                self.records.insert(
                    entry,
                    ArtifactRecord {
                        key: key.clone(),
                        kind,
                        path: path.clone(),
                        mtime,
                    },
                );
                Some(path)
            }
            None => {
                if self.records.remove(&entry).is_some() {
                    debug!(%key, %kind, "Cached artifact vanished; treating as miss");
                }
                None
            }
        }
    }

    /// Return the cached artifact, or run `producer` and persist its output.
    ///
    /// Concurrent calls for the same `(key, kind)` run the producer once.
    ///
    /// # Errors
    ///
    /// Producer failures, empty producer output, and write failures. Nothing
    /// is recorded in any of those cases.
    pub async fn get_or_create<F, Fut>(
        &self,
        key: &CacheKey,
        kind: ArtifactKind,
        producer: F,
    ) -> Result<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        if let Some(path) = self.lookup(key, kind) {
            debug!(%key, %kind, "Cache hit");
            return Ok(path);
        }

        let entry = (key.clone(), kind);
        let lock = self.locks.entry(entry.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            self.produce(key, kind, producer).await
        };

        // Drop the lock entry once no other caller holds or waits on it.
        drop(lock);
        self.locks
            .remove_if(&entry, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn produce<F, Fut>(
        &self,
        key: &CacheKey,
        kind: ArtifactKind,
        producer: F,
    ) -> Result<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        // Another caller may have produced it while we waited.
        if let Some(path) = self.lookup(key, kind) {
            return Ok(path);
        }

        let bytes = producer().await?;
        if bytes.is_empty() {
            bail!("producer returned no data for {kind} {key}");
        }

        let path = self.path_for(key, kind);
        write_atomic(&path, &bytes)?;
        let mtime = live_mtime(&path).unwrap_or_else(SystemTime::now);

        self.records.insert(
            (key.clone(), kind),
            ArtifactRecord {
                key: key.clone(),
                kind,
                path: path.clone(),
                mtime,
            },
        );
        debug!(%key, %kind, bytes = bytes.len(), "Cached artifact");
        Ok(path)
    }

    /// Delete every artifact older than `max_age`. Returns the number of
    /// files removed.
    pub fn evict(&self, max_age: Duration) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;

        for kind in ArtifactKind::ALL {
            let dir = self.root.join(kind.dir_name());
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), "Cannot read cache directory: {e}");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(meta) = entry.metadata() else { continue };
                if !meta.is_file() {
                    continue;
                }
                let age = meta
                    .modified()
                    .ok()
                    .and_then(|m| now.duration_since(m).ok())
                    .unwrap_or_default();
                if age <= max_age {
                    continue;
                }

                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "Evicted artifact");
                        removed += 1;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %path.display(), "Failed to evict artifact: {e}"),
                }
            }
        }

        self.records.retain(|_, record| record.path.exists());
        info!(removed, "Cache cleanup finished");
        removed
    }

    /// Count files and bytes per kind.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            root: self.root.clone(),
            ..CacheStats::default()
        };
        for kind in ArtifactKind::ALL {
            let Ok(entries) = std::fs::read_dir(self.root.join(kind.dir_name())) else {
                continue;
            };
            let slot = stats.kind_mut(kind);
            for meta in entries.flatten().filter_map(|e| e.metadata().ok()) {
                if meta.is_file() {
                    slot.files += 1;
                    slot.bytes += meta.len();
                }
            }
        }
        stats
    }

    /// Number of artifacts recorded in memory.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Modification time of a non-empty regular file.
fn live_mtime(path: &Path) -> Option<SystemTime> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_file() || meta.len() == 0 {
        return None;
    }
    Some(meta.modified().unwrap_or_else(|_| SystemTime::now()))
}

/// Write to a sibling temp file, fsync, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .context("artifact path has no parent directory")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes).context("Failed to write artifact")?;
    tmp.as_file().sync_all().context("Failed to flush artifact")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to move artifact into {}", path.display()))?;
    Ok(())
}
