//! Custom folder icons via a `desktop.ini` marker.
//!
//! The marker is fully written before the folder attribute that activates
//! it is set, so the shell never sees a flagged folder without a valid
//! marker.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mg_core::{ApplyOutcome, MediaFlavor, MediaItem};

use crate::batch::Applier;
use crate::images::{artifact_key, AssetPipeline};
use crate::metadata::{AnimeOracle, ProviderRegistry};

pub const MARKER_FILE: &str = "desktop.ini";

/// Binds a folder to an icon file.
pub trait FolderMarker: Send + Sync {
    /// Whether the folder already carries a custom icon.
    fn is_applied(&self, folder: &Path) -> bool;

    /// Write the marker for `icon` and flag the folder.
    fn mark_applied(&self, folder: &Path, icon: &Path) -> Result<()>;

    /// Remove the marker and clear the folder flag. Returns whether a marker
    /// was present.
    fn clear(&self, folder: &Path) -> Result<bool>;

    /// Ask the shell to refresh the folder. Best effort.
    fn notify(&self, folder: &Path);
}

/// Windows Explorer `desktop.ini` marker. On other platforms only the file
/// is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopIniMarker;

impl DesktopIniMarker {
    pub fn content(icon: &Path) -> String {
        format!(
            "[.ShellClassInfo]\nIconResource={},0\n[ViewState]\nMode=\nVid=\nFolderType=Generic\n",
            icon.display()
        )
    }
}

impl FolderMarker for DesktopIniMarker {
    fn is_applied(&self, folder: &Path) -> bool {
        std::fs::read_to_string(folder.join(MARKER_FILE))
            .map(|ini| ini.lines().any(|l| l.trim_start().starts_with("IconResource=")))
            .unwrap_or(false)
    }

    fn mark_applied(&self, folder: &Path, icon: &Path) -> Result<()> {
        let marker = folder.join(MARKER_FILE);
        if marker.exists() {
            platform::clear_marker_attributes(&marker);
        }

        let mut tmp = tempfile::NamedTempFile::new_in(folder)
            .with_context(|| format!("Failed to create temp marker in {}", folder.display()))?;
        tmp.write_all(Self::content(icon).as_bytes())
            .context("Failed to write marker")?;
        tmp.as_file().sync_all().context("Failed to flush marker")?;
        tmp.persist(&marker)
            .with_context(|| format!("Failed to write {}", marker.display()))?;

        platform::hide_marker(&marker)?;
        platform::set_folder_flag(folder, true)?;
        tracing::debug!(folder = %folder.display(), "Wrote folder icon marker");
        Ok(())
    }

    fn clear(&self, folder: &Path) -> Result<bool> {
        let marker = folder.join(MARKER_FILE);
        let existed = match std::fs::metadata(&marker) {
            Ok(_) => {
                platform::clear_marker_attributes(&marker);
                match std::fs::remove_file(&marker) {
                    Ok(()) => true,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                    Err(e) => {
                        return Err(e).with_context(|| format!("Failed to remove {}", marker.display()))
                    }
                }
            }
            Err(_) => false,
        };
        platform::set_folder_flag(folder, false)?;
        Ok(existed)
    }

    fn notify(&self, folder: &Path) {
        platform::notify_shell(folder);
    }
}

#[cfg(windows)]
mod platform {
    use std::path::Path;
    use std::process::Command;

    use anyhow::{Context, Result};

    pub fn hide_marker(marker: &Path) -> Result<()> {
        let status = Command::new("attrib")
            .args(["+h", "+s"])
            .arg(marker)
            .status()
            .context("Failed to run attrib")?;
        anyhow::ensure!(status.success(), "attrib exited with {status}");
        Ok(())
    }

    pub fn clear_marker_attributes(marker: &Path) {
        if let Err(e) = Command::new("attrib").args(["-h", "-s"]).arg(marker).status() {
            tracing::warn!(path = %marker.display(), "Failed to clear marker attributes: {e}");
        }
    }

    /// The read-only attribute is what makes Explorer honour `desktop.ini`.
    pub fn set_folder_flag(folder: &Path, on: bool) -> Result<()> {
        let mut perms = std::fs::metadata(folder)
            .with_context(|| format!("Failed to stat {}", folder.display()))?
            .permissions();
        perms.set_readonly(on);
        std::fs::set_permissions(folder, perms)
            .with_context(|| format!("Failed to set attributes on {}", folder.display()))
    }

    pub fn notify_shell(folder: &Path) {
        match Command::new("ie4uinit.exe").arg("-show").status() {
            Ok(_) => tracing::debug!(folder = %folder.display(), "Requested icon refresh"),
            Err(e) => tracing::debug!("Icon refresh unavailable: {e}"),
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use std::path::Path;

    use anyhow::Result;

    pub fn hide_marker(_marker: &Path) -> Result<()> {
        Ok(())
    }

    pub fn clear_marker_attributes(_marker: &Path) {}

    pub fn set_folder_flag(_folder: &Path, _on: bool) -> Result<()> {
        Ok(())
    }

    pub fn notify_shell(folder: &Path) {
        tracing::trace!(folder = %folder.display(), "No shell to notify on this platform");
    }
}

/// Sets custom icons on show folders of one flavor (TV or anime).
pub struct FolderIconApplier {
    pipeline: Arc<AssetPipeline>,
    registry: Arc<ProviderRegistry>,
    oracle: Option<Arc<AnimeOracle>>,
    marker: Arc<dyn FolderMarker>,
    flavor: MediaFlavor,
    force: bool,
}

impl FolderIconApplier {
    pub fn new(
        pipeline: Arc<AssetPipeline>,
        registry: Arc<ProviderRegistry>,
        flavor: MediaFlavor,
    ) -> Self {
        Self {
            pipeline,
            registry,
            oracle: None,
            marker: Arc::new(DesktopIniMarker),
            flavor,
            force: false,
        }
    }

    pub fn with_marker(mut self, marker: Arc<dyn FolderMarker>) -> Self {
        self.marker = marker;
        self
    }

    /// Take posters from the oracle's matched candidates before asking the
    /// registry.
    pub fn with_oracle(mut self, oracle: Arc<AnimeOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Re-apply even if the folder already has an icon.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn flavor(&self) -> MediaFlavor {
        self.flavor
    }

    /// Resolve the poster, build the icon and mark the folder.
    pub async fn apply_icon(&self, item: &MediaItem) -> Result<ApplyOutcome> {
        let folder = item.path.as_path();
        if !self.force && self.marker.is_applied(folder) {
            return Ok(ApplyOutcome::SkippedAlreadyDone);
        }

        let known = self
            .oracle
            .as_ref()
            .and_then(|oracle| oracle.matched_image(&item.title));
        let url = match known {
            Some(url) => Some(url),
            None => {
                self.registry
                    .resolve_image(&item.title, item.year, self.flavor)
                    .await?
            }
        };
        let Some(url) = url else {
            return Ok(ApplyOutcome::failed("no poster found"));
        };

        let key = artifact_key(self.flavor, &item.title);
        let icon = self.pipeline.build_icon(&key, &url).await?;
        let icon = std::fs::canonicalize(&icon).unwrap_or(icon);

        self.marker.mark_applied(folder, &icon)?;
        self.marker.notify(folder);
        tracing::info!(title = %item.title, flavor = ?self.flavor, "Set folder icon");
        Ok(ApplyOutcome::Applied)
    }

    /// Remove the custom icon from `folder`. A folder without one is fine.
    pub fn remove(&self, folder: &Path) -> Result<bool> {
        remove_icon(self.marker.as_ref(), folder)
    }
}

/// Clear `folder`'s marker and notify the shell.
pub fn remove_icon(marker: &dyn FolderMarker, folder: &Path) -> Result<bool> {
    let removed = marker.clear(folder)?;
    marker.notify(folder);
    if removed {
        tracing::info!(folder = %folder.display(), "Removed folder icon");
    }
    Ok(removed)
}

#[async_trait]
impl Applier for FolderIconApplier {
    async fn apply(&self, item: &MediaItem) -> Result<ApplyOutcome> {
        self.apply_icon(item).await
    }
}
