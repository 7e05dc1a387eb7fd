//! Sibling-file workspace for in-place media rewrites.
//!
//! A [`SiblingWorkspace`] hands out an output path next to the input
//! (`name.temp.ext`) so the final swap is a same-directory rename, keeps an
//! optional `name.backup.ext` copy of the original, and deletes the
//! temporary output if it is dropped without being committed.

use std::fs;
use std::path::{Path, PathBuf};

/// Infix of the temporary output file.
pub const TEMP_INFIX: &str = "temp";
/// Infix of the backup file.
pub const BACKUP_INFIX: &str = "backup";

/// `dir/stem.{infix}.ext` for `dir/stem.ext`.
pub fn sibling_path(input: &Path, infix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{stem}.{infix}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{infix}"),
    };
    input.with_file_name(name)
}

/// Path of the backup kept for `input`.
pub fn backup_path(input: &Path) -> PathBuf {
    sibling_path(input, BACKUP_INFIX)
}

/// Whether `path` is a temp or backup sibling produced by a workspace.
pub fn is_workspace_artifact(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    [TEMP_INFIX, BACKUP_INFIX]
        .iter()
        .any(|infix| stem.ends_with(&format!(".{infix}")))
}

/// Workspace for rewriting one media file in place.
///
/// # Example
///
/// ```no_run
/// use mg_av::SiblingWorkspace;
///
/// # fn example() -> mg_core::Result<()> {
/// let ws = SiblingWorkspace::new(std::path::Path::new("/movies/Heat.mkv"))?;
/// ws.ensure_backup()?;
/// // ... write the new file to ws.output() ...
/// ws.commit()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SiblingWorkspace {
    input: PathBuf,
    output: PathBuf,
    committed: bool,
}

impl SiblingWorkspace {
    /// Create a workspace for an existing file. A stale temporary output left
    /// by an interrupted run is removed.
    pub fn new(input: &Path) -> mg_core::Result<Self> {
        if !input.is_file() {
            return Err(mg_core::Error::validation(format!(
                "not a file: {}",
                input.display()
            )));
        }

        let output = sibling_path(input, TEMP_INFIX);
        remove_if_exists(&output)?;

        Ok(Self {
            input: input.to_path_buf(),
            output,
            committed: false,
        })
    }

    /// The original input file path.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// The temporary output path (same directory as the input).
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Copy the original to its backup path unless a backup already exists.
    ///
    /// Returns the backup path and whether it was created by this call. An
    /// existing backup is never overwritten.
    pub fn ensure_backup(&self) -> mg_core::Result<(PathBuf, bool)> {
        let backup = backup_path(&self.input);
        if backup.exists() {
            tracing::debug!(backup = %backup.display(), "Backup already exists");
            return Ok((backup, false));
        }

        if let Err(e) = fs::copy(&self.input, &backup) {
            let _ = fs::remove_file(&backup);
            return Err(mg_core::Error::tool(
                "workspace",
                format!("failed to create backup {}: {e}", backup.display()),
            ));
        }

        tracing::debug!(backup = %backup.display(), "Created backup");
        Ok((backup, true))
    }

    /// Swap the output into the input's place.
    ///
    /// The output must exist and be non-empty. The swap is a single rename
    /// within one directory, so the original path always names either the
    /// old or the new file.
    ///
    /// # Errors
    ///
    /// Returns an error (and leaves the original untouched) if the output is
    /// missing or empty, or if the rename fails.
    pub fn commit(mut self) -> mg_core::Result<PathBuf> {
        let len = fs::metadata(&self.output).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            return Err(mg_core::Error::tool(
                "workspace",
                format!("output missing or empty: {}", self.output.display()),
            ));
        }

        fs::rename(&self.output, &self.input).map_err(|e| {
            mg_core::Error::tool(
                "workspace",
                format!("failed to replace {}: {e}", self.input.display()),
            )
        })?;

        self.committed = true;
        Ok(self.input.clone())
    }
}

impl Drop for SiblingWorkspace {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = remove_if_exists(&self.output) {
                tracing::warn!(path = %self.output.display(), "Failed to remove temp output: {e}");
            }
        }
    }
}

fn remove_if_exists(path: &Path) -> mg_core::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
