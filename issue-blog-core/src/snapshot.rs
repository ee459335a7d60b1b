//! Two-slot store of build snapshots on disk.
//!
//! `current` is the generator's output directory, `previous` holds the prior
//! build with its `.git` directory removed so that only generator-visible
//! files take part in change detection. A third slot keeps the output of a
//! dry run around for inspection without letting it become the baseline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::SiteLayout;
use crate::detect::{compare_trees, TreeDiff};

const VCS_DIR: &str = ".git";

#[derive(Debug, thiserror::Error)]
#[error("snapshot store failed to {action} {path}: {source}")]
pub struct SnapshotError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Result of promoting the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// The old current snapshot is now the previous one.
    Promoted,
    /// There was no current snapshot: the next build is the first.
    FirstBuild,
}

/// Outcome of comparing current against previous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// No previous snapshot exists; always treated as changed.
    FirstBuild,
    Unchanged,
    Changed(TreeDiff),
}

impl Change {
    pub fn is_changed(&self) -> bool {
        !matches!(self, Change::Unchanged)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    current: PathBuf,
    previous: PathBuf,
    dry_run: PathBuf,
}

impl SnapshotStore {
    pub fn new(
        current: impl Into<PathBuf>,
        previous: impl Into<PathBuf>,
        dry_run: impl Into<PathBuf>,
    ) -> Self {
        Self {
            current: current.into(),
            previous: previous.into(),
            dry_run: dry_run.into(),
        }
    }

    pub fn from_layout(layout: &SiteLayout) -> Self {
        Self::new(
            layout.build_path(),
            layout.previous_path(),
            layout.dry_run_path(),
        )
    }

    pub fn current(&self) -> &Path {
        &self.current
    }

    pub fn previous(&self) -> &Path {
        &self.previous
    }

    pub fn dry_run(&self) -> &Path {
        &self.dry_run
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_dir()
    }

    /// Moves current into the previous slot and strips its `.git`.
    ///
    /// Any stale previous snapshot is discarded first. Without a current
    /// snapshot the store is left empty and [`Promotion::FirstBuild`] is
    /// returned.
    pub fn promote(&self) -> Result<Promotion, SnapshotError> {
        remove_dir_if_exists(&self.previous)?;

        if !self.current.is_dir() {
            info!(path = %self.current.display(), "No previous build output, treating as first build");
            return Ok(Promotion::FirstBuild);
        }

        fs::rename(&self.current, &self.previous).map_err(|source| SnapshotError {
            action: "rename",
            path: self.current.clone(),
            source,
        })?;
        remove_dir_if_exists(&self.previous.join(VCS_DIR))?;
        info!(
            from = %self.current.display(),
            to = %self.previous.display(),
            "Promoted current build output to previous"
        );
        Ok(Promotion::Promoted)
    }

    /// Creates an empty current slot for the generator to fill.
    pub fn prepare_current(&self) -> Result<(), SnapshotError> {
        remove_dir_if_exists(&self.current)?;
        fs::create_dir_all(&self.current).map_err(|source| SnapshotError {
            action: "create",
            path: self.current.clone(),
            source,
        })
    }

    /// Compares current against previous.
    pub fn change(&self) -> Change {
        if !self.has_previous() {
            return Change::FirstBuild;
        }
        let diff = compare_trees(&self.previous, &self.current);
        if diff.is_identical() {
            Change::Unchanged
        } else {
            Change::Changed(diff)
        }
    }

    /// Undoes the promotion after a dry run.
    ///
    /// The dry-run output is parked in the dry-run slot and the previous
    /// snapshot goes back to being current, so the baseline the next real run
    /// compares against is still the last published build.
    pub fn restore_after_dry_run(&self) -> Result<(), SnapshotError> {
        remove_dir_if_exists(&self.dry_run)?;
        if self.current.is_dir() {
            fs::rename(&self.current, &self.dry_run).map_err(|source| SnapshotError {
                action: "park dry-run output",
                path: self.current.clone(),
                source,
            })?;
        }
        if self.previous.is_dir() {
            fs::rename(&self.previous, &self.current).map_err(|source| SnapshotError {
                action: "restore",
                path: self.previous.clone(),
                source,
            })?;
        }
        info!(
            dry_run = %self.dry_run.display(),
            "Restored previous build output after dry run"
        );
        Ok(())
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), SnapshotError> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SnapshotError {
            action: "remove",
            path: path.to_path_buf(),
            source,
        }),
    }
}
