use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::RepoRef;

/// Default remote for the publish target; `{owner}` and `{repo}` are substituted.
pub const DEFAULT_REMOTE_URL: &str = "git@github.com:{owner}/{repo}.git";

/// Everything one pipeline run needs, resolved up front by the CLI.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Repository whose issues are fetched and to which the site is published.
    pub target: RepoRef,
    /// Site generator executable, run with no arguments.
    pub generator: PathBuf,
    /// Skip fetching and reuse the content directory as it is.
    pub local_only: bool,
    /// Build and compare, but never publish.
    pub dry_run: bool,
    pub layout: SiteLayout,
    pub style: ContentStyle,
    /// Clone URL template for the publish target.
    pub remote_url: String,
}

impl PipelineConfig {
    pub fn new(target: RepoRef, generator: impl Into<PathBuf>, layout: SiteLayout) -> Self {
        Self {
            target,
            generator: generator.into(),
            local_only: false,
            dry_run: false,
            layout,
            style: ContentStyle::default(),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
        }
    }

    /// The remote URL with owner and repository filled in.
    pub fn resolved_remote_url(&self) -> String {
        self.remote_url
            .replace("{owner}", &self.target.owner)
            .replace("{repo}", &self.target.name)
    }

    pub fn trace_loaded(&self) {
        info!(
            target_repo = %self.target.slug(),
            generator = %self.generator.display(),
            site_dir = %self.layout.site_dir.display(),
            local_only = self.local_only,
            dry_run = self.dry_run,
            "Loaded pipeline config"
        );
        debug!(?self, "Pipeline config loaded (full debug)");
    }
}

/// Where the run's directories live. Relative entries are resolved against
/// `site_dir`, the installation directory of the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLayout {
    pub site_dir: PathBuf,
    pub content_dir: PathBuf,
    pub build_dir: PathBuf,
    pub previous_dir: PathBuf,
    pub dry_run_dir: PathBuf,
}

impl SiteLayout {
    pub fn new(site_dir: impl Into<PathBuf>) -> Self {
        Self {
            site_dir: site_dir.into(),
            content_dir: PathBuf::from("content/post"),
            build_dir: PathBuf::from("public"),
            previous_dir: PathBuf::from("public.prev"),
            dry_run_dir: PathBuf::from("public.dry"),
        }
    }

    pub fn content_path(&self) -> PathBuf {
        self.resolve(&self.content_dir)
    }

    pub fn build_path(&self) -> PathBuf {
        self.resolve(&self.build_dir)
    }

    pub fn previous_path(&self) -> PathBuf {
        self.resolve(&self.previous_dir)
    }

    pub fn dry_run_path(&self) -> PathBuf {
        self.resolve(&self.dry_run_dir)
    }

    /// Scratch location for the fresh clone of the publish target.
    pub fn clone_path(&self, repo: &RepoRef) -> PathBuf {
        self.site_dir.join(&repo.name)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        // `join` keeps absolute paths as they are.
        self.site_dir.join(path)
    }
}

/// Presentation knobs for emitted content documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStyle {
    /// Offset the creation timestamp is rendered in.
    pub offset: FixedOffset,
    /// Theme passed to the comment widget.
    pub widget_theme: String,
}

impl Default for ContentStyle {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
            widget_theme: "github-light".to_string(),
        }
    }
}
