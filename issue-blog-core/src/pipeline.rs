//! High-level pipeline: fetch → emit → build → detect change → publish.
//!
//! [`run_pipeline`] sequences one complete run for a [`PipelineConfig`]. It is
//! strictly linear; the only branch is the final publish/skip decision:
//!
//! - fetch is skipped in local-only mode, and the content directory is reused;
//! - a fetch that returns no issues is an error, raised before any file is touched;
//! - emit, build and change detection always run;
//! - publish happens only when the output changed and this is not a dry run;
//!   a remote that already holds the output gets no commit.
//!
//! Paths are resolved against the configured site directory and every
//! subprocess is started there; the process working directory is left alone.
//!
//! # Error Handling
//! Every step is fail-fast. Nothing is retried and nothing is rolled back.

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::build::{build_site, BuildError};
use crate::config::PipelineConfig;
use crate::contract::{CommandRunner, FetchError, IssueSource};
use crate::emit::{generate_content, EmitError};
use crate::publish::{publish, PublishError, PublishOutcome, PublishTarget};
use crate::snapshot::{Change, SnapshotError, SnapshotStore};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("fetching issues failed: {0}")]
    Fetch(FetchError),
    #[error("issue source returned no issues")]
    NoIssues,
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// What one run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// `None` in local-only mode, where the source is never asked.
    pub issues_fetched: Option<usize>,
    pub files_emitted: usize,
    pub first_build: bool,
    pub changed: bool,
    /// `true` only when a commit was pushed.
    pub published: bool,
}

pub async fn run_pipeline<S, R>(
    config: &PipelineConfig,
    source: &S,
    runner: &R,
) -> Result<PipelineReport, PipelineError>
where
    S: IssueSource + ?Sized,
    R: CommandRunner + ?Sized,
{
    info!("[PIPELINE] Starting run");
    config.trace_loaded();
    let layout = &config.layout;

    // --- Step 1: Fetch + emit ---
    let (issues_fetched, files_emitted) = if config.local_only {
        println!("local mode, reusing existing content...");
        let content = layout.content_path();
        if !content.is_dir() {
            warn!(path = %content.display(), "[PIPELINE] Local mode but content directory is missing");
        }
        (None, 0)
    } else {
        println!("fetching issues from github...");
        let issues = source.fetch_issues(&config.target).await.map_err(|e| {
            error!(error = %e, "[PIPELINE][ERROR] Fetch failed");
            PipelineError::Fetch(e)
        })?;
        println!("issue_num: {}", issues.len());
        if issues.is_empty() {
            error!(repo = %config.target.slug(), "[PIPELINE][ERROR] Issue source returned no issues");
            return Err(PipelineError::NoIssues);
        }

        println!("generating markdown files...");
        let written = generate_content(
            &issues,
            &layout.content_path(),
            &config.target,
            &config.style,
        )?;
        (Some(issues.len()), written.len())
    };

    // --- Step 2: Build ---
    println!("generating static website...");
    let store = SnapshotStore::from_layout(layout);
    let outcome = build_site(runner, &config.generator, &layout.site_dir, &store)?;
    info!(
        first_build = outcome.first_build,
        generator_code = ?outcome.generator_code,
        "[PIPELINE] Build finished"
    );

    // --- Step 3: Detect change ---
    let change = store.change();
    match &change {
        Change::FirstBuild => info!("[PIPELINE] First build, treating output as changed"),
        Change::Unchanged => info!("[PIPELINE] Build output unchanged"),
        Change::Changed(diff) => {
            info!(
                left_only = diff.left_only.len(),
                right_only = diff.right_only.len(),
                funny = diff.funny.len(),
                diff_files = diff.diff_files.len(),
                "[PIPELINE] Build output changed"
            );
            debug!(?diff, "[PIPELINE] Build output differences");
        }
    }
    let changed = change.is_changed();

    // --- Step 4: Publish or skip ---
    let published = if config.dry_run {
        println!("dry run, skip deploying (changed: {changed})");
        store.restore_after_dry_run()?;
        false
    } else if changed {
        println!("deploying to github...");
        let remote_url = config.resolved_remote_url();
        let clone_dir = layout.clone_path(&config.target);
        let target = PublishTarget {
            remote_url: &remote_url,
            clone_dir: &clone_dir,
            build_dir: store.current(),
        };
        publish(runner, &target, Local::now())? == PublishOutcome::Pushed
    } else {
        println!("site not changed, skip deploying");
        false
    };

    let report = PipelineReport {
        issues_fetched,
        files_emitted,
        first_build: outcome.first_build,
        changed,
        published,
    };
    info!(?report, "[PIPELINE] Run complete");
    Ok(report)
}
