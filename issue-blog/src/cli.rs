///
/// This module implements the CLI interface for issue-blog: flag parsing, token
/// resolution, configuration merging and the async entrypoint.
///
/// All pipeline logic lives in the [`issue-blog-core`] crate; this module only
/// resolves inputs and wires the real collaborators (GitHub fetcher, process
/// runner) into it.
///
/// ## How To Use
/// - For command-line users: run the installed `issue-blog` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`issue-blog-core`]: ../../issue-blog-core/
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use issue_blog_core::command::SystemCommandRunner;
use issue_blog_core::config::PipelineConfig;
use issue_blog_core::model::RepoRef;
use issue_blog_core::pipeline::{run_pipeline, PipelineReport};

use crate::error::CliError;
use crate::fetch::GithubIssueFetcher;
use crate::load_config::load_config;

/// Environment variable consulted when `--token` is absent.
pub const TOKEN_ENV: &str = "GITHUB_GQL_TOKEN";

/// CLI for issue-blog: turn GitHub issues into a static site and publish it.
#[derive(Parser, Debug)]
#[clap(
    name = "issue-blog",
    version,
    about = "Build a static blog from GitHub issues and publish it when the output changed"
)]
pub struct Cli {
    /// GitHub token for GraphQL (falls back to $GITHUB_GQL_TOKEN)
    #[clap(short = 't', long)]
    pub token: Option<String>,

    /// Repository owner (login)
    #[clap(short = 'o', long)]
    pub owner: String,

    /// Repository to fetch issues from and publish the site to
    #[clap(short = 'r', long)]
    pub repo: String,

    /// Path to the site generator executable
    #[clap(short = 'g', long = "gen")]
    pub generator: PathBuf,

    /// Skip fetching and reuse the existing content directory
    #[clap(short = 'l', long)]
    pub local: bool,

    /// Build and compare, but never publish
    #[clap(short = 'd', long)]
    pub dry: bool,

    /// Path to an optional YAML config file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Site installation directory (overrides `site_dir` from the config)
    #[clap(short = 's', long)]
    pub site_dir: Option<PathBuf>,
}

/// Picks the token from the flag, then from the environment. Not needed at
/// all in local mode.
pub fn resolve_token(flag: Option<String>, local: bool) -> Result<Option<String>, CliError> {
    if local {
        return Ok(None);
    }
    if let Some(token) = flag {
        return Ok(Some(token));
    }
    println!("token is not specified, try to get it from ENV...");
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.is_empty() => Ok(Some(token)),
        _ => {
            tracing::error!(var = TOKEN_ENV, "No token flag and no token in environment");
            Err(CliError::Argument(format!("{TOKEN_ENV} is not in ENV? exit.")))
        }
    }
}

/// Async CLI entrypoint for integration tests and main().
pub async fn run(cli: Cli) -> Result<PipelineReport> {
    tracing::info!("trace_initialised");

    // Everything that can be rejected is checked before the first side effect.
    let token = resolve_token(cli.token, cli.local)?;
    let site_config = load_config(cli.config.as_deref())?;
    let layout = site_config.layout(cli.site_dir.as_deref())?;

    let mut config = PipelineConfig::new(RepoRef::new(cli.owner, cli.repo), cli.generator, layout);
    config.local_only = cli.local;
    config.dry_run = cli.dry;
    config.style = site_config.style()?;
    config.remote_url = site_config.remote_url.clone();

    let fetcher = GithubIssueFetcher::new(
        site_config.graphql_endpoint.clone(),
        token.unwrap_or_default(),
    );
    let runner = SystemCommandRunner;

    match run_pipeline(&config, &fetcher, &runner).await {
        Ok(report) => {
            tracing::info!(?report, "Pipeline complete");
            Ok(report)
        }
        Err(e) => {
            tracing::error!(error = %e, "Pipeline failed");
            Err(e.into())
        }
    }
}
