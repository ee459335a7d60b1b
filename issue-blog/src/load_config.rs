/// `load_config` module: loads the optional YAML site configuration and merges it
/// with command-line values into the core [`PipelineConfig`].
///
/// The file only carries layout and presentation settings; owner, repository,
/// generator and secrets always come from flags or the environment.
///
/// Accepted keys (all optional, except that `site_dir` must be given here or
/// with `--site-dir`):
///
/// ```yaml
/// site_dir: /srv/blog
/// content_dir: content/post
/// build_dir: public
/// previous_dir: public.prev
/// dry_run_dir: public.dry
/// remote_url: "git@github.com:{owner}/{repo}.git"
/// graphql_endpoint: https://api.github.com/graphql
/// utc_offset: "+08:00"
/// widget_theme: github-light
/// ```
use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use issue_blog_core::config::{ContentStyle, SiteLayout, DEFAULT_REMOTE_URL};
use serde::Deserialize;
use tracing::{error, info};

use crate::error::CliError;

pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Installation directory. Never defaults to the working directory.
    pub site_dir: Option<PathBuf>,
    pub content_dir: PathBuf,
    pub build_dir: PathBuf,
    pub previous_dir: PathBuf,
    pub dry_run_dir: PathBuf,
    pub remote_url: String,
    pub graphql_endpoint: String,
    pub utc_offset: String,
    pub widget_theme: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let layout = SiteLayout::new("");
        Self {
            site_dir: None,
            content_dir: layout.content_dir,
            build_dir: layout.build_dir,
            previous_dir: layout.previous_dir,
            dry_run_dir: layout.dry_run_dir,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            graphql_endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_string(),
            utc_offset: "+08:00".to_string(),
            widget_theme: ContentStyle::default().widget_theme,
        }
    }
}

impl SiteConfig {
    /// Resolves the layout, taking the site directory from `site_dir_flag`
    /// first and from the file second.
    pub fn layout(&self, site_dir_flag: Option<&Path>) -> Result<SiteLayout, CliError> {
        let site_dir = site_dir_flag
            .map(Path::to_path_buf)
            .or_else(|| self.site_dir.clone())
            .ok_or_else(|| {
                error!("No site directory given");
                CliError::Argument(
                    "site directory is not set, pass --site-dir or set site_dir in the config file"
                        .to_string(),
                )
            })?;
        Ok(SiteLayout {
            site_dir,
            content_dir: self.content_dir.clone(),
            build_dir: self.build_dir.clone(),
            previous_dir: self.previous_dir.clone(),
            dry_run_dir: self.dry_run_dir.clone(),
        })
    }

    pub fn style(&self) -> Result<ContentStyle, CliError> {
        Ok(ContentStyle {
            offset: parse_utc_offset(&self.utc_offset)?,
            widget_theme: self.widget_theme.clone(),
        })
    }
}

/// Loads the config file at `path`, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<SiteConfig, CliError> {
    let Some(path_ref) = path else {
        info!("No config file given, using defaults");
        return Ok(SiteConfig::default());
    };
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(CliError::Argument(format!(
                "failed to read config file {}: {e}",
                path_ref.display()
            )));
        }
    };

    // An empty file is a valid, all-defaults config.
    if config_content.trim().is_empty() {
        return Ok(SiteConfig::default());
    }

    let config: SiteConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(CliError::Argument(format!("failed to parse config YAML: {e}")));
        }
    };

    // Fail on a bad offset now rather than halfway through a run.
    config.style()?;
    Ok(config)
}

/// Parses `+HH:MM`, `-HH:MM`, `+HHMM`, `+HH` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, CliError> {
    let invalid = || CliError::Argument(format!("invalid utc_offset {raw:?}, expected e.g. \"+08:00\""));
    let raw_trimmed = raw.trim();
    if raw_trimmed.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match raw_trimmed.as_bytes().first() {
        Some(b'+') => (1, &raw_trimmed[1..]),
        Some(b'-') => (-1, &raw_trimmed[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(invalid()),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
