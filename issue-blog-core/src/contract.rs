//! # contract: the narrow seams between the pipeline and the outside world
//!
//! The pipeline talks to exactly two external collaborators:
//!
//! - an [`IssueSource`], which returns the issues of a repository (the GitHub
//!   GraphQL fetcher in the CLI crate, or a mock in tests);
//! - a [`CommandRunner`], which executes external programs (the site
//!   generator and `git`).
//!
//! Both traits are annotated for `mockall`, so tests can assert on the exact
//! invocations without touching the network or spawning processes.

use std::path::Path;

use async_trait::async_trait;
use mockall::automock;

use crate::model::{Issue, RepoRef};

/// Error type for the [`IssueSource`] trait (boxed, the source decides what it reports).
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Returns the issues of a repository, in source order.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait IssueSource: Send + Sync {
    async fn fetch_issues(&self, repo: &RepoRef) -> Result<Vec<Issue>, FetchError>;
}

/// Exit status and captured output of one finished external command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output with no captured text.
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The command could not be started at all.
#[derive(Debug, thiserror::Error)]
#[error("failed to launch `{program}`: {source}")]
pub struct CommandError {
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

/// Runs an external program to completion.
///
/// A non-zero exit is not an error at this level: callers decide whether the
/// status matters (the generator's does not, git's does).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String], cwd: &Path)
        -> Result<CommandOutput, CommandError>;
}
