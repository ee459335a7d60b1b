//! Publisher: turn the build output into a fresh commit on the target remote.
//!
//! The target repository is cloned into a scratch directory, its `.git` is
//! moved into the build output (which thereby becomes the working copy) and
//! the scratch clone is thrown away. When the working copy then matches the
//! remote there is nothing to commit and the push is skipped. Every step is
//! fatal on failure and nothing is rolled back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use crate::contract::{CommandError, CommandOutput, CommandRunner};

const VCS_DIR: &str = ".git";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Launch(#[from] CommandError),
    #[error("`git {args}` exited with status {code:?}: {stderr}")]
    Git {
        args: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("publish failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What to push where.
#[derive(Debug, Clone)]
pub struct PublishTarget<'a> {
    /// Clone URL of the hosting repository.
    pub remote_url: &'a str,
    /// Scratch location for the fresh clone.
    pub clone_dir: &'a Path,
    /// Build output that becomes the new working copy.
    pub build_dir: &'a Path,
}

/// How a successful publish ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new commit was pushed to the remote.
    Pushed,
    /// The remote already holds exactly this output.
    NothingToCommit,
}

/// Commit message for a rebuild at `now`, to second precision.
pub fn commit_message(now: DateTime<Local>) -> String {
    format!("rebuild site {}", now.format("%Y-%m-%d %H:%M:%S"))
}

pub fn publish<R>(
    runner: &R,
    target: &PublishTarget<'_>,
    now: DateTime<Local>,
) -> Result<PublishOutcome, PublishError>
where
    R: CommandRunner + ?Sized,
{
    let clone_dir = target.clone_dir;
    let parent = clone_dir.parent().unwrap_or_else(|| Path::new("."));

    remove_dir_if_exists(clone_dir)?;
    git(
        runner,
        parent,
        &[
            "clone".to_string(),
            target.remote_url.to_string(),
            clone_dir.to_string_lossy().into_owned(),
        ],
    )?;

    let build_git = target.build_dir.join(VCS_DIR);
    remove_dir_if_exists(&build_git)?;
    fs::rename(clone_dir.join(VCS_DIR), &build_git).map_err(|source| PublishError::Io {
        action: "move .git into",
        path: target.build_dir.to_path_buf(),
        source,
    })?;
    remove_dir_if_exists(clone_dir)?;
    info!(build_dir = %target.build_dir.display(), "Build output is now the working copy");

    let build_dir = target.build_dir;
    let status = git(runner, build_dir, &["status".to_string()])?;
    for line in status.stdout.lines() {
        info!("{line}");
    }
    git(runner, build_dir, &["add".to_string(), ".".to_string()])?;

    let pending = git(
        runner,
        build_dir,
        &["status".to_string(), "--porcelain".to_string()],
    )?;
    if pending.stdout.trim().is_empty() {
        println!("remote already up to date, nothing to publish");
        warn!(remote = target.remote_url, "Working copy matches the remote, skipping commit and push");
        return Ok(PublishOutcome::NothingToCommit);
    }

    git(
        runner,
        build_dir,
        &["commit".to_string(), "-m".to_string(), commit_message(now)],
    )?;
    git(runner, build_dir, &["push".to_string()])?;

    info!(remote = target.remote_url, "Published site");
    Ok(PublishOutcome::Pushed)
}

fn git<R>(runner: &R, cwd: &Path, args: &[String]) -> Result<CommandOutput, PublishError>
where
    R: CommandRunner + ?Sized,
{
    let output = runner.run("git", args, cwd)?;
    if !output.success() {
        error!(?args, code = ?output.code, stderr = %output.stderr.trim(), "git failed");
        return Err(PublishError::Git {
            args: args.join(" "),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

fn remove_dir_if_exists(path: &Path) -> Result<(), PublishError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PublishError::Io {
            action: "remove",
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockCommandRunner;
    use chrono::TimeZone;
    use mockall::Sequence;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }

    fn dirty(porcelain: &str) -> CommandOutput {
        CommandOutput {
            code: Some(0),
            stdout: porcelain.to_string(),
            stderr: String::new(),
        }
    }

    #[test]
    fn commit_message_has_second_precision() {
        assert_eq!(commit_message(fixed_now()), "rebuild site 2024-05-06 07:08:09");
    }

    #[test]
    fn clones_moves_git_and_pushes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let clone_dir = dir.path().join("jdoe.github.io");
        let build_dir = dir.path().join("public");
        fs::create_dir_all(&build_dir).unwrap();
        fs::write(build_dir.join("index.html"), "site").unwrap();
        // Stale clone from an earlier, interrupted run.
        fs::create_dir_all(clone_dir.join("leftover")).unwrap();

        let mut seq = Sequence::new();
        let mut runner = MockCommandRunner::new();

        let parent = dir.path().to_path_buf();
        runner
            .expect_run()
            .withf(move |program, args, cwd| {
                program == "git" && args.first().map(String::as_str) == Some("clone") && cwd == parent.as_path()
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, args, _| {
                let dest = PathBuf::from(&args[2]);
                assert!(!dest.join("leftover").exists(), "stale clone must be removed first");
                fs::create_dir_all(dest.join(".git")).unwrap();
                fs::write(dest.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
                fs::write(dest.join("old.html"), "old").unwrap();
                Ok(CommandOutput::ok())
            });

        for expected in [
            vec!["status"],
            vec!["add", "."],
            vec!["status", "--porcelain"],
            vec!["commit", "-m", "rebuild site 2024-05-06 07:08:09"],
            vec!["push"],
        ] {
            let cwd = build_dir.clone();
            runner
                .expect_run()
                .withf(move |program, args, dir| {
                    program == "git" && args == expected.as_slice() && dir == cwd.as_path()
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, args, _| {
                    Ok(if args == ["status", "--porcelain"] {
                        dirty("?? index.html\n")
                    } else {
                        CommandOutput::ok()
                    })
                });
        }

        let target = PublishTarget {
            remote_url: "git@github.com:jdoe/jdoe.github.io.git",
            clone_dir: &clone_dir,
            build_dir: &build_dir,
        };
        assert_eq!(
            publish(&runner, &target, fixed_now()).unwrap(),
            PublishOutcome::Pushed
        );

        assert!(!clone_dir.exists(), "scratch clone must be removed");
        assert!(build_dir.join(".git/HEAD").is_file());
        assert!(!build_dir.join("old.html").exists());
    }

    #[test]
    fn failing_push_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let clone_dir = dir.path().join("site");
        let build_dir = dir.path().join("public");
        fs::create_dir_all(&build_dir).unwrap();

        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, args, _| match args[0].as_str() {
            "clone" => {
                fs::create_dir_all(PathBuf::from(&args[2]).join(".git")).unwrap();
                Ok(CommandOutput::ok())
            }
            "status" if args.len() == 2 => Ok(dirty(" M index.html\n")),
            "push" => Ok(CommandOutput {
                code: Some(128),
                stdout: String::new(),
                stderr: "permission denied\n".to_string(),
            }),
            _ => Ok(CommandOutput::ok()),
        });

        let target = PublishTarget {
            remote_url: "git@example.com:site.git",
            clone_dir: &clone_dir,
            build_dir: &build_dir,
        };
        let err = publish(&runner, &target, fixed_now()).unwrap_err();
        match err {
            PublishError::Git { args, code, stderr } => {
                assert_eq!(args, "push");
                assert_eq!(code, Some(128));
                assert_eq!(stderr, "permission denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn clean_working_copy_skips_commit_and_push() {
        let dir = tempfile::tempdir().unwrap();
        let clone_dir = dir.path().join("site");
        let build_dir = dir.path().join("public");
        fs::create_dir_all(&build_dir).unwrap();
        fs::write(build_dir.join("index.html"), "site").unwrap();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|_, args, _| args[0] == "commit" || args[0] == "push")
            .never();
        runner.expect_run().returning(|_, args, _| {
            if args[0] == "clone" {
                fs::create_dir_all(PathBuf::from(&args[2]).join(".git")).unwrap();
            }
            Ok(CommandOutput::ok())
        });

        let target = PublishTarget {
            remote_url: "git@example.com:site.git",
            clone_dir: &clone_dir,
            build_dir: &build_dir,
        };
        assert_eq!(
            publish(&runner, &target, fixed_now()).unwrap(),
            PublishOutcome::NothingToCommit
        );
        assert!(build_dir.join(".git").is_dir());
        assert!(!clone_dir.exists());
    }

    #[test]
    fn failing_clone_stops_before_touching_build_dir() {
        let dir = tempfile::tempdir().unwrap();
        let clone_dir = dir.path().join("site");
        let build_dir = dir.path().join("public");
        fs::create_dir_all(&build_dir).unwrap();

        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(|_, _, _| {
            Ok(CommandOutput {
                code: Some(128),
                stdout: String::new(),
                stderr: "repository not found".to_string(),
            })
        });

        let target = PublishTarget {
            remote_url: "git@example.com:missing.git",
            clone_dir: &clone_dir,
            build_dir: &build_dir,
        };
        assert!(matches!(
            publish(&runner, &target, fixed_now()),
            Err(PublishError::Git { .. })
        ));
        assert!(!build_dir.join(".git").exists());
    }
}
