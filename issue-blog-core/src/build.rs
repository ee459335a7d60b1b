//! Site builder adapter: rotate snapshots, then run the external generator.

use std::path::Path;

use tracing::{info, warn};

use crate::contract::{CommandError, CommandRunner};
use crate::snapshot::{Promotion, SnapshotError, SnapshotStore};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("site generator could not be started: {0}")]
    Launch(#[from] CommandError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub first_build: bool,
    /// Exit code of the generator; `None` if it was killed by a signal.
    pub generator_code: Option<i32>,
}

/// Promotes the current snapshot, prepares an empty output directory and runs
/// `generator` with no arguments in `site_dir`.
///
/// The generator's exit status is reported but not interpreted: whatever it
/// left behind in the output directory is the new snapshot.
pub fn build_site<R>(
    runner: &R,
    generator: &Path,
    site_dir: &Path,
    store: &SnapshotStore,
) -> Result<BuildOutcome, BuildError>
where
    R: CommandRunner + ?Sized,
{
    let first_build = store.promote()? == Promotion::FirstBuild;
    store.prepare_current()?;

    let program = generator.to_string_lossy();
    info!(generator = %program, site_dir = %site_dir.display(), "Running site generator");
    let output = runner.run(&program, &[], site_dir)?;
    if !output.success() {
        warn!(
            generator = %program,
            code = ?output.code,
            stderr = %output.stderr.trim(),
            "Site generator exited with non-zero status"
        );
    }

    Ok(BuildOutcome {
        first_build,
        generator_code: output.code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{CommandOutput, MockCommandRunner};
    use std::fs;
    use std::io;

    fn store(root: &Path) -> SnapshotStore {
        SnapshotStore::new(
            root.join("public"),
            root.join("public.prev"),
            root.join("public.dry"),
        )
    }

    #[test]
    fn runs_generator_without_arguments_in_site_dir() {
        let dir = tempfile::tempdir().unwrap();
        let site_dir = dir.path().to_path_buf();
        let expected_dir = site_dir.clone();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(move |program, args, cwd| {
                program == "/usr/bin/hugo" && args.is_empty() && cwd == expected_dir.as_path()
            })
            .times(1)
            .returning(|_, _, _| Ok(CommandOutput::ok()));

        let outcome = build_site(
            &runner,
            Path::new("/usr/bin/hugo"),
            &site_dir,
            &store(dir.path()),
        )
        .unwrap();
        assert!(outcome.first_build);
        assert_eq!(outcome.generator_code, Some(0));
        assert!(site_dir.join("public").is_dir());
    }

    #[test]
    fn non_zero_generator_exit_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();

        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _, _| {
            Ok(CommandOutput {
                code: Some(255),
                stdout: String::new(),
                stderr: "template error".to_string(),
            })
        });

        let outcome = build_site(&runner, Path::new("hugo"), dir.path(), &store(dir.path())).unwrap();
        assert!(!outcome.first_build);
        assert_eq!(outcome.generator_code, Some(255));
        assert!(dir.path().join("public.prev").is_dir());
    }

    #[test]
    fn launch_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|program, _, _| {
            Err(CommandError {
                program: program.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "not found"),
            })
        });

        let err = build_site(&runner, Path::new("hugo"), dir.path(), &store(dir.path())).unwrap_err();
        assert!(matches!(err, BuildError::Launch(_)));
    }
}
