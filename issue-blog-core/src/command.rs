//! Process-backed [`CommandRunner`].

use std::path::Path;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::contract::{CommandError, CommandOutput, CommandRunner};

/// Runs commands with `std::process::Command`, capturing stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandOutput, CommandError> {
        debug!(program, ?args, cwd = %cwd.display(), "Launching command");

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|source| CommandError {
                program: program.to_string(),
                source,
            })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.success() {
            info!(program, ?args, "Command finished");
        } else {
            warn!(
                program,
                ?args,
                code = ?result.code,
                stderr = %result.stderr.trim(),
                "Command exited with non-zero status"
            );
        }
        for line in result.stdout.lines() {
            debug!(program, "{line}");
        }

        Ok(result)
    }
}
