use std::process::ExitCode;

use issue_blog_core::pipeline::PipelineError;

/// Errors raised by the CLI layer itself.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Bad or missing input: flags, token, config file.
    #[error("{0}")]
    Argument(String),
}

/// Exit code for an error that ended the run.
///
/// `2` for argument errors, `1` for an empty fetch and for every other fatal
/// error.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(CliError::Argument(_)) = err.downcast_ref::<CliError>() {
        return ExitCode::from(2);
    }
    if let Some(PipelineError::NoIssues) = err.downcast_ref::<PipelineError>() {
        return ExitCode::from(1);
    }
    ExitCode::FAILURE
}
