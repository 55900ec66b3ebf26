// External command capability. Time limits are applied by callers, not assumed here.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::process::Stdio;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {}ms", .timeout.as_millis())]
    TimedOut { program: String, timeout: Duration },
    #[error("{program} exited unsuccessfully: {stderr}")]
    Failed { program: String, stderr: String },
}

/// Runs a program to completion and captures its output.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[&str],
    ) -> BoxFuture<'static, Result<CommandOutput, CommandError>>;
}

/// Spawns real processes via tokio. The child is killed if the future is dropped (e.g. on timeout).
#[derive(Debug, Default, Clone)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
    ) -> BoxFuture<'static, Result<CommandOutput, CommandError>> {
        let program = program.to_string();
        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(args)
            .stdin(Stdio::null())
            .env("SYSTEMD_PAGER", "")
            .kill_on_drop(true);
        async move {
            let output = cmd
                .output()
                .await
                .map_err(|source| CommandError::Spawn { program, source })?;
            Ok(CommandOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
        .boxed()
    }
}

/// Runs `program` through `runner`, failing with `TimedOut` once `limit` elapses.
pub async fn run_bounded(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
    limit: Duration,
) -> Result<CommandOutput, CommandError> {
    match tokio::time::timeout(limit, runner.run(program, args)).await {
        Ok(result) => result,
        Err(_) => Err(CommandError::TimedOut {
            program: program.to_string(),
            timeout: limit,
        }),
    }
}
