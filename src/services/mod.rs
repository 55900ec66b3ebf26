// Service status and logs via systemctl / journalctl

mod command;
pub mod parse;

pub use command::{CommandError, CommandOutput, CommandRunner, SystemCommandRunner, run_bounded};

use crate::config::InspectorConfig;
use crate::models::ServiceStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub struct ServiceInspector {
    runner: Arc<dyn CommandRunner>,
    systemctl: String,
    timeout: Duration,
}

impl ServiceInspector {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &InspectorConfig) -> Self {
        Self {
            runner,
            systemctl: config.systemctl.clone(),
            timeout: Duration::from_millis(config.command_timeout_ms),
        }
    }

    /// Liveness check plus detail query, each bounded by the command timeout.
    /// Any failure yields `status = error` for this service only.
    #[instrument(skip(self), fields(operation = "inspect_service"))]
    pub async fn inspect(&self, name: &str) -> ServiceStatus {
        match self.try_inspect(name).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, service = name, "service inspection failed");
                ServiceStatus::error(name, e.to_string())
            }
        }
    }

    /// Inspects every service concurrently; output keeps the order of `names`.
    pub async fn inspect_all(&self, names: &[String]) -> Vec<ServiceStatus> {
        futures_util::future::join_all(names.iter().map(|name| self.inspect(name))).await
    }

    async fn try_inspect(&self, name: &str) -> Result<ServiceStatus, CommandError> {
        let liveness = run_bounded(
            self.runner.as_ref(),
            &self.systemctl,
            &["is-active", name],
            self.timeout,
        )
        .await?;
        let active = liveness.stdout.trim() == "active";

        let detail = run_bounded(
            self.runner.as_ref(),
            &self.systemctl,
            &["show", name, "--no-pager"],
            self.timeout,
        )
        .await?;
        let props = parse::parse_properties(&detail.stdout);
        Ok(parse::service_status(name, active, &props))
    }
}

/// Recent journal lines for a unit.
pub struct LogReader {
    runner: Arc<dyn CommandRunner>,
    journalctl: String,
    timeout: Duration,
    default_lines: usize,
}

impl LogReader {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &InspectorConfig) -> Self {
        Self {
            runner,
            journalctl: config.journalctl.clone(),
            timeout: Duration::from_millis(config.log_timeout_ms),
            default_lines: config.log_lines,
        }
    }

    /// Last `lines` (default from config) log lines as one blob. Failures come back as a
    /// readable placeholder instead of an error.
    #[instrument(skip(self), fields(operation = "recent_logs"))]
    pub async fn recent_logs(&self, service: &str, lines: Option<usize>) -> String {
        match self.try_recent_logs(service, lines).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, service, "log read failed");
                format!("Unable to fetch logs: {}", e)
            }
        }
    }

    async fn try_recent_logs(
        &self,
        service: &str,
        lines: Option<usize>,
    ) -> Result<String, CommandError> {
        let lines = lines.filter(|n| *n > 0).unwrap_or(self.default_lines).to_string();
        let output = run_bounded(
            self.runner.as_ref(),
            &self.journalctl,
            &["-u", service, "-n", lines.as_str(), "--no-pager"],
            self.timeout,
        )
        .await?;
        if !output.success && output.stdout.trim().is_empty() {
            return Err(CommandError::Failed {
                program: self.journalctl.clone(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}
