use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub inspector: InspectorConfig,
    /// Service units to inspect, in display order.
    #[serde(default)]
    pub services: Vec<String>,
    /// Files to watch, in display order.
    #[serde(default)]
    pub files: Vec<FileConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    #[serde(default = "default_metrics_interval_ms")]
    pub metrics_interval_ms: u64,
    #[serde(default = "default_projects_interval_ms")]
    pub projects_interval_ms: u64,
    /// Wait between the two CPU refreshes of one metrics sample. 0 = delta since the previous sample.
    #[serde(default = "default_cpu_sample_window_ms")]
    pub cpu_sample_window_ms: u64,
    /// Per-subscriber outbound queue; a full queue drops the event for that subscriber only.
    #[serde(default = "default_subscriber_queue_capacity")]
    pub subscriber_queue_capacity: usize,
}

fn default_metrics_interval_ms() -> u64 {
    2000
}

fn default_projects_interval_ms() -> u64 {
    5000
}

fn default_cpu_sample_window_ms() -> u64 {
    1000
}

fn default_subscriber_queue_capacity() -> usize {
    16
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            metrics_interval_ms: default_metrics_interval_ms(),
            projects_interval_ms: default_projects_interval_ms(),
            cpu_sample_window_ms: default_cpu_sample_window_ms(),
            subscriber_queue_capacity: default_subscriber_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log app stats (subscribers, cycles run) at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
    /// Mount point reported in the disk section of metrics.
    #[serde(default = "default_disk_mount")]
    pub disk_mount: String,
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

fn default_disk_mount() -> String {
    "/".into()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: default_stats_log_interval_secs(),
            disk_mount: default_disk_mount(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectorConfig {
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_log_timeout_ms")]
    pub log_timeout_ms: u64,
    #[serde(default = "default_log_lines")]
    pub log_lines: usize,
    #[serde(default = "default_systemctl")]
    pub systemctl: String,
    #[serde(default = "default_journalctl")]
    pub journalctl: String,
}

fn default_command_timeout_ms() -> u64 {
    2000
}

fn default_log_timeout_ms() -> u64 {
    5000
}

fn default_log_lines() -> usize {
    50
}

fn default_systemctl() -> String {
    "systemctl".into()
}

fn default_journalctl() -> String {
    "journalctl".into()
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            log_timeout_ms: default_log_timeout_ms(),
            log_lines: default_log_lines(),
            systemctl: default_systemctl(),
            journalctl: default_journalctl(),
        }
    }
}

/// One watched file: display name, path, and whether clients show it expanded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    pub name: String,
    pub path: String,
    #[serde(default = "default_expand")]
    pub expand: bool,
}

fn default_expand() -> bool {
    true
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.publishing.metrics_interval_ms > 0,
            "publishing.metrics_interval_ms must be > 0, got {}",
            self.publishing.metrics_interval_ms
        );
        anyhow::ensure!(
            self.publishing.projects_interval_ms > 0,
            "publishing.projects_interval_ms must be > 0, got {}",
            self.publishing.projects_interval_ms
        );
        anyhow::ensure!(
            self.publishing.subscriber_queue_capacity >= 2,
            "publishing.subscriber_queue_capacity must be >= 2, got {}",
            self.publishing.subscriber_queue_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            !self.monitoring.disk_mount.is_empty(),
            "monitoring.disk_mount must be non-empty"
        );
        anyhow::ensure!(
            self.inspector.command_timeout_ms > 0,
            "inspector.command_timeout_ms must be > 0, got {}",
            self.inspector.command_timeout_ms
        );
        anyhow::ensure!(
            self.inspector.log_timeout_ms > 0,
            "inspector.log_timeout_ms must be > 0, got {}",
            self.inspector.log_timeout_ms
        );
        anyhow::ensure!(
            self.inspector.log_lines > 0,
            "inspector.log_lines must be > 0, got {}",
            self.inspector.log_lines
        );
        for (i, name) in self.services.iter().enumerate() {
            anyhow::ensure!(!name.is_empty(), "services[{}] must be non-empty", i);
        }
        for (i, file) in self.files.iter().enumerate() {
            anyhow::ensure!(!file.name.is_empty(), "files[{}].name must be non-empty", i);
            anyhow::ensure!(!file.path.is_empty(), "files[{}].path must be non-empty", i);
        }
        Ok(())
    }
}
