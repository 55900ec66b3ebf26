// Service and watched-file status models

use serde::{Deserialize, Serialize};

/// Unit state as reported by the service manager, plus `Error` when inspection itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Active,
    Inactive,
    Failed,
    Unknown,
    Error,
}

impl ServiceState {
    /// Maps systemd `ActiveState` values. Transitional states fold into their destination.
    pub fn from_active_state(s: &str) -> Self {
        match s.trim() {
            "active" | "reloading" | "refreshing" => Self::Active,
            "inactive" | "deactivating" => Self::Inactive,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub name: String,
    pub active: bool,
    pub status: ServiceState,
    pub last_active: String,
    /// Bytes as a decimal string, "0" when not reported.
    pub memory_bytes: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceStatus {
    pub fn error(name: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            active: false,
            status: ServiceState::Error,
            last_active: "N/A".into(),
            memory_bytes: "0".into(),
            description: name.to_string(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredFile {
    pub name: String,
    pub path: String,
    pub expand: bool,
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Modification time, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<f64>,
    /// Full current text. Omitted when `unchanged` or when the file is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub unchanged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsSnapshot {
    pub services: Vec<ServiceStatus>,
    pub files: Vec<MonitoredFile>,
}
