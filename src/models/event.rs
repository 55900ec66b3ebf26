// Pushed event envelope: {"event": "...", "data": {...}}

use serde::{Deserialize, Serialize};

use super::{MetricsSnapshot, ProjectsSnapshot};

pub const STATS_UPDATE: &str = "stats_update";
pub const PROJECTS_UPDATE: &str = "projects_update";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    StatsUpdate(MetricsSnapshot),
    ProjectsUpdate(ProjectsSnapshot),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::StatsUpdate(_) => STATS_UPDATE,
            Event::ProjectsUpdate(_) => PROJECTS_UPDATE,
        }
    }
}
