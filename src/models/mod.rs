// Domain models

mod event;
mod metrics;
mod projects;

pub use event::{Event, PROJECTS_UPDATE, STATS_UPDATE};
pub use metrics::{
    CpuMetrics, DiskMetrics, MemoryMetrics, MetricsSnapshot, NetworkMetrics, SystemMetrics,
    percent_of,
};
pub use projects::{MonitoredFile, ProjectsSnapshot, ServiceState, ServiceStatus};
