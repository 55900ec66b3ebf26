// Periodic metrics and projects cycles, fan-out to subscribers, and on-join snapshots.
// Each cycle runs in its own task so the CPU measurement window never delays the other.

use crate::config::FileConfig;
use crate::file_watcher::{self, FileCache, ObservedFile};
use crate::models::{Event, MetricsSnapshot, ProjectsSnapshot, ServiceStatus};
use crate::registry::{DeliveryReport, SubscriberId, Subscription, SubscriptionRegistry};
use crate::services::ServiceInspector;
use crate::sysinfo_repo::SysinfoRepo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, interval};
use tracing::Instrument;

/// Rate limit for the "no subscribers" debug line.
const NO_SUBSCRIBERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Collaborators the broadcaster polls and delivers through.
pub struct BroadcasterDeps {
    pub sysinfo_repo: Arc<SysinfoRepo>,
    pub inspector: Arc<ServiceInspector>,
    pub registry: Arc<SubscriptionRegistry>,
}

/// Cycle cadence and logging config.
pub struct CycleConfig {
    pub metrics_interval_ms: u64,
    pub projects_interval_ms: u64,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// Join handles for the two background cycles.
pub struct CycleHandles {
    pub metrics: JoinHandle<()>,
    pub projects: JoinHandle<()>,
}

impl CycleHandles {
    pub async fn join(self) {
        let _ = tokio::join!(self.metrics, self.projects);
    }
}

pub struct Broadcaster {
    sysinfo_repo: Arc<SysinfoRepo>,
    inspector: Arc<ServiceInspector>,
    registry: Arc<SubscriptionRegistry>,
    cache: FileCache,
    services: Vec<String>,
    files: Vec<FileConfig>,
    metrics_cycles: AtomicU64,
    projects_cycles: AtomicU64,
}

impl Broadcaster {
    pub fn new(deps: BroadcasterDeps, services: Vec<String>, files: Vec<FileConfig>) -> Self {
        let BroadcasterDeps {
            sysinfo_repo,
            inspector,
            registry,
        } = deps;
        Self {
            sysinfo_repo,
            inspector,
            registry,
            cache: FileCache::new(),
            services,
            files,
            metrics_cycles: AtomicU64::new(0),
            projects_cycles: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn file_cache(&self) -> &FileCache {
        &self.cache
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn metrics_cycles(&self) -> u64 {
        self.metrics_cycles.load(Ordering::Relaxed)
    }

    pub fn projects_cycles(&self) -> u64 {
        self.projects_cycles.load(Ordering::Relaxed)
    }

    /// Current metrics; CPU usage is the latest periodic figure.
    pub async fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.sysinfo_repo.sample_on_demand().await
    }

    /// Current services and files, with full content for every readable file.
    pub async fn projects_snapshot(&self) -> ProjectsSnapshot {
        let (services, files) = self.gather_projects(true).await;
        ProjectsSnapshot {
            services,
            files: files.into_iter().map(|f| f.file).collect(),
        }
    }

    /// One metrics iteration: sample and fan out.
    pub async fn run_metrics_cycle(&self) -> DeliveryReport {
        let cutoff = self.registry.cutoff();
        let snapshot = self.sysinfo_repo.sample().await;
        let report = self.registry.broadcast(cutoff, &Event::StatsUpdate(snapshot));
        self.metrics_cycles.fetch_add(1, Ordering::Relaxed);
        report
    }

    /// One projects iteration: inspect services, probe files through the cache, fan out
    /// per-subscriber snapshots. Subscribers that join while it gathers are left out.
    pub async fn run_projects_cycle(&self) -> DeliveryReport {
        let cutoff = self.registry.cutoff();
        let (services, files) = self.gather_projects(false).await;
        let report = self.registry.broadcast_projects(cutoff, &services, &files);
        self.projects_cycles.fetch_add(1, Ordering::Relaxed);
        report
    }

    /// Registers a subscriber and immediately sends it one snapshot of each kind
    /// (files forced to full content). Cycle fan-outs reach it only after that pair is queued.
    /// Events arrive on the returned subscription.
    pub fn join(self: &Arc<Self>) -> Subscription {
        let subscription = self.registry.join_pending();
        let id = subscription.id;
        let this = self.clone();
        tokio::spawn(async move { this.welcome(id).await });
        subscription
    }

    pub fn leave(&self, id: SubscriberId) -> bool {
        self.registry.leave(id)
    }

    async fn welcome(&self, id: SubscriberId) {
        let metrics = async {
            let snapshot = self.sysinfo_repo.sample_on_demand().await;
            if let Err(e) = self.registry.deliver_to(id, Event::StatsUpdate(snapshot)) {
                tracing::debug!(error = %e, operation = "welcome_metrics", "on-join delivery failed");
            }
        };
        let projects = async {
            let (services, files) = self.gather_projects(true).await;
            if let Err(e) = self.registry.deliver_projects_to(id, &services, &files) {
                tracing::debug!(error = %e, operation = "welcome_projects", "on-join delivery failed");
            }
        };
        tokio::join!(metrics, projects);
        self.registry.admit(id);
    }

    async fn gather_projects(
        &self,
        force_full: bool,
    ) -> (Vec<ServiceStatus>, Vec<ObservedFile>) {
        let services = self.inspector.inspect_all(&self.services).await;
        let mut files = Vec::with_capacity(self.files.len());
        for config in &self.files {
            files.push(file_watcher::observe(config, &self.cache, force_full).await);
        }
        (services, files)
    }
}

/// Spawns the metrics and projects cycles. Both stop once `shutdown_rx` changes or its
/// sender is dropped; an iteration in progress runs to completion first.
pub fn spawn(
    broadcaster: Arc<Broadcaster>,
    config: CycleConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> CycleHandles {
    let CycleConfig {
        metrics_interval_ms,
        projects_interval_ms,
        stats_log_interval_secs,
    } = config;

    let metrics = {
        let broadcaster = broadcaster.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_millis(metrics_interval_ms));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
            stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last_no_subscribers_log: Option<Instant> = None;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let report = broadcaster.run_metrics_cycle().await;
                        log_report("metrics", report, &broadcaster, &mut last_no_subscribers_log);
                    }
                    _ = stats_log_tick.tick() => {
                        tracing::info!(
                            subscribers = broadcaster.registry.len(),
                            metrics_cycles_total = broadcaster.metrics_cycles(),
                            projects_cycles_total = broadcaster.projects_cycles(),
                            cached_files = broadcaster.cache.len(),
                            "app stats"
                        );
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("Metrics cycle shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(tracing::debug_span!("metrics_cycle", metrics_interval_ms)))
    };

    let projects = {
        let mut shutdown_rx = shutdown_rx;
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_millis(projects_interval_ms));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last_no_subscribers_log: Option<Instant> = None;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let report = broadcaster.run_projects_cycle().await;
                        log_report("projects", report, &broadcaster, &mut last_no_subscribers_log);
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("Projects cycle shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(tracing::debug_span!("projects_cycle", projects_interval_ms)))
    };

    CycleHandles { metrics, projects }
}

fn log_report(
    cycle: &'static str,
    report: DeliveryReport,
    broadcaster: &Broadcaster,
    last_no_subscribers_log: &mut Option<Instant>,
) {
    if broadcaster.registry.is_empty() && report.delivered == 0 {
        let should_log = last_no_subscribers_log
            .is_none_or(|t| t.elapsed() >= NO_SUBSCRIBERS_LOG_INTERVAL);
        if should_log {
            tracing::debug!(cycle, "No subscribers connected; snapshot not delivered");
            *last_no_subscribers_log = Some(Instant::now());
        }
        return;
    }
    tracing::trace!(
        cycle,
        delivered = report.delivered,
        dropped = report.dropped,
        disconnected = report.disconnected,
        "snapshot broadcast"
    );
}
