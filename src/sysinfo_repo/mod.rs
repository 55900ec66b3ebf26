// Host metrics via sysinfo

mod linux;

use crate::models::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sysinfo::{Disks, Networks, System};
use tracing::instrument;

/// Samples CPU, memory, disk, network and uptime. Each section degrades to zeros on failure.
///
/// CPU usage is a delta between two refreshes of one `System`, so only the periodic sample
/// measures on `sys`. On-demand samples reuse its latest figure, or measure on `on_demand_sys`
/// before the first periodic sample exists.
pub struct SysinfoRepo {
    sys: Arc<Mutex<System>>,
    on_demand_sys: Arc<Mutex<System>>,
    last_cpu: Arc<Mutex<Option<CpuMetrics>>>,
    disks: Arc<Mutex<Disks>>,
    networks: Arc<Mutex<Networks>>,
    last_network: Arc<Mutex<NetworkMetrics>>,
    disk_mount: PathBuf,
    cpu_window: Duration,
}

impl SysinfoRepo {
    pub fn new(disk_mount: impl Into<PathBuf>, cpu_window: Duration) -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();
        let mut on_demand_sys = System::new();
        on_demand_sys.refresh_cpu_all();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            on_demand_sys: Arc::new(Mutex::new(on_demand_sys)),
            last_cpu: Arc::new(Mutex::new(None)),
            disks: Arc::new(Mutex::new(Disks::new_with_refreshed_list())),
            networks: Arc::new(Mutex::new(Networks::new_with_refreshed_list())),
            last_network: Arc::new(Mutex::new(NetworkMetrics::default())),
            disk_mount: disk_mount.into(),
            cpu_window,
        }
    }

    /// Periodic metrics sample; measures CPU over the configured window and keeps the figure
    /// for on-demand samples. Never fails: a section whose OS query fails is reported as zeros.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "sample"))]
    pub async fn sample(&self) -> MetricsSnapshot {
        let cpu = match self.get_cpu_metrics().await {
            Ok(cpu) => {
                if let Ok(mut last) = self.last_cpu.lock() {
                    *last = Some(cpu.clone());
                }
                cpu
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "get_cpu_metrics", "CPU metrics failed");
                CpuMetrics::default()
            }
        };
        self.assemble(cpu).await
    }

    /// Sample for a single caller (new subscriber, HTTP request). Leaves the periodic CPU
    /// measurement undisturbed.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "sample_on_demand"))]
    pub async fn sample_on_demand(&self) -> MetricsSnapshot {
        let latest = self.last_cpu.lock().ok().and_then(|last| last.clone());
        let cpu = match latest {
            Some(cpu) => cpu,
            None => measure_cpu(self.on_demand_sys.clone(), self.cpu_window)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, operation = "get_cpu_metrics", "CPU metrics failed");
                    CpuMetrics::default()
                }),
        };
        self.assemble(cpu).await
    }

    async fn assemble(&self, cpu: CpuMetrics) -> MetricsSnapshot {
        let memory = self.get_memory_metrics().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_memory_metrics", "memory metrics failed");
            MemoryMetrics::default()
        });
        let disk = self.get_disk_metrics().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_disk_metrics", "disk metrics failed");
            DiskMetrics::default()
        });
        let network = self.get_network_metrics().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_network_metrics", "network metrics failed");
            self.last_network
                .lock()
                .map(|last| *last)
                .unwrap_or_default()
        });
        let system = system_metrics();

        MetricsSnapshot {
            cpu,
            memory,
            disk,
            network,
            system,
        }
    }

    /// CPU usage over the configured window, measured on the periodic `System`.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "get_cpu_metrics"))]
    pub async fn get_cpu_metrics(&self) -> anyhow::Result<CpuMetrics> {
        measure_cpu(self.sys.clone(), self.cpu_window).await
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "get_memory_metrics"))]
    pub async fn get_memory_metrics(&self) -> anyhow::Result<MemoryMetrics> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_memory();

            let total = sys.total_memory();
            let available = sys.available_memory().min(total);
            let used = total.saturating_sub(available);

            Ok(MemoryMetrics {
                total,
                used,
                percent: percent_of(used, total),
                available,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    /// Usage of the filesystem holding `disk_mount` (longest mount-point prefix wins).
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "get_disk_metrics"))]
    pub async fn get_disk_metrics(&self) -> anyhow::Result<DiskMetrics> {
        let disks = self.disks.clone();
        let mount = self.disk_mount.clone();
        tokio::task::spawn_blocking(move || {
            let mut disks_guard = disks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo disks lock poisoned: {}", e))?;
            disks_guard.refresh(false);
            let disk = disks_guard
                .list()
                .iter()
                .filter(|d| mount.starts_with(d.mount_point()))
                .max_by_key(|d| mount_depth(d.mount_point()))
                .ok_or_else(|| anyhow::anyhow!("no disk mounted at {}", mount.display()))?;

            let total = disk.total_space();
            let free = disk.available_space().min(total);
            let used = total.saturating_sub(free);
            Ok(DiskMetrics {
                total,
                used,
                free,
                percent: percent_of(used, total),
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    /// Totals since boot over all interfaces, never lower than the previous sample.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "get_network_metrics"))]
    pub async fn get_network_metrics(&self) -> anyhow::Result<NetworkMetrics> {
        let networks = self.networks.clone();
        let last_network = self.last_network.clone();
        tokio::task::spawn_blocking(move || {
            let mut networks_guard = networks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo networks lock poisoned: {}", e))?;
            networks_guard.refresh(true);
            let current = networks_guard
                .list()
                .values()
                .fold(NetworkMetrics::default(), |acc, data| NetworkMetrics {
                    bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                    bytes_recv: acc.bytes_recv.saturating_add(data.total_received()),
                    packets_sent: acc
                        .packets_sent
                        .saturating_add(data.total_packets_transmitted()),
                    packets_recv: acc
                        .packets_recv
                        .saturating_add(data.total_packets_received()),
                });

            let mut last = last_network
                .lock()
                .map_err(|e| anyhow::anyhow!("network counters lock poisoned: {}", e))?;
            *last = last.max(current);
            Ok(*last)
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}

/// Two refreshes `window` apart; the wait happens without holding the lock.
async fn measure_cpu(sys: Arc<Mutex<System>>, window: Duration) -> anyhow::Result<CpuMetrics> {
    if !window.is_zero() {
        let first = sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = first
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_cpu_usage();
            anyhow::Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))??;
        tokio::time::sleep(window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)).await;
    }

    tokio::task::spawn_blocking(move || {
        let mut sys = sys
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
        sys.refresh_cpu_usage();
        sys.refresh_cpu_frequency();

        let percent = (sys.global_cpu_usage() as f64).clamp(0.0, 100.0);
        let logical_core_count = sys.cpus().len() as u32;
        let frequency_mhz = sys
            .cpus()
            .first()
            .map(|c| c.frequency() as f64)
            .filter(|mhz| *mhz > 0.0)
            .or_else(linux::read_cpu_mhz_linux)
            .unwrap_or(0.0);

        Ok(CpuMetrics {
            percent,
            logical_core_count,
            frequency_mhz,
        })
    })
    .await
    .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
}

fn mount_depth(path: &Path) -> usize {
    path.components().count()
}

fn system_metrics() -> SystemMetrics {
    let boot_time = match System::boot_time() {
        0 => linux::read_boot_time_linux().unwrap_or(0),
        t => t,
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0.0
        });
    let uptime_seconds = if boot_time == 0 {
        System::uptime() as f64
    } else {
        (now - boot_time as f64).max(0.0)
    };
    SystemMetrics {
        boot_time,
        uptime_seconds,
    }
}
