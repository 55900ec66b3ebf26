use anyhow::Result;
use hostpulse::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        services = app_config.services.len(),
        files = app_config.files.len(),
        "Configuration loaded"
    );

    let runner: Arc<dyn services::CommandRunner> = Arc::new(services::SystemCommandRunner);
    let sysinfo_repo = Arc::new(sysinfo_repo::SysinfoRepo::new(
        app_config.monitoring.disk_mount.clone(),
        Duration::from_millis(app_config.publishing.cpu_sample_window_ms),
    ));
    let inspector = Arc::new(services::ServiceInspector::new(
        runner.clone(),
        &app_config.inspector,
    ));
    let log_reader = Arc::new(services::LogReader::new(runner, &app_config.inspector));
    let registry = Arc::new(registry::SubscriptionRegistry::new(
        app_config.publishing.subscriber_queue_capacity,
    ));

    let broadcaster = Arc::new(broadcaster::Broadcaster::new(
        broadcaster::BroadcasterDeps {
            sysinfo_repo,
            inspector,
            registry,
        },
        app_config.services.clone(),
        app_config.files.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let cycles = broadcaster::spawn(
        broadcaster.clone(),
        broadcaster::CycleConfig {
            metrics_interval_ms: app_config.publishing.metrics_interval_ms,
            projects_interval_ms: app_config.publishing.projects_interval_ms,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
        shutdown_rx,
    );

    let app = routes::app(broadcaster, log_reader);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
            cycles.join().await;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
