// ServiceInspector and LogReader tests over a scripted command runner

mod common;

use common::{FakeRunner, Reply, inspector_config};
use hostpulse::models::ServiceState;
use hostpulse::services::{
    CommandError, CommandOutput, LogReader, ServiceInspector, SystemCommandRunner, run_bounded,
};
use std::time::{Duration, Instant};

#[tokio::test]
async fn active_service_is_parsed_from_show_output() {
    let runner = FakeRunner::new();
    runner.service("quote.service", "active", "Quote bot");
    let inspector = ServiceInspector::new(runner.clone(), &inspector_config(500));

    let status = inspector.inspect("quote.service").await;
    assert_eq!(status.name, "quote.service");
    assert!(status.active);
    assert_eq!(status.status, ServiceState::Active);
    assert_eq!(status.description, "Quote bot");
    assert_eq!(status.last_active, "2024-03-04 08:15:00");
    assert_eq!(status.memory_bytes, "4096");
    assert!(status.error.is_none());
    assert_eq!(
        runner.calls(),
        vec![
            "systemctl is-active quote.service",
            "systemctl show quote.service --no-pager"
        ]
    );
}

#[tokio::test]
async fn failed_unit_is_inactive_with_failed_status() {
    let runner = FakeRunner::new();
    runner.service("forum-pulse.service", "failed", "Forum pulse");
    let inspector = ServiceInspector::new(runner, &inspector_config(500));

    let status = inspector.inspect("forum-pulse.service").await;
    assert!(!status.active);
    assert_eq!(status.status, ServiceState::Failed);
}

#[tokio::test]
async fn timeout_yields_error_status() {
    let runner = FakeRunner::new();
    runner.reply("is-active x.service", Reply::Hang);
    let inspector = ServiceInspector::new(runner, &inspector_config(50));

    let started = Instant::now();
    let status = inspector.inspect("x.service").await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(status.name, "x.service");
    assert!(!status.active);
    assert_eq!(status.status, ServiceState::Error);
    let error = status.error.expect("error populated");
    assert!(!error.is_empty());
    assert!(error.contains("timed out"));
}

#[tokio::test]
async fn detail_query_timeout_also_errors() {
    let runner = FakeRunner::new();
    runner.stdout("is-active slow.service", "active\n");
    runner.reply("show slow.service --no-pager", Reply::Hang);
    let inspector = ServiceInspector::new(runner, &inspector_config(50));

    let status = inspector.inspect("slow.service").await;
    assert_eq!(status.status, ServiceState::Error);
    assert!(!status.active);
}

#[tokio::test]
async fn spawn_failure_yields_error_status() {
    let runner = FakeRunner::new();
    runner.reply(
        "is-active gone.service",
        Reply::Fail("No such file or directory".into()),
    );
    let inspector = ServiceInspector::new(runner, &inspector_config(500));

    let status = inspector.inspect("gone.service").await;
    assert_eq!(status.status, ServiceState::Error);
    assert!(status.error.unwrap().contains("No such file or directory"));
}

#[tokio::test]
async fn empty_detail_output_uses_fallbacks() {
    let runner = FakeRunner::new();
    runner.stdout("is-active bare.service", "inactive\n");
    let inspector = ServiceInspector::new(runner, &inspector_config(500));

    let status = inspector.inspect("bare.service").await;
    assert!(!status.active);
    assert_eq!(status.status, ServiceState::Unknown);
    assert_eq!(status.last_active, "N/A");
    assert_eq!(status.memory_bytes, "0");
    assert_eq!(status.description, "bare.service");
}

#[tokio::test]
async fn inspect_all_keeps_order_and_isolates_failures() {
    let runner = FakeRunner::new();
    runner.service("a.service", "active", "A");
    runner.reply("is-active b.service", Reply::Hang);
    runner.service("c.service", "inactive", "C");
    let inspector = ServiceInspector::new(runner, &inspector_config(50));

    let names: Vec<String> = ["a.service", "b.service", "c.service"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let statuses = inspector.inspect_all(&names).await;
    let order: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(order, vec!["a.service", "b.service", "c.service"]);
    assert_eq!(statuses[0].status, ServiceState::Active);
    assert_eq!(statuses[1].status, ServiceState::Error);
    assert_eq!(statuses[2].status, ServiceState::Inactive);
}

#[tokio::test]
async fn log_reader_uses_default_line_count() {
    let runner = FakeRunner::new();
    runner.stdout(
        "-u quote.service -n 50 --no-pager",
        "Mar 04 08:15:00 host bot[1]: started\n",
    );
    let reader = LogReader::new(runner.clone(), &inspector_config(500));

    let logs = reader.recent_logs("quote.service", None).await;
    assert_eq!(logs, "Mar 04 08:15:00 host bot[1]: started\n");
    assert_eq!(
        runner.calls(),
        vec!["journalctl -u quote.service -n 50 --no-pager"]
    );
}

#[tokio::test]
async fn log_reader_honors_requested_lines() {
    let runner = FakeRunner::new();
    runner.stdout("-u quote.service -n 5 --no-pager", "five\n");
    let reader = LogReader::new(runner, &inspector_config(500));

    assert_eq!(reader.recent_logs("quote.service", Some(5)).await, "five\n");
}

#[tokio::test]
async fn log_reader_failures_become_placeholder_text() {
    let runner = FakeRunner::new();
    runner.reply("-u hang.service -n 50 --no-pager", Reply::Hang);
    runner.reply(
        "-u bad.service -n 50 --no-pager",
        Reply::Output(CommandOutput {
            success: false,
            stdout: String::new(),
            stderr: "Failed to add filter".into(),
        }),
    );
    let reader = LogReader::new(runner, &inspector_config(50));

    let timed_out = reader.recent_logs("hang.service", None).await;
    assert!(timed_out.starts_with("Unable to fetch logs:"));
    assert!(timed_out.contains("timed out"));

    let failed = reader.recent_logs("bad.service", None).await;
    assert!(failed.starts_with("Unable to fetch logs:"));
    assert!(failed.contains("Failed to add filter"));
}

#[cfg(unix)]
#[tokio::test]
async fn system_runner_captures_stdout_and_is_bounded() {
    let runner = SystemCommandRunner;
    let out = run_bounded(&runner, "echo", &["hello"], Duration::from_secs(5))
        .await
        .unwrap();
    assert!(out.success);
    assert_eq!(out.stdout, "hello\n");

    let started = Instant::now();
    let err = run_bounded(&runner, "sleep", &["5"], Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::TimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));

    let err = run_bounded(
        &runner,
        "/nonexistent/hostpulse-test-binary",
        &[],
        Duration::from_secs(1),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CommandError::Spawn { .. }));
}
