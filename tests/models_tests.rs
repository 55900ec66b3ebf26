// Model serialization tests (JSON camelCase, omitted fields, event envelope)

use hostpulse::models::*;

fn sample_file(content: Option<&str>, unchanged: bool) -> MonitoredFile {
    MonitoredFile {
        name: "App log".into(),
        path: "/var/log/app.log".into(),
        expand: true,
        exists: true,
        size: Some(12),
        modified: Some(1_700_000_000.5),
        content: content.map(str::to_string),
        unchanged,
        error: None,
    }
}

#[test]
fn test_metrics_snapshot_serialization_camel_case() {
    let snapshot = MetricsSnapshot {
        cpu: CpuMetrics {
            percent: 12.5,
            logical_core_count: 8,
            frequency_mhz: 2400.0,
        },
        memory: MemoryMetrics {
            total: 1024,
            used: 512,
            percent: 50.0,
            available: 512,
        },
        ..MetricsSnapshot::default()
    };
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"logicalCoreCount\":8"));
    assert!(json.contains("\"frequencyMhz\""));
    assert!(json.contains("\"uptimeSeconds\""));
    assert!(json.contains("\"bytesRecv\""));
    let back: MetricsSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snapshot);
}

#[test]
fn test_percent_of_is_clamped_and_zero_safe() {
    assert_eq!(percent_of(50, 100), 50.0);
    assert_eq!(percent_of(5, 0), 0.0);
    assert_eq!(percent_of(200, 100), 100.0);
}

#[test]
fn test_network_max_never_goes_backwards() {
    let earlier = NetworkMetrics {
        bytes_sent: 100,
        bytes_recv: 200,
        packets_sent: 3,
        packets_recv: 4,
    };
    let later = NetworkMetrics {
        bytes_sent: 90,
        bytes_recv: 250,
        packets_sent: 3,
        packets_recv: 1,
    };
    let merged = earlier.max(later);
    assert_eq!(merged.bytes_sent, 100);
    assert_eq!(merged.bytes_recv, 250);
    assert_eq!(merged.packets_recv, 4);
}

#[test]
fn test_unchanged_file_omits_content_key() {
    let json = serde_json::to_value(sample_file(None, true)).unwrap();
    assert_eq!(json["unchanged"], true);
    assert!(json.get("content").is_none());
    assert!(json.get("error").is_none());
}

#[test]
fn test_changed_file_carries_full_content() {
    let json = serde_json::to_value(sample_file(Some("a\nb\n"), false)).unwrap();
    assert_eq!(json["content"], "a\nb\n");
    assert_eq!(json["unchanged"], false);
    assert_eq!(json["size"], 12);
}

#[test]
fn test_service_state_lowercase_and_error_constructor() {
    let status = ServiceStatus::error("x.service", "systemctl timed out after 2000ms");
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["active"], false);
    assert_eq!(json["lastActive"], "N/A");
    assert_eq!(json["memoryBytes"], "0");
    assert_eq!(json["error"], "systemctl timed out after 2000ms");
}

#[test]
fn test_service_state_mapping() {
    assert_eq!(ServiceState::from_active_state("active"), ServiceState::Active);
    assert_eq!(ServiceState::from_active_state("reloading"), ServiceState::Active);
    assert_eq!(ServiceState::from_active_state("inactive"), ServiceState::Inactive);
    assert_eq!(ServiceState::from_active_state("failed"), ServiceState::Failed);
    assert_eq!(ServiceState::from_active_state("activating"), ServiceState::Unknown);
    assert_eq!(ServiceState::from_active_state(""), ServiceState::Unknown);
}

#[test]
fn test_event_envelope() {
    let event = Event::ProjectsUpdate(ProjectsSnapshot {
        services: vec![],
        files: vec![sample_file(None, true)],
    });
    assert_eq!(event.name(), PROJECTS_UPDATE);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "projects_update");
    assert_eq!(json["data"]["files"][0]["unchanged"], true);

    let stats = serde_json::to_value(Event::StatsUpdate(MetricsSnapshot::default())).unwrap();
    assert_eq!(stats["event"], STATS_UPDATE);
    assert!(stats["data"]["cpu"].is_object());
}
