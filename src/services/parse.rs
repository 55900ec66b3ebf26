// `systemctl show` output: one key=value per line.

use crate::models::{ServiceState, ServiceStatus};
use std::collections::HashMap;

/// Splits each line at the first '='. Lines without '=' are skipped.
pub fn parse_properties(output: &str) -> HashMap<&str, &str> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .collect()
}

/// "Thu 2024-01-04 10:00:00 UTC" -> "2024-01-04 10:00:00". Empty or missing -> "N/A".
pub fn format_last_active(raw: Option<&str>) -> String {
    let formatted = raw
        .map(|v| v.split_whitespace().skip(1).take(2).collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    if formatted.is_empty() {
        "N/A".into()
    } else {
        formatted
    }
}

/// `MemoryCurrent` as a decimal string. "[not set]" and u64::MAX (no accounting) -> "0".
pub fn format_memory(raw: Option<&str>) -> String {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|bytes| *bytes != u64::MAX)
        .map(|bytes| bytes.to_string())
        .unwrap_or_else(|| "0".into())
}

pub fn service_status(name: &str, active: bool, props: &HashMap<&str, &str>) -> ServiceStatus {
    let status = props
        .get("ActiveState")
        .map(|s| ServiceState::from_active_state(s))
        .unwrap_or(ServiceState::Unknown);
    let description = props
        .get("Description")
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .unwrap_or(name);
    ServiceStatus {
        name: name.to_string(),
        active,
        status,
        last_active: format_last_active(props.get("ActiveEnterTimestamp").copied()),
        memory_bytes: format_memory(props.get("MemoryCurrent").copied()),
        description: description.to_string(),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW_OUTPUT: &str = "Type=simple\nDescription=Quote bot\nActiveState=active\nActiveEnterTimestamp=Thu 2024-01-04 10:00:00 UTC\nMemoryCurrent=18284544\nExecStart={ path=/usr/bin/bot ; argv[]=/usr/bin/bot --x=1 }\n";

    #[test]
    fn parses_known_keys_and_keeps_value_after_first_equals() {
        let props = parse_properties(SHOW_OUTPUT);
        assert_eq!(props.get("Description"), Some(&"Quote bot"));
        assert_eq!(
            props.get("ExecStart"),
            Some(&"{ path=/usr/bin/bot ; argv[]=/usr/bin/bot --x=1 }")
        );
    }

    #[test]
    fn builds_status_from_show_output() {
        let props = parse_properties(SHOW_OUTPUT);
        let status = service_status("quote.service", true, &props);
        assert_eq!(status.status, ServiceState::Active);
        assert_eq!(status.last_active, "2024-01-04 10:00:00");
        assert_eq!(status.memory_bytes, "18284544");
        assert_eq!(status.description, "Quote bot");
        assert!(status.error.is_none());
    }

    #[test]
    fn missing_keys_fall_back() {
        let props = parse_properties("garbage line\nFoo=bar\n");
        let status = service_status("x.service", false, &props);
        assert_eq!(status.status, ServiceState::Unknown);
        assert_eq!(status.last_active, "N/A");
        assert_eq!(status.memory_bytes, "0");
        assert_eq!(status.description, "x.service");
    }

    #[test]
    fn unset_memory_and_empty_timestamp() {
        assert_eq!(format_memory(Some("[not set]")), "0");
        assert_eq!(format_memory(Some("18446744073709551615")), "0");
        assert_eq!(format_last_active(Some("")), "N/A");
        assert_eq!(format_last_active(None), "N/A");
    }
}
