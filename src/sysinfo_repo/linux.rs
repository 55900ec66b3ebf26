// Linux-specific fallbacks: /proc/cpuinfo, /proc/stat.

/// First "cpu MHz" from /proc/cpuinfo. Used when sysinfo reports 0 (common inside VMs).
pub(super) fn read_cpu_mhz_linux() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        parse_cpu_mhz(&content)
    }
    #[cfg(not(target_os = "linux"))]
    None
}

/// "btime" (boot time, seconds since epoch) from /proc/stat.
pub(super) fn read_boot_time_linux() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/stat").ok()?;
        parse_btime(&content)
    }
    #[cfg(not(target_os = "linux"))]
    None
}

fn parse_cpu_mhz(cpuinfo: &str) -> Option<f64> {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("cpu MHz"))
        .find_map(|line| {
            let (_, value) = line.split_once(':')?;
            value.trim().parse::<f64>().ok().filter(|mhz| *mhz > 0.0)
        })
}

fn parse_btime(stat: &str) -> Option<u64> {
    stat.lines()
        .find_map(|line| line.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
        .filter(|t| *t > 0)
}
