//! Resource status probe backing the admission gate.

/// Thresholds for resource-aware admission.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    /// Maximum memory utilization percent before new tasks are deferred.
    pub max_memory_percent: f64,
}

/// Current system resource usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceStatus {
    /// None when the platform offers no reliable reading; admission then
    /// passes unconditionally.
    pub memory_usage_percent: Option<f64>,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
}

/// Read current memory utilization.
pub fn resource_status() -> ResourceStatus {
    match system_memory() {
        Some((total, available)) if total > 0 => {
            let used = total.saturating_sub(available);
            ResourceStatus {
                memory_usage_percent: Some(used as f64 / total as f64 * 100.0),
                memory_used_mb: used / (1024 * 1024),
                memory_total_mb: total / (1024 * 1024),
            }
        }
        _ => ResourceStatus::default(),
    }
}

/// Admission check. `Err(reason)` means the task should be deferred.
pub fn check_available(limits: &ResourceLimits) -> Result<(), String> {
    check_status(&resource_status(), limits)
}

fn check_status(status: &ResourceStatus, limits: &ResourceLimits) -> Result<(), String> {
    if let Some(percent) = status.memory_usage_percent {
        if percent > limits.max_memory_percent {
            return Err(format!("memory usage too high: {percent:.1}%"));
        }
    }
    Ok(())
}

/// Total and available system memory in bytes, when the platform exposes it.
fn system_memory() -> Option<(u64, u64)> {
    #[cfg(target_os = "linux")]
    {
        let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_meminfo(&contents)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Parse /proc/meminfo. `MemAvailable` is preferred; older kernels fall back
/// to MemFree + Buffers + Cached.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo(contents: &str) -> Option<(u64, u64)> {
    let mut mem_total = 0u64;
    let mut mem_available = 0u64;
    let mut mem_free = 0u64;
    let mut buffers = 0u64;
    let mut cached = 0u64;

    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let Some(label) = fields.next() else { continue };
        let Some(value) = fields.next().and_then(|v| v.parse::<u64>().ok()) else {
            continue;
        };
        let bytes = value * 1024; // meminfo reports kB

        match label {
            "MemTotal:" => mem_total = bytes,
            "MemAvailable:" => mem_available = bytes,
            "MemFree:" => mem_free = bytes,
            "Buffers:" => buffers = bytes,
            "Cached:" => cached = bytes,
            _ => {}
        }
    }

    if mem_total == 0 {
        return None;
    }
    let available = if mem_available > 0 {
        mem_available
    } else {
        mem_free + buffers + cached
    };
    Some((mem_total, available))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       16384000 kB
MemFree:         2048000 kB
MemAvailable:    8192000 kB
Buffers:          512000 kB
Cached:          4096000 kB
SwapTotal:       8388604 kB
";

    #[test]
    fn prefers_mem_available() {
        let (total, available) = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(total, 16_384_000 * 1024);
        assert_eq!(available, 8_192_000 * 1024);
    }

    #[test]
    fn falls_back_to_free_buffers_cached() {
        let older = "\
MemTotal:       16384000 kB
MemFree:         2048000 kB
Buffers:          512000 kB
Cached:          4096000 kB
";
        let (_, available) = parse_meminfo(older).unwrap();
        assert_eq!(available, (2_048_000 + 512_000 + 4_096_000) * 1024);
    }

    #[test]
    fn garbage_input_yields_none() {
        assert!(parse_meminfo("").is_none());
        assert!(parse_meminfo("not meminfo at all").is_none());
    }

    #[test]
    fn unknown_usage_always_admits() {
        let limits = ResourceLimits {
            max_memory_percent: 0.0,
        };
        let status = ResourceStatus::default();
        assert!(status.memory_usage_percent.is_none());
        assert!(check_status(&status, &limits).is_ok());
    }

    #[test]
    fn threshold_comparison() {
        let limits = ResourceLimits {
            max_memory_percent: 85.0,
        };
        let busy = ResourceStatus {
            memory_usage_percent: Some(91.25),
            ..Default::default()
        };
        let err = check_status(&busy, &limits).unwrap_err();
        assert_eq!(err, "memory usage too high: 91.2%");

        let idle = ResourceStatus {
            memory_usage_percent: Some(40.0),
            ..Default::default()
        };
        assert!(check_status(&idle, &limits).is_ok());
    }
}
