//! Host inventory: CPU counts and memory status from the kernel.
//!
//! The logical CPU count is the size of the calling thread's affinity set,
//! which is the number the pin file masks are validated against.

use crate::process::get_affinity;
use crate::process::memory::parse_kb_value;
use ahash::AHashSet as HashSet;
use std::fs;

/// Memory status from /proc/meminfo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedMemoryInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub cached_bytes: u64,
    pub buffers_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_free_bytes: u64,
}

impl ExtendedMemoryInfo {
    /// Percentage of memory in use, as `free` would compute it.
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        used as f64 * 100.0 / self.total_bytes as f64
    }
}

/// Number of CPUs this process may be scheduled on.
pub fn logical_cpu_count() -> Result<usize, String> {
    get_affinity(0)
        .map(|cpus| cpus.len())
        .map_err(|e| format!("Failed to read own CPU affinity: {}", e))
}

/// Number of physical cores, counted as distinct (physical id, core id) pairs
/// in /proc/cpuinfo.
pub fn physical_cpu_count() -> Result<usize, String> {
    let content = fs::read_to_string("/proc/cpuinfo")
        .map_err(|e| format!("Failed to read /proc/cpuinfo: {}", e))?;
    parse_physical_cores(&content)
        .ok_or_else(|| "No core topology found in /proc/cpuinfo".to_string())
}

/// Counts distinct cores in cpuinfo content; `None` when the kernel does not
/// publish topology fields.
pub fn parse_physical_cores(content: &str) -> Option<usize> {
    let mut cores = HashSet::new();
    let mut physical_id: Option<&str> = None;
    let mut core_id: Option<&str> = None;

    // blank line ends a processor block
    for line in content.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if let Some(core) = core_id.take() {
                cores.insert((physical_id.take().unwrap_or("0"), core));
            }
            physical_id = None;
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "physical id" => physical_id = Some(value.trim()),
            "core id" => core_id = Some(value.trim()),
            _ => {}
        }
    }

    if cores.is_empty() {
        None
    } else {
        Some(cores.len())
    }
}

/// Reads extended memory information from /proc/meminfo.
pub fn read_extended_memory_info() -> Result<ExtendedMemoryInfo, String> {
    let content = fs::read_to_string("/proc/meminfo")
        .map_err(|e| format!("Failed to read /proc/meminfo: {}", e))?;
    parse_meminfo(&content)
}

pub fn parse_meminfo(content: &str) -> Result<ExtendedMemoryInfo, String> {
    let mut total_bytes: Option<u64> = None;
    let mut available_bytes: Option<u64> = None;
    let mut cached_bytes: Option<u64> = None;
    let mut buffers_bytes: Option<u64> = None;
    let mut swap_total_bytes: Option<u64> = None;
    let mut swap_free_bytes: Option<u64> = None;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let slot = match key {
            "MemTotal" => &mut total_bytes,
            "MemAvailable" => &mut available_bytes,
            "Cached" => &mut cached_bytes,
            "Buffers" => &mut buffers_bytes,
            "SwapTotal" => &mut swap_total_bytes,
            "SwapFree" => &mut swap_free_bytes,
            _ => continue,
        };
        if let Some(kb) = parse_kb_value(value) {
            *slot = Some(kb * 1024);
        }
    }

    match (
        total_bytes,
        available_bytes,
        cached_bytes,
        buffers_bytes,
        swap_total_bytes,
        swap_free_bytes,
    ) {
        (
            Some(total),
            Some(available),
            Some(cached),
            Some(buffers),
            Some(swap_total),
            Some(swap_free),
        ) => Ok(ExtendedMemoryInfo {
            total_bytes: total,
            available_bytes: available,
            cached_bytes: cached,
            buffers_bytes: buffers,
            swap_total_bytes: swap_total,
            swap_free_bytes: swap_free,
        }),
        _ => Err("Failed to parse required fields from /proc/meminfo".to_string()),
    }
}
