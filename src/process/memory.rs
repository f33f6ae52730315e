//! Memory readings for matched-process reports.
//!
//! Resident and virtual sizes come from `/proc/<pid>/statm`, which reports
//! pages; `parse_kb_value` is shared with the `/proc/meminfo` reader.

use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;

/// Get system page size in bytes (usually 4096).
fn get_page_size() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_PAGESIZE
        // Returns -1 on error - handled by the > 0 check
        unsafe {
            let size = libc::sysconf(libc::_SC_PAGESIZE);
            if size > 0 {
                return size as u64;
            }
        }
    }
    4096
}

/// System page size in bytes.
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Resident and virtual memory of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryInfo {
    pub rss_bytes: u64,
    pub vms_bytes: u64,
}

impl MemoryInfo {
    pub fn rss_mb(&self) -> f64 {
        self.rss_bytes as f64 / 1024.0 / 1024.0
    }

    pub fn vms_mb(&self) -> f64 {
        self.vms_bytes as f64 / 1024.0 / 1024.0
    }
}

/// Reads RSS/VMS from /proc/<pid>/statm.
pub fn read_memory_info(proc_path: &Path) -> Result<MemoryInfo, std::io::Error> {
    let content = fs::read_to_string(proc_path.join("statm"))?;
    parse_statm(&content, *PAGE_SIZE)
        .ok_or_else(|| std::io::Error::other("Invalid statm format"))
}

/// Parses `size resident ...` page counts from statm content.
pub fn parse_statm(content: &str, page_size: u64) -> Option<MemoryInfo> {
    let mut parts = content.split_whitespace();
    let size: u64 = parts.next()?.parse().ok()?;
    let resident: u64 = parts.next()?.parse().ok()?;
    Some(MemoryInfo {
        rss_bytes: resident * page_size,
        vms_bytes: size * page_size,
    })
}

/// Parses kilobyte values from `Key:   1234 kB` lines.
pub fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}
