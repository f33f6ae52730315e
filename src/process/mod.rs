//! Process table access: enumeration, thread listing and affinity mutation.
//!
//! This module provides:
//! - `ProcessTable`: the seam between the rule engine and the OS
//! - `scanner`: /proc parsing (names, command lines, parents, threads)
//! - `memory`: resident/virtual size from /proc/<pid>/statm
//! - `affinity`: sched_getaffinity/sched_setaffinity wrappers
//! - `procfs`: the /proc-backed `ProcessTable`

pub mod affinity;
pub mod memory;
pub mod procfs;
pub mod scanner;

use crate::error::OsError;
use crate::mask::CpuMask;

// Re-export commonly used types
pub use affinity::{get_affinity, set_affinity};
pub use memory::{read_memory_info, MemoryInfo, PAGE_SIZE};
pub use procfs::{ProcFs, ProcessDetails};

/// Snapshot of a live process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Executable name as the kernel reports it (`comm`, widened from the
    /// command line when truncated).
    pub name: String,
    pub cmdline: Vec<String>,
}

impl ProcessInfo {
    /// Arguments joined with single spaces, the string fragments are matched against.
    pub fn joined_cmdline(&self) -> String {
        self.cmdline.join(" ")
    }
}

/// Snapshot of one thread of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub tid: u32,
    pub name: String,
}

/// Source of process/thread snapshots and sink for affinity changes.
///
/// Every call may observe a different state of the system. Implementations
/// report targets that exited in the meantime as [`OsError::Vanished`].
pub trait ProcessTable {
    /// All processes currently visible.
    fn processes(&self) -> Result<Vec<ProcessInfo>, OsError>;

    /// Descendants of `pid`, recursively.
    fn children(&self, pid: u32) -> Result<Vec<u32>, OsError>;

    /// Threads of `pid`, including its main thread.
    fn threads(&self, pid: u32) -> Result<Vec<ThreadInfo>, OsError>;

    /// Restricts task `id` (a pid or tid) to `mask`.
    fn set_affinity(&self, id: u32, mask: &CpuMask) -> Result<(), OsError>;
}
