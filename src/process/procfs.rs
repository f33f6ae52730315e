//! /proc-backed [`ProcessTable`].

use super::memory::{read_memory_info, MemoryInfo};
use super::scanner::{
    collect_proc_entries, count_inet_connections, process_name, read_cmdline, read_comm, read_ppid,
    read_task_ids,
};
use super::{affinity, ProcessInfo, ProcessTable, ThreadInfo};
use crate::error::OsError;
use crate::mask::CpuMask;
use ahash::AHashMap as HashMap;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default mount point of procfs.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Extra per-process facts printed for each matched process.
#[derive(Debug, Clone, Default)]
pub struct ProcessDetails {
    pub memory: Option<MemoryInfo>,
    pub connection_count: Option<usize>,
    pub children_count: usize,
    pub thread_count: usize,
}

/// Reads processes from a procfs mount and mutates affinity via syscalls.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn proc_path(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn read_process(&self, pid: u32, proc_path: &Path) -> io::Result<ProcessInfo> {
        let comm = read_comm(proc_path)?;
        let cmdline = read_cmdline(proc_path)?;
        Ok(ProcessInfo {
            pid,
            name: process_name(&comm, &cmdline),
            cmdline,
        })
    }

    /// Memory, connection, children and thread counts for a report.
    ///
    /// Memory and connections are best effort (they may need privileges the
    /// affinity change itself does not).
    pub fn details(&self, pid: u32) -> Result<ProcessDetails, OsError> {
        let proc_path = self.proc_path(pid);
        let memory = read_memory_info(&proc_path)
            .map_err(|e| debug!("No memory info for pid {}: {}", pid, e))
            .ok();
        let connection_count = count_inet_connections(&proc_path)
            .map_err(|e| debug!("No connection count for pid {}: {}", pid, e))
            .ok();
        Ok(ProcessDetails {
            memory,
            connection_count,
            children_count: self.children(pid)?.len(),
            thread_count: self.threads(pid)?.len(),
        })
    }
}

impl ProcessTable for ProcFs {
    fn processes(&self) -> Result<Vec<ProcessInfo>, OsError> {
        let entries = collect_proc_entries(&self.root).map_err(|e| OsError::Io {
            target: 0,
            source: e,
        })?;

        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.read_process(entry.pid, &entry.proc_path) {
                Ok(info) => out.push(info),
                Err(e) => match OsError::from_io(entry.pid, e) {
                    // exited while scanning
                    OsError::Vanished(_) => continue,
                    OsError::Io { source, .. } => {
                        debug!("Skipping pid {}: {}", entry.pid, source);
                    }
                },
            }
        }
        Ok(out)
    }

    fn children(&self, pid: u32) -> Result<Vec<u32>, OsError> {
        if !self.proc_path(pid).exists() {
            return Err(OsError::Vanished(pid));
        }
        let entries = collect_proc_entries(&self.root).map_err(|e| OsError::Io {
            target: pid,
            source: e,
        })?;

        let mut by_parent: HashMap<u32, Vec<u32>> = HashMap::new();
        for entry in &entries {
            if let Ok(ppid) = read_ppid(&entry.proc_path) {
                by_parent.entry(ppid).or_default().push(entry.pid);
            }
        }

        let mut out = Vec::new();
        let mut queue = VecDeque::from([pid]);
        while let Some(current) = queue.pop_front() {
            if let Some(kids) = by_parent.get(&current) {
                for &kid in kids {
                    // pid reuse could otherwise loop forever
                    if kid != pid && !out.contains(&kid) {
                        out.push(kid);
                        queue.push_back(kid);
                    }
                }
            }
        }
        Ok(out)
    }

    fn threads(&self, pid: u32) -> Result<Vec<ThreadInfo>, OsError> {
        let proc_path = self.proc_path(pid);
        let tids = read_task_ids(&proc_path).map_err(|e| OsError::from_io(pid, e))?;

        let mut out = Vec::with_capacity(tids.len());
        for tid in tids {
            let task_path = proc_path.join("task").join(tid.to_string());
            match read_comm(&task_path) {
                Ok(name) => out.push(ThreadInfo { tid, name }),
                Err(e) => match OsError::from_io(tid, e) {
                    OsError::Vanished(_) => debug!("Thread {} of pid {} exited", tid, pid),
                    err => return Err(err),
                },
            }
        }
        Ok(out)
    }

    fn set_affinity(&self, id: u32, mask: &CpuMask) -> Result<(), OsError> {
        affinity::set_affinity(id, mask)
    }
}
