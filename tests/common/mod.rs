//! In-memory process table shared by the integration tests.

#![allow(dead_code)]

use readout_affinity::{CpuMask, OsError, ProcessInfo, ProcessTable, ThreadInfo};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;

#[derive(Default)]
pub struct FakeTable {
    processes: Vec<ProcessInfo>,
    children: HashMap<u32, Vec<u32>>,
    threads: HashMap<u32, Vec<ThreadInfo>>,
    /// Tasks that exit right before their affinity is set.
    vanished: HashSet<u32>,
    /// Tasks whose affinity cannot be changed (EPERM).
    denied: HashSet<u32>,
    affinity: RefCell<HashMap<u32, Vec<usize>>>,
    set_calls: RefCell<Vec<u32>>,
}

impl FakeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a process with exactly the given threads. As in /proc/<pid>/task,
    /// the main thread has `tid == pid`; tables that model it must list it.
    pub fn process(mut self, pid: u32, name: &str, argv: &[&str], threads: &[(u32, &str)]) -> Self {
        self.processes.push(ProcessInfo {
            pid,
            name: name.to_string(),
            cmdline: argv.iter().map(|s| s.to_string()).collect(),
        });
        self.threads.insert(
            pid,
            threads
                .iter()
                .map(|(tid, name)| ThreadInfo {
                    tid: *tid,
                    name: name.to_string(),
                })
                .collect(),
        );
        self
    }

    pub fn children_of(mut self, pid: u32, kids: &[u32]) -> Self {
        self.children.insert(pid, kids.to_vec());
        self
    }

    pub fn vanish(mut self, id: u32) -> Self {
        self.vanished.insert(id);
        self
    }

    pub fn deny(mut self, id: u32) -> Self {
        self.denied.insert(id);
        self
    }

    /// Pre-existing affinity of a task.
    pub fn with_affinity(self, id: u32, cpus: &[usize]) -> Self {
        self.affinity.borrow_mut().insert(id, cpus.to_vec());
        self
    }

    pub fn affinity_of(&self, id: u32) -> Option<Vec<usize>> {
        self.affinity.borrow().get(&id).cloned()
    }

    pub fn set_calls(&self) -> Vec<u32> {
        self.set_calls.borrow().clone()
    }

    pub fn process_info(&self, pid: u32) -> ProcessInfo {
        self.processes
            .iter()
            .find(|p| p.pid == pid)
            .cloned()
            .expect("unknown pid in test table")
    }
}

impl ProcessTable for FakeTable {
    fn processes(&self) -> Result<Vec<ProcessInfo>, OsError> {
        Ok(self.processes.clone())
    }

    fn children(&self, pid: u32) -> Result<Vec<u32>, OsError> {
        Ok(self.children.get(&pid).cloned().unwrap_or_default())
    }

    fn threads(&self, pid: u32) -> Result<Vec<ThreadInfo>, OsError> {
        self.threads
            .get(&pid)
            .cloned()
            .ok_or(OsError::Vanished(pid))
    }

    fn set_affinity(&self, id: u32, mask: &CpuMask) -> Result<(), OsError> {
        self.set_calls.borrow_mut().push(id);
        if self.vanished.contains(&id) {
            return Err(OsError::Vanished(id));
        }
        if self.denied.contains(&id) {
            return Err(OsError::from_io(
                id,
                io::Error::from(io::ErrorKind::PermissionDenied),
            ));
        }
        self.affinity.borrow_mut().insert(id, mask.to_vec());
        Ok(())
    }
}

/// Sorted CPU list helper.
pub fn cpus(ids: &[usize]) -> Option<Vec<usize>> {
    Some(ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect())
}
