//! Process scanning utilities for reading process and thread entries from /proc.
//!
//! All readers take the proc root explicitly so they can run against a
//! directory tree that mimics /proc.

use ahash::AHashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Kernel limit on `comm` length (TASK_COMM_LEN - 1).
const COMM_MAX_LEN: usize = 15;

/// Process entry representing a directory in /proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcEntry {
    pub pid: u32,
    pub proc_path: PathBuf,
}

/// Scans a /proc-like directory for entries with numeric names.
pub fn collect_proc_entries(root: &Path) -> io::Result<Vec<ProcEntry>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)?.flatten() {
        let p = entry.path();
        let name = match p.file_name().and_then(|s| s.to_str()) {
            Some(v) => v,
            None => continue,
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let pid: u32 = match name.parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        out.push(ProcEntry { pid, proc_path: p });
    }
    out.sort_unstable_by_key(|e| e.pid);
    Ok(out)
}

/// Reads the NUL-separated argument vector of a process.
///
/// Kernel threads and zombies have an empty command line.
pub fn read_cmdline(proc_path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read(proc_path.join("cmdline"))?;
    Ok(split_cmdline(&content))
}

pub fn split_cmdline(content: &[u8]) -> Vec<String> {
    let trimmed = content.strip_suffix(&[0u8]).unwrap_or(content);
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .split(|&b| b == 0u8)
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

/// Reads a task name from its `comm` file.
pub fn read_comm(task_path: &Path) -> io::Result<String> {
    let s = fs::read_to_string(task_path.join("comm"))?;
    Ok(s.trim_end_matches('\n').to_string())
}

/// Resolves the executable name of a process.
///
/// `comm` is truncated to 15 bytes by the kernel; when that happens and the
/// first argument's file name extends it, the longer name is used.
pub fn process_name(comm: &str, cmdline: &[String]) -> String {
    if comm.len() >= COMM_MAX_LEN {
        if let Some(base) = cmdline
            .first()
            .and_then(|arg0| Path::new(arg0).file_name())
            .and_then(|n| n.to_str())
        {
            if base.starts_with(comm) {
                return base.to_string();
            }
        }
    }
    comm.to_string()
}

/// Reads the parent pid from /proc/<pid>/stat.
pub fn read_ppid(proc_path: &Path) -> io::Result<u32> {
    let content = fs::read_to_string(proc_path.join("stat"))?;
    parse_stat_ppid(&content).ok_or_else(|| io::Error::other("Invalid stat format"))
}

/// Extracts the ppid (field 4) from stat content.
///
/// The command name in field 2 may contain spaces and parentheses, so parsing
/// starts after the last ')'.
pub fn parse_stat_ppid(content: &str) -> Option<u32> {
    let rest = &content[content.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let _state = fields.next()?;
    fields.next()?.parse().ok()
}

/// Lists the task ids of a process from /proc/<pid>/task.
pub fn read_task_ids(proc_path: &Path) -> io::Result<Vec<u32>> {
    let mut tids: Vec<u32> = fs::read_dir(proc_path.join("task"))?
        .flatten()
        .filter_map(|e| e.file_name().to_str().and_then(|s| s.parse().ok()))
        .collect();
    tids.sort_unstable();
    Ok(tids)
}

/// Socket tables whose entries count as network connections (TCP and UDP,
/// IPv4 and IPv6). Unix domain sockets are not connections.
const INET_TABLES: [&str; 4] = ["tcp", "tcp6", "udp", "udp6"];

/// Counts the inet connections a process holds open.
///
/// A `socket:[inode]` descriptor counts only if its inode appears in one of
/// the process's network namespace tables under `<proc_path>/net/`.
pub fn count_inet_connections(proc_path: &Path) -> io::Result<usize> {
    let mut inodes = AHashSet::new();
    for table in INET_TABLES {
        match fs::read_to_string(proc_path.join("net").join(table)) {
            Ok(content) => inodes.extend(parse_net_inodes(&content)),
            // no IPv6 support in this kernel
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        }
    }

    let mut count = 0;
    for entry in fs::read_dir(proc_path.join("fd"))?.flatten() {
        if let Ok(target) = fs::read_link(entry.path()) {
            if let Some(inode) = parse_socket_inode(&target.to_string_lossy()) {
                if inodes.contains(&inode) {
                    count += 1;
                }
            }
        }
    }
    Ok(count)
}

/// Socket inodes listed in a /proc/net/{tcp,udp}[6] table.
pub fn parse_net_inodes(content: &str) -> impl Iterator<Item = u64> + '_ {
    content
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(9)?.parse().ok())
        // orphaned entries (TIME_WAIT) have no owning socket
        .filter(|&inode| inode != 0)
}

/// Inode of an fd link target of the form `socket:[12345]`.
fn parse_socket_inode(target: &str) -> Option<u64> {
    target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}
