//! Thin wrappers over sched_getaffinity/sched_setaffinity.

use crate::error::OsError;
use crate::mask::CpuMask;
use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;
use std::collections::BTreeSet;
use std::io;

/// Restricts task `id` (pid or tid) to the CPUs in `mask`.
pub fn set_affinity(id: u32, mask: &CpuMask) -> Result<(), OsError> {
    let mut set = CpuSet::new();
    for cpu in mask.iter() {
        set.set(cpu).map_err(|e| OsError::Io {
            target: id,
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("CPU {} does not fit in a cpu_set_t: {}", cpu, e),
            ),
        })?;
    }
    sched_setaffinity(Pid::from_raw(id as i32), &set)
        .map_err(|e| OsError::from_io(id, io::Error::from(e)))
}

/// Returns the CPUs task `id` may run on; `0` means the calling thread.
pub fn get_affinity(id: u32) -> Result<BTreeSet<usize>, OsError> {
    let set = sched_getaffinity(Pid::from_raw(id as i32))
        .map_err(|e| OsError::from_io(id, io::Error::from(e)))?;
    Ok((0..CpuSet::count())
        .filter(|&cpu| set.is_set(cpu).unwrap_or(false))
        .collect())
}
