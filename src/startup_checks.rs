//! Startup requirement validation for readout-affinity.
//!
//! Changing the affinity of another user's tasks needs root or CAP_SYS_NICE,
//! and matching needs a readable /proc. Both are checked before the run so
//! that a permission problem shows up as one clear message instead of a
//! failure halfway through the process table.

use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Validate all runtime requirements
pub fn validate_requirements(proc_root: &Path) -> Result<(), ValidationError> {
    check_user_privileges();
    check_proc_access(proc_root)?;
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - only processes owned by this user can be re-pinned");
        warn!("   Recommendation: run as root or grant CAP_SYS_NICE");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

/// Check that the task list of init is readable
fn check_proc_access(proc_root: &Path) -> Result<(), ValidationError> {
    if !proc_root.exists() {
        return Err(ValidationError::ProcNotMounted(
            proc_root.display().to_string(),
        ));
    }

    let test_dir = proc_root.join("1").join("task");
    match fs::read_dir(&test_dir) {
        Ok(_) => {
            info!("✅ /proc access: can list threads of all processes");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ValidationError::InsufficientPermissions(format!(
                "{}: {}",
                test_dir.display(),
                e
            )))
        }
        Err(e) => {
            warn!("⚠️  Could not test /proc access: {}", e);
            Ok(())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("proc filesystem not mounted at {0}")]
    ProcNotMounted(String),
}
