//! Error types for pin file compilation and affinity application.
//!
//! Configuration errors (`MalformedMask`, `InvalidMaskType`, `EmptyMask`,
//! `InvalidPattern`, `InvalidConfig`) abort before any OS mutation happens.
//! `AmbiguousThreadMatch` and `Os` can occur mid-run; masks already applied to
//! other targets are not rolled back.

use std::io;

/// Failure of a single OS query or mutation.
#[derive(Debug, thiserror::Error)]
pub enum OsError {
    /// The process or thread exited between enumeration and use.
    #[error("target {0} no longer exists")]
    Vanished(u32),

    #[error("OS call on {target} failed: {source}")]
    Io {
        target: u32,
        #[source]
        source: io::Error,
    },
}

impl OsError {
    /// Classifies an I/O error on `target`: a missing `/proc` entry or
    /// `ESRCH` means the target is gone, anything else is a real failure.
    pub fn from_io(target: u32, err: io::Error) -> Self {
        let vanished = err.kind() == io::ErrorKind::NotFound
            || err.raw_os_error() == Some(libc::ESRCH);
        if vanished {
            OsError::Vanished(target)
        } else {
            OsError::Io {
                target,
                source: err,
            }
        }
    }

    pub fn is_vanished(&self) -> bool {
        matches!(self, OsError::Vanished(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AffinityError {
    #[error("corrupt CPU mask region '{token}' in mask '{spec}'")]
    MalformedMask { token: String, spec: String },

    #[error("CPU mask needs to be a string or a list, got: {0}")]
    InvalidMaskType(String),

    #[error("CPU mask '{0}' selects no CPUs")]
    EmptyMask(String),

    #[error("invalid thread name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid pin file: {0}")]
    InvalidConfig(String),

    #[error("thread '{thread}' (tid {tid}) matches multiple masks: {}", rules.join(", "))]
    AmbiguousThreadMatch {
        thread: String,
        tid: u32,
        rules: Vec<String>,
    },

    #[error(transparent)]
    Os(#[from] OsError),
}

pub type Result<T> = std::result::Result<T, AffinityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_vanished() {
        let err = OsError::from_io(42, io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_vanished());
    }

    #[test]
    fn test_esrch_is_vanished() {
        let err = OsError::from_io(42, io::Error::from_raw_os_error(libc::ESRCH));
        assert!(err.is_vanished());
    }

    #[test]
    fn test_permission_denied_propagates() {
        let err = OsError::from_io(42, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!err.is_vanished());
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_ambiguous_message_lists_rules() {
        let err = AffinityError::AmbiguousThreadMatch {
            thread: "io-1".into(),
            tid: 7,
            rules: vec!["io-.*".into(), "io-\\d".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("io-1"));
        assert!(msg.contains("io-.*, io-\\d"));
    }
}
