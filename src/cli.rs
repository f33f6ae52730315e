//! CLI arguments for readout-affinity.
//!
//! This module defines the command-line interface structure using the clap library.

use clap::{Parser, ValueEnum};
use readout_affinity::AmbiguityPolicy;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Behaviour when a thread name matches several thread rules
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AmbiguousThreads {
    /// Stop the run with an error
    Abort,
    /// Leave the thread untouched and continue
    Skip,
}

impl From<AmbiguousThreads> for AmbiguityPolicy {
    fn from(value: AmbiguousThreads) -> Self {
        match value {
            AmbiguousThreads::Abort => AmbiguityPolicy::Abort,
            AmbiguousThreads::Skip => AmbiguityPolicy::SkipThread,
        }
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "readout-affinity",
    about = "Alters CPU masks of running processes with different arguments, based on a configuration file.",
    long_about = "Alters CPU masks of running processes with different arguments, based on a configuration file.\n\n\
                  The pin file maps executable names to command line fragments. Each fragment may carry a \
                  'parent' mask, applied to every child process and thread of the matched process, and a \
                  'threads' map from full-match thread name patterns to masks that override the parent mask.",
    version,
    propagate_version = true
)]
pub struct Args {
    /// File with process to CPU mask list (JSON, YAML or TOML)
    #[arg(short = 'p', long)]
    pub pinfile: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Compile the pin file, print the rules and exit without touching any process
    #[arg(long)]
    pub check_config: bool,

    /// What to do when a thread matches more than one thread rule
    #[arg(long, value_enum, default_value = "abort")]
    pub ambiguous_threads: AmbiguousThreads,

    /// Exit 1 on fatal errors and 2 when warnings were emitted (default: always 0)
    #[arg(long)]
    pub strict_exit_codes: bool,
}
