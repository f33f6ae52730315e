//! readout-affinity library
//!
//! Re-pins already running processes and their threads to CPU sets described
//! by a pin file. The pin file maps executable names to command line fragments,
//! and each fragment to a parent mask (cascaded to children and threads) and a
//! set of full-match thread name patterns with their own masks.
//!
//! # Usage
//!
//! ```no_run
//! use readout_affinity::{compile, engine, AmbiguityPolicy, ProcFs, RunOptions};
//!
//! let raw = serde_json::json!({
//!     "readout": {
//!         "--session prod": {
//!             "parent": "0-7",
//!             "threads": { "consumer-.*": "8-11" }
//!         }
//!     }
//! });
//! let rules = compile(&raw)?;
//! let options = RunOptions {
//!     logical_cpu_count: readout_affinity::system::logical_cpu_count()?,
//!     ambiguity: AmbiguityPolicy::Abort,
//! };
//! let report = engine::run(&rules, &ProcFs::default(), options, |_| {})?;
//! println!("{} masks applied", report.applied_count());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod applicator;
pub mod engine;
pub mod error;
pub mod mask;
pub mod matcher;
pub mod process;
pub mod rules;
pub mod system;

// Re-export main types for convenience
pub use applicator::{apply, AmbiguityPolicy, MaskSource, Outcome, Target};
pub use engine::{MatchReport, RunOptions, RunReport};
pub use error::{AffinityError, OsError};
pub use mask::{parse_mask, CpuMask, MaskSpec};
pub use matcher::{match_processes, Match};
pub use process::{ProcFs, ProcessInfo, ProcessTable, ThreadInfo};
pub use rules::{compile, CommandRule, CompileWarning, ProcessRule, RuleSet, ThreadRule};
