//! One pass over the process table: match, then apply.

use crate::applicator::{apply, AmbiguityPolicy, Outcome};
use crate::error::Result;
use crate::matcher::{match_processes, Match};
use crate::process::ProcessTable;
use crate::rules::RuleSet;
use tracing::{debug, info};

/// Run-wide parameters.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// CPU ids above this count are rejected with a warning.
    pub logical_cpu_count: usize,
    pub ambiguity: AmbiguityPolicy,
}

/// What happened to one matched (process, fragment) pair.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub pid: u32,
    pub name: String,
    pub fragment: String,
    pub outcomes: Vec<Outcome>,
}

/// Summary of a whole pass.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub processes_scanned: usize,
    pub matches: Vec<MatchReport>,
}

impl RunReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.matches.iter().flat_map(|m| m.outcomes.iter())
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o, Outcome::Applied { .. }))
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.outcomes().filter(|o| o.is_warning()).count()
    }

    pub fn vanished_count(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o, Outcome::Vanished { .. }))
            .count()
    }
}

/// Matches the live process table against `rules` and applies every match
/// in order. `on_match` is called before each match is applied.
///
/// Masks applied before an error are kept; there is no rollback.
pub fn run<T, F>(rules: &RuleSet, table: &T, options: RunOptions, mut on_match: F) -> Result<RunReport>
where
    T: ProcessTable + ?Sized,
    F: FnMut(&Match<'_>),
{
    let processes = table.processes()?;
    info!(
        "Scanning {} processes for {:?}",
        processes.len(),
        rules.process_names()
    );

    let matches = match_processes(rules, &processes);
    debug!("{} process/fragment matches", matches.len());

    let mut report = RunReport {
        processes_scanned: processes.len(),
        matches: Vec::with_capacity(matches.len()),
    };

    for m in &matches {
        on_match(m);
        let outcomes = apply(
            table,
            m.process,
            m.rule,
            options.logical_cpu_count,
            options.ambiguity,
        )?;
        report.matches.push(MatchReport {
            pid: m.process.pid,
            name: m.process.name.clone(),
            fragment: m.fragment.to_string(),
            outcomes,
        });
    }

    Ok(report)
}
