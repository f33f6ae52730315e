//! Matching live processes against the compiled rules.

use crate::process::ProcessInfo;
use crate::rules::{CommandRule, RuleSet};
use tracing::debug;

/// A live process paired with one command rule it satisfies.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub process: &'a ProcessInfo,
    pub fragment: &'a str,
    pub rule: &'a CommandRule,
}

/// Pairs every process with every command rule it matches.
///
/// A process is a candidate when its executable name is configured; it then
/// matches each fragment that occurs anywhere in its space-joined command
/// line. Results follow process order, then pin file fragment order, with one
/// entry per match and no deduplication.
pub fn match_processes<'a>(rules: &'a RuleSet, processes: &'a [ProcessInfo]) -> Vec<Match<'a>> {
    let mut out = Vec::new();
    for process in processes {
        let Some(process_rule) = rules.get(&process.name) else {
            continue;
        };
        let cmdline = process.joined_cmdline();
        debug!("Candidate pid {} ({}): {}", process.pid, process.name, cmdline);

        for (fragment, rule) in process_rule.iter() {
            if cmdline.contains(fragment) {
                out.push(Match {
                    process,
                    fragment,
                    rule,
                });
            }
        }
    }
    out
}
