//! Applying a command rule to one matched process.
//!
//! Two independent steps run in order:
//! 1. the parent mask cascades to every descendant process and to every
//!    thread of the matched process (never to the matched process's own
//!    process-level affinity);
//! 2. thread rules override the cascade for threads whose name fully matches
//!    exactly one pattern.
//!
//! A mask whose highest CPU id is above the logical CPU count is skipped with
//! a warning instead of failing the run.

use crate::error::{AffinityError, OsError, Result};
use crate::mask::CpuMask;
use crate::process::{ProcessInfo, ProcessTable, ThreadInfo};
use crate::rules::{CommandRule, ThreadRule};
use std::fmt;
use tracing::{debug, info, warn};

/// What to do when a thread name fully matches more than one thread rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Fail with [`AffinityError::AmbiguousThreadMatch`], halting the run.
    #[default]
    Abort,
    /// Leave that thread untouched and continue with the next one.
    SkipThread,
}

/// Task an affinity change was aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Process { pid: u32 },
    Child { pid: u32 },
    Thread { tid: u32, name: String },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Process { pid } => write!(f, "process {}", pid),
            Target::Child { pid } => write!(f, "child {}", pid),
            Target::Thread { tid, name } => write!(f, "thread {} ({})", name, tid),
        }
    }
}

/// Where a mask came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskSource {
    Parent,
    ThreadRule(String),
}

impl fmt::Display for MaskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskSource::Parent => f.write_str("parent mask"),
            MaskSource::ThreadRule(pattern) => write!(f, "thread rule '{}'", pattern),
        }
    }
}

/// Result of one step of applying a command rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied {
        target: Target,
        mask: CpuMask,
        source: MaskSource,
    },
    /// The mask references CPUs the kernel does not expose; nothing was set.
    /// `target` is `None` when a whole parent cascade was skipped.
    CpuRangeWarning {
        target: Option<Target>,
        mask: CpuMask,
        source: MaskSource,
        logical_cpu_count: usize,
    },
    /// The target exited before it could be changed.
    Vanished { target: Target },
    /// Several thread rules matched; the thread was left alone.
    AmbiguousSkipped {
        tid: u32,
        thread: String,
        rules: Vec<String>,
    },
}

impl Outcome {
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Outcome::CpuRangeWarning { .. } | Outcome::AmbiguousSkipped { .. }
        )
    }
}

/// Applies `rule` to the matched `process`.
pub fn apply<T: ProcessTable + ?Sized>(
    table: &T,
    process: &ProcessInfo,
    rule: &CommandRule,
    logical_cpu_count: usize,
    policy: AmbiguityPolicy,
) -> Result<Vec<Outcome>> {
    let mut outcomes = Vec::new();
    if rule.is_empty() {
        return Ok(outcomes);
    }

    let threads = match table.threads(process.pid) {
        Ok(threads) => threads,
        Err(OsError::Vanished(_)) => {
            debug!("pid {} exited before its threads could be listed", process.pid);
            outcomes.push(Outcome::Vanished {
                target: Target::Process { pid: process.pid },
            });
            return Ok(outcomes);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(parent) = &rule.parent {
        cascade_parent(
            table,
            process,
            &threads,
            parent,
            logical_cpu_count,
            &mut outcomes,
        )?;
    }

    if let Some(thread_rules) = &rule.threads {
        info!(
            "Applying thread specific masks to pid {} ({} rules)",
            process.pid,
            thread_rules.len()
        );
        for thread in &threads {
            apply_thread_rules(
                table,
                thread,
                thread_rules,
                logical_cpu_count,
                policy,
                &mut outcomes,
            )?;
        }
    }

    Ok(outcomes)
}

fn cascade_parent<T: ProcessTable + ?Sized>(
    table: &T,
    process: &ProcessInfo,
    threads: &[ThreadInfo],
    mask: &CpuMask,
    logical_cpu_count: usize,
    outcomes: &mut Vec<Outcome>,
) -> Result<()> {
    if mask.exceeds(logical_cpu_count) {
        warn!(
            "Parent mask {} for pid {} contains higher CPU IDs than the {} logical CPUs visible to the kernel, skipping",
            mask, process.pid, logical_cpu_count
        );
        outcomes.push(Outcome::CpuRangeWarning {
            target: None,
            mask: mask.clone(),
            source: MaskSource::Parent,
            logical_cpu_count,
        });
        return Ok(());
    }

    let children = match table.children(process.pid) {
        Ok(children) => children,
        Err(OsError::Vanished(_)) => {
            outcomes.push(Outcome::Vanished {
                target: Target::Process { pid: process.pid },
            });
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        "Applying parent mask {} to {} children and {} threads of pid {}",
        mask,
        children.len(),
        threads.len(),
        process.pid
    );

    let targets = children
        .into_iter()
        .map(|pid| (pid, Target::Child { pid }))
        .chain(threads.iter().map(|t| {
            (
                t.tid,
                Target::Thread {
                    tid: t.tid,
                    name: t.name.clone(),
                },
            )
        }));

    for (id, target) in targets {
        outcomes.push(set_mask(table, id, target, mask, MaskSource::Parent)?);
    }
    Ok(())
}

fn apply_thread_rules<T: ProcessTable + ?Sized>(
    table: &T,
    thread: &ThreadInfo,
    thread_rules: &[ThreadRule],
    logical_cpu_count: usize,
    policy: AmbiguityPolicy,
    outcomes: &mut Vec<Outcome>,
) -> Result<()> {
    let matching: Vec<&ThreadRule> = thread_rules
        .iter()
        .filter(|r| r.matches(&thread.name))
        .collect();

    let rule = match matching.as_slice() {
        [] => return Ok(()),
        [rule] => *rule,
        many => {
            let rules: Vec<String> = many
                .iter()
                .map(|r| format!("{} => {}", r.pattern(), r.mask()))
                .collect();
            return match policy {
                AmbiguityPolicy::Abort => Err(AffinityError::AmbiguousThreadMatch {
                    thread: thread.name.clone(),
                    tid: thread.tid,
                    rules,
                }),
                AmbiguityPolicy::SkipThread => {
                    warn!(
                        "Thread {} ({}) matches multiple masks [{}], leaving it untouched",
                        thread.name,
                        thread.tid,
                        rules.join(", ")
                    );
                    outcomes.push(Outcome::AmbiguousSkipped {
                        tid: thread.tid,
                        thread: thread.name.clone(),
                        rules,
                    });
                    Ok(())
                }
            };
        }
    };

    let target = Target::Thread {
        tid: thread.tid,
        name: thread.name.clone(),
    };
    let source = MaskSource::ThreadRule(rule.pattern().to_string());

    if rule.mask().exceeds(logical_cpu_count) {
        warn!(
            "Mask {} for thread {} contains higher CPU IDs than the {} logical CPUs visible to the kernel, skipping",
            rule.mask(),
            thread.name,
            logical_cpu_count
        );
        outcomes.push(Outcome::CpuRangeWarning {
            target: Some(target),
            mask: rule.mask().clone(),
            source,
            logical_cpu_count,
        });
        return Ok(());
    }

    info!("For thread {} applying mask {}", thread.name, rule.mask());
    outcomes.push(set_mask(table, thread.tid, target, rule.mask(), source)?);
    Ok(())
}

/// Sets one task's affinity, turning a vanished task into an outcome.
fn set_mask<T: ProcessTable + ?Sized>(
    table: &T,
    id: u32,
    target: Target,
    mask: &CpuMask,
    source: MaskSource,
) -> Result<Outcome> {
    match table.set_affinity(id, mask) {
        Ok(()) => {
            debug!("Set {} to {} ({})", target, mask, source);
            Ok(Outcome::Applied {
                target,
                mask: mask.clone(),
                source,
            })
        }
        Err(OsError::Vanished(_)) => {
            debug!("{} exited before its mask could be set", target);
            Ok(Outcome::Vanished { target })
        }
        Err(e) => Err(e.into()),
    }
}
