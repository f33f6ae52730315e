//! Pin file compilation.
//!
//! Turns the raw pin file tree into an immutable [`RuleSet`]:
//! process name -> command line fragment -> { parent mask, thread rules }.
//! Any malformed mask, pattern, or structure aborts the whole compilation so
//! that nothing is applied from a half-understood file.

use crate::error::{AffinityError, Result};
use crate::mask::{parse_mask, CpuMask};
use ahash::AHashMap as HashMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

/// Top-level key reserved for free-text notes.
pub const COMMENT_KEY: &str = "_comment";

const PARENT_FIELD: &str = "parent";
const THREADS_FIELD: &str = "threads";

/// Thread name pattern (full match) paired with its mask.
#[derive(Debug, Clone)]
pub struct ThreadRule {
    pattern: String,
    regex: Regex,
    mask: CpuMask,
}

impl ThreadRule {
    pub fn new(pattern: &str, mask: CpuMask) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            AffinityError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            mask,
        })
    }

    /// True only when the pattern covers the whole thread name.
    pub fn matches(&self, thread_name: &str) -> bool {
        self.regex.is_match(thread_name)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn mask(&self) -> &CpuMask {
        &self.mask
    }
}

/// Masks configured for one command line fragment.
#[derive(Debug, Clone, Default)]
pub struct CommandRule {
    pub parent: Option<CpuMask>,
    /// `None` when the `threads` field is absent, in file order otherwise.
    pub threads: Option<Vec<ThreadRule>>,
}

impl CommandRule {
    pub fn is_empty(&self) -> bool {
        self.parent.is_none() && self.threads.is_none()
    }
}

/// Command line fragments of one executable, in pin file order.
#[derive(Debug, Clone, Default)]
pub struct ProcessRule {
    commands: Vec<(String, CommandRule)>,
}

impl ProcessRule {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CommandRule)> {
        self.commands.iter().map(|(f, r)| (f.as_str(), r))
    }

    pub fn get(&self, fragment: &str) -> Option<&CommandRule> {
        self.commands
            .iter()
            .find(|(f, _)| f == fragment)
            .map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Non-fatal findings from compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    UnknownField {
        process: String,
        fragment: String,
        field: String,
    },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::UnknownField {
                process,
                fragment,
                field,
            } => write!(
                f,
                "expected affinity fields are 'parent' or 'threads', ignoring field '{}' ({} / '{}')",
                field, process, fragment
            ),
        }
    }
}

/// Compiled pin file, keyed by executable name.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    processes: HashMap<String, ProcessRule>,
    warnings: Vec<CompileWarning>,
}

impl RuleSet {
    pub fn get(&self, process_name: &str) -> Option<&ProcessRule> {
        self.processes.get(process_name)
    }

    pub fn contains(&self, process_name: &str) -> bool {
        self.processes.contains_key(process_name)
    }

    /// Process names, sorted for stable output.
    pub fn process_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.processes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }
}

/// Compiles a parsed pin file into a [`RuleSet`].
pub fn compile(raw: &Value) -> Result<RuleSet> {
    let root = as_object(raw, "pin file root")?;
    let mut rules = RuleSet::default();

    for (process, fragments) in root {
        if process == COMMENT_KEY {
            continue;
        }
        let fragments = as_object(fragments, &format!("process '{}'", process))?;

        let mut process_rule = ProcessRule::default();
        for (fragment, fields) in fragments {
            let context = format!("process '{}' / fragment '{}'", process, fragment);
            let fields = as_object(fields, &context)?;
            let command = compile_command(process, fragment, fields, &mut rules.warnings)?;
            debug!(
                "Compiled rule {}: parent={:?}, thread rules={}",
                context,
                command.parent.as_ref().map(ToString::to_string),
                command.threads.as_ref().map_or(0, Vec::len)
            );
            process_rule.commands.push((fragment.clone(), command));
        }
        rules.processes.insert(process.clone(), process_rule);
    }

    Ok(rules)
}

fn compile_command(
    process: &str,
    fragment: &str,
    fields: &Map<String, Value>,
    warnings: &mut Vec<CompileWarning>,
) -> Result<CommandRule> {
    let mut command = CommandRule::default();

    for (field, value) in fields {
        match field.as_str() {
            PARENT_FIELD => command.parent = Some(parse_mask(value)?),
            THREADS_FIELD => {
                let patterns = as_object(
                    value,
                    &format!("threads of process '{}' / fragment '{}'", process, fragment),
                )?;
                let mut threads = Vec::with_capacity(patterns.len());
                for (pattern, mask) in patterns {
                    threads.push(ThreadRule::new(pattern, parse_mask(mask)?)?);
                }
                command.threads = Some(threads);
            }
            _ => {
                let warning = CompileWarning::UnknownField {
                    process: process.to_string(),
                    fragment: fragment.to_string(),
                    field: field.clone(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    Ok(command)
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| AffinityError::InvalidConfig(format!("{} must be an object", what)))
}
