//! Pin file loading for readout-affinity.
//!
//! The pin file is JSON by default; `.yaml`/`.yml` and `.toml` files are
//! accepted too and are read into the same tree before compilation.

use anyhow::Context;
use readout_affinity::{compile, RuleSet};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

/// Reads a pin file into a JSON tree, choosing the parser by extension.
pub fn load_pinfile(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pin file {}", path.display()))?;

    let value = match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => {
            let value: Value = serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?;
            info!("Loaded YAML pin file from: {}", path.display());
            value
        }
        Some("toml") => {
            let value: Value = toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?;
            info!("Loaded TOML pin file from: {}", path.display());
            value
        }
        _ => {
            // Default to JSON
            let value: Value = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?;
            info!("Loaded JSON pin file from: {}", path.display());
            value
        }
    };
    Ok(value)
}

/// Loads and compiles a pin file.
pub fn load_rules(path: &Path) -> anyhow::Result<RuleSet> {
    let raw = load_pinfile(path)?;
    let rules = compile(&raw).with_context(|| format!("Invalid pin file {}", path.display()))?;
    Ok(rules)
}

/// Prints the compiled rules (used by --check-config).
pub fn show_rules(rules: &RuleSet) {
    for name in rules.process_names() {
        println!("  -> {}", name);
        let Some(process) = rules.get(name) else {
            continue;
        };
        for (fragment, command) in process.iter() {
            println!("      + Command line fragment: '{}'", fragment);
            if let Some(parent) = &command.parent {
                println!("        - parent: {}", parent);
            }
            if let Some(threads) = &command.threads {
                for rule in threads {
                    println!("        - thread '{}': {}", rule.pattern(), rule.mask());
                }
            }
            if command.is_empty() {
                println!("        - (no masks)");
            }
        }
    }
}
