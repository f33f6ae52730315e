//! readout-affinity - version 0.1.0
//!
//! Alters CPU masks of running processes, their children and threads based on
//! a pin file. Single pass over the current process table.

mod cli;
mod config;
mod startup_checks;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use readout_affinity::engine::{self, RunOptions, RunReport};
use readout_affinity::process::ProcessDetails;
use readout_affinity::{system, AffinityError, Match, Outcome, ProcFs};
use std::process::ExitCode;
use tracing::{debug, error, info, Level};

use cli::{Args, LogLevel};
use config::{load_rules, show_rules};

const EXIT_FATAL: u8 = 1;
const EXIT_WARNINGS: u8 = 2;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };
    let Some(log_level) = log_level else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    debug!("Logging initialized with level: {:?}", args.log_level);
}

/// Prints usage; used for every kind of argument misuse.
fn print_usage() {
    if let Err(e) = Args::command().print_help() {
        eprintln!("{}", e);
    }
    println!();
}

/// Exit code for a fatal error: 0 unless strict exit codes were requested.
fn fatal(args: &Args) -> ExitCode {
    if args.strict_exit_codes {
        ExitCode::from(EXIT_FATAL)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_basic_information() -> Result<usize, String> {
    println!("### Basic information...");
    let lcpu_count = system::logical_cpu_count()?;
    println!("  -> Logical CPU count: {}", lcpu_count);
    match system::physical_cpu_count() {
        Ok(n) => println!("  -> Physical CPU count: {}", n),
        Err(e) => println!("  -> Physical CPU count: unknown ({})", e),
    }
    match system::read_extended_memory_info() {
        Ok(mem) => println!(
            "  -> Memory status: total={:.2} [MB] available={:.2} [MB] used={:.1}% cached={:.2} [MB] buffers={:.2} [MB] swap={:.2}/{:.2} [MB] free",
            mb(mem.total_bytes),
            mb(mem.available_bytes),
            mem.used_percent(),
            mb(mem.cached_bytes),
            mb(mem.buffers_bytes),
            mb(mem.swap_free_bytes),
            mb(mem.swap_total_bytes),
        ),
        Err(e) => println!("  -> Memory status: unknown ({})", e),
    }
    println!();
    Ok(lcpu_count)
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

/// Prints the report block for a matched process before its masks are applied.
fn print_match(procfs: &ProcFs, m: &Match<'_>) {
    println!("   -> Found process to mask!");
    println!("      + Command line: {}", m.process.joined_cmdline());
    println!("      + Matched fragment: '{}'", m.fragment);
    println!("      + Process ID (PID): {}", m.process.pid);

    let details = match procfs.details(m.process.pid) {
        Ok(details) => details,
        Err(e) => {
            debug!("No details for pid {}: {}", m.process.pid, e);
            ProcessDetails::default()
        }
    };
    match details.memory {
        Some(mem) => println!(
            "      + Memory info: Resident Set Size (RSS): {:.2} [MB] | Virtual Memory Size (VMS): {:.2} [MB]",
            mem.rss_mb(),
            mem.vms_mb()
        ),
        None => println!("      + Memory info: unavailable"),
    }
    match details.connection_count {
        Some(n) => println!("      + Network connection count: {}", n),
        None => println!("      + Network connection count: unavailable"),
    }
    println!("      + Children count: {}", details.children_count);
    println!("      + Thread count: {}", details.thread_count);
    if let Some(parent) = &m.rule.parent {
        println!("      + Parent mask specified! Applying mask for every children and thread!");
        println!("        - mask: {}", parent);
    }
    if m.rule.threads.is_some() {
        println!("      + Thread masks specified! Applying thread specific masks!");
    }
}

fn print_summary(report: &RunReport) {
    for m in &report.matches {
        for outcome in &m.outcomes {
            match outcome {
                Outcome::CpuRangeWarning {
                    target,
                    mask,
                    logical_cpu_count,
                    ..
                } => println!(
                    "WARNING! CPU mask {} for pid {}{} contains higher CPU IDs than logical CPU count ({}) visible by the kernel!",
                    mask,
                    m.pid,
                    target.as_ref().map(|t| format!(" / {}", t)).unwrap_or_default(),
                    logical_cpu_count
                ),
                Outcome::AmbiguousSkipped { thread, rules, .. } => println!(
                    "WARNING! Thread {} of pid {} matches multiple masks {:?}, left untouched",
                    thread, m.pid, rules
                ),
                _ => {}
            }
        }
    }
    println!(
        "  -> {} processes scanned, {} matches, {} masks applied, {} warnings, {} targets vanished",
        report.processes_scanned,
        report.matches.len(),
        report.applied_count(),
        report.warning_count(),
        report.vanished_count()
    );
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            eprintln!("{}", e);
            print_usage();
            return ExitCode::SUCCESS;
        }
    };

    let Some(pinfile) = args.pinfile.clone() else {
        print_usage();
        return ExitCode::SUCCESS;
    };

    setup_logging(&args);

    let lcpu_count = match print_basic_information() {
        Ok(n) => n,
        Err(e) => {
            error!("{}", e);
            println!("{}", e);
            return fatal(&args);
        }
    };

    println!("### Parsing CPU mask file...");
    let rules = match load_rules(&pinfile) {
        Ok(rules) => rules,
        Err(e) => {
            println!("{:#}", e);
            return fatal(&args);
        }
    };
    for warning in rules.warnings() {
        println!("{}", warning);
    }
    println!();

    if args.check_config {
        show_rules(&rules);
        println!("✅ Pin file is valid ({} processes)", rules.len());
        return ExitCode::SUCCESS;
    }

    let procfs = ProcFs::default();
    if let Err(e) = startup_checks::validate_requirements(procfs.root()) {
        error!("❌ Startup validation failed: {}", e);
        error!("   Affinity changes may fail for some processes!");
        // Continue anyway - don't fail hard
    }

    println!(
        "### Attempt to find and apply cpu mask for the following processes: {:?}",
        rules.process_names()
    );

    let options = RunOptions {
        logical_cpu_count: lcpu_count,
        ambiguity: args.ambiguous_threads.into(),
    };
    let report = match engine::run(&rules, &procfs, options, |m| print_match(&procfs, m)) {
        Ok(report) => report,
        Err(e) => {
            error!("Affinity run aborted: {}", e);
            println!("{}", e);
            if let AffinityError::AmbiguousThreadMatch { .. } = e {
                println!("Use --ambiguous-threads skip to leave such threads untouched.");
            }
            return fatal(&args);
        }
    };
    println!();

    print_summary(&report);
    println!("### CPU affinity applied!");
    info!("Applied {} masks", report.applied_count());

    let warnings = report.warning_count() + rules.warnings().len();
    if args.strict_exit_codes && warnings > 0 {
        ExitCode::from(EXIT_WARNINGS)
    } else {
        ExitCode::SUCCESS
    }
}
