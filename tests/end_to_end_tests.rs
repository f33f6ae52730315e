//! End-to-end tests: pin file tree -> rules -> match -> apply.

mod common;

use common::{cpus, FakeTable};
use readout_affinity::engine::{run, RunOptions};
use readout_affinity::{compile, AffinityError, AmbiguityPolicy};
use serde_json::{json, Value};

fn pinfile(parent: &str) -> Value {
    json!({
        "_comment": "worker pinning",
        "worker": {
            "--mode=prod": {
                "parent": parent,
                "threads": { "io-.*": "2-3" }
            }
        }
    })
}

/// worker pid 100 with two children and four threads (main thread included),
/// plus unrelated processes that must not be touched.
fn host() -> FakeTable {
    FakeTable::new()
        .process(
            100,
            "worker",
            &["/opt/worker", "--mode=prod", "--id", "7"],
            &[(100, "worker"), (101, "io-1"), (102, "io-2"), (103, "compute-1")],
        )
        .children_of(100, &[200, 201])
        .process(200, "worker-child", &["child"], &[(200, "child")])
        .process(201, "worker-child", &["child"], &[(201, "child")])
        .process(
            300,
            "worker",
            &["/opt/worker", "--mode=test"],
            &[(300, "worker"), (301, "io-1")],
        )
        .process(400, "bash", &["bash", "--mode=prod"], &[(400, "bash")])
        .with_affinity(100, &[0, 1, 2, 3, 4, 5, 6, 7])
        .with_affinity(200, &[0, 1, 2, 3, 4, 5, 6, 7])
        .with_affinity(201, &[0, 1, 2, 3, 4, 5, 6, 7])
        .with_affinity(103, &[0, 1, 2, 3, 4, 5, 6, 7])
}

fn options(logical_cpu_count: usize) -> RunOptions {
    RunOptions {
        logical_cpu_count,
        ambiguity: AmbiguityPolicy::Abort,
    }
}

#[test]
fn test_cascade_and_override() {
    let rules = compile(&pinfile("0-1")).unwrap();
    let table = host();
    let mut seen = Vec::new();

    let report = run(&rules, &table, options(8), |m| seen.push(m.process.pid)).unwrap();

    assert_eq!(seen, vec![100]);
    assert_eq!(report.processes_scanned, 5);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].fragment, "--mode=prod");

    assert_eq!(table.affinity_of(200), cpus(&[0, 1]));
    assert_eq!(table.affinity_of(201), cpus(&[0, 1]));
    assert_eq!(table.affinity_of(103), cpus(&[0, 1]));
    assert_eq!(table.affinity_of(101), cpus(&[2, 3]));
    assert_eq!(table.affinity_of(102), cpus(&[2, 3]));

    // the main thread takes the parent mask through the thread list, with a
    // single set call and no separate process-level one
    assert_eq!(table.affinity_of(100), cpus(&[0, 1]));
    assert_eq!(table.set_calls().iter().filter(|&&id| id == 100).count(), 1);
    // other processes untouched
    assert_eq!(table.affinity_of(301), None);
    assert_eq!(table.affinity_of(400), None);

    // 2 children + 4 threads from the cascade, 2 overrides
    assert_eq!(report.applied_count(), 8);
    assert_eq!(report.warning_count(), 0);
}

#[test]
fn test_parent_at_cpu_count_boundary_applies() {
    let rules = compile(&pinfile("0-1")).unwrap();
    let table = host();

    let report = run(&rules, &table, options(2), |_| {}).unwrap();

    assert_eq!(report.warning_count(), 2); // io-.* => 2-3 exceeds 2, once per io thread
    assert_eq!(table.affinity_of(200), cpus(&[0, 1]));
    assert_eq!(table.affinity_of(100), cpus(&[0, 1]));
    assert_eq!(table.affinity_of(101), cpus(&[0, 1]));
}

#[test]
fn test_parent_above_cpu_count_keeps_prior_affinity() {
    let rules = compile(&pinfile("0-3")).unwrap();
    let table = host();

    let report = run(&rules, &table, options(2), |_| {}).unwrap();

    assert_eq!(table.affinity_of(200), cpus(&[0, 1, 2, 3, 4, 5, 6, 7]));
    assert_eq!(table.affinity_of(201), cpus(&[0, 1, 2, 3, 4, 5, 6, 7]));
    assert_eq!(table.affinity_of(103), cpus(&[0, 1, 2, 3, 4, 5, 6, 7]));
    assert_eq!(table.affinity_of(100), cpus(&[0, 1, 2, 3, 4, 5, 6, 7]));
    assert_eq!(report.applied_count(), 0);
    assert!(report.warning_count() >= 1);
}

#[test]
fn test_later_fragment_wins_per_thread() {
    let rules = compile(&json!({
        "worker": {
            "--mode=prod": { "threads": { "io-.*": "2-3" } },
            "--id": { "threads": { "io-1": "4" } }
        }
    }))
    .unwrap();
    let table = host();

    let report = run(&rules, &table, options(8), |_| {}).unwrap();

    assert_eq!(report.matches.len(), 2);
    assert_eq!(table.affinity_of(101), cpus(&[4]));
    assert_eq!(table.affinity_of(102), cpus(&[2, 3]));
}

#[test]
fn test_ambiguous_match_halts_run() {
    let rules = compile(&json!({
        "worker": { "": { "threads": { "io-.*": "2", ".*-1": "3" } } }
    }))
    .unwrap();
    let table = host();

    let err = run(&rules, &table, options(8), |_| {}).unwrap_err();

    assert!(matches!(err, AffinityError::AmbiguousThreadMatch { tid: 101, .. }));
    // pid 300 comes after pid 100 and is never reached
    assert_eq!(table.affinity_of(301), None);
}

#[test]
fn test_ambiguous_match_skip_continues() {
    let rules = compile(&json!({
        "worker": { "": { "threads": { "io-.*": "2", ".*-1": "3" } } }
    }))
    .unwrap();
    let table = host();
    let options = RunOptions {
        logical_cpu_count: 8,
        ambiguity: AmbiguityPolicy::SkipThread,
    };

    let report = run(&rules, &table, options, |_| {}).unwrap();

    assert_eq!(table.affinity_of(101), None);
    assert_eq!(table.affinity_of(102), cpus(&[2]));
    assert_eq!(table.affinity_of(103), cpus(&[3]));
    assert_eq!(table.affinity_of(301), None); // ambiguous in pid 300 too
    assert_eq!(report.warning_count(), 2);
}
