//! Reproduction state machine scenarios: first run, no-op second run,
//! forced runs, failed commands, and checkout.

mod common;

use common::TestEnv;
use stagehand::testing::FakeExecutor;
use stagehand::{Fingerprint, StagehandError};

#[test]
fn first_run_executes_then_second_run_is_noop() {
    let env = TestEnv::new();
    env.write_file("input.csv", "a,b\n1,2\n");

    let mut stage = env.command_stage(
        "./generate.sh",
        &["input.csv"],
        &["output.csv"],
        "output.csv.stage",
    );

    let executor = FakeExecutor::succeeding().with_effect(|ctx| {
        std::fs::write(ctx.cwd.join("output.csv"), "generated rows").unwrap();
    });

    // First run: changed (nothing recorded), executes, saves
    assert!(stage.reproduce(false, &executor).unwrap());
    assert_eq!(executor.call_count(), 1);
    assert_eq!(executor.calls()[0].cmd, "./generate.sh");
    assert_eq!(executor.calls()[0].cwd, env.path());

    // Output fingerprint recorded and mirrored into the cache
    let recorded = stage.outs()[0].info().cloned().unwrap();
    assert_eq!(recorded, Fingerprint::of_bytes(b"generated rows"));
    assert!(stage.md5().is_some());
    assert!(env.file_exists("output.csv.stage"));

    // Second run without mutation: unchanged, executor untouched
    assert!(!stage.changed().unwrap());
    assert!(!stage.reproduce(false, &executor).unwrap());
    assert_eq!(executor.call_count(), 1);
}

#[test]
fn reproduce_runs_again_when_dependency_changes() {
    let env = TestEnv::new();
    env.write_file("input.csv", "v1");

    let mut stage = env.command_stage("make out", &["input.csv"], &["out.csv"], "Stagefile");
    let executor = FakeExecutor::succeeding().with_effect(|ctx| {
        std::fs::write(ctx.cwd.join("out.csv"), "built").unwrap();
    });

    assert!(stage.reproduce(false, &executor).unwrap());
    assert!(!stage.reproduce(false, &executor).unwrap());

    env.write_file("input.csv", "v2");
    assert!(stage.changed().unwrap());
    assert!(stage.reproduce(false, &executor).unwrap());
    assert_eq!(executor.call_count(), 2);
}

#[test]
fn force_reproduces_an_unchanged_stage() {
    let env = TestEnv::new();
    env.write_file("input.csv", "v1");

    let mut stage = env.command_stage("make out", &["input.csv"], &["out.csv"], "Stagefile");
    let executor = FakeExecutor::succeeding().with_effect(|ctx| {
        std::fs::write(ctx.cwd.join("out.csv"), "built").unwrap();
    });

    assert!(stage.reproduce(false, &executor).unwrap());
    assert!(stage.reproduce(true, &executor).unwrap());
    assert_eq!(executor.call_count(), 2);
}

#[test]
fn failed_command_clears_outputs_and_persists_nothing() {
    let env = TestEnv::new();
    env.write_file("input.csv", "v1");

    let mut stage = env.command_stage("make out", &["input.csv"], &["out.csv"], "Stagefile");
    let good = FakeExecutor::succeeding().with_effect(|ctx| {
        std::fs::write(ctx.cwd.join("out.csv"), "built").unwrap();
    });
    assert!(stage.reproduce(false, &good).unwrap());

    let saved_md5 = stage.md5().cloned();
    let saved_descriptor = env.read_file("Stagefile");

    // Make the stage stale, then fail the run
    env.write_file("input.csv", "v2");
    let bad = FakeExecutor::failing(1);
    let err = stage.reproduce(false, &bad).unwrap_err();
    assert!(matches!(err, StagehandError::CommandFailed { code: 1, .. }));

    // Outputs were removed before execution; nothing was saved
    assert!(!env.file_exists("out.csv"));
    assert_eq!(stage.md5().cloned(), saved_md5);
    assert_eq!(env.read_file("Stagefile"), saved_descriptor);
}

#[test]
fn callback_stage_reproduces_every_time() {
    let env = TestEnv::new();

    let mut stage = env.command_stage("fetch-data", &[], &["data.bin"], "Stagefile");
    assert!(stage.is_callback());

    let executor = FakeExecutor::succeeding().with_effect(|ctx| {
        std::fs::write(ctx.cwd.join("data.bin"), "payload").unwrap();
    });

    assert!(stage.reproduce(false, &executor).unwrap());
    // No mutation, but callbacks can never prove they didn't change
    assert!(stage.reproduce(false, &executor).unwrap());
    assert_eq!(executor.call_count(), 2);
}

#[test]
fn checkout_restores_outputs_without_running() {
    let env = TestEnv::new();
    env.write_file("input.csv", "v1");

    let mut stage = env.command_stage("make out", &["input.csv"], &["out.csv"], "Stagefile");
    let executor = FakeExecutor::succeeding().with_effect(|ctx| {
        std::fs::write(ctx.cwd.join("out.csv"), "built").unwrap();
    });
    assert!(stage.reproduce(false, &executor).unwrap());

    std::fs::remove_file(env.path().join("out.csv")).unwrap();
    stage.checkout().unwrap();
    assert_eq!(env.read_file("out.csv"), "built");

    // Checkout never re-runs the command
    assert_eq!(executor.call_count(), 1);
}

#[test]
fn status_reports_dependency_drift_after_save() {
    let env = TestEnv::new();
    env.write_file("input.csv", "v1");

    let mut stage = env.command_stage("make out", &["input.csv"], &["out.csv"], "Stagefile");
    let executor = FakeExecutor::succeeding().with_effect(|ctx| {
        std::fs::write(ctx.cwd.join("out.csv"), "built").unwrap();
    });
    assert!(stage.reproduce(false, &executor).unwrap());
    assert!(stage.status().unwrap().is_empty());

    env.write_file("input.csv", "v2");
    let status = stage.status().unwrap();
    assert_eq!(status.len(), 1);
    let report = status.values().next().unwrap();
    assert_eq!(
        report.deps.get("input.csv").map(ToString::to_string),
        Some("modified".to_string())
    );
    assert!(report.outs.is_empty());
}
