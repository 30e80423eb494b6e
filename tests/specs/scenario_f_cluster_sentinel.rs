// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario f: a cluster job's submit command writes a `.jobfinished`
//! sentinel; the watcher thread picks it up within one polling interval,
//! removes the sentinels and script, and the scheduler proceeds.
//!
//! The submit command here stands in for `qsub`: rather than handing
//! the script to a real batch system and letting it run asynchronously,
//! it touches the finished/failed sentinel itself, keyed off the script
//! path it's given — exactly the contract `wait_for_sentinel` polls for.

#![cfg(unix)]

use dagflow_core::test_support::FakeRule;
use dagflow_core::{LocalFile, SimpleWorkflow};
use dagflow_scheduler::ClusterScheduler;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

fn sentinel_toucher(dir: &std::path::Path, suffix: &str) -> String {
    let script = dir.join(format!("submit_{suffix}.sh"));
    std::fs::write(
        &script,
        format!("#!/bin/sh\nbase=\"${{1%.sh}}\"\ntouch \"$base.{suffix}\"\n"),
    )
    .unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(&script, perms).unwrap();
    script.to_string_lossy().into_owned()
}

#[test]
fn cluster_job_completes_via_its_own_sentinel_script() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.bam");
    // The external batch job is simulated rather than actually run; its
    // having produced the output is modeled by writing it up front.
    std::fs::write(&out, b"bam").unwrap();

    let submitcmd = sentinel_toucher(dir.path(), "jobfinished");
    let workflow = Arc::new(SimpleWorkflow::new(1, dir.path().join("scripts"), 0));
    let scheduler = ClusterScheduler::<FakeRule>::new(workflow, submitcmd, dir.path(), Some(4));

    scheduler.add_rule(FakeRule::new("align").with_output(vec![LocalFile::new(&out)]));
    scheduler.add_target("align", None, false).unwrap();

    scheduler.schedule().unwrap();
    assert!(out.exists());
}

#[test]
fn cluster_job_failure_sentinel_aborts_the_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.bam");

    let submitcmd = sentinel_toucher(dir.path(), "jobfailed");
    let workflow = Arc::new(SimpleWorkflow::new(1, dir.path().join("scripts"), 0));
    let scheduler = ClusterScheduler::<FakeRule>::new(workflow, submitcmd, dir.path(), None);

    scheduler.add_rule(FakeRule::new("align").with_output(vec![LocalFile::new(&out)]));
    scheduler.add_target("align", None, false).unwrap();

    let err = scheduler.schedule().unwrap_err();
    assert!(matches!(
        err,
        dagflow_core::SchedulerError::ClusterJobException { rule, .. } if rule == "align"
    ));
}

#[test]
fn two_independent_cluster_jobs_both_dispatch_without_local_core_accounting() {
    let dir = tempfile::tempdir().unwrap();
    let out_a = dir.path().join("a.bam");
    let out_b = dir.path().join("b.bam");
    std::fs::write(&out_a, b"a").unwrap();
    std::fs::write(&out_b, b"b").unwrap();

    let submitcmd = sentinel_toucher(dir.path(), "jobfinished");
    let workflow = Arc::new(SimpleWorkflow::new(1, dir.path().join("scripts"), 0));
    let scheduler = ClusterScheduler::<FakeRule>::new(workflow, submitcmd, dir.path(), None);

    scheduler.add_rule(
        FakeRule::new("a")
            .with_output(vec![LocalFile::new(&out_a)])
            .with_threads(8),
    );
    scheduler.add_rule(
        FakeRule::new("b")
            .with_output(vec![LocalFile::new(&out_b)])
            .with_threads(8),
    );
    scheduler.add_target("a", None, false).unwrap();
    scheduler.add_target("b", None, false).unwrap();

    // Neither job's declared thread count (well above any plausible
    // local core budget) blocks it from dispatching: the cluster
    // scheduler doesn't enforce a core budget locally.
    scheduler.schedule().unwrap();
    assert!(out_a.exists());
    assert!(out_b.exists());
}
