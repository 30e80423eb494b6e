// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario a: single rule, two inputs, one output, `threads=1`, 4 cores.

use super::prelude::local_scheduler_with_workflow;
use dagflow_core::test_support::FakeRule;
use dagflow_core::LocalFile;

#[test]
fn single_worker_dispatched_and_output_created_under_spare_core_budget() {
    let dir = tempfile::tempdir().unwrap();
    let in_a = dir.path().join("a.txt");
    let in_b = dir.path().join("b.txt");
    let out = dir.path().join("out.txt");
    std::fs::write(&in_a, b"1").unwrap();
    std::fs::write(&in_b, b"2").unwrap();

    let (scheduler, workflow) = local_scheduler_with_workflow(4);
    scheduler.add_rule(
        FakeRule::new("combine")
            .with_input(vec![LocalFile::new(&in_a), LocalFile::new(&in_b)])
            .with_output(vec![LocalFile::new(&out)])
            .with_writes_output(true),
    );
    scheduler.add_target("combine", None, false).unwrap();

    scheduler.schedule().unwrap();

    assert!(out.exists());
    assert_eq!(workflow.jobcounter().done(), 1);
    assert_eq!(workflow.runtimes().len(), 1);
}
