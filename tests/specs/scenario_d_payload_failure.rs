// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario d: a job's payload fails to produce its declared output —
//! the output is cleaned up, the error surfaces from `schedule`, and no
//! downstream job ever gets dispatched.

use super::prelude::local_scheduler;
use dagflow_core::test_support::FakeRule;
use dagflow_core::{LocalFile, Wildcards};

#[test]
fn failed_job_output_is_removed_and_downstream_never_runs() {
    let dir = tempfile::tempdir().unwrap();
    let out_x = dir.path().join("x.txt");
    let out_z = dir.path().join("z.txt");

    // Simulates a payload that half-wrote its output before failing: the
    // file exists on disk but the rule never actually completes
    // (writes_output stays false), so the output check fails and
    // cleanup removes the partial file.
    std::fs::write(&out_x, b"partial").unwrap();

    let scheduler = local_scheduler(4);
    let x = FakeRule::new("x").with_output(vec![LocalFile::new(&out_x)]);
    scheduler.add_rule(x);
    let x_id = scheduler.add_target("x", None, false).unwrap();

    let z = FakeRule::new("z")
        .with_input(vec![LocalFile::new(&out_x)])
        .with_output(vec![LocalFile::new(&out_z)])
        .with_writes_output(true)
        .with_template(vec![x_id], Wildcards::new());
    scheduler.add_rule(z);
    scheduler
        .add_target("z", Some(&LocalFile::new(&out_z)), false)
        .unwrap();

    let err = scheduler.schedule().unwrap_err();
    assert!(matches!(
        err,
        dagflow_core::SchedulerError::MissingOutputException { rule, .. } if rule == "x"
    ));
    assert!(!out_x.exists());
    assert!(!out_z.exists());
}
