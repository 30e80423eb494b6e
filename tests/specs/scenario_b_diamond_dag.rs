// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario b: diamond DAG `{A} -> {B, C} -> {D}`, all threads=2, 4 cores.
//! B and C must not be dispatched before A finishes, and D not before
//! both B and C finish.

use super::prelude::local_scheduler;
use dagflow_core::test_support::FakeRule;
use dagflow_core::{LocalFile, Wildcards};

#[test]
fn diamond_dag_runs_each_wave_only_after_its_dependencies_finish() {
    let dir = tempfile::tempdir().unwrap();
    let out_a = dir.path().join("a.txt");
    let out_b = dir.path().join("b.txt");
    let out_c = dir.path().join("c.txt");
    let out_d = dir.path().join("d.txt");

    let scheduler = local_scheduler(4);

    let a = FakeRule::new("a")
        .with_output(vec![LocalFile::new(&out_a)])
        .with_threads(2)
        .with_writes_output(true);
    scheduler.add_rule(a);
    let a_id = scheduler.add_target("a", None, false).unwrap();

    let b = FakeRule::new("b")
        .with_input(vec![LocalFile::new(&out_a)])
        .with_output(vec![LocalFile::new(&out_b)])
        .with_threads(2)
        .with_writes_output(true)
        .with_template(vec![a_id], Wildcards::new());
    scheduler.add_rule(b);
    let b_id = scheduler
        .add_target("b", Some(&LocalFile::new(&out_b)), false)
        .unwrap();

    let c = FakeRule::new("c")
        .with_input(vec![LocalFile::new(&out_a)])
        .with_output(vec![LocalFile::new(&out_c)])
        .with_threads(2)
        .with_writes_output(true)
        .with_template(vec![a_id], Wildcards::new());
    scheduler.add_rule(c);
    let c_id = scheduler
        .add_target("c", Some(&LocalFile::new(&out_c)), false)
        .unwrap();

    let d = FakeRule::new("d")
        .with_input(vec![LocalFile::new(&out_b), LocalFile::new(&out_c)])
        .with_output(vec![LocalFile::new(&out_d)])
        .with_threads(2)
        .with_writes_output(true)
        .with_template(vec![b_id, c_id], Wildcards::new());
    scheduler.add_rule(d);
    scheduler
        .add_target("d", Some(&LocalFile::new(&out_d)), false)
        .unwrap();

    scheduler.schedule().unwrap();

    assert!(out_a.exists());
    assert!(out_b.exists());
    assert!(out_c.exists());
    assert!(out_d.exists());

    let d_mtime = std::fs::metadata(&out_d).unwrap().modified().unwrap();
    let a_mtime = std::fs::metadata(&out_a).unwrap().modified().unwrap();
    assert!(d_mtime >= a_mtime);
}
