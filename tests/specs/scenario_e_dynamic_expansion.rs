// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario e: rule `split` produces dynamic outputs `chunk.{i}.txt`;
//! once it finishes, discovering three concrete chunks re-materializes
//! the downstream `merge` job (which declared a matching dynamic input)
//! into a fresh job over all three, and the job counter reflects the net
//! addition.
//!
//! `merge`'s initial job depends on `split` (its dynamic input isn't
//! resolved yet); the respliced job built during expansion depends on
//! nothing, since by then the chunks it names are already on disk —
//! `set_depends` rewires the template in between to model that without
//! a fake file-staleness check.

use super::prelude::local_scheduler_with_workflow;
use dagflow_core::test_support::FakeRule;
use dagflow_core::{LocalFile, Wildcards};

#[test]
fn dynamic_output_respawns_downstream_job_over_discovered_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let chunk_pattern = dir.path().join("chunk.{i}.txt");
    let chunk_a = dir.path().join("chunk.a.txt");
    let chunk_b = dir.path().join("chunk.b.txt");
    let chunk_c = dir.path().join("chunk.c.txt");
    let merged = dir.path().join("merged.txt");

    let (scheduler, workflow) = local_scheduler_with_workflow(4);

    let split = FakeRule::new("split")
        .with_output(vec![LocalFile::new(&chunk_pattern)])
        .with_dynamic_output_slot(0)
        .with_writes_output(false);
    split.set_dynamic_discovery(
        0,
        vec![
            (LocalFile::new(&chunk_a), Wildcards::new()),
            (LocalFile::new(&chunk_b), Wildcards::new()),
            (LocalFile::new(&chunk_c), Wildcards::new()),
        ],
    );
    scheduler.add_rule(split);
    let split_id = scheduler.add_target("split", None, false).unwrap();

    let merge = FakeRule::new("merge")
        .with_input(vec![LocalFile::new(&chunk_pattern)])
        .with_dynamic_input_slot(0)
        .with_output(vec![LocalFile::new(&merged)])
        .with_writes_output(true)
        .with_template(vec![split_id], Wildcards::new());
    let merge_handle = merge.clone();
    scheduler.add_rule(merge);
    scheduler
        .add_target("merge", Some(&LocalFile::new(&merged)), false)
        .unwrap();
    // The respliced job expansion builds depends on nothing further: by
    // the time it runs, the chunk files it names are already concrete.
    merge_handle.set_depends(vec![]);

    scheduler.schedule().unwrap();

    assert!(merged.exists());
    // Two jobs do real work: `split` itself, and the respliced `merge`.
    // The original, pre-expansion `merge` job never runs its payload.
    assert_eq!(workflow.jobcounter().done(), 2);
    assert_eq!(merge_handle.dynamic_input_calls().len(), 1);
    let (_, expanded) = &merge_handle.dynamic_input_calls()[0];
    assert_eq!(expanded.len(), 3);
}

#[test]
fn ancestor_with_no_matching_dynamic_input_is_unaffected_by_expansion() {
    let dir = tempfile::tempdir().unwrap();
    let chunk_pattern = dir.path().join("chunk.{i}.txt");
    let chunk_a = dir.path().join("chunk.a.txt");
    let unrelated_out = dir.path().join("unrelated.txt");

    let (scheduler, workflow) = local_scheduler_with_workflow(4);

    let split = FakeRule::new("split")
        .with_output(vec![LocalFile::new(&chunk_pattern)])
        .with_dynamic_output_slot(0)
        .with_writes_output(false);
    split.set_dynamic_discovery(0, vec![(LocalFile::new(&chunk_a), Wildcards::new())]);
    scheduler.add_rule(split);
    let split_id = scheduler.add_target("split", None, false).unwrap();

    let unrelated = FakeRule::new("unrelated")
        .with_output(vec![LocalFile::new(&unrelated_out)])
        .with_writes_output(true)
        .with_template(vec![split_id], Wildcards::new());
    scheduler.add_rule(unrelated);
    scheduler
        .add_target("unrelated", Some(&LocalFile::new(&unrelated_out)), false)
        .unwrap();

    scheduler.schedule().unwrap();

    assert!(unrelated_out.exists());
    assert_eq!(workflow.jobcounter().done(), 2);
}
