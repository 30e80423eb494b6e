// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario c: three ready jobs with threads {3, 2, 2} on 4 cores — the
//! knapsack must pick {2, 2} (value 4) over {3} (value 3).

use dagflow_core::test_support::FakeRule;
use dagflow_core::{JobArena, LocalFile, Rule};
use dagflow_scheduler::knapsack;

#[test]
fn two_light_jobs_beat_one_heavy_job_for_the_same_core_budget() {
    let mut arena: JobArena<LocalFile> = JobArena::new();

    let heavy = FakeRule::new("heavy")
        .with_output(vec![LocalFile::new("heavy.txt")])
        .with_threads(3);
    let heavy_id = heavy.run(None, &mut arena, false).unwrap();

    let light_a = FakeRule::new("light_a")
        .with_output(vec![LocalFile::new("light_a.txt")])
        .with_threads(2);
    let light_a_id = light_a.run(None, &mut arena, false).unwrap();

    let light_b = FakeRule::new("light_b")
        .with_output(vec![LocalFile::new("light_b.txt")])
        .with_threads(2);
    let light_b_id = light_b.run(None, &mut arena, false).unwrap();

    let ids = [heavy_id, light_a_id, light_b_id];
    let refs: Vec<_> = ids.iter().map(|&id| arena.get(id).unwrap()).collect();

    let selected = knapsack::select(&refs, 4);
    let selected_ids: Vec<_> = selected.iter().map(|&i| ids[i]).collect();

    assert_eq!(selected_ids.len(), 2);
    assert!(selected_ids.contains(&light_a_id));
    assert!(selected_ids.contains(&light_b_id));
    assert!(!selected_ids.contains(&heavy_id));

    let total_threads: u32 = selected.iter().map(|&i| refs[i].threads).sum();
    assert_eq!(total_threads, 4);
}
