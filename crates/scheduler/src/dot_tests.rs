// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dagflow_core::test_support::FakeRule;
use dagflow_core::{JobArena, LocalFile, Rule};

#[test]
fn renders_one_node_per_job_with_rule_name_label() {
    let mut arena: JobArena<LocalFile> = JobArena::new();
    let rule = FakeRule::new("align").with_output(vec![LocalFile::new("out.bam")]);
    let id = rule.run(None, &mut arena, false).unwrap();

    let dot = render(&arena);
    assert!(dot.starts_with("digraph job_dag {\n"));
    assert!(dot.ends_with("}\n"));
    assert!(dot.contains(&format!("{}[label = \"align\"];", id.as_u64())));
}

#[test]
fn renders_an_edge_only_for_dependencies_that_still_need_to_run() {
    let mut arena: JobArena<LocalFile> = JobArena::new();
    let upstream = FakeRule::new("upstream").with_output(vec![LocalFile::new("mid.txt")]);
    let upstream_id = upstream.run(None, &mut arena, false).unwrap();

    let downstream = FakeRule::new("downstream")
        .with_input(vec![LocalFile::new("mid.txt")])
        .with_template(vec![upstream_id], dagflow_core::Wildcards::new());
    let downstream_id = downstream.run(None, &mut arena, false).unwrap();

    let dot = render(&arena);
    assert!(dot.contains(&format!("{} -> {};", upstream_id.as_u64(), downstream_id.as_u64())));

    arena.get_mut(upstream_id).unwrap().needrun = false;
    let dot_no_edge = render(&arena);
    assert!(!dot_no_edge.contains(&format!("{} -> {};", upstream_id.as_u64(), downstream_id.as_u64())));
}

#[test]
fn new_wildcards_on_a_root_job_are_included_in_its_label() {
    let mut arena: JobArena<LocalFile> = JobArena::new();
    let mut wildcards = dagflow_core::Wildcards::new();
    wildcards.insert("sample".to_string(), "s1".to_string());
    let rule = FakeRule::new("call")
        .with_output(vec![LocalFile::new("s1.vcf")])
        .with_template(Vec::new(), wildcards);
    let id = rule.run(None, &mut arena, false).unwrap();

    let dot = render(&arena);
    assert!(dot.contains(&format!("{}[label = \"call\\nsample: s1\"];", id.as_u64())));
}

#[test]
fn render_subgraph_only_includes_reachable_jobs() {
    let mut arena: JobArena<LocalFile> = JobArena::new();
    let a = FakeRule::new("a").with_output(vec![LocalFile::new("a.txt")]);
    let a_id = a.run(None, &mut arena, false).unwrap();
    let b = FakeRule::new("b").with_output(vec![LocalFile::new("b.txt")]);
    let _b_id = b.run(None, &mut arena, false).unwrap();

    let dot = render_subgraph(&arena, &[a_id]);
    assert!(dot.contains("label = \"a\""));
    assert!(!dot.contains("label = \"b\""));
}
