// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Render a job DAG as Graphviz DOT, for `--dag`-style diagnostics.
//!
//! Grounded in the reference `Job.dot()`/`print_job_dag()`: one node per
//! job labeled with its rule name plus any wildcard bindings new to it,
//! and one edge per dependency that still needs to run.

use dagflow_core::{IOFile, JobArena, JobId};
use std::fmt::Write as _;

/// Render every job in `arena` as a `digraph job_dag { ... }`
/// block. Returns the DOT source as a string rather than printing it
/// directly, so callers can write it to a file or a pipe as they see
/// fit.
pub fn render<F: IOFile>(arena: &JobArena<F>) -> String {
    let mut out = String::new();
    out.push_str("digraph job_dag {\n");
    for id in arena.ids() {
        let job = match arena.get(id) {
            Some(job) => job,
            None => continue,
        };

        let mut label = job.rule_name.clone();
        let new_wildcards = job.new_wildcards(arena);
        if job.depends.is_empty() || !new_wildcards.is_empty() {
            for (wildcard, value) in &new_wildcards {
                let _ = write!(label, "\\n{wildcard}: {value}");
            }
        }
        let _ = writeln!(out, "\t{}[label = \"{}\"];", id.as_u64(), escape(&label));

        for dep_id in &job.depends {
            if let Some(dep) = arena.get(*dep_id) {
                if dep.needrun {
                    let _ = writeln!(out, "\t{} -> {};", dep_id.as_u64(), id.as_u64());
                }
            }
        }
    }
    out.push_str("}\n");
    out
}

/// Render only the subgraph reachable from `roots`, following
/// dependencies transitively — useful for `--dag TARGET` style
/// invocations that only want to see one target's subtree.
pub fn render_subgraph<F: IOFile>(arena: &JobArena<F>, roots: &[JobId]) -> String {
    let mut included: std::collections::HashSet<JobId> = roots.iter().copied().collect();
    for &root in roots {
        included.extend(arena.descendants(root));
    }

    let mut out = String::new();
    out.push_str("digraph job_dag {\n");
    for &id in &included {
        let job = match arena.get(id) {
            Some(job) => job,
            None => continue,
        };
        let mut label = job.rule_name.clone();
        let new_wildcards = job.new_wildcards(arena);
        if job.depends.is_empty() || !new_wildcards.is_empty() {
            for (wildcard, value) in &new_wildcards {
                let _ = write!(label, "\\n{wildcard}: {value}");
            }
        }
        let _ = writeln!(out, "\t{}[label = \"{}\"];", id.as_u64(), escape(&label));

        for dep_id in &job.depends {
            if !included.contains(dep_id) {
                continue;
            }
            if let Some(dep) = arena.get(*dep_id) {
                if dep.needrun {
                    let _ = writeln!(out, "\t{} -> {};", dep_id.as_u64(), id.as_u64());
                }
            }
        }
    }
    out.push_str("}\n");
    out
}

fn escape(label: &str) -> String {
    label.replace('"', "\\\"")
}

#[cfg(test)]
#[path = "dot_tests.rs"]
mod tests;
