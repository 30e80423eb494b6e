// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dynamic DAG expansion: once a job with dynamic outputs finishes, walk
//! its ancestors and rewrite any of them that declared a matching
//! dynamic input, splicing a freshly-built subgraph in their place.
//!
//! This keeps a deliberately fragile edge: an ancestor whose expansion
//! fails to produce a fresh job is left alone rather than erroring the
//! whole run, and the finishing job is spliced out of the DAG by id
//! rather than recomputed. Downstream coordination then relies on the
//! replacement subgraph producing outputs that are at least a superset
//! of what the spliced job promised.

use dagflow_core::{JobArena, JobCounter, JobId, Rule, RuleLookup, SchedulerError, Wildcards};
use std::collections::HashSet;

/// Re-expand every ancestor of `finished_job` that declared a dynamic
/// input matching one of `finished_job`'s dynamic outputs, returning the
/// ids of every newly created job (including the fresh ancestors'
/// descendants) that the caller should add to its pending set.
///
/// `jobcounter` is adjusted by `new_jobs - expanded_count`, the same net
/// addition the reference implementation logs as a warning — splicing
/// one job out and three back in nets `+2`, not `+3`.
pub fn handle_dynamic_output<R, L>(
    arena: &mut JobArena<R::File>,
    rules: &mut L,
    finished_job: JobId,
    jobcounter: &JobCounter,
) -> Result<Vec<JobId>, SchedulerError>
where
    R: Rule,
    L: RuleLookup<R>,
{
    let (rule_name, dynamic_indices) = {
        let job = arena.get(finished_job).ok_or_else(|| {
            SchedulerError::rule_failed("<dynamic>", "finished job missing from arena")
        })?;
        let indices: Vec<usize> = job
            .output_dynamic_slots()
            .iter()
            .enumerate()
            .filter(|(_, dynamic)| **dynamic)
            .map(|(i, _)| i)
            .collect();
        (job.rule_name.clone(), indices)
    };

    let mut discovered: Vec<(R::File, Wildcards)> = Vec::new();
    if let Some(rule) = rules.rule_mut(&rule_name) {
        for index in dynamic_indices {
            discovered.extend(rule.discover_dynamic(index)?);
        }
    }

    let mut new_jobs: HashSet<JobId> = HashSet::new();
    let mut dynamic_count = 0usize;
    for ancestor_id in arena.ancestors(finished_job) {
        if let Some(new_root) = handle_dynamic_input(arena, rules, ancestor_id, &discovered)? {
            new_jobs.insert(new_root);
            for descendant in arena.descendants(new_root) {
                new_jobs.insert(descendant);
            }
            dynamic_count += 1;
        }
    }

    // The finished job should already be detached from its dependents by
    // the time this runs; defend against it reappearing via a rebuilt
    // ancestor subgraph that happens to recreate the same rule instance.
    if new_jobs.remove(&finished_job) {
        arena.splice_out(finished_job);
    }

    let added = new_jobs.len() as i64 - dynamic_count as i64;
    if added != 0 {
        jobcounter.adjust_total(added);
        tracing::warn!(added, "dynamically adding new jobs");
    }

    Ok(new_jobs.into_iter().collect())
}

fn handle_dynamic_input<R, L>(
    arena: &mut JobArena<R::File>,
    rules: &mut L,
    job_id: JobId,
    discovered: &[(R::File, Wildcards)],
) -> Result<Option<JobId>, SchedulerError>
where
    R: Rule,
    L: RuleLookup<R>,
{
    if discovered.is_empty() {
        return Ok(None);
    }

    let (rule_name, dynamic_slots, forced, target) = {
        let job = arena
            .get(job_id)
            .ok_or_else(|| SchedulerError::rule_failed("<dynamic>", "ancestor job vanished"))?;
        let rule_name = job.rule_name.clone();
        let slots: Vec<usize> = match rules.rule_mut(&rule_name) {
            Some(rule) => job
                .input
                .iter()
                .enumerate()
                .filter(|(_, f)| rule.is_dynamic(f))
                .map(|(i, _)| i)
                .collect(),
            None => Vec::new(),
        };
        if slots.is_empty() {
            return Ok(None);
        }
        (rule_name, slots, job.forced, job.output.first().cloned())
    };

    let expanded: Vec<R::File> = discovered.iter().map(|(f, _)| f.clone()).collect();
    {
        let rule = rules
            .rule_mut(&rule_name)
            .ok_or_else(|| SchedulerError::rule_failed(&rule_name, "rule vanished"))?;
        // Reverse order: each splice shifts everything after it, so
        // working from the highest index down keeps earlier indices
        // valid.
        for index in dynamic_slots.iter().rev() {
            rule.set_dynamic_input(*index, expanded.clone());
        }
    }

    let new_root = {
        let rule = rules
            .rule_mut(&rule_name)
            .ok_or_else(|| SchedulerError::rule_failed(&rule_name, "rule vanished"))?;
        match rule.run(target.as_ref(), arena, forced) {
            Ok(id) => id,
            // Missing upstream files at this point just means the
            // expansion isn't ready yet; leave the ancestor untouched.
            Err(_) => return Ok(None),
        }
    };

    arena.splice_out(job_id);
    Ok(Some(new_root))
}

#[cfg(test)]
#[path = "dynamic_tests.rs"]
mod tests;
