// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `run_wrapper`: the boundary between a scheduled [`Job`] and the
//! payload closure a [`Rule`] hands back for it.
//!
//! Handles directory creation, timing, and translating a payload
//! failure into a [`SchedulerError::RuleException`] so the scheduler
//! never has to know how a job's body reports errors.

use dagflow_core::{IOFile, Job, Payload, SchedulerError};
use std::path::Path;
use std::time::Instant;

/// Everything `run_wrapper` needs besides the job itself: the payload
/// closure, a human-readable description logged before it runs, and the
/// rule's static source location (its `Rule::snakefile()`/`lineno()`) so a
/// payload failure can be annotated the same way the scheduler's own
/// dispatch-time errors are.
pub struct RunWrapper<'a, F: IOFile> {
    pub payload: Payload<F>,
    pub description: &'a str,
    pub snakefile: Option<&'a Path>,
    pub lineno: Option<u32>,
}

/// Run one job's payload to completion, returning the measured wall-clock
/// runtime in seconds on success.
///
/// Mirrors the external protocol's `run_wrapper`: log the description,
/// prepare output directories, invoke the payload, and on failure wrap
/// whatever the payload reported into a `RuleException`.
pub fn run_wrapper<F: IOFile>(
    job: &Job<F>,
    wrapper: RunWrapper<'_, F>,
) -> Result<f64, SchedulerError> {
    tracing::info!(rule = %job.rule_name, "{}", wrapper.description);

    for output in &job.output {
        output.prepare()?;
    }

    let started = Instant::now();
    let log_file = job.log.as_ref();
    let result = (wrapper.payload)(&job.input, &job.output, &job.wildcards, job.threads, log_file);
    let elapsed = started.elapsed().as_secs_f64();

    match result {
        Ok(()) => Ok(elapsed),
        Err(message) => match (wrapper.snakefile, wrapper.lineno) {
            (Some(file), Some(line)) => Err(SchedulerError::rule_failed_at(
                &job.rule_name,
                message,
                file.to_path_buf(),
                line,
            )),
            _ => Err(SchedulerError::rule_failed(&job.rule_name, message)),
        },
    }
}

#[cfg(test)]
#[path = "run_wrapper_tests.rs"]
mod tests;
