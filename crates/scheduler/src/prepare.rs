// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-run staging shared by both scheduler backends' `dispatch()`: before
//! a job's payload actually runs, stale dynamic-output files from a prior
//! run are removed, non-dynamic outputs' parent directories are staged,
//! and the log's parent directory is staged. Only the real-execution path
//! goes through this — dryrun, touch, and pseudo jobs never reach it.

use dagflow_core::{IOFile, Job, Rule, SchedulerError};

pub fn prepare_dispatch<R: Rule>(rule: &R, job: &Job<R::File>) -> Result<(), SchedulerError> {
    for (i, output) in job.output.iter().enumerate() {
        if job.output_dynamic_slots().get(i).copied().unwrap_or(false) {
            for (file, _wildcards) in rule.discover_dynamic(i)? {
                file.remove()?;
            }
        } else {
            output.prepare()?;
        }
    }
    if let Some(log) = &job.log {
        log.prepare()?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "prepare_tests.rs"]
mod tests;
