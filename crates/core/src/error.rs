// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types surfaced by the scheduling core.
//!
//! All four kinds named in the design are variants of one enum so both
//! scheduler backends can propagate a single error type across the
//! worker-pool / watcher-thread boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Errors the scheduler can observe.
#[derive(Debug, Error, Clone)]
pub enum SchedulerError {
    /// A rule's payload failed, a declared output went missing, or a
    /// dynamic output could not be removed. Carries the source location
    /// within the user's workflow when one is known.
    #[error("error in rule {rule}{}: {message}", location_suffix(.file, .line))]
    RuleException {
        rule: String,
        message: String,
        file: Option<PathBuf>,
        line: Option<u32>,
    },

    /// A cluster job reported failure via its `.jobfailed` sentinel.
    #[error("cluster job for rule {rule} failed (jobid {jobid})")]
    ClusterJobException { rule: String, jobid: u64 },

    /// A declared non-dynamic output was absent after a rule finished
    /// running.
    #[error("missing output file {path} for rule {rule}")]
    MissingOutputException { rule: String, path: PathBuf },

    /// The scheduler was asked to stop by an external termination signal.
    #[error("scheduler terminated")]
    TerminatedException,
}

fn location_suffix(file: &Option<PathBuf>, line: &Option<u32>) -> String {
    match (file, line) {
        (Some(file), Some(line)) => format!(" ({}:{})", file.display(), line),
        (Some(file), None) => format!(" ({})", file.display()),
        _ => String::new(),
    }
}

impl SchedulerError {
    /// Build a `RuleException` with no known source location.
    pub fn rule_failed(rule: impl Into<String>, message: impl Into<String>) -> Self {
        SchedulerError::RuleException {
            rule: rule.into(),
            message: message.into(),
            file: None,
            line: None,
        }
    }

    /// Build a `RuleException` annotated with a source location, as
    /// `run_wrapper` does using the failing job's rule's
    /// `snakefile()`/`lineno()` when both are known.
    pub fn rule_failed_at(
        rule: impl Into<String>,
        message: impl Into<String>,
        file: PathBuf,
        line: u32,
    ) -> Self {
        SchedulerError::RuleException {
            rule: rule.into(),
            message: message.into(),
            file: Some(file),
            line: Some(line),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
