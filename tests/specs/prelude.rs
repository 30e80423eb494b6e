// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers for end-to-end scheduler behavior.
//!
//! `dagflow` is a library, not a CLI, so these helpers drive the public
//! scheduler API directly rather than shelling out to a binary.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use dagflow_core::test_support::FakeRule;
use dagflow_core::SimpleWorkflow;
use dagflow_scheduler::LocalScheduler;
use dagflow_worker::ThreadWorkerPool;
use std::sync::Arc;

/// A [`LocalScheduler`] over [`FakeRule`] backed by a real thread pool,
/// with `cores` as both the worker pool size and the core budget.
pub fn local_scheduler(cores: u32) -> Arc<LocalScheduler<FakeRule>> {
    let workflow = Arc::new(SimpleWorkflow::new(cores, std::env::temp_dir(), 0));
    let pool = Arc::new(ThreadWorkerPool::new(cores as usize));
    LocalScheduler::new(workflow, pool, cores)
}

/// Same as [`local_scheduler`] but also returns the [`SimpleWorkflow`] so
/// tests can inspect `jobcounter()`/`runtimes()` after the run.
pub fn local_scheduler_with_workflow(cores: u32) -> (Arc<LocalScheduler<FakeRule>>, Arc<SimpleWorkflow>) {
    let workflow = Arc::new(SimpleWorkflow::new(cores, std::env::temp_dir(), 0));
    let pool = Arc::new(ThreadWorkerPool::new(cores as usize));
    let scheduler = LocalScheduler::new(workflow.clone(), pool, cores);
    (scheduler, workflow)
}
