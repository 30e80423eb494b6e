// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Execution backends for running a scheduled job's payload: a local
//! thread pool and a cluster submit/poll loop.

pub mod cluster;
pub mod pool;
pub mod run_wrapper;

pub use cluster::{ClusterBackend, ClusterJobPaths, ClusterOutcome};
pub use pool::{ThreadWorkerPool, WorkerPool};
pub use run_wrapper::{run_wrapper, RunWrapper};
