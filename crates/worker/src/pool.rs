// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local execution backend: runs a job's payload on a bounded pool of
//! OS threads.
//!
//! The external protocol picks between a process pool and a thread pool
//! depending on the platform; here the payload is always an in-process
//! `FnOnce` (see [`dagflow_core::Payload`]), so a process pool would buy
//! nothing but IPC overhead. [`ThreadWorkerPool`] is the only backend.

use dagflow_core::{JobId, SchedulerError};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;

/// Something that can run a unit of work concurrently, bounded by some
/// notion of capacity. The scheduler only ever submits jobs it has
/// already decided fit within the available capacity; the pool's own
/// bound is a second line of defense.
pub trait WorkerPool: Send + Sync {
    /// Run `work` on the pool, blocking the caller until a slot is free
    /// to accept it (queuing, not executing, is what blocks). `on_done`
    /// is invoked off the calling thread once `work` completes.
    fn submit(
        &self,
        job_id: JobId,
        work: Box<dyn FnOnce() -> Result<f64, SchedulerError> + Send>,
        on_done: Box<dyn FnOnce(JobId, Result<f64, SchedulerError>) + Send>,
    );

    fn capacity(&self) -> usize;
}

/// A [`WorkerPool`] backed by native OS threads, bounded to `max_workers`
/// concurrently running jobs.
pub struct ThreadWorkerPool {
    max_workers: usize,
    active: Arc<(Mutex<usize>, Condvar)>,
}

impl ThreadWorkerPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            active: Arc::new((Mutex::new(0), Condvar::new())),
        }
    }
}

impl WorkerPool for ThreadWorkerPool {
    fn submit(
        &self,
        job_id: JobId,
        work: Box<dyn FnOnce() -> Result<f64, SchedulerError> + Send>,
        on_done: Box<dyn FnOnce(JobId, Result<f64, SchedulerError>) + Send>,
    ) {
        {
            let (lock, cvar) = &*self.active;
            let mut active = lock.lock();
            while *active >= self.max_workers {
                cvar.wait(&mut active);
            }
            *active += 1;
        }

        let active = Arc::clone(&self.active);
        thread::spawn(move || {
            let result = work();
            {
                let (lock, cvar) = &*active;
                let mut active = lock.lock();
                *active -= 1;
                cvar.notify_one();
            }
            on_done(job_id, result);
        });
    }

    fn capacity(&self) -> usize {
        self.max_workers
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
