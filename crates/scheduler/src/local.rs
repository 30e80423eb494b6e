// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The local scheduling loop: repeatedly pick the knapsack-optimal set
//! of ready jobs under the available core budget and hand them to a
//! [`WorkerPool`], looping until the DAG drains or a job fails.
//!
//! [`LocalState::pending`]/`available_cores`/the `open` flag plus a
//! condvar stand in for a level-triggered "state may have changed"
//! signal, woken on every completion or error so a wakeup can never be
//! lost to a race with the flag being cleared.

use crate::dynamic;
use crate::knapsack;
use dagflow_core::{IOFile, Job, JobArena, JobId, Rule, RuleLookup, SchedulerError, WorkflowContext};
use dagflow_worker::{run_wrapper, RunWrapper, WorkerPool};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

struct LocalState<R: Rule> {
    arena: JobArena<R::File>,
    rules: HashMap<String, R>,
    pending: HashSet<JobId>,
    max_cores: u32,
    available_cores: u32,
    error: Option<SchedulerError>,
    terminated: bool,
    open: bool,
}

/// Local, in-process scheduler: the Rust analogue of the reference
/// `KnapsackJobScheduler`, dispatching ready jobs onto a
/// [`WorkerPool`] instead of a `concurrent.futures` executor.
pub struct LocalScheduler<R: Rule> {
    self_ref: Weak<Self>,
    workflow: Arc<dyn WorkflowContext>,
    pool: Arc<dyn WorkerPool>,
    state: Mutex<LocalState<R>>,
    cond: Condvar,
}

impl<R: Rule + 'static> LocalScheduler<R> {
    pub fn new(workflow: Arc<dyn WorkflowContext>, pool: Arc<dyn WorkerPool>, max_cores: u32) -> Arc<Self> {
        let max_cores = max_cores.max(1);
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            workflow,
            pool,
            state: Mutex::new(LocalState {
                arena: JobArena::new(),
                rules: HashMap::new(),
                pending: HashSet::new(),
                max_cores,
                available_cores: max_cores,
                error: None,
                terminated: false,
                open: true,
            }),
            cond: Condvar::new(),
        })
    }

    /// Register a rule's static definition so dynamic expansion can look
    /// it up and mutate it by name.
    pub fn add_rule(&self, rule: R) {
        self.state.lock().rules.insert(rule.name().to_string(), rule);
    }

    /// Build the job subgraph for `target` (or the rule's default
    /// output) via the named rule, and queue the resulting root job.
    pub fn add_target(
        &self,
        rule_name: &str,
        target: Option<&R::File>,
        forcethis: bool,
    ) -> Result<JobId, SchedulerError> {
        let mut state = self.state.lock();
        let root = {
            let rule = state.rules.rule_mut(rule_name).ok_or_else(|| {
                SchedulerError::rule_failed(rule_name, "no such rule registered")
            })?;
            rule.run(target, &mut state.arena, forcethis)?
        };
        self.queue(&mut state, [root]);
        Ok(root)
    }

    /// Queue already-inserted job ids for dispatch, matching
    /// `KnapsackJobScheduler.add_jobs`.
    pub fn add_jobs(&self, ids: impl IntoIterator<Item = JobId>) {
        let mut state = self.state.lock();
        self.queue(&mut state, ids);
    }

    fn queue(&self, state: &mut LocalState<R>, ids: impl IntoIterator<Item = JobId>) {
        for id in ids {
            state.pending.insert(id);
        }
        state.open = true;
        self.cond.notify_all();
    }

    /// Ask the scheduler to stop after currently running jobs finish.
    pub fn terminate(&self) {
        let mut state = self.state.lock();
        state.terminated = true;
        state.open = true;
        self.cond.notify_all();
    }

    pub fn job(&self, id: JobId) -> Option<Job<R::File>> {
        self.state.lock().arena.get(id).cloned()
    }

    fn handle(&self) -> Arc<Self> {
        self.self_ref
            .upgrade()
            .expect("scheduler dropped while still scheduling")
    }

    /// Run the scheduling loop to completion: `Ok(())` once every job is
    /// finished, `Err` on the first job failure or on `terminate()`.
    pub fn schedule(&self) -> Result<(), SchedulerError> {
        loop {
            let mut state = self.state.lock();
            while !state.open {
                self.cond.wait(&mut state);
            }
            state.open = false;

            if state.terminated {
                return Err(SchedulerError::TerminatedException);
            }
            if let Some(err) = state.error.take() {
                tracing::warn!("exiting after currently running jobs finish");
                return Err(err);
            }
            if state.pending.is_empty() {
                return Ok(());
            }

            let mut needrun_ids = Vec::new();
            let mut norun_ids = Vec::new();
            for &id in &state.pending {
                let job = state
                    .arena
                    .get(id)
                    .expect("pending job id must still be present in the arena");
                if !job.depends.is_empty() {
                    continue;
                }
                if job.needrun && !job.pseudo && !job.ignore {
                    needrun_ids.push(id);
                } else {
                    norun_ids.push(id);
                }
            }

            let max_cores = state.max_cores;
            for &id in &needrun_ids {
                let job = state.arena.get_mut(id).expect("job id still valid");
                if job.threads > max_cores {
                    if !job.dryrun {
                        tracing::warn!(
                            rule = %job.rule_name,
                            requested = job.threads,
                            available = max_cores,
                            "scaling down thread request to fit available cores"
                        );
                    }
                    job.threads = max_cores;
                }
            }

            let refs: Vec<&Job<R::File>> = needrun_ids
                .iter()
                .map(|&id| state.arena.get(id).expect("job id still valid"))
                .collect();
            let selected = knapsack::select(&refs, state.available_cores);
            let run_ids: Vec<JobId> = selected.iter().map(|&i| needrun_ids[i]).collect();

            for id in run_ids.iter().chain(norun_ids.iter()) {
                state.pending.remove(id);
            }
            let threads_used: u32 = run_ids
                .iter()
                .map(|id| state.arena.get(*id).expect("job id still valid").threads)
                .sum();
            state.available_cores -= threads_used;

            let mut to_dispatch = run_ids;
            to_dispatch.extend(norun_ids);

            drop(state);

            for id in to_dispatch {
                self.dispatch(id);
            }
        }
    }

    fn dispatch(&self, id: JobId) {
        let snapshot = self.job(id).expect("dispatched job must exist");

        if !snapshot.needrun || snapshot.pseudo || snapshot.ignore {
            self.settle(id, None);
            return;
        }
        if snapshot.dryrun {
            tracing::info!("{}", snapshot.get_message());
            self.settle(id, None);
            return;
        }
        if snapshot.touch {
            tracing::info!("{}", snapshot.get_message());
            for output in &snapshot.output {
                if let Err(err) = output.touch(&snapshot.rule_name, None, None) {
                    self.fail(id, err);
                    return;
                }
            }
            std::thread::sleep(Duration::from_millis(100));
            self.settle(id, None);
            return;
        }

        let description = snapshot.get_message();
        let (payload, snakefile, lineno) = {
            let mut state = self.state.lock();
            match state.rules.rule_mut(&snapshot.rule_name) {
                Some(rule) => {
                    if let Err(err) = crate::prepare::prepare_dispatch(rule, &snapshot) {
                        drop(state);
                        self.fail(id, err);
                        return;
                    }
                    let snakefile = rule.snakefile().map(|p| p.to_path_buf());
                    (rule.payload(), snakefile, rule.lineno())
                }
                None => {
                    drop(state);
                    self.fail(
                        id,
                        SchedulerError::rule_failed(&snapshot.rule_name, "rule no longer registered"),
                    );
                    return;
                }
            }
        };

        let scheduler = self.handle();
        self.pool.submit(
            id,
            Box::new(move || {
                run_wrapper(
                    &snapshot,
                    RunWrapper {
                        payload,
                        description: &description,
                        snakefile: snakefile.as_deref(),
                        lineno,
                    },
                )
            }),
            Box::new(move |job_id, result| match result {
                Ok(runtime) => scheduler.settle(job_id, Some(runtime)),
                Err(err) => scheduler.fail(job_id, err),
            }),
        );
    }

    /// Mark a job finished successfully (or trivially, for pseudo/dryrun
    /// jobs where `runtime` is `None`), check its outputs, detach it from
    /// dependents, and re-open the queue.
    fn settle(&self, id: JobId, runtime: Option<f64>) {
        let mut new_jobs = Vec::new();
        {
            let mut state = self.state.lock();
            let needs_output_check = {
                let job = state.arena.get(id).expect("settled job must exist");
                !job.dryrun && job.needrun && !job.pseudo && !job.ignore
            };
            if needs_output_check {
                let (rule_name, outputs, inputs): (String, Vec<R::File>, Vec<R::File>) = {
                    let job = state.arena.get(id).expect("settled job must exist");
                    (job.rule_name.clone(), job.output.clone(), job.input.clone())
                };
                let dynamic_flags = state
                    .arena
                    .get(id)
                    .map(|j| j.output_dynamic_slots().to_vec())
                    .unwrap_or_default();
                let mut check_error = None;
                for (i, output) in outputs.iter().enumerate() {
                    if dynamic_flags.get(i).copied().unwrap_or(false) {
                        continue;
                    }
                    if let Err(err) = output.created(&rule_name, None, None) {
                        check_error = Some(err);
                        break;
                    }
                }
                if let Some(err) = check_error {
                    drop(state);
                    self.fail(id, err);
                    return;
                }
                for input in &inputs {
                    input.used();
                }
                if let Some(seconds) = runtime {
                    self.workflow.jobcounter().increment();
                    self.workflow.report_runtime(&rule_name, seconds);
                }
            }

            if let Some(job) = state.arena.get_mut(id) {
                job.is_finished = true;
            }
            if !state.arena.get(id).map(|j| j.ignore).unwrap_or(true) {
                state.arena.detach(id);

                let dynamic = state
                    .arena
                    .get(id)
                    .map(dagflow_core::dynamic_output)
                    .unwrap_or(false);
                if dynamic {
                    match dynamic::handle_dynamic_output(
                        &mut state.arena,
                        &mut state.rules,
                        id,
                        self.workflow.jobcounter(),
                    ) {
                        Ok(added) => new_jobs = added,
                        Err(err) => {
                            drop(state);
                            self.fail(id, err);
                            return;
                        }
                    }
                }
            }

            if was_core_debited(&state, id) {
                state.available_cores += snapshot_threads(&state, id);
            }
            state.pending.extend(new_jobs.iter().copied());
            state.open = true;
        }
        self.cond.notify_all();
    }

    fn fail(&self, id: JobId, err: SchedulerError) {
        tracing::error!(job = %id, error = %err, "job failed");
        let mut state = self.state.lock();
        if let Some(job) = state.arena.get(id).cloned() {
            let rule = state.rules.rule_mut(&job.rule_name).map(|r| &*r);
            if let Err(cleanup_err) = dagflow_core::cleanup(&job, rule) {
                tracing::warn!(job = %id, error = %cleanup_err, "cleanup after failure did not fully succeed");
            }
        }
        state.pending.clear();
        if state.error.is_none() {
            state.error = Some(err);
        }
        state.open = true;
        drop(state);
        self.cond.notify_all();
    }
}

/// Whether `id` went through the knapsack debit in `schedule()` — the
/// same `needrun && !pseudo && !ignore` test that sorts it into
/// `needrun_ids` rather than `norun_ids` there. Settling a job that never
/// passed this test must not credit cores back, or `available_cores`
/// drifts past `max_cores`.
fn was_core_debited<R: Rule>(state: &LocalState<R>, id: JobId) -> bool {
    state
        .arena
        .get(id)
        .map(|j| j.needrun && !j.pseudo && !j.ignore)
        .unwrap_or(false)
}

fn snapshot_threads<R: Rule>(state: &LocalState<R>, id: JobId) -> u32 {
    state.arena.get(id).map(|j| j.threads).unwrap_or(0)
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
