// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cluster scheduling loop: hand every ready job to an external
//! batch submit command and wait for its sentinel file, instead of
//! bounding concurrency locally the way [`crate::local::LocalScheduler`]
//! does.
//!
//! Grounded in the reference `ClusterJobScheduler`: unlike the local
//! scheduler, core budget is not enforced here — the external batch
//! system is the thing deciding how many jobs actually run at once, so
//! every job whose dependencies are satisfied is dispatched immediately.

use crate::dynamic;
use dagflow_core::{IOFile, Job, JobArena, JobId, Rule, RuleLookup, SchedulerError, WorkflowContext};
use dagflow_worker::{ClusterBackend, ClusterJobPaths, ClusterOutcome};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Weak};

struct ClusterState<R: Rule> {
    arena: JobArena<R::File>,
    rules: HashMap<String, R>,
    pending: HashSet<JobId>,
    error: Option<SchedulerError>,
    terminated: bool,
    open: bool,
}

/// Cluster scheduler: the Rust analogue of the reference
/// `ClusterJobScheduler`, dispatching every ready job to an external
/// batch submit command and reconciling on its sentinel file.
pub struct ClusterScheduler<R: Rule> {
    self_ref: Weak<Self>,
    workflow: Arc<dyn WorkflowContext>,
    backend: ClusterBackend,
    workdir: PathBuf,
    cores: Option<u32>,
    state: Mutex<ClusterState<R>>,
    cond: Condvar,
}

impl<R: Rule + 'static> ClusterScheduler<R> {
    pub fn new(
        workflow: Arc<dyn WorkflowContext>,
        submitcmd: impl Into<String>,
        workdir: impl Into<PathBuf>,
        cores: Option<u32>,
    ) -> Arc<Self> {
        let workdir = workdir.into();
        let scriptpath = workflow.scriptpath().to_path_buf();
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            workflow,
            backend: ClusterBackend::new(submitcmd, scriptpath),
            workdir,
            cores,
            state: Mutex::new(ClusterState {
                arena: JobArena::new(),
                rules: HashMap::new(),
                pending: HashSet::new(),
                error: None,
                terminated: false,
                open: true,
            }),
            cond: Condvar::new(),
        })
    }

    pub fn add_rule(&self, rule: R) {
        self.state.lock().rules.insert(rule.name().to_string(), rule);
    }

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
        state.pending.insert(root);
        state.open = true;
        drop(state);
        self.cond.notify_all();
        Ok(root)
    }

    pub fn terminate(&self) {
        let mut state = self.state.lock();
        state.terminated = true;
        state.open = true;
        drop(state);
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
                tracing::warn!("exiting after currently running cluster jobs finish");
                return Err(err);
            }
            if state.pending.is_empty() {
                return Ok(());
            }

            let mut ready = Vec::new();
            for &id in &state.pending {
                let job = state
                    .arena
                    .get(id)
                    .expect("pending job id must still be present in the arena");
                if job.depends.is_empty() {
                    ready.push(id);
                }
            }
            for id in &ready {
                state.pending.remove(id);
            }
            drop(state);

            for id in ready {
                self.dispatch(id);
            }
        }
    }

    fn dispatch(&self, id: JobId) {
        let snapshot = self.job(id).expect("dispatched job must exist");

        if !snapshot.needrun || snapshot.pseudo || snapshot.ignore {
            self.settle(id);
            return;
        }
        if snapshot.dryrun {
            tracing::info!("{}", snapshot.get_message());
            self.settle(id);
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
            self.settle(id);
            return;
        }

        {
            let mut state = self.state.lock();
            let prepared = match state.rules.rule_mut(&snapshot.rule_name) {
                Some(rule) => crate::prepare::prepare_dispatch(rule, &snapshot),
                None => Err(SchedulerError::rule_failed(
                    &snapshot.rule_name,
                    "rule no longer registered",
                )),
            };
            drop(state);
            if let Err(err) = prepared {
                self.fail(id, err);
                return;
            }
        }

        let paths = ClusterJobPaths::for_job(self.workflow.scriptpath(), &snapshot);
        if let Err(err) = self
            .backend
            .submit(&snapshot, self.cores, &self.workdir, &paths)
        {
            self.fail(id, err);
            return;
        }

        let scheduler = self.handle();
        std::thread::spawn(move || match ClusterBackend::wait_for_sentinel(&paths) {
            ClusterOutcome::Finished => scheduler.settle(id),
            ClusterOutcome::Failed => scheduler.fail(
                id,
                SchedulerError::ClusterJobException {
                    rule: scheduler
                        .job(id)
                        .map(|j| j.rule_name)
                        .unwrap_or_else(|| "<unknown>".to_string()),
                    jobid: id.as_u64(),
                },
            ),
        });
    }

    fn settle(&self, id: JobId) {
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
                self.workflow.jobcounter().increment();
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

            state.pending.extend(new_jobs.iter().copied());
            state.open = true;
        }
        self.cond.notify_all();
    }

    fn fail(&self, id: JobId, err: SchedulerError) {
        tracing::error!(job = %id, error = %err, "cluster job failed");
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

#[cfg(test)]
#[path = "cluster_scheduler_tests.rs"]
mod tests;
