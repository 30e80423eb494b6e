// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake [`Rule`] for deterministic testing, shared across crates via the
//! `test-support` feature.

use crate::error::SchedulerError;
use crate::job::{JobArena, JobConfig, Wildcards};
use crate::job_id::JobId;
use crate::iofile::{IOFile, LocalFile};
use crate::rule::{Payload, Rule};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// Recorded call to [`FakeRule::run`].
#[derive(Debug, Clone)]
pub enum RuleCall {
    Run { target: Option<PathBuf>, forcethis: bool },
}

struct FakeRuleState {
    calls: Vec<RuleCall>,
    run_error: Option<SchedulerError>,
    dynamic_inputs: Vec<(usize, Vec<LocalFile>)>,
    dynamic_discovery: std::collections::HashMap<usize, Vec<(LocalFile, Wildcards)>>,
}

/// A [`Rule`] implementation whose whole job subgraph is supplied up
/// front by the test, with its invocations recorded for assertions.
#[derive(Clone)]
pub struct FakeRule {
    name: String,
    input: Vec<LocalFile>,
    output: Vec<LocalFile>,
    dynamic_slots: Vec<bool>,
    dynamic_input_slots: Vec<bool>,
    threads: u32,
    lineno: Option<u32>,
    flags: JobFlags,
    writes_output: bool,
    config: Arc<Mutex<Option<FakeJobTemplate>>>,
    state: Arc<Mutex<FakeRuleState>>,
}

/// Scheduling flags a test wants the produced job to carry, overriding
/// the all-real-work defaults `FakeRule::run` otherwise builds.
#[derive(Debug, Clone, Copy)]
pub struct JobFlags {
    pub needrun: bool,
    pub pseudo: bool,
    pub touch: bool,
    pub dryrun: bool,
}

impl Default for JobFlags {
    fn default() -> Self {
        Self {
            needrun: true,
            pseudo: false,
            touch: false,
            dryrun: false,
        }
    }
}

/// A single job this rule produces when `run` is called, minus the id
/// (assigned fresh on insertion).
#[derive(Clone)]
pub struct FakeJobTemplate {
    pub depends: Vec<JobId>,
    pub wildcards: Wildcards,
    pub forced: bool,
}

impl FakeRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: Vec::new(),
            output: Vec::new(),
            dynamic_slots: Vec::new(),
            dynamic_input_slots: Vec::new(),
            threads: 1,
            lineno: Some(1),
            flags: JobFlags::default(),
            writes_output: false,
            config: Arc::new(Mutex::new(None)),
            state: Arc::new(Mutex::new(FakeRuleState {
                calls: Vec::new(),
                run_error: None,
                dynamic_inputs: Vec::new(),
                dynamic_discovery: std::collections::HashMap::new(),
            })),
        }
    }

    /// Configure what [`Rule::discover_dynamic`] reports for `output_index`.
    pub fn set_dynamic_discovery(&self, output_index: usize, found: Vec<(LocalFile, Wildcards)>) {
        self.state.lock().dynamic_discovery.insert(output_index, found);
    }

    pub fn with_input(mut self, input: Vec<LocalFile>) -> Self {
        self.dynamic_input_slots = vec![false; input.len()];
        self.input = input;
        self
    }

    pub fn with_dynamic_input_slot(mut self, index: usize) -> Self {
        if index < self.dynamic_input_slots.len() {
            self.dynamic_input_slots[index] = true;
        }
        self
    }

    pub fn with_output(mut self, output: Vec<LocalFile>) -> Self {
        self.dynamic_slots = vec![false; output.len()];
        self.output = output;
        self
    }

    pub fn with_dynamic_output_slot(mut self, index: usize) -> Self {
        if index < self.dynamic_slots.len() {
            self.dynamic_slots[index] = true;
        }
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_flags(mut self, flags: JobFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Make the produced job's payload actually create each declared
    /// output file, so tests exercising real execution see the output
    /// check in `created()` succeed.
    pub fn with_writes_output(mut self, writes_output: bool) -> Self {
        self.writes_output = writes_output;
        self
    }

    pub fn with_template(self, depends: Vec<JobId>, wildcards: Wildcards) -> Self {
        *self.config.lock() = Some(FakeJobTemplate {
            depends,
            wildcards,
            forced: false,
        });
        self
    }

    /// Replace the `depends` a subsequent `run()` call builds its job
    /// with, leaving `wildcards`/`forced` as previously configured.
    /// Shares state with every clone of this handle (see `FakeRule`'s
    /// `Arc<Mutex<_>>` fields), so a test can register a rule, let its
    /// first job get built with one dependency set, then rewire the
    /// template before a later `run()` call (e.g. the one dynamic
    /// expansion triggers) builds a different job.
    pub fn set_depends(&self, depends: Vec<JobId>) {
        let mut config = self.config.lock();
        match config.as_mut() {
            Some(template) => template.depends = depends,
            None => {
                *config = Some(FakeJobTemplate {
                    depends,
                    wildcards: Wildcards::new(),
                    forced: false,
                })
            }
        }
    }

    pub fn set_run_error(&self, err: SchedulerError) {
        self.state.lock().run_error = Some(err);
    }

    pub fn calls(&self) -> Vec<RuleCall> {
        self.state.lock().calls.clone()
    }

    pub fn dynamic_input_calls(&self) -> Vec<(usize, Vec<LocalFile>)> {
        self.state.lock().dynamic_inputs.clone()
    }
}

impl Rule for FakeRule {
    type File = LocalFile;

    fn name(&self) -> &str {
        &self.name
    }

    fn input(&self) -> &[Self::File] {
        &self.input
    }

    fn output(&self) -> &[Self::File] {
        &self.output
    }

    fn threads(&self) -> u32 {
        self.threads
    }

    fn lineno(&self) -> Option<u32> {
        self.lineno
    }

    fn snakefile(&self) -> Option<&std::path::Path> {
        None
    }

    fn is_dynamic(&self, file: &Self::File) -> bool {
        let in_output = self
            .output
            .iter()
            .position(|f| f.path() == file.path())
            .and_then(|i| self.dynamic_slots.get(i).copied())
            .unwrap_or(false);
        let in_input = self
            .input
            .iter()
            .position(|f| f.path() == file.path())
            .and_then(|i| self.dynamic_input_slots.get(i).copied())
            .unwrap_or(false);
        in_output || in_input
    }

    fn set_dynamic_input(&mut self, index: usize, expanded: Vec<Self::File>) {
        self.state
            .lock()
            .dynamic_inputs
            .push((index, expanded.clone()));
        if index < self.dynamic_input_slots.len() {
            self.dynamic_input_slots.remove(index);
            self.dynamic_input_slots
                .splice(index..index, std::iter::repeat(false).take(expanded.len()));
        }
        if index < self.input.len() {
            self.input.splice(index..index + 1, expanded);
        }
    }

    fn discover_dynamic(
        &self,
        output_index: usize,
    ) -> Result<Vec<(Self::File, Wildcards)>, SchedulerError> {
        Ok(self
            .state
            .lock()
            .dynamic_discovery
            .get(&output_index)
            .cloned()
            .unwrap_or_default())
    }

    fn payload(&self) -> Payload<Self::File> {
        if self.writes_output {
            Box::new(|_input, output, _wildcards, _threads, _log| {
                for file in output {
                    file.prepare().map_err(|e| e.to_string())?;
                    std::fs::write(file.path(), b"").map_err(|e| e.to_string())?;
                }
                Ok(())
            })
        } else {
            Box::new(|_input, _output, _wildcards, _threads, _log| Ok(()))
        }
    }

    fn run(
        &self,
        target: Option<&Self::File>,
        arena: &mut JobArena<Self::File>,
        forcethis: bool,
    ) -> Result<JobId, SchedulerError> {
        self.state.lock().calls.push(RuleCall::Run {
            target: target.map(|f| f.path().to_path_buf()),
            forcethis,
        });
        if let Some(err) = self.state.lock().run_error.clone() {
            return Err(err);
        }
        let template = self.config.lock().clone();
        let mut cfg = JobConfig::new(self.name.clone());
        cfg.input = self.input.clone();
        cfg.output = self.output.clone();
        cfg.output_dynamic = self.dynamic_slots.clone();
        cfg.threads = self.threads;
        cfg.needrun = self.flags.needrun;
        cfg.pseudo = self.flags.pseudo;
        cfg.touch = self.flags.touch;
        cfg.dryrun = self.flags.dryrun;
        cfg.forced = forcethis;
        if let Some(template) = template {
            cfg.depends = template.depends.into_iter().collect();
            cfg.wildcards = template.wildcards;
            cfg.forced = cfg.forced || template.forced;
        }
        Ok(arena.insert(cfg))
    }
}

#[cfg(test)]
#[path = "test_support_tests.rs"]
mod tests;
