// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job nodes and the arena that owns them.
//!
//! Jobs form a DAG via `depends`/`depending` edges, but Rust makes a
//! literal `Rc<RefCell<Job>>` graph of mutual references painful. Instead
//! the arena owns every `Job` by value, keyed by [`JobId`], and edges are
//! just ids into that arena.

use crate::error::SchedulerError;
use crate::iofile::IOFile;
use crate::job_id::JobId;
use crate::rule::Rule;
use std::collections::{BTreeMap, HashSet};

/// Resolved wildcard bindings for one job instance.
pub type Wildcards = BTreeMap<String, String>;

/// Inputs needed to construct a [`Job`]. Mirrors the fields the external
/// `Rule`/workflow loader resolves before handing a job to the scheduler.
pub struct JobConfig<F: IOFile> {
    pub rule_name: String,
    pub input: Vec<F>,
    pub output: Vec<F>,
    /// Parallel to `output`: whether the rule-level slot at this index is
    /// a dynamic pattern. Used only for message rendering and by
    /// `Job::run`'s dynamic-output removal step.
    pub output_dynamic: Vec<bool>,
    pub wildcards: Wildcards,
    pub threads: u32,
    pub log: Option<F>,
    pub shellcmd: Option<String>,
    pub message: Option<String>,
    pub reason: Option<String>,
    pub depends: HashSet<JobId>,
    pub needrun: bool,
    pub pseudo: bool,
    pub touch: bool,
    pub dryrun: bool,
    pub forced: bool,
    pub quiet: bool,
}

impl<F: IOFile> JobConfig<F> {
    /// A minimal config for a rule with no inputs/outputs/dependencies,
    /// useful as a starting point in tests.
    pub fn new(rule_name: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            input: Vec::new(),
            output: Vec::new(),
            output_dynamic: Vec::new(),
            wildcards: Wildcards::new(),
            threads: 1,
            log: None,
            shellcmd: None,
            message: None,
            reason: None,
            depends: HashSet::new(),
            needrun: true,
            pseudo: false,
            touch: false,
            dryrun: false,
            forced: false,
            quiet: false,
        }
    }
}

/// A node in the job DAG.
#[derive(Clone)]
pub struct Job<F: IOFile> {
    pub id: JobId,
    pub rule_name: String,
    pub input: Vec<F>,
    pub output: Vec<F>,
    output_dynamic: Vec<bool>,
    pub wildcards: Wildcards,
    pub threads: u32,
    pub log: Option<F>,
    pub shellcmd: Option<String>,
    pub message: Option<String>,
    pub reason: Option<String>,
    pub depends: HashSet<JobId>,
    pub depending: Vec<JobId>,
    pub needrun: bool,
    pub pseudo: bool,
    pub touch: bool,
    pub dryrun: bool,
    pub forced: bool,
    pub quiet: bool,
    pub ignore: bool,
    pub is_finished: bool,
}

impl<F: IOFile> Job<F> {
    fn dynamic_output(&self) -> bool {
        self.output_dynamic.iter().any(|d| *d)
    }

    /// Per-slot dynamic flags, parallel to `output`. Used by dynamic
    /// expansion to know which output indices to ask the owning rule to
    /// list concrete produced files for.
    pub fn output_dynamic_slots(&self) -> &[bool] {
        &self.output_dynamic
    }

    /// Render the human-readable description for this job: either the
    /// rule's message template (placeholders already substituted by the
    /// loader) or the default listing, then the shell command if present.
    pub fn get_message(&self) -> String {
        let mut msg = String::new();
        if !self.quiet {
            if let Some(message) = &self.message {
                msg.push_str(message);
            } else {
                msg.push_str("rule ");
                msg.push_str(&self.rule_name);
                if !self.input.is_empty() || !self.output.is_empty() {
                    msg.push(':');
                }
                if !self.input.is_empty() {
                    msg.push_str("\n\tinput: ");
                    msg.push_str(&join_annotated(&self.input, &[]));
                }
                if !self.output.is_empty() {
                    msg.push_str("\n\toutput: ");
                    msg.push_str(&join_annotated(&self.output, &self.output_dynamic));
                }
                if let Some(reason) = &self.reason {
                    msg.push_str("\n\t");
                    msg.push_str(reason);
                }
            }
        }
        if let Some(shellcmd) = &self.shellcmd {
            if !self.quiet {
                msg.push('\n');
            }
            msg.push_str(shellcmd);
        }
        msg
    }

    /// `new_wildcards()`: wildcard bindings present on this job but on
    /// none of its direct dependencies. DAG-visualization only.
    pub fn new_wildcards(&self, arena: &JobArena<F>) -> Vec<(String, String)> {
        let mut remaining: BTreeMap<String, String> = self.wildcards.clone();
        for dep_id in &self.depends {
            if remaining.is_empty() {
                return Vec::new();
            }
            if let Some(dep) = arena.get(*dep_id) {
                for (k, v) in &dep.wildcards {
                    if remaining.get(k) == Some(v) {
                        remaining.remove(k);
                    }
                }
            }
        }
        remaining.into_iter().collect()
    }
}

fn join_annotated<F: IOFile>(files: &[F], dynamic: &[bool]) -> String {
    files
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let mut s = f.to_string();
            if dynamic.get(i).copied().unwrap_or(false) {
                s.push_str(" (dynamic)");
            }
            if f.is_temp() {
                s.push_str(" (temporary)");
            }
            if f.is_protected() {
                s.push_str(" (protected)");
            }
            s
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Owns every [`Job`] in a DAG, keyed by [`JobId`].
///
/// Edge maintenance goes entirely through [`JobArena::insert`] and
/// [`JobArena::detach`] so the `b ∈ a.depends ⇔ a ∈ b.depending`
/// invariant is enforced by construction rather than by convention.
#[derive(Default)]
pub struct JobArena<F: IOFile> {
    jobs: std::collections::HashMap<JobId, Job<F>>,
}

impl<F: IOFile> JobArena<F> {
    pub fn new() -> Self {
        Self {
            jobs: std::collections::HashMap::new(),
        }
    }

    /// Insert a new job built from `config`, wiring up `depending` on
    /// every dependency it names. Returns the freshly assigned id.
    pub fn insert(&mut self, config: JobConfig<F>) -> JobId {
        let id = JobId::next();
        let depends = config.depends.clone();
        let job = Job {
            id,
            rule_name: config.rule_name,
            input: config.input,
            output: config.output,
            output_dynamic: config.output_dynamic,
            wildcards: config.wildcards,
            threads: config.threads,
            log: config.log,
            shellcmd: config.shellcmd,
            message: config.message,
            reason: config.reason,
            depends,
            depending: Vec::new(),
            needrun: config.needrun,
            pseudo: config.pseudo,
            touch: config.touch,
            dryrun: config.dryrun,
            forced: config.forced,
            quiet: config.quiet,
            ignore: false,
            is_finished: false,
        };
        for dep_id in &job.depends {
            if let Some(dep) = self.jobs.get_mut(dep_id) {
                dep.depending.push(id);
            }
        }
        self.jobs.insert(id, job);
        id
    }

    pub fn get(&self, id: JobId) -> Option<&Job<F>> {
        self.jobs.get(&id)
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job<F>> {
        self.jobs.get_mut(&id)
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    pub fn remove(&mut self, id: JobId) -> Option<Job<F>> {
        self.jobs.remove(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = JobId> + '_ {
        self.jobs.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Detach `id` from every job that depends on it, removing `id` from
    /// each dependent's `depends` set. Used when a job finishes (so its
    /// dependents can become ready) and when dynamic expansion splices a
    /// job out of the DAG.
    pub fn detach(&mut self, id: JobId) {
        let depending = self
            .jobs
            .get(&id)
            .map(|j| j.depending.clone())
            .unwrap_or_default();
        for dependent_id in depending {
            if let Some(dependent) = self.jobs.get_mut(&dependent_id) {
                dependent.depends.remove(&id);
            }
        }
    }

    /// Sever `id` from both its dependencies and its dependents, without
    /// removing the node itself — used by dynamic-expansion splicing: the
    /// originating job is cut out of the graph and marked `ignore` rather
    /// than deleted outright, since callbacks may still reference it.
    pub fn splice_out(&mut self, id: JobId) {
        let (depends, depending) = match self.jobs.get(&id) {
            Some(job) => (job.depends.clone(), job.depending.clone()),
            None => return,
        };
        for dep_id in &depends {
            if let Some(dep) = self.jobs.get_mut(dep_id) {
                dep.depending.retain(|d| d != &id);
            }
        }
        for dependent_id in &depending {
            if let Some(dependent) = self.jobs.get_mut(dependent_id) {
                dependent.depends.remove(&id);
            }
        }
        if let Some(job) = self.jobs.get_mut(&id) {
            job.depends.clear();
            job.depending.clear();
            job.ignore = true;
        }
    }

    /// Depth-first over `depends`: every job `id` transitively requires.
    pub fn descendants(&self, id: JobId) -> Vec<JobId> {
        let mut out = Vec::new();
        let mut stack: Vec<JobId> = self
            .jobs
            .get(&id)
            .map(|j| j.depends.iter().copied().collect())
            .unwrap_or_default();
        let mut seen: HashSet<JobId> = HashSet::new();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            if let Some(job) = self.jobs.get(&next) {
                stack.extend(job.depends.iter().copied());
            }
        }
        out
    }

    /// Breadth-first over `depending`: every job transitively requiring
    /// `id`.
    pub fn ancestors(&self, id: JobId) -> Vec<JobId> {
        let mut queue: std::collections::VecDeque<JobId> = self
            .jobs
            .get(&id)
            .map(|j| j.depending.iter().copied().collect())
            .unwrap_or_default();
        let mut seen: HashSet<JobId> = queue.iter().copied().collect();
        let mut out = Vec::new();
        while let Some(job_id) = queue.pop_front() {
            out.push(job_id);
            if let Some(job) = self.jobs.get(&job_id) {
                for next in &job.depending {
                    if seen.insert(*next) {
                        queue.push_back(*next);
                    }
                }
            }
        }
        out
    }
}

/// Remove every output file a not-yet-finished job declared — used both
/// on worker error and on global scheduler abort.
///
/// Dynamic output slots are patterns, not concrete paths: `rule` is
/// consulted via [`Rule::discover_dynamic`] to list whatever has actually
/// been produced under each dynamic slot so far, and those concrete files
/// are removed too. Pass `None` when no rule reference is available (e.g.
/// the rule has already been dropped); dynamic outputs are then left
/// untouched, same as before this took a rule.
pub fn cleanup<R: Rule>(job: &Job<R::File>, rule: Option<&R>) -> Result<(), SchedulerError> {
    if job.is_finished {
        return Ok(());
    }
    for (i, output) in job.output.iter().enumerate() {
        if job.output_dynamic.get(i).copied().unwrap_or(false) {
            if let Some(rule) = rule {
                for (file, _wildcards) in rule.discover_dynamic(i)? {
                    if file.is_protected() {
                        continue;
                    }
                    file.remove()?;
                }
            }
            continue;
        }
        if output.is_protected() {
            continue;
        }
        output.remove()?;
    }
    Ok(())
}

pub fn dynamic_output<F: IOFile>(job: &Job<F>) -> bool {
    job.dynamic_output()
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
