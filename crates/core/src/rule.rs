// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Rule` protocol: everything the scheduler needs from a parsed
//! workflow rule, without depending on how that rule was parsed.
//!
//! A concrete workflow loader (parsing rule definitions, resolving
//! wildcards, and so on is out of scope for this crate) implements this
//! trait once per rule definition. The scheduler only ever calls through
//! it.

use crate::error::SchedulerError;
use crate::iofile::IOFile;
use crate::job::{JobArena, Wildcards};
use crate::job_id::JobId;
use std::path::Path;

/// A rule's executable payload: the closure that performs the actual
/// work once inputs are ready.
///
/// This is an in-process callback rather than a native command — shelling
/// out is the "shell command execution primitive" the design explicitly
/// treats as an external collaborator. A loader that wants to run shell
/// commands wraps that call inside the closure it hands back here.
pub type Payload<F> = Box<
    dyn FnOnce(&[F], &[F], &crate::job::Wildcards, u32, Option<&F>) -> Result<(), String>
        + Send,
>;

/// Source of one rule's static definition and the factory that expands a
/// fresh job subgraph for it.
///
/// `R::File` is fixed per implementation: a workflow loader has exactly
/// one concrete file type, shared by every rule it produces, so the
/// scheduler can stay generic over a single `Rule` implementation for the
/// whole DAG rather than needing trait objects.
pub trait Rule: Send + Sync {
    type File: IOFile;

    fn name(&self) -> &str;

    /// The rule-level (unresolved) input file patterns.
    fn input(&self) -> &[Self::File];

    /// The rule-level (unresolved) output file patterns.
    fn output(&self) -> &[Self::File];

    fn threads(&self) -> u32;

    fn lineno(&self) -> Option<u32>;

    fn snakefile(&self) -> Option<&Path>;

    /// Whether the given rule-level file slot is a dynamic pattern.
    fn is_dynamic(&self, file: &Self::File) -> bool;

    /// Flip the dynamic flag on a rule-level input slot, and replace it
    /// with the concretized files expansion produced. Used only by
    /// dynamic expansion, which mutates the rule in place and is
    /// effectively single-producer.
    fn set_dynamic_input(&mut self, index: usize, expanded: Vec<Self::File>);

    /// List the concrete files a dynamic output slot actually produced,
    /// paired with the wildcard bindings each one resolves to. The
    /// underlying glob/pattern matching is the host workflow loader's
    /// job; the scheduler only needs the result to drive expansion.
    fn discover_dynamic(
        &self,
        output_index: usize,
    ) -> Result<Vec<(Self::File, Wildcards)>, SchedulerError>;

    /// Build the payload closure for one job invocation of this rule.
    fn payload(&self) -> Payload<Self::File>;

    /// Produce a fresh job subgraph rooted at `target` (or the rule's
    /// first output if `target` is `None`), inserting every new node into
    /// `arena` and returning the id of the root job.
    ///
    /// `forcethis` mirrors the external protocol's `forcethis` flag: the
    /// caller has explicitly demanded this job run regardless of
    /// staleness.
    fn run(
        &self,
        target: Option<&Self::File>,
        arena: &mut JobArena<Self::File>,
        forcethis: bool,
    ) -> Result<JobId, SchedulerError>;
}

/// Resolves a job's owning rule by name, for dynamic expansion — the only
/// place the scheduler needs to mutate a rule after DAG construction.
///
/// A workflow loader typically satisfies this with the same name-to-rule
/// map it used while building the DAG; `HashMap<String, R>` implements it
/// directly for that common case.
pub trait RuleLookup<R: Rule> {
    fn rule_mut(&mut self, name: &str) -> Option<&mut R>;
}

impl<R: Rule> RuleLookup<R> for std::collections::HashMap<String, R> {
    fn rule_mut(&mut self, name: &str) -> Option<&mut R> {
        self.get_mut(name)
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
