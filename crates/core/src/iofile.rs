// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File handle abstraction consumed by jobs.
//!
//! `IOFile` is the seam between the scheduler and whatever owns real file
//! semantics (staleness checks, wildcard-pattern matching, temp/protected
//! bookkeeping). [`LocalFile`] is a concrete, filesystem-backed
//! implementation good enough for tests and for embedding this scheduler
//! without a full workflow loader; a real loader is free to bring its own.

use crate::error::SchedulerError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A handle to a file a job reads or writes.
///
/// Implementations are expected to be cheap to clone (most will just wrap
/// a `PathBuf` plus a couple of flags) since jobs copy their input/output
/// lists around freely.
pub trait IOFile: fmt::Debug + fmt::Display + Clone + Send + Sync + 'static {
    /// Ensure the parent directory exists.
    fn prepare(&self) -> Result<(), SchedulerError>;

    /// Update the file's mtime without running the rule that produces it.
    fn touch(&self, rule: &str, line: Option<u32>, file: Option<&Path>) -> Result<(), SchedulerError>;

    /// Remove the file. Idempotent: removing an absent file is not an
    /// error (it may already have been cleaned up by a previous attempt).
    fn remove(&self) -> Result<(), SchedulerError>;

    /// Post-success bookkeeping for an output file. May fail with
    /// `MissingOutputException` if the file is not actually present.
    fn created(&self, rule: &str, line: Option<u32>, file: Option<&Path>) -> Result<(), SchedulerError>;

    /// Post-success bookkeeping for an input file.
    fn used(&self);

    fn is_temp(&self) -> bool;
    fn is_protected(&self) -> bool;

    /// The path this handle refers to, for display and sentinel naming.
    fn path(&self) -> &Path;
}

/// A filesystem-backed [`IOFile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
    temp: bool,
    protected: bool,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temp: false,
            protected: false,
        }
    }

    /// Mirrors `IOFile.create(path, temp, protected)` from the external
    /// protocol: build a handle with explicit flags, used by dynamic
    /// expansion when concretizing a pattern match.
    pub fn create(path: impl Into<PathBuf>, temp: bool, protected: bool) -> Self {
        Self {
            path: path.into(),
            temp,
            protected,
        }
    }

    pub fn with_temp(mut self, temp: bool) -> Self {
        self.temp = temp;
        self
    }

    pub fn with_protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }
}

impl fmt::Display for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl IOFile for LocalFile {
    fn prepare(&self) -> Result<(), SchedulerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SchedulerError::rule_failed(
                        "<prepare>",
                        format!("could not create directory {}: {e}", parent.display()),
                    )
                })?;
            }
        }
        Ok(())
    }

    fn touch(
        &self,
        rule: &str,
        line: Option<u32>,
        file: Option<&Path>,
    ) -> Result<(), SchedulerError> {
        self.prepare()?;
        let now = filetime::FileTime::from_system_time(SystemTime::now());
        if !self.path.exists() {
            std::fs::File::create(&self.path).map_err(|e| error_at(rule, line, file, e))?;
        }
        filetime::set_file_mtime(&self.path, now).map_err(|e| error_at(rule, line, file, e))?;
        Ok(())
    }

    fn remove(&self) -> Result<(), SchedulerError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SchedulerError::rule_failed(
                "<cleanup>",
                format!("could not remove {}: {e}", self.path.display()),
            )),
        }
    }

    fn created(
        &self,
        rule: &str,
        _line: Option<u32>,
        _file: Option<&Path>,
    ) -> Result<(), SchedulerError> {
        if !self.path.exists() {
            return Err(SchedulerError::MissingOutputException {
                rule: rule.to_string(),
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    fn used(&self) {}

    fn is_temp(&self) -> bool {
        self.temp
    }

    fn is_protected(&self) -> bool {
        self.protected
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

fn error_at(
    rule: &str,
    line: Option<u32>,
    file: Option<&Path>,
    e: std::io::Error,
) -> SchedulerError {
    match (file, line) {
        (Some(file), Some(line)) => {
            SchedulerError::rule_failed_at(rule, e.to_string(), file.to_path_buf(), line)
        }
        _ => SchedulerError::rule_failed(rule, e.to_string()),
    }
}

#[cfg(test)]
#[path = "iofile_tests.rs"]
mod tests;
