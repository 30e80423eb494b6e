// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster execution backend: submit a job as a standalone script via an
//! external submit command, then poll for sentinel files it leaves
//! behind instead of waiting on a process handle directly (the submit
//! command's own child is typically not the job itself — `qsub` and
//! friends hand the job to a remote scheduler and return immediately).

use dagflow_core::{IOFile, Job, SchedulerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

/// How often [`ClusterBackend::wait_for_sentinel`] checks for the
/// finished/failed sentinel files.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Paths of the script and sentinel files for one submitted job, derived
/// from its rule name and outputs the same way the reference cluster
/// scheduler names them: `.snakemake.<rule>.<outkey>.<suffix>`.
#[derive(Debug, Clone)]
pub struct ClusterJobPaths {
    pub script: PathBuf,
    pub finished: PathBuf,
    pub failed: PathBuf,
}

impl ClusterJobPaths {
    pub fn for_job<F: IOFile>(scriptpath: &Path, job: &Job<F>) -> Self {
        let prefix = format!(".snakemake.{}", job.rule_name);
        let jobid = job
            .output
            .iter()
            .map(|f| f.path().display().to_string().replace('/', "_"))
            .collect::<Vec<_>>()
            .join("_");
        Self {
            script: scriptpath.join(format!("{prefix}.{jobid}.sh")),
            finished: scriptpath.join(format!("{prefix}.{jobid}.jobfinished")),
            failed: scriptpath.join(format!("{prefix}.{jobid}.jobfailed")),
        }
    }
}

/// Submits jobs to an external batch scheduler and waits for their
/// sentinel files.
pub struct ClusterBackend {
    submitcmd: String,
    scriptpath: PathBuf,
}

impl ClusterBackend {
    pub fn new(submitcmd: impl Into<String>, scriptpath: impl Into<PathBuf>) -> Self {
        Self {
            submitcmd: submitcmd.into(),
            scriptpath: scriptpath.into(),
        }
    }

    /// Write the job script and hand it to the submit command. The
    /// script itself runs the workflow binary against this job's
    /// outputs and touches `jobfinished`/`jobfailed` depending on the
    /// exit code, exactly as the reference implementation's inline
    /// shell template does.
    pub fn submit<F: IOFile>(
        &self,
        job: &Job<F>,
        cores: Option<u32>,
        workdir: &Path,
        paths: &ClusterJobPaths,
    ) -> Result<(), SchedulerError> {
        std::fs::create_dir_all(&self.scriptpath).map_err(|e| {
            SchedulerError::rule_failed(
                &job.rule_name,
                format!("could not create script directory: {e}"),
            )
        })?;

        let input = render_file_list(&job.input);
        let output = render_file_list(&job.output);
        let cores_arg = cores.map(|c| c.to_string()).unwrap_or_default();
        let self_exe = std::env::current_exe().map_err(|e| {
            SchedulerError::rule_failed(&job.rule_name, format!("could not resolve own executable path: {e}"))
        })?;

        let mut script = String::new();
        script.push_str("#!/bin/sh\n");
        script.push_str(&format!("#rule: {}\n", job.rule_name));
        script.push_str(&format!("#input: {input}\n"));
        script.push_str(&format!("#output: {output}\n"));
        script.push_str(&format!(
            "{} --force -j{cores_arg} --directory {} --nocolor --quiet {output} && touch \"{}\" || touch \"{}\"\n",
            self_exe.display(),
            workdir.display(),
            paths.finished.display(),
            paths.failed.display(),
        ));

        let mut file = std::fs::File::create(&paths.script).map_err(|e| {
            SchedulerError::rule_failed(&job.rule_name, format!("could not write job script: {e}"))
        })?;
        file.write_all(script.as_bytes()).map_err(|e| {
            SchedulerError::rule_failed(&job.rule_name, format!("could not write job script: {e}"))
        })?;
        drop(file);

        set_executable(&paths.script)
            .map_err(|e| SchedulerError::rule_failed(&job.rule_name, e))?;

        let status = Command::new(&self.submitcmd)
            .arg(&paths.script)
            .status()
            .map_err(|e| {
                SchedulerError::rule_failed(
                    &job.rule_name,
                    format!("submit command {} failed to start: {e}", self.submitcmd),
                )
            })?;
        if !status.success() {
            return Err(SchedulerError::rule_failed(
                &job.rule_name,
                format!("submit command {} exited with {status}", self.submitcmd),
            ));
        }
        Ok(())
    }

    /// Block until either sentinel file appears, removing it and the
    /// script once seen. Runs on a dedicated thread per job in the
    /// caller, mirroring the reference implementation's
    /// one-thread-per-job wait loop.
    pub fn wait_for_sentinel(paths: &ClusterJobPaths) -> ClusterOutcome {
        loop {
            if paths.finished.exists() {
                let _ = std::fs::remove_file(&paths.finished);
                let _ = std::fs::remove_file(&paths.script);
                return ClusterOutcome::Finished;
            }
            if paths.failed.exists() {
                let _ = std::fs::remove_file(&paths.failed);
                let _ = std::fs::remove_file(&paths.script);
                return ClusterOutcome::Failed;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterOutcome {
    Finished,
    Failed,
}

fn render_file_list<F: IOFile>(files: &[F]) -> String {
    files
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = std::fs::metadata(path).map_err(|e| e.to_string())?;
    let mut perms = metadata.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), String> {
    Ok(())
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod tests;
