//! Resumable step orchestration.
//!
//! A [`BuildOrchestrator`] owns the [`BuildReport`] for one build target and
//! runs named steps against it. Every status transition is written to disk
//! before the orchestrator moves on, so an interrupted build can be
//! re-invoked and will skip straight to the first step that is not done.
//!
//! Step state machine: `pending -> running -> done | failed`. A done step is
//! never run again for the lifetime of its report. Failed steps, and steps
//! left `running` by a killed process, are retried on the next invocation.
//! Only one orchestrator may use a given report path at a time.

pub mod error;
pub mod report;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use indexmap::IndexSet;

use crate::env::EnvError;
use crate::util::fs::atomic_write;
use crate::util::process::ProcessError;

pub use error::ReportError;
pub use report::{now, BuildReport, StepRecord, StepStatus};

/// Runs steps and persists their outcome to a report file.
#[derive(Debug)]
pub struct BuildOrchestrator {
    path: PathBuf,
    report: BuildReport,
}

impl BuildOrchestrator {
    /// Bind to the report at `path` for the given ordered, unique step names.
    ///
    /// Steps already recorded at `path` keep their recorded state; steps new
    /// to this list start pending; recorded steps not in this list are
    /// dropped. A report file that exists but cannot be read as a report is
    /// an error, never a reason to start over.
    pub fn open<I, S>(path: impl Into<PathBuf>, steps: I) -> Result<Self, ReportError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = path.into();

        let mut names = IndexSet::new();
        for name in steps {
            let name = name.into();
            if names.contains(&name) {
                return Err(ReportError::DuplicateStep { name });
            }
            names.insert(name);
        }

        let mut report = BuildReport::new(names, now());

        if let Some(loaded) = BuildReport::load(&path)? {
            tracing::debug!("resuming build report {}", path.display());

            report.created_at = loaded.created_at;
            report.updated_at = loaded.updated_at;

            let mut previous = loaded.steps;
            for (name, record) in report.steps.iter_mut() {
                if let Some(prev) = previous.shift_remove(name) {
                    if prev.status == StepStatus::Running {
                        tracing::warn!(
                            "step `{}` was interrupted during a previous run and will be re-run",
                            name
                        );
                    }
                    *record = prev;
                }
            }

            for name in previous.keys() {
                tracing::debug!("dropping step `{}` not part of this build", name);
            }
        }

        Ok(BuildOrchestrator { path, report })
    }

    /// Path of the backing report file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Status of a registered step.
    pub fn status(&self, name: &str) -> Option<StepStatus> {
        self.report.get(name).map(|r| r.status)
    }

    /// Run one step unless it is already done.
    ///
    /// The step is marked running and persisted before `action` is called.
    /// When `action` fails, the failure is recorded and persisted and the
    /// very same error is returned to the caller.
    pub fn run_step<F>(&mut self, name: &str, action: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let status = self
            .status(name)
            .ok_or_else(|| ReportError::UnknownStep {
                name: name.to_string(),
            })?;

        if status == StepStatus::Done {
            tracing::info!("Skipping `{}` (already done)", name);
            return Ok(());
        }

        let started_at = now();
        self.record_mut(name)?.start(started_at);
        self.report.updated_at = started_at;
        self.save()?;

        tracing::info!("Running `{}`", name);
        let clock = Instant::now();
        let outcome = action();
        let duration = round_millis(clock.elapsed());

        let finished_at = now();
        match outcome {
            Ok(()) => {
                self.record_mut(name)?.finish(finished_at, duration, None);
                self.report.updated_at = finished_at;
                self.save()?;

                tracing::info!("Finished `{}` in {:.3}s", name, duration);
                Ok(())
            }
            Err(err) => {
                let message = describe_fault(&err);
                tracing::error!("step `{}` failed after {:.3}s: {}", name, duration, message);

                self.record_mut(name)?
                    .finish(finished_at, duration, Some(message));
                self.report.updated_at = finished_at;
                if let Err(save_err) = self.save() {
                    tracing::error!("could not record failure of `{}`: {:#}", name, save_err);
                }

                Err(err)
            }
        }
    }

    /// Write the report atomically, creating parent directories.
    pub fn save(&self) -> Result<(), ReportError> {
        let json = self.report.to_json()?;
        atomic_write(&self.path, json.as_bytes()).map_err(|source| ReportError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn record_mut(&mut self, name: &str) -> Result<&mut StepRecord, ReportError> {
        self.report
            .steps
            .get_mut(name)
            .ok_or_else(|| ReportError::UnknownStep {
                name: name.to_string(),
            })
    }
}

fn round_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}

/// Short `"<category>: <message>"` description of a step failure.
pub fn describe_fault(err: &anyhow::Error) -> String {
    let category = err
        .chain()
        .find_map(|cause| {
            if cause.is::<ProcessError>() {
                Some("ProcessError")
            } else if cause.is::<std::io::Error>() {
                Some("IoError")
            } else if cause.is::<ReportError>() {
                Some("ReportError")
            } else if cause.is::<EnvError>() {
                Some("EnvError")
            } else {
                None
            }
        })
        .unwrap_or("Error");

    format!("{}: {:#}", category, err)
}
