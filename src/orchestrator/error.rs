//! Orchestrator errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the report bookkeeping itself, never of a step action.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("build report {} is corrupt; inspect or delete it before re-running", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("build report {} has an invalid entry for step `{step}`: {reason}", path.display())]
    Invalid {
        path: PathBuf,
        step: String,
        reason: String,
    },

    #[error("step `{name}` is listed more than once")]
    DuplicateStep { name: String },

    #[error("step `{name}` is not registered with this build")]
    UnknownStep { name: String },

    #[error("failed to read build report {}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write build report {}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize build report")]
    Serialize(#[from] serde_json::Error),
}
