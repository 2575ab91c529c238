//! Implementation of `wheelwright status`.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::driver::{steps, REPORTS_DIR};
use crate::orchestrator::{BuildReport, StepRecord, StepStatus};
use crate::util::fs::glob_files;

/// Every report under `<build root>/reports`, sorted by name.
pub fn find_reports(build_root: &Path) -> Result<Vec<PathBuf>> {
    let dir = build_root.join(REPORTS_DIR);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    glob_files(&dir, "*.json")
}

/// Load a report that must exist.
pub fn load_report(path: &Path) -> Result<BuildReport> {
    match BuildReport::load(path)? {
        Some(report) => Ok(report),
        None => bail!("no build report at {}", path.display()),
    }
}

/// Render a report as a table of step, status, duration and error.
///
/// Known steps are listed in execution order, anything else after them.
pub fn format_report(name: &str, report: &BuildReport) -> String {
    let mut rows: Vec<(&str, &StepRecord)> =
        report.steps.iter().map(|(k, v)| (k.as_str(), v)).collect();
    rows.sort_by_key(|(step, _)| {
        steps::ALL
            .iter()
            .position(|known| known == step)
            .unwrap_or(steps::ALL.len())
    });

    let done = rows
        .iter()
        .filter(|(_, r)| r.status == StepStatus::Done)
        .count();
    let width = rows.iter().map(|(step, _)| step.len()).max().unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}/{} done, updated {})",
        name,
        done,
        rows.len(),
        report.updated_at.format("%Y-%m-%dT%H:%M:%S")
    );

    for (step, record) in rows {
        let duration = record
            .duration_sec
            .map(|d| format!("{:.3}s", d))
            .unwrap_or_default();
        let mut line = format!(
            "  {:<width$}  {:<7}  {:>10}",
            step,
            record.status.as_str(),
            duration,
            width = width
        );
        if let Some(error) = &record.error {
            line.push_str("  ");
            line.push_str(error.lines().next().unwrap_or_default());
        }
        let _ = writeln!(out, "{}", line.trim_end());
    }

    out
}

/// Report name shown in status output: the file stem.
pub fn report_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
