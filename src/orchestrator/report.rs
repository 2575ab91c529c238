//! The persisted build report.
//!
//! On disk the report is pretty-printed JSON with every object's keys in
//! sorted order, so identical state always produces identical bytes.
//! In memory, steps keep the declaration order of the current run.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Local, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

use super::ReportError;

/// Current local time at second precision.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Status of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Done => "done",
            StepStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Fields are declared alphabetically; serde emits them in declaration order.
/// Persisted state of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    #[serde(default)]
    pub duration_sec: Option<f64>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default, with = "timestamp::option")]
    pub finished_at: Option<NaiveDateTime>,

    #[serde(default, with = "timestamp::option")]
    pub started_at: Option<NaiveDateTime>,

    pub status: StepStatus,
}

impl StepRecord {
    /// A step that has never run.
    pub fn pending() -> Self {
        StepRecord {
            duration_sec: None,
            error: None,
            finished_at: None,
            started_at: None,
            status: StepStatus::Pending,
        }
    }

    /// Enter `Running`, discarding the outcome of any earlier attempt.
    pub(crate) fn start(&mut self, at: NaiveDateTime) {
        self.status = StepStatus::Running;
        self.started_at = Some(at);
        self.finished_at = None;
        self.duration_sec = None;
        self.error = None;
    }

    pub(crate) fn finish(&mut self, at: NaiveDateTime, duration_sec: f64, error: Option<String>) {
        self.status = if error.is_some() {
            StepStatus::Failed
        } else {
            StepStatus::Done
        };
        self.finished_at = Some(at);
        self.duration_sec = Some(duration_sec);
        self.error = error;
    }

    /// Check the field invariants for the current status.
    pub fn check(&self) -> Result<(), String> {
        let started = self.started_at.is_some();
        let finished = self.finished_at.is_some();

        match self.status {
            StepStatus::Pending => {
                if started || finished || self.duration_sec.is_some() || self.error.is_some() {
                    return Err("pending step carries run data".to_string());
                }
            }
            StepStatus::Running => {
                if !started || finished {
                    return Err("running step needs started_at and no finished_at".to_string());
                }
            }
            StepStatus::Done => {
                if !started || !finished || self.duration_sec.is_none() || self.error.is_some() {
                    return Err("done step needs both timestamps, a duration and no error".to_string());
                }
            }
            StepStatus::Failed => {
                if !started || !finished || self.duration_sec.is_none() || self.error.is_none() {
                    return Err("failed step needs both timestamps, a duration and an error".to_string());
                }
            }
        }

        if let Some(duration) = self.duration_sec {
            if !duration.is_finite() || duration < 0.0 {
                return Err(format!("invalid duration {duration}"));
            }
        }

        Ok(())
    }
}

/// Orchestrator state for one build target.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuildReport {
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,

    #[serde(with = "timestamp")]
    pub updated_at: NaiveDateTime,

    pub steps: IndexMap<String, StepRecord>,
}

impl BuildReport {
    /// An all-pending report for `names`, in order.
    pub fn new<I, S>(names: I, at: NaiveDateTime) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BuildReport {
            created_at: at,
            updated_at: at,
            steps: names
                .into_iter()
                .map(|n| (n.into(), StepRecord::pending()))
                .collect(),
        }
    }

    /// Load a report, or `None` if no file exists at `path`.
    pub fn load(path: &Path) -> Result<Option<Self>, ReportError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ReportError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let report: BuildReport =
            serde_json::from_str(&contents).map_err(|source| ReportError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        for (name, record) in &report.steps {
            record.check().map_err(|reason| ReportError::Invalid {
                path: path.to_path_buf(),
                step: name.clone(),
                reason,
            })?;
        }

        Ok(Some(report))
    }

    /// Serialized file contents.
    pub fn to_json(&self) -> Result<String, ReportError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn get(&self, name: &str) -> Option<&StepRecord> {
        self.steps.get(name)
    }

    /// Whether every step is done.
    pub fn is_complete(&self) -> bool {
        self.steps.values().all(|r| r.status == StepStatus::Done)
    }
}

impl Serialize for BuildReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct SortedReport<'a> {
            created_at: String,
            steps: BTreeMap<&'a str, &'a StepRecord>,
            updated_at: String,
        }

        SortedReport {
            created_at: self.created_at.format(timestamp::FORMAT).to_string(),
            steps: self.steps.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            updated_at: self.updated_at.format(timestamp::FORMAT).to_string(),
        }
        .serialize(serializer)
    }
}

/// `YYYY-MM-DDTHH:MM:SS` local timestamps.
mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(d)?;
        parse(&text).map_err(de::Error::custom)
    }

    /// Accepts fractional seconds so hand-edited files still load.
    fn parse(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(text) => parse(&text).map(Some).map_err(de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_file_format() {
        let mut report = BuildReport::new(["build", "package"], at(9, 0, 0));
        let build = report.steps.get_mut("build").unwrap();
        build.start(at(9, 0, 1));
        build.finish(at(9, 2, 3), 122.25, None);
        report.updated_at = at(9, 2, 3);

        let expected = r#"{
  "created_at": "2024-05-17T09:00:00",
  "steps": {
    "build": {
      "duration_sec": 122.25,
      "error": null,
      "finished_at": "2024-05-17T09:02:03",
      "started_at": "2024-05-17T09:00:01",
      "status": "done"
    },
    "package": {
      "duration_sec": null,
      "error": null,
      "finished_at": null,
      "started_at": null,
      "status": "pending"
    }
  },
  "updated_at": "2024-05-17T09:02:03"
}
"#;
        assert_eq!(report.to_json().unwrap(), expected);
    }

    #[test]
    fn test_step_keys_sorted_on_disk_only() {
        let report = BuildReport::new(["zeta", "alpha"], at(1, 0, 0));

        let names: Vec<_> = report.steps.keys().cloned().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);

        let json = report.to_json().unwrap();
        assert!(json.find("\"alpha\"").unwrap() < json.find("\"zeta\"").unwrap());
    }

    #[test]
    fn test_record_invariants() {
        assert!(StepRecord::pending().check().is_ok());

        let mut record = StepRecord::pending();
        record.start(at(1, 0, 0));
        assert!(record.check().is_ok());
        assert_eq!(record.status, StepStatus::Running);

        record.finish(at(1, 0, 5), 5.0, Some("Error: boom".to_string()));
        assert!(record.check().is_ok());
        assert_eq!(record.status, StepStatus::Failed);

        // Restarting a failed step clears its previous outcome
        record.start(at(2, 0, 0));
        assert_eq!(record.error, None);
        assert_eq!(record.finished_at, None);
        assert_eq!(record.duration_sec, None);

        let bad = StepRecord {
            status: StepStatus::Done,
            started_at: Some(at(1, 0, 0)),
            finished_at: None,
            duration_sec: None,
            error: None,
        };
        assert!(bad.check().is_err());

        let no_duration = StepRecord {
            status: StepStatus::Failed,
            started_at: Some(at(1, 0, 0)),
            finished_at: Some(at(1, 0, 5)),
            duration_sec: None,
            error: Some("Error: boom".to_string()),
        };
        assert!(no_duration.check().is_err());
        assert!(StepRecord {
            status: StepStatus::Done,
            error: None,
            ..no_duration.clone()
        }
        .check()
        .is_err());

        let bad = StepRecord {
            error: Some("leftover".to_string()),
            ..StepRecord::pending()
        };
        assert!(bad.check().is_err());
    }

    #[test]
    fn test_parse_accepts_fractional_seconds() {
        let json = r#"{
            "created_at": "2024-05-17T09:00:00.123456",
            "updated_at": "2024-05-17T09:00:00",
            "steps": {}
        }"#;
        let report: BuildReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.updated_at, at(9, 0, 0));
        assert!(report.is_complete());
    }
}
