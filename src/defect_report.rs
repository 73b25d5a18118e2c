//! Defect Report: the static-analysis alert list the campaign is
//! reconciled against.
//!
//! The on-disk input format is an implementation detail, not a contract
//! clients rely on; this reads one JSON object per line and writes the
//! `results.csv` mirror with the `csv` crate.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One entry in a [`DefectReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub binding_id: Option<String>,
    pub description: String,
    pub covered: bool,
    pub validated: bool,
}

/// A row written to `results.csv`.
#[derive(Debug, Serialize)]
struct AlertRow<'a> {
    id: &'a str,
    binding_id: &'a str,
    description: &'a str,
    covered: bool,
    validated: bool,
}

/// The list of alerts produced by the static analyser.
#[derive(Debug, Default)]
pub struct DefectReport {
    alerts: Vec<Alert>,
}

impl DefectReport {
    /// Load a defect report from a JSON-lines file. An unreadable or
    /// malformed report is a fatal startup error, surfaced here as `Err`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = fs::File::open(path).map_err(|e| Error::file(format!("{}: {e}", path.display())))?;
        let reader = BufReader::new(file);
        let mut alerts = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let alert: Alert = serde_json::from_str(&line)?;
            alerts.push(alert);
        }
        let report = Self { alerts };
        if !report.has_binding() {
            log::warn!("defect report {} does not contain bindings", path.display());
        }
        Ok(report)
    }

    /// Whether every alert in the report carries a `binding-id`. If so, the
    /// broker looks up alerts by `binding-id`; otherwise by raw `id`.
    pub fn has_binding(&self) -> bool {
        !self.alerts.is_empty() && self.alerts.iter().all(|a| a.binding_id.is_some())
    }

    /// Resolve an incoming alert id: by `binding-id` if the report carries
    /// bindings, else by raw `id`. A report without bindings never errors
    /// here, it just falls through to the raw-id lookup.
    pub fn resolve(&self, incoming_id: &str) -> Option<usize> {
        if self.has_binding() {
            self.alerts
                .iter()
                .position(|a| a.binding_id.as_deref() == Some(incoming_id))
        } else {
            self.alerts.iter().position(|a| a.id == incoming_id)
        }
    }

    pub fn get(&self, index: usize) -> Option<&Alert> {
        self.alerts.get(index)
    }

    /// Apply a monotone `(covered, validated)` update.
    ///
    /// Returns which booleans actually flipped `false -> true`. A
    /// `true -> false` or no-op submission is ignored; a transition never
    /// un-sets a flag.
    pub fn apply_update(&mut self, index: usize, covered: bool, validated: bool) -> (bool, bool) {
        let alert = &mut self.alerts[index];
        let newly_covered = !alert.covered && covered;
        let newly_validated = !alert.validated && validated;
        if newly_covered {
            alert.covered = true;
        }
        if newly_validated {
            alert.validated = true;
        }
        (newly_covered, newly_validated)
    }

    pub fn all_alerts_validated(&self) -> bool {
        !self.alerts.is_empty() && self.alerts.iter().all(|a| a.validated)
    }

    /// Serialize every alert as a JSON array, for the `defect-report-json`
    /// field of the outbound `START` message.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.alerts)?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(path)?;
        for alert in &self.alerts {
            writer.serialize(AlertRow {
                id: &alert.id,
                binding_id: alert.binding_id.as_deref().unwrap_or(""),
                description: &alert.description,
                covered: alert.covered,
                validated: alert.validated,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_report(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.join("report.jsonl");
        let mut f = fs::File::create(&path).unwrap();
        for l in lines {
            writeln!(f, "{l}").unwrap();
        }
        path
    }

    #[test]
    fn monotonic_covered_and_validated_never_regress() {
        let dir = tempdir().unwrap();
        let path = write_report(
            &dir,
            &[r#"{"id":"alpha","binding_id":null,"description":"d","covered":false,"validated":false}"#],
        );
        let mut report = DefectReport::load(&path).unwrap();
        let idx = report.resolve("alpha").unwrap();

        let (cov, val) = report.apply_update(idx, true, false);
        assert!(cov && !val);

        // a later "uncovering" submission is ignored
        let (cov2, val2) = report.apply_update(idx, false, false);
        assert!(!cov2 && !val2);
        assert!(report.get(idx).unwrap().covered);
    }

    #[test]
    fn all_validated_triggers_only_when_every_alert_is() {
        let dir = tempdir().unwrap();
        let path = write_report(
            &dir,
            &[
                r#"{"id":"a","binding_id":null,"description":"d","covered":true,"validated":true}"#,
                r#"{"id":"b","binding_id":null,"description":"d","covered":false,"validated":false}"#,
            ],
        );
        let mut report = DefectReport::load(&path).unwrap();
        assert!(!report.all_alerts_validated());
        let idx = report.resolve("b").unwrap();
        report.apply_update(idx, true, true);
        assert!(report.all_alerts_validated());
    }

    #[test]
    fn binding_id_lookup_used_only_when_report_carries_bindings() {
        let dir = tempdir().unwrap();
        let path = write_report(
            &dir,
            &[r#"{"id":"internal-1","binding_id":"42","description":"d","covered":false,"validated":false}"#],
        );
        let report = DefectReport::load(&path).unwrap();
        assert!(report.has_binding());
        assert_eq!(report.resolve("42"), Some(0));
        assert_eq!(report.resolve("internal-1"), None);
    }
}
