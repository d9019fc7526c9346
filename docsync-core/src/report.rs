//! JSON validation report artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::validate::{ValidationIssue, ValidationOutcome};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to serialize validation report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write validation report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub errors: usize,
    pub warnings: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub timestamp: DateTime<Utc>,
    pub structure_file: String,
    pub docs_root: String,
    pub version: String,
    pub summary: ReportSummary,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(
        outcome: &ValidationOutcome,
        structure_file: &Path,
        docs_root: &Path,
        version: String,
    ) -> Self {
        ValidationReport {
            timestamp: Utc::now(),
            structure_file: structure_file.display().to_string(),
            docs_root: docs_root.display().to_string(),
            version,
            summary: ReportSummary {
                errors: outcome.errors.len(),
                warnings: outcome.warnings.len(),
                passed: outcome.passed,
            },
            errors: outcome.errors.clone(),
            warnings: outcome.warnings.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), ReportError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(report = %path.display(), "Detailed validation report saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Severity;

    #[test]
    fn serializes_counts_and_issue_fields() {
        let outcome = ValidationOutcome {
            passed: false,
            errors: vec![ValidationIssue {
                severity: Severity::Error,
                rule: "unique_slugs".into(),
                path: "ops/runbooks".into(),
                message: "Duplicate book slug within shelf: runbooks".into(),
            }],
            warnings: vec![],
        };
        let report = ValidationReport::new(
            &outcome,
            Path::new("structure.yaml"),
            Path::new("docs"),
            "1".into(),
        );
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["summary"]["errors"], 1);
        assert_eq!(value["summary"]["warnings"], 0);
        assert_eq!(value["summary"]["passed"], false);
        assert_eq!(value["structure_file"], "structure.yaml");
        assert_eq!(value["errors"][0]["severity"], "error");
        assert_eq!(value["errors"][0]["rule"], "unique_slugs");
        assert!(value["timestamp"].is_string());
    }
}
