//! Run reports: applied changes, skipped items and the overall status

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One attribute-level change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub file_id: String,
    /// Unit, template, hardpoint, ship or event the change belongs to
    pub entity: String,
    /// Tag or field that changed
    pub attribute: String,
    /// Value before the change; `None` when the slot was added
    pub old: Option<String>,
    /// Value after the change; `None` when the slot was removed
    pub new: Option<String>,
}

impl DiffEntry {
    pub fn path(&self) -> String {
        format!("{}:{}/{}", self.file_id, self.entity, self.attribute)
    }
}

/// How severe a reported problem is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// One directive or unit was skipped; the rest of the run continued
    Warning,
    /// A whole stage or file could not be processed
    StageFailure,
}

/// A skipped or failed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    /// Unit the problem belongs to, if any
    pub unit: Option<String>,
    /// What was being processed (`file_id:entity/attribute`, stage name, ...)
    pub scope: String,
    /// Error class name
    pub kind: String,
    pub message: String,
}

impl Issue {
    pub fn from_error(severity: Severity, unit: Option<&str>, scope: impl Into<String>, error: &Error) -> Self {
        Self {
            severity,
            unit: unit.map(str::to_string),
            scope: scope.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// What happened in a run, distinguishing the outcomes a caller must tell apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every change applied, nothing skipped
    Success,
    /// Some changes applied, some items skipped
    PartialSuccess { warnings: usize },
    /// Nothing written: preview, no directives or everything failed
    NothingChanged { warnings: usize },
}

impl RunStatus {
    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success | RunStatus::NothingChanged { warnings: 0 } => 0,
            RunStatus::PartialSuccess { .. } | RunStatus::NothingChanged { .. } => 2,
        }
    }
}

/// Every applied change and every skipped item of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub applied: Vec<DiffEntry>,
    pub issues: Vec<Issue>,
    pub preview: bool,
}

impl Report {
    pub fn new(preview: bool) -> Self {
        Self {
            preview,
            ..Default::default()
        }
    }

    pub fn record(&mut self, change: DiffEntry) {
        self.applied.push(change);
    }

    pub fn extend(&mut self, changes: impl IntoIterator<Item = DiffEntry>) {
        self.applied.extend(changes);
    }

    pub fn warn(&mut self, unit: Option<&str>, scope: impl Into<String>, error: &Error) {
        let issue = Issue::from_error(Severity::Warning, unit, scope, error);
        tracing::warn!(scope = %issue.scope, kind = %issue.kind, "{}", issue.message);
        self.issues.push(issue);
    }

    pub fn fail_stage(&mut self, scope: impl Into<String>, error: &Error) {
        let issue = Issue::from_error(Severity::StageFailure, None, scope, error);
        tracing::error!(scope = %issue.scope, kind = %issue.kind, "{}", issue.message);
        self.issues.push(issue);
    }

    pub fn warnings(&self) -> usize {
        self.issues.len()
    }

    /// Changes that touch `file_id`
    pub fn changes_for<'a>(&'a self, file_id: &'a str) -> impl Iterator<Item = &'a DiffEntry> + 'a {
        self.applied.iter().filter(move |c| c.file_id == file_id)
    }

    pub fn status(&self) -> RunStatus {
        let warnings = self.warnings();
        if self.preview || self.applied.is_empty() {
            RunStatus::NothingChanged { warnings }
        } else if warnings == 0 {
            RunStatus::Success
        } else {
            RunStatus::PartialSuccess { warnings }
        }
    }

    /// Write the diff summary as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(["file_id", "entity", "attribute", "old", "new"])?;
        for change in &self.applied {
            csv.write_record([
                change.file_id.as_str(),
                change.entity.as_str(),
                change.attribute.as_str(),
                change.old.as_deref().unwrap_or(""),
                change.new.as_deref().unwrap_or(""),
            ])?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Save the diff summary as a CSV file
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref()).map_err(|source| Error::FileWrite {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        self.write_csv(file)
    }

    /// Save the whole report as JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content).map_err(|source| Error::FileWrite {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}
