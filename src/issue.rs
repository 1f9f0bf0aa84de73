//! Issues recorded by the batch engines.
//!
//! A batch run never stops on bad data. Every dropped box and skipped file is
//! logged and kept here so the final report can list them.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::RslabelError;

/// Severity of a recorded issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// A whole file was skipped.
    Error,
    /// A single box was dropped; the rest of its file was processed.
    Warning,
}

/// Stable issue codes for programmatic consumption.
///
/// These codes are part of the JSON report schema and should remain stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    MalformedLine,
    UnresolvableClass,
    MissingRequiredField,
    XmlParse,
    ImageNotFound,
    ImageRead,
    ImageWrite,
    /// A tile file name that does not follow `<stem>_<y>_<x>`.
    TileName,
    Io,
    Other,
}

impl IssueCode {
    pub fn of(error: &RslabelError) -> Self {
        match error {
            RslabelError::MalformedLine { .. } => IssueCode::MalformedLine,
            RslabelError::UnresolvableClass { .. } => IssueCode::UnresolvableClass,
            RslabelError::MissingRequiredField { .. } => IssueCode::MissingRequiredField,
            RslabelError::VocXmlParse { .. } => IssueCode::XmlParse,
            RslabelError::ImageNotFound { .. } => IssueCode::ImageNotFound,
            RslabelError::ImageRead { .. } => IssueCode::ImageRead,
            RslabelError::ImageWrite { .. } => IssueCode::ImageWrite,
            RslabelError::InvalidTileName { .. } => IssueCode::TileName,
            RslabelError::PathIo { .. } => IssueCode::Io,
            _ => IssueCode::Other,
        }
    }
}

/// A single recorded issue.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub code: IssueCode,
    /// The file the issue belongs to.
    pub path: String,
    pub message: String,
}

impl Issue {
    /// A file that was skipped because of `error`.
    pub fn file_skipped(path: &Path, error: &RslabelError) -> Self {
        Self {
            severity: Severity::Error,
            code: IssueCode::of(error),
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }

    /// A box in `path` that was dropped because of `error`.
    pub fn box_dropped(path: &Path, error: &RslabelError) -> Self {
        Self {
            severity: Severity::Warning,
            code: IssueCode::of(error),
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Writes the `Skipped files` and `Dropped boxes` sections shared by the
/// batch reports.
pub(crate) fn write_issue_sections(f: &mut fmt::Formatter<'_>, issues: &[Issue]) -> fmt::Result {
    for (severity, title) in [
        (Severity::Error, "Skipped files"),
        (Severity::Warning, "Dropped boxes"),
    ] {
        let count = issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count();
        if count == 0 {
            continue;
        }

        writeln!(f)?;
        writeln!(f, "{title} ({count}):")?;
        for issue in issues.iter().filter(|issue| issue.severity == severity) {
            writeln!(f, "  - {issue}")?;
        }
    }
    Ok(())
}
