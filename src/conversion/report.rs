//! Conversion report: what a directory conversion read, wrote, and skipped.

use serde::Serialize;
use std::fmt;

use crate::issue::{write_issue_sections, Issue, Severity};

/// A report generated by [`convert_directory`](super::convert_directory).
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Source format name.
    pub from: String,
    /// Target format name.
    pub to: String,
    /// Directory the converted labels were written to.
    pub output_dir: String,
    pub files: FileCounts,
    pub boxes: BoxCounts,
    /// Skipped files and dropped boxes, in label-file order.
    pub issues: Vec<Issue>,
}

impl ConversionReport {
    /// Create a new empty report for a conversion between formats.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn skipped_files(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
    }

    /// True when every file converted and no box was dropped.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} label file(s): {} converted, {} skipped",
            self.files.seen, self.files.converted, self.files.skipped
        )?;
        writeln!(
            f,
            "  {} box(es) read, {} written, {} dropped",
            self.boxes.read, self.boxes.written, self.boxes.dropped
        )?;
        if !self.output_dir.is_empty() {
            writeln!(f, "  output: {}", self.output_dir)?;
        }

        write_issue_sections(f, &self.issues)
    }
}

/// Per-file tallies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FileCounts {
    pub seen: usize,
    pub converted: usize,
    pub skipped: usize,
}

/// Per-box tallies across all converted files.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BoxCounts {
    pub read: usize,
    pub written: usize,
    pub dropped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RslabelError;
    use std::path::Path;

    #[test]
    fn empty_report_is_clean() {
        let report = ConversionReport::new("dota", "voc");
        assert!(report.is_clean());
        assert_eq!(report.skipped_files().count(), 0);
    }

    #[test]
    fn display_lists_issue_sections() {
        let mut report = ConversionReport::new("visdrone", "yolo");
        report.files = FileCounts {
            seen: 2,
            converted: 1,
            skipped: 1,
        };
        report.add(Issue::file_skipped(
            Path::new("b.txt"),
            &RslabelError::ImageNotFound {
                label_path: "b.txt".into(),
                expected: "b.jpg".into(),
            },
        ));
        report.add(Issue::box_dropped(
            Path::new("a.txt"),
            &RslabelError::MalformedLine {
                path: "a.txt".into(),
                line: 3,
                message: "expected 8 fields".into(),
            },
        ));

        let text = report.to_string();
        assert!(text.contains("2 label file(s): 1 converted, 1 skipped"));
        assert!(text.contains("Skipped files (1):"));
        assert!(text.contains("Dropped boxes (1):"));
        assert!(text.contains("  - Malformed line 3 in a.txt: expected 8 fields"));
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = ConversionReport::new("dota", "voc");
        report.boxes.read = 5;
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"from\":\"dota\""));
        assert!(json.contains("\"boxes\":{\"read\":5,\"written\":0,\"dropped\":0}"));
    }
}
