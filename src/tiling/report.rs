//! Tiling report: what a tiling, label-splitting, or pruning run did.

use serde::Serialize;
use std::fmt;

use crate::issue::{write_issue_sections, Issue};

/// A report generated by the tiling engine's directory operations.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TilingReport {
    /// `tile`, `split-labels`, or `prune-empty`.
    pub operation: String,
    /// Source images (tiling), source label files (splitting), or tile
    /// samples (pruning).
    pub sources: SourceCounts,
    /// Tile images or tile label files written.
    pub tiles_written: usize,
    /// Tile images or tile label files that could not be written.
    pub tiles_failed: usize,
    pub boxes: TileBoxCounts,
    /// Samples deleted by the empty-sample pass.
    pub pruned: usize,
    pub issues: Vec<Issue>,
}

impl TilingReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, issue: Issue) {
        self.issues.push(issue);
    }
}

impl fmt::Display for TilingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} source(s): {} processed, {} skipped",
            self.sources.seen, self.sources.processed, self.sources.skipped
        )?;
        if self.operation == "prune-empty" {
            writeln!(f, "  {} empty sample(s) removed", self.pruned)?;
        } else {
            writeln!(f, "  {} tile file(s) written", self.tiles_written)?;
            if self.tiles_failed > 0 {
                writeln!(f, "  {} tile file(s) failed", self.tiles_failed)?;
            }
        }
        if self.boxes.source > 0 {
            writeln!(
                f,
                "  {} source box(es): {} placed in tiles, {} in no tile",
                self.boxes.source, self.boxes.kept, self.boxes.outside
            )?;
        }

        write_issue_sections(f, &self.issues)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub seen: usize,
    pub processed: usize,
    pub skipped: usize,
}

/// Box tallies for label splitting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TileBoxCounts {
    /// Boxes in the source records.
    pub source: usize,
    /// Box instances written to tile records. A box inside an overlap region
    /// counts once per tile.
    pub kept: usize,
    /// Source boxes not fully inside any tile.
    pub outside: usize,
}
