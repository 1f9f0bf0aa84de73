//! Oriented-polygon (DOTA style) reader.
//!
//! One line per object: `x1 y1 x2 y2 x3 y3 x4 y4 class difficulty`. The four
//! corners are reduced to their axis-aligned envelope. Files may open with
//! `imagesource:` and `gsd:` header lines, which carry no boxes.

use std::fs;
use std::path::Path;

use super::catalog::ClassCatalog;
use super::lines::{expect_fields, parse_f64_field};
use super::model::{AnnotationRecord, ClassRef, LabeledBox, ReadOutcome};
use super::{BBoxXYXY, Pixel};
use crate::error::RslabelError;

const HEADER_MARKERS: [&str; 2] = ["imagesource", "gsd"];
const COORD_FIELDS: [&str; 8] = ["x1", "y1", "x2", "y2", "x3", "y3", "x4", "y4"];

#[derive(Clone, Debug, PartialEq)]
struct DotaRow<'a> {
    corners: [(f64, f64); 4],
    class: &'a str,
    difficult: bool,
}

/// Read one oriented-polygon label file.
///
/// With a `catalog`, objects whose class name is not in it are dropped.
pub fn read_dota_file(
    image_path: &Path,
    label_path: &Path,
    catalog: Option<&ClassCatalog>,
) -> Result<ReadOutcome, RslabelError> {
    let content =
        fs::read_to_string(label_path).map_err(|source| RslabelError::path_io(label_path, source))?;
    Ok(parse_dota_str(&content, image_path, label_path, catalog))
}

/// Parse oriented-polygon lines already held in memory.
pub fn parse_dota_str(
    content: &str,
    image_path: &Path,
    label_path: &Path,
    catalog: Option<&ClassCatalog>,
) -> ReadOutcome {
    let mut outcome = ReadOutcome::new(AnnotationRecord::new(image_path, label_path));

    for (line_idx, line) in content.lines().enumerate() {
        let row = match parse_dota_line(line, label_path, line_idx + 1) {
            Ok(Some(row)) => row,
            Ok(None) => continue,
            Err(error) => {
                outcome.drop_box(error);
                continue;
            }
        };

        if let Some(catalog) = catalog {
            if catalog.id_of(row.class).is_none() {
                outcome.drop_box(RslabelError::UnresolvableClass {
                    path: label_path.to_path_buf(),
                    class: row.class.to_string(),
                });
                continue;
            }
        }

        // Four corners always give an envelope.
        let Some(bbox) = BBoxXYXY::<Pixel>::envelope(&row.corners) else {
            continue;
        };
        outcome.record.push(
            LabeledBox::new(bbox, ClassRef::Name(row.class.to_string()))
                .with_difficult(row.difficult),
        );
    }

    outcome
}

fn parse_dota_line<'a>(
    line: &'a str,
    file_path: &Path,
    line_num: usize,
) -> Result<Option<DotaRow<'a>>, RslabelError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || HEADER_MARKERS.iter().any(|marker| trimmed.contains(marker)) {
        return Ok(None);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().take(11).collect();
    expect_fields(
        tokens.len(),
        9,
        "x1 y1 x2 y2 x3 y3 x4 y4 class [difficulty]",
        file_path,
        line_num,
    )?;

    let mut values = [0.0; 8];
    for (slot, (raw, name)) in values.iter_mut().zip(tokens.iter().zip(COORD_FIELDS)) {
        *slot = parse_f64_field(raw, name, file_path, line_num)?;
    }

    Ok(Some(DotaRow {
        corners: [
            (values[0], values[1]),
            (values[2], values[3]),
            (values[4], values[5]),
            (values[6], values[7]),
        ],
        class: tokens[8],
        difficult: tokens.get(9).is_some_and(|flag| *flag != "0"),
    }))
}

/// Fuzz-only entrypoint for single-line parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_dota_line(input: &str) -> Result<(), RslabelError> {
    let _ = parse_dota_line(input, Path::new("<fuzz>"), 1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str, catalog: Option<&ClassCatalog>) -> ReadOutcome {
        parse_dota_str(
            content,
            Path::new("images/P0001.png"),
            Path::new("labelTxt/P0001.txt"),
            catalog,
        )
    }

    #[test]
    fn axis_aligned_quad_reduces_to_corners() {
        let outcome = parse("0 0 100 0 100 50 0 50 plane 0\n", Some(&ClassCatalog::dota()));
        assert!(outcome.dropped.is_empty());
        let labeled = &outcome.record.boxes[0];
        assert_eq!(labeled.bbox, BBoxXYXY::from_xyxy(0.0, 0.0, 100.0, 50.0));
        assert_eq!(labeled.class, ClassRef::Name("plane".into()));
        assert!(!labeled.difficult);
        assert!(!labeled.truncated);
    }

    #[test]
    fn header_lines_are_skipped() {
        let content = "imagesource:GoogleEarth\ngsd:0.146343590398\n\
                       10 0 20 10 10 20 0 10 ship 1\n";
        let outcome = parse(content, None);
        assert!(outcome.dropped.is_empty());
        assert_eq!(outcome.record.boxes.len(), 1);
        assert_eq!(
            outcome.record.boxes[0].bbox,
            BBoxXYXY::from_xyxy(0.0, 0.0, 20.0, 20.0)
        );
        assert!(outcome.record.boxes[0].difficult);
    }

    #[test]
    fn any_non_zero_flag_is_difficult() {
        let outcome = parse(
            "0 0 1 0 1 1 0 1 plane 2\n0 0 1 0 1 1 0 1 plane 00\n0 0 1 0 1 1 0 1 plane\n",
            None,
        );
        let flags: Vec<bool> = outcome.record.boxes.iter().map(|b| b.difficult).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn bad_lines_drop_only_their_box() {
        let content = "0 0 1 0 1 1 plane 0\n\
                       0 0 1 0 x 1 0 1 plane 0\n\
                       0 0 1 0 1 1 0 1 spaceship 0\n\
                       0 0 4 0 4 4 0 4 harbor 0\n";
        let outcome = parse(content, Some(&ClassCatalog::dota()));
        assert_eq!(outcome.record.boxes.len(), 1);
        assert_eq!(outcome.dropped.len(), 3);
        assert!(matches!(
            outcome.dropped[0],
            RslabelError::MalformedLine { line: 1, .. }
        ));
        assert!(matches!(
            outcome.dropped[1],
            RslabelError::MalformedLine { line: 2, .. }
        ));
        assert!(matches!(
            outcome.dropped[2],
            RslabelError::UnresolvableClass { .. }
        ));
    }
}
