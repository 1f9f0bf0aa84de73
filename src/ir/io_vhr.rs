//! Parenthesized-corner (NWPU VHR style) reader.
//!
//! One line per object: `(x1,y1),(x2,y2),class_code`. The format carries no
//! truncation or difficulty information.

use std::fs;
use std::path::Path;

use super::catalog::ClassCatalog;
use super::lines::{comma_records, expect_fields, parse_i64_field};
use super::model::{AnnotationRecord, ClassRef, LabeledBox, ReadOutcome};
use super::BBoxXYXY;
use crate::error::RslabelError;

const CORNER_FIELDS: [&str; 4] = ["x1", "y1", "x2", "y2"];

/// Read one parenthesized-corner label file, resolving class codes through
/// `catalog`.
pub fn read_vhr_file(
    image_path: &Path,
    label_path: &Path,
    catalog: &ClassCatalog,
) -> Result<ReadOutcome, RslabelError> {
    let content =
        fs::read_to_string(label_path).map_err(|source| RslabelError::path_io(label_path, source))?;
    Ok(parse_vhr_str(&content, image_path, label_path, catalog))
}

/// Parse parenthesized-corner lines already held in memory.
pub fn parse_vhr_str(
    content: &str,
    image_path: &Path,
    label_path: &Path,
    catalog: &ClassCatalog,
) -> ReadOutcome {
    let mut outcome = ReadOutcome::new(AnnotationRecord::new(image_path, label_path));

    for row in comma_records(content, label_path) {
        match row.and_then(|(line, record)| parse_row(&record, label_path, line, catalog)) {
            Ok(labeled) => outcome.record.push(labeled),
            Err(error) => outcome.drop_box(error),
        }
    }

    outcome
}

fn parse_row(
    record: &csv::StringRecord,
    path: &Path,
    line: usize,
    catalog: &ClassCatalog,
) -> Result<LabeledBox, RslabelError> {
    expect_fields(record.len(), 5, "(x1,y1),(x2,y2),class", path, line)?;

    let mut corners = [0i64; 4];
    for (index, (slot, name)) in corners.iter_mut().zip(CORNER_FIELDS).enumerate() {
        let raw = record[index].trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());
        *slot = parse_i64_field(raw, name, path, line)?;
    }
    let [x1, y1, x2, y2] = corners.map(|value| value as f64);

    let (_, name) =
        catalog
            .resolve_code(&record[4])
            .ok_or_else(|| RslabelError::UnresolvableClass {
                path: path.to_path_buf(),
                class: record[4].to_string(),
            })?;

    Ok(LabeledBox::new(
        BBoxXYXY::from_xyxy(x1, y1, x2, y2),
        ClassRef::Name(name.to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> ReadOutcome {
        parse_vhr_str(
            content,
            Path::new("positive image set/001.jpg"),
            Path::new("ground truth/001.txt"),
            &ClassCatalog::vhr(),
        )
    }

    #[test]
    fn parentheses_are_stripped() {
        let outcome = parse("(563,478),(630,573),1\n( 10 , 20 ),( 30 , 40 ),9\n");
        assert!(outcome.dropped.is_empty());

        let first = &outcome.record.boxes[0];
        assert_eq!(first.bbox, BBoxXYXY::from_xyxy(563.0, 478.0, 630.0, 573.0));
        assert_eq!(first.class, ClassRef::Name("ship".into()));
        assert!(!first.truncated && !first.difficult);

        assert_eq!(
            outcome.record.boxes[1].class,
            ClassRef::Name("vehicle".into())
        );
    }

    #[test]
    fn malformed_rows_are_dropped() {
        let outcome = parse("(1,2),(3,4)\n(1,2),(3.5,4),1\n(1,2),(3,4),10\n(1,2),(3,4),0\n");
        assert_eq!(outcome.record.boxes.len(), 1);
        assert_eq!(outcome.dropped.len(), 3);
        assert!(matches!(
            outcome.dropped[2],
            RslabelError::UnresolvableClass { .. }
        ));
    }
}
