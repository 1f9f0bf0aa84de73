//! Frame-delta (VisDrone style) reader.
//!
//! One line per object:
//! `x,y,w,h,score,class_code,occlusion,truncation`. Corners are the top-left
//! point plus extent; the class code indexes the supplied catalog.

use std::fs;
use std::path::Path;

use super::catalog::ClassCatalog;
use super::lines::{comma_records, expect_fields, parse_i64_field};
use super::model::{AnnotationRecord, ClassRef, LabeledBox, ReadOutcome};
use super::BBoxXYXY;
use crate::error::RslabelError;

const LAYOUT: &str = "x,y,w,h,score,class,occlusion,truncation";

/// Read one frame-delta label file, resolving class codes through `catalog`.
pub fn read_visdrone_file(
    image_path: &Path,
    label_path: &Path,
    catalog: &ClassCatalog,
) -> Result<ReadOutcome, RslabelError> {
    let content =
        fs::read_to_string(label_path).map_err(|source| RslabelError::path_io(label_path, source))?;
    Ok(parse_visdrone_str(&content, image_path, label_path, catalog))
}

/// Parse frame-delta lines already held in memory.
pub fn parse_visdrone_str(
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
    expect_fields(record.len(), 8, LAYOUT, path, line)?;

    let x = parse_i64_field(&record[0], "x", path, line)?;
    let y = parse_i64_field(&record[1], "y", path, line)?;
    let w = parse_i64_field(&record[2], "w", path, line)?;
    let h = parse_i64_field(&record[3], "h", path, line)?;
    let occlusion = parse_i64_field(&record[6], "occlusion", path, line)?;
    let truncation = parse_i64_field(&record[7], "truncation", path, line)?;

    let (_, name) =
        catalog
            .resolve_code(&record[5])
            .ok_or_else(|| RslabelError::UnresolvableClass {
                path: path.to_path_buf(),
                class: record[5].to_string(),
            })?;

    Ok(LabeledBox::new(
        BBoxXYXY::from_xywh(x as f64, y as f64, w as f64, h as f64),
        ClassRef::Name(name.to_string()),
    )
    .with_truncated(occlusion > 0 || truncation > 0)
    .with_difficult(truncation > 1))
}
