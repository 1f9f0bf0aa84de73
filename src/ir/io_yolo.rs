//! Normalized-center (YOLO style) reader and writer.
//!
//! One line per box: `class_id center_x center_y width height`, space
//! separated. Centers and sizes are fractions of the image size, so both
//! directions need the image dimensions.

use std::fs;
use std::path::Path;

use super::bbox::CenterSize;
use super::catalog::ClassCatalog;
use super::lines::parse_f64_field;
use super::model::{AnnotationRecord, ClassRef, ImageInfo, LabeledBox, ReadOutcome, WriteOutcome};
use super::ClassId;
use crate::error::RslabelError;
use crate::fsutil::write_atomic;

#[derive(Clone, Copy, Debug, PartialEq)]
struct YoloLabelRow {
    class_id: usize,
    center: CenterSize,
}

/// Read one normalized-center label file.
///
/// `image` supplies the dimensions used to scale boxes back to pixels. With a
/// `catalog`, class ids outside it are dropped.
pub fn read_yolo_file(
    image_path: &Path,
    label_path: &Path,
    image: ImageInfo,
    catalog: Option<&ClassCatalog>,
) -> Result<ReadOutcome, RslabelError> {
    let content =
        fs::read_to_string(label_path).map_err(|source| RslabelError::path_io(label_path, source))?;

    let record = AnnotationRecord::new(image_path, label_path).with_image_info(image);
    let mut outcome = ReadOutcome::new(record);

    for (line_idx, line) in content.lines().enumerate() {
        let line_num = line_idx + 1;
        let row = match parse_label_line(line, label_path, line_num) {
            Ok(Some(row)) => row,
            Ok(None) => continue,
            Err(error) => {
                outcome.drop_box(error);
                continue;
            }
        };

        if let Some(catalog) = catalog {
            if row.class_id >= catalog.len() {
                outcome.drop_box(RslabelError::UnresolvableClass {
                    path: label_path.to_path_buf(),
                    class: format!(
                        "{} (catalog has {} classes)",
                        row.class_id,
                        catalog.len()
                    ),
                });
                continue;
            }
        }

        let bbox = row.center.to_corners(image.width, image.height);
        outcome.record.push(LabeledBox::new(
            bbox,
            ClassRef::Id(ClassId::new(row.class_id)),
        ));
    }

    Ok(outcome)
}

/// Write `record` as normalized-center lines at `path`.
///
/// Every box's class must resolve in `catalog`; boxes that do not are
/// skipped. The record must carry image dimensions.
pub fn write_yolo_file(
    record: &AnnotationRecord,
    path: &Path,
    catalog: &ClassCatalog,
) -> Result<WriteOutcome, RslabelError> {
    let (content, outcome) = to_yolo_string(record, path, catalog)?;
    write_atomic(path, content.as_bytes())?;
    Ok(outcome)
}

/// Render `record` as label lines without touching the file system.
pub fn to_yolo_string(
    record: &AnnotationRecord,
    path: &Path,
    catalog: &ClassCatalog,
) -> Result<(String, WriteOutcome), RslabelError> {
    let info = record
        .image
        .ok_or_else(|| RslabelError::MissingRequiredField {
            path: path.to_path_buf(),
            field: "size".to_string(),
            message: format!(
                "image dimensions unknown for {}",
                record.image_path.display()
            ),
        })?;

    let mut outcome = WriteOutcome::default();
    let mut content = String::new();

    for labeled in &record.boxes {
        let Some(class_id) = labeled.class.id(catalog) else {
            outcome.drop_box(RslabelError::UnresolvableClass {
                path: path.to_path_buf(),
                class: labeled.class.to_string(),
            });
            continue;
        };

        let center = labeled.bbox.to_center_size(info.width, info.height);
        if !center.is_finite() {
            outcome.drop_box(RslabelError::MissingRequiredField {
                path: path.to_path_buf(),
                field: "bbox".to_string(),
                message: format!("non-finite corners {:?}", labeled.bbox),
            });
            continue;
        }

        content.push_str(&format!(
            "{} {:.16} {:.16} {:.16} {:.16}\n",
            class_id.index(),
            center.cx,
            center.cy,
            center.w,
            center.h
        ));
        outcome.written += 1;
    }

    Ok((content, outcome))
}

fn parse_label_line(
    line: &str,
    file_path: &Path,
    line_num: usize,
) -> Result<Option<YoloLabelRow>, RslabelError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Take at most 6 tokens so pathological inputs do not allocate unbounded memory.
    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();

    if tokens.len() != 5 {
        let message = if tokens.len() > 5 {
            "more than 5 tokens; segmentation and keypoint rows are not supported".to_string()
        } else {
            format!("expected 5 tokens, found {}", tokens.len())
        };
        return Err(RslabelError::MalformedLine {
            path: file_path.to_path_buf(),
            line: line_num,
            message,
        });
    }

    let class_id = tokens[0]
        .parse::<usize>()
        .map_err(|_| RslabelError::MalformedLine {
            path: file_path.to_path_buf(),
            line: line_num,
            message: format!(
                "invalid class_id '{}'; expected non-negative integer",
                tokens[0]
            ),
        })?;

    let center = CenterSize {
        cx: parse_f64_field(tokens[1], "x_center", file_path, line_num)?,
        cy: parse_f64_field(tokens[2], "y_center", file_path, line_num)?,
        w: parse_f64_field(tokens[3], "width", file_path, line_num)?,
        h: parse_f64_field(tokens[4], "height", file_path, line_num)?,
    };

    Ok(Some(YoloLabelRow { class_id, center }))
}

/// Fuzz-only entrypoint for single-line parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_label_line(input: &str) -> Result<(), RslabelError> {
    let _ = parse_label_line(input, Path::new("<fuzz>"), 1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BBoxXYXY;

    #[test]
    fn parse_label_line_accepts_five_tokens() {
        let row = parse_label_line("  3 0.5 0.25 0.1 0.2  ", Path::new("a.txt"), 1)
            .expect("parse")
            .expect("row");
        assert_eq!(row.class_id, 3);
        assert_eq!(row.center.cy, 0.25);

        assert!(parse_label_line("   ", Path::new("a.txt"), 1)
            .expect("blank")
            .is_none());
    }

    #[test]
    fn parse_label_line_rejects_wrong_shapes() {
        for bad in ["0 0.5 0.5 0.1", "0 0.5 0.5 0.1 0.1 0.9", "-1 0.5 0.5 0.1 0.1", "0 a 0.5 0.1 0.1"] {
            let err = parse_label_line(bad, Path::new("a.txt"), 4).unwrap_err();
            assert!(
                matches!(err, RslabelError::MalformedLine { line: 4, .. }),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn writer_uses_sixteen_decimals_and_catalog_ids() {
        let catalog = ClassCatalog::new(["plane", "ship"]).expect("catalog");
        let mut record = AnnotationRecord::new("img.jpg", "img.xml")
            .with_image_info(ImageInfo::new(200, 100, 3));
        record.push(LabeledBox::new(
            BBoxXYXY::from_xyxy(0.0, 0.0, 100.0, 50.0),
            ClassRef::Name("ship".into()),
        ));
        record.push(LabeledBox::new(
            BBoxXYXY::from_xyxy(0.0, 0.0, 10.0, 10.0),
            ClassRef::Name("car".into()),
        ));

        let (content, outcome) =
            to_yolo_string(&record, Path::new("img.txt"), &catalog).expect("render");

        assert_eq!(
            content,
            "1 0.2450000000000000 0.2400000000000000 0.5000000000000000 0.5000000000000000\n"
        );
        assert_eq!(outcome.written, 1);
        assert!(matches!(
            outcome.dropped[0],
            RslabelError::UnresolvableClass { .. }
        ));
    }

    #[test]
    fn read_restores_pixel_corners() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let label = temp.path().join("img.txt");
        fs::write(
            &label,
            "1 0.2450000000000000 0.2400000000000000 0.5000000000000000 0.5000000000000000\n\
             7 0.5 0.5 0.1 0.1\n\
             bad line\n",
        )
        .expect("write label");

        let catalog = ClassCatalog::new(["plane", "ship"]).expect("catalog");
        let outcome = read_yolo_file(
            Path::new("img.jpg"),
            &label,
            ImageInfo::new(200, 100, 3),
            Some(&catalog),
        )
        .expect("read");

        assert_eq!(outcome.record.boxes.len(), 1);
        assert_eq!(outcome.dropped.len(), 2);
        let labeled = &outcome.record.boxes[0];
        assert_eq!(labeled.bbox, BBoxXYXY::from_xyxy(0.0, 0.0, 100.0, 50.0));
        assert_eq!(labeled.class.name(Some(&catalog)), Some("ship"));
    }

    #[test]
    fn writer_requires_image_size() {
        let catalog = ClassCatalog::new(["plane"]).expect("catalog");
        let record = AnnotationRecord::new("img.jpg", "img.xml");
        let err = to_yolo_string(&record, Path::new("img.txt"), &catalog).unwrap_err();
        assert!(matches!(err, RslabelError::MissingRequiredField { .. }));
    }
}
