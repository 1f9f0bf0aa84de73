//! Generic-box (Pascal VOC style) XML reader and writer.
//!
//! One XML document per image: `size/{width,height,depth}` followed by
//! repeated `object/{name,truncated,difficult,bndbox/{xmin,ymin,xmax,ymax}}`.
//! Corners are read as floating point and written back as integers.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use roxmltree::{Document, Node};

use super::catalog::ClassCatalog;
use super::model::{AnnotationRecord, ClassRef, ImageInfo, LabeledBox, ReadOutcome, WriteOutcome};
use super::BBoxXYXY;
use crate::error::RslabelError;
use crate::fsutil::write_atomic;

/// Channel count assumed when `size/depth` is absent.
const DEFAULT_DEPTH: u8 = 3;

/// Read one generic-box XML label.
///
/// With a `catalog`, objects whose name is not in it are dropped. With
/// `skip_difficult`, objects flagged difficult are left out of the record.
pub fn read_voc_file(
    image_path: &Path,
    label_path: &Path,
    catalog: Option<&ClassCatalog>,
    skip_difficult: bool,
) -> Result<ReadOutcome, RslabelError> {
    let xml =
        fs::read_to_string(label_path).map_err(|source| RslabelError::path_io(label_path, source))?;
    parse_voc_str(&xml, image_path, label_path, catalog, skip_difficult)
}

/// Parse generic-box XML already held in memory.
pub fn parse_voc_str(
    xml: &str,
    image_path: &Path,
    label_path: &Path,
    catalog: Option<&ClassCatalog>,
    skip_difficult: bool,
) -> Result<ReadOutcome, RslabelError> {
    let document = Document::parse(xml).map_err(|source| RslabelError::VocXmlParse {
        path: label_path.to_path_buf(),
        message: source.to_string(),
    })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(RslabelError::VocXmlParse {
            path: label_path.to_path_buf(),
            message: "missing <annotation> root element".to_string(),
        });
    }

    let mut record = AnnotationRecord::new(image_path, label_path);
    record.image = parse_size(annotation, label_path)?;
    let mut outcome = ReadOutcome::new(record);

    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        match parse_object(&document, object, label_path, catalog) {
            Ok(labeled) if skip_difficult && labeled.difficult => {
                debug!(
                    "{}: skipping difficult '{}' object",
                    label_path.display(),
                    labeled.class
                );
            }
            Ok(labeled) => outcome.record.push(labeled),
            Err(error) => outcome.drop_box(error),
        }
    }

    Ok(outcome)
}

/// Parse generic-box XML from bytes, discarding the result.
///
/// The input must be valid UTF-8. Used by the fuzz targets.
pub fn from_voc_xml_slice(bytes: &[u8]) -> Result<(), RslabelError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| RslabelError::VocXmlParse {
        path: PathBuf::from("<memory>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    let memory = Path::new("<memory>");
    parse_voc_str(xml, memory, memory, None, false)?;
    Ok(())
}

/// Write `record` as an indented XML document at `path`.
///
/// The record must carry image dimensions. A box whose class cannot be named
/// or whose corners are not finite is skipped; the rest are still written.
pub fn write_voc_file(
    record: &AnnotationRecord,
    path: &Path,
    catalog: Option<&ClassCatalog>,
) -> Result<WriteOutcome, RslabelError> {
    let (xml, outcome) = to_voc_xml_string(record, path, catalog)?;
    write_atomic(path, xml.as_bytes())?;
    Ok(outcome)
}

/// Render `record` as XML without touching the file system.
pub fn to_voc_xml_string(
    record: &AnnotationRecord,
    path: &Path,
    catalog: Option<&ClassCatalog>,
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
    let mut xml = String::new();

    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<annotation>\n");
    xml.push_str(&format!(
        "  <folder>{}</folder>\n",
        xml_escape(&record.image_folder_name())
    ));
    xml.push_str(&format!(
        "  <filename>{}</filename>\n",
        xml_escape(&record.image_file_name())
    ));
    xml.push_str("  <source>\n    <database>Unknown</database>\n  </source>\n");
    xml.push_str("  <size>\n");
    xml.push_str(&format!("    <width>{}</width>\n", info.width));
    xml.push_str(&format!("    <height>{}</height>\n", info.height));
    xml.push_str(&format!("    <depth>{}</depth>\n", info.depth));
    xml.push_str("  </size>\n");
    xml.push_str("  <segmented>0</segmented>\n");

    for labeled in &record.boxes {
        let Some(name) = labeled.class.name(catalog) else {
            outcome.drop_box(RslabelError::UnresolvableClass {
                path: path.to_path_buf(),
                class: labeled.class.to_string(),
            });
            continue;
        };

        if !labeled.bbox.is_finite() {
            outcome.drop_box(RslabelError::MissingRequiredField {
                path: path.to_path_buf(),
                field: "bndbox".to_string(),
                message: format!("'{name}' has non-finite corners {:?}", labeled.bbox),
            });
            continue;
        }

        xml.push_str("  <object>\n");
        xml.push_str(&format!("    <name>{}</name>\n", xml_escape(name)));
        xml.push_str("    <pose>Unspecified</pose>\n");
        xml.push_str(&format!(
            "    <truncated>{}</truncated>\n",
            u8::from(labeled.truncated)
        ));
        xml.push_str(&format!(
            "    <difficult>{}</difficult>\n",
            u8::from(labeled.difficult)
        ));
        xml.push_str("    <bndbox>\n");
        xml.push_str(&format!("      <xmin>{}</xmin>\n", pixel(labeled.bbox.xmin())));
        xml.push_str(&format!("      <ymin>{}</ymin>\n", pixel(labeled.bbox.ymin())));
        xml.push_str(&format!("      <xmax>{}</xmax>\n", pixel(labeled.bbox.xmax())));
        xml.push_str(&format!("      <ymax>{}</ymax>\n", pixel(labeled.bbox.ymax())));
        xml.push_str("    </bndbox>\n");
        xml.push_str("  </object>\n");
        outcome.written += 1;
    }

    xml.push_str("</annotation>\n");
    Ok((xml, outcome))
}

fn parse_size(annotation: Node<'_, '_>, path: &Path) -> Result<Option<ImageInfo>, RslabelError> {
    let Some(size) = child_element(annotation, "size") else {
        return Ok(None);
    };

    let width = parse_size_field(size, "width", path, f64::from(u32::MAX))?;
    let height = parse_size_field(size, "height", path, f64::from(u32::MAX))?;
    let depth = parse_size_field(size, "depth", path, f64::from(u8::MAX))?
        .map_or(DEFAULT_DEPTH, |depth| depth as u8);

    // Some tools write 0x0 sizes; treat those as unknown so the image is probed.
    Ok(match (width, height) {
        (Some(width), Some(height)) if width >= 1.0 && height >= 1.0 => {
            Some(ImageInfo::new(width as u32, height as u32, depth))
        }
        _ => None,
    })
}

/// Reads a `<size>` child as a whole number. Some writers emit `500.0`.
fn parse_size_field(
    size: Node<'_, '_>,
    tag: &str,
    path: &Path,
    max: f64,
) -> Result<Option<f64>, RslabelError> {
    optional_child_text(size, tag)
        .map(|raw| match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && (0.0..=max).contains(&value) => Ok(value.trunc()),
            _ => Err(RslabelError::VocXmlParse {
                path: path.to_path_buf(),
                message: format!("invalid <{tag}> value '{raw}' in <size>"),
            }),
        })
        .transpose()
}

fn parse_object(
    document: &Document<'_>,
    object: Node<'_, '_>,
    path: &Path,
    catalog: Option<&ClassCatalog>,
) -> Result<LabeledBox, RslabelError> {
    let name =
        optional_child_text(object, "name").ok_or_else(|| missing_field(path, "name", object))?;

    if let Some(catalog) = catalog {
        if catalog.id_of(&name).is_none() {
            return Err(RslabelError::UnresolvableClass {
                path: path.to_path_buf(),
                class: name,
            });
        }
    }

    let bndbox = child_element(object, "bndbox").ok_or_else(|| missing_field(path, "bndbox", object))?;
    let xmin = parse_corner(document, bndbox, "xmin", path)?;
    let ymin = parse_corner(document, bndbox, "ymin", path)?;
    let xmax = parse_corner(document, bndbox, "xmax", path)?;
    let ymax = parse_corner(document, bndbox, "ymax", path)?;

    let truncated = optional_child_text(object, "truncated")
        .map(|raw| parse_flag(&raw))
        .unwrap_or(false);
    let difficult = optional_child_text(object, "difficult")
        .map(|raw| parse_flag(&raw))
        .unwrap_or(false);

    Ok(LabeledBox::new(
        BBoxXYXY::from_xyxy(xmin, ymin, xmax, ymax),
        ClassRef::Name(name),
    )
    .with_truncated(truncated)
    .with_difficult(difficult))
}

fn parse_corner(
    document: &Document<'_>,
    bndbox: Node<'_, '_>,
    tag: &str,
    path: &Path,
) -> Result<f64, RslabelError> {
    let node = child_element(bndbox, tag).ok_or_else(|| missing_field(path, tag, bndbox))?;
    let raw = node.text().map(str::trim).unwrap_or_default();
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| RslabelError::MalformedLine {
            path: path.to_path_buf(),
            line: document.text_pos_at(node.range().start).row as usize,
            message: format!("invalid <{tag}> value '{raw}'; expected a number"),
        })
}

fn missing_field(path: &Path, tag: &str, parent: Node<'_, '_>) -> RslabelError {
    RslabelError::MissingRequiredField {
        path: path.to_path_buf(),
        field: tag.to_string(),
        message: format!("no <{tag}> in <{}>", parent.tag_name().name()),
    }
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

/// Anything but an explicit "no" counts as set.
fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no"
    )
}

/// Corners are written as integers, truncated toward zero.
fn pixel(value: f64) -> i64 {
    value.trunc() as i64
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <filename>P0001.png</filename>
  <size>
    <width>640</width>
    <height>480</height>
    <depth>3</depth>
  </size>
  <object>
    <name>plane</name>
    <truncated>1</truncated>
    <bndbox>
      <xmin>10.6</xmin>
      <ymin>20</ymin>
      <xmax>30</xmax>
      <ymax>40</ymax>
    </bndbox>
  </object>
  <object>
    <name>ship</name>
    <difficult>1</difficult>
    <bndbox>
      <xmin>1</xmin>
      <ymin>2</ymin>
      <xmax>3</xmax>
    </bndbox>
  </object>
  <object>
    <name>ship</name>
    <difficult>0</difficult>
    <bndbox>
      <xmin>50</xmin>
      <ymin>60</ymin>
      <xmax>70</xmax>
      <ymax>80</ymax>
    </bndbox>
  </object>
</annotation>"#;

    fn parse(xml: &str, catalog: Option<&ClassCatalog>, skip_difficult: bool) -> ReadOutcome {
        parse_voc_str(
            xml,
            Path::new("images/P0001.png"),
            Path::new("labels/P0001.xml"),
            catalog,
            skip_difficult,
        )
        .expect("parse xml")
    }

    #[test]
    fn parse_reads_size_flags_and_corners() {
        let outcome = parse(SAMPLE, None, false);
        let record = &outcome.record;

        assert_eq!(record.image, Some(ImageInfo::new(640, 480, 3)));
        assert_eq!(record.boxes.len(), 2);
        assert_eq!(outcome.dropped.len(), 1);
        assert!(matches!(
            outcome.dropped[0],
            RslabelError::MissingRequiredField { ref field, .. } if field == "ymax"
        ));

        let first = &record.boxes[0];
        assert_eq!(first.class, ClassRef::Name("plane".into()));
        assert!(first.truncated);
        assert!(!first.difficult);
        assert!((first.bbox.xmin() - 10.6).abs() < 1e-9);

        let second = &record.boxes[1];
        assert!(!second.truncated);
        assert!(!second.difficult);
    }

    #[test]
    fn catalog_drops_unknown_names() {
        let catalog = ClassCatalog::new(["plane"]).expect("catalog");
        let outcome = parse(SAMPLE, Some(&catalog), false);
        assert_eq!(outcome.record.boxes.len(), 1);
        assert!(outcome
            .dropped
            .iter()
            .any(|err| matches!(err, RslabelError::UnresolvableClass { class, .. } if class == "ship")));
    }

    #[test]
    fn skip_difficult_filters_flagged_objects() {
        let xml = SAMPLE.replace("<difficult>0</difficult>", "<difficult>1</difficult>");
        let outcome = parse(&xml, None, true);
        assert_eq!(outcome.record.boxes.len(), 1);
        assert_eq!(outcome.record.boxes[0].class, ClassRef::Name("plane".into()));
    }

    #[test]
    fn invalid_corner_reports_line() {
        let xml = SAMPLE.replace("<ymin>20</ymin>", "<ymin>abc</ymin>");
        let outcome = parse(&xml, None, false);
        let line = outcome.dropped.iter().find_map(|err| match err {
            RslabelError::MalformedLine { line, .. } => Some(*line),
            _ => None,
        });
        assert_eq!(line, Some(14));
    }

    #[test]
    fn missing_or_zero_size_is_unknown() {
        let xml = SAMPLE.replace("<width>640</width>", "<width>0</width>");
        assert_eq!(parse(&xml, None, false).record.image, None);

        let xml = "<annotation><filename>a.jpg</filename></annotation>";
        assert_eq!(parse(xml, None, false).record.image, None);
    }

    #[test]
    fn fractional_size_text_reads_as_whole_pixels() {
        let xml = SAMPLE
            .replace("<width>640</width>", "<width>640.0</width>")
            .replace("<height>480</height>", "<height>480.0</height>");
        assert_eq!(
            parse(&xml, None, false).record.image,
            Some(ImageInfo::new(640, 480, 3))
        );

        for bad in ["-5", "inf", "wide"] {
            let xml = SAMPLE.replace("<width>640</width>", &format!("<width>{bad}</width>"));
            let err = parse_voc_str(&xml, Path::new("a.jpg"), Path::new("a.xml"), None, false)
                .unwrap_err();
            assert!(matches!(err, RslabelError::VocXmlParse { .. }), "{bad}");
        }
    }

    #[test]
    fn wrong_root_is_a_parse_error() {
        let err = parse_voc_str(
            "<labels/>",
            Path::new("a.jpg"),
            Path::new("a.xml"),
            None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, RslabelError::VocXmlParse { .. }));
    }

    #[test]
    fn writer_emits_integer_corners_and_skips_bad_boxes() {
        let mut record = AnnotationRecord::new("data/images/P0001.png", "data/labels/P0001.txt")
            .with_image_info(ImageInfo::new(200, 100, 3));
        record.push(
            LabeledBox::new(
                BBoxXYXY::from_xyxy(0.0, 0.9, 100.7, 50.0),
                ClassRef::Name("plane & co".into()),
            )
            .with_difficult(true),
        );
        record.push(LabeledBox::new(
            BBoxXYXY::from_xyxy(f64::NAN, 0.0, 1.0, 1.0),
            ClassRef::Name("ship".into()),
        ));
        record.push(LabeledBox::new(
            BBoxXYXY::from_xyxy(1.0, 1.0, 2.0, 2.0),
            ClassRef::Id(crate::ir::ClassId(5)),
        ));

        let (xml, outcome) =
            to_voc_xml_string(&record, Path::new("out/P0001.xml"), None).expect("render xml");

        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.dropped.len(), 2);
        assert!(xml.contains("<folder>images</folder>"));
        assert!(xml.contains("<filename>P0001.png</filename>"));
        assert!(xml.contains("<name>plane &amp; co</name>"));
        assert!(xml.contains("<difficult>1</difficult>"));
        assert!(xml.contains("<ymin>0</ymin>"));
        assert!(xml.contains("<xmax>100</xmax>"));
        assert!(xml.contains("    <depth>3</depth>\n"));

        // Written document parses back.
        let reread = parse(&xml, None, false);
        assert_eq!(reread.record.boxes.len(), 1);
        assert_eq!(reread.record.image, Some(ImageInfo::new(200, 100, 3)));
    }

    #[test]
    fn writer_requires_image_size() {
        let record = AnnotationRecord::new("a.jpg", "a.txt");
        let err = to_voc_xml_string(&record, Path::new("a.xml"), None).unwrap_err();
        assert!(matches!(err, RslabelError::MissingRequiredField { .. }));
    }

    #[test]
    fn flags_follow_zero_means_false() {
        assert!(!parse_flag("0"));
        assert!(!parse_flag("no"));
        assert!(parse_flag("1"));
        assert!(parse_flag("2"));
        assert!(parse_flag("yes"));
    }
}
