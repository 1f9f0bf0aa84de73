//! Directory conversion between label formats.
//!
//! [`convert_directory`] reads every label file of one format, pairs it with
//! its image, and writes the same boxes in another format into a sibling
//! directory named after the target. Files are independent and run in
//! parallel; a bad file is skipped and reported, never fatal.

pub mod report;

pub use report::{BoxCounts, ConversionReport, FileCounts};

use std::path::{Component, Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;

pub use crate::ir::Format;

use crate::error::RslabelError;
use crate::fsutil::{ensure_dir, file_in, label_pairs, LabelPair};
use crate::imaging::{ImageProbe, RasterBackend};
use crate::ir::{check_catalog, ensure_image_info, read_record, write_record, ClassCatalog};
use crate::issue::Issue;

/// Options for [`convert_directory`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvertOptions {
    /// Leave out generic-box objects flagged difficult.
    pub skip_difficult: bool,
}

/// What one label file contributed to the report.
#[derive(Debug, Default)]
struct FileOutcome {
    read: usize,
    written: usize,
    dropped: Vec<Issue>,
}

/// Directory converted labels are written to: `<labels_dir>/../<TARGET>`.
///
/// Lexical only. A `labels_dir` that ends in `.` or `..` (or is a root) has
/// no named last component to replace, so `..` is appended instead.
pub fn output_dir_for(labels_dir: &Path, to: Format) -> PathBuf {
    let labels_dir: PathBuf = labels_dir
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    let parent = match labels_dir.file_name() {
        Some(_) => labels_dir.parent().map(Path::to_path_buf).unwrap_or_default(),
        None => labels_dir.join(".."),
    };
    parent.join(to.dir_name())
}

/// Converts every `from` label in `labels_dir` to `to`, probing image sizes
/// from files in `images_dir`.
pub fn convert_directory(
    from: Format,
    to: Format,
    images_dir: &Path,
    labels_dir: &Path,
    catalog: Option<&ClassCatalog>,
    options: ConvertOptions,
) -> Result<ConversionReport, RslabelError> {
    convert_directory_with(
        &RasterBackend,
        from,
        to,
        images_dir,
        labels_dir,
        catalog,
        options,
    )
}

/// [`convert_directory`] with a caller-supplied image probe.
///
/// Returns an error only for configuration problems (an undefined format
/// pair, a missing catalog) or an unlistable labels directory. Everything
/// else is recorded in the report.
pub fn convert_directory_with<P: ImageProbe + Sync>(
    probe: &P,
    from: Format,
    to: Format,
    images_dir: &Path,
    labels_dir: &Path,
    catalog: Option<&ClassCatalog>,
    options: ConvertOptions,
) -> Result<ConversionReport, RslabelError> {
    check_pair(from, to, catalog)?;

    let output_dir = output_dir_for(labels_dir, to);
    ensure_dir(&output_dir)?;

    let pairs = label_pairs(
        images_dir,
        labels_dir,
        from.label_extension(),
        from.image_extension(),
    )?;
    info!(
        "Converting {} {from} label file(s) in {} to {to}",
        pairs.len(),
        labels_dir.display()
    );

    let results: Vec<(&LabelPair, Result<FileOutcome, RslabelError>)> = pairs
        .par_iter()
        .map(|pair| {
            let result = convert_file(probe, from, to, pair, &output_dir, catalog, options);
            (pair, result)
        })
        .collect();

    let mut report = ConversionReport::new(from.name(), to.name());
    report.output_dir = output_dir.display().to_string();
    report.files.seen = pairs.len();

    for (pair, result) in results {
        match result {
            Ok(outcome) => {
                report.files.converted += 1;
                report.boxes.read += outcome.read;
                report.boxes.written += outcome.written;
                report.boxes.dropped += outcome.dropped.len();
                report.issues.extend(outcome.dropped);
            }
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                warn!("Skipping {}: {error}", pair.label_path.display());
                report.files.skipped += 1;
                report.add(Issue::file_skipped(&pair.label_path, &error));
            }
        }
    }

    info!(
        "Converted {} of {} file(s) to {}",
        report.files.converted,
        report.files.seen,
        output_dir.display()
    );
    Ok(report)
}

fn check_pair(
    from: Format,
    to: Format,
    catalog: Option<&ClassCatalog>,
) -> Result<(), RslabelError> {
    if from == to || !to.is_writable() {
        return Err(RslabelError::UnsupportedFormatPair {
            from: from.name().to_string(),
            to: to.name().to_string(),
        });
    }

    check_catalog(from, to, catalog)
}

fn convert_file<P: ImageProbe>(
    probe: &P,
    from: Format,
    to: Format,
    pair: &LabelPair,
    output_dir: &Path,
    catalog: Option<&ClassCatalog>,
    options: ConvertOptions,
) -> Result<FileOutcome, RslabelError> {
    debug!("Converting {}", pair.label_path.display());

    let read = read_record(
        from,
        &pair.image_path,
        &pair.label_path,
        catalog,
        options.skip_difficult,
        probe,
    )?;
    let mut record = read.record;
    let mut outcome = FileOutcome {
        read: record.boxes.len() + read.dropped.len(),
        ..Default::default()
    };
    outcome.dropped.extend(
        read.dropped
            .iter()
            .map(|error| Issue::box_dropped(&pair.label_path, error)),
    );

    // Both writers need the image size.
    ensure_image_info(&mut record, probe)?;

    let stem = pair.label_path.file_stem().unwrap_or_default();
    let out_path = file_in(output_dir, stem, to.label_extension());
    let written = write_record(to, &record, &out_path, catalog)?;

    outcome.written = written.written;
    outcome.dropped.extend(
        written
            .dropped
            .iter()
            .map(|error| Issue::box_dropped(&out_path, error)),
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ImageInfo;
    use std::fs;

    struct FixedProbe(ImageInfo);

    impl ImageProbe for FixedProbe {
        fn probe(&self, _path: &Path) -> Result<ImageInfo, RslabelError> {
            Ok(self.0)
        }
    }

    fn dataset(root: &Path, labels: &[(&str, &str)], images: &[&str]) -> (PathBuf, PathBuf) {
        let images_dir = root.join("images");
        let labels_dir = root.join("labelTxt");
        fs::create_dir_all(&images_dir).expect("images dir");
        fs::create_dir_all(&labels_dir).expect("labels dir");
        for (name, content) in labels {
            fs::write(labels_dir.join(name), content).expect("write label");
        }
        for name in images {
            fs::write(images_dir.join(name), b"").expect("write image");
        }
        (images_dir, labels_dir)
    }

    #[test]
    fn undefined_pairs_are_fatal() {
        let dota = ClassCatalog::dota();
        for (from, to) in [(Format::Voc, Format::Voc), (Format::Voc, Format::Dota)] {
            let err = check_pair(from, to, Some(&dota)).unwrap_err();
            assert!(matches!(err, RslabelError::UnsupportedFormatPair { .. }));
            assert!(err.is_fatal());
        }
        assert!(check_pair(Format::Voc, Format::Yolo, None).is_err());
        assert!(check_pair(Format::Dota, Format::Voc, None).is_ok());
    }

    #[test]
    fn output_lands_in_sibling_directory() {
        assert_eq!(
            output_dir_for(Path::new("data/labels"), Format::Yolo),
            PathBuf::from("data/YOLO")
        );
        assert_eq!(
            output_dir_for(Path::new("./data/labels/"), Format::Yolo),
            PathBuf::from("data/YOLO")
        );
        assert_eq!(
            output_dir_for(Path::new("labels"), Format::Voc),
            PathBuf::from("VOC")
        );
    }

    #[test]
    fn output_for_dot_directories_climbs_one_level() {
        assert_eq!(output_dir_for(Path::new("."), Format::Voc), PathBuf::from("../VOC"));
        assert_eq!(output_dir_for(Path::new(".."), Format::Voc), PathBuf::from("../../VOC"));
        assert_eq!(
            output_dir_for(Path::new("data/.."), Format::Yolo),
            PathBuf::from("data/../../YOLO")
        );
    }

    #[test]
    fn dota_to_voc_skips_bad_files_and_keeps_going() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let (images_dir, labels_dir) = dataset(
            temp.path(),
            &[
                ("P0001.txt", "imagesource:GoogleEarth\ngsd:0.5\n0 0 100 0 100 50 0 50 plane 0\n"),
                ("P0002.txt", "0 0 10 0 10 10 0 10 ship 1\n1 2 3\n"),
                ("P0003.txt", "0 0 10 0 10 10 0 10 ship 0\n"),
            ],
            &["P0001.png", "P0002.png"],
        );

        let report = convert_directory_with(
            &FixedProbe(ImageInfo::new(200, 100, 3)),
            Format::Dota,
            Format::Voc,
            &images_dir,
            &labels_dir,
            Some(&ClassCatalog::dota()),
            ConvertOptions::default(),
        )
        .expect("convert");

        assert_eq!(
            report.files,
            FileCounts {
                seen: 3,
                converted: 2,
                skipped: 1
            }
        );
        assert_eq!(
            report.boxes,
            BoxCounts {
                read: 3,
                written: 2,
                dropped: 1
            }
        );
        assert_eq!(report.skipped_files().count(), 1);

        let xml = fs::read_to_string(temp.path().join("VOC").join("P0001.xml")).expect("read xml");
        assert!(xml.contains("<name>plane</name>"));
        assert!(xml.contains("<xmax>100</xmax>"));
        assert!(xml.contains("<ymax>50</ymax>"));
        assert!(xml.contains("<width>200</width>"));
        assert!(!temp.path().join("VOC").join("P0003.xml").exists());
    }

    #[test]
    fn voc_to_yolo_honors_skip_difficult() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let xml = "<annotation><size><width>200</width><height>100</height><depth>3</depth></size>\
                   <object><name>plane</name><difficult>1</difficult>\
                   <bndbox><xmin>0</xmin><ymin>0</ymin><xmax>10</xmax><ymax>10</ymax></bndbox></object>\
                   <object><name>ship</name>\
                   <bndbox><xmin>0</xmin><ymin>0</ymin><xmax>100</xmax><ymax>50</ymax></bndbox></object>\
                   </annotation>";
        let (images_dir, labels_dir) = dataset(temp.path(), &[("a.xml", xml)], &[]);
        let catalog = ClassCatalog::new(["plane", "ship"]).expect("catalog");

        let report = convert_directory_with(
            &FixedProbe(ImageInfo::new(1, 1, 3)),
            Format::Voc,
            Format::Yolo,
            &images_dir,
            &labels_dir,
            Some(&catalog),
            ConvertOptions {
                skip_difficult: true,
            },
        )
        .expect("convert");

        assert_eq!(report.files.converted, 1);
        let lines =
            fs::read_to_string(temp.path().join("YOLO").join("a.txt")).expect("read yolo");
        assert_eq!(
            lines,
            "1 0.2450000000000000 0.2400000000000000 0.5000000000000000 0.5000000000000000\n"
        );
    }
}
