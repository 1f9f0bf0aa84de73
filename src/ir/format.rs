//! The supported label formats and per-format dispatch to the readers and
//! writers.

use std::fmt;
use std::path::Path;

use super::catalog::ClassCatalog;
use super::model::{AnnotationRecord, ImageInfo, ReadOutcome, WriteOutcome};
use super::{io_dota, io_vhr, io_visdrone, io_voc_xml, io_yolo};
use crate::error::RslabelError;
use crate::imaging::ImageProbe;

/// Label format identifier, decoupled from the CLI's value enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Generic-box XML, one document per image.
    Voc,
    /// Normalized-center text lines.
    Yolo,
    /// Oriented-polygon text lines.
    Dota,
    /// Frame-delta comma-separated lines.
    VisDrone,
    /// Parenthesized-corner comma-separated lines.
    Vhr,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Voc,
        Format::Yolo,
        Format::Dota,
        Format::VisDrone,
        Format::Vhr,
    ];

    /// Human-readable name for the format.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Voc => "voc",
            Format::Yolo => "yolo",
            Format::Dota => "dota",
            Format::VisDrone => "visdrone",
            Format::Vhr => "vhr",
        }
    }

    /// Name of the sibling directory converted labels land in.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Format::Voc => "VOC",
            Format::Yolo => "YOLO",
            Format::Dota => "DOTA",
            Format::VisDrone => "VISDRONE",
            Format::Vhr => "VHR",
        }
    }

    pub fn label_extension(&self) -> &'static str {
        match self {
            Format::Voc => "xml",
            Format::Yolo | Format::Dota | Format::VisDrone | Format::Vhr => "txt",
        }
    }

    /// Extension of the images that usually accompany this format's labels.
    pub fn image_extension(&self) -> &'static str {
        match self {
            Format::Dota => "png",
            Format::Voc | Format::Yolo | Format::VisDrone | Format::Vhr => "jpg",
        }
    }

    /// Only the generic-box and normalized-center formats have writers.
    pub fn is_writable(&self) -> bool {
        matches!(self, Format::Voc | Format::Yolo)
    }

    /// Formats that store numeric class codes cannot be read without a
    /// catalog to name them.
    pub fn requires_catalog_to_read(&self) -> bool {
        matches!(self, Format::VisDrone | Format::Vhr)
    }

    /// The built-in catalog matching this format's public dataset, if any.
    pub fn default_catalog(&self) -> Option<ClassCatalog> {
        match self {
            Format::Dota => Some(ClassCatalog::dota()),
            Format::VisDrone => Some(ClassCatalog::visdrone()),
            Format::Vhr => Some(ClassCatalog::vhr()),
            Format::Voc | Format::Yolo => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Format {
    type Err = RslabelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| RslabelError::UnsupportedFormat(raw.to_string()))
    }
}

/// Reads the label at `label_path` in `format`.
///
/// The normalized-center format needs the image size, which is taken from
/// `probe`. With `skip_difficult`, difficult generic-box objects are left out.
pub fn read_record(
    format: Format,
    image_path: &Path,
    label_path: &Path,
    catalog: Option<&ClassCatalog>,
    skip_difficult: bool,
    probe: &dyn ImageProbe,
) -> Result<ReadOutcome, RslabelError> {
    match format {
        Format::Voc => io_voc_xml::read_voc_file(image_path, label_path, catalog, skip_difficult),
        Format::Yolo => {
            let info = probe_paired(probe, image_path, label_path)?;
            io_yolo::read_yolo_file(image_path, label_path, info, catalog)
        }
        Format::Dota => io_dota::read_dota_file(image_path, label_path, catalog),
        Format::VisDrone => io_visdrone::read_visdrone_file(
            image_path,
            label_path,
            require_catalog(format, catalog)?,
        ),
        Format::Vhr => {
            io_vhr::read_vhr_file(image_path, label_path, require_catalog(format, catalog)?)
        }
    }
}

/// Writes `record` to `path` in `format`.
///
/// The normalized-center writer needs a catalog to turn class names into
/// indices; the generic-box writer needs one only for index-based records.
pub fn write_record(
    format: Format,
    record: &AnnotationRecord,
    path: &Path,
    catalog: Option<&ClassCatalog>,
) -> Result<WriteOutcome, RslabelError> {
    match format {
        Format::Voc => io_voc_xml::write_voc_file(record, path, catalog),
        Format::Yolo => io_yolo::write_yolo_file(record, path, require_catalog(format, catalog)?),
        Format::Dota | Format::VisDrone | Format::Vhr => Err(RslabelError::UnsupportedFormat(
            format!("{format} labels are read-only"),
        )),
    }
}

/// Fills in `record.image` from `probe` when the label did not carry it.
pub fn ensure_image_info(
    record: &mut AnnotationRecord,
    probe: &dyn ImageProbe,
) -> Result<ImageInfo, RslabelError> {
    if let Some(info) = record.image {
        return Ok(info);
    }
    let info = probe_paired(probe, &record.image_path, &record.label_path)?;
    record.image = Some(info);
    Ok(info)
}

/// Fails unless `catalog` is present when reading `from` or writing `to`
/// needs one: code-based and index-based formats cannot name their classes
/// without it.
pub fn check_catalog(
    from: Format,
    to: Format,
    catalog: Option<&ClassCatalog>,
) -> Result<(), RslabelError> {
    let needs_catalog =
        from.requires_catalog_to_read() || from == Format::Yolo || to == Format::Yolo;
    if needs_catalog && catalog.is_none() {
        return Err(RslabelError::ClassCatalogInvalid {
            path: "<none>".into(),
            message: format!("reading {from} and writing {to} needs a class catalog"),
        });
    }
    Ok(())
}

fn probe_paired(
    probe: &dyn ImageProbe,
    image_path: &Path,
    label_path: &Path,
) -> Result<ImageInfo, RslabelError> {
    if !image_path.is_file() {
        return Err(RslabelError::ImageNotFound {
            label_path: label_path.to_path_buf(),
            expected: image_path.to_path_buf(),
        });
    }
    probe.probe(image_path)
}

fn require_catalog(
    format: Format,
    catalog: Option<&ClassCatalog>,
) -> Result<&ClassCatalog, RslabelError> {
    catalog.ok_or_else(|| RslabelError::ClassCatalogInvalid {
        path: "<none>".into(),
        message: format!("{format} labels need a class catalog"),
    })
}
