//! The format-independent annotation record.
//!
//! Every reader produces an [`AnnotationRecord`] for one label file and every
//! writer consumes one. Formats differ only in how they serialize it, so there
//! is no per-format record type.

use std::path::{Path, PathBuf};

use log::warn;

use super::bbox::BBoxXYXY;
use super::catalog::ClassCatalog;
use super::ids::ClassId;
use super::space::Pixel;
use crate::error::RslabelError;

/// How a box names its class.
///
/// Name-based formats carry a [`ClassRef::Name`]; index-based formats carry a
/// [`ClassRef::Id`]. Writers resolve either against a [`ClassCatalog`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassRef {
    Name(String),
    Id(ClassId),
}

impl ClassRef {
    /// Returns the class name, consulting `catalog` for index references.
    pub fn name<'a>(&'a self, catalog: Option<&'a ClassCatalog>) -> Option<&'a str> {
        match self {
            ClassRef::Name(name) => Some(name),
            ClassRef::Id(id) => catalog.and_then(|catalog| catalog.name_of(*id)),
        }
    }

    /// Returns the class index in `catalog`.
    pub fn id(&self, catalog: &ClassCatalog) -> Option<ClassId> {
        match self {
            ClassRef::Name(name) => catalog.id_of(name),
            ClassRef::Id(id) => catalog.name_of(*id).map(|_| *id),
        }
    }
}

impl std::fmt::Display for ClassRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassRef::Name(name) => write!(f, "{name}"),
            ClassRef::Id(id) => write!(f, "#{id}"),
        }
    }
}

/// One bounding box with its class and the two VOC-style flags.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledBox {
    pub bbox: BBoxXYXY<Pixel>,
    pub class: ClassRef,
    pub truncated: bool,
    pub difficult: bool,
}

impl LabeledBox {
    pub fn new(bbox: BBoxXYXY<Pixel>, class: ClassRef) -> Self {
        Self {
            bbox,
            class,
            truncated: false,
            difficult: false,
        }
    }

    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    pub fn with_difficult(mut self, difficult: bool) -> Self {
        self.difficult = difficult;
        self
    }
}

/// Image dimensions and channel count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u8,
}

impl ImageInfo {
    pub fn new(width: u32, height: u32, depth: u8) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

/// All annotations of one image.
///
/// `image` is filled lazily: formats that store the image size (generic-box
/// XML) set it while reading, the rest leave it empty until a consumer needs
/// it.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationRecord {
    pub image_path: PathBuf,
    pub label_path: PathBuf,
    pub image: Option<ImageInfo>,
    /// Boxes in source-file order.
    pub boxes: Vec<LabeledBox>,
}

impl AnnotationRecord {
    pub fn new(image_path: impl Into<PathBuf>, label_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            label_path: label_path.into(),
            image: None,
            boxes: Vec::new(),
        }
    }

    pub fn with_image_info(mut self, info: ImageInfo) -> Self {
        self.image = Some(info);
        self
    }

    pub fn push(&mut self, labeled: LabeledBox) {
        self.boxes.push(labeled);
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// File name of the image, used for the `filename` element of XML labels.
    pub fn image_file_name(&self) -> String {
        self.image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Name of the directory holding the image, or `images` when unknown.
    pub fn image_folder_name(&self) -> String {
        self.image_path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "images".to_string())
    }
}

/// A record read from one label file, plus the boxes dropped on the way.
///
/// Data errors on a single box (bad line, unknown class, missing field) never
/// fail the file; they are collected here and logged.
#[derive(Debug)]
pub struct ReadOutcome {
    pub record: AnnotationRecord,
    pub dropped: Vec<RslabelError>,
}

impl ReadOutcome {
    pub fn new(record: AnnotationRecord) -> Self {
        Self {
            record,
            dropped: Vec::new(),
        }
    }

    pub(crate) fn drop_box(&mut self, error: RslabelError) {
        warn!("dropping box: {error}");
        self.dropped.push(error);
    }
}

/// What a writer emitted for one record.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub written: usize,
    pub dropped: Vec<RslabelError>,
}

impl WriteOutcome {
    pub(crate) fn drop_box(&mut self, error: RslabelError) {
        warn!("skipping box on write: {error}");
        self.dropped.push(error);
    }
}
