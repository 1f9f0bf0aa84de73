//! Intermediate Representation (IR) for rslabel.
//!
//! Every label format is read into, and written from, one format-independent
//! [`AnnotationRecord`] per image. Boxes are stored as corner pairs in pixel
//! space; the normalized-center encoding only exists at the edge of the
//! normalized-center adapter.
//!
//! # Design Principles
//!
//! 1. **Type Safety**: coordinates carry a space marker and class indices a
//!    newtype, so a raw dataset code is never mistaken for a catalog index.
//!
//! 2. **Explicit catalogs**: a [`ClassCatalog`] is passed to every reader and
//!    writer that maps between names and indices. There is no global default.
//!
//! 3. **Permissive Construction**: IR types allow degenerate boxes; readers
//!    record what the file says and report, rather than panic on, bad data.
//!
//! # Example
//!
//! ```
//! use rslabel::ir::{AnnotationRecord, BBoxXYXY, ClassRef, ImageInfo, LabeledBox, Pixel};
//!
//! let mut record = AnnotationRecord::new("images/P0001.png", "labels/P0001.txt")
//!     .with_image_info(ImageInfo::new(200, 100, 3));
//! record.push(LabeledBox::new(
//!     BBoxXYXY::<Pixel>::from_xyxy(0.0, 0.0, 100.0, 50.0),
//!     ClassRef::Name("plane".into()),
//! ));
//!
//! let center = record.boxes[0].bbox.to_center_size(200, 100);
//! assert_eq!(center.w, 0.5);
//! ```

mod bbox;
mod catalog;
mod coord;
mod format;
mod ids;
pub mod io_dota;
pub mod io_vhr;
pub mod io_visdrone;
pub mod io_voc_xml;
pub mod io_yolo;
mod lines;
mod model;
mod space;

// Re-export core types for convenient access
pub use bbox::{BBoxXYXY, CenterSize};
pub use catalog::{ClassCatalog, BUILTIN_CATALOGS};
pub use coord::Coord;
pub use format::{check_catalog, ensure_image_info, read_record, write_record, Format};
pub use ids::ClassId;
pub use model::{
    AnnotationRecord, ClassRef, ImageInfo, LabeledBox, ReadOutcome, WriteOutcome,
};
pub use space::Pixel;
