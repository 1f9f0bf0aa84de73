//! Image tiling and per-tile label derivation.
//!
//! Tiling and label splitting are separate passes that share one contract:
//! a tile of source `<stem>` at origin `(x, y)` is named `<stem>_<y>_<x>`.
//! [`tile_image_dir`] cuts images into tiles; [`split_label_dir`] recovers
//! each tile's origin from its name and derives the tile's labels from the
//! source image's full record without looking at pixels.
//!
//! A box belongs to a tile only when it lies fully inside it. Boxes that
//! straddle a tile edge are never clipped; they are left out of that tile.

pub mod report;

pub use report::{SourceCounts, TileBoxCounts, TilingReport};

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::error::RslabelError;
use crate::fsutil::{ensure_dir, file_in, find_image, list_files, IMAGE_EXTENSIONS};
use crate::imaging::{ImageBackend, ImageProbe, RasterBackend};
use crate::ir::{
    check_catalog, io_dota, io_vhr, io_visdrone, io_voc_xml, io_yolo, read_record, write_record,
    AnnotationRecord, BBoxXYXY, ClassCatalog, Format, ImageInfo, Pixel,
};
use crate::issue::Issue;

/// Tile edge used when none is given.
pub const DEFAULT_TILE_SIZE: u32 = 412;

/// Channel count assumed for tiles whose source depth is unknown.
const DEFAULT_DEPTH: u8 = 3;

/// Tile geometry and padding color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileOptions {
    pub tile_width: u32,
    pub tile_height: u32,
    /// Distance between neighbouring tile origins, on both axes.
    pub step: u32,
    /// RGB color for the padded border of undersized images.
    pub fill: [u8; 3],
}

impl Default for TileOptions {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE)
    }
}

impl TileOptions {
    pub fn new(tile_width: u32, tile_height: u32, step: u32) -> Self {
        Self {
            tile_width,
            tile_height,
            step,
            fill: [0, 0, 0],
        }
    }

    pub fn with_fill(mut self, fill: [u8; 3]) -> Self {
        self.fill = fill;
        self
    }

    /// Tile sizes and step must be positive.
    pub fn validate(&self) -> Result<(), RslabelError> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(RslabelError::InvalidTileSize {
                message: format!(
                    "tile size must be positive, got {}x{}",
                    self.tile_width, self.tile_height
                ),
            });
        }
        if self.step == 0 {
            return Err(RslabelError::InvalidTileSize {
                message: "step must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Top-left corner of a tile in source-image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileOrigin {
    pub x: u32,
    pub y: u32,
}

impl TileOrigin {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The tile's rectangle in source-image pixels.
    pub fn region(&self, tile_width: u32, tile_height: u32) -> BBoxXYXY<Pixel> {
        BBoxXYXY::from_xywh(
            self.x as f64,
            self.y as f64,
            tile_width as f64,
            tile_height as f64,
        )
    }
}

/// Lays a `tile_width` x `tile_height` grid with stride `step` over an image.
///
/// Origins are row-major. Along each axis the last tile is pulled back so its
/// far edge meets the image edge, overlapping its neighbour instead of running
/// off the image. An axis shorter than one tile gets a single origin at 0; the
/// image is padded up to the tile size when cut.
pub fn plan_tiles(
    image_width: u32,
    image_height: u32,
    tile_width: u32,
    tile_height: u32,
    step: u32,
) -> Result<Vec<TileOrigin>, RslabelError> {
    TileOptions::new(tile_width, tile_height, step).validate()?;

    let xs = axis_origins(image_width, tile_width, step);
    let ys = axis_origins(image_height, tile_height, step);
    Ok(ys
        .iter()
        .flat_map(|&y| xs.iter().map(move |&x| TileOrigin::new(x, y)))
        .collect())
}

fn axis_origins(len: u32, tile: u32, step: u32) -> Vec<u32> {
    if len <= tile {
        return vec![0];
    }

    let mut origins = Vec::new();
    let mut origin = 0u32;
    loop {
        if origin.saturating_add(tile) >= len {
            origins.push(len - tile);
            return origins;
        }
        origins.push(origin);
        origin = origin.saturating_add(step);
    }
}

/// File stem of the tile of `source_stem` at `origin`.
pub fn tile_file_stem(source_stem: &str, origin: TileOrigin) -> String {
    format!("{source_stem}_{}_{}", origin.y, origin.x)
}

/// Inverse of [`tile_file_stem`]: splits `<stem>_<y>_<x>` into the source
/// stem and origin. The source stem may itself contain underscores.
pub fn parse_tile_stem(stem: &str) -> Option<(&str, TileOrigin)> {
    let mut parts = stem.rsplitn(3, '_');
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let source = parts.next().filter(|source| !source.is_empty())?;
    Some((source, TileOrigin::new(x, y)))
}

/// Derives the record of one tile from the full-image record.
///
/// Keeps the boxes fully inside the tile, moved into tile coordinates. The
/// result is named after the tile, sized to the tile, and keeps the source
/// channel count.
pub fn derive_tile_record(
    full: &AnnotationRecord,
    origin: TileOrigin,
    tile_width: u32,
    tile_height: u32,
) -> AnnotationRecord {
    let region = origin.region(tile_width, tile_height);
    let depth = full.image.map(|info| info.depth).unwrap_or(DEFAULT_DEPTH);

    let mut tile = AnnotationRecord::new(
        tile_path(&full.image_path, origin),
        tile_path(&full.label_path, origin),
    )
    .with_image_info(ImageInfo::new(tile_width, tile_height, depth));

    for labeled in full
        .boxes
        .iter()
        .filter(|labeled| labeled.bbox.is_fully_inside(&region))
    {
        let mut moved = labeled.clone();
        moved.bbox = labeled.bbox.translate(origin.x as f64, origin.y as f64);
        tile.push(moved);
    }

    tile
}

fn tile_path(source: &Path, origin: TileOrigin) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = tile_file_stem(&stem, origin);
    if let Some(ext) = source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    source.with_file_name(name)
}

/// Tiles cut from one image.
#[derive(Debug, Default)]
pub struct CutTiles {
    pub written: Vec<PathBuf>,
    /// Tiles that could not be saved. The other tiles of the image are
    /// still written.
    pub failed: Vec<Issue>,
}

/// Cuts one image into tiles saved in `output_dir`.
///
/// Tiles keep the source extension. Undersized images are padded on the
/// right and bottom with `options.fill`.
pub fn tile_image<B: ImageBackend>(
    backend: &B,
    image_path: &Path,
    output_dir: &Path,
    options: &TileOptions,
) -> Result<CutTiles, RslabelError> {
    options.validate()?;
    let (info, pixels) = backend.load(image_path)?;
    let origins = plan_tiles(
        info.width,
        info.height,
        options.tile_width,
        options.tile_height,
        options.step,
    )?;

    let file_name = image_path.file_name().unwrap_or_default();
    let mut cut = CutTiles {
        written: Vec::with_capacity(origins.len()),
        failed: Vec::new(),
    };
    for origin in origins {
        let tile = backend.crop(
            &pixels,
            origin.x,
            origin.y,
            origin.x.saturating_add(options.tile_width),
            origin.y.saturating_add(options.tile_height),
        );
        let tile = backend.pad(tile, options.tile_width, options.tile_height, options.fill);
        let path = tile_path(&output_dir.join(file_name), origin);
        match backend.save(&tile, &path) {
            Ok(()) => cut.written.push(path),
            Err(error) => {
                warn!("Failed to write tile {}: {error}", path.display());
                cut.failed.push(Issue::file_skipped(&path, &error));
            }
        }
    }

    debug!(
        "Cut {} ({}x{}) into {} tile(s)",
        image_path.display(),
        info.width,
        info.height,
        cut.written.len()
    );
    Ok(cut)
}

/// Tiles every image in `images_dir` into `output_dir`.
pub fn tile_image_dir(
    images_dir: &Path,
    output_dir: &Path,
    options: &TileOptions,
) -> Result<TilingReport, RslabelError> {
    tile_image_dir_with(&RasterBackend, images_dir, output_dir, options)
}

/// [`tile_image_dir`] with a caller-supplied image backend.
pub fn tile_image_dir_with<B: ImageBackend>(
    backend: &B,
    images_dir: &Path,
    output_dir: &Path,
    options: &TileOptions,
) -> Result<TilingReport, RslabelError> {
    options.validate()?;
    ensure_dir(output_dir)?;

    let images = list_files(images_dir, &IMAGE_EXTENSIONS)?;
    info!(
        "Tiling {} image(s) from {} into {}x{} tiles with step {}",
        images.len(),
        images_dir.display(),
        options.tile_width,
        options.tile_height,
        options.step
    );

    let results: Vec<(&PathBuf, Result<CutTiles, RslabelError>)> = images
        .par_iter()
        .map(|image_path| (image_path, tile_image(backend, image_path, output_dir, options)))
        .collect();

    let mut report = TilingReport::new("tile");
    report.sources.seen = images.len();
    for (image_path, result) in results {
        match result {
            Ok(cut) => {
                report.sources.processed += 1;
                report.tiles_written += cut.written.len();
                report.tiles_failed += cut.failed.len();
                report.issues.extend(cut.failed);
            }
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                warn!("Skipping {}: {error}", image_path.display());
                report.sources.skipped += 1;
                report.add(Issue::file_skipped(image_path, &error));
            }
        }
    }

    info!(
        "Wrote {} tile(s) to {}",
        report.tiles_written,
        output_dir.display()
    );
    Ok(report)
}

/// Inputs of a label-splitting run.
#[derive(Clone, Copy, Debug)]
pub struct SplitLabels<'a> {
    /// Full-size images; probed when the source format needs image sizes.
    pub source_images_dir: &'a Path,
    pub source_labels_dir: &'a Path,
    pub source_format: Format,
    /// Tiles named `<stem>_<originY>_<originX>`.
    pub tile_images_dir: &'a Path,
    pub output_labels_dir: &'a Path,
    pub output_format: Format,
    pub catalog: Option<&'a ClassCatalog>,
    pub skip_difficult: bool,
}

#[derive(Debug, Default)]
struct SplitOutcome {
    tiles_written: usize,
    tiles_failed: usize,
    source_boxes: usize,
    kept: usize,
    outside: usize,
    issues: Vec<Issue>,
}

/// Writes a label file for every tile in `job.tile_images_dir`.
///
/// Tiles are grouped by source stem so each source record is read once.
pub fn split_label_dir(
    job: &SplitLabels<'_>,
    options: &TileOptions,
) -> Result<TilingReport, RslabelError> {
    split_label_dir_with(&RasterBackend, job, options)
}

/// [`split_label_dir`] with a caller-supplied image probe.
pub fn split_label_dir_with<P: ImageProbe + Sync>(
    probe: &P,
    job: &SplitLabels<'_>,
    options: &TileOptions,
) -> Result<TilingReport, RslabelError> {
    options.validate()?;
    if !job.output_format.is_writable() {
        return Err(RslabelError::UnsupportedFormatPair {
            from: job.source_format.name().to_string(),
            to: job.output_format.name().to_string(),
        });
    }
    check_catalog(job.source_format, job.output_format, job.catalog)?;
    ensure_dir(job.output_labels_dir)?;

    let mut report = TilingReport::new("split-labels");
    let mut groups: BTreeMap<String, Vec<(PathBuf, TileOrigin)>> = BTreeMap::new();

    for tile in list_files(job.tile_images_dir, &IMAGE_EXTENSIONS)? {
        let stem = tile
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parsed = parse_tile_stem(&stem).map(|(source, origin)| (source.to_string(), origin));
        match parsed {
            Some((source, origin)) => groups.entry(source).or_default().push((tile, origin)),
            None => {
                let error = RslabelError::InvalidTileName { path: tile.clone() };
                warn!("Skipping {error}");
                report.add(Issue::file_skipped(&tile, &error));
            }
        }
    }

    let groups: Vec<(String, Vec<(PathBuf, TileOrigin)>)> = groups.into_iter().collect();
    info!(
        "Splitting {} {} label file(s) over tiles in {}",
        groups.len(),
        job.source_format,
        job.tile_images_dir.display()
    );

    let results: Vec<(&String, Result<SplitOutcome, RslabelError>)> = groups
        .par_iter()
        .map(|(stem, tiles)| (stem, split_source(probe, job, options, stem, tiles)))
        .collect();

    report.sources.seen = groups.len();
    for (stem, result) in results {
        match result {
            Ok(outcome) => {
                report.sources.processed += 1;
                report.tiles_written += outcome.tiles_written;
                report.tiles_failed += outcome.tiles_failed;
                report.boxes.source += outcome.source_boxes;
                report.boxes.kept += outcome.kept;
                report.boxes.outside += outcome.outside;
                report.issues.extend(outcome.issues);
            }
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                let label_path = source_label_path(job, stem);
                warn!("Skipping tiles of {}: {error}", label_path.display());
                report.sources.skipped += 1;
                report.add(Issue::file_skipped(&label_path, &error));
            }
        }
    }

    info!(
        "Wrote {} tile label file(s) to {}",
        report.tiles_written,
        job.output_labels_dir.display()
    );
    Ok(report)
}

fn source_label_path(job: &SplitLabels<'_>, stem: &str) -> PathBuf {
    file_in(
        job.source_labels_dir,
        OsStr::new(stem),
        job.source_format.label_extension(),
    )
}

fn split_source<P: ImageProbe>(
    probe: &P,
    job: &SplitLabels<'_>,
    options: &TileOptions,
    stem: &str,
    tiles: &[(PathBuf, TileOrigin)],
) -> Result<SplitOutcome, RslabelError> {
    let label_path = source_label_path(job, stem);
    let image_path = find_image(
        job.source_images_dir,
        OsStr::new(stem),
        job.source_format.image_extension(),
    );
    let read = read_record(
        job.source_format,
        &image_path,
        &label_path,
        job.catalog,
        job.skip_difficult,
        probe,
    )?;

    let mut outcome = SplitOutcome::default();
    outcome.issues.extend(
        read.dropped
            .iter()
            .map(|error| Issue::box_dropped(&label_path, error)),
    );
    let record = read.record;

    // Tiles share the source's channel count.
    let depth = match (record.image, tiles.first()) {
        (Some(info), _) => info.depth,
        (None, Some((first_tile, _))) => probe.probe(first_tile)?.depth,
        (None, None) => DEFAULT_DEPTH,
    };

    let (tile_width, tile_height) = (options.tile_width, options.tile_height);
    outcome.source_boxes = record.boxes.len();
    outcome.outside = record
        .boxes
        .iter()
        .filter(|labeled| {
            !tiles.iter().any(|(_, origin)| {
                labeled
                    .bbox
                    .is_fully_inside(&origin.region(tile_width, tile_height))
            })
        })
        .count();

    for (tile_image_path, origin) in tiles {
        let out_path = file_in(
            job.output_labels_dir,
            tile_image_path.file_stem().unwrap_or_default(),
            job.output_format.label_extension(),
        );

        let mut tile = derive_tile_record(&record, *origin, tile_width, tile_height);
        tile.image_path = tile_image_path.clone();
        tile.label_path = out_path.clone();
        tile.image = Some(ImageInfo::new(tile_width, tile_height, depth));

        let written = match write_record(job.output_format, &tile, &out_path, job.catalog) {
            Ok(written) => written,
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                warn!("Failed to write tile label {}: {error}", out_path.display());
                outcome.tiles_failed += 1;
                outcome.issues.push(Issue::file_skipped(&out_path, &error));
                continue;
            }
        };
        outcome.tiles_written += 1;
        outcome.kept += written.written;
        outcome.issues.extend(
            written
                .dropped
                .iter()
                .map(|error| Issue::box_dropped(&out_path, error)),
        );
    }

    debug!(
        "Split {} over {} tile(s), {} box(es) in no tile",
        label_path.display(),
        tiles.len(),
        outcome.outside
    );
    Ok(outcome)
}

/// Deletes tile samples whose label holds no boxes: the label file and every
/// image in `images_dir` with the same stem.
pub fn prune_empty_samples(
    images_dir: &Path,
    labels_dir: &Path,
    label_format: Format,
) -> Result<TilingReport, RslabelError> {
    let labels = list_files(labels_dir, &[label_format.label_extension()])?;

    let mut report = TilingReport::new("prune-empty");
    report.sources.seen = labels.len();

    for label_path in labels {
        match prune_if_empty(images_dir, &label_path, label_format) {
            Ok(pruned) => {
                report.sources.processed += 1;
                report.pruned += usize::from(pruned);
            }
            Err(error) => {
                warn!("Skipping {}: {error}", label_path.display());
                report.sources.skipped += 1;
                report.add(Issue::file_skipped(&label_path, &error));
            }
        }
    }

    info!(
        "Removed {} empty sample(s) of {}",
        report.pruned, report.sources.seen
    );
    Ok(report)
}

fn prune_if_empty(
    images_dir: &Path,
    label_path: &Path,
    label_format: Format,
) -> Result<bool, RslabelError> {
    if !is_empty_label(label_format, label_path)? {
        return Ok(false);
    }

    let stem = label_path.file_stem().unwrap_or_default();
    for ext in IMAGE_EXTENSIONS {
        let image_path = file_in(images_dir, stem, ext);
        if image_path.is_file() {
            fs::remove_file(&image_path)
                .map_err(|source| RslabelError::path_io(&image_path, source))?;
        }
    }
    fs::remove_file(label_path).map_err(|source| RslabelError::path_io(label_path, source))?;

    debug!("Removed empty sample {}", label_path.display());
    Ok(true)
}

/// True when the label at `path` contains no boxes.
///
/// The label is read with its format's reader, so headers and blank lines do
/// not count. Lines the reader rejects do count: a sample is only pruned
/// when nothing in its label could be a box.
pub fn is_empty_label(format: Format, path: &Path) -> Result<bool, RslabelError> {
    let outcome = match format {
        Format::Voc => io_voc_xml::read_voc_file(path, path, None, false)?,
        // Emptiness does not depend on the scale boxes are read at.
        Format::Yolo => {
            io_yolo::read_yolo_file(path, path, ImageInfo::new(1, 1, DEFAULT_DEPTH), None)?
        }
        Format::Dota => io_dota::read_dota_file(path, path, None)?,
        Format::VisDrone => {
            io_visdrone::read_visdrone_file(path, path, &ClassCatalog::visdrone())?
        }
        Format::Vhr => io_vhr::read_vhr_file(path, path, &ClassCatalog::vhr())?,
    };
    Ok(outcome.record.is_empty() && outcome.dropped.is_empty())
}
