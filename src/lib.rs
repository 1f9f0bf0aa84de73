//! rslabel: annotation interchange and image tiling for remote-sensing
//! detection datasets.
//!
//! Five label formats are read into one intermediate representation (IR) and
//! written back out as generic-box XML or normalized-center text. Large images
//! are cut into fixed-size tiles and their labels re-derived per tile.
//!
//! # Modules
//!
//! - [`ir`]: Intermediate representation, class catalogs, format adapters
//! - [`conversion`]: Directory conversion between formats
//! - [`tiling`]: Tile planning, image tiling, label splitting, pruning
//! - [`imaging`]: Image probing and pixel operations
//! - [`error`]: Error types for rslabel operations

pub mod conversion;
pub mod error;
pub mod fsutil;
pub mod imaging;
pub mod ir;
pub mod issue;
pub mod tiling;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

pub use error::RslabelError;

use conversion::{convert_directory, ConvertOptions};
use ir::{ClassCatalog, Format};
use tiling::{
    prune_empty_samples, split_label_dir, tile_image_dir, SplitLabels, TileOptions,
    DEFAULT_TILE_SIZE,
};

/// The rslabel CLI application.
#[derive(Parser)]
#[command(name = "rslabel")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Worker threads for per-file work (default: one per core).
    #[arg(long, short = 'j', global = true, env = "RSLABEL_JOBS")]
    jobs: Option<usize>,

    /// How to print the run report.
    #[arg(long, global = true, value_enum, default_value = "text")]
    report: ReportFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a directory of label files to another format.
    Convert(ConvertArgs),
    /// Cut every image in a directory into fixed-size tiles.
    Tile(TileArgs),
    /// Derive per-tile labels from full-image labels.
    SplitLabels(SplitLabelsArgs),
    /// Delete tile samples whose label holds no boxes.
    PruneEmpty(PruneEmptyArgs),
}

/// Label format as accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// Generic-box XML
    Voc,
    /// Normalized-center text
    Yolo,
    /// Oriented-polygon text (read-only)
    Dota,
    /// Frame-delta comma-separated (read-only)
    Visdrone,
    /// Parenthesized-corner comma-separated (read-only)
    Vhr,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Voc => Format::Voc,
            FormatArg::Yolo => Format::Yolo,
            FormatArg::Dota => Format::Dota,
            FormatArg::Visdrone => Format::VisDrone,
            FormatArg::Vhr => Format::Vhr,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Source label format.
    #[arg(long)]
    from: FormatArg,

    /// Target label format ('voc' or 'yolo').
    #[arg(long)]
    to: FormatArg,

    /// Directory holding the images the labels describe.
    #[arg(long)]
    images: PathBuf,

    /// Directory holding the source label files. Output goes to a sibling
    /// directory named after the target format.
    #[arg(long)]
    labels: PathBuf,

    /// Class catalog: 'dota', 'visdrone', 'vhr', a YAML file with `names:`,
    /// or a text file with one class per line. Defaults to the source
    /// format's public catalog when it has one.
    #[arg(long)]
    classes: Option<String>,

    /// Leave out generic-box objects flagged difficult.
    #[arg(long)]
    skip_difficult: bool,
}

/// Tile geometry shared by `tile` and `split-labels`.
#[derive(clap::Args)]
struct TileGeometryArgs {
    /// Square tile edge in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    tile_size: u32,

    /// Tile width, overriding --tile-size.
    #[arg(long)]
    tile_width: Option<u32>,

    /// Tile height, overriding --tile-size.
    #[arg(long)]
    tile_height: Option<u32>,

    /// Distance between tile origins (default: the tile size).
    #[arg(long)]
    step: Option<u32>,
}

impl TileGeometryArgs {
    fn options(&self) -> TileOptions {
        let width = self.tile_width.unwrap_or(self.tile_size);
        let height = self.tile_height.unwrap_or(self.tile_size);
        TileOptions::new(width, height, self.step.unwrap_or(self.tile_size))
    }
}

#[derive(clap::Args)]
struct TileArgs {
    /// Directory of source images.
    #[arg(long)]
    images: PathBuf,

    /// Directory the tiles are written to.
    #[arg(long)]
    output: PathBuf,

    #[command(flatten)]
    geometry: TileGeometryArgs,

    /// Padding color for undersized images, as 'R,G,B'.
    #[arg(long, default_value = "0,0,0", value_parser = parse_fill)]
    fill: Fill,
}

#[derive(clap::Args)]
struct SplitLabelsArgs {
    /// Directory of full-size source images.
    #[arg(long)]
    source_images: PathBuf,

    /// Directory of full-size source labels.
    #[arg(long)]
    source_labels: PathBuf,

    /// Format of the source labels.
    #[arg(long)]
    source_format: FormatArg,

    /// Directory of tiles named `<stem>_<originY>_<originX>`.
    #[arg(long)]
    tiles: PathBuf,

    /// Directory the tile labels are written to.
    #[arg(long)]
    output: PathBuf,

    /// Format of the tile labels ('voc' or 'yolo').
    #[arg(long, default_value = "voc")]
    output_format: FormatArg,

    /// Class catalog, as for `convert`.
    #[arg(long)]
    classes: Option<String>,

    /// Leave out generic-box objects flagged difficult.
    #[arg(long)]
    skip_difficult: bool,

    #[command(flatten)]
    geometry: TileGeometryArgs,
}

#[derive(clap::Args)]
struct PruneEmptyArgs {
    /// Directory of tile images.
    #[arg(long)]
    images: PathBuf,

    /// Directory of tile labels.
    #[arg(long)]
    labels: PathBuf,

    /// Format of the tile labels.
    #[arg(long, default_value = "voc")]
    format: FormatArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Fill([u8; 3]);

fn parse_fill(raw: &str) -> Result<Fill, String> {
    let channels = raw
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|err| format!("invalid color channel: {err}"))?;
    match channels.as_slice() {
        [r, g, b] => Ok(Fill([*r, *g, *b])),
        _ => Err("expected three comma-separated channels, e.g. '0,0,0'".to_string()),
    }
}

/// Run the rslabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), RslabelError> {
    let cli = Cli::parse();
    let report = cli.report;

    let Some(command) = cli.command else {
        println!("rslabel {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Annotation interchange and image tiling for remote-sensing datasets.");
        println!();
        println!("Run 'rslabel --help' for usage information.");
        return Ok(());
    };

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = cli.jobs {
        pool = pool.num_threads(jobs);
    }
    let pool = pool.build()?;

    pool.install(|| match command {
        Commands::Convert(args) => run_convert(args, report),
        Commands::Tile(args) => run_tile(args, report),
        Commands::SplitLabels(args) => run_split_labels(args, report),
        Commands::PruneEmpty(args) => run_prune_empty(args, report),
    })
}

/// `--classes` when given, else the format's public catalog.
fn resolve_catalog(
    classes: Option<&str>,
    format: Format,
) -> Result<Option<ClassCatalog>, RslabelError> {
    match classes {
        Some(arg) => ClassCatalog::load(arg).map(Some),
        None => Ok(format.default_catalog()),
    }
}

fn run_convert(args: ConvertArgs, report_format: ReportFormat) -> Result<(), RslabelError> {
    let from = Format::from(args.from);
    let to = Format::from(args.to);
    let catalog = resolve_catalog(args.classes.as_deref(), from)?;

    let report = convert_directory(
        from,
        to,
        &args.images,
        &args.labels,
        catalog.as_ref(),
        ConvertOptions {
            skip_difficult: args.skip_difficult,
        },
    )?;

    print_report(&format!("Converted {from} -> {to}:"), &report, report_format)
}

fn run_tile(args: TileArgs, report_format: ReportFormat) -> Result<(), RslabelError> {
    let options = args.geometry.options().with_fill(args.fill.0);
    let report = tile_image_dir(&args.images, &args.output, &options)?;
    print_report("Tiled images:", &report, report_format)
}

fn run_split_labels(args: SplitLabelsArgs, report_format: ReportFormat) -> Result<(), RslabelError> {
    let source_format = Format::from(args.source_format);
    let catalog = resolve_catalog(args.classes.as_deref(), source_format)?;

    let job = SplitLabels {
        source_images_dir: &args.source_images,
        source_labels_dir: &args.source_labels,
        source_format,
        tile_images_dir: &args.tiles,
        output_labels_dir: &args.output,
        output_format: Format::from(args.output_format),
        catalog: catalog.as_ref(),
        skip_difficult: args.skip_difficult,
    };
    let report = split_label_dir(&job, &args.geometry.options())?;
    print_report("Split labels over tiles:", &report, report_format)
}

fn run_prune_empty(args: PruneEmptyArgs, report_format: ReportFormat) -> Result<(), RslabelError> {
    let report = prune_empty_samples(&args.images, &args.labels, Format::from(args.format))?;
    print_report("Pruned empty samples:", &report, report_format)
}

fn print_report<R>(heading: &str, report: &R, format: ReportFormat) -> Result<(), RslabelError>
where
    R: Serialize + std::fmt::Display,
{
    match format {
        ReportFormat::Text => {
            println!("{heading}");
            print!("{report}");
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fill_accepts_three_channels() {
        assert_eq!(parse_fill("255, 128,0"), Ok(Fill([255, 128, 0])));
        assert!(parse_fill("1,2").is_err());
        assert!(parse_fill("1,2,300").is_err());
    }

    #[test]
    fn geometry_overrides_fall_back_to_tile_size() {
        let geometry = TileGeometryArgs {
            tile_size: 300,
            tile_width: Some(200),
            tile_height: None,
            step: None,
        };
        assert_eq!(geometry.options(), TileOptions::new(200, 300, 300));
    }

    #[test]
    fn format_args_map_onto_formats() {
        assert_eq!(Format::from(FormatArg::Visdrone), Format::VisDrone);
        assert_eq!(Format::from(FormatArg::Voc), Format::Voc);
    }
}
