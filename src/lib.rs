//! Tilelabel: detection annotation exchange and tiled-prediction merging.
//!
//! Tilelabel converts detection results between vendor schemas through one
//! COCO-like exchange document, and reassembles detections predicted on
//! overlapping tiles of a large image into one whole-image document.
//!
//! # Modules
//!
//! - [`ir`]: exchange document types and one adapter per native schema
//! - [`geometry`]: box intersection, union and IoU
//! - [`tiling`]: tile planning, the merge/NMS engine and tiled prediction
//! - [`conversion`]: format dispatch and lossiness reports
//! - [`validation`]: exchange document invariant checks
//! - [`config`]: tiling settings and their YAML form
//! - [`error`]: error types for tilelabel operations

pub mod config;
pub mod conversion;
pub mod error;
pub mod geometry;
pub mod ir;
pub mod tiling;
pub mod validation;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use config::TilingConfig;
use conversion::{Format, WriteOptions};
use ir::io_label_studio_json::OutputMode;
use tiling::TileResult;

pub use error::TileLabelError;

/// The tilelabel CLI application.
#[derive(Parser)]
#[command(name = "tilelabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a detection file from one schema to another.
    Convert(ConvertArgs),
    /// Print the tile grid for an image.
    Tiles(TilesArgs),
    /// Merge tile-local exchange documents into one whole-image document.
    Merge(MergeArgs),
    /// Validate a document for errors and warnings.
    Validate(ValidateArgs),
}

/// Schemas accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ConvertFormat {
    /// COCO-like exchange document JSON.
    #[value(alias = "coco")]
    Exchange,
    /// Vendor FormData box JSON.
    #[value(name = "formdata")]
    FormData,
    /// Vendor Binary suggestion JSON.
    Binary,
    /// Pascal VOC XML (one image).
    Voc,
    /// Label Studio task JSON (one task).
    LabelStudio,
}

impl From<ConvertFormat> for Format {
    fn from(format: ConvertFormat) -> Self {
        match format {
            ConvertFormat::Exchange => Format::Exchange,
            ConvertFormat::FormData => Format::FormData,
            ConvertFormat::Binary => Format::Binary,
            ConvertFormat::Voc => Format::Voc,
            ConvertFormat::LabelStudio => Format::LabelStudio,
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
    /// Input file.
    input: PathBuf,

    /// Output file.
    output: PathBuf,

    /// Input schema.
    #[arg(long, value_enum)]
    from: ConvertFormat,

    /// Output schema.
    #[arg(long, value_enum)]
    to: ConvertFormat,

    /// Label Studio key the results are written under.
    #[arg(long, value_enum, default_value = "annotations")]
    output_mode: OutputMode,

    /// Prefix for Label Studio `data.image` (e.g. a storage URL).
    #[arg(long, default_value = "")]
    prefix: String,

    /// Output format for the conversion report.
    #[arg(long, value_enum, default_value = "text")]
    report: ReportFormat,
}

#[derive(clap::Args)]
struct TilesArgs {
    /// Image file; only its header is read.
    image: PathBuf,

    /// YAML tiling config; flags below override its values.
    #[arg(long, env = "TILELABEL_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    tile_width: Option<u32>,

    #[arg(long)]
    tile_height: Option<u32>,

    #[arg(long)]
    overlap: Option<u32>,
}

/// One `--tile X,Y,PATH` argument.
#[derive(Clone, Debug, PartialEq, Eq)]
struct TileSpec {
    x_offset: u32,
    y_offset: u32,
    path: PathBuf,
}

fn parse_tile_spec(raw: &str) -> Result<TileSpec, String> {
    let mut parts = raw.splitn(3, ',');
    let (Some(x), Some(y), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected X,Y,PATH, got '{raw}'"));
    };
    let offset = |value: &str| {
        value
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid offset '{value}': {e}"))
    };
    if path.is_empty() {
        return Err(format!("missing path in '{raw}'"));
    }
    Ok(TileSpec {
        x_offset: offset(x)?,
        y_offset: offset(y)?,
        path: PathBuf::from(path),
    })
}

#[derive(clap::Args)]
struct MergeArgs {
    /// Width of the original image.
    #[arg(long)]
    width: u32,

    /// Height of the original image.
    #[arg(long)]
    height: u32,

    /// Tile-local exchange document at offset X,Y (repeatable).
    #[arg(long = "tile", value_name = "X,Y,PATH", value_parser = parse_tile_spec, required = true)]
    tiles: Vec<TileSpec>,

    /// Output exchange document.
    #[arg(short, long)]
    output: PathBuf,

    /// Detections overlapping a better one by at least this IoU are dropped.
    #[arg(long, default_value_t = config::DEFAULT_IOU_THRESHOLD)]
    iou_threshold: f64,
}

#[derive(clap::Args)]
struct ValidateArgs {
    /// Input file to validate.
    input: PathBuf,

    /// Input schema.
    #[arg(long, value_enum, default_value = "exchange")]
    format: ConvertFormat,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Output format for the report.
    #[arg(long, value_enum, default_value = "text")]
    output: ReportFormat,
}

/// Run the tilelabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), TileLabelError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Tiles(args)) => run_tiles(args),
        Some(Commands::Merge(args)) => run_merge(args),
        Some(Commands::Validate(args)) => run_validate(args),
        None => {
            println!("tilelabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Detection annotation exchange and tiled-prediction merging.");
            println!();
            println!("Run 'tilelabel --help' for usage information.");
            Ok(())
        }
    }
}

fn run_convert(args: ConvertArgs) -> Result<(), TileLabelError> {
    let from = Format::from(args.from);
    let to = Format::from(args.to);

    let document = conversion::read_document(&args.input, from)?;
    let report = conversion::build_conversion_report(&document, from, to);

    let options = WriteOptions {
        output_mode: args.output_mode,
        prefix: args.prefix,
    };
    conversion::write_document(&args.output, &document, to, &options)?;
    info!(
        "converted {} ({}) to {} ({})",
        args.input.display(),
        from.name(),
        args.output.display(),
        to.name()
    );

    match args.report {
        ReportFormat::Json => println!("{}", to_json(&report)?),
        ReportFormat::Text => {
            println!(
                "Converted {} ({}) -> {} ({})",
                args.input.display(),
                from.name(),
                args.output.display(),
                to.name()
            );
            print!("{}", report);
        }
    }
    Ok(())
}

fn run_tiles(args: TilesArgs) -> Result<(), TileLabelError> {
    let mut config = match &args.config {
        Some(path) => TilingConfig::from_yaml_file(path)?,
        None => TilingConfig::default(),
    };
    if let Some(tile_width) = args.tile_width {
        config.tile_width = tile_width;
    }
    if let Some(tile_height) = args.tile_height {
        config.tile_height = tile_height;
    }
    if let Some(overlap) = args.overlap {
        config.overlap = overlap;
    }

    let (width, height) = image_dimensions(&args.image)?;
    let tiles = tiling::plan(width, height, &config)?;

    println!(
        "{}: {}x{}, tile {}x{}, overlap {}",
        args.image.display(),
        width,
        height,
        config.tile_width,
        config.tile_height,
        config.overlap
    );
    if !tiling::needs_tiling(width, height, &config) {
        println!("Image fits in one tile");
        return Ok(());
    }
    println!("{} tile(s):", tiles.len());
    for tile in &tiles {
        println!(
            "  #{} x={} y={} {}x{}",
            tile.index, tile.x, tile.y, tile.width, tile.height
        );
    }
    Ok(())
}

/// Reads image dimensions from the file header without decoding pixels.
fn image_dimensions(path: &Path) -> Result<(u32, u32), TileLabelError> {
    let size_error = |message: String| TileLabelError::ImageSize {
        path: path.to_path_buf(),
        message,
    };
    let size = imagesize::size(path).map_err(|e| size_error(e.to_string()))?;
    let width = u32::try_from(size.width).map_err(|e| size_error(e.to_string()))?;
    let height = u32::try_from(size.height).map_err(|e| size_error(e.to_string()))?;
    Ok((width, height))
}

fn run_merge(args: MergeArgs) -> Result<(), TileLabelError> {
    let results = args
        .tiles
        .iter()
        .map(|spec| {
            let document = ir::io_coco_json::read_coco_json(&spec.path)?;
            Ok(TileResult::new(document, spec.x_offset, spec.y_offset))
        })
        .collect::<Result<Vec<_>, TileLabelError>>()?;

    let merged = tiling::combine(&results, args.width, args.height, args.iou_threshold)?;
    ir::io_coco_json::write_coco_json(&args.output, &merged)?;

    println!(
        "Merged {} tile(s) into {} ({} detection(s), {} categor(ies))",
        results.len(),
        args.output.display(),
        merged.len(),
        merged.categories.len()
    );
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), TileLabelError> {
    let document = conversion::read_document(&args.input, args.format.into())?;

    let opts = validation::ValidateOptions {
        strict: args.strict,
    };
    let report = validation::validate_document(&document, &opts);

    match args.output {
        ReportFormat::Json => println!("{}", to_json(&report)?),
        ReportFormat::Text => print!("{}", report),
    }

    if opts.fails(&report) {
        Err(TileLabelError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    } else {
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, TileLabelError> {
    serde_json::to_string_pretty(value).map_err(|source| TileLabelError::JsonWrite {
        format: "report",
        path: PathBuf::from("<stdout>"),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn tile_spec_parses_offsets_and_path() {
        assert_eq!(
            parse_tile_spec("1354,0,tiles/t1.json").unwrap(),
            TileSpec {
                x_offset: 1354,
                y_offset: 0,
                path: PathBuf::from("tiles/t1.json"),
            }
        );
        // Commas after the second one belong to the path.
        assert_eq!(
            parse_tile_spec("0,0,a,b.json").unwrap().path,
            PathBuf::from("a,b.json")
        );
    }

    #[test]
    fn tile_spec_rejects_bad_input() {
        assert!(parse_tile_spec("10,20").is_err());
        assert!(parse_tile_spec("-1,0,x.json").is_err());
        assert!(parse_tile_spec("0,0,").is_err());
    }

    #[test]
    fn coco_is_an_alias_for_exchange() {
        assert_eq!(
            ConvertFormat::from_str("coco", true).unwrap(),
            ConvertFormat::Exchange
        );
        assert_eq!(
            ConvertFormat::from_str("label-studio", true).unwrap(),
            ConvertFormat::LabelStudio
        );
        assert_eq!(
            ConvertFormat::from_str("formdata", true).unwrap(),
            ConvertFormat::FormData
        );
    }
}
