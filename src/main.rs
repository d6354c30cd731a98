//! # Etiquette CLI
//!
//! Command-line interface for product label generation.
//!
//! ## Usage
//!
//! ```bash
//! # Show the columns of a spreadsheet and the guessed field mapping
//! etiquette columns products.xlsx
//!
//! # Validate barcodes
//! etiquette check 4006381333931 360718668138
//!
//! # Lay out every row on A4 sheets
//! etiquette pdf products.csv -o labels.pdf
//!
//! # Override a guessed column
//! etiquette pdf products.csv -o labels.pdf --map SIZE_VALUE="Taille EU"
//!
//! # Preview the first sheet
//! etiquette preview products.csv -o preview.png
//!
//! # Fill an SVG template per row and bundle the results
//! etiquette template products.csv --template label.svg -o labels.zip --format pdf
//!
//! # Run the HTTP API
//! etiquette serve --listen 0.0.0.0:8080
//! ```

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

use etiquette::{
    EtiquetteError,
    assemble::{Assembler, BatchReport, PreparedBatch, resolve_mapping},
    barcode,
    config::{LabelConfig, OutputFormat},
    input::{self, InputSource, Table},
    record::{Field, parse_override},
    server::{self, ServerConfig},
};

/// Etiquette - product label generator
#[derive(Parser, Debug)]
#[command(name = "etiquette")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads rows.
#[derive(clap::Args, Debug)]
struct BatchArgs {
    /// Input table (.csv, .tsv, .json, .xlsx, .xls)
    input: PathBuf,

    /// Column override, repeatable (e.g. --map BARCODE=EAN)
    #[arg(long = "map", value_name = "FIELD=COLUMN")]
    overrides: Vec<String>,

    /// Keep non-EAN barcodes and encode them as Code 128
    #[arg(long)]
    allow_code128: bool,

    /// Labels per row
    #[arg(long)]
    cols: Option<u32>,

    /// Label rows per page
    #[arg(long)]
    rows: Option<u32>,

    /// Output resolution in dots per inch
    #[arg(long)]
    dpi: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List input columns and the guessed field mapping
    Columns {
        /// Input table
        input: PathBuf,
    },

    /// Validate barcodes and show their encodable form
    Check {
        /// Barcodes to check
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Render every row onto label sheets as a PDF
    Pdf {
        #[command(flatten)]
        batch: BatchArgs,

        /// Output PDF file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Render the first sheet as a reduced PNG
    Preview {
        #[command(flatten)]
        batch: BatchArgs,

        /// Output PNG file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Fill an SVG template per row and bundle the files into a ZIP
    Template {
        #[command(flatten)]
        batch: BatchArgs,

        /// SVG template (overrides template.path)
        #[arg(long, value_name = "FILE")]
        template: Option<PathBuf>,

        /// Output ZIP file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Per-label file format
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Archive entry prefix
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Start the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), EtiquetteError> {
    let config = match &cli.config {
        Some(path) => LabelConfig::load(path)?,
        None => LabelConfig::default(),
    };

    match cli.command {
        Commands::Columns { input } => {
            let table = load(&input)?;
            let mapping = resolve_mapping(&table, &HashMap::new())?;
            println!("Columns ({}):", table.columns.len());
            for column in &table.columns {
                println!("  {}", column);
            }
            println!("\nGuessed mapping:");
            for (field, column) in mapping.iter() {
                println!("  {:<22} {}", field.name(), column.unwrap_or("-"));
            }
            println!("\n{} data row(s)", table.rows.len());
            Ok(())
        }

        Commands::Check { codes } => {
            let mut invalid = Vec::new();
            for code in &codes {
                match barcode::normalize_to_12(code) {
                    Ok(code12) => println!(
                        "{}: valid EAN-13 {}",
                        code,
                        barcode::human_readable(barcode::Symbology::Ean13, &code12)
                    ),
                    Err(e) => {
                        println!("{}: {}", code, e);
                        invalid.push(code.clone());
                    }
                }
            }
            if invalid.is_empty() {
                Ok(())
            } else {
                Err(EtiquetteError::InvalidBarcode {
                    payload: invalid.join(", "),
                    reason: format!("{} of {} code(s) invalid", invalid.len(), codes.len()),
                })
            }
        }

        Commands::Pdf { batch, output } => {
            let (assembler, prepared) = prepare(config, &batch)?;
            let artifact = assembler.raster_pdf(&prepared)?;
            write_atomic(&output, &artifact.bytes)?;
            print_report(&artifact.report);
            println!(
                "Wrote {} label(s) on {} page(s) to {}",
                artifact.report.rendered,
                artifact.report.pages,
                output.display()
            );
            Ok(())
        }

        Commands::Preview { batch, output } => {
            let (assembler, prepared) = prepare(config, &batch)?;
            let preview = assembler.preview(&prepared)?;
            write_atomic(&output, &preview.png)?;
            print_report(&preview.report);
            println!(
                "Wrote preview of page 1/{} to {}",
                preview.report.pages,
                output.display()
            );
            Ok(())
        }

        Commands::Template {
            batch,
            template,
            output,
            format,
            prefix,
        } => {
            let mut config = config;
            if let Some(template) = template {
                config.template.path = Some(template);
            }
            if let Some(format) = format {
                config.output.format = format;
            }
            if let Some(prefix) = prefix {
                config.output.prefix = prefix;
            }
            let (assembler, prepared) = prepare(config, &batch)?;
            let artifact = assembler.template_archive(&prepared)?;
            write_atomic(&output, &artifact.bytes)?;
            print_report(&artifact.report);
            println!(
                "Wrote {} file(s) to {}",
                artifact.report.rendered,
                output.display()
            );
            Ok(())
        }

        Commands::Serve { listen } => {
            config.validate()?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::serve(ServerConfig::new(listen, config)))
        }
    }
}

fn load(path: &Path) -> Result<Table, EtiquetteError> {
    input::load_table(&InputSource::FilePath(path.to_path_buf()))
}

/// Apply command-line overrides, load the table and filter its rows.
fn prepare(
    mut config: LabelConfig,
    args: &BatchArgs,
) -> Result<(Assembler, PreparedBatch), EtiquetteError> {
    if args.allow_code128 {
        config.barcode.allow_code128 = true;
    }
    if let Some(cols) = args.cols {
        config.layout.cols = cols;
    }
    if let Some(rows) = args.rows {
        config.layout.rows = rows;
    }
    if let Some(dpi) = args.dpi {
        config.layout.dpi = dpi;
    }
    config.validate()?;
    if config.layout.overflows_page() {
        eprintln!("warning: the label grid is larger than the page; labels will be cut off");
    }

    let overrides: HashMap<Field, String> = args
        .overrides
        .iter()
        .map(|s| parse_override(s))
        .collect::<Result<_, _>>()?;

    let table = load(&args.input)?;
    let mapping = resolve_mapping(&table, &overrides)?;
    let assembler = Assembler::new(config);
    let prepared = assembler.prepare(&table, mapping)?;
    Ok((assembler, prepared))
}

fn print_report(report: &BatchReport) {
    println!(
        "Rows: {} total, {} kept, {} rejected",
        report.filter.total,
        report.filter.kept,
        report.filter.rejected.len()
    );
    for warning in report.warnings() {
        eprintln!("warning: {}", warning);
    }
}

/// Write through a temporary file in the target directory so a failure never
/// leaves a partial output.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), EtiquetteError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("labels.pdf");
        write_atomic(&out, b"first").unwrap();
        write_atomic(&out, b"second").unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"second");

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("labels.pdf")]);
    }

    #[test]
    fn test_write_atomic_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("missing").join("labels.pdf");
        assert!(matches!(
            write_atomic(&out, b"x"),
            Err(EtiquetteError::Io(_))
        ));
        assert!(!out.exists());
    }
}
