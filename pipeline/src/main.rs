//! Salesmart CLI - Reshape a sales CSV export into a star schema
//!
//! # Main Commands
//!
//! ```bash
//! salesmart run                          # newest CSV in ./data -> ./transformed_data
//! salesmart run --upload                 # ... and replace the remote tables
//! salesmart run --dry-run --report r.json
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! salesmart files data                   # List CSV files, newest first
//! salesmart inspect data --file x.csv    # Show how a CSV file is read
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use salesmart::config::{DEFAULT_LOG_FOLDER, DEFAULT_OUTPUT_FOLDER, DEFAULT_SOURCE_FOLDER};
use salesmart::logs::{log_error, log_info, log_success, log_warning, RUN_LOG};
use salesmart::remote::sync::DEFAULT_BATCH_SIZE;
use salesmart::transform::FACT_SALES;
use salesmart::{
    build_star_schema, list_csv_files, load_source, read_latest, save_star_schema,
    upload_star_schema, Cell, MemoryStore, PipelineConfig, ReadOptions, RemoteConfig, RestClient,
    SaveReport, SyncOptions, UploadReport,
};

#[derive(Parser)]
#[command(name = "salesmart")]
#[command(about = "Reshape a sales CSV export into a star schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Folder holding the source CSV files
    #[arg(default_value = DEFAULT_SOURCE_FOLDER)]
    source: PathBuf,

    /// Read this file instead of the newest CSV
    #[arg(short, long)]
    file: Option<String>,

    /// Source encoding (auto-detect if not specified)
    #[arg(short, long)]
    encoding: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: CSV → star schema → CSV files (→ remote store)
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Output folder for the five CSV files
        #[arg(short, long, default_value = DEFAULT_OUTPUT_FOLDER)]
        output: PathBuf,

        /// Folder for the run log file
        #[arg(long, default_value = DEFAULT_LOG_FOLDER)]
        log_folder: PathBuf,

        /// Replace the remote tables (SUPABASE_URL / SUPABASE_KEY)
        #[arg(long)]
        upload: bool,

        /// Upload to an in-memory store instead of the remote one
        #[arg(long, conflicts_with = "upload")]
        dry_run: bool,

        /// Rows per insert request
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List CSV files of a folder, newest first
    Files {
        /// Folder to scan
        #[arg(default_value = DEFAULT_SOURCE_FOLDER)]
        folder: PathBuf,

        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },

    /// Read a CSV file and describe its columns
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            source,
            output,
            log_folder,
            upload,
            dry_run,
            batch_size,
            report,
        } => {
            let config = PipelineConfig {
                source_folder: source.source,
                source_file: source.file,
                encoding: source.encoding,
                output_folder: output,
                log_folder: Some(log_folder),
            };
            let target = if upload {
                UploadTarget::Remote
            } else if dry_run {
                UploadTarget::Memory
            } else {
                UploadTarget::None
            };
            cmd_run(&config, target, batch_size, report.as_deref()).await
        }

        Commands::Files { folder, json } => cmd_files(&folder, json),

        Commands::Inspect { source } => cmd_inspect(&source),
    };

    if let Err(e) = result {
        log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadTarget {
    None,
    Remote,
    Memory,
}

#[derive(Serialize)]
struct TableSummary {
    table: String,
    rows: usize,
    columns: usize,
}

/// JSON run report
#[derive(Serialize)]
struct RunReport {
    source: String,
    encoding: String,
    source_rows: usize,
    tables: Vec<TableSummary>,
    save: SaveReport,
    upload: Option<UploadReport>,
}

async fn cmd_run(
    config: &PipelineConfig,
    target: UploadTarget,
    batch_size: usize,
    report_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(folder) = &config.log_folder {
        match RUN_LOG.attach_file(folder) {
            Ok(path) => log_info(format!("Logging to '{}'", path.display())),
            Err(e) => log_warning(format!("Cannot open log file in '{}': {}", folder.display(), e)),
        }
    }

    log_info("Starting ETL pipeline");
    let source = load_source(config)?;
    let schema = build_star_schema(&source.table)?;

    for table in schema.tables() {
        let (rows, columns) = table.shape();
        log_info(format!("  {:<14} {:>7} rows  {:>3} columns", table.name(), rows, columns));
    }

    let save = save_star_schema(&schema, &config.output_folder);
    let options = SyncOptions {
        batch_size,
        ..SyncOptions::default()
    };

    let upload = match target {
        UploadTarget::None => None,
        UploadTarget::Remote => {
            let remote = RemoteConfig::from_env()?;
            let client = RestClient::new(&remote)?;
            Some(upload_star_schema(&client, &schema, &options).await)
        }
        UploadTarget::Memory => {
            log_info("Dry run: uploading to an in-memory store");
            let store = MemoryStore::new().with_serial_column(FACT_SALES, "sales_id");
            Some(upload_star_schema(&store, &schema, &options).await)
        }
    };

    let saved = save.is_success();
    let uploaded = upload.as_ref().map_or(true, UploadReport::is_success);

    if let Some(path) = report_path {
        let report = RunReport {
            source: source.path.display().to_string(),
            encoding: source.encoding.clone(),
            source_rows: source.table.len(),
            tables: schema
                .tables()
                .iter()
                .map(|t| TableSummary {
                    table: t.name().to_string(),
                    rows: t.len(),
                    columns: t.columns().len(),
                })
                .collect(),
            save,
            upload,
        };
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        log_info(format!("Report written to '{}'", path.display()));
    }

    match (saved, uploaded) {
        (true, true) => {
            log_success("ETL pipeline completed");
            Ok(())
        }
        (false, _) => Err("some tables could not be saved".into()),
        (true, false) => Err("upload stopped before every table was replaced".into()),
    }
}

fn cmd_files(folder: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let files = list_csv_files(folder)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    if files.is_empty() {
        eprintln!("📋 No CSV files in '{}'", folder.display());
        return Ok(());
    }

    eprintln!("📋 CSV files in '{}' ({}):\n", folder.display(), files.len());
    for f in files {
        println!(
            "  📄 {:<40} {}  {:>10} bytes",
            f.name,
            f.modified.format("%Y-%m-%d %H:%M"),
            f.size
        );
    }
    Ok(())
}

fn cmd_inspect(args: &SourceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = ReadOptions {
        file_name: args.file.clone(),
        encoding: args.encoding.clone(),
        delimiter: None,
    };
    let source = read_latest(&args.source, &options)?;
    let table = &source.table;

    eprintln!("📄 {}", source.path.display());
    eprintln!("   Encoding: {}", source.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(source.delimiter));
    eprintln!("   Rows: {}", table.len());
    eprintln!("   Columns: {}\n", table.columns().len());

    for column in table.columns() {
        let Some(values) = table.column_values(column) else {
            continue;
        };
        let mut nulls = 0;
        let mut kind = "empty";
        for cell in values {
            match cell {
                Cell::Null => nulls += 1,
                Cell::Int(_) => kind = "integer",
                Cell::Float(_) => kind = "float",
                Cell::Text(_) => kind = "text",
                Cell::Date(_) => kind = "date",
            }
        }
        println!("  {:<20} {:<8} {:>6} missing", column, kind, nulls);
    }
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
