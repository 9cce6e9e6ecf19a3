//! High-level pipeline API for the sales star schema.
//!
//! This module combines the stages of a run: load the source, build the
//! five tables, save them as CSV and upload them to a remote store.
//!
//! # Example
//!
//! ```rust,ignore
//! use salesmart::config::PipelineConfig;
//! use salesmart::remote::{MemoryStore, SyncOptions};
//! use salesmart::transform::{build_star_schema, load_source, save_star_schema, upload_star_schema};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let source = load_source(&config)?;
//!     let schema = build_star_schema(&source.table)?;
//!
//!     save_star_schema(&schema, &config.output_folder);
//!     let report = upload_star_schema(&MemoryStore::new(), &schema, &SyncOptions::default()).await;
//!     println!("Uploaded {} tables", report.synced.len());
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use super::dimensions::{build_dim_customer, build_dim_date, build_dim_order, build_dim_product};
use super::fact::build_fact_sales;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult, SinkError, SyncError, TransformResult};
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::models::Table;
use crate::parser::{read_latest, SourceTable};
use crate::remote::{sync_table, RemoteStore, SyncOptions, SyncReport};
use crate::sink::save_table_to_csv;

/// The four dimension tables and the fact table of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct StarSchema {
    pub dim_date: Table,
    pub dim_product: Table,
    pub dim_customer: Table,
    pub dim_order: Table,
    pub fact_sales: Table,
}

impl StarSchema {
    /// Tables in dependency order: dimensions first, fact last.
    pub fn tables(&self) -> [&Table; 5] {
        [
            &self.dim_date,
            &self.dim_product,
            &self.dim_customer,
            &self.dim_order,
            &self.fact_sales,
        ]
    }
}

/// Output file name of a table.
pub fn file_name(table: &Table) -> String {
    format!("{}.csv", table.name())
}

/// Read the source table configured by `config`.
///
/// A source with a header but no data rows is rejected: it would produce
/// five empty tables and wipe the remote store on upload.
pub fn load_source(config: &PipelineConfig) -> PipelineResult<SourceTable> {
    log_info(format!("Reading source from '{}'", config.source_folder.display()));
    let source = read_latest(&config.source_folder, &config.read_options())?;

    if source.table.is_empty() {
        return Err(PipelineError::EmptyInput(source.path));
    }

    log_success(format!(
        "Loaded '{}' ({} rows, {} columns, encoding {}, delimiter '{}')",
        source.path.display(),
        source.table.len(),
        source.table.columns().len(),
        source.encoding,
        source.delimiter
    ));
    Ok(source)
}

/// Build every table of the star schema from the raw records.
///
/// The first failing builder aborts the whole build.
pub fn build_star_schema(raw: &Table) -> TransformResult<StarSchema> {
    log_info("Transforming data into star schema...");

    let dim_date = build_dim_date(raw)?;
    let dim_product = build_dim_product(raw)?;
    let dim_customer = build_dim_customer(raw)?;
    let dim_order = build_dim_order(raw)?;
    let fact_sales = build_fact_sales(raw, &dim_date)?;

    log_success("Star schema built");
    Ok(StarSchema {
        dim_date,
        dim_product,
        dim_customer,
        dim_order,
        fact_sales,
    })
}

// =============================================================================
// CSV output
// =============================================================================

/// Outcome of writing one table.
#[derive(Debug, Serialize)]
pub struct SavedFile {
    pub table: String,
    #[serde(serialize_with = "serialize_result")]
    pub result: Result<PathBuf, SinkError>,
}

/// Outcome of [`save_star_schema`], one entry per table.
#[derive(Debug, Serialize)]
pub struct SaveReport {
    pub files: Vec<SavedFile>,
}

impl SaveReport {
    pub fn is_success(&self) -> bool {
        self.files.iter().all(|f| f.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SinkError)> {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().err().map(|e| (f.table.as_str(), e)))
    }
}

/// Write the five tables to `folder`.
///
/// A failed file is logged and does not stop the others.
pub fn save_star_schema(schema: &StarSchema, folder: &Path) -> SaveReport {
    log_info(format!("Saving tables to '{}'", folder.display()));

    let files = schema
        .tables()
        .into_iter()
        .map(|table| {
            let result = save_table_to_csv(table, folder, &file_name(table));
            if let Err(e) = &result {
                log_error(format!("Could not save '{}': {}", table.name(), e));
            }
            SavedFile {
                table: table.name().to_string(),
                result,
            }
        })
        .collect();

    SaveReport { files }
}

// =============================================================================
// Remote upload
// =============================================================================

/// Outcome of [`upload_star_schema`].
#[derive(Debug, Serialize)]
pub struct UploadReport {
    /// Tables fully replaced, in upload order.
    pub synced: Vec<SyncReport>,
    /// The table sync that stopped the upload.
    #[serde(serialize_with = "serialize_error")]
    pub failure: Option<SyncError>,
    /// Tables skipped because an earlier table failed.
    pub not_attempted: Vec<String>,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Replace the remote contents of every table, dimensions first.
///
/// Stops at the first failed table; tables already uploaded stay as they
/// are and later ones are reported as not attempted.
pub async fn upload_star_schema<S: RemoteStore>(
    store: &S,
    schema: &StarSchema,
    options: &SyncOptions,
) -> UploadReport {
    log_info("Uploading star schema...");

    let mut report = UploadReport {
        synced: Vec::new(),
        failure: None,
        not_attempted: Vec::new(),
    };

    for table in schema.tables() {
        if report.failure.is_some() {
            report.not_attempted.push(table.name().to_string());
            continue;
        }
        match sync_table(store, table, options).await {
            Ok(synced) => report.synced.push(synced),
            Err(e) => {
                log_error(e.to_string());
                report.failure = Some(e);
            }
        }
    }

    if report.is_success() {
        log_success(format!("Uploaded {} tables", report.synced.len()));
    } else {
        log_warning(format!("Upload stopped; not attempted: {}", report.not_attempted.join(", ")));
    }
    report
}

fn serialize_result<S: Serializer>(
    result: &Result<PathBuf, SinkError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match result {
        Ok(path) => serializer.serialize_some(&path.display().to_string()),
        Err(e) => serializer.serialize_some(&format!("error: {}", e)),
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<SyncError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::models::Cell;
    use crate::remote::{MemoryStore, StoreCall};
    use crate::transform::test_support::{sample_raw, SAMPLE_CSV};
    use std::fs;
    use tempfile::tempdir;

    fn config_for(folder: &Path) -> PipelineConfig {
        PipelineConfig {
            source_folder: folder.to_path_buf(),
            output_folder: folder.join("out"),
            log_folder: None,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_build_star_schema() {
        let schema = build_star_schema(&sample_raw()).unwrap();

        assert_eq!(schema.dim_date.len(), 7);
        assert_eq!(schema.dim_product.len(), 2);
        assert_eq!(schema.dim_customer.len(), 7);
        assert_eq!(schema.dim_order.len(), 7);
        assert_eq!(schema.fact_sales.len(), 8);
        assert_eq!(schema.fact_sales.get(0, "date_key"), Some(&Cell::Int(20030224)));

        let names: Vec<&str> = schema.tables().iter().map(|t| t.name()).collect();
        assert_eq!(names, ["dim_date", "dim_product", "dim_customer", "dim_order", "fact_sales"]);
    }

    #[test]
    fn test_load_source_reads_newest_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("sales_data_sample.csv"), SAMPLE_CSV).unwrap();

        let source = load_source(&config_for(dir.path())).unwrap();
        assert_eq!(source.table.len(), 8);
        assert_eq!(source.delimiter, ',');
    }

    #[test]
    fn test_header_only_source_is_rejected() {
        let dir = tempdir().unwrap();
        let header = SAMPLE_CSV.lines().next().unwrap();
        fs::write(dir.path().join("empty.csv"), format!("{}\n", header)).unwrap();

        assert!(matches!(load_source(&config_for(dir.path())), Err(PipelineError::EmptyInput(_))));
    }

    #[test]
    fn test_save_writes_five_files() {
        let dir = tempdir().unwrap();
        let schema = build_star_schema(&sample_raw()).unwrap();
        let report = save_star_schema(&schema, dir.path());

        assert!(report.is_success());
        for name in ["dim_date", "dim_product", "dim_customer", "dim_order", "fact_sales"] {
            assert!(dir.path().join(format!("{}.csv", name)).exists());
        }
        let fact = fs::read_to_string(dir.path().join("fact_sales.csv")).unwrap();
        assert!(fact.starts_with("order_number,product_code,customer_name,date_key,sales,"));
        assert_eq!(fact.lines().count(), 9);
    }

    #[test]
    fn test_failed_file_does_not_stop_others() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("dim_product.csv.tmp")).unwrap();

        let schema = build_star_schema(&sample_raw()).unwrap();
        let report = save_star_schema(&schema, dir.path());

        let failed: Vec<&str> = report.failures().map(|(table, _)| table).collect();
        assert_eq!(failed, ["dim_product"]);
        assert!(dir.path().join("fact_sales.csv").exists());
        assert!(!dir.path().join("dim_product.csv").exists());
    }

    #[tokio::test]
    async fn test_upload_in_dependency_order() {
        let store = MemoryStore::new().with_serial_column("fact_sales", "sales_id");
        let schema = build_star_schema(&sample_raw()).unwrap();

        let report = upload_star_schema(&store, &schema, &SyncOptions::default()).await;
        assert!(report.is_success());

        let order: Vec<String> = store
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Insert { table, .. } => Some(table),
                _ => None,
            })
            .collect();
        assert_eq!(order, ["dim_date", "dim_product", "dim_customer", "dim_order", "fact_sales"]);
        assert_eq!(store.rows("fact_sales").len(), 8);
        assert_eq!(store.rows("fact_sales")[7]["sales_id"], 8);
    }

    #[tokio::test]
    async fn test_product_failure_stops_fact_upload() {
        let store = MemoryStore::new().short_ack("dim_product", 1, 1);
        let schema = build_star_schema(&sample_raw()).unwrap();

        let report = upload_star_schema(&store, &schema, &SyncOptions::default()).await;

        assert!(!report.is_success());
        assert_eq!(report.failure.as_ref().map(SyncError::table), Some("dim_product"));
        assert_eq!(report.synced.len(), 1);
        assert_eq!(report.not_attempted, ["dim_customer", "dim_order", "fact_sales"]);
        assert!(store.rows("fact_sales").is_empty());
        assert!(!store.calls().iter().any(|c| c.table() == "fact_sales"));
    }

    #[tokio::test]
    async fn test_unreachable_table_stops_later_tables() {
        let store = MemoryStore::new().unreachable("dim_customer");
        let schema = build_star_schema(&sample_raw()).unwrap();

        let report = upload_star_schema(&store, &schema, &SyncOptions::default()).await;

        assert!(matches!(
            report.failure,
            Some(SyncError::Remote {
                source: RemoteError::Unavailable(_),
                ..
            })
        ));
        assert_eq!(report.synced.len(), 2);
        assert_eq!(report.not_attempted, ["dim_order", "fact_sales"]);
        assert!(!store.calls().iter().any(|c| c.table() == "dim_order"));
    }

    #[tokio::test]
    async fn test_rerun_replaces_remote_contents() {
        let store = MemoryStore::new();
        let schema = build_star_schema(&sample_raw()).unwrap();

        upload_star_schema(&store, &schema, &SyncOptions::default()).await;
        let report = upload_star_schema(&store, &schema, &SyncOptions::default()).await;

        assert!(report.is_success());
        assert_eq!(store.rows("dim_product").len(), 2);
        assert_eq!(store.rows("fact_sales").len(), 8);
    }

    #[test]
    fn test_report_serializes() {
        let dir = tempdir().unwrap();
        let schema = build_star_schema(&sample_raw()).unwrap();
        let report = save_star_schema(&schema, dir.path());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files"][0]["table"], "dim_date");
        assert!(json["files"][0]["result"].as_str().unwrap().ends_with("dim_date.csv"));
    }
}
