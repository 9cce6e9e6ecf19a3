//! # Salesmart - sales CSV to star schema
//!
//! Salesmart reads a CSV export of sales transactions, reshapes it into four
//! dimension tables and one fact table, saves them as CSV files and can
//! replace the contents of the matching tables on a PostgREST (Supabase)
//! backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Transform  │────▶│  CSV Sink   │
//! │  (any enc.) │     │  (auto-enc) │     │ (dims+fact) │     │ (5 files)   │
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                         ┌─────────────┐
//!                                         │ Remote Sync │
//!                                         │ (REST API)  │
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salesmart::{build_star_schema, load_source, save_star_schema, PipelineConfig};
//!
//! fn main() {
//!     let config = PipelineConfig::default();
//!     let source = load_source(&config).unwrap();
//!     let schema = build_star_schema(&source.table).unwrap();
//!     save_star_schema(&schema, &config.output_folder);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Paths, remote credentials
//! - [`logs`] - Run log (console + file)
//! - [`models`] - Cell and Table
//! - [`parser`] - CSV discovery and parsing with auto-detection
//! - [`transform`] - Dimension and fact builders, pipeline
//! - [`sink`] - CSV output
//! - [`remote`] - Remote store contract, REST client, table sync

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod sink;

// Remote store
pub mod remote;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    CsvError,
    PipelineError,
    PipelineResult,
    ReaderError,
    RemoteError,
    SinkError,
    SyncError,
    TransformError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{PipelineConfig, RemoteConfig};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Table};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    detect_delimiter,
    detect_encoding,
    list_csv_files,
    read_latest,
    CsvFileInfo,
    ReadOptions,
    SourceTable,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    build_dim_customer,
    build_dim_date,
    build_dim_order,
    build_dim_product,
    build_fact_sales,
    DateKey,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    build_star_schema,
    load_source,
    save_star_schema,
    upload_star_schema,
    SaveReport,
    StarSchema,
    UploadReport,
};

// =============================================================================
// Re-exports - Output and Remote
// =============================================================================

pub use sink::save_table_to_csv;

pub use remote::{
    sync_table,
    MemoryStore,
    RemoteStore,
    RestClient,
    SyncOptions,
    SyncReport,
};
