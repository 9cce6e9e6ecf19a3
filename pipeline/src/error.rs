//! Error types for the Salesmart ETL pipeline.
//!
//! One error type per stage, so the orchestrator can tell a fatal transform
//! failure from a per-file sink failure or an upload that must stop the
//! remaining sequence:
//!
//! - [`ReaderError`] - source discovery, decoding and CSV parsing
//! - [`CsvError`] - malformed CSV text
//! - [`TransformError`] - dimension and fact building
//! - [`SinkError`] - CSV output
//! - [`RemoteError`] - remote store transport and API failures
//! - [`SyncError`] - table replacement on the remote store
//! - [`ConfigError`] - environment configuration
//! - [`PipelineError`] - top-level orchestration
//!
//! Error conversion into [`PipelineError`] is automatic via `From`
//! implementations, allowing `?` to work across stage boundaries.

use std::ops::Range;
use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Source Reader Errors
// =============================================================================

/// Errors while locating and reading the source dataset.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The source folder does not exist.
    #[error("Folder path '{0}' does not exist")]
    FolderNotFound(PathBuf),

    /// The source path exists but is not a directory.
    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    /// The folder holds no CSV file.
    #[error("No CSV files found in '{0}'")]
    NoCsvFiles(PathBuf),

    /// A specifically requested file is missing.
    #[error("File '{file}' not found in '{folder}'")]
    FileNotFound { folder: PathBuf, file: String },

    /// A specifically requested file is not a CSV file.
    #[error("'{0}' is not a CSV file")]
    NotCsv(String),

    /// An explicitly requested encoding label is unknown.
    #[error("Unknown encoding '{0}'")]
    UnknownEncoding(String),

    /// The file has no header row.
    #[error("CSV file '{0}' is empty")]
    EmptyFile(PathBuf),

    /// Failed to read file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV content.
    #[error("Invalid CSV in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: CsvError,
    },
}

/// Errors while parsing decoded CSV text.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error(transparent)]
    Malformed(#[from] csv::Error),

    /// A record holds more fields than the header names.
    #[error("line {line}: expected {expected} fields, found {found}")]
    TooManyFields {
        line: u64,
        expected: usize,
        found: usize,
    },
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors while building dimension and fact tables.
///
/// Any of these aborts the whole run: a table cannot be partially built.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A required source column is absent.
    #[error("Missing column '{column}' while building {table}")]
    MissingColumn { table: String, column: String },

    /// A date string could not be parsed.
    #[error("Cannot parse date in column '{column}' at row {row}: '{value}'")]
    DateParse {
        column: String,
        row: usize,
        value: String,
    },

    /// A measure could not be converted to a number.
    #[error("Column '{column}' at row {row}: cannot convert '{value}' to {expected}")]
    TypeCoercion {
        column: String,
        row: usize,
        value: String,
        expected: &'static str,
    },
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors while writing a table to disk.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Directory creation or file write failed.
    #[error("Cannot write '{path}': {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Remote Store Errors
// =============================================================================

/// Errors reported by a remote store client.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The store could not be reached (connection refused, timeout, DNS).
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// Credentials were rejected.
    #[error("Remote store rejected credentials: {0}")]
    AuthFailure(String),

    /// The store answered with a non-success status.
    #[error("Remote store returned HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The response body could not be understood.
    #[error("Invalid response from remote store: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Sync Errors
// =============================================================================

/// Errors while replacing the contents of a remote table.
///
/// Only the insert phase produces these: column discovery and clearing are
/// best-effort. Either variant aborts the upload of this table and of every
/// table after it.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The store failed while inserting a batch.
    #[error("Upload of '{table}' failed on batch {batch}/{total_batches} (rows {rows:?}): {source}")]
    Remote {
        table: String,
        batch: usize,
        total_batches: usize,
        rows: Range<usize>,
        #[source]
        source: RemoteError,
    },

    /// The store acknowledged fewer or more rows than were sent.
    #[error(
        "Upload of '{table}' stopped on batch {batch}/{total_batches} (rows {rows:?}): sent {sent} rows, store acknowledged {acknowledged}"
    )]
    BatchMismatch {
        table: String,
        batch: usize,
        total_batches: usize,
        rows: Range<usize>,
        sent: usize,
        acknowledged: usize,
    },
}

impl SyncError {
    /// Name of the remote table whose upload failed.
    pub fn table(&self) -> &str {
        match self {
            SyncError::Remote { table, .. } | SyncError::BatchMismatch { table, .. } => table,
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("Missing {0} environment variable")]
    MissingVar(&'static str),

    /// An environment variable holds an unusable value.
    #[error("Invalid value for {name}: {message}")]
    InvalidVar { name: &'static str, message: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source reading error.
    #[error("Source error: {0}")]
    Reader(#[from] ReaderError),

    /// Transformation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Output error.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Remote client error outside of a table sync.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Table sync error.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Source contained no data rows.
    #[error("Source '{0}' has no data rows")]
    EmptyInput(PathBuf),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source reading.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for remote store calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Result type for table sync.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
