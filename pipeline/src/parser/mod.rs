//! Tabular source reader.
//!
//! Finds the newest CSV export in a folder (or a named file), decodes it,
//! detects the delimiter, parses it and infers a type per column. Nothing
//! sales-specific happens here.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use csv::{ReaderBuilder, StringRecord};
use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;

use crate::error::{CsvError, ReaderError, ReaderResult};
use crate::models::{Cell, Table};

/// How to locate and decode the source file.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Read this file instead of the newest CSV in the folder.
    pub file_name: Option<String>,
    /// Encoding label (`latin1`, `utf-8`, ...). Auto-detected if not set.
    pub encoding: Option<String>,
    /// Field delimiter. Auto-detected if not set.
    pub delimiter: Option<char>,
}

/// A loaded source table with read metadata
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub table: Table,
    pub path: PathBuf,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// A CSV file found in a folder
#[derive(Debug, Clone, Serialize)]
pub struct CsvFileInfo {
    pub name: String,
    pub path: PathBuf,
    pub modified: DateTime<Local>,
    pub size: u64,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with the encoding named by `label`.
///
/// Returns `None` when the label is unknown. A byte order mark, if present,
/// wins over the label.
pub fn decode_content(bytes: &[u8], label: &str) -> Option<String> {
    let encoding = Encoding::for_label(label.trim().as_bytes())?;
    let (text, _, _) = encoding.decode(bytes);
    Some(text.into_owned())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// List the CSV files of a folder, newest first.
///
/// A missing folder yields an empty list.
pub fn list_csv_files(folder: &Path) -> ReaderResult<Vec<CsvFileInfo>> {
    if !folder.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(folder).map_err(|source| ReaderError::Io {
        path: folder.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_csv(&path) {
            continue;
        }
        let meta = entry.metadata().map_err(|source| ReaderError::Io {
            path: path.clone(),
            source,
        })?;
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push(CsvFileInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            modified: DateTime::<Local>::from(modified),
            size: meta.len(),
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(files)
}

/// Read the newest CSV file of `folder`, or `options.file_name` if set.
///
/// # Errors
/// - [`ReaderError::FolderNotFound`] / [`ReaderError::NotADirectory`] for a bad folder
/// - [`ReaderError::NoCsvFiles`] when the folder holds no CSV file
/// - [`ReaderError::FileNotFound`] / [`ReaderError::NotCsv`] for a bad file name
pub fn read_latest(folder: &Path, options: &ReadOptions) -> ReaderResult<SourceTable> {
    if !folder.exists() {
        return Err(ReaderError::FolderNotFound(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(ReaderError::NotADirectory(folder.to_path_buf()));
    }

    let path = match &options.file_name {
        Some(name) => {
            let path = folder.join(name);
            if !path.exists() {
                return Err(ReaderError::FileNotFound {
                    folder: folder.to_path_buf(),
                    file: name.clone(),
                });
            }
            if !is_csv(&path) {
                return Err(ReaderError::NotCsv(name.clone()));
            }
            path
        }
        None => list_csv_files(folder)?
            .into_iter()
            .next()
            .map(|f| f.path)
            .ok_or_else(|| ReaderError::NoCsvFiles(folder.to_path_buf()))?,
    };

    read_file(&path, options)
}

/// Read a single CSV file.
pub fn read_file(path: &Path, options: &ReadOptions) -> ReaderResult<SourceTable> {
    let bytes = fs::read(path).map_err(|source| ReaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let (content, encoding) = match &options.encoding {
        Some(label) => {
            let content = decode_content(&bytes, label)
                .ok_or_else(|| ReaderError::UnknownEncoding(label.clone()))?;
            (content, label.clone())
        }
        None => {
            let detected = detect_encoding(&bytes);
            let content = decode_content(&bytes, &detected)
                .unwrap_or_else(|| UTF_8.decode(&bytes).0.into_owned());
            (content, detected)
        }
    };

    if content.trim().is_empty() {
        return Err(ReaderError::EmptyFile(path.to_path_buf()));
    }

    let delimiter = options.delimiter.unwrap_or_else(|| detect_delimiter(&content));
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());

    let table = parse_table(&content, delimiter, &name).map_err(|source| ReaderError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(SourceTable {
        table,
        path: path.to_path_buf(),
        encoding,
        delimiter,
    })
}

/// Parse decoded CSV text into a typed table.
///
/// Records shorter than the header are padded with nulls; longer ones are
/// an error.
pub fn parse_table(content: &str, delimiter: char, name: &str) -> Result<Table, CsvError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record: StringRecord = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if record.len() > headers.len() {
            return Err(CsvError::TooManyFields {
                line: record.position().map_or(0, |p| p.line()),
                expected: headers.len(),
                found: record.len(),
            });
        }
        records.push(record.iter().map(str::to_string).collect());
    }

    Ok(infer_table(name, headers, records))
}

/// Column type chosen from all values of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Text,
}

/// Build a table from string records, inferring one type per column.
///
/// A column is integer if every non-empty value parses as `i64`, float if
/// every non-empty value parses as `f64`, text otherwise. Integers written
/// with a leading zero (postal codes, product codes) keep the column as
/// text. Empty values become [`Cell::Null`].
pub fn infer_table(name: &str, headers: Vec<String>, records: Vec<Vec<String>>) -> Table {
    let kinds: Vec<ColumnKind> = (0..headers.len())
        .map(|col| {
            infer_kind(
                records
                    .iter()
                    .filter_map(|r| r.get(col))
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty()),
            )
        })
        .collect();

    let mut table = Table::new(name, headers);
    for record in records {
        let row = kinds
            .iter()
            .enumerate()
            .map(|(col, kind)| match record.get(col) {
                Some(raw) => to_cell(raw, *kind),
                None => Cell::Null,
            })
            .collect();
        table.push_row(row);
    }
    table
}

fn infer_kind<'a>(values: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut kind = ColumnKind::Int;
    let mut any = false;

    for value in values {
        any = true;
        if kind == ColumnKind::Int && (has_leading_zero(value) || value.parse::<i64>().is_err()) {
            kind = ColumnKind::Float;
        }
        if kind == ColumnKind::Float && (has_leading_zero(value) || value.parse::<f64>().is_err()) {
            return ColumnKind::Text;
        }
    }

    if any {
        kind
    } else {
        ColumnKind::Text
    }
}

fn has_leading_zero(value: &str) -> bool {
    let digits = value.trim_start_matches(['-', '+']);
    digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.")
}

fn to_cell(raw: &str, kind: ColumnKind) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Cell::Null;
    }
    match kind {
        ColumnKind::Int => trimmed.parse().map(Cell::Int).unwrap_or_else(|_| Cell::text(raw)),
        ColumnKind::Float => trimmed.parse().map(Cell::Float).unwrap_or_else(|_| Cell::text(raw)),
        ColumnKind::Text => Cell::text(raw),
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}
