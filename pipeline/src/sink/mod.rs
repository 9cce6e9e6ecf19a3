//! CSV sink.
//!
//! Tables are written as UTF-8, comma-delimited, with a header row and no
//! index column. Each file is first written to a `.tmp` sibling and renamed
//! into place, so a failed write leaves neither a truncated file nor any
//! trace in the other tables' files.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::{SinkError, SinkResult};
use crate::logs::log_success;
use crate::models::Table;

/// Write `table` to `folder/file_name`, creating `folder` if needed.
///
/// Returns the path of the written file.
pub fn save_table_to_csv(table: &Table, folder: &Path, file_name: &str) -> SinkResult<PathBuf> {
    fs::create_dir_all(folder).map_err(|source| SinkError::IoFailure {
        path: folder.to_path_buf(),
        source,
    })?;

    let path = folder.join(file_name);
    let tmp = folder.join(format!("{}.tmp", file_name));

    let written = write_csv(table, &tmp).and_then(|()| fs::rename(&tmp, &path));
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp);
        return Err(SinkError::IoFailure { path, source });
    }

    log_success(format!("Saved {} rows to '{}'", table.len(), path.display()));
    Ok(path)
}

fn write_csv(table: &Table, path: &Path) -> std::io::Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);

    writer.write_record(table.columns()).map_err(std::io::Error::from)?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|cell| cell.render().into_owned()))
            .map_err(std::io::Error::from)?;
    }
    writer.flush()
}
