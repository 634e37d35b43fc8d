use std::env;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{error, info};

pub const NA_VALUE: &str = "NA";

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

/// Reads a tab-separated table with header. `NA` and empty cells are nulls.
pub fn read_tsv<P: AsRef<Path>>(file_path: P) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(b'\t')
                .with_null_values(Some(NullValues::AllColumnsSingle(NA_VALUE.into()))),
        )
        .try_into_reader_with_file_path(Some(file_path.as_ref().to_path_buf()))?
        .finish()
}

/// Writes `df` as TSV, nulls as `NA`. Creates the parent directory if needed.
pub fn write_tsv<P: AsRef<Path>>(df: &mut DataFrame, file_path: P) -> PolarsResult<()> {
    let path = file_path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            create_dir_all(parent)?;
        }
    }

    info!("Writing {} rows to {}", df.height(), path.display());
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b'\t')
        .with_null_value(NA_VALUE.to_string())
        .finish(df)
        .map_err(|e| {
            error!("Failed to write {}: {}", path.display(), e);
            e
        })
}

/// Requires `name` to exist in `df`; error names the file for context.
pub fn require_column(df: &DataFrame, name: &str, source: &str) -> PolarsResult<()> {
    if df.get_column_names().iter().any(|c| c.as_str() == name) {
        Ok(())
    } else {
        Err(PolarsError::ColumnNotFound(
            format!("column '{}' missing in {}", name, source).into(),
        ))
    }
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Worker count for the analysis pool: all cores but one, at least one.
pub fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

pub fn nan_to_none(v: f64) -> Option<f64> {
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}
