//! Thin helpers over polars for the CSV files the pipeline reads and writes.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::{PipelineError, Result};

pub fn load_csv_file(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::DatasetNotFound(path.to_path_buf()));
    }
    // types are inferred over every row, not a prefix
    let df = CsvReader::from_path(path)?
        .has_header(true)
        .infer_schema(None)
        .finish()?;
    debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "loaded csv"
    );
    Ok(df)
}

/// Column names from the header; an empty file has none.
pub fn load_csv_header(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(PipelineError::DatasetNotFound(path.to_path_buf()));
    }
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;
    if first_line.trim().is_empty() {
        return Ok(Vec::new());
    }
    let df = CsvReader::from_path(path)?
        .has_header(true)
        .with_n_rows(Some(1))
        .finish()?;
    Ok(column_names(&df))
}

pub fn write_csv_file(path: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}

/// Columns read as strings are the categorical ones.
pub fn is_text_column(series: &Series) -> bool {
    matches!(series.dtype(), DataType::String)
}

pub fn text_values(series: &Series) -> Result<Vec<Option<String>>> {
    let values = series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

pub fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let cast = series.cast(&DataType::Float64)?;
    let values = cast.f64()?.into_iter().collect();
    Ok(values)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Row-major `f32` copy of an all-numeric frame.
pub fn to_row_major(df: &DataFrame) -> Result<Vec<f32>> {
    let array = df.to_ndarray::<Float32Type>(IndexOrder::C)?;
    Ok(array.iter().copied().collect())
}
