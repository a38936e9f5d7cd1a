//! Data preparation: label cleaning, qualification grouping, imputation,
//! one-hot encoding and the stratified train/test split.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info};

use crate::config::{
    PipelineConfig, GROUPED_QUALIFICATION_COLUMN, NEGATIVE_CLASS, POSITIVE_CLASS,
    QUALIFICATION_COLUMN, QUALIFICATION_GRADE_COLUMN, TARGET_COLUMN,
};
use crate::error::{PipelineError, Result};
use crate::frame::{is_text_column, load_csv_file, numeric_values, text_values, write_csv_file};
use crate::split::stratified_split;

pub const X_TRAIN_FILE: &str = "X_train.csv";
pub const X_TEST_FILE: &str = "X_test.csv";
pub const Y_TRAIN_FILE: &str = "y_train.csv";
pub const Y_TEST_FILE: &str = "y_test.csv";

/// Ordered substring rules; the first rule with a matching needle wins.
const QUALIFICATION_RULES: &[(&[&str], &str)] = &[
    (
        &[
            "Ensino superior",
            "bacharelato",
            "licenciatura",
            "mestrado",
            "doutoramento",
        ],
        "Ensino Superior",
    ),
    (&["Ensino Secundário", "12º ano"], "Ensino Médio"),
    (
        &["Tecnológico", "tecnológica"],
        "Ensino Técnico/Profissionalizante",
    ),
    (&["Ensino básico"], "Ensino Básico"),
    (&["Frequência de ensino superior"], "Ensino Superior Incompleto"),
];

pub const OTHER_QUALIFICATION: &str = "Outros";

/// The four partitions written to the processed-data directory.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub y_train: DataFrame,
    pub y_test: DataFrame,
}

pub fn group_qualification(qualification: &str) -> &'static str {
    QUALIFICATION_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| qualification.contains(needle)))
        .map(|(_, group)| *group)
        .unwrap_or(OTHER_QUALIFICATION)
}

fn required_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map_err(|_| PipelineError::MissingColumn(name.to_string()))
}

/// Trims the label, keeps only the two known classes and maps them to 1/0.
pub fn clean_target(df: &DataFrame) -> Result<DataFrame> {
    let target = required_column(df, TARGET_COLUMN)?.cast(&DataType::String)?;
    let labels: Vec<Option<i32>> = text_values(&target)?
        .iter()
        .map(|value| match value.as_deref().map(str::trim) {
            Some(POSITIVE_CLASS) => Some(1),
            Some(NEGATIVE_CLASS) => Some(0),
            _ => None,
        })
        .collect();

    let keep: Vec<bool> = labels.iter().map(Option::is_some).collect();
    let mask = BooleanChunked::from_slice("keep", &keep);
    let mut cleaned = df.filter(&mask)?;
    let mapped: Vec<i32> = labels.into_iter().flatten().collect();
    cleaned.with_column(Series::new(TARGET_COLUMN, mapped))?;

    info!(
        kept = cleaned.height(),
        dropped = df.height() - cleaned.height(),
        "cleaned target column"
    );
    Ok(cleaned)
}

/// Replaces the detailed qualification and its grade with the grouped category.
pub fn add_grouped_qualification(df: &DataFrame) -> Result<DataFrame> {
    let qualification = required_column(df, QUALIFICATION_COLUMN)?.cast(&DataType::String)?;
    let grouped: Vec<&str> = text_values(&qualification)?
        .iter()
        .map(|value| {
            value
                .as_deref()
                .map(group_qualification)
                .unwrap_or(OTHER_QUALIFICATION)
        })
        .collect();

    let mut columns: Vec<Series> = df
        .get_columns()
        .iter()
        .filter(|s| s.name() != QUALIFICATION_COLUMN && s.name() != QUALIFICATION_GRADE_COLUMN)
        .cloned()
        .collect();
    columns.push(Series::new(GROUPED_QUALIFICATION_COLUMN, grouped));
    Ok(DataFrame::new(columns)?)
}

pub fn split_features_and_target(df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
    let target = required_column(df, TARGET_COLUMN)?.clone();
    let features: Vec<Series> = df
        .get_columns()
        .iter()
        .filter(|s| s.name() != TARGET_COLUMN)
        .cloned()
        .collect();
    Ok((DataFrame::new(features)?, DataFrame::new(vec![target])?))
}

/// Median of the non-null values; mean of the two middle values for even counts.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

/// Most frequent non-null value, ties going to the smallest value.
pub fn mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values.iter().flatten() {
        *counts.entry(value.as_str()).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// Median fill for numeric columns and mode fill for text columns.
pub fn impute_missing(x: &DataFrame) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(x.width());
    for series in x.get_columns() {
        let name = series.name();
        if is_text_column(series) {
            let values = text_values(series)?;
            let filled: Vec<Option<String>> = match mode(&values) {
                Some(fill) => values
                    .into_iter()
                    .map(|v| Some(v.unwrap_or_else(|| fill.clone())))
                    .collect(),
                None => values,
            };
            columns.push(Series::new(name, filled));
        } else {
            let values = numeric_values(series)?;
            let fill = median(&values).unwrap_or(0.0);
            let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();
            columns.push(Series::new(name, filled));
        }
    }
    Ok(DataFrame::new(columns)?)
}

/// Expands every text column into `<column>_<value>` indicator columns.
///
/// Non-text columns keep their position at the front. With `drop_first`, the
/// smallest category of each column is the baseline and gets no indicator.
pub fn one_hot_encode(x: &DataFrame, drop_first: bool) -> Result<DataFrame> {
    let (text, numeric): (Vec<&Series>, Vec<&Series>) =
        x.get_columns().iter().partition(|s| is_text_column(s));

    let mut columns: Vec<Series> = numeric.into_iter().cloned().collect();
    for series in text {
        let values = text_values(series)?;
        let categories: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
        let skip = usize::from(drop_first);
        for category in categories.into_iter().skip(skip) {
            let indicator: Vec<i32> = values
                .iter()
                .map(|v| i32::from(v.as_deref() == Some(category)))
                .collect();
            columns.push(Series::new(
                &format!("{}_{}", series.name(), category),
                indicator,
            ));
        }
    }
    Ok(DataFrame::new(columns)?)
}

pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("", indices.iter().map(|&i| i as IdxSize).collect());
    Ok(df.take(&idx)?)
}

/// Labels of a single-column label frame as 0/1 integers.
pub fn label_vector(y: &DataFrame) -> Result<Vec<i32>> {
    let series = y
        .get_columns()
        .first()
        .ok_or_else(|| PipelineError::InvalidLabels("label frame has no columns".into()))?;
    numeric_values(series)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v == 0.0 || v == 1.0 => Ok(v as i32),
            other => Err(PipelineError::InvalidLabels(format!(
                "row {row} holds {other:?}, expected 0 or 1"
            ))),
        })
        .collect()
}

/// Runs every preparation step on an already loaded raw frame.
pub fn prepare_frame(raw: &DataFrame, test_fraction: f64, seed: u64) -> Result<PreparedData> {
    let cleaned = clean_target(raw)?;
    if cleaned.height() == 0 {
        return Err(PipelineError::EmptyDataset);
    }

    let grouped = add_grouped_qualification(&cleaned)?;
    debug!(
        column = GROUPED_QUALIFICATION_COLUMN,
        "derived grouped qualification"
    );

    let (x, y) = split_features_and_target(&grouped)?;
    let x = impute_missing(&x)?;
    let x = one_hot_encode(&x, true)?;
    info!(features = x.width(), "imputed and encoded features");

    let labels = label_vector(&y)?;
    let (train_idx, test_idx) = stratified_split(&labels, test_fraction, seed);

    Ok(PreparedData {
        x_train: take_rows(&x, &train_idx)?,
        x_test: take_rows(&x, &test_idx)?,
        y_train: take_rows(&y, &train_idx)?,
        y_test: take_rows(&y, &test_idx)?,
    })
}

pub fn write_partitions(dir: &Path, data: &mut PreparedData) -> Result<()> {
    write_csv_file(&dir.join(X_TRAIN_FILE), &mut data.x_train)?;
    write_csv_file(&dir.join(X_TEST_FILE), &mut data.x_test)?;
    write_csv_file(&dir.join(Y_TRAIN_FILE), &mut data.y_train)?;
    write_csv_file(&dir.join(Y_TEST_FILE), &mut data.y_test)?;
    Ok(())
}

pub fn prepare_dataset(config: &PipelineConfig) -> Result<PreparedData> {
    info!(path = %config.raw_data_path.display(), "starting data preparation");
    let raw = load_csv_file(&config.raw_data_path)?;

    let mut prepared = prepare_frame(&raw, config.test_fraction, config.seed)?;
    write_partitions(&config.processed_dir, &mut prepared)?;

    info!(
        train_rows = prepared.x_train.height(),
        test_rows = prepared.x_test.height(),
        dir = %config.processed_dir.display(),
        "saved processed partitions"
    );
    Ok(prepared)
}
