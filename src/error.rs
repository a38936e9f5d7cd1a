use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by the batch stages and the inference service.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input dataset not found at '{}'", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("processed file '{}' not found; did you run the `{step}` step first?", .path.display())]
    MissingPrerequisite { path: PathBuf, step: &'static str },

    #[error("model not found at '{}'; make sure the model has been trained", .0.display())]
    ModelNotFound(PathBuf),

    #[error("training schema not found at '{}'; run the data preparation step", .0.display())]
    SchemaNotFound(PathBuf),

    #[error("training schema at '{}' has no columns", .0.display())]
    EmptySchema(PathBuf),

    #[error("column '{0}' not found in dataset")]
    MissingColumn(String),

    #[error("no rows left after filtering the target column")]
    EmptyDataset,

    #[error("invalid labels: {0}")]
    InvalidLabels(String),

    #[error("invalid student record: {0}")]
    InvalidRecord(String),

    #[error("model error: {0}")]
    Model(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<xgboost::XGBError> for PipelineError {
    fn from(err: xgboost::XGBError) -> Self {
        PipelineError::Model(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors from a single indicator series request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Malformed(String),
}
