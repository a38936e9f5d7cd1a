use std::fs::File;
use std::path::Path;

use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{PipelineConfig, NEGATIVE_CLASS, POSITIVE_CLASS};
use crate::error::{PipelineError, Result};
use crate::frame::{load_csv_file, to_row_major};
use crate::metrics::{roc_auc, ClassificationReport, ConfusionMatrix};
use crate::model::{DropoutForest, RiskModel};
use crate::prepare::{label_vector, PreparedData, X_TEST_FILE, X_TRAIN_FILE, Y_TEST_FILE, Y_TRAIN_FILE};

/// Test-partition evaluation, persisted next to the model.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub roc_auc: Option<f64>,
    pub confusion_matrix: ConfusionMatrix,
    pub report: ClassificationReport,
}

fn load_partition(dir: &Path, name: &str) -> Result<DataFrame> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(PipelineError::MissingPrerequisite {
            path,
            step: "prepare",
        });
    }
    load_csv_file(&path)
}

pub fn load_partitions(dir: &Path) -> Result<PreparedData> {
    Ok(PreparedData {
        x_train: load_partition(dir, X_TRAIN_FILE)?,
        x_test: load_partition(dir, X_TEST_FILE)?,
        y_train: load_partition(dir, Y_TRAIN_FILE)?,
        y_test: load_partition(dir, Y_TEST_FILE)?,
    })
}

/// Scores the test partition; rows with probability above 0.5 are dropouts.
pub fn evaluate<M: RiskModel>(model: &M, x_test: &DataFrame, y_test: &DataFrame) -> Result<Evaluation> {
    let rows = to_row_major(x_test)?;
    let probabilities = model.positive_probabilities(&rows, x_test.height())?;
    let y_true = label_vector(y_test)?;
    let y_pred: Vec<i32> = probabilities.iter().map(|&p| i32::from(p > 0.5)).collect();

    let confusion_matrix = ConfusionMatrix::from_predictions(&y_true, &y_pred);
    let report = ClassificationReport::from_confusion(&confusion_matrix, [NEGATIVE_CLASS, POSITIVE_CLASS]);
    Ok(Evaluation {
        accuracy: confusion_matrix.accuracy(),
        roc_auc: roc_auc(&y_true, &probabilities),
        confusion_matrix,
        report,
    })
}

pub fn write_evaluation(path: &Path, evaluation: &Evaluation) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    serde_json::to_writer_pretty(File::create(path)?, evaluation)?;
    Ok(())
}

// Train the forest on the processed partitions
// Evaluates it on the held-out test rows
// Saves the model and the evaluation report to the model directory
pub fn train_and_evaluate(config: &PipelineConfig) -> Result<Evaluation> {
    info!(dir = %config.processed_dir.display(), "loading processed partitions");
    let data = load_partitions(&config.processed_dir)?;

    let rows = to_row_major(&data.x_train)?;
    let labels = label_vector(&data.y_train)?;
    info!(
        rows = data.x_train.height(),
        features = data.x_train.width(),
        trees = config.forest.n_estimators,
        max_depth = config.forest.max_depth,
        "training bagged tree ensemble"
    );
    let model = DropoutForest::fit(&rows, data.x_train.height(), &labels, &config.forest)?;
    debug!(members = model.n_members(), "ensemble fitted");

    let evaluation = evaluate(&model, &data.x_test, &data.y_test)?;
    info!(
        accuracy = evaluation.accuracy,
        roc_auc = ?evaluation.roc_auc,
        "evaluated on test partition"
    );

    let model_path = config.model_path();
    model.save(&model_path)?;
    write_evaluation(&config.evaluation_path(), &evaluation)?;
    info!(
        model = %model_path.display(),
        report = %config.evaluation_path().display(),
        "saved model artifacts"
    );
    Ok(evaluation)
}
