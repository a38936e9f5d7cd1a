use std::path::{Path, PathBuf};

pub const TARGET_COLUMN: &str = "Target";
pub const POSITIVE_CLASS: &str = "Desistente";
pub const NEGATIVE_CLASS: &str = "Graduado";

pub const QUALIFICATION_COLUMN: &str = "QualificacaoAnterior";
pub const QUALIFICATION_GRADE_COLUMN: &str = "QualificacaoAnteriorGrau";
pub const GROUPED_QUALIFICATION_COLUMN: &str = "QualificacaoAgrupada";

pub const MODEL_FILENAME: &str = "dropout_classifier_v1.bin";
pub const EVALUATION_FILENAME: &str = "evaluation_v1.json";

/// Hyperparameters of the bagged tree ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_estimators: u32,
    pub max_depth: u32,
    pub seed: u64,
    /// Fraction of features each tree level may split on.
    pub feature_subsample: f32,
    pub class_balanced: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            seed: 42,
            feature_subsample: 0.8,
            class_balanced: true,
        }
    }
}

/// Paths and fixed parameters shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub raw_data_path: PathBuf,
    pub processed_dir: PathBuf,
    pub model_dir: PathBuf,
    pub form_options_dir: PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
    pub forest: ForestParams,
}

impl PipelineConfig {
    /// Lays out the standard project tree under `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            raw_data_path: root.join("data").join("raw").join("data.csv"),
            processed_dir: root.join("data").join("processed"),
            model_dir: root.join("models"),
            form_options_dir: root.join("artifacts").join("form_options"),
            test_fraction: 0.2,
            seed: 42,
            forest: ForestParams::default(),
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_FILENAME)
    }

    pub fn evaluation_path(&self) -> PathBuf {
        self.model_dir.join(EVALUATION_FILENAME)
    }

    /// The processed training features; its header is the training schema.
    pub fn schema_path(&self) -> PathBuf {
        self.processed_dir.join("X_train.csv")
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_root(".")
    }
}
