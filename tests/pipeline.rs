use std::fs;
use std::path::Path;

use dropout_risk_predictor::config::TARGET_COLUMN;
use dropout_risk_predictor::frame::{column_names, load_csv_file};
use dropout_risk_predictor::inference::TrainingSchema;
use dropout_risk_predictor::model::RiskModel;
use dropout_risk_predictor::prepare::label_vector;
use dropout_risk_predictor::{
    extract_unique_values, prepare_dataset, train_and_evaluate, PipelineConfig, PipelineError,
    Predictor, Session, StudentRecord,
};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/students.csv");

fn project(root: &Path) -> PipelineConfig {
    let config = PipelineConfig::with_root(root);
    fs::create_dir_all(config.raw_data_path.parent().unwrap()).unwrap();
    fs::copy(FIXTURE, &config.raw_data_path).unwrap();
    config
}

struct Constant(f32);

impl RiskModel for Constant {
    fn positive_probabilities(
        &self,
        _rows: &[f32],
        n_rows: usize,
    ) -> dropout_risk_predictor::Result<Vec<f32>> {
        Ok(vec![self.0; n_rows])
    }
}

#[test]
fn mislabeled_rows_are_filtered_out() {
    let dir = tempfile::tempdir().unwrap();
    let config = project(dir.path());

    let prepared = prepare_dataset(&config).unwrap();
    assert_eq!(prepared.x_train.height() + prepared.x_test.height(), 8);
    assert_eq!(prepared.x_test.height(), 2);

    let y_test = load_csv_file(&config.processed_dir.join("y_test.csv")).unwrap();
    assert_eq!(column_names(&y_test), vec![TARGET_COLUMN]);
    let mut labels = label_vector(&y_test).unwrap();
    labels.sort();
    assert_eq!(labels, vec![0, 1]);
}

#[test]
fn training_schema_uses_baseline_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let config = project(dir.path());
    prepare_dataset(&config).unwrap();

    let schema = TrainingSchema::load(&config.schema_path()).unwrap();
    let columns = schema.columns();
    assert!(columns.iter().any(|c| c == "NotaAdmissao"));
    assert!(columns.iter().any(|c| c == "Curso_Enfermagem"));
    assert!(!columns.iter().any(|c| c == "Curso_Design"));
    assert!(!columns.iter().any(|c| c.starts_with("QualificacaoAnterior")));
    assert!(columns
        .iter()
        .any(|c| c == "QualificacaoAgrupada_Ensino Médio"));
    assert!(!columns.iter().any(|c| c == TARGET_COLUMN));
}

#[test]
fn unseen_category_never_breaks_inference() {
    let dir = tempfile::tempdir().unwrap();
    let config = project(dir.path());
    prepare_dataset(&config).unwrap();

    let schema = TrainingSchema::load(&config.schema_path()).unwrap();
    let predictor = Predictor::new(Constant(0.9), schema);
    let record = StudentRecord::new()
        .with("EstadoCivil", "Viúvo")
        .with("Curso", "Astronomia")
        .with("QualificacaoAgrupada", "Ensino Superior")
        .with("NotaAdmissao", 128.0);

    let prediction = predictor.predict(&Session::new().enrich(&record)).unwrap();
    assert_eq!(prediction.label, 1);
}

#[test]
fn training_requires_prepared_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::with_root(dir.path());
    let err = train_and_evaluate(&config).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MissingPrerequisite { step: "prepare", .. }
    ));
    assert!(err.to_string().contains("X_train.csv"));
}

#[test]
fn full_pipeline_trains_and_predicts() {
    let dir = tempfile::tempdir().unwrap();
    let config = project(dir.path());

    let report = extract_unique_values(&config.raw_data_path, &config.form_options_dir).unwrap();
    assert!(report.failed.is_empty());
    assert!(config.form_options_dir.join("curso_values.txt").exists());

    prepare_dataset(&config).unwrap();
    let evaluation = train_and_evaluate(&config).unwrap();
    assert!((0.0..=1.0).contains(&evaluation.accuracy));
    assert!(config.model_path().exists());
    assert!(config.evaluation_path().exists());

    let predictor = Predictor::load(&config).unwrap();
    let record = StudentRecord::new()
        .with("EstadoCivil", "Solteiro")
        .with("Curso", "Design")
        .with("Genero", "Masculino")
        .with("NotaAdmissao", 112.0)
        .with("Bolsista", 0.0)
        .with("QualificacaoAgrupada", "Ensino Médio");
    let prediction = predictor.predict(&Session::new().enrich(&record)).unwrap();
    let p = prediction.dropout_probability();
    assert!((0.0..=1.0).contains(&p));
    assert_eq!(prediction.label, i32::from(p > 0.5));
}
