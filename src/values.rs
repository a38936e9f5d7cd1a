//! Dumps the distinct values of every text column, one file per column.
//!
//! The files feed the selection inputs of the prediction form and are read
//! back by [`crate::options`].

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::error::{PipelineError, Result};
use crate::frame::{is_text_column, load_csv_file, text_values};

/// Outcome of one extraction run.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

/// `"Estado Civil"` becomes `estado_civil_values.txt`.
pub fn values_file_name(column: &str) -> String {
    format!("{}_values.txt", column.replace(' ', "_").to_lowercase())
}

pub fn extract_unique_values(input: &Path, output_dir: &Path) -> Result<ExtractionReport> {
    if !input.exists() {
        return Err(PipelineError::DatasetNotFound(input.to_path_buf()));
    }
    let df = load_csv_file(input)?;
    fs::create_dir_all(output_dir)?;

    let text_columns: Vec<_> = df
        .get_columns()
        .iter()
        .filter(|series| is_text_column(series))
        .collect();
    info!(
        count = text_columns.len(),
        "found text columns to extract values from"
    );

    let mut report = ExtractionReport::default();
    for series in text_columns {
        let column = series.name().to_string();
        let values: BTreeSet<String> = text_values(series)?.into_iter().flatten().collect();
        let path = output_dir.join(values_file_name(&column));

        match write_values(&path, &values) {
            Ok(()) => {
                info!(column = %column, path = %path.display(), values = values.len(), "saved unique values");
                report.written.push(path);
            }
            Err(err) => {
                error!(column = %column, path = %path.display(), %err, "failed to save unique values");
                report.failed.push((column, err.to_string()));
            }
        }
    }
    Ok(report)
}

fn write_values(path: &Path, values: &BTreeSet<String>) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    for value in values {
        writeln!(file, "{value}")?;
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = "\
Estado Civil,Curso,NotaAdmissao
Solteiro,Enfermagem,120.5
Casado,Design,130.0
Solteiro,,99.0
Divorciado,Design,140.2
";

    fn dataset(dir: &Path) -> PathBuf {
        let path = dir.join("data.csv");
        fs::write(&path, DATASET).unwrap();
        path
    }

    #[test]
    fn file_names_are_lowercased_with_underscores() {
        assert_eq!(values_file_name("Estado Civil"), "estado_civil_values.txt");
        assert_eq!(values_file_name("Curso"), "curso_values.txt");
    }

    #[test]
    fn writes_sorted_distinct_values_for_text_columns_only() {
        let dir = tempfile::tempdir().unwrap();
        let input = dataset(dir.path());
        let out = dir.path().join("options");

        let report = extract_unique_values(&input, &out).unwrap();
        assert_eq!(report.written.len(), 2);
        assert!(report.failed.is_empty());

        let estado = fs::read_to_string(out.join("estado_civil_values.txt")).unwrap();
        assert_eq!(estado, "Casado\nDivorciado\nSolteiro\n");
        let curso = fs::read_to_string(out.join("curso_values.txt")).unwrap();
        assert_eq!(curso, "Design\nEnfermagem\n");
        assert!(!out.join("notaadmissao_values.txt").exists());
    }

    #[test]
    fn second_run_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let input = dataset(dir.path());
        let out = dir.path().join("options");

        extract_unique_values(&input, &out).unwrap();
        let first = fs::read(out.join("curso_values.txt")).unwrap();
        extract_unique_values(&input, &out).unwrap();
        let second = fs::read(out.join("curso_values.txt")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_input_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("options");
        let err = extract_unique_values(&dir.path().join("nope.csv"), &out).unwrap_err();
        assert!(matches!(err, PipelineError::DatasetNotFound(_)));
        assert!(!out.exists());
    }

    #[test]
    fn unwritable_column_file_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let input = dataset(dir.path());
        let out = dir.path().join("options");
        // A directory squatting on the target name makes File::create fail.
        fs::create_dir_all(out.join("curso_values.txt")).unwrap();

        let report = extract_unique_values(&input, &out).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "Curso");
        assert_eq!(report.written, vec![out.join("estado_civil_values.txt")]);
    }
}
