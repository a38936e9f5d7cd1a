//! Selection options for the prediction form, read back from the files the
//! value extractor writes.

use std::fs;
use std::path::Path;

use crate::config::GROUPED_QUALIFICATION_COLUMN;
use crate::inference::{FieldValue, StudentRecord};
use crate::values::values_file_name;

/// Choices for the grouped qualification, in form order.
pub const GROUPED_QUALIFICATION_OPTIONS: &[&str] = &[
    "Ensino Médio",
    "Ensino Superior",
    "Ensino Superior Incompleto",
    "Ensino Técnico/Profissionalizante",
    "Ensino Básico",
    "Outros",
];

/// Options for `column`; a missing file yields no options.
pub fn load_options(dir: &Path, column: &str) -> Vec<String> {
    if column == GROUPED_QUALIFICATION_COLUMN {
        return GROUPED_QUALIFICATION_OPTIONS
            .iter()
            .map(|s| s.to_string())
            .collect();
    }
    fs::read_to_string(dir.join(values_file_name(column)))
        .map(|text| {
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Text fields whose value is missing from a known option list.
pub fn unknown_values(record: &StudentRecord, dir: &Path) -> Vec<(String, String)> {
    record
        .fields()
        .filter_map(|(name, value)| match value {
            FieldValue::Text(text) => {
                let options = load_options(dir, name);
                (!options.is_empty() && !options.contains(text))
                    .then(|| (name.to_string(), text.clone()))
            }
            _ => None,
        })
        .collect()
}
