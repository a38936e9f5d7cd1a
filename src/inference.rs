//! Single-record inference: encode the record, align it to the training
//! schema, score it with the trained model.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::frame::load_csv_header;
use crate::model::{DropoutForest, RiskModel};

/// One raw attribute value as entered on the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// A student's raw attributes keyed by the raw dataset column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StudentRecord {
    fields: BTreeMap<String, FieldValue>,
}

/// A `null` attribute is read as absent.
impl<'de> Deserialize<'de> for StudentRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, Option<FieldValue>>::deserialize(deserializer)?;
        let fields = raw
            .into_iter()
            .filter_map(|(name, value)| Some((name, value?)))
            .collect();
        Ok(Self { fields })
    }
}

impl StudentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| PipelineError::InvalidRecord(err.to_string()))
    }
}

/// Ordered feature names the model was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSchema {
    columns: Vec<String>,
}

impl TrainingSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Reads the header of the processed training features file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::SchemaNotFound(path.to_path_buf()));
        }
        let columns = load_csv_header(path)?;
        if columns.is_empty() {
            return Err(PipelineError::EmptySchema(path.to_path_buf()));
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One-hot encodes a single record without dropping a baseline: numbers keep
/// their name, text becomes `<attribute>_<value>` set to 1.
pub fn encode_record(record: &StudentRecord) -> BTreeMap<String, f64> {
    record
        .fields()
        .map(|(name, value)| match value {
            FieldValue::Number(n) => (name.to_string(), *n),
            FieldValue::Flag(flag) => (name.to_string(), f64::from(u8::from(*flag))),
            FieldValue::Text(text) => (format!("{name}_{text}"), 1.0),
        })
        .collect()
}

/// Reindexes an encoded row to the schema: schema order, zero for absent
/// columns, encoded columns outside the schema dropped.
pub fn align_to_schema(encoded: &BTreeMap<String, f64>, schema: &TrainingSchema) -> Vec<f32> {
    schema
        .columns()
        .iter()
        .map(|column| encoded.get(column).copied().unwrap_or(0.0) as f32)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: i32,
    /// `[graduate, dropout]`
    pub probabilities: [f64; 2],
}

impl Prediction {
    pub fn from_dropout_probability(p: f64) -> Self {
        Self {
            label: i32::from(p > 0.5),
            probabilities: [1.0 - p, p],
        }
    }

    pub fn dropout_probability(&self) -> f64 {
        self.probabilities[1]
    }

    pub fn risk_level(&self) -> RiskLevel {
        if self.label == 1 {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }
}

/// A loaded model paired with the schema its input must match.
pub struct Predictor<M> {
    model: M,
    schema: TrainingSchema,
}

impl Predictor<DropoutForest> {
    /// Loads the trained forest and the training schema named by `config`.
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let model = DropoutForest::load(&config.model_path())?;
        let schema = TrainingSchema::load(&config.schema_path())?;
        Ok(Self::new(model, schema))
    }
}

impl<M: RiskModel> Predictor<M> {
    pub fn new(model: M, schema: TrainingSchema) -> Self {
        Self { model, schema }
    }

    pub fn schema(&self) -> &TrainingSchema {
        &self.schema
    }

    pub fn predict(&self, record: &StudentRecord) -> Result<Prediction> {
        let encoded = encode_record(record);
        let dropped: Vec<&String> = encoded
            .keys()
            .filter(|column| !self.schema.columns.contains(column))
            .collect();
        if !dropped.is_empty() {
            debug!(?dropped, "encoded columns outside the training schema");
        }

        let row = align_to_schema(&encoded, &self.schema);
        let probabilities = self.model.positive_probabilities(&row, 1)?;
        let p = probabilities
            .first()
            .copied()
            .ok_or_else(|| PipelineError::Model("model returned no prediction".into()))?;
        Ok(Prediction::from_dropout_probability(f64::from(p)))
    }
}
