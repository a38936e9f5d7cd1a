use crate::indicators::{IndicatorSnapshot, GDP, INFLATION, UNEMPLOYMENT};
use crate::inference::StudentRecord;

/// Values the form falls back to when no indicator is available.
pub const FORM_DEFAULTS: &[(&str, f64)] = &[(INFLATION, 1.5), (GDP, 0.5), (UNEMPLOYMENT, 12.0)];

/// State that lives for one user session and is handed to each prediction.
#[derive(Debug, Clone, Default)]
pub struct Session {
    indicators: Option<IndicatorSnapshot>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indicators(indicators: IndicatorSnapshot) -> Self {
        Self {
            indicators: Some(indicators),
        }
    }

    pub fn has_indicators(&self) -> bool {
        self.indicators.is_some()
    }

    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.as_ref()?.get(name).copied().flatten()
    }

    /// Fills the macroeconomic fields the record lacks, preferring fetched
    /// values over the form defaults.
    pub fn enrich(&self, record: &StudentRecord) -> StudentRecord {
        let mut enriched = record.clone();
        for &(name, default) in FORM_DEFAULTS {
            if !enriched.contains(name) {
                enriched.set(name, self.indicator(name).unwrap_or(default));
            }
        }
        enriched
    }
}
