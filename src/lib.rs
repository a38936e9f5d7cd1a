pub mod config;
pub mod error;
pub mod frame;
pub mod indicators;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod options;
pub mod prepare;
pub mod session;
pub mod split;
pub mod train;
pub mod values;

pub use config::PipelineConfig;
pub use error::{FetchError, PipelineError, Result};
pub use indicators::{fetch_indicators, SgsClient, DEFAULT_SERIES};
pub use inference::{Prediction, Predictor, RiskLevel, StudentRecord};
pub use prepare::prepare_dataset;
pub use session::Session;
pub use train::train_and_evaluate;
pub use values::extract_unique_values;
