use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use dropout_risk_predictor::{
    extract_unique_values, fetch_indicators, options, prepare_dataset, train_and_evaluate,
    PipelineConfig, Predictor, RiskLevel, Session, SgsClient, StudentRecord, DEFAULT_SERIES,
};

// Stages, run in order
// 1. extract-values: dump form options from the raw CSV
// 2. prepare: clean, encode and split the raw CSV
// 3. train: fit and evaluate the forest, save the model
// 4. predict: score one student record
#[derive(Parser)]
#[command(name = "dropout-risk", version, about = "Student dropout risk pipeline")]
struct Cli {
    /// Project root holding data/, models/ and artifacts/
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// More logging (-v for debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the distinct values of every text column
    ExtractValues {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Prepare train/test partitions from the raw dataset
    Prepare,
    /// Train the classifier on the prepared partitions
    Train,
    /// Predict the dropout risk of one student
    Predict {
        /// JSON object mapping raw column names to values
        #[arg(long)]
        record: PathBuf,
        /// Fetch live macroeconomic indicators before predicting
        #[arg(long)]
        fetch_indicators: bool,
    },
    /// Print the latest macroeconomic indicators
    FetchIndicators,
}

fn init_tracing(verbose: u8) {
    let default = if verbose > 0 { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = PipelineConfig::with_root(&cli.root);

    match cli.command {
        Command::ExtractValues { input, output_dir } => {
            let input = input.unwrap_or_else(|| config.raw_data_path.clone());
            let output_dir = output_dir.unwrap_or_else(|| config.form_options_dir.clone());
            let report = extract_unique_values(&input, &output_dir)?;
            info!(
                written = report.written.len(),
                failed = report.failed.len(),
                "value extraction finished"
            );
        }
        Command::Prepare => {
            prepare_dataset(&config)?;
        }
        Command::Train => {
            let evaluation = train_and_evaluate(&config)?;
            println!("Accuracy: {:.4}", evaluation.accuracy);
            match evaluation.roc_auc {
                Some(auc) => println!("ROC AUC:  {auc:.4}"),
                None => println!("ROC AUC:  undefined (single class in test set)"),
            }
            println!("\n{}", evaluation.report);
        }
        Command::Predict {
            record,
            fetch_indicators: fetch,
        } => {
            let record = StudentRecord::from_json_file(&record)?;
            let session = if fetch {
                Session::with_indicators(fetch_indicators(&SgsClient::new()?, DEFAULT_SERIES))
            } else {
                Session::new()
            };
            info!(
                live_indicators = session.has_indicators(),
                "enriching record with macroeconomic indicators"
            );

            for (column, value) in options::unknown_values(&record, &config.form_options_dir) {
                warn!(column = %column, value = %value, "value not seen in the raw dataset");
            }

            let predictor = Predictor::load(&config)?;
            debug!(features = predictor.schema().len(), "loaded model and training schema");
            let prediction = predictor.predict(&session.enrich(&record))?;
            let p = prediction.dropout_probability();
            match prediction.risk_level() {
                RiskLevel::High => println!("HIGH DROPOUT RISK ({:.1}%)", p * 100.0),
                RiskLevel::Low => println!("LOW DROPOUT RISK ({:.1}%)", p * 100.0),
            }
        }
        Command::FetchIndicators => {
            let snapshot = fetch_indicators(&SgsClient::new()?, DEFAULT_SERIES);
            for (name, value) in &snapshot {
                match value {
                    Some(value) => println!("{name}: {value:.2}"),
                    None => println!("{name}: unavailable"),
                }
            }
        }
    }

    Ok(())
}
