//! The bagged tree ensemble. Each member is a one-round XGBoost booster
//! grown on its own bootstrap sample of the training rows; the ensemble
//! scores a row by averaging the members' probabilities.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use xgboost::parameters::learning::{LearningTaskParametersBuilder, Objective};
use xgboost::parameters::tree::TreeBoosterParametersBuilder;
use xgboost::parameters::{BoosterParametersBuilder, BoosterType, TrainingParametersBuilder};
use xgboost::{Booster, DMatrix};

use crate::config::ForestParams;
use crate::error::{PipelineError, Result};

const ARTIFACT_MAGIC: &[u8; 4] = b"DRF1";

/// Anything that scores rows with a dropout probability.
pub trait RiskModel {
    /// Positive-class probability for each row of a row-major matrix.
    fn positive_probabilities(&self, rows: &[f32], n_rows: usize) -> Result<Vec<f32>>;
}

pub struct DropoutForest {
    members: Vec<Booster>,
}

/// sklearn-style `balanced` weights: `n / (n_classes * n_class)`.
pub fn class_balanced_weights(labels: &[i32]) -> Vec<f32> {
    let n = labels.len() as f32;
    let positives = labels.iter().filter(|&&l| l == 1).count() as f32;
    let negatives = n - positives;
    labels
        .iter()
        .map(|&l| {
            let count = if l == 1 { positives } else { negatives };
            n / (2.0 * count)
        })
        .collect()
}

/// Row indices of every member's bootstrap sample: `n_rows` draws with
/// replacement per member, reproducible for a given seed.
pub fn bootstrap_samples(n_rows: usize, n_members: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_members)
        .map(|_| (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect())
        .collect()
}

/// Row-wise mean of the members' probabilities.
pub fn average_probabilities(per_member: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = per_member.first() else {
        return Vec::new();
    };
    let mut sums = vec![0.0f32; first.len()];
    for probabilities in per_member {
        for (sum, p) in sums.iter_mut().zip(probabilities) {
            *sum += p;
        }
    }
    let n = per_member.len() as f32;
    sums.into_iter().map(|sum| sum / n).collect()
}

/// Frames the members' serialized boosters into one artifact.
fn pack_members(members: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + members.iter().map(|m| m.len() + 8).sum::<usize>());
    out.extend_from_slice(ARTIFACT_MAGIC);
    out.extend_from_slice(&(members.len() as u32).to_le_bytes());
    for member in members {
        out.extend_from_slice(&(member.len() as u64).to_le_bytes());
        out.extend_from_slice(member);
    }
    out
}

fn malformed(reason: &str) -> PipelineError {
    PipelineError::Model(format!("malformed model artifact: {reason}"))
}

fn take<'a>(bytes: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if bytes.len() < len {
        return Err(malformed("truncated"));
    }
    let (head, rest) = bytes.split_at(len);
    *bytes = rest;
    Ok(head)
}

fn unpack_members(mut bytes: &[u8]) -> Result<Vec<&[u8]>> {
    if take(&mut bytes, 4)? != ARTIFACT_MAGIC {
        return Err(malformed("bad header"));
    }
    let mut count = [0u8; 4];
    count.copy_from_slice(take(&mut bytes, 4)?);
    let count = u32::from_le_bytes(count) as usize;

    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        let mut len = [0u8; 8];
        len.copy_from_slice(take(&mut bytes, 8)?);
        members.push(take(&mut bytes, u64::from_le_bytes(len) as usize)?);
    }
    if !bytes.is_empty() {
        return Err(malformed("trailing bytes"));
    }
    if members.is_empty() {
        return Err(malformed("no ensemble members"));
    }
    Ok(members)
}

fn fit_member(
    rows: &[f32],
    n_rows: usize,
    labels: &[f32],
    weights: Option<&[f32]>,
    params: &ForestParams,
    seed: u64,
) -> Result<Booster> {
    let mut dtrain = DMatrix::from_dense(rows, n_rows)?;
    dtrain.set_labels(labels)?;
    if let Some(weights) = weights {
        dtrain.set_weights(weights)?;
    }

    let tree_params = TreeBoosterParametersBuilder::default()
        .eta(1.0)
        .max_depth(params.max_depth)
        .colsample_bylevel(params.feature_subsample)
        .build()
        .map_err(PipelineError::Model)?;

    let learning_params = LearningTaskParametersBuilder::default()
        .objective(Objective::BinaryLogistic)
        .seed(seed)
        .build()
        .map_err(PipelineError::Model)?;

    let booster_params = BoosterParametersBuilder::default()
        .booster_type(BoosterType::Tree(tree_params))
        .learning_params(learning_params)
        .verbose(false)
        .build()
        .map_err(PipelineError::Model)?;

    let training_params = TrainingParametersBuilder::default()
        .dtrain(&dtrain)
        .boost_rounds(1)
        .booster_params(booster_params)
        .evaluation_sets(None)
        .build()
        .map_err(PipelineError::Model)?;

    Ok(Booster::train(&training_params)?)
}

impl DropoutForest {
    pub fn fit(rows: &[f32], n_rows: usize, labels: &[i32], params: &ForestParams) -> Result<Self> {
        if n_rows == 0 {
            return Err(PipelineError::EmptyDataset);
        }
        if params.n_estimators == 0 {
            return Err(PipelineError::Model("n_estimators must be at least 1".into()));
        }
        let width = rows.len() / n_rows;
        let weights = params.class_balanced.then(|| class_balanced_weights(labels));

        let samples = bootstrap_samples(n_rows, params.n_estimators as usize, params.seed);
        let mut members = Vec::with_capacity(samples.len());
        for (i, sample) in samples.iter().enumerate() {
            let mut sample_rows = Vec::with_capacity(sample.len() * width);
            for &row in sample {
                sample_rows.extend_from_slice(&rows[row * width..(row + 1) * width]);
            }
            let sample_labels: Vec<f32> = sample.iter().map(|&row| labels[row] as f32).collect();
            let sample_weights: Option<Vec<f32>> =
                weights.as_ref().map(|w| sample.iter().map(|&row| w[row]).collect());

            let seed = params.seed.wrapping_add(i as u64);
            members.push(fit_member(
                &sample_rows,
                sample.len(),
                &sample_labels,
                sample_weights.as_deref(),
                params,
                seed,
            )?);
            debug!(member = i, seed, "fitted ensemble member");
        }
        Ok(Self { members })
    }

    pub fn n_members(&self) -> usize {
        self.members.len()
    }

    /// Writes every member into a single artifact at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // xgboost 0.1 only serializes boosters to files
        let scratch = path.with_extension("member");
        let mut serialized = Vec::with_capacity(self.members.len());
        for member in &self.members {
            member.save(&scratch)?;
            serialized.push(fs::read(&scratch)?);
        }
        if scratch.exists() {
            fs::remove_file(&scratch)?;
        }
        fs::write(path, pack_members(&serialized))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::ModelNotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let members = unpack_members(&bytes)?
            .into_iter()
            .map(Booster::load_buffer)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { members })
    }
}

impl RiskModel for DropoutForest {
    fn positive_probabilities(&self, rows: &[f32], n_rows: usize) -> Result<Vec<f32>> {
        let dmat = DMatrix::from_dense(rows, n_rows)?;
        let per_member = self
            .members
            .iter()
            .map(|member| member.predict(&dmat))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(average_probabilities(&per_member))
    }
}
