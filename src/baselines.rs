//! Reference capability implementations: a softmax-regression training
//! procedure, two simple self-influence calculators and a synthetic
//! dataset generator. Used by the demo binary and the integration tests;
//! real influence methods plug into the same traits.

use std::path::Path;

use anyhow::{ensure, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::data::dataset::{BatchedView, LabeledDataset};
use crate::influence::{InfluenceCalculator, InfluenceCalculatorFactory};
use crate::train::{
    CheckpointRecorder, EpochLogs, EpochObserver, TrainOutput, TrainingProcedure,
};

/// Multinomial logistic regression. `weights[c]` holds one slot per input
/// feature plus a trailing bias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxModel {
    weights: Vec<Vec<f64>>,
}

impl SoftmaxModel {
    fn zeros(n_classes: usize, n_features: usize) -> Self {
        Self {
            weights: vec![vec![0.0; n_features + 1]; n_classes],
        }
    }

    /// Class probabilities for one input.
    pub fn predict(&self, input: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .map(|w| {
                let mut z = w[input.len()];
                for (wi, xi) in w[..input.len()].iter().zip(input) {
                    z += wi * xi;
                }
                z
            })
            .collect();
        softmax(&logits)
    }

    /// Cross-entropy of one example against its one-hot label.
    pub fn loss(&self, input: &[f64], label: &[f64]) -> f64 {
        let probs = self.predict(input);
        -label
            .iter()
            .zip(&probs)
            .map(|(y, p)| y * p.max(1e-12).ln())
            .sum::<f64>()
    }

    pub fn predicted_class(&self, input: &[f64]) -> usize {
        let probs = self.predict(input);
        probs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(c, _)| c)
            .unwrap_or(0)
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// Fraction of examples whose argmax prediction matches the label.
pub fn accuracy(model: &SoftmaxModel, dataset: &LabeledDataset) -> f64 {
    let hits = (0..dataset.len())
        .filter(|&i| model.predicted_class(dataset.input(i)) == dataset.label_class(i))
        .count();
    hits as f64 / dataset.len() as f64
}

/// Deterministic minibatch-SGD training for `SoftmaxModel`. Drives a
/// `CheckpointRecorder` at epoch boundaries and returns it as the run's
/// training artifacts.
pub struct SoftmaxProcedure {
    pub epochs: usize,
    pub learning_rate: f64,
    pub epochs_to_save: Vec<usize>,
}

impl TrainingProcedure for SoftmaxProcedure {
    type Model = SoftmaxModel;
    type Artifacts = CheckpointRecorder<SoftmaxModel>;

    fn train(
        &self,
        training_dataset: &LabeledDataset,
        test_dataset: &LabeledDataset,
        train_batch_size: usize,
        _test_batch_size: usize,
        log_path: Option<&Path>,
    ) -> Result<TrainOutput<Self::Model, Self::Artifacts>> {
        let n_features = training_dataset.input(0).len();
        let n_classes = training_dataset.n_classes();
        let mut model = SoftmaxModel::zeros(n_classes, n_features);
        let mut recorder = CheckpointRecorder::new(
            self.epochs_to_save.iter().copied(),
            log_path.map(|p| p.to_path_buf()),
        )?;

        for epoch in 0..self.epochs {
            let mut epoch_loss = 0.0;
            for batch in training_dataset.batched(train_batch_size).batches() {
                let mut grad = vec![vec![0.0; n_features + 1]; n_classes];
                for (_, input, label) in batch.examples() {
                    let probs = model.predict(input);
                    epoch_loss -= label
                        .iter()
                        .zip(&probs)
                        .map(|(y, p)| y * p.max(1e-12).ln())
                        .sum::<f64>();
                    for (c, g) in grad.iter_mut().enumerate() {
                        let delta = probs[c] - label[c];
                        for (gi, xi) in g[..n_features].iter_mut().zip(input) {
                            *gi += delta * xi;
                        }
                        g[n_features] += delta;
                    }
                }
                let scale = self.learning_rate / batch.len() as f64;
                for (w, g) in model.weights.iter_mut().zip(&grad) {
                    for (wi, gi) in w.iter_mut().zip(g) {
                        *wi -= scale * gi;
                    }
                }
            }

            let logs = EpochLogs {
                train_loss: epoch_loss / training_dataset.len() as f64,
                train_accuracy: accuracy(&model, training_dataset),
                test_accuracy: Some(accuracy(&model, test_dataset)),
            };
            recorder.on_epoch_end(epoch, &model, self.learning_rate, &logs)?;
        }

        let train_accuracy = accuracy(&model, training_dataset);
        let test_accuracy = accuracy(&model, test_dataset);
        Ok(TrainOutput {
            train_accuracy,
            test_accuracy,
            model,
            artifacts: recorder,
        })
    }
}

/// Scores each example by its own cross-entropy loss under the final
/// model. Mislabeled examples the model failed to memorize score high.
pub struct LossSelfInfluence {
    model: SoftmaxModel,
}

impl InfluenceCalculator for LossSelfInfluence {
    fn self_influence(&self, batched: &BatchedView<'_>) -> Result<Vec<f64>> {
        let mut scores = Vec::with_capacity(batched.n_examples());
        for batch in batched.batches() {
            for (_, input, label) in batch.examples() {
                scores.push(self.model.loss(input, label));
            }
        }
        Ok(scores)
    }
}

pub struct LossSelfInfluenceFactory;

impl InfluenceCalculatorFactory<SoftmaxModel, CheckpointRecorder<SoftmaxModel>>
    for LossSelfInfluenceFactory
{
    fn build(
        &self,
        _batched: &BatchedView<'_>,
        model: &SoftmaxModel,
        _artifacts: &CheckpointRecorder<SoftmaxModel>,
    ) -> Result<Box<dyn InfluenceCalculator>> {
        Ok(Box::new(LossSelfInfluence {
            model: model.clone(),
        }))
    }
}

/// First-order TracIn-style self-influence: the sum over recorded
/// checkpoints of `lr_k * ||grad loss||^2`. For the softmax model that
/// gradient norm factors into `sum_c (p_c - y_c)^2 * (||x||^2 + 1)`.
pub struct CheckpointSelfInfluence {
    checkpoints: Vec<SoftmaxModel>,
    learning_rates: Vec<f64>,
}

impl InfluenceCalculator for CheckpointSelfInfluence {
    fn self_influence(&self, batched: &BatchedView<'_>) -> Result<Vec<f64>> {
        let mut scores = Vec::with_capacity(batched.n_examples());
        for batch in batched.batches() {
            for (_, input, label) in batch.examples() {
                let x_norm_sq = 1.0 + input.iter().map(|x| x * x).sum::<f64>();
                let mut score = 0.0;
                for (model, lr) in self.checkpoints.iter().zip(&self.learning_rates) {
                    let probs = model.predict(input);
                    let delta_sq: f64 = probs
                        .iter()
                        .zip(label)
                        .map(|(p, y)| (p - y) * (p - y))
                        .sum();
                    score += lr * delta_sq * x_norm_sq;
                }
                scores.push(score);
            }
        }
        Ok(scores)
    }
}

pub struct CheckpointSelfInfluenceFactory;

impl InfluenceCalculatorFactory<SoftmaxModel, CheckpointRecorder<SoftmaxModel>>
    for CheckpointSelfInfluenceFactory
{
    fn build(
        &self,
        _batched: &BatchedView<'_>,
        _model: &SoftmaxModel,
        artifacts: &CheckpointRecorder<SoftmaxModel>,
    ) -> Result<Box<dyn InfluenceCalculator>> {
        ensure!(
            !artifacts.is_empty(),
            "checkpoint-based influence needs at least one recorded checkpoint"
        );
        Ok(Box::new(CheckpointSelfInfluence {
            checkpoints: artifacts.models().to_vec(),
            learning_rates: artifacts.learning_rates().to_vec(),
        }))
    }
}

/// Gaussian class clusters: class c is centered on axis `c % n_features`
/// and jittered with isotropic noise of the given spread.
pub fn synthetic_blobs(
    n_examples: usize,
    n_features: usize,
    n_classes: usize,
    spread: f64,
    rng: &mut impl Rng,
) -> Result<LabeledDataset> {
    ensure!(n_features > 0, "need at least one feature");
    let normal = Normal::new(0.0, spread)?;
    let mut inputs = Vec::with_capacity(n_examples);
    let mut classes = Vec::with_capacity(n_examples);
    for i in 0..n_examples {
        let class = i % n_classes;
        let mut x = vec![0.0; n_features];
        x[class % n_features] = 2.0;
        for xi in x.iter_mut() {
            *xi += normal.sample(rng);
        }
        inputs.push(x);
        classes.push(class);
    }
    LabeledDataset::from_class_indices(inputs, &classes, n_classes)
}
