use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::EvaluatorConfig;
use crate::data::dataset::LabeledDataset;
use crate::data::noise::build_noisy_training_dataset;
use crate::influence::InfluenceCalculatorFactory;
use crate::metrics::curve::{compute_curve, compute_roc, mean_curve};
use crate::report::{log_curve, JsonlSink, MetricsSink};
use crate::train::TrainingProcedure;

/// Results of evaluating one influence method: every per-trial detection
/// curve, their elementwise mean, and the ROC of the mean curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalOutcome {
    pub curves: Vec<Vec<f64>>,
    pub mean_curve: Vec<f64>,
    pub roc: f64,
}

/// Method name -> evaluation outcome.
pub type BenchmarkResult = HashMap<String, EvalOutcome>;

/// Example indices sorted by descending self-influence score. The sort is
/// stable, so exact score ties keep ascending original-index order.
pub fn rank_by_influence(scores: &[f64]) -> Vec<usize> {
    scores
        .iter()
        .enumerate()
        .sorted_by_key(|(_, s)| Reverse(OrderedFloat(**s)))
        .map(|(i, _)| i)
        .collect()
}

fn build_outcome(curves: &[Vec<f64>]) -> EvalOutcome {
    let mean = mean_curve(curves);
    let roc = compute_roc(&mean);
    EvalOutcome {
        curves: curves.to_vec(),
        mean_curve: mean,
        roc,
    }
}

/// Benchmarking pipeline for influence calculators, scored by how fast
/// their most self-influential examples recover deliberately mislabeled
/// training samples.
///
/// Each trial corrupts the training labels, retrains through the given
/// procedure, scores every example's self-influence, and measures how
/// the descending-influence ranking accumulates the known-noisy indices.
pub struct MislabelingDetectorEvaluator<'a, P> {
    training_dataset: &'a LabeledDataset,
    test_dataset: &'a LabeledDataset,
    training_procedure: P,
    config: EvaluatorConfig,
}

impl<'a, P: TrainingProcedure> MislabelingDetectorEvaluator<'a, P> {
    pub fn new(
        training_dataset: &'a LabeledDataset,
        test_dataset: &'a LabeledDataset,
        training_procedure: P,
        config: EvaluatorConfig,
    ) -> Self {
        Self {
            training_dataset,
            test_dataset,
            training_procedure,
            config,
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Run the whole benchmark: every factory in caller order, each for
    /// `nbr_of_evaluation` seeded trials. Fails fast on the first method
    /// whose evaluation errors.
    pub fn bench(
        &self,
        factories: &[(
            String,
            Box<dyn InfluenceCalculatorFactory<P::Model, P::Artifacts>>,
        )],
        nbr_of_evaluation: usize,
        path_to_save: &Path,
        seed: u64,
        verbose: bool,
        use_live_metrics: bool,
    ) -> Result<BenchmarkResult> {
        let mut result = BenchmarkResult::new();
        for (name, factory) in factories {
            if verbose {
                println!("[INFO] starting to evaluate {}", name);
            }
            let outcome = self.evaluate(
                factory.as_ref(),
                nbr_of_evaluation,
                seed,
                verbose,
                Some(path_to_save),
                use_live_metrics,
                Some(name.as_str()),
            )?;
            if verbose {
                println!("[INFO] {} | mean roc={}", name, outcome.roc);
            }
            result.insert(name.clone(), outcome);
        }

        if verbose {
            let mut table = Table::new();
            table.set_header(vec!["method", "mean roc"]);
            for (name, _) in factories {
                if let Some(outcome) = result.get(name) {
                    table.add_row(vec![name.clone(), format!("{:.4}", outcome.roc)]);
                }
            }
            println!("{table}");
        }

        Ok(result)
    }

    /// Evaluate one influence-calculator factory over `nbr_of_evaluation`
    /// independent trials, trial k seeded with `seed + k`.
    pub fn evaluate(
        &self,
        influence_factory: &dyn InfluenceCalculatorFactory<P::Model, P::Artifacts>,
        nbr_of_evaluation: usize,
        seed: u64,
        verbose: bool,
        path_to_save: Option<&Path>,
        use_live_metrics: bool,
        method_name: Option<&str>,
    ) -> Result<EvalOutcome> {
        let method_name = method_name.unwrap_or("experiment");
        // live metrics with no save path land in the working directory
        let path_to_save = if use_live_metrics && path_to_save.is_none() {
            Some(Path::new("."))
        } else {
            path_to_save
        };

        let method_dir: Option<PathBuf> = match path_to_save {
            Some(root) => {
                let dir = root.join(method_name);
                fs::create_dir_all(&dir)
                    .with_context(|| format!("creating result dir {}", dir.display()))?;
                fs::write(
                    dir.join("config.json"),
                    serde_json::to_string_pretty(&self.config)?,
                )?;
                Some(dir)
            }
            None => None,
        };

        let pb = if verbose {
            let pb = ProgressBar::new(nbr_of_evaluation as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                    .unwrap()
                    .progress_chars("##-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut curves: Vec<Vec<f64>> = Vec::new();

        for index in 0..nbr_of_evaluation {
            // every trial owns a fresh generator so that seed + index alone
            // reproduces its noise mask, labels and shuffle
            let mut rng = StdRng::seed_from_u64(seed + index as u64);

            let (noisy_dataset, noisy_indexes) = build_noisy_training_dataset(
                self.training_dataset,
                self.config.mislabeling_ratio,
                &mut rng,
            )?;

            let log_path = method_dir.as_ref().map(|d| d.join(format!("seed{}", index)));
            let out = self.training_procedure.train(
                &noisy_dataset,
                self.test_dataset,
                self.config.train_batch_size,
                self.config.test_batch_size,
                log_path.as_deref(),
            )?;

            let influence_view =
                noisy_dataset.shuffled_batched(self.config.scoring_batch_size(), &mut rng);
            let calculator = influence_factory.build(&influence_view, &out.model, &out.artifacts)?;

            let scores =
                calculator.self_influence(&noisy_dataset.batched(self.config.scoring_batch_size()))?;
            ensure!(
                scores.len() == noisy_dataset.len(),
                "calculator returned {} scores for {} examples",
                scores.len(),
                noisy_dataset.len()
            );

            let ranking = rank_by_influence(&scores);
            let curve = compute_curve(&ranking, &noisy_indexes);
            let roc = compute_roc(&curve);

            if verbose {
                pb.println(format!(
                    "[INFO] seed nbr={} | acc train={} | acc test={} | roc={}",
                    index, out.train_accuracy, out.test_accuracy, roc
                ));
            }

            if use_live_metrics {
                if let Some(dir) = &method_dir {
                    let mut sink = JsonlSink::create(
                        &dir.join(format!("seed{}", index)).join("metrics.jsonl"),
                    )?;
                    sink.scalar("roc_value", roc, index)?;
                    log_curve(&mut sink, "roc_curve", &curve)?;
                }
            }

            curves.push(curve);

            if let Some(dir) = &method_dir {
                // rewritten after every trial so partial progress survives a crash
                let partial = build_outcome(&curves);
                fs::write(dir.join("data.json"), serde_json::to_string_pretty(&partial)?)?;
            }

            pb.inc(1);
        }
        pb.finish_and_clear();

        let outcome = build_outcome(&curves);

        if use_live_metrics {
            if let Some(root) = path_to_save {
                let mut sink = JsonlSink::create(
                    &root.join("synthesis").join(method_name).join("metrics.jsonl"),
                )?;
                sink.scalar("roc_mean", outcome.roc, 0)?;
                sink.scalar("roc_mean", outcome.roc, 1)?;
                log_curve(&mut sink, "roc_curve_mean", &outcome.mean_curve)?;
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_is_descending() {
        let scores = vec![0.1, 0.9, 0.5, 0.7];
        assert_eq!(rank_by_influence(&scores), vec![1, 3, 2, 0]);
    }

    #[test]
    fn ranking_breaks_ties_by_original_index() {
        let scores = vec![0.5, 0.9, 0.5, 0.5];
        assert_eq!(rank_by_influence(&scores), vec![1, 0, 2, 3]);
    }

    #[test]
    fn outcome_roc_matches_mean_curve() {
        let curves = vec![vec![0.0, 0.5, 1.0], vec![0.5, 1.0, 1.0]];
        let outcome = build_outcome(&curves);
        assert_eq!(outcome.mean_curve, vec![0.25, 0.75, 1.0]);
        assert!((outcome.roc - (0.25 + 0.75 + 1.0) / 3.0).abs() < 1e-12);
        assert_eq!(outcome.curves.len(), 2);
    }
}
