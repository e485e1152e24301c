use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::dataset::LabeledDataset;

/// Everything a training run hands back to the pipeline.
pub struct TrainOutput<M, A> {
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub model: M,
    pub artifacts: A,
}

/// How a model is trained on a (possibly noisy) dataset. Implementations
/// must tolerate `log_path = None` by skipping persistence, and should be
/// deterministic for identical inputs so benchmark trials reproduce.
pub trait TrainingProcedure {
    type Model;
    type Artifacts;

    fn train(
        &self,
        training_dataset: &LabeledDataset,
        test_dataset: &LabeledDataset,
        train_batch_size: usize,
        test_batch_size: usize,
        log_path: Option<&Path>,
    ) -> Result<TrainOutput<Self::Model, Self::Artifacts>>;
}

/// Per-epoch metric record handed to observers and persisted as logs.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpochLogs {
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub test_accuracy: Option<f64>,
}

/// Training-time hook invoked synchronously once per completed epoch.
pub trait EpochObserver<M> {
    fn on_epoch_end(
        &mut self,
        epoch: usize,
        model: &M,
        learning_rate: f64,
        logs: &EpochLogs,
    ) -> Result<()>;
}

/// Captures model snapshots and optimizer learning rates at a chosen set
/// of epochs, for influence methods that need the training trajectory.
pub struct CheckpointRecorder<M> {
    epochs_to_save: HashSet<usize>,
    saving_path: Option<PathBuf>,
    epochs: Vec<usize>,
    models: Vec<M>,
    learning_rates: Vec<f64>,
}

impl<M> CheckpointRecorder<M> {
    pub fn new(
        epochs_to_save: impl IntoIterator<Item = usize>,
        saving_path: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(dir) = &saving_path {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating checkpoint dir {}", dir.display()))?;
        }
        Ok(Self {
            epochs_to_save: epochs_to_save.into_iter().collect(),
            saving_path,
            epochs: Vec::new(),
            models: Vec::new(),
            learning_rates: Vec::new(),
        })
    }

    /// Epoch indices at which snapshots were taken, in order.
    pub fn epochs(&self) -> &[usize] {
        &self.epochs
    }

    /// Recorded snapshots, in epoch order.
    pub fn models(&self) -> &[M] {
        &self.models
    }

    /// Learning rates captured alongside the snapshots.
    pub fn learning_rates(&self) -> &[f64] {
        &self.learning_rates
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl<M: Clone + Serialize> EpochObserver<M> for CheckpointRecorder<M> {
    fn on_epoch_end(
        &mut self,
        epoch: usize,
        model: &M,
        learning_rate: f64,
        logs: &EpochLogs,
    ) -> Result<()> {
        if !self.epochs_to_save.contains(&epoch) {
            return Ok(());
        }
        // deep, independent copy: training keeps mutating the live model
        let snapshot = model.clone();
        self.epochs.push(epoch);
        self.learning_rates.push(learning_rate);
        if let Some(dir) = &self.saving_path {
            let bytes = bincode::serialize(&snapshot)
                .with_context(|| format!("serializing checkpoint for epoch {}", epoch))?;
            fs::write(dir.join(format!("model_ep_{:06}.bin", epoch)), bytes)?;
            fs::write(
                dir.join("learning_rates.json"),
                serde_json::to_string_pretty(&self.learning_rates)?,
            )?;
            fs::write(dir.join("logs.json"), serde_json::to_string_pretty(logs)?)?;
        }
        self.models.push(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct FakeModel {
        weight: f64,
    }

    #[test]
    fn records_only_the_configured_epochs() {
        let mut recorder: CheckpointRecorder<FakeModel> =
            CheckpointRecorder::new([1, 3], None).unwrap();
        let logs = EpochLogs::default();
        for epoch in 0..5 {
            let model = FakeModel {
                weight: epoch as f64,
            };
            recorder.on_epoch_end(epoch, &model, 0.1, &logs).unwrap();
        }
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.epochs(), &[1, 3]);
        assert_eq!(recorder.models()[0].weight, 1.0);
        assert_eq!(recorder.models()[1].weight, 3.0);
        assert_eq!(recorder.learning_rates(), &[0.1, 0.1]);
    }

    #[test]
    fn snapshot_does_not_alias_the_live_model() {
        let mut recorder: CheckpointRecorder<FakeModel> =
            CheckpointRecorder::new([0], None).unwrap();
        let mut model = FakeModel { weight: 1.0 };
        recorder
            .on_epoch_end(0, &model, 0.5, &EpochLogs::default())
            .unwrap();
        model.weight = 99.0;
        assert_eq!(recorder.models()[0].weight, 1.0);
    }

    #[test]
    fn persists_checkpoint_files_at_the_epoch_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt");
        let mut recorder: CheckpointRecorder<FakeModel> =
            CheckpointRecorder::new([2], Some(path.clone())).unwrap();
        let logs = EpochLogs {
            train_loss: 0.3,
            train_accuracy: 0.9,
            test_accuracy: Some(0.8),
        };
        recorder
            .on_epoch_end(2, &FakeModel { weight: 2.5 }, 0.01, &logs)
            .unwrap();

        let bytes = fs::read(path.join("model_ep_000002.bin")).unwrap();
        let restored: FakeModel = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.weight, 2.5);

        let lrs: Vec<f64> =
            serde_json::from_str(&fs::read_to_string(path.join("learning_rates.json")).unwrap())
                .unwrap();
        assert_eq!(lrs, vec![0.01]);

        let saved_logs: EpochLogs =
            serde_json::from_str(&fs::read_to_string(path.join("logs.json")).unwrap()).unwrap();
        assert_eq!(saved_logs.test_accuracy, Some(0.8));
    }
}
