//! Epoch loop with validation, early stopping and checkpointing.

use crate::core::{Error, Result};
use crate::gnn::{ModelParams, NodeClassifier};
use crate::loader::RandomNodeLoader;
use crate::training::checkpoint::CheckpointStore;
use crate::training::early_stop::{EarlyStopping, StopState};
use crate::training::loss::LossFunction;
use crate::training::optimizer::Optimizer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Training loop configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Epoch budget
    pub max_epochs: usize,
    /// Consecutive non-improving epochs before stopping
    pub patience: usize,
    /// Run a validation pass each epoch (otherwise the train loss is monitored)
    pub evaluation: bool,
    /// Seed for dropout masks
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_epochs: 1000,
            patience: 20,
            evaluation: true,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Set the epoch budget.
    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    /// Set patience.
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Enable or disable the validation pass.
    pub fn with_evaluation(mut self, evaluation: bool) -> Self {
        self.evaluation = evaluation;
        self
    }

    /// Set the dropout seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_epochs == 0 {
            return Err(Error::InvalidConfig("max_epochs must be at least 1".to_string()));
        }
        if self.patience == 0 {
            return Err(Error::InvalidConfig("patience must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Why the loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EarlyStopped,
    MaxEpochs,
}

/// One epoch's outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f32,
    pub val_loss: Option<f32>,
    pub improved: bool,
}

/// Summary of a training run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
    /// Epoch whose parameters were checkpointed last
    pub best_epoch: usize,
    pub best_loss: f32,
    pub stop_reason: StopReason,
}

/// A model together with the history that produced it.
#[derive(Clone, Debug)]
pub struct TrainedModel {
    pub model: NodeClassifier,
    pub history: TrainingHistory,
}

/// Runs the epoch loop and persists the best model under a name.
pub struct Trainer {
    config: TrainerConfig,
    store: CheckpointStore,
}

impl Trainer {
    /// Create a trainer writing checkpoints into `store`.
    pub fn new(config: TrainerConfig, store: CheckpointStore) -> Self {
        Self { config, store }
    }

    /// Configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Checkpoint store.
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Train `model` and return it carrying the best observed parameters.
    ///
    /// Each improvement of the monitored loss (validation loss, or the mean
    /// training loss when no validation pass runs) is checkpointed under
    /// `model_name` before the next epoch starts.
    #[allow(clippy::too_many_arguments)]
    pub fn train(
        &self,
        mut model: NodeClassifier,
        train_loader: &mut RandomNodeLoader,
        train_loss: &dyn LossFunction,
        val_loss: &dyn LossFunction,
        optimizer: &mut dyn Optimizer,
        mut val_loader: Option<&mut RandomNodeLoader>,
        model_name: &str,
    ) -> Result<TrainedModel> {
        self.config.validate()?;
        if self.config.evaluation && val_loader.is_none() {
            return Err(Error::InvalidConfig(
                "evaluation is enabled but no validation loader was given".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut stopper = EarlyStopping::new(self.config.patience);
        let mut epochs = Vec::new();
        let mut best_epoch = 0;
        let mut best_params: Option<ModelParams> = None;
        let mut stop_reason = StopReason::MaxEpochs;

        info!(
            model = model_name,
            optimizer = optimizer.name(),
            parameters = model.params().num_parameters(),
            partitions = train_loader.effective_parts(),
            max_epochs = self.config.max_epochs,
            patience = self.config.patience,
            "Starting training"
        );

        for epoch in 1..=self.config.max_epochs {
            let train = Self::train_epoch(
                &mut model,
                train_loader,
                train_loss,
                optimizer,
                &mut rng,
                epoch,
            )?;
            let val = match val_loader.as_deref_mut() {
                Some(loader) if self.config.evaluation => {
                    Some(Self::validation_loss(&model, loader, val_loss, epoch)?)
                }
                _ => None,
            };

            let monitored = val.unwrap_or(train);
            let state = stopper.observe(monitored);
            let improved = state == StopState::Improving;
            if improved {
                self.store.save(model_name, &model, epoch, monitored)?;
                best_epoch = epoch;
                best_params = Some(model.params().clone());
            }

            info!(
                target: "training",
                epoch,
                train_loss = train,
                val_loss = ?val,
                improved,
                stalled = stopper.stalled_epochs(),
                "Epoch {}/{}",
                epoch,
                self.config.max_epochs
            );
            epochs.push(EpochRecord {
                epoch,
                train_loss: train,
                val_loss: val,
                improved,
            });

            if state == StopState::Stopped {
                stop_reason = StopReason::EarlyStopped;
                break;
            }
        }
        stopper.stop();

        if let Some(params) = best_params {
            model.load_params(params)?;
        }

        info!(
            model = model_name,
            best_epoch,
            best_loss = stopper.best(),
            epochs = epochs.len(),
            reason = ?stop_reason,
            "Training finished"
        );

        Ok(TrainedModel {
            model,
            history: TrainingHistory {
                epochs,
                best_epoch,
                best_loss: stopper.best(),
                stop_reason,
            },
        })
    }

    /// One optimizer step per partition; returns the mean partition loss.
    fn train_epoch(
        model: &mut NodeClassifier,
        loader: &mut RandomNodeLoader,
        loss_fn: &dyn LossFunction,
        optimizer: &mut dyn Optimizer,
        rng: &mut StdRng,
        epoch: usize,
    ) -> Result<f32> {
        let mut total = 0.0f32;
        let mut batches = 0usize;

        for batch in loader.iter() {
            let batch = batch?;
            let (logits, cache) = model.forward_train(&batch.graph, rng)?;
            let out = loss_fn.loss_and_grad(&logits, &batch.graph.labels)?;
            if !out.value.is_finite() {
                return Err(Error::DivergedTraining {
                    epoch,
                    loss: out.value,
                });
            }

            let grads = model.backward(&cache, &out.grad);
            if !grads.is_finite() {
                return Err(Error::DivergedTraining {
                    epoch,
                    loss: out.value,
                });
            }
            optimizer.step(model.params_mut(), &grads)?;

            total += out.value;
            batches += 1;
        }

        if batches == 0 {
            return Err(Error::EmptyDataset(
                "training loader yielded no partitions".to_string(),
            ));
        }
        debug!(epoch, batches, "Training pass done");
        Ok(total / batches as f32)
    }

    /// Mean partition loss in inference mode.
    fn validation_loss(
        model: &NodeClassifier,
        loader: &mut RandomNodeLoader,
        loss_fn: &dyn LossFunction,
        epoch: usize,
    ) -> Result<f32> {
        let mut total = 0.0f32;
        let mut batches = 0usize;
        for batch in loader.iter() {
            let batch = batch?;
            let logits = model.forward(&batch.graph)?;
            total += loss_fn.loss(&logits, &batch.graph.labels)?;
            batches += 1;
        }
        if batches == 0 {
            return Err(Error::EmptyDataset(
                "validation loader yielded no partitions".to_string(),
            ));
        }

        let mean = total / batches as f32;
        if !mean.is_finite() {
            return Err(Error::DivergedTraining { epoch, loss: mean });
        }
        Ok(mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Graph;
    use crate::gnn::ModelConfig;
    use crate::training::loss::{LossOutput, WeightedCrossEntropy};
    use crate::training::optimizer::Sgd;
    use ndarray::Array2;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Returns a fixed sequence of loss values, one per call.
    struct ScriptedLoss {
        values: Mutex<VecDeque<f32>>,
    }

    impl ScriptedLoss {
        fn new(values: &[f32]) -> Self {
            Self {
                values: Mutex::new(values.iter().copied().collect()),
            }
        }

        fn next(&self) -> f32 {
            self.values.lock().unwrap().pop_front().unwrap_or(f32::INFINITY)
        }
    }

    impl LossFunction for ScriptedLoss {
        fn loss(&self, _logits: &Array2<f32>, _labels: &[usize]) -> Result<f32> {
            Ok(self.next())
        }

        fn loss_and_grad(&self, logits: &Array2<f32>, _labels: &[usize]) -> Result<LossOutput> {
            Ok(LossOutput {
                value: self.next(),
                grad: Array2::zeros(logits.raw_dim()),
            })
        }
    }

    fn create_graph() -> Graph {
        let n = 8;
        let features = Array2::from_shape_fn((n, 2), |(i, j)| if i % 2 == j { 1.0 } else { 0.1 });
        let labels = (0..n).map(|i| i % 2).collect();
        let edges = (0..n).map(|i| (i, (i + 2) % n)).collect();
        Graph::new(features, labels, edges, 2).unwrap()
    }

    fn create_model() -> NodeClassifier {
        NodeClassifier::seeded(ModelConfig::new(2, 2, 1, 8).with_dropout(0.0), 11).unwrap()
    }

    fn temp_store() -> (TempDir, CheckpointStore) {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainerConfig::default().validate().is_ok());
        assert!(TrainerConfig::default().with_max_epochs(0).validate().is_err());
        assert!(TrainerConfig::default().with_patience(0).validate().is_err());
    }

    #[test]
    fn test_early_stop_keeps_best_checkpoint() {
        let (_dir, store) = temp_store();
        let trainer = Trainer::new(
            TrainerConfig::default().with_max_epochs(5).with_patience(2),
            store.clone(),
        );
        let mut train_loader = RandomNodeLoader::new(create_graph(), 1, true, 0).unwrap();
        let mut val_loader = RandomNodeLoader::new(create_graph(), 1, false, 0).unwrap();
        let val_loss = ScriptedLoss::new(&[1.0, 0.9, 0.95, 0.96, 0.97]);
        let mut optimizer = Sgd::new(0.05);

        let trained = trainer
            .train(
                create_model(),
                &mut train_loader,
                &WeightedCrossEntropy::unweighted(2),
                &val_loss,
                &mut optimizer,
                Some(&mut val_loader),
                "scripted",
            )
            .unwrap();

        let history = &trained.history;
        assert_eq!(history.epochs.len(), 4);
        assert_eq!(history.stop_reason, StopReason::EarlyStopped);
        assert_eq!(history.best_epoch, 2);
        assert!((history.best_loss - 0.9).abs() < 1e-6);
        let improved: Vec<bool> = history.epochs.iter().map(|e| e.improved).collect();
        assert_eq!(improved, vec![true, true, false, false]);

        let (meta, params) = store.load("scripted").unwrap();
        assert_eq!(meta.epoch, 2);
        assert!((meta.val_loss - 0.9).abs() < 1e-6);
        assert_eq!(trained.model.params(), &params);
    }

    #[test]
    fn test_training_reduces_loss() {
        let (_dir, store) = temp_store();
        let trainer = Trainer::new(
            TrainerConfig::default()
                .with_max_epochs(40)
                .with_patience(100)
                .with_evaluation(false),
            store.clone(),
        );
        let mut loader = RandomNodeLoader::new(create_graph(), 1, false, 0).unwrap();
        let loss = WeightedCrossEntropy::unweighted(2);
        let mut optimizer = Sgd::new(0.1);

        let trained = trainer
            .train(
                create_model(),
                &mut loader,
                &loss,
                &loss,
                &mut optimizer,
                None,
                "learns",
            )
            .unwrap();

        let history = &trained.history;
        assert_eq!(history.epochs.len(), 40);
        assert_eq!(history.stop_reason, StopReason::MaxEpochs);
        assert!(history.epochs.iter().all(|e| e.val_loss.is_none()));
        let first = history.epochs[0].train_loss;
        assert!(history.best_loss < first);
        assert!(store.exists("learns"));
    }

    #[test]
    fn test_non_finite_loss_diverges() {
        let (_dir, store) = temp_store();
        let trainer = Trainer::new(
            TrainerConfig::default()
                .with_max_epochs(3)
                .with_evaluation(false),
            store.clone(),
        );
        let mut loader = RandomNodeLoader::new(create_graph(), 2, true, 0).unwrap();
        let train_loss = ScriptedLoss::new(&[f32::NAN]);
        let mut optimizer = Sgd::new(0.1);

        let err = trainer
            .train(
                create_model(),
                &mut loader,
                &train_loss,
                &WeightedCrossEntropy::unweighted(2),
                &mut optimizer,
                None,
                "diverged",
            )
            .unwrap_err();

        assert!(matches!(err, Error::DivergedTraining { epoch: 1, .. }));
        assert!(!store.exists("diverged"));
    }

    #[test]
    fn test_non_finite_validation_loss_diverges() {
        let (_dir, store) = temp_store();
        let trainer = Trainer::new(TrainerConfig::default().with_max_epochs(3), store.clone());
        let mut train_loader = RandomNodeLoader::new(create_graph(), 1, true, 0).unwrap();
        let mut val_loader = RandomNodeLoader::new(create_graph(), 1, false, 0).unwrap();
        let val_loss = ScriptedLoss::new(&[f32::NAN]);
        let mut optimizer = Sgd::new(0.05);

        let err = trainer
            .train(
                create_model(),
                &mut train_loader,
                &WeightedCrossEntropy::unweighted(2),
                &val_loss,
                &mut optimizer,
                Some(&mut val_loader),
                "val-nan",
            )
            .unwrap_err();

        assert!(matches!(err, Error::DivergedTraining { epoch: 1, .. }));
        assert!(!store.exists("val-nan"));
    }

    #[test]
    fn test_evaluation_requires_validation_loader() {
        let (_dir, store) = temp_store();
        let trainer = Trainer::new(TrainerConfig::default().with_max_epochs(3), store.clone());
        let mut loader = RandomNodeLoader::new(create_graph(), 1, true, 0).unwrap();
        let loss = WeightedCrossEntropy::unweighted(2);
        let mut optimizer = Sgd::new(0.05);

        let err = trainer
            .train(
                create_model(),
                &mut loader,
                &loss,
                &loss,
                &mut optimizer,
                None,
                "no-val",
            )
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(!store.exists("no-val"));
    }

    #[test]
    fn test_checkpoint_write_failure_aborts() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let store = CheckpointStore::new(blocker.join("checkpoints"));
        let trainer = Trainer::new(TrainerConfig::default().with_max_epochs(5), store.clone());
        let mut train_loader = RandomNodeLoader::new(create_graph(), 1, true, 0).unwrap();
        let mut val_loader = RandomNodeLoader::new(create_graph(), 1, false, 0).unwrap();
        let loss = WeightedCrossEntropy::unweighted(2);
        let val_loss = ScriptedLoss::new(&[1.0, 0.5, 0.25]);
        let mut optimizer = Sgd::new(0.05);

        let err = trainer
            .train(
                create_model(),
                &mut train_loader,
                &loss,
                &val_loss,
                &mut optimizer,
                Some(&mut val_loader),
                "blocked",
            )
            .unwrap_err();

        assert!(matches!(err, Error::CheckpointIo(_)));
        assert!(!store.exists("blocked"));
        // the first epoch's save failed, so no later validation pass ran
        assert_eq!(val_loss.values.lock().unwrap().len(), 2);
    }
}
