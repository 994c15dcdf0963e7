//! End-to-end node classification run.

use crate::core::{Result, SplitRole};
use crate::dataset::{ClassMapping, Graph, GraphBuilder, RecordSource};
use crate::evaluation::{predict, ClassificationMetrics};
use crate::gnn::NodeClassifier;
use crate::loader::RandomNodeLoader;
use crate::monitoring::{EvaluationReport, Reporter};
use crate::pipeline::config::RunConfig;
use crate::training::{
    Adadelta, CheckpointStore, Trainer, TrainingHistory, WeightedCrossEntropy,
};
use tracing::{info, info_span};
use uuid::Uuid;

/// Result of a run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Run id attached to every log line of the run
    pub run_id: Uuid,
    /// Model used for evaluation
    pub model: NodeClassifier,
    /// `None` when the model was restored from a checkpoint
    pub history: Option<TrainingHistory>,
    pub resumed: bool,
    pub report: EvaluationReport,
}

/// Build the splits, train or resume, evaluate on the test split and hand
/// the result to every reporter.
pub fn run_node_classification(
    config: &RunConfig,
    source: &dyn RecordSource,
    reporters: &[&dyn Reporter],
) -> Result<RunOutcome> {
    config.validate()?;
    let run_id = Uuid::new_v4();
    let model_name = config.model_name();
    let span = info_span!("run", %run_id, model = %model_name);
    let _guard = span.enter();

    let mapping = ClassMapping::unsw_nb15(config.label_mode);
    let num_classes = mapping.num_classes();
    let mut builder = GraphBuilder::new(mapping.clone(), config.builder_config());
    let train_graph = builder.build(
        &source.load(SplitRole::Train)?,
        SplitRole::Train,
        config.neighbors,
        config.augmentation,
    )?;
    let val_graph = builder.build(
        &source.load(SplitRole::Val)?,
        SplitRole::Val,
        config.neighbors,
        false,
    )?;
    let test_graph = builder.build(
        &source.load(SplitRole::Test)?,
        SplitRole::Test,
        config.neighbors,
        false,
    )?;

    info!(
        features = train_graph.feature_width(),
        classes = num_classes,
        label_mode = ?config.label_mode,
        "Dataset ready"
    );
    info!(train = %train_graph, val = %val_graph, test = %test_graph, "Split graphs");

    let mut train_loader = partition(train_graph, SplitRole::Train, config)?;
    let mut val_loader = partition(val_graph, SplitRole::Val, config)?;
    let mut test_loader = partition(test_graph, SplitRole::Test, config)?;

    let model_config = config.model_config(train_loader.graph().feature_width(), num_classes);
    let mut model = NodeClassifier::seeded(model_config, config.seed)?;
    info!(
        convs = config.num_convs,
        hidden = config.hidden,
        parameters = model.params().num_parameters(),
        "{}",
        model
    );

    let store = CheckpointStore::new(&config.checkpoint_dir);
    let (model, history, resumed) = if store.exists(&model_name) {
        let meta = store.restore(&model_name, &mut model)?;
        info!(
            epoch = meta.epoch,
            val_loss = meta.val_loss,
            saved_at = %meta.saved_at,
            "Checkpoint found, skipping training"
        );
        (model, None, true)
    } else {
        let train_loss = WeightedCrossEntropy::balanced(&train_loader.graph().labels, num_classes);
        let val_loss = WeightedCrossEntropy::balanced(&val_loader.graph().labels, num_classes);
        info!(train = ?train_loss.weights(), val = ?val_loss.weights(), "Class weights");

        let mut optimizer = Adadelta::new(config.optimizer.clone());
        let trainer = Trainer::new(config.trainer_config(), store);
        let trained = trainer.train(
            model,
            &mut train_loader,
            &train_loss,
            &val_loss,
            &mut optimizer,
            Some(&mut val_loader),
            &model_name,
        )?;
        (trained.model, Some(trained.history), false)
    };

    let (y_true, y_pred) = predict(&model, &mut test_loader)?;
    let metrics = ClassificationMetrics::compute(&y_true, &y_pred, num_classes)?;
    info!(
        accuracy = metrics.accuracy,
        balanced_accuracy = metrics.balanced_accuracy,
        "Test evaluation"
    );

    let report = EvaluationReport::new(
        &config.report_name(),
        mapping.names().to_vec(),
        y_true,
        y_pred,
        metrics,
    );
    for reporter in reporters {
        reporter.report(&report)?;
    }

    Ok(RunOutcome {
        run_id,
        model,
        history,
        resumed,
        report,
    })
}

fn partition(graph: Graph, role: SplitRole, config: &RunConfig) -> Result<RandomNodeLoader> {
    RandomNodeLoader::new(graph, config.num_parts, true, config.seed ^ role.seed_salt())
}
