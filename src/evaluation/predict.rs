//! Inference over a partition loader.

use crate::core::Result;
use crate::gnn::NodeClassifier;
use crate::loader::RandomNodeLoader;
use ndarray::Array2;

/// Index of the largest logit in each row. Ties resolve to the lower class.
pub fn argmax_rows(logits: &Array2<f32>) -> Vec<usize> {
    logits
        .outer_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, max), (j, &v)| {
                    if v > max {
                        (j, v)
                    } else {
                        (best, max)
                    }
                })
                .0
        })
        .collect()
}

/// Run `model` over every partition in inference mode.
///
/// Returns `(true_labels, predicted_labels)` concatenated in traversal order.
pub fn predict(
    model: &NodeClassifier,
    loader: &mut RandomNodeLoader,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut y_true = Vec::with_capacity(loader.graph().num_nodes());
    let mut y_pred = Vec::with_capacity(loader.graph().num_nodes());
    for batch in loader.iter() {
        let batch = batch?;
        let logits = model.forward(&batch.graph)?;
        y_true.extend_from_slice(&batch.graph.labels);
        y_pred.extend(argmax_rows(&logits));
    }
    Ok((y_true, y_pred))
}
