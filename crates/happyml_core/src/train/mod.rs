//! The training loop (spec §4.H): batch assembly, loss evaluation, step
//! invocation, and exit strategies. Model save/load is split out into
//! [`persist`] since it's graph-topology-agnostic; exit strategies live in
//! [`exit_strategy`].
//!
//! The graph (spec §4.G) runs one sample through forward/backward at a
//! time — there is no batched tensor path. A "batch" here means: forward
//! every sample in the batch, accumulate each output's elementwise error
//! for loss *reporting*, but fire one backward pass per sample with the
//! loss derivative pre-scaled by `1/batch_size` (spec §4.H: "averages over
//! B"). Repeated small steps summed across the batch approximate the
//! single large step a truly batched engine would take, and it's the only
//! shape that fits a graph with per-layer cached-input state. See
//! `DESIGN.md` for the record of this as a resolved Open Question.

pub mod exit_strategy;
pub mod loss;
pub mod persist;

pub use exit_strategy::{ExitStrategy, ExitTracker};

use crate::config::TrainingConfig;
use crate::dataset::Dataset;
use crate::error::{HappyMlError, Result};
use crate::graph::{Graph, NodeId};
use crate::optim::Optimizer;
use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy)]
pub struct TrainingReport {
    pub initial_loss: f32,
    pub final_loss: f32,
    pub epochs_run: usize,
}

/// Run one sample through every head, fan the results out, then read back
/// each output node's value. `heads[i]` receives `given[i]`; `outputs[k]`
/// is read after all heads have been forwarded (the graph's fan-out/fan-in
/// bookkeeping runs synchronously inside `forward_head`).
fn forward_sample(graph: &Graph, heads: &[NodeId], given: &[Tensor], outputs: &[NodeId], for_training: bool) -> Result<Vec<Tensor>> {
    if heads.len() != given.len() {
        return Err(HappyMlError::Configuration(format!(
            "graph declares {} head(s) but the row supplied {} given tensor(s)",
            heads.len(),
            given.len()
        )));
    }
    for (head, input) in heads.iter().zip(given) {
        graph.forward_head(*head, input.clone(), for_training)?;
    }
    outputs
        .iter()
        .map(|id| {
            graph
                .output_value(*id)
                .ok_or_else(|| HappyMlError::Configuration(format!("output node {id:?} produced no value")))
        })
        .collect()
}

/// Average loss over every row of `dataset`, forward-only (no gradient
/// retention) — the evaluation pass the training loop uses for `test_loss`
/// and the final report.
pub fn evaluate(graph: &Graph, heads: &[NodeId], outputs: &[NodeId], dataset: &mut Dataset, config: &TrainingConfig) -> Result<f32> {
    dataset.reset_cursor();
    let mut total = 0.0f32;
    let mut rows = 0usize;
    while let Some((given, expected)) = dataset.next_record()? {
        let predictions = forward_sample(graph, heads, &given, outputs, false)?;
        let mut row_loss = 0.0f32;
        for (exp, pred) in expected.iter().zip(&predictions) {
            let err = config.loss.calc_err(exp, pred)?;
            row_loss += config.loss.batch_loss(&err, 1);
        }
        total += row_loss / outputs.len().max(1) as f32;
        rows += 1;
    }
    Ok(if rows == 0 { 0.0 } else { total / rows as f32 })
}

/// Run training to completion per `config`'s batch size and `exit`'s
/// stopping policy (spec §4.H). `heads`/`outputs` give the node order that
/// `given`/`expected` tensors from the dataset line up with.
pub fn train(
    graph: &mut Graph,
    heads: &[NodeId],
    outputs: &[NodeId],
    dataset: &mut Dataset,
    mut test_dataset: Option<&mut Dataset>,
    config: &TrainingConfig,
    optimizer: &mut dyn Optimizer,
    exit: &ExitStrategy,
    shuffle_seed: u64,
) -> Result<TrainingReport> {
    if dataset.is_empty() {
        return Err(HappyMlError::EmptyDataset);
    }

    dataset.shuffle(shuffle_seed);

    let initial_loss = evaluate(graph, heads, outputs, dataset, config)?;
    let mut final_loss = initial_loss;
    let mut tracker = ExitTracker::new();
    let max_epochs = exit.max_epochs();
    let mut epochs_run = 0;

    'epochs: for epoch in 0..max_epochs {
        dataset.reset_cursor();
        let mut epoch_loss_sum = 0.0f32;
        let mut epoch_batches = 0usize;

        loop {
            let mut batch: Vec<(Vec<Tensor>, Vec<Tensor>)> = Vec::with_capacity(config.batch_size.max(1));
            while batch.len() < config.batch_size.max(1) {
                match dataset.next_record()? {
                    Some(record) => batch.push(record),
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }
            let batch_size = batch.len();

            let mut total_errors: Vec<Option<Tensor>> = vec![None; outputs.len()];

            for (given, expected) in &batch {
                let predictions = forward_sample(graph, heads, given, outputs, true)?;
                for (k, (exp, pred)) in expected.iter().zip(&predictions).enumerate() {
                    let err = config.loss.calc_err(exp, pred)?;
                    total_errors[k] = Some(match total_errors[k].take() {
                        None => err,
                        Some(acc) => acc.add(&err)?.materialize(),
                    });
                    // Fire this sample's backward pass immediately, while its
                    // activations are still the ones cached by the forward
                    // pass just above — the next sample's forward would
                    // otherwise overwrite them before backward ever sees them.
                    let d_error = config.loss.derivative(exp, pred, batch_size)?;
                    graph.backward_output(outputs[k], &d_error, optimizer, config.learning_rate)?;
                }
            }

            let mut batch_loss_sum = 0.0f32;
            for total_error in total_errors.into_iter() {
                let total_error = total_error.expect("every output accumulates at least one sample's error");
                batch_loss_sum += config.loss.batch_loss(&total_error, batch_size);
            }

            epoch_loss_sum += batch_loss_sum / outputs.len().max(1) as f32;
            epoch_batches += 1;
        }

        let epoch_loss = if epoch_batches == 0 { 0.0 } else { epoch_loss_sum / epoch_batches as f32 };
        final_loss = epoch_loss;
        epochs_run = epoch + 1;

        let test_loss = match test_dataset.as_deref_mut() {
            Some(test) => Some(evaluate(graph, heads, outputs, test, config)?),
            None => None,
        };

        if tracker.should_stop(exit, epoch, epoch_loss, test_loss) {
            break 'epochs;
        }
    }

    Ok(TrainingReport {
        initial_loss,
        final_loss,
        epochs_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LossKind, OptimizerKind};
    use crate::dataset::column::{ColumnMetadata, Purpose};
    use crate::dataset::writer::DatasetWriter;
    use crate::layers::{Activation, ActivationKind, Bias, Bits, FullyConnected};
    use crate::optim::Sgd;
    use crate::tensor::Shape;
    use std::fs::File;
    use tempfile::NamedTempFile;

    fn xor_dataset(path: &std::path::Path) {
        let given_meta = vec![ColumnMetadata::new("xy", Purpose::Number, 1, 2, 1)];
        let expected_meta = vec![ColumnMetadata::new("out", Purpose::Number, 1, 1, 1)];
        let file = File::create(path).unwrap();
        let mut writer = DatasetWriter::new(file, given_meta, expected_meta).unwrap();
        let rows = [
            ([0.0, 0.0], [0.0]),
            ([0.0, 1.0], [1.0]),
            ([1.0, 0.0], [1.0]),
            ([1.0, 1.0], [0.0]),
        ];
        for (x, y) in rows {
            let given = vec![Tensor::full32(Shape::new(1, 2, 1), x.to_vec())];
            let expected = vec![Tensor::full32(Shape::new(1, 1, 1), y.to_vec())];
            writer.write_row(&given, &expected).unwrap();
        }
    }

    #[test]
    fn xor_training_reduces_loss() {
        let tmp = NamedTempFile::new().unwrap();
        xor_dataset(tmp.path());
        let mut dataset = Dataset::open(tmp.path()).unwrap();

        let mut graph = Graph::new();
        let fc1 = graph.add_node(Box::new(FullyConnected::new("fc1", 2, 3, Bits::Full32)));
        let bias1 = graph.add_node(Box::new(Bias::new("fc1_bias", 3, Bits::Full32)));
        let act1 = graph.add_node(Box::new(Activation::new("act1", ActivationKind::Tanh, Shape::new(1, 3, 1))));
        let fc2 = graph.add_node(Box::new(FullyConnected::new("fc2", 3, 1, Bits::Full32)));
        let bias2 = graph.add_node(Box::new(Bias::new("fc2_bias", 1, Bits::Full32)));
        let act2 = graph.add_node(Box::new(Activation::new("act2", ActivationKind::Tanh, Shape::new(1, 1, 1))));
        graph.connect(fc1, bias1).unwrap();
        graph.connect(bias1, act1).unwrap();
        graph.connect(act1, fc2).unwrap();
        graph.connect(fc2, bias2).unwrap();
        graph.connect(bias2, act2).unwrap();
        graph.assert_acyclic().unwrap();

        // Seed weights away from the identically-zero saddle point.
        let mut seeded = std::collections::HashMap::new();
        for (i, (label, tensor)) in graph.collect_parameters().into_iter().enumerate() {
            let random = Tensor::random(tensor.shape(), i as u64 + 1).scale(0.5).materialize();
            seeded.insert(label, random);
        }
        graph.load_parameters(&seeded).unwrap();

        let config = TrainingConfig {
            optimizer: OptimizerKind::Sgd,
            learning_rate: 0.5,
            bias_learning_rate: 0.5,
            loss: LossKind::MeanSquaredError,
            batch_size: 1,
        };
        let mut optimizer = Sgd;
        let exit = ExitStrategy::FixedEpochs { epochs: 500 };

        let report = train(
            &mut graph,
            &[fc1],
            &[act2],
            &mut dataset,
            None,
            &config,
            &mut optimizer,
            &exit,
            42,
        )
        .unwrap();

        assert!(report.final_loss < report.initial_loss);
    }

    #[test]
    fn train_rejects_an_empty_dataset() {
        let tmp = NamedTempFile::new().unwrap();
        let given_meta = vec![ColumnMetadata::new("x", Purpose::Number, 1, 1, 1)];
        let expected_meta = vec![ColumnMetadata::new("y", Purpose::Number, 1, 1, 1)];
        DatasetWriter::new(File::create(tmp.path()).unwrap(), given_meta, expected_meta).unwrap();

        let mut dataset = Dataset::open(tmp.path()).unwrap();
        let mut graph = Graph::new();
        let fc = graph.add_node(Box::new(FullyConnected::new("fc", 1, 1, Bits::Full32)));
        let config = TrainingConfig::default();
        let mut optimizer = Sgd;
        let exit = ExitStrategy::FixedEpochs { epochs: 1 };

        let result = train(&mut graph, &[fc], &[fc], &mut dataset, None, &config, &mut optimizer, &exit, 0);
        assert!(matches!(result, Err(HappyMlError::EmptyDataset)));
    }
}
