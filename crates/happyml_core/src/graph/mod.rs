//! The network graph (spec §4.G): nodes wrap one layer each, connected by
//! weak back-edges (predecessors) and strong forward-edges (successors), so
//! the graph tears down head-to-output without leaking reference cycles.
//!
//! Forward fans a node's output out to every successor's input slot; a
//! successor only runs once every slot is filled. Backward fans a node's
//! incoming gradients in from every successor, summing and averaging by
//! fan-out once all have arrived, then recurses toward the heads. Both
//! passes are plain recursion rather than an explicit work queue, since the
//! engine runs one sample through the graph at a time (spec §5).

use crate::error::{HappyMlError, Result};
use crate::layers::Layer;
use crate::optim::Optimizer;
use crate::tensor::Tensor;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Default)]
struct NodeIdGen {
    next: usize,
}

impl NodeIdGen {
    fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

struct Node {
    id: NodeId,
    layer: Box<dyn Layer>,
    /// Predecessor and, for each, the slot index into *its own*
    /// `successors`/`pending_errors` that this edge occupies.
    predecessors: Vec<(Weak<RefCell<Node>>, usize)>,
    /// Successor and the slot index into *its* `predecessors`/`pending_inputs`
    /// that this edge fills.
    successors: Vec<(Rc<RefCell<Node>>, usize)>,
    pending_inputs: Vec<Option<Tensor>>,
    pending_errors: Vec<Option<Tensor>>,
    cached_output: Option<Tensor>,
}

/// Owns every node in the graph; nodes are addressed by the [`NodeId`]
/// handed back from [`Graph::add_node`].
#[derive(Default)]
pub struct Graph {
    nodes: Vec<Rc<RefCell<Node>>>,
    id_gen: NodeIdGen,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_node(&mut self, layer: Box<dyn Layer>) -> NodeId {
        let id = self.id_gen.next_id();
        self.nodes.push(Rc::new(RefCell::new(Node {
            id,
            layer,
            predecessors: Vec::new(),
            successors: Vec::new(),
            pending_inputs: Vec::new(),
            pending_errors: Vec::new(),
            cached_output: None,
        })));
        id
    }

    fn node(&self, id: NodeId) -> Rc<RefCell<Node>> {
        Rc::clone(&self.nodes[id.0])
    }

    /// Connect `from -> to`, filling the next free input slot on `to`.
    /// Multiple calls with the same `to` fill successive slots, matching
    /// `to`'s layer's `input_shapes()` order (e.g. `ConcatenateWide`'s two
    /// inputs).
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        let from_rc = self.node(from);
        let to_rc = self.node(to);
        let slot = to_rc.borrow().predecessors.len();
        let succ_idx = from_rc.borrow().successors.len();
        to_rc.borrow_mut().predecessors.push((Rc::downgrade(&from_rc), succ_idx));
        to_rc.borrow_mut().pending_inputs.push(None);
        from_rc.borrow_mut().successors.push((Rc::clone(&to_rc), slot));
        from_rc.borrow_mut().pending_errors.push(None);
        Ok(())
    }

    /// Asserts the graph is a DAG (spec §4.G "cycle policy"). Cycles are a
    /// programming error, not a runtime condition to recover from.
    pub fn assert_acyclic(&self) -> Result<()> {
        const UNVISITED: u8 = 0;
        const VISITING: u8 = 1;
        const DONE: u8 = 2;
        let mut state = vec![UNVISITED; self.nodes.len()];
        for idx in 0..self.nodes.len() {
            if state[idx] == UNVISITED {
                self.visit(idx, &mut state)?;
            }
        }
        Ok(())
    }

    fn visit(&self, idx: usize, state: &mut [u8]) -> Result<()> {
        state[idx] = 1;
        let successors = self.nodes[idx].borrow().successors.clone();
        for (succ_rc, _) in successors {
            let succ_idx = succ_rc.borrow().id.0;
            match state[succ_idx] {
                1 => return Err(HappyMlError::Configuration("network graph contains a cycle".into())),
                0 => self.visit(succ_idx, state)?,
                _ => {}
            }
        }
        state[idx] = 2;
        Ok(())
    }

    /// Run `input` through the head node `id` (a node with no predecessors)
    /// and fan the result out to its successors, recursively.
    pub fn forward_head(&self, id: NodeId, input: Tensor, for_training: bool) -> Result<()> {
        let node_rc = self.node(id);
        let output = {
            let mut node = node_rc.borrow_mut();
            let out = node.layer.forward(&[input], for_training)?.materialize();
            node.cached_output = Some(out.clone());
            out
        };
        propagate_forward(&node_rc, output, for_training)
    }

    pub fn output_value(&self, id: NodeId) -> Option<Tensor> {
        self.node(id).borrow().cached_output.clone()
    }

    /// Feed the loss gradient `d_error` into output node `id` and fan it
    /// in toward the heads, recursively.
    pub fn backward_output(&self, id: NodeId, d_error: &Tensor, optimizer: &mut dyn Optimizer, learning_rate: f32) -> Result<()> {
        let node_rc = self.node(id);
        let grads = node_rc.borrow_mut().layer.backward(d_error, optimizer, learning_rate)?;
        propagate_backward(&node_rc, grads, optimizer, learning_rate)
    }

    /// Every parameter tensor owned by any layer in the graph, keyed by its
    /// stable label (spec §4.H save format: "one weight-tensor file per
    /// parameter label").
    pub fn collect_parameters(&self) -> Vec<(String, Tensor)> {
        self.nodes.iter().flat_map(|n| n.borrow().layer.parameters()).collect()
    }

    /// Restore every layer's parameters from a label keyed table (the
    /// counterpart of [`Graph::collect_parameters`] used when loading a
    /// saved model).
    pub fn load_parameters(&self, params: &std::collections::HashMap<String, Tensor>) -> Result<()> {
        for node in &self.nodes {
            node.borrow_mut().layer.load_parameters(params)?;
        }
        Ok(())
    }
}

fn propagate_forward(node_rc: &Rc<RefCell<Node>>, output: Tensor, for_training: bool) -> Result<()> {
    let successors = node_rc.borrow().successors.clone();
    for (succ_rc, slot) in successors {
        let ready = {
            let mut succ = succ_rc.borrow_mut();
            succ.pending_inputs[slot] = Some(output.clone());
            succ.pending_inputs.iter().all(Option::is_some)
        };
        if !ready {
            continue;
        }
        let out = {
            let mut succ = succ_rc.borrow_mut();
            let inputs: Vec<Tensor> = succ.pending_inputs.iter_mut().map(|slot| slot.take().unwrap()).collect();
            let out = succ.layer.forward(&inputs, for_training)?.materialize();
            succ.cached_output = Some(out.clone());
            out
        };
        propagate_forward(&succ_rc, out, for_training)?;
    }
    Ok(())
}

fn propagate_backward(node_rc: &Rc<RefCell<Node>>, grads: Vec<Tensor>, optimizer: &mut dyn Optimizer, learning_rate: f32) -> Result<()> {
    let predecessors = node_rc.borrow().predecessors.clone();
    for ((pred_weak, succ_idx), grad) in predecessors.into_iter().zip(grads) {
        let pred_rc = pred_weak
            .upgrade()
            .ok_or_else(|| HappyMlError::Configuration("predecessor node dropped before backward reached it".into()))?;
        let fan_out = pred_rc.borrow().successors.len();
        let ready = {
            let mut pred = pred_rc.borrow_mut();
            pred.pending_errors[succ_idx] = Some(grad.materialize());
            pred.pending_errors.iter().all(Option::is_some)
        };
        if !ready {
            continue;
        }
        let combined = {
            let mut pred = pred_rc.borrow_mut();
            let mut sum: Option<Tensor> = None;
            for slot in pred.pending_errors.iter_mut() {
                let t = slot.take().unwrap();
                sum = Some(match sum {
                    None => t,
                    Some(acc) => acc.add(&t)?.materialize(),
                });
            }
            sum.unwrap().scale(1.0 / fan_out as f32).materialize()
        };
        let next_grads = pred_rc.borrow_mut().layer.backward(&combined, optimizer, learning_rate)?;
        propagate_backward(&pred_rc, next_grads, &mut *optimizer, learning_rate)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Bits, FullyConnected};
    use crate::optim::Sgd;
    use crate::tensor::Shape;

    #[test]
    fn forward_runs_a_two_layer_chain() {
        let mut graph = Graph::new();
        let fc1 = graph.add_node(Box::new(FullyConnected::with_weight(
            "fc1",
            Tensor::full32(Shape::new(2, 2, 1), vec![1.0, 0.0, 0.0, 1.0]),
            Bits::Full32,
        )));
        let fc2 = graph.add_node(Box::new(FullyConnected::with_weight(
            "fc2",
            Tensor::full32(Shape::new(2, 1, 1), vec![1.0, 1.0]),
            Bits::Full32,
        )));
        graph.connect(fc1, fc2).unwrap();
        graph.assert_acyclic().unwrap();

        let input = Tensor::full32(Shape::new(1, 2, 1), vec![3.0, 4.0]);
        graph.forward_head(fc1, input, false).unwrap();
        let out = graph.output_value(fc2).unwrap();
        assert_eq!(out.get_value(0, 0, 0), 7.0);
    }

    #[test]
    fn backward_reaches_the_head_and_updates_both_layers() {
        let mut graph = Graph::new();
        let fc1 = graph.add_node(Box::new(FullyConnected::with_weight(
            "fc1",
            Tensor::full32(Shape::new(2, 2, 1), vec![1.0, 0.0, 0.0, 1.0]),
            Bits::Full32,
        )));
        let fc2 = graph.add_node(Box::new(FullyConnected::with_weight(
            "fc2",
            Tensor::full32(Shape::new(2, 1, 1), vec![1.0, 1.0]),
            Bits::Full32,
        )));
        graph.connect(fc1, fc2).unwrap();

        let input = Tensor::full32(Shape::new(1, 2, 1), vec![3.0, 4.0]);
        graph.forward_head(fc1, input, true).unwrap();

        let mut opt = Sgd;
        let d_error = Tensor::full32(Shape::new(1, 1, 1), vec![1.0]);
        graph.backward_output(fc2, &d_error, &mut opt, 0.1).unwrap();
    }

    #[test]
    fn fan_in_averages_gradients_from_two_successors() {
        let mut graph = Graph::new();
        let head = graph.add_node(Box::new(FullyConnected::with_weight(
            "head",
            Tensor::full32(Shape::new(1, 1, 1), vec![1.0]),
            Bits::Full32,
        )));
        let left = graph.add_node(Box::new(FullyConnected::with_weight(
            "left",
            Tensor::full32(Shape::new(1, 1, 1), vec![1.0]),
            Bits::Full32,
        )));
        let right = graph.add_node(Box::new(FullyConnected::with_weight(
            "right",
            Tensor::full32(Shape::new(1, 1, 1), vec![1.0]),
            Bits::Full32,
        )));
        graph.connect(head, left).unwrap();
        graph.connect(head, right).unwrap();
        graph.assert_acyclic().unwrap();

        let input = Tensor::full32(Shape::new(1, 1, 1), vec![2.0]);
        graph.forward_head(head, input, true).unwrap();

        let mut opt = Sgd;
        graph
            .backward_output(left, &Tensor::full32(Shape::new(1, 1, 1), vec![1.0]), &mut opt, 0.0)
            .unwrap();
        graph
            .backward_output(right, &Tensor::full32(Shape::new(1, 1, 1), vec![1.0]), &mut opt, 0.0)
            .unwrap();
    }
}
