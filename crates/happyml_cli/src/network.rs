//! Graph topology persistence (spec §4.H save format): the `vertex`/`edge`
//! lines `happyml_core::train::persist` hands back as "leftover" lines,
//! since the core engine has no generic way to serialize a `Box<dyn
//! Layer>`'s concrete kind. This module owns both directions: turning a
//! graph the executor just built into those lines, and turning saved
//! lines back into a running `Graph`.
//!
//! Field order matches the original model writer exactly: `vertex <id>
//! <accepts_input> <produces_output> <node_type> <activation_type>
//! <materialized> <use_bias> <bits> <in_r> <in_c> <in_ch> <out_r> <out_c>
//! <out_ch> <filters> <kernel>`. A vertex has no stored label; both
//! directions derive it deterministically as `format!("n{id}")`, which is
//! all `Layer::parameters()`'s `label + "_w"`/`"_b"` keys need to line up
//! between save and load.

use happyml_core::graph::{Graph, NodeId};
use happyml_core::layers::{Activation, ActivationKind, Bias, Bits, ConcatenateWide, Flatten, FullyConnected, Layer};
use happyml_core::Shape;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct VertexRecord {
    pub id: usize,
    pub accepts_input: bool,
    pub produces_output: bool,
    pub node_type: String,
    pub activation_type: String,
    pub materialized: bool,
    pub use_bias: bool,
    pub bits: u8,
    pub in_shape: Shape,
    pub out_shape: Shape,
    pub filters: usize,
    pub kernel: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub vertices: Vec<VertexRecord>,
    pub edges: Vec<(usize, usize)>,
}

pub fn bits_to_tag(bits: Bits) -> u8 {
    match bits {
        Bits::Full32 => 32,
        Bits::Half16 => 16,
        Bits::Quarter8 => 8,
    }
}

fn bits_from_tag(tag: u8) -> Result<Bits, String> {
    match tag {
        32 => Ok(Bits::Full32),
        16 => Ok(Bits::Half16),
        8 => Ok(Bits::Quarter8),
        other => Err(format!("unknown bits tag '{other}'")),
    }
}

pub fn activation_to_tag(kind: ActivationKind) -> String {
    match kind {
        ActivationKind::Tanh => "tanh".to_string(),
        ActivationKind::TanhApprox => "tanh_approx".to_string(),
        ActivationKind::Relu => "relu".to_string(),
        ActivationKind::LeakyRelu { alpha } => format!("leaky_relu:{alpha}"),
        ActivationKind::Sigmoid => "sigmoid".to_string(),
        ActivationKind::SigmoidApprox => "sigmoid_approx".to_string(),
        ActivationKind::Softmax => "softmax".to_string(),
    }
}

fn activation_from_tag(tag: &str) -> Result<ActivationKind, String> {
    if let Some(alpha) = tag.strip_prefix("leaky_relu:") {
        let alpha = alpha.parse().map_err(|_| format!("bad leaky_relu alpha in '{tag}'"))?;
        return Ok(ActivationKind::LeakyRelu { alpha });
    }
    match tag {
        "tanh" => Ok(ActivationKind::Tanh),
        "tanh_approx" => Ok(ActivationKind::TanhApprox),
        "relu" => Ok(ActivationKind::Relu),
        "sigmoid" => Ok(ActivationKind::Sigmoid),
        "sigmoid_approx" => Ok(ActivationKind::SigmoidApprox),
        "softmax" => Ok(ActivationKind::Softmax),
        other => Err(format!("unknown activation type '{other}'")),
    }
}

pub fn write_vertex_line(v: &VertexRecord) -> String {
    format!(
        "vertex {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
        v.id,
        v.accepts_input,
        v.produces_output,
        v.node_type,
        v.activation_type,
        v.materialized,
        v.use_bias,
        v.bits,
        v.in_shape.rows,
        v.in_shape.columns,
        v.in_shape.channels,
        v.out_shape.rows,
        v.out_shape.columns,
        v.out_shape.channels,
        v.filters,
        v.kernel,
    )
}

pub fn write_edge_line(from: usize, to: usize) -> String {
    format!("edge {from} {to}")
}

fn parse_bool(word: &str) -> Result<bool, String> {
    word.parse().map_err(|_| format!("expected true/false, found '{word}'"))
}

fn parse_usize(word: &str) -> Result<usize, String> {
    word.parse().map_err(|_| format!("expected a number, found '{word}'"))
}

pub fn parse_topology(lines: &[String]) -> Result<Topology, String> {
    let mut topology = Topology::default();
    for line in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.first() {
            Some(&"vertex") => {
                if fields.len() != 17 {
                    return Err(format!("malformed vertex line: '{line}'"));
                }
                topology.vertices.push(VertexRecord {
                    id: parse_usize(fields[1])?,
                    accepts_input: parse_bool(fields[2])?,
                    produces_output: parse_bool(fields[3])?,
                    node_type: fields[4].to_string(),
                    activation_type: fields[5].to_string(),
                    materialized: parse_bool(fields[6])?,
                    use_bias: parse_bool(fields[7])?,
                    bits: fields[8].parse().map_err(|_| format!("bad bits in '{line}'"))?,
                    in_shape: Shape::new(parse_usize(fields[9])?, parse_usize(fields[10])?, parse_usize(fields[11])?),
                    out_shape: Shape::new(parse_usize(fields[12])?, parse_usize(fields[13])?, parse_usize(fields[14])?),
                    filters: parse_usize(fields[15])?,
                    kernel: parse_usize(fields[16])?,
                });
            }
            Some(&"edge") => {
                if fields.len() != 3 {
                    return Err(format!("malformed edge line: '{line}'"));
                }
                topology.edges.push((parse_usize(fields[1])?, parse_usize(fields[2])?));
            }
            _ => return Err(format!("unrecognized topology line: '{line}'")),
        }
    }
    Ok(topology)
}

fn build_layer(record: &VertexRecord) -> Result<Box<dyn Layer>, String> {
    let label = format!("n{}", record.id);
    let bits = bits_from_tag(record.bits)?;
    match record.node_type.as_str() {
        "fully_connected" => Ok(Box::new(FullyConnected::new(
            label,
            record.in_shape.cell_count(),
            record.out_shape.cell_count(),
            bits,
        ))),
        "bias" => Ok(Box::new(Bias::new(label, record.out_shape.cell_count(), bits))),
        "activation" => {
            let kind = activation_from_tag(&record.activation_type)?;
            Ok(Box::new(Activation::new(label, kind, record.in_shape)))
        }
        "flatten" => Ok(Box::new(Flatten::new(label, record.in_shape))),
        "concat" => Ok(Box::new(ConcatenateWide::new(label, record.in_shape, record.out_shape))),
        other => Err(format!("unknown node type '{other}'")),
    }
}

/// Rebuild a running [`Graph`] from a persisted [`Topology`], returning the
/// graph plus its head and output node IDs in ascending vertex-id order
/// (which is also the order `create task` assigned them in).
pub fn build_graph(topology: &Topology) -> Result<(Graph, Vec<NodeId>, Vec<NodeId>), String> {
    let mut graph = Graph::new();
    let mut id_map: HashMap<usize, NodeId> = HashMap::new();
    let mut heads = Vec::new();
    let mut outputs = Vec::new();

    for record in &topology.vertices {
        let layer = build_layer(record)?;
        let node_id = graph.add_node(layer);
        id_map.insert(record.id, node_id);
        if record.accepts_input {
            heads.push(node_id);
        }
        if record.produces_output {
            outputs.push(node_id);
        }
    }

    for (from, to) in &topology.edges {
        let from_id = *id_map.get(from).ok_or_else(|| format!("edge references unknown vertex {from}"))?;
        let to_id = *id_map.get(to).ok_or_else(|| format!("edge references unknown vertex {to}"))?;
        graph.connect(from_id, to_id).map_err(|e| e.to_string())?;
    }
    graph.assert_acyclic().map_err(|e| e.to_string())?;

    Ok((graph, heads, outputs))
}

/// How ambitious a `create task`-built network should be (spec §6 `with
/// goal`): speed favors a single narrow hidden layer and plain SGD, memory
/// keeps the same shape but quantizes weights to `Quarter8`, and accuracy
/// spends a second hidden layer and Adam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchitectureGoal {
    Speed,
    Accuracy,
    Memory,
}

/// Plain-struct description of the network [`build_network`] assembles,
/// returned alongside the live [`Graph`] so the caller can pick an
/// optimizer/exit strategy to match.
pub struct DesignedNetwork {
    pub graph: Graph,
    pub heads: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
    pub topology: Topology,
    pub bits: Bits,
}

fn hidden_width(input_width: usize, output_width: usize) -> usize {
    (input_width + output_width).max(4)
}

/// Build a small feed-forward classifier/regressor: flatten and
/// concatenate every given column into one wide row, run it through one or
/// two `FullyConnected + Bias + Activation` hidden blocks sized by `goal`,
/// then a final `FullyConnected + Bias` into `expected_shape`'s cell count
/// finished with `Softmax` (if `expected_is_label`) or `Tanh` otherwise.
pub fn build_network(given_shapes: &[Shape], expected_shape: Shape, expected_is_label: bool, goal: ArchitectureGoal) -> Result<DesignedNetwork, String> {
    if given_shapes.is_empty() {
        return Err("create task needs at least one given column".to_string());
    }
    let bits = if goal == ArchitectureGoal::Memory { Bits::Quarter8 } else { Bits::Full32 };

    let mut graph = Graph::new();
    let mut vertices = Vec::new();
    let mut edges = Vec::new();
    let mut heads = Vec::new();

    let mut push = |graph: &mut Graph, layer: Box<dyn Layer>, accepts_input: bool, produces_output: bool, node_type: &str, activation_type: &str, use_bias: bool, in_shape: Shape, out_shape: Shape| -> NodeId {
        let node_id = graph.add_node(layer);
        vertices.push(VertexRecord {
            id: node_id.0,
            accepts_input,
            produces_output,
            node_type: node_type.to_string(),
            activation_type: activation_type.to_string(),
            materialized: true,
            use_bias,
            bits: bits_to_tag(bits),
            in_shape,
            out_shape,
            filters: 0,
            kernel: 0,
        });
        node_id
    };

    // Flatten every given column, then fold them together pairwise.
    let mut running: Option<(NodeId, Shape)> = None;
    for (i, shape) in given_shapes.iter().enumerate() {
        let flat_shape = Shape::new(1, shape.cell_count(), 1);
        let node = push(&mut graph, Box::new(Flatten::new(format!("given{i}"), *shape)), true, false, "flatten", "none", false, *shape, flat_shape);
        heads.push(node);
        running = Some(match running {
            None => (node, flat_shape),
            Some((left, left_shape)) => {
                let combined_shape = Shape::new(1, left_shape.columns + flat_shape.columns, 1);
                let cat = push(&mut graph, Box::new(ConcatenateWide::new(format!("cat{i}"), left_shape, flat_shape)), false, false, "concat", "none", false, left_shape, combined_shape);
                graph.connect(left, cat).map_err(|e| e.to_string())?;
                edges.push((left.0, cat.0));
                graph.connect(node, cat).map_err(|e| e.to_string())?;
                edges.push((node.0, cat.0));
                (cat, combined_shape)
            }
        });
    }
    let (mut current, mut current_shape) = running.expect("at least one given column");

    let hidden_layers: &[()] = if goal == ArchitectureGoal::Accuracy { &[(), ()] } else { &[()] };
    for (layer_idx, ()) in hidden_layers.iter().enumerate() {
        let hidden_width = hidden_width(current_shape.columns, expected_shape.cell_count());
        let hidden_shape = Shape::new(1, hidden_width, 1);
        let fc = push(
            &mut graph,
            Box::new(FullyConnected::new(format!("hidden{layer_idx}"), current_shape.columns, hidden_width, bits)),
            false,
            false,
            "fully_connected",
            "none",
            true,
            current_shape,
            hidden_shape,
        );
        graph.connect(current, fc).map_err(|e| e.to_string())?;
        edges.push((current.0, fc.0));

        let bias = push(&mut graph, Box::new(Bias::new(format!("hidden{layer_idx}_b"), hidden_width, bits)), false, false, "bias", "none", false, hidden_shape, hidden_shape);
        graph.connect(fc, bias).map_err(|e| e.to_string())?;
        edges.push((fc.0, bias.0));

        let act = push(&mut graph, Box::new(Activation::new(format!("hidden{layer_idx}_act"), ActivationKind::Tanh, hidden_shape)), false, false, "activation", "tanh", false, hidden_shape, hidden_shape);
        graph.connect(bias, act).map_err(|e| e.to_string())?;
        edges.push((bias.0, act.0));

        current = act;
        current_shape = hidden_shape;
    }

    let output_width = expected_shape.cell_count();
    let output_shape = Shape::new(1, output_width, 1);
    let out_fc = push(&mut graph, Box::new(FullyConnected::new("output", current_shape.columns, output_width, bits)), false, false, "fully_connected", "none", true, current_shape, output_shape);
    graph.connect(current, out_fc).map_err(|e| e.to_string())?;
    edges.push((current.0, out_fc.0));

    let out_bias = push(&mut graph, Box::new(Bias::new("output_b", output_width, bits)), false, false, "bias", "none", false, output_shape, output_shape);
    graph.connect(out_fc, out_bias).map_err(|e| e.to_string())?;
    edges.push((out_fc.0, out_bias.0));

    let final_kind = if expected_is_label { ActivationKind::Softmax } else { ActivationKind::Tanh };
    let final_tag = activation_to_tag(final_kind);
    let out_act = push(&mut graph, Box::new(Activation::new("output_act", final_kind, output_shape)), false, true, "activation", &final_tag, false, output_shape, output_shape);
    graph.connect(out_bias, out_act).map_err(|e| e.to_string())?;
    edges.push((out_bias.0, out_act.0));

    graph.assert_acyclic().map_err(|e| e.to_string())?;

    Ok(DesignedNetwork {
        graph,
        heads,
        outputs: vec![out_act],
        topology: Topology { vertices, edges },
        bits,
    })
}
