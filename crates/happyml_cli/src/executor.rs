//! Command execution (spec §6): turns a parsed [`Command`] into dataset and
//! model filesystem effects. Each handler here plays the role one of
//! `bit_llama::cli`'s subcommand match arms plays for its binary — a thin
//! function that wires DSL arguments into the engine crate's real API.

use crate::command::{Command, ColumnSpec, DataType, ExecuteSource, Goal, PrintMode, Use};
use crate::formats;
use crate::network::{self, ArchitectureGoal};
use crate::repo::HappyMlRepo;

use happyml_core::config::{LossKind, OptimizerKind, TrainingConfig};
use happyml_core::dataset::{ColumnMetadata, Dataset, DatasetReader, DatasetWriter, Purpose};
use happyml_core::encode::{LabelEncoder, PixelEncoder, ScalarEncoder};
use happyml_core::optim::{Adam, Optimizer, Sgd, SgdMomentum};
use happyml_core::train::exit_strategy::ExitStrategy;
use happyml_core::train::persist;
use happyml_core::train::train;
use happyml_core::{Shape, Tensor};

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use tracing::{info, warn};

/// Run a parsed command against `repo`, returning the text a REPL or script
/// runner should print on success. `Command::Exit` is ordinarily handled by
/// the caller before reaching here; this still accepts it for completeness.
pub fn execute(repo: &HappyMlRepo, command: &Command) -> Result<String, String> {
    match command {
        Command::CreateDataset { name, has_header, columns, location } => create_dataset(repo, name, *has_header, columns, location),
        Command::CreateTask { name, goal, test_dataset, dataset } => create_task(repo, name, *goal, test_dataset.as_deref(), dataset),
        Command::ExecuteTask { name, label, source } => execute_task(repo, name, label.as_deref(), source),
        Command::Print { mode, dataset, limit } => print_dataset(repo, *mode, dataset, *limit),
        Command::Help(topic) => Ok(help_text(topic.as_deref())),
        Command::Exit => Ok(String::new()),
    }
}

fn source_column_count(spec: &ColumnSpec) -> usize {
    match spec.data_type {
        DataType::Label | DataType::Text => 1,
        DataType::Number | DataType::Image => spec.shape.map(|(r, c, ch)| r * c * ch).unwrap_or(1),
    }
}

fn purpose_tag(purpose: Purpose) -> &'static str {
    match purpose {
        Purpose::Number => "number",
        Purpose::Image => "image",
        Purpose::Label => "label",
        Purpose::Text => "text",
    }
}

fn slice_cells(row: &[String], start: usize, count: usize) -> Result<Vec<String>, String> {
    row.get(start..start + count)
        .map(|s| s.to_vec())
        .ok_or_else(|| format!("row has {} cell(s), column needs cells {}..{}", row.len(), start, start + count))
}

enum FieldEncoder {
    Scalar(ScalarEncoder),
    Pixel(PixelEncoder),
    Label(LabelEncoder),
}

impl FieldEncoder {
    fn encode(&self, cells: &[String]) -> Result<Tensor, String> {
        match self {
            FieldEncoder::Scalar(e) => e.encode(cells).map_err(|e| e.to_string()),
            FieldEncoder::Pixel(e) => e.encode(cells).map_err(|e| e.to_string()),
            FieldEncoder::Label(e) => e.encode(cells).map_err(|e| e.to_string()),
        }
    }
}

fn build_field(spec: &ColumnSpec, prefix: &str, idx: usize, label_sets: &HashMap<usize, BTreeSet<String>>) -> Result<(ColumnMetadata, FieldEncoder), String> {
    let name = format!("{prefix}{idx}");
    match spec.data_type {
        DataType::Text => Err("text columns require an externally trained tokenizer, which this command DSL has no clause for".to_string()),
        DataType::Number => {
            let (r, c, ch) = spec.shape.unwrap_or((1, 1, 1));
            let shape = Shape::new(r, c, ch);
            Ok((ColumnMetadata::new(name, Purpose::Number, r, c, ch), FieldEncoder::Scalar(ScalarEncoder::new(shape))))
        }
        DataType::Image => {
            let (r, c, ch) = spec.shape.unwrap_or((1, 1, 1));
            let shape = Shape::new(r, c, ch);
            Ok((ColumnMetadata::new(name, Purpose::Image, r, c, ch), FieldEncoder::Pixel(PixelEncoder::new(shape))))
        }
        DataType::Label => {
            let labels: Vec<String> = label_sets.get(&spec.column_index).cloned().unwrap_or_default().into_iter().collect();
            let encoder = LabelEncoder::new(labels.clone());
            let mut meta = ColumnMetadata::new(name, Purpose::Label, 1, labels.len().max(1), 1);
            meta.ordered_labels = labels;
            Ok((meta, FieldEncoder::Label(encoder)))
        }
    }
}

fn check_overlaps(columns: &[ColumnSpec]) -> Result<(), String> {
    let mut ranges: Vec<(usize, usize)> = columns.iter().map(|c| (c.column_index, c.column_index + source_column_count(c))).collect();
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        if pair[1].0 < pair[0].1 {
            return Err("create dataset's columns overlap".to_string());
        }
    }
    Ok(())
}

fn discover_label_sets(columns: &[ColumnSpec], rows: &[Vec<String>]) -> HashMap<usize, BTreeSet<String>> {
    let mut label_sets: HashMap<usize, BTreeSet<String>> = HashMap::new();
    for spec in columns {
        if spec.data_type == DataType::Label {
            label_sets.entry(spec.column_index).or_default();
        }
    }
    for row in rows {
        for spec in columns {
            if spec.data_type == DataType::Label {
                if let Some(cell) = row.get(spec.column_index) {
                    label_sets.get_mut(&spec.column_index).unwrap().insert(cell.trim().to_string());
                }
            }
        }
    }
    label_sets
}

/// `create dataset` (spec §6): parses `location`'s rows, encodes each
/// declared column group into tensors, writes a deduped raw binary file,
/// then normalizes it into the dataset's final on-disk form. Grounded in
/// `create_dataset_statement.hpp`'s pipeline: organize given-before-expected
/// (here implicit in column-group order rather than a file rewrite),
/// convert-to-binary-with-dedup, then normalize-and-standardize.
fn create_dataset(repo: &HappyMlRepo, name: &str, has_header: bool, columns: &[ColumnSpec], location: &str) -> Result<String, String> {
    if repo.dataset_exists(name) {
        return Err(format!("dataset '{name}' already exists"));
    }
    if columns.is_empty() {
        return Err("create dataset must have at least one given column".to_string());
    }
    check_overlaps(columns)?;

    let given_specs: Vec<&ColumnSpec> = columns.iter().filter(|c| c.use_ == Use::Given).collect();
    let expected_specs: Vec<&ColumnSpec> = columns.iter().filter(|c| c.use_ == Use::Expected).collect();
    if given_specs.is_empty() {
        return Err("create dataset must have at least one given column".to_string());
    }
    if expected_specs.is_empty() {
        return Err("create dataset must have at least one expected column".to_string());
    }

    let stripped = formats::strip_file_scheme(location)?;
    let mut rows = formats::load_rows(Path::new(stripped))?;
    if has_header && !rows.is_empty() {
        rows.remove(0);
    }

    let label_sets = discover_label_sets(columns, &rows);

    let mut given_fields = Vec::with_capacity(given_specs.len());
    for (i, spec) in given_specs.iter().enumerate() {
        given_fields.push(build_field(spec, "given_", i, &label_sets)?);
    }
    let mut expected_fields = Vec::with_capacity(expected_specs.len());
    for (i, spec) in expected_specs.iter().enumerate() {
        expected_fields.push(build_field(spec, "expected_", i, &label_sets)?);
    }

    let given_meta: Vec<ColumnMetadata> = given_fields.iter().map(|(m, _)| m.clone()).collect();
    let expected_meta: Vec<ColumnMetadata> = expected_fields.iter().map(|(m, _)| m.clone()).collect();

    info!("creating dataset '{name}' from {} row(s)", rows.len());
    let raw_path = repo.ensure_dataset_dir(name).map_err(|e| e.to_string())?.join("dataset.raw.tmp");
    {
        let file = File::create(&raw_path).map_err(|e| e.to_string())?;
        let mut writer = DatasetWriter::new(file, given_meta.clone(), expected_meta.clone()).map_err(|e| e.to_string())?;

        for row in &rows {
            let given_tensors = given_fields
                .iter()
                .zip(given_specs.iter())
                .map(|((_, enc), spec)| slice_cells(row, spec.column_index, source_column_count(spec)).and_then(|cells| enc.encode(&cells)))
                .collect::<Result<Vec<_>, String>>();
            let given_tensors = match given_tensors {
                Ok(t) => t,
                Err(e) => {
                    warn!("skipping row during dataset creation: {e}");
                    continue;
                }
            };
            let expected_tensors = expected_fields
                .iter()
                .zip(expected_specs.iter())
                .map(|((_, enc), spec)| slice_cells(row, spec.column_index, source_column_count(spec)).and_then(|cells| enc.encode(&cells)))
                .collect::<Result<Vec<_>, String>>();
            let expected_tensors = match expected_tensors {
                Ok(t) => t,
                Err(e) => {
                    warn!("skipping row during dataset creation: {e}");
                    continue;
                }
            };
            if let Err(e) = writer.write_row(&given_tensors, &expected_tensors) {
                warn!("skipping row during dataset creation: {e}");
            }
        }

        if writer.rows_written() == 0 {
            drop(writer);
            let _ = std::fs::remove_file(&raw_path);
            return Err("dataset is empty after deduplication".to_string());
        }
    }

    info!("normalizing dataset '{name}'");
    let reader = DatasetReader::open(&raw_path).map_err(|e| e.to_string())?;
    let final_file = File::create(repo.dataset_bin_path(name)).map_err(|e| e.to_string())?;
    let norm_writer = happyml_core::dataset::normalize::normalize_dataset(&reader, final_file).map_err(|e| e.to_string())?;
    let rows_written = norm_writer.rows_written();
    drop(norm_writer);
    drop(reader);
    std::fs::remove_file(&raw_path).map_err(|e| e.to_string())?;

    let mut config_file = File::create(repo.dataset_config_path(name)).map_err(|e| e.to_string())?;
    writeln!(config_file, "rows:{rows_written}").map_err(|e| e.to_string())?;
    writeln!(config_file, "given_columns:{}", given_meta.len()).map_err(|e| e.to_string())?;
    writeln!(config_file, "expected_columns:{}", expected_meta.len()).map_err(|e| e.to_string())?;
    for (i, meta) in given_meta.iter().enumerate() {
        writeln!(config_file, "given_{i}:{}:{}:{}:{}", purpose_tag(meta.purpose), meta.rows, meta.columns, meta.channels).map_err(|e| e.to_string())?;
    }
    for (i, meta) in expected_meta.iter().enumerate() {
        writeln!(config_file, "expected_{i}:{}:{}:{}:{}", purpose_tag(meta.purpose), meta.rows, meta.columns, meta.channels).map_err(|e| e.to_string())?;
    }

    Ok(format!("created dataset '{name}' with {rows_written} row(s)"))
}

fn goal_optimizer(goal: ArchitectureGoal) -> (OptimizerKind, Box<dyn Optimizer>) {
    match goal {
        ArchitectureGoal::Speed => (OptimizerKind::Sgd, Box::new(Sgd)),
        ArchitectureGoal::Accuracy => (OptimizerKind::Adam, Box::new(Adam::default())),
        ArchitectureGoal::Memory => (OptimizerKind::SgdMomentum, Box::new(SgdMomentum::default())),
    }
}

fn goal_exit_strategy(goal: ArchitectureGoal, has_test_dataset: bool) -> ExitStrategy {
    match goal {
        ArchitectureGoal::Accuracy if has_test_dataset => ExitStrategy::test_precision_default(),
        ArchitectureGoal::Accuracy => ExitStrategy::high_precision_default(),
        ArchitectureGoal::Speed | ArchitectureGoal::Memory => ExitStrategy::FixedEpochs { epochs: 200 },
    }
}

/// `create task` (spec §6): builds a small feed-forward network sized to the
/// named dataset's column shapes (see [`network::build_network`]), trains it
/// to `goal`'s exit policy, and persists both the topology and weights under
/// `models/<name>/`.
fn create_task(repo: &HappyMlRepo, name: &str, goal: Option<Goal>, test_dataset: Option<&str>, dataset_name: &str) -> Result<String, String> {
    if repo.model_exists(name) {
        return Err(format!("task '{name}' already exists"));
    }
    if !repo.dataset_exists(dataset_name) {
        return Err(format!("dataset '{dataset_name}' does not exist"));
    }
    let arch_goal = match goal.unwrap_or(Goal::Speed) {
        Goal::Speed => ArchitectureGoal::Speed,
        Goal::Accuracy => ArchitectureGoal::Accuracy,
        Goal::Memory => ArchitectureGoal::Memory,
    };

    let mut dataset = Dataset::open(repo.dataset_bin_path(dataset_name)).map_err(|e| e.to_string())?;
    if dataset.expected_columns().len() != 1 {
        return Err("create task only supports a single expected column group".to_string());
    }
    let given_shapes: Vec<Shape> = dataset.given_columns().iter().map(|c| Shape::new(c.rows, c.columns, c.channels)).collect();
    let expected_meta = &dataset.expected_columns()[0];
    let expected_shape = Shape::new(expected_meta.rows, expected_meta.columns, expected_meta.channels);
    let expected_is_label = expected_meta.purpose == Purpose::Label;

    let designed = network::build_network(&given_shapes, expected_shape, expected_is_label, arch_goal)?;
    let mut graph = designed.graph;

    let (optimizer_kind, mut optimizer) = goal_optimizer(arch_goal);
    let loss = if expected_is_label { LossKind::CategoricalCrossEntropy } else { LossKind::MeanSquaredError };
    let (learning_rate, batch_size) = match arch_goal {
        ArchitectureGoal::Speed => (0.1, 1),
        ArchitectureGoal::Accuracy => (0.01, 8),
        ArchitectureGoal::Memory => (0.05, 4),
    };
    let config = TrainingConfig {
        optimizer: optimizer_kind,
        learning_rate,
        bias_learning_rate: learning_rate,
        loss,
        batch_size,
    };
    let exit = goal_exit_strategy(arch_goal, test_dataset.is_some());

    let mut test_ds = match test_dataset {
        Some(test_name) => {
            if !repo.dataset_exists(test_name) {
                return Err(format!("test dataset '{test_name}' does not exist"));
            }
            Some(Dataset::open(repo.dataset_bin_path(test_name)).map_err(|e| e.to_string())?)
        }
        None => None,
    };

    info!("training task '{name}' on dataset '{dataset_name}' with goal {arch_goal:?}");
    let report = train(
        &mut graph,
        &designed.heads,
        &designed.outputs,
        &mut dataset,
        test_ds.as_mut(),
        &config,
        optimizer.as_mut(),
        &exit,
        42,
    )
    .map_err(|e| e.to_string())?;

    repo.ensure_model_dir(name).map_err(|e| e.to_string())?;
    let params = graph.collect_parameters();
    persist::save_parameters(repo.model_dir(name), &params).map_err(|e| e.to_string())?;

    let mut config_file = File::create(repo.model_config_path(name)).map_err(|e| e.to_string())?;
    persist::write_training_config(&mut config_file, &config).map_err(|e| e.to_string())?;
    for vertex in &designed.topology.vertices {
        writeln!(config_file, "{}", network::write_vertex_line(vertex)).map_err(|e| e.to_string())?;
    }
    for (from, to) in &designed.topology.edges {
        writeln!(config_file, "{}", network::write_edge_line(*from, *to)).map_err(|e| e.to_string())?;
    }

    Ok(format!(
        "created task '{name}' (initial_loss={:.4}, final_loss={:.4}, epochs={})",
        report.initial_loss, report.final_loss, report.epochs_run
    ))
}

/// `execute task` (spec §6): reconstructs the saved graph, loads its
/// weights, and runs either every row of a named dataset or one inline
/// `input (...)` map through it.
fn execute_task(repo: &HappyMlRepo, name: &str, label: Option<&str>, source: &ExecuteSource) -> Result<String, String> {
    if !repo.model_exists(name) {
        return Err(format!("task '{name}' does not exist"));
    }
    let config_file = File::open(repo.model_config_path(name)).map_err(|e| e.to_string())?;
    let (_config, leftover) = persist::read_training_config(BufReader::new(config_file)).map_err(|e| e.to_string())?;
    let topology = network::parse_topology(&leftover)?;
    let (graph, heads, outputs) = network::build_graph(&topology)?;
    let params = persist::load_parameters(repo.model_dir(name)).map_err(|e| e.to_string())?;
    graph.load_parameters(&params).map_err(|e| e.to_string())?;

    let label_suffix = label.map(|l| format!(" (variant '{l}')")).unwrap_or_default();

    match source {
        ExecuteSource::Dataset(dataset_name) => {
            if !repo.dataset_exists(dataset_name) {
                return Err(format!("dataset '{dataset_name}' does not exist"));
            }
            let mut dataset = Dataset::open(repo.dataset_bin_path(dataset_name)).map_err(|e| e.to_string())?;
            let ordered_labels = dataset.expected_columns().first().map(|c| c.ordered_labels.clone()).unwrap_or_default();

            let mut lines = Vec::new();
            let mut row_idx = 0usize;
            while let Some((given, _expected)) = dataset.next_record().map_err(|e| e.to_string())? {
                if heads.len() != given.len() {
                    return Err(format!("task '{name}' expects {} given column(s), dataset '{dataset_name}' has {}", heads.len(), given.len()));
                }
                for (head, input) in heads.iter().zip(&given) {
                    graph.forward_head(*head, input.clone(), false).map_err(|e| e.to_string())?;
                }
                let output = graph.output_value(outputs[0]).ok_or_else(|| "task produced no output".to_string())?;
                let line = if ordered_labels.is_empty() {
                    format!("row {row_idx}: {}", output.pretty_print_row(0))
                } else {
                    let best = output.max_index_in_row(0).map_err(|e| e.to_string())?;
                    format!("row {row_idx}: {} {}", ordered_labels[best], output.pretty_print_row(0))
                };
                lines.push(line);
                row_idx += 1;
            }
            Ok(format!("executed task '{name}'{label_suffix} over dataset '{dataset_name}':\n{}", lines.join("\n")))
        }
        ExecuteSource::Input(entries) => {
            if entries.len() != heads.len() {
                return Err(format!("execute task input supplies {} column(s) but task '{name}' has {} given input(s)", entries.len(), heads.len()));
            }
            let head_shapes: Vec<Shape> = topology.vertices.iter().filter(|v| v.accepts_input).map(|v| v.in_shape).collect();
            for ((_, values), (head, shape)) in entries.iter().zip(heads.iter().zip(head_shapes.iter())) {
                let encoder = ScalarEncoder::new(*shape);
                let tensor = encoder.encode(values).map_err(|e| e.to_string())?;
                graph.forward_head(*head, tensor, false).map_err(|e| e.to_string())?;
            }
            let output = graph.output_value(outputs[0]).ok_or_else(|| "task produced no output".to_string())?;
            Ok(format!("executed task '{name}'{label_suffix}: {}", output.pretty_print_row(0)))
        }
    }
}

/// `print` (spec §6): reads every row up to `limit` from a dataset and
/// renders it either as raw f32 arrays or `Tensor::pretty_print_row` text.
fn print_dataset(repo: &HappyMlRepo, mode: PrintMode, dataset_name: &str, limit: Option<usize>) -> Result<String, String> {
    if !repo.dataset_exists(dataset_name) {
        return Err(format!("dataset '{dataset_name}' does not exist"));
    }
    let mut dataset = Dataset::open(repo.dataset_bin_path(dataset_name)).map_err(|e| e.to_string())?;
    let limit = limit.unwrap_or(usize::MAX);
    let mut lines = Vec::new();
    let mut count = 0usize;
    while count < limit {
        match dataset.next_record().map_err(|e| e.to_string())? {
            None => break,
            Some((given, expected)) => {
                let line = match mode {
                    PrintMode::Raw => format!(
                        "given: {:?} expected: {:?}",
                        given.iter().map(Tensor::to_vec).collect::<Vec<_>>(),
                        expected.iter().map(Tensor::to_vec).collect::<Vec<_>>(),
                    ),
                    PrintMode::Pretty => format!(
                        "given:\n{}\nexpected:\n{}",
                        given.iter().map(|t| t.pretty_print_row(0)).collect::<Vec<_>>().join("\n"),
                        expected.iter().map(|t| t.pretty_print_row(0)).collect::<Vec<_>>().join("\n"),
                    ),
                };
                lines.push(line);
                count += 1;
            }
        }
    }
    Ok(lines.join("\n---\n"))
}

const HELP_OVERVIEW: &str = "Commands: create dataset, create task, execute task, print, help [topic], exit.\nUse 'help dataset', 'help task', or 'help future' for details.";
const HELP_DATASET: &str = "create dataset <name> [with header] (with {given|expected} {label|number|text|image} [(rows, columns, channels)] at <column_index>)+ using file://<path>";
const HELP_TASK: &str = "create task label <name> [with goal {speed|accuracy|memory}] [with test <dataset>] using <dataset>\nexecute task <name> [with label <variant>] using {dataset <name> | input (<key>: <value>, ...)}";
const HELP_FUTURE: &str = "Planned: convolutional task architectures, text columns via a trained tokenizer, and multiple expected column groups per task.";

fn help_text(topic: Option<&str>) -> String {
    match topic {
        Some("dataset") => HELP_DATASET.to_string(),
        Some("task") => HELP_TASK.to_string(),
        Some("future") => HELP_FUTURE.to_string(),
        _ => HELP_OVERVIEW.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ColumnSpec, DataType, ExecuteSource, Goal, PrintMode, Use};

    fn write_xor_csv(path: &Path) {
        let mut f = File::create(path).unwrap();
        writeln!(f, "0,0,0").unwrap();
        writeln!(f, "0,1,1").unwrap();
        writeln!(f, "1,0,1").unwrap();
        writeln!(f, "1,1,0").unwrap();
    }

    fn xor_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec {
                use_: Use::Given,
                data_type: DataType::Number,
                shape: Some((1, 2, 1)),
                column_index: 0,
            },
            ColumnSpec {
                use_: Use::Expected,
                data_type: DataType::Number,
                shape: None,
                column_index: 2,
            },
        ]
    }

    #[test]
    fn create_dataset_writes_a_binary_file_and_config() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("xor.csv");
        write_xor_csv(&csv_path);
        let repo = HappyMlRepo::new(tmp.path().join("repo"));

        let location = format!("file://{}", csv_path.display());
        let message = create_dataset(&repo, "xor", false, &xor_columns(), &location).unwrap();
        assert!(message.contains("4 row"));
        assert!(repo.dataset_exists("xor"));
        assert!(repo.dataset_config_path("xor").is_file());
    }

    #[test]
    fn create_dataset_rejects_a_duplicate_name() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("xor.csv");
        write_xor_csv(&csv_path);
        let repo = HappyMlRepo::new(tmp.path().join("repo"));
        let location = format!("file://{}", csv_path.display());
        create_dataset(&repo, "xor", false, &xor_columns(), &location).unwrap();
        let err = create_dataset(&repo, "xor", false, &xor_columns(), &location).unwrap_err();
        assert!(err.contains("already exists"));
    }

    #[test]
    fn text_columns_are_rejected_with_a_clear_message() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("t.csv");
        std::fs::write(&csv_path, "hello,0\n").unwrap();
        let repo = HappyMlRepo::new(tmp.path().join("repo"));
        let columns = vec![
            ColumnSpec {
                use_: Use::Given,
                data_type: DataType::Text,
                shape: None,
                column_index: 0,
            },
            ColumnSpec {
                use_: Use::Expected,
                data_type: DataType::Number,
                shape: None,
                column_index: 1,
            },
        ];
        let location = format!("file://{}", csv_path.display());
        let err = create_dataset(&repo, "t", false, &columns, &location).unwrap_err();
        assert!(err.contains("tokenizer"));
    }

    #[test]
    fn create_task_and_execute_task_round_trip_on_an_inline_input() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("xor.csv");
        write_xor_csv(&csv_path);
        let repo = HappyMlRepo::new(tmp.path().join("repo"));
        let location = format!("file://{}", csv_path.display());
        create_dataset(&repo, "xor", false, &xor_columns(), &location).unwrap();

        create_task(&repo, "xor_model", Some(Goal::Speed), None, "xor").unwrap();
        assert!(repo.model_exists("xor_model"));

        let source = ExecuteSource::Input(vec![("xy".to_string(), vec!["0".to_string(), "1".to_string()])]);
        let output = execute_task(&repo, "xor_model", None, &source).unwrap();
        assert!(output.contains("xor_model"));
    }

    #[test]
    fn execute_task_over_a_dataset_reports_one_line_per_row() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("xor.csv");
        write_xor_csv(&csv_path);
        let repo = HappyMlRepo::new(tmp.path().join("repo"));
        let location = format!("file://{}", csv_path.display());
        create_dataset(&repo, "xor", false, &xor_columns(), &location).unwrap();
        create_task(&repo, "xor_model", Some(Goal::Speed), None, "xor").unwrap();

        let output = execute_task(&repo, "xor_model", None, &ExecuteSource::Dataset("xor".to_string())).unwrap();
        assert_eq!(output.lines().filter(|l| l.starts_with("row ")).count(), 4);
    }

    #[test]
    fn print_dataset_raw_and_pretty() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("xor.csv");
        write_xor_csv(&csv_path);
        let repo = HappyMlRepo::new(tmp.path().join("repo"));
        let location = format!("file://{}", csv_path.display());
        create_dataset(&repo, "xor", false, &xor_columns(), &location).unwrap();

        let raw = print_dataset(&repo, PrintMode::Raw, "xor", Some(2)).unwrap();
        assert_eq!(raw.lines().count(), 2);
        let pretty = print_dataset(&repo, PrintMode::Pretty, "xor", None).unwrap();
        assert!(pretty.contains("expected:"));
    }
}
