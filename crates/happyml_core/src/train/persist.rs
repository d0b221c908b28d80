//! Model persistence primitives (spec §4.H): one weight-tensor file per
//! parameter label, plus the `optimizer:`/`learning_rate:`/... key:value
//! lines of `configuration.happyml`. Graph topology (the `vertex`/`edge`
//! lines) is reconstructed by whatever built the graph in the first place
//! — the DSL executor in `happyml_cli` — since the core engine has no
//! generic way to serialize a `Box<dyn Layer>`'s concrete kind back out;
//! this module only owns the parts that are graph-agnostic.

use crate::config::{LossKind, OptimizerKind, TrainingConfig};
use crate::error::{HappyMlError, Result};
use crate::tensor::Tensor;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, Write};
use std::path::Path;

const WEIGHT_FILE_EXT: &str = "weights";

/// Write one file per parameter label under `dir` (created if missing).
pub fn save_parameters(dir: impl AsRef<Path>, params: &[(String, Tensor)]) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    for (label, tensor) in params {
        let path = dir.join(format!("{label}.{WEIGHT_FILE_EXT}"));
        let mut file = File::create(path)?;
        tensor.save(&mut file)?;
    }
    Ok(())
}

/// Read back every `*.weights` file under `dir`, keyed by its label (the
/// file stem).
pub fn load_parameters(dir: impl AsRef<Path>) -> Result<HashMap<String, Tensor>> {
    let dir = dir.as_ref();
    let mut params = HashMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(WEIGHT_FILE_EXT) {
            continue;
        }
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| HappyMlError::Dataset(format!("unreadable weight file name: {path:?}")))?
            .to_string();
        let mut file = File::open(&path)?;
        params.insert(label, Tensor::load(&mut file)?);
    }
    Ok(params)
}

/// Write the training-config key:value lines of `configuration.happyml`.
/// The caller appends `vertex`/`edge` lines afterward (graph topology is
/// owned by whoever built the graph).
pub fn write_training_config<W: Write>(w: &mut W, config: &TrainingConfig) -> Result<()> {
    writeln!(w, "optimizer:{}", config.optimizer.as_str())?;
    writeln!(w, "learning_rate:{}", config.learning_rate)?;
    writeln!(w, "bias_learning_rate:{}", config.bias_learning_rate)?;
    writeln!(w, "loss:{}", config.loss.as_str())?;
    writeln!(w, "batch_size:{}", config.batch_size)?;
    Ok(())
}

/// Parse the `configuration.happyml` key:value lines into a
/// [`TrainingConfig`], returning every line this function didn't recognize
/// (the `vertex`/`edge` topology lines) in file order for the caller to
/// interpret.
pub fn read_training_config<R: BufRead>(r: R) -> Result<(TrainingConfig, Vec<String>)> {
    let mut config = TrainingConfig::default();
    let mut leftover = Vec::new();
    for line in r.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed.split_once(':') {
            Some(("optimizer", v)) => {
                config.optimizer = OptimizerKind::from_str(v)
                    .ok_or_else(|| HappyMlError::Configuration(format!("unknown optimizer '{v}'")))?;
            }
            Some(("learning_rate", v)) => {
                config.learning_rate = v
                    .parse()
                    .map_err(|e| HappyMlError::Configuration(format!("bad learning_rate '{v}': {e}")))?;
            }
            Some(("bias_learning_rate", v)) => {
                config.bias_learning_rate = v
                    .parse()
                    .map_err(|e| HappyMlError::Configuration(format!("bad bias_learning_rate '{v}': {e}")))?;
            }
            Some(("loss", v)) => {
                config.loss =
                    LossKind::from_str(v).ok_or_else(|| HappyMlError::Configuration(format!("unknown loss '{v}'")))?;
            }
            Some(("batch_size", v)) => {
                config.batch_size = v
                    .parse()
                    .map_err(|e| HappyMlError::Configuration(format!("bad batch_size '{v}': {e}")))?;
            }
            _ => leftover.push(line),
        }
    }
    Ok((config, leftover))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Shape;
    use tempfile::tempdir;

    #[test]
    fn parameters_round_trip_through_a_directory() {
        let dir = tempdir().unwrap();
        let params = vec![
            ("fc1_w".to_string(), Tensor::full32(Shape::new(2, 2, 1), vec![1.0, 2.0, 3.0, 4.0])),
            ("fc1_b".to_string(), Tensor::full32(Shape::new(1, 2, 1), vec![0.5, -0.5])),
        ];
        save_parameters(dir.path(), &params).unwrap();
        let loaded = load_parameters(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["fc1_w"].get_value(1, 1, 0), 4.0);
        assert_eq!(loaded["fc1_b"].get_value(0, 0, 0), 0.5);
    }

    #[test]
    fn config_round_trips_and_preserves_unknown_lines() {
        let config = TrainingConfig {
            optimizer: OptimizerKind::Adam,
            learning_rate: 0.01,
            bias_learning_rate: 0.02,
            loss: LossKind::CategoricalCrossEntropy,
            batch_size: 8,
        };
        let mut buf = Vec::new();
        write_training_config(&mut buf, &config).unwrap();
        buf.extend_from_slice(b"vertex 0 true false full tanh true true 32 1 2 1 1 3 1 0 0\n");

        let (parsed, leftover) = read_training_config(&buf[..]).unwrap();
        assert_eq!(parsed.batch_size, 8);
        assert_eq!(parsed.optimizer.as_str(), "adam");
        assert_eq!(leftover.len(), 1);
        assert!(leftover[0].starts_with("vertex"));
    }
}
