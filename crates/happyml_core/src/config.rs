//! Training configuration: the defaults persisted in a model's
//! `configuration.happyml` key:value header (spec §4.H), exposed here as
//! serde-deserializable structs so the CLI crate's persistence layer can
//! round-trip them without hand-rolled parsing for every field.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    Sgd,
    SgdMomentum,
    Adam,
}

impl OptimizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd => "sgd",
            OptimizerKind::SgdMomentum => "sgd_momentum",
            OptimizerKind::Adam => "adam",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sgd" => Some(OptimizerKind::Sgd),
            "sgd_momentum" => Some(OptimizerKind::SgdMomentum),
            "adam" => Some(OptimizerKind::Adam),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossKind {
    MeanSquaredError,
    CategoricalCrossEntropy,
    BinaryCrossEntropy,
}

impl LossKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LossKind::MeanSquaredError => "mean_squared_error",
            LossKind::CategoricalCrossEntropy => "categorical_cross_entropy",
            LossKind::BinaryCrossEntropy => "binary_cross_entropy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "mean_squared_error" => Some(LossKind::MeanSquaredError),
            "categorical_cross_entropy" => Some(LossKind::CategoricalCrossEntropy),
            "binary_cross_entropy" => Some(LossKind::BinaryCrossEntropy),
            _ => None,
        }
    }
}

/// Goal the `create task` DSL statement may declare (spec §6); purely
/// advisory in the core engine — the CLI uses it to pick defaults (batch
/// size, exit strategy) before constructing this config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingGoal {
    Speed,
    Accuracy,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub optimizer: OptimizerKind,
    pub learning_rate: f32,
    pub bias_learning_rate: f32,
    pub loss: LossKind,
    pub batch_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerKind::Sgd,
            learning_rate: 0.01,
            bias_learning_rate: 0.01,
            loss: LossKind::MeanSquaredError,
            batch_size: 1,
        }
    }
}
