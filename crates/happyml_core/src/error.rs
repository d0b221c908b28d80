//! Error kinds for the numeric engine (see spec §7).
//!
//! Each variant corresponds to one of the error kinds named in the
//! specification: shape mismatches in tensor ops, NaN/Inf faults during
//! training, dataset I/O, row encoding failures, command/graph
//! configuration errors, and the degenerate empty-dataset case.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HappyMlError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("numeric fault in layer '{layer}': {detail}")]
    NumericFault { layer: String, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("dataset I/O error: {0}")]
    Dataset(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("dataset is empty after deduplication")]
    EmptyDataset,
}

pub type Result<T> = std::result::Result<T, HappyMlError>;
