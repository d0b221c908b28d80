//! Decoders reverse the tensor-to-human-readable direction (spec §4.D).
//! A single sum-type result (`Decoded`) and a single `Decoder` enum
//! matching on itself, per the design-note preference for tagged variants
//! over a trait-object hierarchy (spec §9).

use crate::error::{HappyMlError, Result};
use crate::tensor::Tensor;

/// ASCII luminance ramp, darkest to brightest.
const IMAGE_RAMP: [char; 5] = [' ', '░', '▒', '▓', '█'];

#[derive(Clone)]
pub enum Decoded {
    Text(String),
    Labels(Vec<String>),
    Image(Vec<String>),
    Tensor(Tensor_),
}

impl std::fmt::Debug for Decoded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decoded::Text(s) => write!(f, "Decoded::Text({s:?})"),
            Decoded::Labels(l) => write!(f, "Decoded::Labels({l:?})"),
            Decoded::Image(l) => write!(f, "Decoded::Image({l:?})"),
            Decoded::Tensor(_) => write!(f, "Decoded::Tensor(..)"),
        }
    }
}

impl PartialEq for Decoded {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Decoded::Text(a), Decoded::Text(b)) => a == b,
            (Decoded::Labels(a), Decoded::Labels(b)) => a == b,
            (Decoded::Image(a), Decoded::Image(b)) => a == b,
            _ => false,
        }
    }
}

/// Wraps the decoded-as-is tensor case; `Tensor` itself has no `Debug`/
/// `PartialEq` so this variant is excluded from both.
#[derive(Clone)]
pub struct Tensor_(pub Tensor);

pub enum Decoder {
    /// Applies `denormalize ∘ unstandardize`, the inverse of the dataset
    /// normalize/standardize pass, in reverse application order.
    Raw {
        is_normalized: bool,
        is_standardized: bool,
        min: f32,
        max: f32,
        mean: f32,
        std_dev: f32,
    },
    BestLabel { labels: Vec<String> },
    Image,
}

impl Decoder {
    pub fn decode(&self, tensor: &Tensor) -> Result<Decoded> {
        match self {
            Decoder::Raw {
                is_normalized,
                is_standardized,
                min,
                max,
                mean,
                std_dev,
            } => {
                let mut t = tensor.clone();
                if *is_normalized {
                    t = t.denormalize(*min, *max);
                }
                if *is_standardized {
                    t = t.unstandardize(*mean, *std_dev);
                }
                Ok(Decoded::Tensor(Tensor_(t.materialize())))
            }
            Decoder::BestLabel { labels } => {
                let idx = tensor.max_index_in_row(0)?;
                let label = labels
                    .get(idx)
                    .ok_or_else(|| HappyMlError::Encoding(format!("label index {idx} out of range")))?;
                Ok(Decoded::Labels(vec![label.clone()]))
            }
            Decoder::Image => Ok(Decoded::Image(render_image(tensor))),
        }
    }

    /// Returns the top-`k` labels by descending score (`BestLabel` only).
    pub fn top_k(&self, tensor: &Tensor, k: usize) -> Result<Vec<String>> {
        match self {
            Decoder::BestLabel { labels } => {
                let indices = tensor.top_indices_in_row(0, k)?;
                Ok(indices
                    .into_iter()
                    .filter_map(|i| labels.get(i).cloned())
                    .collect())
            }
            _ => Err(HappyMlError::Encoding("top_k is only valid for BestLabel decoders".into())),
        }
    }
}

fn render_image(tensor: &Tensor) -> Vec<String> {
    let shape = tensor.shape();
    let luminance = |r: usize, c: usize| -> f32 {
        if shape.channels >= 3 {
            0.299 * tensor.get_value(r, c, 0) + 0.587 * tensor.get_value(r, c, 1) + 0.114 * tensor.get_value(r, c, 2)
        } else {
            tensor.get_value(r, c, 0)
        }
    };
    let ramp_char = |v: f32| -> char {
        let clamped = v.clamp(0.0, 1.0);
        let idx = (clamped * (IMAGE_RAMP.len() - 1) as f32).round() as usize;
        IMAGE_RAMP[idx.min(IMAGE_RAMP.len() - 1)]
    };

    let mut lines = Vec::new();
    let mut row = 0;
    while row < shape.rows {
        let mut line = String::with_capacity(shape.columns);
        for col in 0..shape.columns {
            line.push(ramp_char(luminance(row, col)));
        }
        lines.push(line);
        row += 2;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Shape;

    #[test]
    fn best_label_picks_argmax() {
        let t = Tensor::full32(Shape::new(1, 3, 1), vec![0.1, 0.8, 0.1]);
        let decoder = Decoder::BestLabel {
            labels: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(decoder.decode(&t).unwrap(), Decoded::Labels(vec!["b".into()]));
    }

    #[test]
    fn raw_decoder_inverts_normalize_and_standardize() {
        let decoder = Decoder::Raw {
            is_normalized: true,
            is_standardized: true,
            min: 0.0,
            max: 10.0,
            mean: 2.0,
            std_dev: 3.0,
        };
        let t = Tensor::full32(Shape::new(1, 1, 1), vec![0.5]);
        match decoder.decode(&t).unwrap() {
            Decoded::Tensor(Tensor_(out)) => {
                assert!((out.get_value(0, 0, 0) - 17.0).abs() < 1e-4);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn image_decoder_collapses_rows_and_maps_ramp() {
        let t = Tensor::full32(Shape::new(4, 2, 1), vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let decoder = Decoder::Image;
        match decoder.decode(&t).unwrap() {
            Decoded::Image(lines) => assert_eq!(lines.len(), 2),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
