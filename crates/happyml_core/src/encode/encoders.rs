//! Encoders turn a row's raw string cells into a tensor of a declared
//! shape (spec §4.D).

use crate::error::{HappyMlError, Result};
use crate::tensor::{Shape, Tensor};
use tokenizers::Tokenizer;

/// Parses cells as floats and packs them into a dense `Full32` tensor.
pub struct ScalarEncoder {
    pub shape: Shape,
}

impl ScalarEncoder {
    pub fn new(shape: Shape) -> Self {
        Self { shape }
    }

    pub fn encode(&self, cells: &[String]) -> Result<Tensor> {
        if cells.len() != self.shape.cell_count() {
            return Err(HappyMlError::Encoding(format!(
                "ScalarEncoder expected {} cells, got {}",
                self.shape.cell_count(),
                cells.len()
            )));
        }
        let values = cells
            .iter()
            .map(|c| {
                c.trim()
                    .parse::<f32>()
                    .map_err(|e| HappyMlError::Encoding(format!("bad number '{c}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Tensor::full32(self.shape, values))
    }
}

/// Parses cells as floats in `[0, 255]`, divides by 255, and packs them
/// into a `Pixel8` tensor.
pub struct PixelEncoder {
    pub shape: Shape,
}

impl PixelEncoder {
    pub fn new(shape: Shape) -> Self {
        Self { shape }
    }

    pub fn encode(&self, cells: &[String]) -> Result<Tensor> {
        if cells.len() != self.shape.cell_count() {
            return Err(HappyMlError::Encoding(format!(
                "PixelEncoder expected {} cells, got {}",
                self.shape.cell_count(),
                cells.len()
            )));
        }
        let values = cells
            .iter()
            .map(|c| {
                c.trim()
                    .parse::<f32>()
                    .map(|v| v / 255.0)
                    .map_err(|e| HappyMlError::Encoding(format!("bad pixel '{c}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Tensor::pixel8(self.shape, &values))
    }
}

/// Looks up a single-cell label string in an ordered distinct-label list
/// and emits a one-hot `Quarter8` vector of length `labels.len()`.
pub struct LabelEncoder {
    pub ordered_labels: Vec<String>,
}

impl LabelEncoder {
    pub fn new(ordered_labels: Vec<String>) -> Self {
        Self { ordered_labels }
    }

    pub fn output_shape(&self) -> Shape {
        Shape::new(1, self.ordered_labels.len(), 1)
    }

    pub fn encode(&self, cells: &[String]) -> Result<Tensor> {
        let label = cells
            .first()
            .ok_or_else(|| HappyMlError::Encoding("LabelEncoder expects exactly one cell".into()))?;
        let index = self
            .ordered_labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| HappyMlError::Encoding(format!("unknown label '{label}'")))?;
        let mut one_hot = vec![0.0f32; self.ordered_labels.len()];
        one_hot[index] = 1.0;
        Ok(Tensor::quarter8(self.output_shape(), &one_hot, 4))
    }
}

/// Byte-pair tokenizes a cell into integer token IDs using an already
/// trained `tokenizers::Tokenizer`. Training a vocabulary is outside core
/// scope; the tokenizer is loaded from a path and consumed read-only.
pub struct TokenEncoder {
    tokenizer: Tokenizer,
    pub max_tokens: usize,
}

impl TokenEncoder {
    pub fn load(tokenizer_path: impl AsRef<std::path::Path>, max_tokens: usize) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| HappyMlError::Encoding(format!("failed to load tokenizer: {e}")))?;
        Ok(Self { tokenizer, max_tokens })
    }

    pub fn output_shape(&self) -> Shape {
        Shape::new(1, self.max_tokens, 1)
    }

    /// Emits raw token IDs as a `Full32` row, zero-padded/truncated to
    /// `max_tokens`. Embedding into a learned table is a later layer's job.
    pub fn encode(&self, cells: &[String]) -> Result<Tensor> {
        let text = cells
            .first()
            .ok_or_else(|| HappyMlError::Encoding("TokenEncoder expects exactly one cell".into()))?;
        let encoding = self
            .tokenizer
            .encode(text.as_str(), false)
            .map_err(|e| HappyMlError::Encoding(format!("tokenize failed: {e}")))?;
        let mut ids: Vec<f32> = encoding.get_ids().iter().map(|&id| id as f32).collect();
        ids.resize(self.max_tokens, 0.0);
        ids.truncate(self.max_tokens);
        Ok(Tensor::full32(self.output_shape(), ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_encoder_packs_floats() {
        let enc = ScalarEncoder::new(Shape::new(1, 3, 1));
        let t = enc.encode(&["1.0".into(), "2.5".into(), "-3".into()]).unwrap();
        assert_eq!(t.get_value(0, 0, 0), 1.0);
        assert_eq!(t.get_value(0, 1, 0), 2.5);
        assert_eq!(t.get_value(0, 2, 0), -3.0);
    }

    #[test]
    fn label_encoder_one_hots() {
        let enc = LabelEncoder::new(vec!["cat".into(), "dog".into(), "bird".into()]);
        let t = enc.encode(&["dog".into()]).unwrap();
        assert_eq!(t.get_value(0, 0, 0), 0.0);
        assert_eq!(t.get_value(0, 1, 0), 1.0);
        assert_eq!(t.get_value(0, 2, 0), 0.0);
    }

    #[test]
    fn label_encoder_rejects_unknown_label() {
        let enc = LabelEncoder::new(vec!["cat".into(), "dog".into()]);
        assert!(enc.encode(&["fish".into()]).is_err());
    }

    #[test]
    fn pixel_encoder_divides_by_255() {
        let enc = PixelEncoder::new(Shape::new(1, 2, 1));
        let t = enc.encode(&["255".into(), "0".into()]).unwrap();
        assert_eq!(t.get_value(0, 0, 0), 1.0);
        assert_eq!(t.get_value(0, 1, 0), 0.0);
    }
}
