//! Reductions, ranking helpers, pretty-printing, and the binary tensor
//! save/load format (spec §3/§9): big-endian `(channels, rows, cols: u64)`
//! header followed by big-endian f32 words in channel-major order.

use super::{Shape, Tensor};
use crate::error::{HappyMlError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

impl Tensor {
    pub fn sum(&self) -> f32 {
        let shape = self.shape();
        (0..shape.cell_count())
            .map(|idx| {
                let (r, c, ch) = shape.decompose(idx);
                self.get_value(r, c, ch)
            })
            .sum()
    }

    pub fn product(&self) -> f32 {
        let shape = self.shape();
        (0..shape.cell_count())
            .map(|idx| {
                let (r, c, ch) = shape.decompose(idx);
                self.get_value(r, c, ch)
            })
            .product()
    }

    pub fn mean(&self) -> f32 {
        let n = self.shape().cell_count();
        if n == 0 {
            return 0.0;
        }
        self.sum() / n as f32
    }

    pub fn min(&self) -> Option<f32> {
        let shape = self.shape();
        (0..shape.cell_count())
            .map(|idx| {
                let (r, c, ch) = shape.decompose(idx);
                self.get_value(r, c, ch)
            })
            .fold(None, |acc, v| match acc {
                None => Some(v),
                Some(m) => Some(m.min(v)),
            })
    }

    pub fn max(&self) -> Option<f32> {
        let shape = self.shape();
        (0..shape.cell_count())
            .map(|idx| {
                let (r, c, ch) = shape.decompose(idx);
                self.get_value(r, c, ch)
            })
            .fold(None, |acc, v| match acc {
                None => Some(v),
                Some(m) => Some(m.max(v)),
            })
    }

    pub fn range(&self) -> Option<(f32, f32)> {
        match (self.min(), self.max()) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        }
    }

    pub fn geometric_mean(&self) -> f32 {
        let n = self.shape().cell_count();
        if n == 0 {
            return 0.0;
        }
        self.product().abs().powf(1.0 / n as f32)
    }

    /// Population standard deviation over every cell.
    pub fn std_dev(&self) -> f32 {
        let n = self.shape().cell_count();
        if n == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let shape = self.shape();
        let variance: f32 = (0..n)
            .map(|idx| {
                let (r, c, ch) = shape.decompose(idx);
                let d = self.get_value(r, c, ch) - mean;
                d * d
            })
            .sum::<f32>()
            / n as f32;
        variance.sqrt()
    }

    /// Column index of the maximum value in row `row` (ties favor the
    /// first occurrence). Used for argmax-style label decoding.
    pub fn max_index_in_row(&self, row: usize) -> Result<usize> {
        let shape = self.shape();
        if row >= shape.rows {
            return Err(HappyMlError::ShapeMismatch(format!(
                "row {row} out of bounds for {shape:?}"
            )));
        }
        let mut best_idx = 0usize;
        let mut best_val = f32::NEG_INFINITY;
        for c in 0..shape.columns {
            let v = self.get_value(row, c, 0);
            if v > best_val {
                best_val = v;
                best_idx = c;
            }
        }
        Ok(best_idx)
    }

    /// Indices of the `k` largest values in row `row`, descending.
    pub fn top_indices_in_row(&self, row: usize, k: usize) -> Result<Vec<usize>> {
        let shape = self.shape();
        if row >= shape.rows {
            return Err(HappyMlError::ShapeMismatch(format!(
                "row {row} out of bounds for {shape:?}"
            )));
        }
        let mut pairs: Vec<(usize, f32)> = (0..shape.columns)
            .map(|c| (c, self.get_value(row, c, 0)))
            .collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs.truncate(k);
        Ok(pairs.into_iter().map(|(idx, _)| idx).collect())
    }

    pub fn pretty_print_row(&self, row: usize) -> String {
        let shape = self.shape();
        let mut out = String::new();
        for ch in 0..shape.channels {
            if shape.channels > 1 {
                out.push_str(&format!("[channel {ch}] "));
            }
            out.push('[');
            for c in 0..shape.columns {
                if c > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("{:.4}", self.get_value(row, c, ch)));
            }
            out.push(']');
            if ch + 1 < shape.channels {
                out.push('\n');
            }
        }
        out
    }

    pub fn pretty_print(&self) -> String {
        let shape = self.shape();
        (0..shape.rows)
            .map(|r| self.pretty_print_row(r))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write this tensor (materializing it first if needed) as a dense
    /// big-endian binary blob: `channels, rows, columns` as u64, then
    /// every cell as f32, channel-major.
    /// Dense channel-major copy of every cell, in the same order the
    /// binary format and `Shape::decompose` use.
    pub fn to_vec(&self) -> Vec<f32> {
        let shape = self.shape();
        (0..shape.cell_count())
            .map(|idx| {
                let (r, c, ch) = shape.decompose(idx);
                self.get_value(r, c, ch)
            })
            .collect()
    }

    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        let dense = self.materialize();
        let shape = dense.shape();
        writer.write_u64::<BigEndian>(shape.channels as u64)?;
        writer.write_u64::<BigEndian>(shape.rows as u64)?;
        writer.write_u64::<BigEndian>(shape.columns as u64)?;
        for idx in 0..shape.cell_count() {
            let (r, c, ch) = shape.decompose(idx);
            writer.write_f32::<BigEndian>(dense.get_value(r, c, ch))?;
        }
        Ok(())
    }

    pub fn load<R: Read>(reader: &mut R) -> Result<Tensor> {
        let channels = reader.read_u64::<BigEndian>()? as usize;
        let rows = reader.read_u64::<BigEndian>()? as usize;
        let columns = reader.read_u64::<BigEndian>()? as usize;
        let shape = Shape::new(rows, columns, channels);
        let mut data = vec![0.0f32; shape.cell_count()];
        for slot in data.iter_mut() {
            *slot = reader.read_f32::<BigEndian>()?;
        }
        Ok(Tensor::full32(shape, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reductions_match_hand_computation() {
        let t = Tensor::full32(Shape::new(1, 4, 1), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(t.sum(), 10.0);
        assert_eq!(t.product(), 24.0);
        assert_eq!(t.mean(), 2.5);
        assert_eq!(t.range(), Some((1.0, 4.0)));
    }

    #[test]
    fn max_index_and_top_k() {
        let t = Tensor::full32(Shape::new(1, 4, 1), vec![0.1, 0.7, 0.5, 0.2]);
        assert_eq!(t.max_index_in_row(0).unwrap(), 1);
        assert_eq!(t.top_indices_in_row(0, 2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn save_load_round_trip() {
        let t = Tensor::full32(Shape::new(2, 3, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut buf = Vec::new();
        t.save(&mut buf).unwrap();
        let loaded = Tensor::load(&mut &buf[..]).unwrap();
        assert_eq!(loaded.shape(), t.shape());
        for idx in 0..6 {
            let (r, c, ch) = t.shape().decompose(idx);
            assert_eq!(loaded.get_value(r, c, ch), t.get_value(r, c, ch));
        }
    }

    #[test]
    fn std_dev_of_constant_is_zero() {
        let t = Tensor::filled(Shape::new(2, 2, 1), 5.0);
        assert_eq!(t.std_dev(), 0.0);
    }
}
