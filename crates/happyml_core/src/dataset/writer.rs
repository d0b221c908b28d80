//! Raw binary dataset writer (spec §4.C): header of given/expected column
//! metadata followed by fixed-size row records, with in-session content
//! dedup via a hash of each row's f32 bytes.

use crate::dataset::column::ColumnMetadata;
use crate::error::{HappyMlError, Result};
use crate::tensor::Tensor;
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::io::Write;

pub struct DatasetWriter<W: Write> {
    writer: W,
    given_columns: Vec<ColumnMetadata>,
    expected_columns: Vec<ColumnMetadata>,
    seen_hashes: HashSet<u64>,
    rows_written: u64,
}

impl<W: Write> DatasetWriter<W> {
    pub fn new(mut writer: W, given_columns: Vec<ColumnMetadata>, expected_columns: Vec<ColumnMetadata>) -> Result<Self> {
        writer.write_u64::<BigEndian>(given_columns.len() as u64)?;
        for col in &given_columns {
            col.write(&mut writer)?;
        }
        writer.write_u64::<BigEndian>(expected_columns.len() as u64)?;
        for col in &expected_columns {
            col.write(&mut writer)?;
        }
        Ok(Self {
            writer,
            given_columns,
            expected_columns,
            seen_hashes: HashSet::new(),
            rows_written: 0,
        })
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Write one row, validating that tensors match declared column shapes.
    /// Returns `false` (and writes nothing) if this exact row content has
    /// already been written in this session.
    pub fn write_row(&mut self, givens: &[Tensor], expecteds: &[Tensor]) -> Result<bool> {
        if givens.len() != self.given_columns.len() || expecteds.len() != self.expected_columns.len() {
            return Err(HappyMlError::Dataset(
                "row column count does not match declared header".into(),
            ));
        }
        for (t, meta) in givens.iter().zip(&self.given_columns) {
            validate_shape(t, meta)?;
        }
        for (t, meta) in expecteds.iter().zip(&self.expected_columns) {
            validate_shape(t, meta)?;
        }

        let mut hasher = DefaultHasher::new();
        let mut row_bytes = Vec::new();
        for t in givens.iter().chain(expecteds.iter()) {
            let dense = t.materialize();
            let shape = dense.shape();
            for idx in 0..shape.cell_count() {
                let (r, c, ch) = shape.decompose(idx);
                row_bytes.extend_from_slice(&dense.get_value(r, c, ch).to_be_bytes());
            }
        }
        row_bytes.hash(&mut hasher);
        let hash = hasher.finish();
        if !self.seen_hashes.insert(hash) {
            return Ok(false);
        }

        self.writer.write_all(&row_bytes)?;
        self.rows_written += 1;
        Ok(true)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn validate_shape(t: &Tensor, meta: &ColumnMetadata) -> Result<()> {
    let s = t.shape();
    if s.rows != meta.rows || s.columns != meta.columns || s.channels != meta.channels {
        return Err(HappyMlError::Dataset(format!(
            "column '{}' expected shape ({}, {}, {}), got ({}, {}, {})",
            meta.name, meta.rows, meta.columns, meta.channels, s.rows, s.columns, s.channels
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::column::Purpose;
    use crate::tensor::Shape;

    #[test]
    fn dedup_rejects_identical_row() {
        let cols = vec![ColumnMetadata::new("x", Purpose::Number, 1, 2, 1)];
        let expected = vec![ColumnMetadata::new("y", Purpose::Number, 1, 1, 1)];
        let mut buf = Vec::new();
        let mut writer = DatasetWriter::new(&mut buf, cols, expected).unwrap();

        let given = vec![Tensor::full32(Shape::new(1, 2, 1), vec![1.0, 2.0])];
        let expected_t = vec![Tensor::full32(Shape::new(1, 1, 1), vec![3.0])];

        assert!(writer.write_row(&given, &expected_t).unwrap());
        assert!(!writer.write_row(&given, &expected_t).unwrap());
        assert_eq!(writer.rows_written(), 1);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let cols = vec![ColumnMetadata::new("x", Purpose::Number, 1, 2, 1)];
        let expected = vec![ColumnMetadata::new("y", Purpose::Number, 1, 1, 1)];
        let mut buf = Vec::new();
        let mut writer = DatasetWriter::new(&mut buf, cols, expected).unwrap();

        let bad_given = vec![Tensor::full32(Shape::new(1, 3, 1), vec![1.0, 2.0, 3.0])];
        let expected_t = vec![Tensor::full32(Shape::new(1, 1, 1), vec![3.0])];
        assert!(writer.write_row(&bad_given, &expected_t).is_err());
    }
}
