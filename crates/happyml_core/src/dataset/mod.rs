//! Binary columnar dataset layer (spec §4.C): column metadata, a
//! memory-mapped reader, a dedup-on-write writer, a Fisher-Yates shuffler,
//! and the normalize/standardize rewrite pass.

pub mod column;
pub mod normalize;
pub mod reader;
pub mod shuffler;
pub mod writer;

pub use column::{ColumnMetadata, Purpose};
pub use reader::DatasetReader;
pub use shuffler::Shuffler;
pub use writer::DatasetWriter;

use crate::error::Result;
use crate::tensor::Tensor;

/// A dataset ready for training: a reader plus a shuffle order and read
/// cursor. `next_record` reads through the shuffler's permutation so
/// repeated epochs can reshuffle without rewriting the file.
pub struct Dataset {
    reader: DatasetReader,
    shuffler: Shuffler,
    cursor: usize,
}

impl Dataset {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let reader = DatasetReader::open(path)?;
        let shuffler = Shuffler::identity(reader.row_count());
        Ok(Self {
            reader,
            shuffler,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.reader.row_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn given_columns(&self) -> &[ColumnMetadata] {
        &self.reader.given_columns
    }

    pub fn expected_columns(&self) -> &[ColumnMetadata] {
        &self.reader.expected_columns
    }

    pub fn shuffle(&mut self, seed: u64) {
        self.shuffler.shuffle(seed);
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Read the row at the current cursor position through the shuffle
    /// order, then advance the cursor. Returns `None` at end of epoch.
    pub fn next_record(&mut self) -> Result<Option<(Vec<Tensor>, Vec<Tensor>)>> {
        if self.cursor >= self.shuffler.len() {
            return Ok(None);
        }
        let physical = self.shuffler.lookup(self.cursor);
        self.cursor += 1;
        Ok(Some(self.reader.read_row(physical)?))
    }

    pub fn read_row(&self, logical_index: usize) -> Result<(Vec<Tensor>, Vec<Tensor>)> {
        let physical = self.shuffler.lookup(logical_index);
        self.reader.read_row(physical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Shape;
    use std::fs::File;
    use tempfile::NamedTempFile;

    fn build_dataset(path: &std::path::Path, n: usize) {
        let given_meta = vec![ColumnMetadata::new("x", Purpose::Number, 1, 1, 1)];
        let expected_meta = vec![ColumnMetadata::new("y", Purpose::Number, 1, 1, 1)];
        let file = File::create(path).unwrap();
        let mut writer = DatasetWriter::new(file, given_meta, expected_meta).unwrap();
        for i in 0..n {
            let given = vec![Tensor::full32(Shape::new(1, 1, 1), vec![i as f32])];
            let expected = vec![Tensor::full32(Shape::new(1, 1, 1), vec![(i * 2) as f32])];
            writer.write_row(&given, &expected).unwrap();
        }
    }

    #[test]
    fn next_record_walks_every_row_once_per_epoch() {
        let tmp = NamedTempFile::new().unwrap();
        build_dataset(tmp.path(), 5);
        let mut ds = Dataset::open(tmp.path()).unwrap();
        let mut seen = Vec::new();
        while let Some((given, _)) = ds.next_record().unwrap() {
            seen.push(given[0].get_value(0, 0, 0) as usize);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(ds.next_record().unwrap().is_none());
    }

    #[test]
    fn shuffle_then_reset_reorders_reads() {
        let tmp = NamedTempFile::new().unwrap();
        build_dataset(tmp.path(), 10);
        let mut ds = Dataset::open(tmp.path()).unwrap();
        ds.shuffle(3);
        ds.reset_cursor();
        let mut order = Vec::new();
        while let Some((given, _)) = ds.next_record().unwrap() {
            order.push(given[0].get_value(0, 0, 0) as usize);
        }
        assert_ne!(order, (0..10).collect::<Vec<_>>());
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }
}
