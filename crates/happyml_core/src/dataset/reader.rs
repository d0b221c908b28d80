//! Random-access raw binary dataset reader. Opens the file with
//! `memmap2::Mmap` the way `bit_llama::loader::BitLoader` keeps a `File`
//! alive alongside its map, so `read_row(i)` seeks by pointer arithmetic
//! rather than through a `BufReader`.

use crate::dataset::column::{ColumnMetadata, Purpose};
use crate::error::{HappyMlError, Result};
use crate::tensor::{Shape, Tensor};
use byteorder::{BigEndian, ReadBytesExt};
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

pub struct DatasetReader {
    _file: File,
    mmap: Mmap,
    pub given_columns: Vec<ColumnMetadata>,
    pub expected_columns: Vec<ColumnMetadata>,
    header_size: usize,
    row_size: usize,
}

impl DatasetReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let mut cursor = Cursor::new(&mmap[..]);
        let given_count = cursor.read_u64::<BigEndian>()?;
        let mut given_columns = Vec::with_capacity(given_count as usize);
        for _ in 0..given_count {
            given_columns.push(ColumnMetadata::read(&mut cursor)?);
        }
        let expected_count = cursor.read_u64::<BigEndian>()?;
        let mut expected_columns = Vec::with_capacity(expected_count as usize);
        for _ in 0..expected_count {
            expected_columns.push(ColumnMetadata::read(&mut cursor)?);
        }
        let header_size = cursor.position() as usize;
        let row_size: usize = given_columns
            .iter()
            .chain(expected_columns.iter())
            .map(|c| c.cell_count() * 4)
            .sum();

        Ok(Self {
            _file: file,
            mmap,
            given_columns,
            expected_columns,
            header_size,
            row_size,
        })
    }

    pub fn row_count(&self) -> usize {
        if self.row_size == 0 {
            return 0;
        }
        (self.mmap.len() - self.header_size) / self.row_size
    }

    pub fn read_row(&self, index: usize) -> Result<(Vec<Tensor>, Vec<Tensor>)> {
        if index >= self.row_count() {
            return Err(HappyMlError::Dataset(format!(
                "row {index} out of range (dataset has {} rows)",
                self.row_count()
            )));
        }
        let start = self.header_size + index * self.row_size;
        let mut cursor = Cursor::new(&self.mmap[start..start + self.row_size]);

        let givens = self
            .given_columns
            .iter()
            .map(|meta| read_column_tensor(&mut cursor, meta))
            .collect::<Result<Vec<_>>>()?;
        let expecteds = self
            .expected_columns
            .iter()
            .map(|meta| read_column_tensor(&mut cursor, meta))
            .collect::<Result<Vec<_>>>()?;
        Ok((givens, expecteds))
    }
}

fn read_column_tensor(cursor: &mut Cursor<&[u8]>, meta: &ColumnMetadata) -> Result<Tensor> {
    let shape = Shape::new(meta.rows, meta.columns, meta.channels);
    let mut values = vec![0.0f32; shape.cell_count()];
    for slot in values.iter_mut() {
        *slot = cursor.read_f32::<BigEndian>()?;
    }
    Ok(match meta.purpose {
        Purpose::Image => Tensor::pixel8(shape, &values),
        Purpose::Label => Tensor::quarter8(shape, &values, 4),
        Purpose::Number | Purpose::Text => Tensor::full32(shape, values),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::writer::DatasetWriter;
    use tempfile::NamedTempFile;

    #[test]
    fn reader_reconstructs_rows_written_by_writer() {
        let tmp = NamedTempFile::new().unwrap();
        let given_meta = vec![ColumnMetadata::new("x", Purpose::Number, 1, 2, 1)];
        let expected_meta = vec![ColumnMetadata::new("y", Purpose::Label, 1, 2, 1)];

        {
            let file = File::create(tmp.path()).unwrap();
            let mut writer = DatasetWriter::new(file, given_meta.clone(), expected_meta.clone()).unwrap();
            let given = vec![Tensor::full32(Shape::new(1, 2, 1), vec![0.5, 1.5])];
            let expected = vec![Tensor::full32(Shape::new(1, 2, 1), vec![1.0, 0.0])];
            writer.write_row(&given, &expected).unwrap();
        }

        let reader = DatasetReader::open(tmp.path()).unwrap();
        assert_eq!(reader.row_count(), 1);
        let (givens, expecteds) = reader.read_row(0).unwrap();
        assert_eq!(givens[0].get_value(0, 0, 0), 0.5);
        assert_eq!(givens[0].get_value(0, 1, 0), 1.5);
        assert_eq!(expecteds[0].get_value(0, 0, 0), 1.0);
    }
}
