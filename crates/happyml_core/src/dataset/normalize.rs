//! Two-pass normalize/standardize rewrite over a raw binary dataset
//! (spec §4.C): first pass accumulates running mean/variance (Welford) and
//! min/max per `Number` column; second pass rewrites those columns as
//! `normalize(standardize(x))` and copies every other column through.

use crate::dataset::column::{ColumnMetadata, Purpose};
use crate::dataset::reader::DatasetReader;
use crate::dataset::writer::DatasetWriter;
use crate::error::Result;
use std::io::Write;

#[derive(Default, Clone, Copy)]
struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
    min: f32,
    max: f32,
}

impl Welford {
    fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }

    fn push(&mut self, x: f32) {
        self.count += 1;
        let delta = x as f64 - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x as f64 - self.mean;
        self.m2 += delta * delta2;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    fn std_dev(&self) -> f32 {
        if self.count < 2 {
            return 0.0;
        }
        ((self.m2 / self.count as f64).sqrt()) as f32
    }
}

/// Run the two-pass rewrite, writing a normalized dataset to `sink`.
pub fn normalize_dataset<W: Write>(reader: &DatasetReader, sink: W) -> Result<DatasetWriter<W>> {
    let mut given_stats: Vec<Option<Welford>> = reader
        .given_columns
        .iter()
        .map(|c| if c.purpose == Purpose::Number { Some(Welford::new()) } else { None })
        .collect();
    let mut expected_stats: Vec<Option<Welford>> = reader
        .expected_columns
        .iter()
        .map(|c| if c.purpose == Purpose::Number { Some(Welford::new()) } else { None })
        .collect();

    for i in 0..reader.row_count() {
        let (givens, expecteds) = reader.read_row(i)?;
        accumulate(&givens, &mut given_stats);
        accumulate(&expecteds, &mut expected_stats);
    }

    let new_given = rewrite_metadata(&reader.given_columns, &given_stats);
    let new_expected = rewrite_metadata(&reader.expected_columns, &expected_stats);

    let mut writer = DatasetWriter::new(sink, new_given.clone(), new_expected.clone())?;

    for i in 0..reader.row_count() {
        let (givens, expecteds) = reader.read_row(i)?;
        let norm_givens = rewrite_row(&givens, &new_given);
        let norm_expecteds = rewrite_row(&expecteds, &new_expected);
        writer.write_row(&norm_givens, &norm_expecteds)?;
    }

    Ok(writer)
}

fn accumulate(tensors: &[crate::tensor::Tensor], stats: &mut [Option<Welford>]) {
    for (t, stat) in tensors.iter().zip(stats.iter_mut()) {
        if let Some(w) = stat {
            let shape = t.shape();
            for idx in 0..shape.cell_count() {
                let (r, c, ch) = shape.decompose(idx);
                w.push(t.get_value(r, c, ch));
            }
        }
    }
}

fn rewrite_metadata(columns: &[ColumnMetadata], stats: &[Option<Welford>]) -> Vec<ColumnMetadata> {
    columns
        .iter()
        .zip(stats)
        .map(|(col, stat)| {
            let mut col = col.clone();
            if let Some(w) = stat {
                let std_dev = w.std_dev();
                col.mean = w.mean as f32;
                col.std_dev = std_dev;
                col.min = w.min;
                col.max = w.max;
                col.is_standardized = std_dev > 1.0;
                col.is_normalized = true;
            }
            col
        })
        .collect()
}

fn rewrite_row(tensors: &[crate::tensor::Tensor], new_meta: &[ColumnMetadata]) -> Vec<crate::tensor::Tensor> {
    tensors
        .iter()
        .zip(new_meta)
        .map(|(t, meta)| {
            if meta.purpose != Purpose::Number {
                return t.clone();
            }
            let std_dev = if meta.is_standardized { meta.std_dev } else { 1.0 };
            let standardized = t.standardize(meta.mean, std_dev);
            standardized.normalize(meta.min, meta.max).materialize()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::column::ColumnMetadata;
    use crate::dataset::writer::DatasetWriter;
    use crate::tensor::{Shape, Tensor};
    use std::fs::File;
    use tempfile::NamedTempFile;

    #[test]
    fn normalize_maps_values_into_unit_range() {
        let raw = NamedTempFile::new().unwrap();
        let given_meta = vec![ColumnMetadata::new("x", Purpose::Number, 1, 1, 1)];
        let expected_meta = vec![ColumnMetadata::new("y", Purpose::Number, 1, 1, 1)];
        {
            let file = File::create(raw.path()).unwrap();
            let mut writer = DatasetWriter::new(file, given_meta, expected_meta).unwrap();
            for v in [0.0, 10.0, 20.0] {
                let given = vec![Tensor::full32(Shape::new(1, 1, 1), vec![v])];
                let expected = vec![Tensor::full32(Shape::new(1, 1, 1), vec![v])];
                writer.write_row(&given, &expected).unwrap();
            }
        }

        let reader = DatasetReader::open(raw.path()).unwrap();
        let normalized = NamedTempFile::new().unwrap();
        let sink = File::create(normalized.path()).unwrap();
        let writer = normalize_dataset(&reader, sink).unwrap();
        assert_eq!(writer.rows_written(), 3);
        drop(writer);

        let reread = DatasetReader::open(normalized.path()).unwrap();
        let (first_given, _) = reread.read_row(0).unwrap();
        let (last_given, _) = reread.read_row(2).unwrap();
        assert!((first_given[0].get_value(0, 0, 0) - 0.0).abs() < 1e-4);
        assert!((last_given[0].get_value(0, 0, 0) - 1.0).abs() < 1e-4);
    }
}
