//! Column metadata: one record per tensor column group in a dataset row
//! (spec §3/§4.C).

use crate::error::{HappyMlError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Image,
    Text,
    Number,
    Label,
}

impl Purpose {
    fn to_tag(self) -> u8 {
        match self {
            Purpose::Image => b'I',
            Purpose::Text => b'T',
            Purpose::Number => b'N',
            Purpose::Label => b'L',
        }
    }

    fn from_tag(tag: u8) -> Result<Purpose> {
        match tag {
            b'I' => Ok(Purpose::Image),
            b'T' => Ok(Purpose::Text),
            b'N' => Ok(Purpose::Number),
            b'L' => Ok(Purpose::Label),
            other => Err(HappyMlError::Dataset(format!(
                "unrecognized column purpose tag '{}'",
                other as char
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    pub purpose: Purpose,
    pub is_normalized: bool,
    pub is_standardized: bool,
    pub mean: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
    pub rows: usize,
    pub columns: usize,
    pub channels: usize,
    pub source_column_count: usize,
    pub ordered_labels: Vec<String>,
    pub name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, purpose: Purpose, rows: usize, columns: usize, channels: usize) -> Self {
        Self {
            purpose,
            is_normalized: false,
            is_standardized: false,
            mean: 0.0,
            std_dev: 1.0,
            min: 0.0,
            max: 1.0,
            rows,
            columns,
            channels,
            source_column_count: 1,
            ordered_labels: Vec::new(),
            name: name.into(),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.columns * self.channels
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u8(self.purpose.to_tag())?;
        w.write_u8(self.is_standardized as u8)?;
        w.write_f32::<BigEndian>(self.mean)?;
        w.write_f32::<BigEndian>(self.std_dev)?;
        w.write_u8(self.is_normalized as u8)?;
        w.write_f32::<BigEndian>(self.min)?;
        w.write_f32::<BigEndian>(self.max)?;
        w.write_u64::<BigEndian>(self.source_column_count as u64)?;
        w.write_u64::<BigEndian>(self.rows as u64)?;
        w.write_u64::<BigEndian>(self.columns as u64)?;
        w.write_u64::<BigEndian>(self.channels as u64)?;
        w.write_u32::<BigEndian>(self.ordered_labels.len() as u32)?;
        for label in &self.ordered_labels {
            write_string(w, label)?;
        }
        write_string(w, &self.name)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let purpose = Purpose::from_tag(r.read_u8()?)?;
        let is_standardized = r.read_u8()? != 0;
        let mean = r.read_f32::<BigEndian>()?;
        let std_dev = r.read_f32::<BigEndian>()?;
        let is_normalized = r.read_u8()? != 0;
        let min = r.read_f32::<BigEndian>()?;
        let max = r.read_f32::<BigEndian>()?;
        let source_column_count = r.read_u64::<BigEndian>()? as usize;
        let rows = r.read_u64::<BigEndian>()? as usize;
        let columns = r.read_u64::<BigEndian>()? as usize;
        let channels = r.read_u64::<BigEndian>()? as usize;
        let label_count = r.read_u32::<BigEndian>()?;
        let mut ordered_labels = Vec::with_capacity(label_count as usize);
        for _ in 0..label_count {
            ordered_labels.push(read_string(r)?);
        }
        let name = read_string(r)?;
        Ok(ColumnMetadata {
            purpose,
            is_normalized,
            is_standardized,
            mean,
            std_dev,
            min,
            max,
            rows,
            columns,
            channels,
            source_column_count,
            ordered_labels,
            name,
        })
    }
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    w.write_u32::<BigEndian>(bytes.len() as u32)?;
    w.write_all(bytes)?;
    Ok(())
}

fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u32::<BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| HappyMlError::Dataset(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_metadata_round_trips() {
        let mut meta = ColumnMetadata::new("digit", Purpose::Label, 1, 10, 1);
        meta.ordered_labels = vec!["0".into(), "1".into(), "2".into()];
        meta.is_normalized = true;

        let mut buf = Vec::new();
        meta.write(&mut buf).unwrap();
        let back = ColumnMetadata::read(&mut &buf[..]).unwrap();

        assert_eq!(back.name, "digit");
        assert_eq!(back.ordered_labels, meta.ordered_labels);
        assert_eq!(back.purpose, Purpose::Label);
        assert!(back.is_normalized);
    }
}
