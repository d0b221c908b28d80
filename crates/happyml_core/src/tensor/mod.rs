//! The tensor algebra: a tagged-union `Tensor` handle over materialized
//! buffers and lazy views (spec §3/§4.B). Dynamic dispatch is done by
//! matching on the tag rather than through a trait object, per the design
//! note in spec §9 ("use tagged variants over inheritance").

pub mod materialized;
pub mod ops;
pub mod shape;
pub mod views;

pub use shape::Shape;

use crate::error::{HappyMlError, Result};
use materialized::{Full32, Half16, Identity, Pixel8, Quarter8, Random, Uniform};
use rayon::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use views::{BinaryOp, BinaryView, UnaryOp, UnaryView};

/// Below this many cells, parallel materialization isn't worth the rayon
/// dispatch overhead.
const PARALLEL_MATERIALIZE_THRESHOLD: usize = 4096;

enum TensorData {
    Full32(RefCell<Full32>),
    Half16(RefCell<Half16>),
    Quarter8(RefCell<Quarter8>),
    Pixel8(RefCell<Pixel8>),
    Uniform(Uniform),
    Random(Random),
    Identity(Identity),
    Unary(UnaryView),
    Binary(BinaryView),
}

/// A reference-counted handle to one tensor node. Cloning a `Tensor` is
/// cheap (an `Rc` bump); views hold their children by cloned `Tensor`.
#[derive(Clone)]
pub struct Tensor(Rc<TensorData>);

impl Tensor {
    pub fn full32(shape: Shape, data: Vec<f32>) -> Tensor {
        Tensor(Rc::new(TensorData::Full32(RefCell::new(Full32::new(
            shape, data,
        )))))
    }

    pub fn filled(shape: Shape, value: f32) -> Tensor {
        Tensor(Rc::new(TensorData::Full32(RefCell::new(Full32::filled(
            shape, value,
        )))))
    }

    pub fn half16(shape: Shape, values: &[f32]) -> Tensor {
        Tensor(Rc::new(TensorData::Half16(RefCell::new(Half16::from_f32(
            shape, values,
        )))))
    }

    pub fn quarter8(shape: Shape, values: &[f32], bias: u8) -> Tensor {
        Tensor(Rc::new(TensorData::Quarter8(RefCell::new(
            Quarter8::from_f32(shape, values, bias),
        ))))
    }

    pub fn quarter8_auto_bias(shape: Shape, values: &[f32]) -> Tensor {
        Tensor(Rc::new(TensorData::Quarter8(RefCell::new(
            Quarter8::from_f32_auto_bias(shape, values),
        ))))
    }

    pub fn pixel8(shape: Shape, values: &[f32]) -> Tensor {
        Tensor(Rc::new(TensorData::Pixel8(RefCell::new(Pixel8::from_f32(
            shape, values,
        )))))
    }

    pub fn uniform(shape: Shape, value: f32) -> Tensor {
        Tensor(Rc::new(TensorData::Uniform(Uniform { shape, value })))
    }

    pub fn random(shape: Shape, seed: u64) -> Tensor {
        Tensor(Rc::new(TensorData::Random(Random { shape, seed })))
    }

    pub fn identity(shape: Shape) -> Tensor {
        Tensor(Rc::new(TensorData::Identity(Identity { shape })))
    }

    pub fn shape(&self) -> Shape {
        match &*self.0 {
            TensorData::Full32(t) => t.borrow().shape,
            TensorData::Half16(t) => t.borrow().shape,
            TensorData::Quarter8(t) => t.borrow().shape,
            TensorData::Pixel8(t) => t.borrow().shape,
            TensorData::Uniform(t) => t.shape,
            TensorData::Random(t) => t.shape,
            TensorData::Identity(t) => t.shape,
            TensorData::Unary(v) => v.shape,
            TensorData::Binary(v) => v.shape,
        }
    }

    pub fn rows(&self) -> usize {
        self.shape().rows
    }

    pub fn columns(&self) -> usize {
        self.shape().columns
    }

    pub fn channels(&self) -> usize {
        self.shape().channels
    }

    pub fn is_materialized(&self) -> bool {
        !matches!(&*self.0, TensorData::Unary(_) | TensorData::Binary(_))
    }

    /// Whether a bulk read should fan out across rows (true) or columns
    /// (false); only meaningful for buffer-holding variants (spec §4.B).
    pub fn read_rows_in_parallel(&self) -> bool {
        match &*self.0 {
            TensorData::Full32(t) => t.borrow().read_rows_in_parallel,
            TensorData::Half16(t) => t.borrow().read_rows_in_parallel,
            TensorData::Quarter8(t) => t.borrow().read_rows_in_parallel,
            TensorData::Pixel8(t) => t.borrow().read_rows_in_parallel,
            _ => true,
        }
    }

    #[inline]
    pub fn get_value(&self, r: usize, c: usize, ch: usize) -> f32 {
        match &*self.0 {
            TensorData::Full32(t) => t.borrow().get(r, c, ch),
            TensorData::Half16(t) => t.borrow().get(r, c, ch),
            TensorData::Quarter8(t) => t.borrow().get(r, c, ch),
            TensorData::Pixel8(t) => t.borrow().get(r, c, ch),
            TensorData::Uniform(t) => t.get(r, c, ch),
            TensorData::Random(t) => t.get(r, c, ch),
            TensorData::Identity(t) => t.get(r, c, ch),
            TensorData::Unary(v) => v.get(r, c, ch),
            TensorData::Binary(v) => v.get(r, c, ch),
        }
    }

    /// Cycle check: does this tensor's expression transitively reference
    /// `other`? Used to guard `assign` against aliasing corruption
    /// (invariant iii).
    pub fn contains(&self, other: &Tensor) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match &*self.0 {
            TensorData::Unary(v) => v.child.contains(other),
            TensorData::Binary(v) => v.lhs.contains(other) || v.rhs.contains(other),
            _ => false,
        }
    }

    /// Copy this tensor's values into a dense `Full32` buffer. Returns
    /// `self` unchanged if it is already materialized.
    pub fn materialize(&self) -> Tensor {
        if self.is_materialized() {
            return self.clone();
        }
        let shape = self.shape();
        let mut buf = vec![0.0f32; shape.cell_count()];
        if buf.len() >= PARALLEL_MATERIALIZE_THRESHOLD {
            buf.par_iter_mut().enumerate().for_each(|(idx, slot)| {
                let (r, c, ch) = shape.decompose(idx);
                *slot = self.get_value(r, c, ch);
            });
        } else {
            for (idx, slot) in buf.iter_mut().enumerate() {
                let (r, c, ch) = shape.decompose(idx);
                *slot = self.get_value(r, c, ch);
            }
        }
        Tensor::full32(shape, buf)
    }

    /// Copy `source`'s values into this (materialized, buffer-holding)
    /// tensor in place. If `source` transitively references `self`, a dense
    /// temporary is materialized first to avoid reading from a buffer while
    /// writing into it (invariant iii).
    pub fn assign(&self, source: &Tensor) -> Result<()> {
        if source.shape().cell_count() != self.shape().cell_count() {
            return Err(HappyMlError::ShapeMismatch(format!(
                "assign: {} cells into {} cells",
                source.shape().cell_count(),
                self.shape().cell_count()
            )));
        }
        let safe_source = if source.contains(self) {
            source.materialize()
        } else {
            source.clone()
        };
        let shape = self.shape();
        match &*self.0 {
            TensorData::Full32(t) => {
                let mut t = t.borrow_mut();
                for idx in 0..shape.cell_count() {
                    let (r, c, ch) = shape.decompose(idx);
                    t.data[idx] = safe_source.get_value(r, c, ch);
                }
                Ok(())
            }
            TensorData::Half16(t) => {
                let mut t = t.borrow_mut();
                for idx in 0..shape.cell_count() {
                    let (r, c, ch) = shape.decompose(idx);
                    t.data[idx] = crate::floatcodec::to_half_bits(safe_source.get_value(r, c, ch));
                }
                Ok(())
            }
            TensorData::Quarter8(t) => {
                let mut t = t.borrow_mut();
                let bias = t.bias;
                for idx in 0..shape.cell_count() {
                    let (r, c, ch) = shape.decompose(idx);
                    t.data[idx] = crate::floatcodec::to_quarter(safe_source.get_value(r, c, ch), bias);
                }
                Ok(())
            }
            TensorData::Pixel8(t) => {
                let mut t = t.borrow_mut();
                for idx in 0..shape.cell_count() {
                    let (r, c, ch) = shape.decompose(idx);
                    let v = safe_source.get_value(r, c, ch).clamp(0.0, 1.0);
                    t.data[idx] = (v * 255.0).round() as u8;
                }
                Ok(())
            }
            _ => Err(HappyMlError::Configuration(
                "cannot assign into a non-buffer tensor".into(),
            )),
        }
    }

    // --- Unary view constructors ---

    fn unary(&self, op: UnaryOp, shape: Shape) -> Tensor {
        Tensor(Rc::new(TensorData::Unary(UnaryView {
            op,
            child: self.clone(),
            shape,
        })))
    }

    pub fn scale(&self, factor: f32) -> Tensor {
        self.unary(UnaryOp::Scale(factor), self.shape())
    }

    pub fn add_scalar(&self, s: f32) -> Tensor {
        self.unary(UnaryOp::AddScalar(s), self.shape())
    }

    pub fn subtract_scalar(&self, s: f32) -> Tensor {
        self.unary(UnaryOp::SubtractScalar(s), self.shape())
    }

    pub fn scalar_divide(&self, scalar: f32) -> Tensor {
        self.unary(UnaryOp::ScalarDivide(scalar), self.shape())
    }

    pub fn reshape(&self, new_shape: Shape) -> Result<Tensor> {
        if new_shape.cell_count() != self.shape().cell_count() {
            return Err(HappyMlError::ShapeMismatch(format!(
                "cannot reshape {:?} into {:?}",
                self.shape(),
                new_shape
            )));
        }
        Ok(self.unary(UnaryOp::Reshape, new_shape))
    }

    pub fn flatten_row(&self) -> Tensor {
        let s = self.shape();
        self.unary(
            UnaryOp::FlattenRow,
            Shape::new(1, s.rows * s.columns, s.channels),
        )
    }

    pub fn flatten_column(&self) -> Tensor {
        let s = self.shape();
        self.unary(
            UnaryOp::FlattenColumn,
            Shape::new(s.rows * s.columns, 1, s.channels),
        )
    }

    /// Flatten to `(1, rows*columns*channels, 1)`, the shape the
    /// fully-connected layer's `Flatten` layer produces (spec §4.E).
    pub fn flatten_all(&self) -> Tensor {
        let s = self.shape();
        self.unary(UnaryOp::Reshape, Shape::new(1, s.cell_count(), 1))
    }

    pub fn transpose(&self) -> Tensor {
        let s = self.shape();
        self.unary(UnaryOp::Transpose, Shape::new(s.columns, s.rows, s.channels))
    }

    pub fn diagonal(&self) -> Tensor {
        let s = self.shape();
        self.unary(
            UnaryOp::Diagonal,
            Shape::new(s.rows.min(s.columns), 1, s.channels),
        )
    }

    pub fn no_op(&self) -> Tensor {
        self.unary(UnaryOp::NoOp, self.shape())
    }

    pub fn power(&self, p: f32) -> Tensor {
        self.unary(UnaryOp::Power(p), self.shape())
    }

    pub fn log(&self) -> Tensor {
        self.unary(UnaryOp::Log, self.shape())
    }

    pub fn log2(&self) -> Tensor {
        self.unary(UnaryOp::Log2, self.shape())
    }

    pub fn exp(&self) -> Tensor {
        self.unary(UnaryOp::Exp, self.shape())
    }

    pub fn rotate180(&self) -> Tensor {
        self.unary(UnaryOp::Rotate180, self.shape())
    }

    pub fn round(&self) -> Tensor {
        self.unary(UnaryOp::Round, self.shape())
    }

    pub fn channel_extract(&self, channel: usize) -> Result<Tensor> {
        let s = self.shape();
        if channel >= s.channels {
            return Err(HappyMlError::ShapeMismatch(format!(
                "channel {channel} out of range for {s:?}"
            )));
        }
        Ok(self.unary(UnaryOp::ChannelExtract(channel), Shape::new(s.rows, s.columns, 1)))
    }

    pub fn channel_inject(&self, channel: usize, total_channels: usize) -> Result<Tensor> {
        let s = self.shape();
        if s.channels != 1 || channel >= total_channels {
            return Err(HappyMlError::ShapeMismatch(
                "channel_inject expects a single-channel source".into(),
            ));
        }
        Ok(self.unary(
            UnaryOp::ChannelInject { channel },
            Shape::new(s.rows, s.columns, total_channels),
        ))
    }

    pub fn zero_pad(&self, top: usize, bottom: usize, left: usize, right: usize) -> Tensor {
        let s = self.shape();
        self.unary(
            UnaryOp::ZeroPad { top, bottom, left, right },
            Shape::new(s.rows + top + bottom, s.columns + left + right, s.channels),
        )
    }

    pub fn normalize(&self, min: f32, max: f32) -> Tensor {
        self.unary(UnaryOp::Normalize { min, max }, self.shape())
    }

    pub fn denormalize(&self, min: f32, max: f32) -> Tensor {
        self.unary(UnaryOp::Denormalize { min, max }, self.shape())
    }

    pub fn standardize(&self, mean: f32, std_dev: f32) -> Tensor {
        self.unary(UnaryOp::Standardize { mean, std_dev }, self.shape())
    }

    pub fn unstandardize(&self, mean: f32, std_dev: f32) -> Tensor {
        self.unary(UnaryOp::Unstandardize { mean, std_dev }, self.shape())
    }

    pub fn standardize_derivative(&self, std_dev: f32) -> Tensor {
        self.unary(UnaryOp::StandardizeDerivative { std_dev }, self.shape())
    }

    pub fn value_transform(&self, f: Rc<dyn Fn(f32) -> f32>) -> Tensor {
        self.unary(UnaryOp::ValueTransform(f), self.shape())
    }

    pub fn sum_channels(&self) -> Tensor {
        let s = self.shape();
        self.unary(UnaryOp::SumChannels, Shape::new(s.rows, s.columns, 1))
    }

    pub fn window(&self, row_start: usize, row_len: usize, col_start: usize, col_len: usize) -> Result<Tensor> {
        let s = self.shape();
        if row_start + row_len > s.rows || col_start + col_len > s.columns {
            return Err(HappyMlError::ShapeMismatch(
                "window exceeds tensor bounds".into(),
            ));
        }
        Ok(self.unary(
            UnaryOp::Window { row_start, row_len, col_start, col_len },
            Shape::new(row_len, col_len, s.channels),
        ))
    }

    // --- Binary view constructors ---

    fn binary(&self, op: BinaryOp, rhs: &Tensor, shape: Shape) -> Tensor {
        Tensor(Rc::new(TensorData::Binary(BinaryView {
            op,
            lhs: self.clone(),
            rhs: rhs.clone(),
            shape,
        })))
    }

    fn elementwise_shape(&self, rhs: &Tensor) -> Result<Shape> {
        let a = self.shape();
        let b = rhs.shape();
        let dim = |x: usize, y: usize, name: &str| -> Result<usize> {
            if x == y || x == 1 || y == 1 {
                Ok(x.max(y))
            } else {
                Err(HappyMlError::ShapeMismatch(format!(
                    "{name} mismatch: {x} vs {y}"
                )))
            }
        };
        Ok(Shape::new(
            dim(a.rows, b.rows, "rows")?,
            dim(a.columns, b.columns, "columns")?,
            dim(a.channels, b.channels, "channels")?,
        ))
    }

    pub fn add(&self, rhs: &Tensor) -> Result<Tensor> {
        let shape = self.elementwise_shape(rhs)?;
        Ok(self.binary(BinaryOp::Add, rhs, shape))
    }

    pub fn subtract(&self, rhs: &Tensor) -> Result<Tensor> {
        let shape = self.elementwise_shape(rhs)?;
        Ok(self.binary(BinaryOp::Subtract, rhs, shape))
    }

    pub fn multiply(&self, rhs: &Tensor) -> Result<Tensor> {
        let shape = self.elementwise_shape(rhs)?;
        Ok(self.binary(BinaryOp::Multiply, rhs, shape))
    }

    pub fn matmul(&self, rhs: &Tensor) -> Result<Tensor> {
        let a = self.shape();
        let b = rhs.shape();
        if a.columns != b.rows {
            return Err(HappyMlError::ShapeMismatch(format!(
                "matmul inner dimension mismatch: {} vs {}",
                a.columns, b.rows
            )));
        }
        if a.channels != b.channels && a.channels != 1 && b.channels != 1 {
            return Err(HappyMlError::ShapeMismatch(format!(
                "matmul channel mismatch: {} vs {}",
                a.channels, b.channels
            )));
        }
        let shape = Shape::new(a.rows, b.columns, a.channels.max(b.channels));
        Ok(self.binary(BinaryOp::MatMul, rhs, shape))
    }

    pub fn outer_product(&self, rhs: &Tensor) -> Result<Tensor> {
        let a = self.shape();
        let b = rhs.shape();
        if a.columns != 1 || b.rows != 1 || a.channels != b.channels {
            return Err(HappyMlError::ShapeMismatch(
                "outer_product expects a column vector and a row vector on matching channels".into(),
            ));
        }
        let shape = Shape::new(a.rows, b.columns, a.channels);
        Ok(self.binary(BinaryOp::OuterProduct, rhs, shape))
    }

    pub fn concat_wide(&self, rhs: &Tensor) -> Result<Tensor> {
        let a = self.shape();
        let b = rhs.shape();
        if a.rows != b.rows || a.channels != b.channels {
            return Err(HappyMlError::ShapeMismatch(
                "concat_wide requires matching rows and channels".into(),
            ));
        }
        let shape = Shape::new(a.rows, a.columns + b.columns, a.channels);
        Ok(self.binary(BinaryOp::ConcatWide, rhs, shape))
    }

    pub fn valid_cross_correlation_2d(&self, kernel: &Tensor) -> Result<Tensor> {
        let shape = views::valid_cross_correlation_output_shape(self.shape(), kernel.shape())?;
        Ok(self.binary(BinaryOp::ValidCrossCorrelation2d, kernel, shape))
    }

    pub fn full_cross_correlation_2d(&self, kernel: &Tensor) -> Tensor {
        let shape = views::full_cross_correlation_output_shape(self.shape(), kernel.shape());
        self.binary(BinaryOp::FullCrossCorrelation2d, kernel, shape)
    }

    /// True (full, zero-padded) convolution. Callers that need the
    /// mathematical flip apply [`Tensor::rotate180`] to the kernel first —
    /// see the conv layer's backward pass (spec §4.E).
    pub fn convolve_2d(&self, kernel: &Tensor) -> Tensor {
        let shape = views::full_cross_correlation_output_shape(self.shape(), kernel.shape());
        self.binary(BinaryOp::Convolve2d, kernel, shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_value_is_pure_and_idempotent() {
        let t = Tensor::full32(Shape::new(2, 2, 1), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(t.get_value(0, 1, 0), 2.0);
        assert_eq!(t.get_value(0, 1, 0), 2.0);
    }

    #[test]
    fn scale_view_is_lazy_and_reads_through() {
        let t = Tensor::full32(Shape::new(1, 3, 1), vec![1.0, 2.0, 3.0]);
        let scaled = t.scale(2.0);
        assert!(!scaled.is_materialized());
        assert_eq!(scaled.get_value(0, 1, 0), 4.0);
    }

    #[test]
    fn materialize_matches_lazy_reads() {
        let a = Tensor::full32(Shape::new(2, 2, 1), vec![1.0, 2.0, 3.0, 4.0]);
        let b = Tensor::full32(Shape::new(2, 2, 1), vec![5.0, 6.0, 7.0, 8.0]);
        let view = a.add(&b).unwrap();
        let dense = view.materialize();
        assert!(dense.is_materialized());
        for idx in 0..4 {
            let (r, c, ch) = view.shape().decompose(idx);
            assert_eq!(view.get_value(r, c, ch), dense.get_value(r, c, ch));
        }
    }

    #[test]
    fn contains_detects_self_reference() {
        let a = Tensor::full32(Shape::new(1, 2, 1), vec![1.0, 2.0]);
        let b = a.scale(2.0);
        assert!(b.contains(&a));
        let other = Tensor::full32(Shape::new(1, 2, 1), vec![3.0, 4.0]);
        assert!(!b.contains(&other));
    }

    #[test]
    fn assign_materializes_aliasing_source_first() {
        let a = Tensor::full32(Shape::new(1, 3, 1), vec![1.0, 2.0, 3.0]);
        let shifted = a.scale(2.0); // contains(a) == true
        a.assign(&shifted).unwrap();
        assert_eq!(a.get_value(0, 0, 0), 2.0);
        assert_eq!(a.get_value(0, 1, 0), 4.0);
        assert_eq!(a.get_value(0, 2, 0), 6.0);
    }

    #[test]
    fn matmul_shapes_and_values() {
        let a = Tensor::full32(Shape::new(2, 2, 1), vec![1.0, 2.0, 3.0, 4.0]);
        let b = Tensor::identity(Shape::new(2, 2, 1));
        let out = a.matmul(&b).unwrap().materialize();
        assert_eq!(out.get_value(0, 0, 0), 1.0);
        assert_eq!(out.get_value(1, 1, 0), 4.0);
    }

    #[test]
    fn valid_conv_output_shape() {
        let input = Tensor::uniform(Shape::new(10, 10, 1), 1.0);
        let kernel = Tensor::uniform(Shape::new(3, 3, 1), 1.0);
        let out = input.valid_cross_correlation_2d(&kernel).unwrap();
        assert_eq!(out.shape(), Shape::new(8, 8, 1));
    }

    #[test]
    fn pixel8_clamps_on_write() {
        let t = Tensor::pixel8(Shape::new(1, 2, 1), &[-1.0, 2.0]);
        assert_eq!(t.get_value(0, 0, 0), 0.0);
        assert_eq!(t.get_value(0, 1, 0), 1.0);
    }

    #[test]
    fn random_is_deterministic() {
        let t = Tensor::random(Shape::new(4, 4, 1), 42);
        let v1 = t.get_value(2, 3, 0);
        let v2 = t.get_value(2, 3, 0);
        assert_eq!(v1, v2);
        let other_seed = Tensor::random(Shape::new(4, 4, 1), 43);
        assert_ne!(v1, other_seed.get_value(2, 3, 0));
    }
}
