//! Lazy, non-materialized tensor views (spec §3). Views borrow their
//! children by `Tensor` (an `Rc` handle) and recompute `get_value` on every
//! read; [`super::Tensor::materialize`] copies a view into a dense buffer to
//! bound view-tree depth (spec §4.B).

use super::shape::Shape;
use super::Tensor;
use crate::error::{HappyMlError, Result};
use std::rc::Rc;

#[derive(Clone)]
pub enum UnaryOp {
    Scale(f32),
    AddScalar(f32),
    SubtractScalar(f32),
    Reshape,
    FlattenRow,
    FlattenColumn,
    Transpose,
    Diagonal,
    NoOp,
    Power(f32),
    Log,
    Log2,
    Exp,
    Rotate180,
    Round,
    ChannelExtract(usize),
    ChannelInject { channel: usize },
    ZeroPad { top: usize, bottom: usize, left: usize, right: usize },
    Normalize { min: f32, max: f32 },
    Denormalize { min: f32, max: f32 },
    Standardize { mean: f32, std_dev: f32 },
    /// Inverse of `Standardize`: `x * std_dev + mean`. Named
    /// `UnstandardizeStandardize` in the source spec's view list; resolved
    /// in DESIGN.md as plain unstandardize (decoders compose it with
    /// `Denormalize` to invert the dataset-time normalize+standardize pass).
    Unstandardize { mean: f32, std_dev: f32 },
    StandardizeDerivative { std_dev: f32 },
    ValueTransform(Rc<dyn Fn(f32) -> f32>),
    SumChannels,
    Window { row_start: usize, row_len: usize, col_start: usize, col_len: usize },
    ScalarDivide(f32),
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    MatMul,
    OuterProduct,
    ConcatWide,
    ValidCrossCorrelation2d,
    FullCrossCorrelation2d,
    Convolve2d,
}

pub struct UnaryView {
    pub op: UnaryOp,
    pub child: Tensor,
    pub shape: Shape,
}

pub struct BinaryView {
    pub op: BinaryOp,
    pub lhs: Tensor,
    pub rhs: Tensor,
    pub shape: Shape,
}

impl UnaryView {
    #[inline]
    pub fn get(&self, r: usize, c: usize, ch: usize) -> f32 {
        let child = &self.child;
        match &self.op {
            UnaryOp::Scale(f) => child.get_value(r, c, ch) * f,
            UnaryOp::AddScalar(s) => child.get_value(r, c, ch) + s,
            UnaryOp::SubtractScalar(s) => child.get_value(r, c, ch) - s,
            UnaryOp::Reshape => reshape_get(child, self.shape, r, c, ch),
            UnaryOp::FlattenRow => {
                // (rows, cols, channels) -> (1, rows*cols, channels): row axis folded into columns.
                let child_shape = child.shape();
                let row = c / child_shape.columns;
                let col = c % child_shape.columns;
                child.get_value(row, col, ch)
            }
            UnaryOp::FlattenColumn => {
                // (rows, cols, channels) -> (rows*cols, 1, channels): column axis folded into rows.
                let child_shape = child.shape();
                let row = r / child_shape.columns;
                let col = r % child_shape.columns;
                child.get_value(row, col, ch)
            }
            UnaryOp::Transpose => child.get_value(c, r, ch),
            UnaryOp::Diagonal => child.get_value(r, r, ch),
            UnaryOp::NoOp => child.get_value(r, c, ch),
            UnaryOp::Power(p) => child.get_value(r, c, ch).powf(*p),
            UnaryOp::Log => child.get_value(r, c, ch).ln(),
            UnaryOp::Log2 => child.get_value(r, c, ch).log2(),
            UnaryOp::Exp => child.get_value(r, c, ch).exp(),
            UnaryOp::Rotate180 => {
                let child_shape = child.shape();
                child.get_value(child_shape.rows - 1 - r, child_shape.columns - 1 - c, ch)
            }
            UnaryOp::Round => child.get_value(r, c, ch).round(),
            UnaryOp::ChannelExtract(idx) => child.get_value(r, c, *idx),
            UnaryOp::ChannelInject { channel } => {
                if ch == *channel {
                    child.get_value(r, c, 0)
                } else {
                    0.0
                }
            }
            UnaryOp::ZeroPad { top, left, .. } => {
                let child_shape = child.shape();
                if r < *top || c < *left {
                    return 0.0;
                }
                let (cr, cc) = (r - top, c - left);
                if cr >= child_shape.rows || cc >= child_shape.columns {
                    0.0
                } else {
                    child.get_value(cr, cc, ch)
                }
            }
            UnaryOp::Normalize { min, max } => {
                let span = (max - min).max(f32::EPSILON);
                (child.get_value(r, c, ch) - min) / span
            }
            UnaryOp::Denormalize { min, max } => {
                child.get_value(r, c, ch) * (max - min) + min
            }
            UnaryOp::Standardize { mean, std_dev } => {
                (child.get_value(r, c, ch) - mean) / std_dev.max(f32::EPSILON)
            }
            UnaryOp::Unstandardize { mean, std_dev } => {
                child.get_value(r, c, ch) * std_dev + mean
            }
            UnaryOp::StandardizeDerivative { std_dev } => 1.0 / std_dev.max(f32::EPSILON),
            UnaryOp::ValueTransform(f) => f(child.get_value(r, c, ch)),
            UnaryOp::SumChannels => {
                let child_shape = child.shape();
                (0..child_shape.channels)
                    .map(|ch2| child.get_value(r, c, ch2))
                    .sum()
            }
            UnaryOp::Window { row_start, col_start, .. } => {
                child.get_value(row_start + r, col_start + c, ch)
            }
            UnaryOp::ScalarDivide(scalar) => scalar / child.get_value(r, c, ch),
        }
    }
}

fn reshape_get(child: &Tensor, new_shape: Shape, r: usize, c: usize, ch: usize) -> f32 {
    let flat = new_shape.index(r, c, ch);
    let child_shape = child.shape();
    let plane = child_shape.rows * child_shape.columns;
    let cch = flat / plane;
    let rem = flat % plane;
    let cr = rem / child_shape.columns;
    let cc = rem % child_shape.columns;
    child.get_value(cr, cc, cch)
}

impl BinaryView {
    #[inline]
    pub fn get(&self, r: usize, c: usize, ch: usize) -> f32 {
        match self.op {
            BinaryOp::Add => self.elementwise(r, c, ch, |a, b| a + b),
            BinaryOp::Subtract => self.elementwise(r, c, ch, |a, b| a - b),
            BinaryOp::Multiply => self.elementwise(r, c, ch, |a, b| a * b),
            BinaryOp::MatMul => {
                let inner = self.lhs.shape().columns;
                let lhs_ch = if self.lhs.shape().channels == 1 { 0 } else { ch };
                let rhs_ch = if self.rhs.shape().channels == 1 { 0 } else { ch };
                let mut acc = 0.0f32;
                for k in 0..inner {
                    acc += self.lhs.get_value(r, k, lhs_ch) * self.rhs.get_value(k, c, rhs_ch);
                }
                acc
            }
            BinaryOp::OuterProduct => {
                self.lhs.get_value(r, 0, ch) * self.rhs.get_value(0, c, ch)
            }
            BinaryOp::ConcatWide => {
                let lhs_cols = self.lhs.shape().columns;
                if c < lhs_cols {
                    self.lhs.get_value(r, c, ch)
                } else {
                    self.rhs.get_value(r, c - lhs_cols, ch)
                }
            }
            BinaryOp::ValidCrossCorrelation2d => cross_correlate(&self.lhs, &self.rhs, r, c, ch, false),
            BinaryOp::FullCrossCorrelation2d => cross_correlate(&self.lhs, &self.rhs, r, c, ch, true),
            BinaryOp::Convolve2d => cross_correlate(&self.lhs, &self.rhs, r, c, ch, true),
        }
    }

    #[inline]
    fn elementwise(&self, r: usize, c: usize, ch: usize, f: impl Fn(f32, f32) -> f32) -> f32 {
        let ls = self.lhs.shape();
        let rs = self.rhs.shape();
        let lr = if ls.rows == 1 { 0 } else { r };
        let lc = if ls.columns == 1 { 0 } else { c };
        let lch = if ls.channels == 1 { 0 } else { ch };
        let rr = if rs.rows == 1 { 0 } else { r };
        let rc = if rs.columns == 1 { 0 } else { c };
        let rch = if rs.channels == 1 { 0 } else { ch };
        f(self.lhs.get_value(lr, lc, lch), self.rhs.get_value(rr, rc, rch))
    }
}

/// Cross-correlation of `input` (rows, cols, 1) against `kernel` (k, k,
/// filters), producing one output channel per filter. `full` zero-pads the
/// input by `k-1` on each side (spec's `FullCrossCorrelation2d`/backward
/// input-grad path); otherwise the "valid" (unpadded) variant is used.
fn cross_correlate(input: &Tensor, kernel: &Tensor, r: usize, c: usize, filter: usize, full: bool) -> f32 {
    let in_shape = input.shape();
    let k_shape = kernel.shape();
    let k = k_shape.rows;
    let offset = if full { k as isize - 1 } else { 0 };
    let mut acc = 0.0f32;
    for ki in 0..k {
        for kj in 0..k_shape.columns {
            let ir = r as isize - offset + ki as isize;
            let ic = c as isize - offset + kj as isize;
            if ir < 0 || ic < 0 || ir as usize >= in_shape.rows || ic as usize >= in_shape.columns {
                continue;
            }
            acc += input.get_value(ir as usize, ic as usize, 0) * kernel.get_value(ki, kj, filter);
        }
    }
    acc
}

pub fn valid_cross_correlation_output_shape(input: Shape, kernel: Shape) -> Result<Shape> {
    if input.channels != 1 {
        return Err(HappyMlError::ShapeMismatch(format!(
            "ValidCrossCorrelation2d expects a single input channel, got {}",
            input.channels
        )));
    }
    if kernel.rows != kernel.columns {
        return Err(HappyMlError::ShapeMismatch(
            "convolution kernels must be square".into(),
        ));
    }
    if input.rows < kernel.rows || input.columns < kernel.columns {
        return Err(HappyMlError::ShapeMismatch(
            "kernel larger than input for valid cross-correlation".into(),
        ));
    }
    Ok(Shape::new(
        input.rows - kernel.rows + 1,
        input.columns - kernel.columns + 1,
        kernel.channels,
    ))
}

pub fn full_cross_correlation_output_shape(input: Shape, kernel: Shape) -> Shape {
    Shape::new(
        input.rows + kernel.rows - 1,
        input.columns + kernel.columns - 1,
        kernel.channels,
    )
}
