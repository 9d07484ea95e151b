/*!
Dense rank-2 `f32` arrays and the handful of operations the network and agent need: matmul,
elementwise arithmetic, broadcasting, softmax, `tanh`, `relu`, `linear`, and row-wise reductions.
This is the crate's only array type; no general linear-algebra crate is pulled in for it.
*/

pub mod rng;

use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};

/// Row-major dense matrix of `f32`. A row vector has `rows == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor2 {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Tensor2 {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.; rows * cols] }
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> WheellyResult<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != n_cols) {
            return Err(WheellyError::new(
                WheellyErrorKind::NetworkShapeMismatch,
                "ragged rows passed to Tensor2::from_rows",
            ));
        }
        Ok(Self { rows: n_rows, cols: n_cols, data: rows.into_iter().flatten().collect() })
    }

    pub fn row_vector(values: &[f32]) -> Self {
        Self { rows: 1, cols: values.len(), data: values.to_vec() }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    fn check_same_shape(&self, other: &Tensor2, op: &str) -> WheellyResult<()> {
        if self.shape() != other.shape() {
            return Err(WheellyError::new(
                WheellyErrorKind::NetworkShapeMismatch,
                format!("{op}: shape mismatch {:?} vs {:?}", self.shape(), other.shape()),
            ));
        }
        Ok(())
    }

    pub fn add(&self, other: &Tensor2) -> WheellyResult<Tensor2> {
        self.check_same_shape(other, "add")?;
        Ok(Tensor2 {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a + b).collect(),
        })
    }

    pub fn sub(&self, other: &Tensor2) -> WheellyResult<Tensor2> {
        self.check_same_shape(other, "sub")?;
        Ok(Tensor2 {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a - b).collect(),
        })
    }

    pub fn mul_elementwise(&self, other: &Tensor2) -> WheellyResult<Tensor2> {
        self.check_same_shape(other, "mul")?;
        Ok(Tensor2 {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a * b).collect(),
        })
    }

    pub fn div_elementwise(&self, other: &Tensor2) -> WheellyResult<Tensor2> {
        self.check_same_shape(other, "div")?;
        Ok(Tensor2 {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a / b).collect(),
        })
    }

    pub fn scale(&self, factor: f32) -> Tensor2 {
        Tensor2 { rows: self.rows, cols: self.cols, data: self.data.iter().map(|v| v * factor).collect() }
    }

    pub fn add_scalar(&self, value: f32) -> Tensor2 {
        Tensor2 { rows: self.rows, cols: self.cols, data: self.data.iter().map(|v| v + value).collect() }
    }

    /// `y = x * W + b`, broadcasting the bias row over every row of `x * W`.
    pub fn matmul(&self, other: &Tensor2) -> WheellyResult<Tensor2> {
        if self.cols != other.rows {
            return Err(WheellyError::new(
                WheellyErrorKind::NetworkShapeMismatch,
                format!("matmul: {:?} * {:?}", self.shape(), other.shape()),
            ));
        }
        let mut out = Tensor2::zeros(self.rows, other.cols);
        for r in 0..self.rows {
            for c in 0..other.cols {
                let mut acc = 0.;
                for k in 0..self.cols {
                    acc += self.get(r, k) * other.get(k, c);
                }
                out.set(r, c, acc);
            }
        }
        Ok(out)
    }

    /// Transpose, used by dense-layer backprop (`dx = dy * W^T`).
    pub fn transpose(&self) -> Tensor2 {
        let mut out = Tensor2::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c));
            }
        }
        out
    }

    /// Broadcast-add a row vector `bias` (`1 x cols`) to every row of `self`.
    pub fn add_row_broadcast(&self, bias: &Tensor2) -> WheellyResult<Tensor2> {
        if bias.rows != 1 || bias.cols != self.cols {
            return Err(WheellyError::new(
                WheellyErrorKind::NetworkShapeMismatch,
                format!("add_row_broadcast: {:?} + {:?}", self.shape(), bias.shape()),
            ));
        }
        let mut out = self.clone();
        for r in 0..out.rows {
            for c in 0..out.cols {
                let v = out.get(r, c) + bias.get(0, c);
                out.set(r, c, v);
            }
        }
        Ok(out)
    }

    pub fn tanh(&self) -> Tensor2 {
        Tensor2 { rows: self.rows, cols: self.cols, data: self.data.iter().map(|v| v.tanh()).collect() }
    }

    /// `d tanh(x) / dx` expressed from the already-computed output `y = tanh(x)`.
    pub fn tanh_grad_from_output(&self) -> Tensor2 {
        Tensor2 { rows: self.rows, cols: self.cols, data: self.data.iter().map(|y| 1. - y * y).collect() }
    }

    pub fn relu(&self) -> Tensor2 {
        Tensor2 { rows: self.rows, cols: self.cols, data: self.data.iter().map(|v| v.max(0.)).collect() }
    }

    pub fn relu_grad_from_input(&self) -> Tensor2 {
        Tensor2 {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| if *v > 0. { 1. } else { 0. }).collect(),
        }
    }

    /// Row-wise softmax with temperature: `y = softmax(x / T)`.
    pub fn softmax_rows(&self, temperature: f32) -> Tensor2 {
        let mut data = vec![0.; self.data.len()];
        for r in 0..self.rows {
            let row = self.row(r);
            let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let exps: Vec<f32> = row.iter().map(|v| ((v / temperature) - (max / temperature)).exp()).collect();
            let sum: f32 = exps.iter().sum();
            for (c, e) in exps.into_iter().enumerate() {
                data[r * self.cols + c] = e / sum;
            }
        }
        Tensor2 { rows: self.rows, cols: self.cols, data }
    }

    /// Row-wise sum, yielding an `rows x 1` column.
    pub fn sum_rows(&self) -> Tensor2 {
        let mut out = Tensor2::zeros(self.rows, 1);
        for r in 0..self.rows {
            out.set(r, 0, self.row(r).iter().sum());
        }
        out
    }

    /// Column-wise sum, yielding a `1 x cols` row — the bias gradient of a mini-batch.
    pub fn sum_cols_into_row(&self) -> Tensor2 {
        let mut out = Tensor2::zeros(1, self.cols);
        for r in 0..self.rows {
            for c in 0..self.cols {
                let v = out.get(0, c) + self.get(r, c);
                out.set(0, c, v);
            }
        }
        out
    }

    /// Sum of every element, used by the scalar `linear` layer's weight/bias gradients.
    pub fn sum_all(&self) -> f32 {
        self.data.iter().sum()
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    pub fn concat_cols(&self, other: &Tensor2) -> WheellyResult<Tensor2> {
        if self.rows != other.rows {
            return Err(WheellyError::new(
                WheellyErrorKind::NetworkShapeMismatch,
                format!("concat_cols: row mismatch {} vs {}", self.rows, other.rows),
            ));
        }
        let mut out = Tensor2::zeros(self.rows, self.cols + other.cols);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(r, c, self.get(r, c));
            }
            for c in 0..other.cols {
                out.set(r, self.cols + c, other.get(r, c));
            }
        }
        Ok(out)
    }

    /// Split a gradient that was produced by [`Tensor2::concat_cols`] back into its two parts.
    pub fn split_cols(&self, left_cols: usize) -> WheellyResult<(Tensor2, Tensor2)> {
        if left_cols > self.cols {
            return Err(WheellyError::new(
                WheellyErrorKind::NetworkShapeMismatch,
                format!("split_cols: left_cols {left_cols} exceeds width {}", self.cols),
            ));
        }
        let mut left = Tensor2::zeros(self.rows, left_cols);
        let mut right = Tensor2::zeros(self.rows, self.cols - left_cols);
        for r in 0..self.rows {
            for c in 0..left_cols {
                left.set(r, c, self.get(r, c));
            }
            for c in left_cols..self.cols {
                right.set(r, c - left_cols, self.get(r, c));
            }
        }
        Ok((left, right))
    }

    pub fn has_non_finite(&self) -> bool {
        self.data.iter().any(|v| !v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matmul_matches_hand_computation() {
        let x = Tensor2::from_rows(vec![vec![1., 2.]]).unwrap();
        let w = Tensor2::from_rows(vec![vec![1., 0., 1.], vec![0., 1., 1.]]).unwrap();
        let y = x.matmul(&w).unwrap();
        assert_eq!(y.as_slice(), &[1., 2., 3.]);
    }

    #[test]
    fn softmax_matches_a_known_reference_distribution() {
        let x = Tensor2::row_vector(&[1., 0., 0.]);
        let y = x.softmax_rows(1.);
        let expected = [0.5761, 0.2119, 0.2119];
        for (a, b) in y.as_slice().iter().zip(expected) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
        let y2 = x.softmax_rows(0.5);
        let expected2 = [0.7866, 0.1065, 0.1065];
        for (a, b) in y2.as_slice().iter().zip(expected2) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn softmax_rows_sum_to_one_within_tolerance() {
        let x = Tensor2::from_rows(vec![vec![3., 1., 0.2]]).unwrap();
        let y = x.softmax_rows(1.);
        let sum: f32 = y.as_slice().iter().sum();
        assert!((sum - 1.).abs() < 1e-5);
    }

    #[test]
    fn mismatched_matmul_shapes_raise_network_shape_mismatch() {
        let a = Tensor2::zeros(2, 3);
        let b = Tensor2::zeros(4, 2);
        let err = a.matmul(&b).unwrap_err();
        assert_eq!(err.kind(), WheellyErrorKind::NetworkShapeMismatch);
    }

    #[test]
    fn concat_then_split_round_trips() {
        let a = Tensor2::row_vector(&[1., 2.]);
        let b = Tensor2::row_vector(&[3., 4., 5.]);
        let joined = a.concat_cols(&b).unwrap();
        assert_eq!(joined.as_slice(), &[1., 2., 3., 4., 5.]);
        let (left, right) = joined.split_cols(2).unwrap();
        assert_eq!(left, a);
        assert_eq!(right, b);
    }
}
