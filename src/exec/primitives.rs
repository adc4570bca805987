//! Statistical primitives consumed by the association pipeline.
//!
//! The pipeline treats these as opaque building blocks:
//! - a matrix-accumulating reduction (`MatrixAggregate`), with a covariance and a
//!   correlation implementation,
//! - a matrix-by-scalar multiply (`scale_matrix`),
//! - a matrix-to-rows unpacker that emits the lower triangle only (`unpack_lower_triangle`).

use crate::error::{AppError, AppResult};

/// Dense symmetric N×N matrix, stored row-major in full.
#[derive(Debug, Clone, PartialEq)]
pub struct SymMatrix {
    n: usize,
    data: Vec<f64>,
}

impl SymMatrix {
    pub fn zeros(n: usize) -> Self { Self { n, data: vec![0.0; n * n] } }

    pub fn from_row_major(n: usize, data: Vec<f64>) -> AppResult<Self> {
        if data.len() != n * n {
            return Err(AppError::internal("matrix_shape".to_string(), format!("expected {} entries for a {}x{} matrix, got {}", n * n, n, n, data.len())));
        }
        Ok(Self { n, data })
    }

    pub fn dim(&self) -> usize { self.n }

    pub fn get(&self, i: usize, j: usize) -> f64 { self.data[i * self.n + j] }

    /// Set (i, j) and its mirror (j, i).
    pub fn set_sym(&mut self, i: usize, j: usize, v: f64) {
        self.data[i * self.n + j] = v;
        self.data[j * self.n + i] = v;
    }

    pub fn as_row_major(&self) -> &[f64] { &self.data }
}

/// Result of finalizing one group's accumulation.
#[derive(Debug, Clone)]
pub struct AggregateOutput {
    /// `None` when the group produced no usable matrix.
    pub matrix: Option<SymMatrix>,
    /// Number of contributing rows.
    pub count: u64,
}

/// Matrix-accumulating reduction over `(vector, mean vector)` pairs of one group.
///
/// Contract: `accumulate` folds one row into a state, and `merge` must be associative and
/// commutative, so rows may be split into arbitrary partial states (by independent workers
/// or by batch) that are merged in any order with the same result as a single pass.
/// `init` must return the identity element for `merge`.
pub trait MatrixAggregate {
    type State: Clone;

    fn name(&self) -> &'static str;

    fn init(&self, n: usize) -> Self::State;

    fn accumulate(&self, state: &mut Self::State, x: &[f64], mean: &[f64]);

    fn merge(&self, left: Self::State, right: Self::State) -> Self::State;

    fn finalize(&self, state: Self::State) -> AggregateOutput;

    /// Whether the finalized matrix still has to be scaled by `1/count`.
    fn scale_by_count(&self) -> bool { false }
}

/// Running sums of centered cross products, packed lower triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentState {
    n: usize,
    count: u64,
    cross: Vec<f64>,
}

impl MomentState {
    pub fn new(n: usize) -> Self { Self { n, count: 0, cross: vec![0.0; n * (n + 1) / 2] } }

    #[inline]
    fn packed(i: usize, j: usize) -> usize { i * (i + 1) / 2 + j }

    pub fn count(&self) -> u64 { self.count }

    fn add(&mut self, x: &[f64], mean: &[f64]) {
        for i in 0..self.n {
            let di = x[i] - mean[i];
            for j in 0..=i {
                self.cross[Self::packed(i, j)] += di * (x[j] - mean[j]);
            }
        }
        self.count += 1;
    }

    fn combine(mut self, other: MomentState) -> MomentState {
        for (a, b) in self.cross.iter_mut().zip(other.cross.iter()) { *a += *b; }
        self.count += other.count;
        self
    }

    fn to_matrix(&self) -> SymMatrix {
        let mut m = SymMatrix::zeros(self.n);
        for i in 0..self.n {
            for j in 0..=i {
                m.set_sym(i, j, self.cross[Self::packed(i, j)]);
            }
        }
        m
    }
}

/// Accumulates raw centered cross products; the caller scales by `1/count`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CovarianceAggregate;

impl MatrixAggregate for CovarianceAggregate {
    type State = MomentState;

    fn name(&self) -> &'static str { "covariance" }

    fn init(&self, n: usize) -> MomentState { MomentState::new(n) }

    fn accumulate(&self, state: &mut MomentState, x: &[f64], mean: &[f64]) { state.add(x, mean) }

    fn merge(&self, left: MomentState, right: MomentState) -> MomentState { left.combine(right) }

    fn finalize(&self, state: MomentState) -> AggregateOutput {
        if state.count == 0 {
            return AggregateOutput { matrix: None, count: 0 };
        }
        AggregateOutput { matrix: Some(state.to_matrix()), count: state.count }
    }

    fn scale_by_count(&self) -> bool { true }
}

/// Pearson correlation, normalized on finalize.
///
/// Groups with fewer than two contributing rows yield no matrix. Entries involving a
/// zero-variance column (its diagonal included) are NaN and persist as NULL.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationAggregate;

impl MatrixAggregate for CorrelationAggregate {
    type State = MomentState;

    fn name(&self) -> &'static str { "correlation" }

    fn init(&self, n: usize) -> MomentState { MomentState::new(n) }

    fn accumulate(&self, state: &mut MomentState, x: &[f64], mean: &[f64]) { state.add(x, mean) }

    fn merge(&self, left: MomentState, right: MomentState) -> MomentState { left.combine(right) }

    fn finalize(&self, state: MomentState) -> AggregateOutput {
        if state.count < 2 {
            return AggregateOutput { matrix: None, count: state.count };
        }
        let raw = state.to_matrix();
        let n = raw.dim();
        let mut m = SymMatrix::zeros(n);
        for i in 0..n {
            let vi = raw.get(i, i);
            for j in 0..i {
                let vj = raw.get(j, j);
                let r = if vi > 0.0 && vj > 0.0 {
                    (raw.get(i, j) / (vi * vj).sqrt()).clamp(-1.0, 1.0)
                } else {
                    f64::NAN
                };
                m.set_sym(i, j, r);
            }
            m.set_sym(i, i, if vi > 0.0 { 1.0 } else { f64::NAN });
        }
        AggregateOutput { matrix: Some(m), count: state.count }
    }
}

/// Multiply every entry by `factor`.
pub fn scale_matrix(m: &SymMatrix, factor: f64) -> SymMatrix {
    SymMatrix { n: m.n, data: m.data.iter().map(|v| v * factor).collect() }
}

/// Unpack a matrix into `n` rows; row `i` holds entries `0..=i` and NULL beyond.
/// A missing matrix unpacks to all-NULL rows; non-finite entries become NULL.
pub fn unpack_lower_triangle(m: Option<&SymMatrix>, n: usize) -> AppResult<Vec<Vec<Option<f64>>>> {
    if let Some(mat) = m {
        if mat.dim() != n {
            return Err(AppError::internal("matrix_shape".to_string(), format!("cannot unpack a {}x{} matrix as {} rows", mat.dim(), mat.dim(), n)));
        }
    }
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let mut row = vec![None; n];
        if let Some(mat) = m {
            for (j, slot) in row.iter_mut().enumerate().take(i + 1) {
                let v = mat.get(i, j);
                if v.is_finite() { *slot = Some(v); }
            }
        }
        rows.push(row);
    }
    Ok(rows)
}
