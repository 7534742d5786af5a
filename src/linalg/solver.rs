use sprs::CsMat;
use crate::error::SimResult;

/// Statistics from solver execution
#[derive(Debug, Clone)]
pub struct SolverStats {
    /// Number of iterations (0 for direct solvers)
    pub iterations: usize,

    /// Final residual norm ||r|| = ||b - Ax||
    pub residual_norm: f64,

    /// Relative residual ||r|| / ||b||
    pub relative_residual: f64,

    /// Whether solver converged
    pub converged: bool,

    /// Solve time in seconds
    pub solve_time: f64,
}

impl SolverStats {
    pub fn new() -> Self {
        Self {
            iterations: 0,
            residual_norm: 0.0,
            relative_residual: 0.0,
            converged: false,
            solve_time: 0.0,
        }
    }
}

impl Default for SolverStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for a linear operator A that can be applied to a vector x to get Ax
pub trait LinearOperator {
    /// Apply the operator to vector v: out = A * v
    fn apply(&self, v: &[f64]) -> SimResult<Vec<f64>>;

    /// Number of rows (output dimension)
    fn rows(&self) -> usize;

    /// Number of columns (input dimension)
    fn cols(&self) -> usize;
}

impl LinearOperator for CsMat<f64> {
    fn apply(&self, v: &[f64]) -> SimResult<Vec<f64>> {
        Ok(SolverUtils::spmv(self, v))
    }

    fn rows(&self) -> usize {
        self.rows()
    }

    fn cols(&self) -> usize {
        self.cols()
    }
}

/// Helper functions for vector arithmetic
pub struct SolverUtils;

impl SolverUtils {
    /// Sparse matrix-vector product for a CSR matrix
    #[allow(non_snake_case)]
    pub fn spmv(A: &CsMat<f64>, v: &[f64]) -> Vec<f64> {
        let mut result = vec![0.0; A.rows()];
        if A.is_csr() {
            for (row_idx, row) in A.outer_iterator().enumerate() {
                result[row_idx] = row.iter().map(|(col_idx, &val)| val * v[col_idx]).sum();
            }
        } else {
            for (col_idx, col) in A.outer_iterator().enumerate() {
                for (row_idx, &val) in col.iter() {
                    result[row_idx] += val * v[col_idx];
                }
            }
        }
        result
    }

    /// Transposed product `Aᵀ v` without forming the transpose
    #[allow(non_snake_case)]
    pub fn spmv_transpose(A: &CsMat<f64>, v: &[f64]) -> Vec<f64> {
        let mut result = vec![0.0; A.cols()];
        if A.is_csr() {
            for (row_idx, row) in A.outer_iterator().enumerate() {
                for (col_idx, &val) in row.iter() {
                    result[col_idx] += val * v[row_idx];
                }
            }
        } else {
            for (col_idx, col) in A.outer_iterator().enumerate() {
                result[col_idx] = col.iter().map(|(row_idx, &val)| val * v[row_idx]).sum();
            }
        }
        result
    }

    /// Compute L2 norm of a vector
    pub fn norm(v: &[f64]) -> f64 {
        v.iter().map(|&x| x * x).sum::<f64>().sqrt()
    }

    pub fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
    }

    /// Maximum absolute entry
    pub fn max_abs(v: &[f64]) -> f64 {
        v.iter().fold(0.0_f64, |m, &x| m.max(x.abs()))
    }
}
