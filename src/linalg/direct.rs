use nalgebra::DMatrix;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use sprs::CsMat;
use crate::error::{SimError, SimResult};

/// Sparse Cholesky factor of a symmetric positive definite matrix
///
/// Factor once, then solve for many right-hand sides. This is what the
/// Schur-complement Stokes solver needs for its inner velocity solves.
pub struct CholeskyFactor {
    factor: CscCholesky<f64>,
    n: usize,
}

impl CholeskyFactor {
    /// Factorize a square sprs matrix
    ///
    /// # Errors
    /// `SimError::Factorization` if the matrix is not square or not
    /// positive definite
    #[allow(non_snake_case)]
    pub fn new(A: &CsMat<f64>) -> SimResult<Self> {
        let n = A.rows();
        if A.cols() != n {
            return Err(SimError::Factorization(format!(
                "matrix is not square ({} x {})",
                n,
                A.cols()
            )));
        }

        let mut coo = CooMatrix::new(n, n);
        for (val, (row, col)) in A.iter() {
            coo.push(row, col, *val);
        }
        let csc = CscMatrix::from(&coo);

        let factor = CscCholesky::factor(&csc)
            .map_err(|err| SimError::Factorization(format!("{}", err)))?;
        Ok(Self { factor, n })
    }

    /// Solve `A x = b` with the stored factor
    pub fn solve(&self, b: &[f64]) -> SimResult<Vec<f64>> {
        if b.len() != self.n {
            return Err(SimError::SizeMismatch {
                what: "Cholesky right-hand side",
                expected: self.n,
                actual: b.len(),
            });
        }
        let rhs = DMatrix::from_column_slice(self.n, 1, b);
        let x = self.factor.solve(&rhs);
        Ok(x.as_slice().to_vec())
    }

    pub fn size(&self) -> usize {
        self.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    #[test]
    fn test_cholesky_small_spd() {
        // [4 1 0; 1 3 1; 0 1 2]
        let mut tri = TriMat::new((3, 3));
        for (i, j, v) in [(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0), (1, 2, 1.0), (2, 1, 1.0), (2, 2, 2.0)] {
            tri.add_triplet(i, j, v);
        }
        let a = tri.to_csr();

        let factor = CholeskyFactor::new(&a).unwrap();
        let x = factor.solve(&[5.0, 5.0, 3.0]).unwrap();
        for xi in &x {
            assert_relative_eq!(*xi, 1.0, epsilon = 1e-12);
        }
        assert_eq!(factor.size(), 3);
        assert!(factor.solve(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_indefinite_matrix_is_rejected() {
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(1, 1, -1.0);
        assert!(matches!(CholeskyFactor::new(&tri.to_csr()), Err(SimError::Factorization(_))));
    }
}
