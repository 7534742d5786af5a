use sprs::CsMat;

/// Preconditioner trait for iterative solvers
///
/// Solves M z = r approximately (where M ≈ A)
pub trait Preconditioner {
    /// Apply preconditioner: solve M z = r
    fn apply(&self, r: &[f64]) -> Vec<f64>;
}

/// Jacobi (diagonal) preconditioner
///
/// M = diag(A)
pub struct JacobiPreconditioner {
    /// Inverse of diagonal entries: 1/A_ii
    diag_inv: Vec<f64>,
}

impl JacobiPreconditioner {
    /// Create Jacobi preconditioner from matrix A
    #[allow(non_snake_case)]
    pub fn new(A: &CsMat<f64>) -> Self {
        let n = A.rows();
        let mut diag_inv = vec![1.0; n];

        for (i, d) in diag_inv.iter_mut().enumerate() {
            if let Some(&val) = A.get(i, i) {
                if val.abs() > 1e-14 {
                    *d = 1.0 / val;
                }
            }
        }

        Self { diag_inv }
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64]) -> Vec<f64> {
        r.iter()
            .zip(self.diag_inv.iter())
            .map(|(&ri, &di)| ri * di)
            .collect()
    }
}

/// Diagonal preconditioner from an explicit approximation of diag(A)
///
/// Used for the pressure Schur complement with the `∫ N^p / η` mass
/// diagonal. Non-positive or non-finite entries fall back to 1.
pub struct DiagonalPreconditioner {
    diag_inv: Vec<f64>,
}

impl DiagonalPreconditioner {
    pub fn new(diag: &[f64]) -> Self {
        let diag_inv = diag
            .iter()
            .map(|&d| if d.is_finite() && d > 0.0 { 1.0 / d } else { 1.0 })
            .collect();
        Self { diag_inv }
    }
}

impl Preconditioner for DiagonalPreconditioner {
    fn apply(&self, r: &[f64]) -> Vec<f64> {
        r.iter()
            .zip(self.diag_inv.iter())
            .map(|(&ri, &di)| ri * di)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    #[test]
    fn test_jacobi() {
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(0, 0, 4.0);
        tri.add_triplet(0, 1, 1.0);
        tri.add_triplet(1, 0, 1.0);
        tri.add_triplet(1, 1, 2.0);
        let a = tri.to_csr();

        let z = JacobiPreconditioner::new(&a).apply(&[4.0, 4.0]);
        assert_eq!(z, vec![1.0, 2.0]);
    }

    #[test]
    fn test_diagonal_fallback() {
        let pc = DiagonalPreconditioner::new(&[0.5, 0.0, f64::NAN]);
        assert_eq!(pc.apply(&[1.0, 3.0, 2.0]), vec![2.0, 3.0, 2.0]);
    }
}
