use std::time::Instant;
use crate::error::SimResult;
use super::solver::{SolverStats, SolverUtils, LinearOperator};
use super::preconditioner::Preconditioner;

/// Preconditioned Conjugate Gradient for symmetric positive (semi-)definite systems
#[derive(Debug, Clone)]
pub struct ConjugateGradient {
    max_iterations: usize,
    tolerance: f64,
    abs_tolerance: f64,
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self::new()
    }
}

impl ConjugateGradient {
    pub fn new() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-8,
            abs_tolerance: 1e-30,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_abs_tolerance(mut self, abs_tolerance: f64) -> Self {
        self.abs_tolerance = abs_tolerance;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Solve `A x = b` with an arbitrary operator and preconditioner
    ///
    /// Stops on `||r|| < tol ||b||` or `||r|| < abs_tol`. A zero right-hand
    /// side returns the zero vector immediately.
    pub fn solve_with_operator<O, P>(
        &self,
        a: &O,
        b: &[f64],
        precond: &P,
    ) -> SimResult<(Vec<f64>, SolverStats)>
    where
        O: LinearOperator,
        P: Preconditioner,
    {
        let n = b.len();
        let start = Instant::now();
        let b_norm = SolverUtils::norm(b);

        if b_norm < 1e-300 {
            return Ok((vec![0.0; n], SolverStats {
                iterations: 0,
                residual_norm: 0.0,
                relative_residual: 0.0,
                converged: true,
                solve_time: start.elapsed().as_secs_f64(),
            }));
        }

        let mut x = vec![0.0; n];
        let mut r = b.to_vec();

        let mut z = precond.apply(&r);
        let mut p = z.clone();
        let mut rz = SolverUtils::dot(&r, &z);

        let mut iteration = 0;
        let mut converged = false;
        let mut final_res = b_norm;

        while iteration < self.max_iterations {
            let ap = a.apply(&p)?;
            let p_ap = SolverUtils::dot(&p, &ap);

            if p_ap.abs() < 1e-300 {
                break;
            }
            let alpha = rz / p_ap;

            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }
            iteration += 1;

            let r_norm = SolverUtils::norm(&r);
            final_res = r_norm;
            if r_norm < self.tolerance * b_norm || r_norm < self.abs_tolerance {
                converged = true;
                break;
            }

            z = precond.apply(&r);
            let rz_new = SolverUtils::dot(&r, &z);
            let beta = rz_new / rz;
            rz = rz_new;

            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        Ok((x, SolverStats {
            iterations: iteration,
            residual_norm: final_res,
            relative_residual: final_res / b_norm,
            converged,
            solve_time: start.elapsed().as_secs_f64(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::JacobiPreconditioner;
    use approx::assert_relative_eq;
    use sprs::{CsMat, TriMat};

    /// 1D Laplacian with Dirichlet ends
    fn laplacian(n: usize) -> CsMat<f64> {
        let mut tri = TriMat::new((n, n));
        for i in 0..n {
            tri.add_triplet(i, i, 2.0);
            if i > 0 {
                tri.add_triplet(i, i - 1, -1.0);
            }
            if i + 1 < n {
                tri.add_triplet(i, i + 1, -1.0);
            }
        }
        tri.to_csr()
    }

    #[test]
    fn test_cg_laplacian() {
        let a = laplacian(50);
        let x_exact: Vec<f64> = (0..50).map(|i| (i as f64 * 0.1).sin()).collect();
        let b = SolverUtils::spmv(&a, &x_exact);

        let cg = ConjugateGradient::new().with_tolerance(1e-12);
        let (x, stats) = cg.solve_with_operator(&a, &b, &JacobiPreconditioner::new(&a)).unwrap();

        assert!(stats.converged);
        assert!(stats.iterations <= 100);
        for (xi, ei) in x.iter().zip(x_exact.iter()) {
            assert_relative_eq!(*xi, *ei, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_zero_rhs() {
        let a = laplacian(5);
        let cg = ConjugateGradient::new();
        let (x, stats) = cg.solve_with_operator(&a, &[0.0; 5], &JacobiPreconditioner::new(&a)).unwrap();
        assert!(stats.converged);
        assert_eq!(stats.iterations, 0);
        assert_eq!(x, vec![0.0; 5]);
    }
}
