//! L2 projection of quadrature-point functions onto Q1 vertex fields
//!
//! Solves `(M + s L) φ = ∫ N^p f dA` where `M` is the consistent Q1 mass
//! matrix and `L` the Q1 Laplacian. The strain-rate invariant is projected
//! this way before it is sampled on particles.

use crate::error::{SimError, SimResult};
use crate::fem::{Assembler, QP_PER_ELEMENT};
use crate::linalg::{ConjugateGradient, JacobiPreconditioner};
use crate::mesh::Mesh;

/// Projection settings
#[derive(Debug, Clone)]
pub struct Projection {
    /// Diffusive smoothing coefficient (0 = plain L2 projection)
    pub smoothing: f64,
    /// Replace negative nodal values by zero
    pub clip_negative: bool,
    /// Clamp nodal values to `[lower, upper]`
    pub bounds: Option<(f64, f64)>,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            smoothing: 0.0,
            clip_negative: false,
            bounds: None,
            tolerance: 1e-10,
            max_iterations: 500,
        }
    }
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_clipping(mut self, clip_negative: bool) -> Self {
        self.clip_negative = clip_negative;
        self
    }

    /// Clamp the result to `[lower, upper]`, removing projection overshoot
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.bounds = Some((lower, upper));
        self
    }

    /// Project `values` (9 per element) onto the Q1 vertex lattice
    ///
    /// # Errors
    /// Size mismatch of `values`, a negative smoothing coefficient or empty
    /// bounds
    pub fn project(&self, mesh: &Mesh, values: &[[f64; QP_PER_ELEMENT]]) -> SimResult<Vec<f64>> {
        if self.smoothing < 0.0 {
            return Err(SimError::Config(format!(
                "projection smoothing must be non-negative, got {}",
                self.smoothing
            )));
        }
        if let Some((lower, upper)) = self.bounds {
            if !(lower <= upper) {
                return Err(SimError::Config(format!("projection bounds [{}, {}] are empty", lower, upper)));
            }
        }

        let (m, rhs) = Assembler::assemble_q1_projection(mesh, values, self.smoothing)?;
        let precond = JacobiPreconditioner::new(&m);
        let cg = ConjugateGradient::new()
            .with_tolerance(self.tolerance)
            .with_max_iterations(self.max_iterations);
        let (mut field, stats) = cg.solve_with_operator(&m, &rhs, &precond)?;

        if !stats.converged {
            log::warn!(
                "projection CG stopped after {} iterations (relative residual {:.3e})",
                stats.iterations,
                stats.relative_residual
            );
        }

        if self.clip_negative {
            field.iter_mut().for_each(|v| *v = v.max(0.0));
        }
        if let Some((lower, upper)) = self.bounds {
            field.iter_mut().for_each(|v| *v = v.clamp(lower, upper));
        }
        Ok(field)
    }
}
