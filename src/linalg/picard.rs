/// Picard (fixed-point) iteration for nonlinear Stokes problems
///
/// **Problem**: For strain-rate dependent rheologies the velocity block
/// depends on the solution through the effective viscosity:
///
/// ```text
/// η_eff(u) = η(ε̇_II(u), material, strain)
/// K(u) · u + G p = f
/// ```
///
/// **Solution**: Iterate until viscosity and velocity are consistent:
///
/// ```text
/// Loop k = 1, 2, 3, ...
///   1. Evaluate η from u^{k-1}, assemble and solve for (F(u^{k-1}), p^k)
///   2. Check: ||F(u^{k-1}) - u^{k-1}|| / ||F(u^{k-1})|| < tol
///          or ||K(u^{k-1}) u^{k-1} + G p^k - f|| / ||f|| < tol → converged
///   3. Mix: u^k = u^{k-1} + α (F(u^{k-1}) - u^{k-1}), or the Anderson
///      combination of the last few iterates
/// ```
///
/// The residual test matters for yield laws: where a material is at yield
/// the stress no longer depends on the strain rate, so velocities can keep
/// drifting while the momentum balance is already satisfied.
///
/// # References
/// - Moresi et al. (2003), "A Lagrangian integration point FEM"
/// - Glerum et al. (2018), "Nonlinear viscoplasticity in ASPECT"
/// - Walker & Ni (2011), "Anderson Acceleration for Fixed-Point Iterations"

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use crate::error::{SimError, SimResult};
use crate::linalg::{SolverStats, SolverUtils, StokesSolution};

/// Configuration for Picard iteration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PicardConfig {
    /// Maximum number of nonlinear iterations
    pub max_iterations: usize,

    /// Tolerance on both the relative velocity change and the relative
    /// momentum residual; either one below it ends the iteration
    pub tolerance: f64,

    /// Under-relaxation factor α ∈ (0, 1]
    pub relaxation: f64,

    /// Velocity norm below which the change is measured absolutely
    pub abs_tolerance: f64,

    /// Reduce α when the change oscillates, raise it when converging well
    pub adaptive_damping: bool,

    /// Lower bound for adaptive damping
    pub alpha_min: f64,

    /// Upper bound for adaptive damping
    pub alpha_max: f64,

    /// Previous iterates mixed by Anderson acceleration (0 = plain Picard)
    pub anderson_depth: usize,

    /// Tikhonov regularisation of the Anderson least-squares problem,
    /// relative to the largest diagonal entry
    pub anderson_beta: f64,
}

impl Default for PicardConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-4,
            relaxation: 1.0,
            abs_tolerance: 1e-30,
            adaptive_damping: true,
            alpha_min: 0.2,
            alpha_max: 1.0,
            anderson_depth: 0,
            anderson_beta: 1e-10,
        }
    }
}

impl PicardConfig {
    /// Damped, Anderson-accelerated iteration for yield laws
    pub fn conservative() -> Self {
        Self {
            max_iterations: 500,
            relaxation: 0.7,
            alpha_max: 0.7,
            anderson_depth: 5,
            ..Self::default()
        }
    }

    /// Single solve for a linear rheology
    pub fn linear() -> Self {
        Self {
            max_iterations: 1,
            adaptive_damping: false,
            anderson_depth: 0,
            ..Self::default()
        }
    }

    /// # Errors
    /// `SimError::Config` on a zero iteration cap, α outside (0, 1] or
    /// inconsistent damping bounds
    pub fn validate(&self) -> SimResult<()> {
        if self.max_iterations == 0 {
            return Err(SimError::Config("picard.max_iterations must be positive".into()));
        }
        if !(self.relaxation > 0.0 && self.relaxation <= 1.0) {
            return Err(SimError::Config(format!(
                "picard.relaxation must be in (0, 1], got {}",
                self.relaxation
            )));
        }
        if !(self.tolerance > 0.0) {
            return Err(SimError::Config("picard.tolerance must be positive".into()));
        }
        if !(self.alpha_min > 0.0 && self.alpha_min <= self.alpha_max && self.alpha_max <= 1.0) {
            return Err(SimError::Config(format!(
                "picard damping bounds must satisfy 0 < alpha_min <= alpha_max <= 1, got [{}, {}]",
                self.alpha_min, self.alpha_max
            )));
        }
        if !(self.anderson_beta >= 0.0) {
            return Err(SimError::Config("picard.anderson_beta must not be negative".into()));
        }
        Ok(())
    }
}

/// Statistics from Picard iteration
#[derive(Debug, Clone)]
pub struct PicardStats {
    /// Number of nonlinear iterations performed
    pub iterations: usize,

    /// Did it converge?
    pub converged: bool,

    /// Final relative change ||F(u) - u||/||F(u)||
    pub relative_change: f64,

    /// Final relative momentum residual
    pub residual: f64,

    /// Total pressure CG iterations (sum over all Picard steps)
    pub total_linear_iterations: usize,

    /// Linear solver stats from last Picard iteration
    pub last_linear_stats: SolverStats,
}

/// Anderson mixing of recent Picard iterates
///
/// Keeps the last `depth + 1` pairs `(x_i, g_i = F(x_i) - x_i)` and picks
/// the combination whose linearised residual is smallest:
///
/// ```text
/// γ = argmin ||g_k - ΔG γ||² + β||γ||²
/// x_{k+1} = x_k + α g_k - (ΔX + α ΔG) γ
/// ```
#[derive(Debug)]
struct AndersonMixer {
    depth: usize,
    beta: f64,
    x_history: VecDeque<Vec<f64>>,
    g_history: VecDeque<Vec<f64>>,
}

impl AndersonMixer {
    fn new(depth: usize, beta: f64) -> Self {
        Self {
            depth,
            beta,
            x_history: VecDeque::with_capacity(depth + 1),
            g_history: VecDeque::with_capacity(depth + 1),
        }
    }

    fn restart(&mut self) {
        self.x_history.clear();
        self.g_history.clear();
    }

    /// Next iterate from `x` and its fixed-point residual `g`
    fn mix(&mut self, x: &[f64], g: &[f64], alpha: f64) -> Vec<f64> {
        self.x_history.push_back(x.to_vec());
        self.g_history.push_back(g.to_vec());
        if self.x_history.len() > self.depth + 1 {
            self.x_history.pop_front();
            self.g_history.pop_front();
        }

        let plain = || x.iter().zip(g).map(|(&xi, &gi)| xi + alpha * gi).collect::<Vec<f64>>();
        let m = self.x_history.len() - 1;
        if m == 0 {
            return plain();
        }

        let n = x.len();
        let delta_g = DMatrix::from_fn(n, m, |j, i| self.g_history[i + 1][j] - self.g_history[i][j]);
        let delta_x = DMatrix::from_fn(n, m, |j, i| self.x_history[i + 1][j] - self.x_history[i][j]);
        let g_vec = DVector::from_column_slice(g);

        let mut gram = delta_g.tr_mul(&delta_g);
        let scale = (0..m).map(|i| gram[(i, i)]).fold(0.0_f64, f64::max);
        if !(scale > 0.0) {
            self.restart();
            return plain();
        }
        for i in 0..m {
            gram[(i, i)] += self.beta * scale;
        }
        let rhs = delta_g.tr_mul(&g_vec);
        let gamma = match gram.cholesky() {
            Some(chol) => chol.solve(&rhs),
            None => {
                log::debug!("  Anderson least-squares system is singular, restarting");
                self.restart();
                return plain();
            }
        };

        let correction = (delta_x + delta_g * alpha) * gamma;
        let next: Vec<f64> = x
            .iter()
            .zip(g)
            .zip(correction.iter())
            .map(|((&xi, &gi), &ci)| xi + alpha * gi - ci)
            .collect();
        if next.iter().all(|v| v.is_finite()) {
            next
        } else {
            self.restart();
            plain()
        }
    }
}

/// Run Picard iteration
///
/// # Arguments
/// * `solve_step` - Evaluates the rheology from a velocity, assembles and
///   solves the Stokes system
/// * `velocity_guess` - Starting velocity (zeros for a cold start)
///
/// A single-iteration config performs one solve and reports convergence.
/// Otherwise the returned solution is the last solve, not a mixed iterate,
/// so velocity and pressure stay consistent.
pub fn picard_solve<F>(
    mut solve_step: F,
    velocity_guess: &[f64],
    config: &PicardConfig,
) -> SimResult<(StokesSolution, PicardStats)>
where
    F: FnMut(&[f64]) -> SimResult<StokesSolution>,
{
    let mut iterate = velocity_guess.to_vec();
    let mut total_linear_iters = 0;
    let mut current_alpha = config.relaxation;
    let mut previous_change: Option<f64> = None;
    let mut previous_residual = f64::INFINITY;
    let mut anderson = (config.anderson_depth > 0).then(|| AndersonMixer::new(config.anderson_depth, config.anderson_beta));

    let mut iteration = 0;
    loop {
        iteration += 1;
        let solution = solve_step(&iterate)?;
        total_linear_iters += solution.stats.iterations;

        if config.max_iterations == 1 {
            let stats = PicardStats {
                iterations: 1,
                converged: true,
                relative_change: 0.0,
                residual: solution.nonlinear_residual,
                total_linear_iterations: total_linear_iters,
                last_linear_stats: solution.stats.clone(),
            };
            return Ok((solution, stats));
        }

        if solution.velocity.len() != iterate.len() {
            return Err(SimError::SizeMismatch {
                what: "Picard velocity",
                expected: iterate.len(),
                actual: solution.velocity.len(),
            });
        }

        let g: Vec<f64> = solution
            .velocity
            .iter()
            .zip(iterate.iter())
            .map(|(&u, &u_prev)| u - u_prev)
            .collect();
        let delta_norm = SolverUtils::norm(&g);
        let u_norm = SolverUtils::norm(&solution.velocity);
        let relative_change = if u_norm > config.abs_tolerance {
            delta_norm / u_norm
        } else {
            delta_norm / config.abs_tolerance.max(f64::MIN_POSITIVE)
        };
        let residual = solution.nonlinear_residual;

        log::debug!(
            "  Picard {:3}: relative change {:.3e}, residual {:.3e} (α = {:.2}, {} pressure iterations)",
            iteration,
            relative_change,
            residual,
            current_alpha,
            solution.stats.iterations
        );

        // u = 0 solves the problem exactly when there is no forcing
        let converged = relative_change < config.tolerance
            || residual < config.tolerance
            || (u_norm == 0.0 && delta_norm == 0.0);
        if converged || iteration >= config.max_iterations {
            if !converged {
                log::warn!(
                    "Picard iteration did not converge after {} iterations (relative change {:.3e}, residual {:.3e})",
                    iteration,
                    relative_change,
                    residual
                );
            }
            let stats = PicardStats {
                iterations: iteration,
                converged,
                relative_change,
                residual,
                total_linear_iterations: total_linear_iters,
                last_linear_stats: solution.stats.clone(),
            };
            return Ok((solution, stats));
        }

        if config.adaptive_damping {
            if let Some(r_prev) = previous_change {
                if relative_change > 1.2 * r_prev {
                    current_alpha = (current_alpha * 0.7).max(config.alpha_min);
                    log::debug!("  Picard oscillation detected, α → {:.3}", current_alpha);
                } else if relative_change < 0.9 * r_prev {
                    current_alpha = (current_alpha * 1.05).min(config.alpha_max);
                }
            }
        }
        previous_change = Some(relative_change);

        // The first step from the guess is taken in full
        let alpha = if iteration == 1 { 1.0 } else { current_alpha };
        // The guess may violate the boundary values, so it never enters the
        // Anderson history
        iterate = match anderson.as_mut() {
            Some(mixer) if iteration > 1 => {
                if residual > previous_residual {
                    mixer.restart();
                }
                mixer.mix(&iterate, &g, alpha)
            }
            _ => iterate.iter().zip(&g).map(|(&x, &gi)| x + alpha * gi).collect(),
        };
        previous_residual = residual;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_solution(velocity: Vec<f64>) -> StokesSolution {
        StokesSolution {
            velocity,
            pressure: vec![0.0],
            stats: SolverStats {
                iterations: 3,
                converged: true,
                ..SolverStats::new()
            },
            pressure_null_space: false,
            nonlinear_residual: 1.0,
        }
    }

    #[test]
    fn test_fixed_point_converges() {
        // u = 0.5 u + 1 → u* = 2
        let config = PicardConfig {
            adaptive_damping: false,
            ..PicardConfig::default()
        };
        let (sol, stats) = picard_solve(
            |u: &[f64]| Ok(fake_solution(vec![0.5 * u[0] + 1.0])),
            &[0.0],
            &config,
        )
        .unwrap();

        assert!(stats.converged);
        assert!((sol.velocity[0] - 2.0).abs() < 1e-3);
        assert_eq!(stats.total_linear_iterations, 3 * stats.iterations);
    }

    #[test]
    fn test_linear_config_solves_once() {
        let mut calls = 0;
        let (_, stats) = picard_solve(
            |_: &[f64]| {
                calls += 1;
                Ok(fake_solution(vec![1.0]))
            },
            &[0.0],
            &PicardConfig::linear(),
        )
        .unwrap();
        assert_eq!(calls, 1);
        assert!(stats.converged);
    }

    #[test]
    fn test_iteration_cap() {
        let config = PicardConfig {
            max_iterations: 4,
            ..PicardConfig::default()
        };
        // Alternating map never settles
        let (_, stats) = picard_solve(|u: &[f64]| Ok(fake_solution(vec![1.0 - u[0] * 3.0])), &[0.0], &config).unwrap();
        assert_eq!(stats.iterations, 4);
        assert!(!stats.converged);

        assert!(PicardConfig { relaxation: 0.0, ..PicardConfig::default() }.validate().is_err());
    }

    /// `F(x) = A x + b` with a slowly contracting `A`, fixed point (1, 1, 1)
    fn slow_linear_map(x: &[f64]) -> Vec<f64> {
        let a = [[0.95, 0.02, 0.0], [0.0, 0.9, 0.05], [0.01, 0.0, 0.97]];
        (0..3)
            .map(|i| {
                let row_sum: f64 = a[i].iter().sum();
                (1.0 - row_sum) + (0..3).map(|j| a[i][j] * x[j]).sum::<f64>()
            })
            .collect()
    }

    #[test]
    fn test_anderson_accelerates_slow_contraction() {
        let plain = PicardConfig {
            max_iterations: 30,
            adaptive_damping: false,
            ..PicardConfig::default()
        };
        let accelerated = PicardConfig {
            anderson_depth: 5,
            ..plain.clone()
        };

        let (_, slow) = picard_solve(|u: &[f64]| Ok(fake_solution(slow_linear_map(u))), &[0.0; 3], &plain).unwrap();
        assert!(!slow.converged);

        let (sol, fast) =
            picard_solve(|u: &[f64]| Ok(fake_solution(slow_linear_map(u))), &[0.0; 3], &accelerated).unwrap();
        assert!(fast.converged);
        assert!(fast.iterations < 15, "took {} iterations", fast.iterations);
        for v in sol.velocity {
            assert!((v - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_small_residual_ends_iteration() {
        let mut calls = 0;
        let (_, stats) = picard_solve(
            |u: &[f64]| {
                calls += 1;
                let mut sol = fake_solution(vec![u[0] + 1.0]);
                sol.nonlinear_residual = if calls >= 3 { 1e-9 } else { 1.0 };
                Ok(sol)
            },
            &[0.0],
            &PicardConfig::default(),
        )
        .unwrap();
        assert!(stats.converged);
        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.residual, 1e-9);
        assert!(stats.relative_change > PicardConfig::default().tolerance);
    }

    #[test]
    fn test_conservative_config() {
        let config = PicardConfig::conservative();
        assert!(config.validate().is_ok());
        assert!(config.anderson_depth > 0);
        assert!(config.relaxation < 1.0);
        assert!(PicardConfig { alpha_min: 0.9, alpha_max: 0.5, ..config }.validate().is_err());
    }
}
