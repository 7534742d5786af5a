//! Schur-complement solver for the Stokes saddle-point system
//!
//! Eliminating the velocity from
//!
//! ```text
//! [ K   G ] [u]   [f]
//! [ Gᵀ  0 ] [p] = [0]
//! ```
//!
//! leaves the pressure system `S p = Gᵀ K⁻¹ f` with `S = Gᵀ K⁻¹ G`, which is
//! symmetric positive (semi-)definite. It is solved with preconditioned CG;
//! each application of `S` costs one sparse Cholesky back-substitution.

use serde::{Deserialize, Serialize};
use sprs::CsMat;
use std::time::Instant;
use crate::error::{SimError, SimResult};
use crate::fem::{Assembler, DofManager, StokesSystem};
use super::direct::CholeskyFactor;
use super::iterative::ConjugateGradient;
use super::preconditioner::{DiagonalPreconditioner, Preconditioner};
use super::solver::{LinearOperator, SolverStats, SolverUtils};

/// Stokes solver settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StokesSolverConfig {
    /// Relative tolerance of the pressure CG
    pub tolerance: f64,
    /// Iteration cap of the pressure CG
    pub max_iterations: usize,
}

impl Default for StokesSolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 1000,
        }
    }
}

/// Velocity and pressure of one Stokes solve
#[derive(Debug, Clone)]
pub struct StokesSolution {
    pub velocity: Vec<f64>,
    pub pressure: Vec<f64>,
    /// Statistics of the pressure CG
    pub stats: SolverStats,
    /// Whether the constant pressure mode was removed
    pub pressure_null_space: bool,
    /// `‖K u⁰ + G p − f‖ / ‖f‖` over free DOFs for the velocity `u⁰` the
    /// viscosity was evaluated from; zero for a plain linear solve
    pub nonlinear_residual: f64,
}

/// Remove the mean of a vector in place
fn remove_mean(v: &mut [f64]) {
    if v.is_empty() {
        return;
    }
    let mean = v.iter().sum::<f64>() / v.len() as f64;
    v.iter_mut().for_each(|x| *x -= mean);
}

/// Pressure Schur complement `Gᵀ K⁻¹ G` with Dirichlet rows of G removed
struct SchurComplement<'a> {
    g: &'a CsMat<f64>,
    mask: &'a [bool],
    factor: &'a CholeskyFactor,
    project: bool,
}

impl SchurComplement<'_> {
    /// `K⁻¹ G p` restricted to free velocity DOFs
    fn velocity_correction(&self, p: &[f64]) -> SimResult<Vec<f64>> {
        let mut w = SolverUtils::spmv(self.g, p);
        for (wi, &fixed) in w.iter_mut().zip(self.mask) {
            if fixed {
                *wi = 0.0;
            }
        }
        self.factor.solve(&w)
    }
}

impl LinearOperator for SchurComplement<'_> {
    fn apply(&self, p: &[f64]) -> SimResult<Vec<f64>> {
        let mut z = self.velocity_correction(p)?;
        for (zi, &fixed) in z.iter_mut().zip(self.mask) {
            if fixed {
                *zi = 0.0;
            }
        }
        let mut s = SolverUtils::spmv_transpose(self.g, &z);
        if self.project {
            remove_mean(&mut s);
        }
        Ok(s)
    }

    fn rows(&self) -> usize {
        self.g.cols()
    }

    fn cols(&self) -> usize {
        self.g.cols()
    }
}

/// Preconditioner that keeps iterates orthogonal to the constant mode
struct ProjectedPreconditioner<P> {
    inner: P,
    project: bool,
}

impl<P: Preconditioner> Preconditioner for ProjectedPreconditioner<P> {
    fn apply(&self, r: &[f64]) -> Vec<f64> {
        let mut z = self.inner.apply(r);
        if self.project {
            remove_mean(&mut z);
        }
        z
    }
}

/// Uzawa-CG Stokes solver
#[derive(Debug, Clone, Default)]
pub struct StokesSolver {
    pub config: StokesSolverConfig,
}

impl StokesSolver {
    pub fn new(config: StokesSolverConfig) -> Self {
        Self { config }
    }

    /// Solve the assembled Stokes system with the DOF manager's Dirichlet data
    ///
    /// The constant pressure mode is detected from the discrete gradient:
    /// when `G 1` vanishes on all free velocity DOFs the pressure is only
    /// defined up to a constant and is returned with zero mean.
    ///
    /// # Errors
    /// Factorization failures and non-finite results
    pub fn solve(&self, system: &StokesSystem, dof_mgr: &DofManager) -> SimResult<StokesSolution> {
        self.solve_impl(system, dof_mgr, None)
    }

    /// Solve a system assembled from the velocity `iterate` and report the
    /// momentum residual of that velocity
    ///
    /// With the new pressure `p` the residual `K u⁰ + G p − f` equals
    /// `K (u⁰ − u)`, so it costs one product with `K`.
    pub fn solve_iterate(&self, system: &StokesSystem, dof_mgr: &DofManager, iterate: &[f64]) -> SimResult<StokesSolution> {
        self.solve_impl(system, dof_mgr, Some(iterate))
    }

    fn solve_impl(&self, system: &StokesSystem, dof_mgr: &DofManager, iterate: Option<&[f64]>) -> SimResult<StokesSolution> {
        let start = Instant::now();
        let n_p = dof_mgr.total_pressure_dofs();
        let mask = dof_mgr.dirichlet_mask();

        let (k_bc, f_bc) = Assembler::apply_dirichlet_bcs(&system.K, &system.f, dof_mgr);
        let factor = CholeskyFactor::new(&k_bc)?;

        // Velocity for zero pressure, carrying the prescribed boundary values
        let u_star = factor.solve(&f_bc)?;

        let project = Self::has_constant_pressure_mode(&system.G, &mask);

        let schur = SchurComplement {
            g: &system.G,
            mask: &mask,
            factor: &factor,
            project,
        };

        let mut rhs = SolverUtils::spmv_transpose(&system.G, &u_star);
        if project {
            let rhs_norm = SolverUtils::norm(&rhs);
            let net_flux = rhs.iter().sum::<f64>();
            if rhs_norm > 0.0 && net_flux.abs() > 1e-8 * rhs_norm * (n_p as f64).sqrt() {
                log::warn!(
                    "boundary velocities are not mass conserving (net flux {:.3e}), projecting",
                    net_flux
                );
            }
            remove_mean(&mut rhs);
        }

        let precond = ProjectedPreconditioner {
            inner: DiagonalPreconditioner::new(&system.pressure_diag),
            project,
        };
        let cg = ConjugateGradient::new()
            .with_tolerance(self.config.tolerance)
            .with_max_iterations(self.config.max_iterations);
        let (mut pressure, mut stats) = cg.solve_with_operator(&schur, &rhs, &precond)?;

        if project {
            remove_mean(&mut pressure);
        }
        if !stats.converged {
            log::warn!(
                "Stokes pressure CG did not converge: {} iterations, relative residual {:.3e}",
                stats.iterations,
                stats.relative_residual
            );
        }

        let correction = schur.velocity_correction(&pressure)?;
        let velocity: Vec<f64> = u_star
            .iter()
            .zip(correction.iter())
            .zip(mask.iter())
            .map(|((&u, &c), &fixed)| if fixed { u } else { u - c })
            .collect();

        if velocity.iter().chain(pressure.iter()).any(|v| !v.is_finite()) {
            return Err(SimError::SolverBreakdown {
                solver: "stokes",
                message: "non-finite velocity or pressure".into(),
            });
        }

        let nonlinear_residual = match iterate {
            Some(u0) => Self::momentum_residual(&k_bc, &f_bc, &mask, u0, &velocity)?,
            None => 0.0,
        };

        stats.solve_time = start.elapsed().as_secs_f64();
        log::debug!(
            "Stokes solve: {} pressure iterations, relative residual {:.3e}, {:.3}s",
            stats.iterations,
            stats.relative_residual,
            stats.solve_time
        );

        Ok(StokesSolution {
            velocity,
            pressure,
            stats,
            pressure_null_space: project,
            nonlinear_residual,
        })
    }

    /// `‖K (u⁰ − u)‖ / ‖f‖` over the free DOFs
    fn momentum_residual(k_bc: &CsMat<f64>, f_bc: &[f64], mask: &[bool], u0: &[f64], u: &[f64]) -> SimResult<f64> {
        if u0.len() != u.len() {
            return Err(SimError::SizeMismatch {
                what: "velocity iterate",
                expected: u.len(),
                actual: u0.len(),
            });
        }
        let free = |v: Vec<f64>| -> Vec<f64> {
            v.into_iter().zip(mask).map(|(x, &fixed)| if fixed { 0.0 } else { x }).collect()
        };
        let diff = free(u0.iter().zip(u).map(|(a, b)| a - b).collect());
        let r_norm = SolverUtils::norm(&free(SolverUtils::spmv(k_bc, &diff)));
        let f_norm = SolverUtils::norm(&free(f_bc.to_vec()));
        Ok(if f_norm > 0.0 { r_norm / f_norm } else { r_norm })
    }

    /// Whether `G 1 = 0` on all free velocity DOFs
    fn has_constant_pressure_mode(g: &CsMat<f64>, mask: &[bool]) -> bool {
        let g_scale = SolverUtils::max_abs(g.data());
        if g_scale == 0.0 {
            return true;
        }
        let ones = vec![1.0; g.cols()];
        let g1 = SolverUtils::spmv(g, &ones);
        let free_max = g1
            .iter()
            .zip(mask)
            .filter_map(|(v, &fixed)| if fixed { None } else { Some(v.abs()) })
            .fold(0.0_f64, f64::max);
        free_max <= 1e-10 * g_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem::BoundaryConditions;
    use crate::mesh::{Boundary, Mesh};
    use crate::mesh_generator::MeshGenerator;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn unit_box(n: usize) -> (Mesh, DofManager) {
        let mesh = MeshGenerator::structured_quad_box([n, n], Point2::origin(), Point2::new(1.0, 1.0)).unwrap();
        let dofs = DofManager::new_mixed(mesh.num_nodes(), mesh.num_vertices());
        (mesh, dofs)
    }

    fn tight_solver() -> StokesSolver {
        StokesSolver::new(StokesSolverConfig {
            tolerance: 1e-12,
            max_iterations: 500,
        })
    }

    #[test]
    fn test_hydrostatic_free_slip_box() {
        let (mesh, mut dofs) = unit_box(4);
        BoundaryConditions::free_slip_box().apply(&mesh, &mut dofs).unwrap();
        let n = mesh.num_elements();
        let sys = Assembler::assemble_stokes(&mesh, &dofs, &vec![[1.0; 9]; n], &vec![1.0; n], 1.0, 0.0).unwrap();

        let sol = tight_solver().solve(&sys, &dofs).unwrap();
        assert!(sol.pressure_null_space);
        assert!(sol.stats.converged);
        assert!(SolverUtils::max_abs(&sol.velocity) < 1e-8);

        // p = (0.5 - y) once the mean is removed
        let verts = mesh.vertex_lattice();
        for (v, &node) in verts.iter().enumerate() {
            let y = mesh.geometry.nodes[node].y;
            assert_relative_eq!(sol.pressure[v], 0.5 - y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_open_top_has_no_null_space() {
        let (mesh, mut dofs) = unit_box(2);
        let mut bcs = BoundaryConditions::new();
        for b in [Boundary::Left, Boundary::Right, Boundary::Bottom] {
            bcs.push(crate::fem::DirichletBc::free_slip(b));
        }
        bcs.apply(&mesh, &mut dofs).unwrap();
        let n = mesh.num_elements();
        let sys = Assembler::assemble_stokes(&mesh, &dofs, &vec![[1.0; 9]; n], &vec![1.0; n], 1.0, 0.0).unwrap();

        let sol = tight_solver().solve(&sys, &dofs).unwrap();
        assert!(!sol.pressure_null_space);

        // Traction-free top: p = 1 - y
        let verts = mesh.vertex_lattice();
        for (v, &node) in verts.iter().enumerate() {
            let y = mesh.geometry.nodes[node].y;
            assert_relative_eq!(sol.pressure[v], 1.0 - y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_residual_of_the_iterate() {
        let (mesh, mut dofs) = unit_box(4);
        let mut bcs = BoundaryConditions::new();
        bcs.add_dirichlet_bc([0.0, 0.0], Boundary::Bottom, &[0, 1]);
        bcs.add_dirichlet_bc([1.0, 0.0], Boundary::Top, &[0, 1]);
        bcs.add_dirichlet_bc([0.0, 0.0], Boundary::Left, &[1]);
        bcs.add_dirichlet_bc([0.0, 0.0], Boundary::Right, &[1]);
        bcs.apply(&mesh, &mut dofs).unwrap();
        let n = mesh.num_elements();
        let sys = Assembler::assemble_stokes(&mesh, &dofs, &vec![[1.0; 9]; n], &vec![0.0; n], 1.0, 0.0).unwrap();

        let solver = tight_solver();
        let plain = solver.solve(&sys, &dofs).unwrap();
        assert_eq!(plain.nonlinear_residual, 0.0);

        // The exact solution leaves nothing, any other velocity does
        let exact = solver.solve_iterate(&sys, &dofs, &plain.velocity).unwrap();
        assert!(exact.nonlinear_residual < 1e-8);
        let mut off = plain.velocity.clone();
        let free = (0..off.len()).find(|&i| !dofs.is_dirichlet(i)).unwrap();
        off[free] += 0.1;
        assert!(solver.solve_iterate(&sys, &dofs, &off).unwrap().nonlinear_residual > 1e-6);
        assert!(solver.solve_iterate(&sys, &dofs, &[0.0; 3]).is_err());
    }
}
