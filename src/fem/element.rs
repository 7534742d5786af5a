use nalgebra::{Matrix2, Point2, SMatrix, SVector, Vector2};
use crate::error::{SimError, SimResult};
use crate::fem::{GaussQuadrature, Quad4Basis, Quad9Basis};

/// Quadrature points per element used by every Stokes kernel (3×3 Gauss)
pub const QP_PER_ELEMENT: usize = 9;

/// Velocity DOFs per Quad9 element
pub const VEL_DOFS_PER_ELEMENT: usize = 18;

/// Shape data at one quadrature point
struct QpData {
    dn_dx: [[f64; 2]; 9],
    n_p: [f64; 4],
    dnp_dx: [[f64; 2]; 4],
    /// Integration weight times |det J|
    w: f64,
}

fn quadrature_data(nodes: &[Point2<f64>; 9]) -> SimResult<Vec<QpData>> {
    let quad = GaussQuadrature::quad_3x3();
    quad.points
        .iter()
        .zip(quad.weights.iter())
        .map(|(xi, weight)| {
            let (dn_dx, det) = Quad9Basis::shape_derivatives_cartesian(xi, nodes)
                .ok_or_else(|| SimError::SolverBreakdown {
                    solver: "assembly",
                    message: "singular element Jacobian".into(),
                })?;
            let j_inv_t = Quad9Basis::jacobian(xi, nodes)
                .try_inverse()
                .map(|m| m.transpose())
                .unwrap_or_else(Matrix2::zeros);
            let dnp_dx = Quad4Basis::shape_derivatives_reference(xi).map(|d| {
                let g = j_inv_t * Vector2::new(d[0], d[1]);
                [g[0], g[1]]
            });
            Ok(QpData {
                dn_dx,
                n_p: Quad4Basis::shape_functions(xi),
                dnp_dx,
                w: weight * det.abs(),
            })
        })
        .collect()
}

/// Element matrix computation for Q2–Q1 Stokes elements
///
/// Velocity DOFs of an element are ordered `2 k + c` for local node `k` and
/// component `c`; pressure DOFs follow the Q1 vertex order.
pub struct ElementMatrix;

impl ElementMatrix {
    /// Viscous stiffness with optional grad-div penalty
    ///
    /// K_e = ∫ Bᵀ D B dA + λ ∫ (∇·v)(∇·u) dA
    ///
    /// with `D = η diag(2, 2, 1)` acting on `(ε̇_xx, ε̇_yy, γ̇_xy)`.
    ///
    /// # Arguments
    /// * `viscosity` - η at each of the 9 quadrature points
    /// * `penalty` - λ (zero disables the term)
    pub fn stokes_velocity(
        nodes: &[Point2<f64>; 9],
        viscosity: &[f64; QP_PER_ELEMENT],
        penalty: f64,
    ) -> SimResult<SMatrix<f64, 18, 18>> {
        let mut k = SMatrix::<f64, 18, 18>::zeros();

        for (qp, &eta) in quadrature_data(nodes)?.iter().zip(viscosity.iter()) {
            let w = qp.w;
            for i in 0..9 {
                let [dix, diy] = qp.dn_dx[i];
                for j in 0..9 {
                    let [djx, djy] = qp.dn_dx[j];
                    // Bᵀ D B for the 2×2 node block
                    let kxx = eta * (2.0 * dix * djx + diy * djy);
                    let kxy = eta * diy * djx;
                    let kyx = eta * dix * djy;
                    let kyy = eta * (2.0 * diy * djy + dix * djx);

                    k[(2 * i, 2 * j)] += (kxx + penalty * dix * djx) * w;
                    k[(2 * i, 2 * j + 1)] += (kxy + penalty * dix * djy) * w;
                    k[(2 * i + 1, 2 * j)] += (kyx + penalty * diy * djx) * w;
                    k[(2 * i + 1, 2 * j + 1)] += (kyy + penalty * diy * djy) * w;
                }
            }
        }

        Ok(k)
    }

    /// Discrete gradient block
    ///
    /// G_e[(2i + c, q)] = -∫ N^p_q ∂N_i/∂x_c dA
    pub fn stokes_gradient(nodes: &[Point2<f64>; 9]) -> SimResult<SMatrix<f64, 18, 4>> {
        let mut g = SMatrix::<f64, 18, 4>::zeros();
        for qp in quadrature_data(nodes)? {
            for i in 0..9 {
                for q in 0..4 {
                    g[(2 * i, q)] -= qp.n_p[q] * qp.dn_dx[i][0] * qp.w;
                    g[(2 * i + 1, q)] -= qp.n_p[q] * qp.dn_dx[i][1] * qp.w;
                }
            }
        }
        Ok(g)
    }

    /// Gravity load `f_e = ∫ N (0, -g ρ) dA` for a uniform element density
    pub fn body_force(
        nodes: &[Point2<f64>; 9],
        density: f64,
        gravity: f64,
    ) -> SimResult<SVector<f64, 18>> {
        let quad = GaussQuadrature::quad_3x3();
        let mut f = SVector::<f64, 18>::zeros();
        for (xi, qp) in quad.points.iter().zip(quadrature_data(nodes)?) {
            let n = Quad9Basis::shape_functions(xi);
            for i in 0..9 {
                f[2 * i + 1] -= n[i] * gravity * density * qp.w;
            }
        }
        Ok(f)
    }

    /// Lumped inverse-viscosity pressure mass `∫ N^p_q / η dA`
    pub fn pressure_mass_diagonal(
        nodes: &[Point2<f64>; 9],
        viscosity: &[f64; QP_PER_ELEMENT],
    ) -> SimResult<[f64; 4]> {
        let mut d = [0.0; 4];
        for (qp, &eta) in quadrature_data(nodes)?.iter().zip(viscosity.iter()) {
            for q in 0..4 {
                d[q] += qp.n_p[q] / eta * qp.w;
            }
        }
        Ok(d)
    }

    /// Consistent Q1 mass matrix and load for an L2 projection
    ///
    /// M_e = ∫ N^p N^pᵀ dA + s ∫ ∇N^p · ∇N^pᵀ dA
    ///
    /// # Arguments
    /// * `values` - Function values at the 9 quadrature points
    /// * `smoothing` - Diffusive smoothing `s` (zero for a plain projection)
    pub fn q1_projection(
        nodes: &[Point2<f64>; 9],
        values: &[f64; QP_PER_ELEMENT],
        smoothing: f64,
    ) -> SimResult<(SMatrix<f64, 4, 4>, [f64; 4])> {
        let mut m = SMatrix::<f64, 4, 4>::zeros();
        let mut b = [0.0; 4];
        for (qp, &v) in quadrature_data(nodes)?.iter().zip(values.iter()) {
            for q in 0..4 {
                b[q] += qp.n_p[q] * v * qp.w;
                for r in 0..4 {
                    let grad = qp.dnp_dx[q][0] * qp.dnp_dx[r][0] + qp.dnp_dx[q][1] * qp.dnp_dx[r][1];
                    m[(q, r)] += (qp.n_p[q] * qp.n_p[r] + smoothing * grad) * qp.w;
                }
            }
        }
        Ok((m, b))
    }

    /// Strain-rate tensor `(ε̇_xx, ε̇_yy, ε̇_xy)` at each quadrature point
    ///
    /// # Arguments
    /// * `velocity` - Element velocity DOFs in `2 k + c` order
    pub fn strain_rates(
        nodes: &[Point2<f64>; 9],
        velocity: &[f64; VEL_DOFS_PER_ELEMENT],
    ) -> SimResult<[[f64; 3]; QP_PER_ELEMENT]> {
        let mut out = [[0.0; 3]; QP_PER_ELEMENT];
        for (eps, qp) in out.iter_mut().zip(quadrature_data(nodes)?) {
            let mut grad = [[0.0; 2]; 2];
            for i in 0..9 {
                for c in 0..2 {
                    grad[c][0] += velocity[2 * i + c] * qp.dn_dx[i][0];
                    grad[c][1] += velocity[2 * i + c] * qp.dn_dx[i][1];
                }
            }
            *eps = [grad[0][0], grad[1][1], 0.5 * (grad[0][1] + grad[1][0])];
        }
        Ok(out)
    }

    /// Element area
    pub fn area(nodes: &[Point2<f64>; 9]) -> SimResult<f64> {
        Ok(quadrature_data(nodes)?.iter().map(|qp| qp.w).sum())
    }
}

/// Second invariant of the strain-rate tensor, `sqrt(½ ε̇:ε̇)`
pub fn strain_rate_invariant(eps: &[f64; 3]) -> f64 {
    let [exx, eyy, exy] = *eps;
    (0.5 * (exx * exx + eyy * eyy + 2.0 * exy * exy)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rectangle(hx: f64, hy: f64) -> [Point2<f64>; 9] {
        let mut nodes = [Point2::origin(); 9];
        for b in 0..3 {
            for a in 0..3 {
                nodes[a + 3 * b] = Point2::new(0.5 * hx * a as f64, 0.5 * hy * b as f64);
            }
        }
        nodes
    }

    #[test]
    fn test_stiffness_symmetry_and_rigid_modes() {
        let nodes = rectangle(2.0, 1.0);
        let k = ElementMatrix::stokes_velocity(&nodes, &[3.0; 9], 0.5).unwrap();

        assert_relative_eq!(k, k.transpose(), epsilon = 1e-12);

        // Translations and the rigid rotation produce no stress
        let mut tx = SVector::<f64, 18>::zeros();
        let mut rot = SVector::<f64, 18>::zeros();
        for (i, p) in nodes.iter().enumerate() {
            tx[2 * i] = 1.0;
            rot[2 * i] = -p.y;
            rot[2 * i + 1] = p.x;
        }
        assert!((k * tx).norm() < 1e-12);
        assert!((k * rot).norm() < 1e-12);
    }

    #[test]
    fn test_gradient_of_divergence_free_field() {
        let nodes = rectangle(1.0, 1.0);
        let g = ElementMatrix::stokes_gradient(&nodes).unwrap();

        // u = (x², -2xy) is divergence free
        let mut u = SVector::<f64, 18>::zeros();
        for (i, p) in nodes.iter().enumerate() {
            u[2 * i] = p.x * p.x;
            u[2 * i + 1] = -2.0 * p.x * p.y;
        }
        assert!((g.transpose() * u).norm() < 1e-12);

        // Uniform expansion u = (x, y): -∫ N_q · 2 = -2 · area / 4
        for (i, p) in nodes.iter().enumerate() {
            u[2 * i] = p.x;
            u[2 * i + 1] = p.y;
        }
        let div = g.transpose() * u;
        for q in 0..4 {
            assert_relative_eq!(div[q], -0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_body_force_total() {
        let nodes = rectangle(2.0, 0.5);
        let f = ElementMatrix::body_force(&nodes, 3.0, 2.0).unwrap();
        let total_y: f64 = (0..9).map(|i| f[2 * i + 1]).sum();
        assert_relative_eq!(total_y, -3.0 * 2.0 * 1.0, epsilon = 1e-12);
        assert_relative_eq!(ElementMatrix::area(&nodes).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pressure_mass_diagonal() {
        let nodes = rectangle(1.0, 2.0);
        let d = ElementMatrix::pressure_mass_diagonal(&nodes, &[4.0; 9]).unwrap();
        for q in 0..4 {
            assert_relative_eq!(d[q], 0.5 / 4.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_simple_shear_invariant() {
        let nodes = rectangle(1.0, 1.0);
        let mut u = [0.0; 18];
        for (i, p) in nodes.iter().enumerate() {
            u[2 * i] = 2.0 * p.y;
        }
        let rates = ElementMatrix::strain_rates(&nodes, &u).unwrap();
        for eps in &rates {
            assert_relative_eq!(eps[2], 1.0, epsilon = 1e-12);
            assert_relative_eq!(strain_rate_invariant(eps), 1.0, epsilon = 1e-12);
        }
    }
}
