use nalgebra::{Matrix2, Point2, Vector2};

/// 1D quadratic Lagrange polynomials on nodes -1, 0, 1
#[inline]
fn lagrange2(x: f64) -> [f64; 3] {
    [0.5 * x * (x - 1.0), 1.0 - x * x, 0.5 * x * (x + 1.0)]
}

#[inline]
fn lagrange2_deriv(x: f64) -> [f64; 3] {
    [x - 0.5, -2.0 * x, x + 0.5]
}

/// 1D linear Lagrange polynomials on nodes -1, 1
#[inline]
fn lagrange1(x: f64) -> [f64; 2] {
    [0.5 * (1.0 - x), 0.5 * (1.0 + x)]
}

#[inline]
fn lagrange1_deriv(_x: f64) -> [f64; 2] {
    [-0.5, 0.5]
}

/// Quad9 (9-node biquadratic) element basis functions
///
/// Reference element is `[-1, 1]²`. Node `k = a + 3 b` sits at
/// `(ξ_a, η_b)` with `ξ_0 = -1, ξ_1 = 0, ξ_2 = 1`, and its shape function
/// is the tensor product `N_k(ξ, η) = l_a(ξ) l_b(η)`.
pub struct Quad9Basis;

impl Quad9Basis {
    /// Reference coordinates of the 9 nodes
    pub fn reference_nodes() -> [[f64; 2]; 9] {
        let mut nodes = [[0.0; 2]; 9];
        for b in 0..3 {
            for a in 0..3 {
                nodes[a + 3 * b] = [a as f64 - 1.0, b as f64 - 1.0];
            }
        }
        nodes
    }

    /// Evaluate all 9 shape functions at reference coordinates
    pub fn shape_functions(xi: &[f64; 2]) -> [f64; 9] {
        let lx = lagrange2(xi[0]);
        let ly = lagrange2(xi[1]);
        let mut n = [0.0; 9];
        for b in 0..3 {
            for a in 0..3 {
                n[a + 3 * b] = lx[a] * ly[b];
            }
        }
        n
    }

    /// Shape function derivatives with respect to reference coordinates
    ///
    /// # Returns
    /// Array of 9 vectors `[∂N/∂ξ, ∂N/∂η]`
    pub fn shape_derivatives_reference(xi: &[f64; 2]) -> [[f64; 2]; 9] {
        let lx = lagrange2(xi[0]);
        let ly = lagrange2(xi[1]);
        let dlx = lagrange2_deriv(xi[0]);
        let dly = lagrange2_deriv(xi[1]);
        let mut dn = [[0.0; 2]; 9];
        for b in 0..3 {
            for a in 0..3 {
                dn[a + 3 * b] = [dlx[a] * ly[b], lx[a] * dly[b]];
            }
        }
        dn
    }

    /// Jacobian `J_ij = ∂x_i / ∂ξ_j`
    #[allow(non_snake_case)]
    pub fn jacobian(xi: &[f64; 2], nodes: &[Point2<f64>; 9]) -> Matrix2<f64> {
        let dN = Self::shape_derivatives_reference(xi);
        let mut J = Matrix2::zeros();
        for (node, d) in nodes.iter().zip(dN.iter()) {
            J[(0, 0)] += node.x * d[0];
            J[(0, 1)] += node.x * d[1];
            J[(1, 0)] += node.y * d[0];
            J[(1, 1)] += node.y * d[1];
        }
        J
    }

    /// Shape function derivatives with respect to Cartesian coordinates
    ///
    /// # Returns
    /// `(dN/dx, det J)`, or `None` if the Jacobian is singular
    ///
    /// Uses the chain rule `∇_x N = J^{-T} ∇_ξ N`.
    #[allow(non_snake_case)]
    pub fn shape_derivatives_cartesian(
        xi: &[f64; 2],
        nodes: &[Point2<f64>; 9],
    ) -> Option<([[f64; 2]; 9], f64)> {
        let J = Self::jacobian(xi, nodes);
        let det = J.determinant();
        let J_inv_t = J.try_inverse()?.transpose();

        let dN = Self::shape_derivatives_reference(xi);
        let mut dN_dx = [[0.0; 2]; 9];
        for (out, d) in dN_dx.iter_mut().zip(dN.iter()) {
            let grad = J_inv_t * Vector2::new(d[0], d[1]);
            *out = [grad[0], grad[1]];
        }
        Some((dN_dx, det))
    }

    /// Map reference coordinates to a physical point
    pub fn map_to_physical(xi: &[f64; 2], nodes: &[Point2<f64>; 9]) -> Point2<f64> {
        let n = Self::shape_functions(xi);
        let mut p = Vector2::zeros();
        for (node, ni) in nodes.iter().zip(n.iter()) {
            p += node.coords * *ni;
        }
        Point2::from(p)
    }

    /// Evaluate a nodal field at reference coordinates
    pub fn evaluate_at_point<T>(xi: &[f64; 2], nodal_values: &[T; 9]) -> T
    where
        T: std::ops::Mul<f64, Output = T> + std::ops::Add<T, Output = T> + Copy,
    {
        let n = Self::shape_functions(xi);
        let mut result = nodal_values[0] * n[0];
        for i in 1..9 {
            result = result + nodal_values[i] * n[i];
        }
        result
    }
}

/// Quad4 (bilinear) basis for the pressure and projected fields
///
/// Node `k = a + 2 b` sits at `(±1, ±1)`, matching
/// [`Quad9Element::vertices`](crate::mesh::Quad9Element::vertices).
pub struct Quad4Basis;

impl Quad4Basis {
    pub fn shape_functions(xi: &[f64; 2]) -> [f64; 4] {
        let lx = lagrange1(xi[0]);
        let ly = lagrange1(xi[1]);
        [lx[0] * ly[0], lx[1] * ly[0], lx[0] * ly[1], lx[1] * ly[1]]
    }

    pub fn shape_derivatives_reference(xi: &[f64; 2]) -> [[f64; 2]; 4] {
        let lx = lagrange1(xi[0]);
        let ly = lagrange1(xi[1]);
        let dlx = lagrange1_deriv(xi[0]);
        let dly = lagrange1_deriv(xi[1]);
        [
            [dlx[0] * ly[0], lx[0] * dly[0]],
            [dlx[1] * ly[0], lx[1] * dly[0]],
            [dlx[0] * ly[1], lx[0] * dly[1]],
            [dlx[1] * ly[1], lx[1] * dly[1]],
        ]
    }

    pub fn evaluate_at_point(xi: &[f64; 2], nodal_values: &[f64; 4]) -> f64 {
        Self::shape_functions(xi)
            .iter()
            .zip(nodal_values.iter())
            .map(|(n, v)| n * v)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rectangle_nodes(x0: f64, y0: f64, hx: f64, hy: f64) -> [Point2<f64>; 9] {
        let mut nodes = [Point2::origin(); 9];
        for b in 0..3 {
            for a in 0..3 {
                nodes[a + 3 * b] = Point2::new(x0 + 0.5 * hx * a as f64, y0 + 0.5 * hy * b as f64);
            }
        }
        nodes
    }

    #[test]
    fn test_partition_of_unity() {
        let test_points = [[0.0, 0.0], [-1.0, -1.0], [0.3, -0.7], [1.0, 0.5]];

        for xi in &test_points {
            let sum: f64 = Quad9Basis::shape_functions(xi).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-14);

            let sum: f64 = Quad4Basis::shape_functions(xi).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-14);

            let dsum: [f64; 2] = Quad9Basis::shape_derivatives_reference(xi)
                .iter()
                .fold([0.0, 0.0], |acc, d| [acc[0] + d[0], acc[1] + d[1]]);
            assert_relative_eq!(dsum[0], 0.0, epsilon = 1e-14);
            assert_relative_eq!(dsum[1], 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_kronecker_delta() {
        for (i, xi) in Quad9Basis::reference_nodes().iter().enumerate() {
            let n = Quad9Basis::shape_functions(xi);
            for (j, &nj) in n.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(nj, expected, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_quadratic_field_gradient_is_exact() {
        let nodes = rectangle_nodes(1.0, 2.0, 0.5, 0.25);
        let f = |p: &Point2<f64>| p.x * p.x + 3.0 * p.x * p.y - p.y * p.y;

        let xi = [0.2, -0.4];
        let (dn, det) = Quad9Basis::shape_derivatives_cartesian(&xi, &nodes).unwrap();
        assert_relative_eq!(det, 0.25 * 0.125, epsilon = 1e-14);

        let p = Quad9Basis::map_to_physical(&xi, &nodes);
        let mut grad = [0.0, 0.0];
        for (node, d) in nodes.iter().zip(dn.iter()) {
            grad[0] += f(node) * d[0];
            grad[1] += f(node) * d[1];
        }
        assert_relative_eq!(grad[0], 2.0 * p.x + 3.0 * p.y, epsilon = 1e-12);
        assert_relative_eq!(grad[1], 3.0 * p.x - 2.0 * p.y, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_element_is_rejected() {
        let nodes = [Point2::new(0.0, 0.0); 9];
        assert!(Quad9Basis::shape_derivatives_cartesian(&[0.0, 0.0], &nodes).is_none());
    }
}
