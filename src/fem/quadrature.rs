/// Gauss–Legendre tensor quadrature on the reference square `[-1, 1]²`
pub struct GaussQuadrature {
    /// Integration point coordinates `[ξ, η]`
    pub points: Vec<[f64; 2]>,
    /// Integration weights
    pub weights: Vec<f64>,
}

impl GaussQuadrature {
    fn tensor(points_1d: &[f64], weights_1d: &[f64]) -> Self {
        let n = points_1d.len();
        let mut points = Vec::with_capacity(n * n);
        let mut weights = Vec::with_capacity(n * n);
        for (yj, wj) in points_1d.iter().zip(weights_1d) {
            for (xi, wi) in points_1d.iter().zip(weights_1d) {
                points.push([*xi, *yj]);
                weights.push(wi * wj);
            }
        }
        Self { points, weights }
    }

    /// 2×2 rule, exact for bicubic polynomials
    ///
    /// Used for Q1 mass matrices and the material-point cell layout.
    pub fn quad_2x2() -> Self {
        let a = 1.0 / 3.0_f64.sqrt();
        Self::tensor(&[-a, a], &[1.0, 1.0])
    }

    /// 3×3 rule, exact for biquintic polynomials
    ///
    /// Standard rule for Q2 velocity stiffness.
    pub fn quad_3x3() -> Self {
        let a = (3.0_f64 / 5.0).sqrt();
        Self::tensor(&[-a, 0.0, a], &[5.0 / 9.0, 8.0 / 9.0, 5.0 / 9.0])
    }

    /// 1D Gauss–Legendre points of a given order (1 to 4)
    ///
    /// Returns `None` for unsupported orders.
    pub fn points_1d(order: usize) -> Option<Vec<f64>> {
        match order {
            1 => Some(vec![0.0]),
            2 => {
                let a = 1.0 / 3.0_f64.sqrt();
                Some(vec![-a, a])
            }
            3 => {
                let a = (3.0_f64 / 5.0).sqrt();
                Some(vec![-a, 0.0, a])
            }
            4 => {
                let a = (3.0 / 7.0 - 2.0 / 7.0 * (6.0_f64 / 5.0).sqrt()).sqrt();
                let b = (3.0 / 7.0 + 2.0 / 7.0 * (6.0_f64 / 5.0).sqrt()).sqrt();
                Some(vec![-b, -a, a, b])
            }
            _ => None,
        }
    }

    /// Get the number of integration points
    pub fn num_points(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weights_sum() {
        // Weights sum to the area of the reference square
        for rule in [GaussQuadrature::quad_2x2(), GaussQuadrature::quad_3x3()] {
            let sum: f64 = rule.weights.iter().sum();
            assert_relative_eq!(sum, 4.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_polynomial_exactness() {
        // ∫∫ ξ⁴ η² over [-1,1]² = (2/5)(2/3)
        let rule = GaussQuadrature::quad_3x3();
        let integral: f64 = rule
            .points
            .iter()
            .zip(rule.weights.iter())
            .map(|(p, w)| p[0].powi(4) * p[1].powi(2) * w)
            .sum();
        assert_relative_eq!(integral, 4.0 / 15.0, epsilon = 1e-14);
    }

    #[test]
    fn test_points_1d() {
        assert_eq!(GaussQuadrature::points_1d(3).map(|p| p.len()), Some(3));
        assert!(GaussQuadrature::points_1d(7).is_none());
    }
}
