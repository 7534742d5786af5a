//! Derived fields computed from the current solution
//!
//! Quadrature-point quantities (strain-rate invariant, effective viscosity,
//! deviatoric stress invariant) are evaluated element by element and then
//! projected onto the Q1 vertex lattice for output and particle sampling.

use nalgebra::Vector2;
use rayon::prelude::*;
use crate::error::{SimError, SimResult};
use crate::fem::{Assembler, DofManager, GaussQuadrature, Projection, Quad9Basis, QP_PER_ELEMENT};
use crate::mesh::{CellStatistics, FieldData, Mesh, ScalarField, VectorField};
use crate::rheology::{deviatoric_stress_invariant, MaterialTable};

/// Quantities at the 9 quadrature points of every element
#[derive(Debug, Clone)]
pub struct QuadratureFields {
    pub strain_rate: Vec<[f64; QP_PER_ELEMENT]>,
    pub viscosity: Vec<[f64; QP_PER_ELEMENT]>,
    pub stress: Vec<[f64; QP_PER_ELEMENT]>,
}

/// Evaluate strain rate, viscosity and stress from a velocity solution
pub fn compute_quadrature_fields(
    mesh: &Mesh,
    dof_mgr: &DofManager,
    velocity: &[f64],
    materials: &MaterialTable,
    stats: &CellStatistics,
) -> SimResult<QuadratureFields> {
    let strain_rate = Assembler::strain_rate_invariants(mesh, dof_mgr, velocity)?;
    let viscosity = materials.quadrature_viscosity(stats, &strain_rate)?;
    let stress = strain_rate
        .par_iter()
        .zip(viscosity.par_iter())
        .map(|(rates, etas)| {
            let mut tau = [0.0; QP_PER_ELEMENT];
            for q in 0..QP_PER_ELEMENT {
                tau[q] = deviatoric_stress_invariant(etas[q], rates[q]);
            }
            tau
        })
        .collect();
    Ok(QuadratureFields {
        strain_rate,
        viscosity,
        stress,
    })
}

/// Projected ε̇_II on the vertices, negative undershoots clipped
pub fn project_strain_rate(mesh: &Mesh, strain_rate: &[[f64; QP_PER_ELEMENT]]) -> SimResult<Vec<f64>> {
    Projection::new().with_clipping(true).project(mesh, strain_rate)
}

/// Cell-mean material index, `Σ_m f_m · m`
pub fn mean_material_index(stats: &CellStatistics) -> Vec<f64> {
    stats
        .fractions
        .iter()
        .map(|f| f.iter().enumerate().map(|(m, &fm)| m as f64 * fm).sum())
        .collect()
}

/// Velocity of every mesh node from the velocity DOF vector
pub fn nodal_velocity(mesh: &Mesh, dof_mgr: &DofManager, velocity: &[f64]) -> SimResult<Vec<Vector2<f64>>> {
    if velocity.len() != dof_mgr.total_vel_dofs() {
        return Err(SimError::SizeMismatch {
            what: "velocity",
            expected: dof_mgr.total_vel_dofs(),
            actual: velocity.len(),
        });
    }
    Ok((0..mesh.num_nodes())
        .map(|node| {
            Vector2::new(
                velocity[dof_mgr.velocity_dof(node, 0)],
                velocity[dof_mgr.velocity_dof(node, 1)],
            )
        })
        .collect())
}

/// Root-mean-square velocity `sqrt(∫ |u|² dA / ∫ dA)`
pub fn vrms(mesh: &Mesh, nodal: &[Vector2<f64>]) -> SimResult<f64> {
    let quad = GaussQuadrature::quad_3x3();
    let per_element: Vec<(f64, f64)> = (0..mesh.num_elements())
        .into_par_iter()
        .map(|e| {
            let nodes = mesh.element_nodes(e);
            let elem = &mesh.connectivity.elements[e];
            let u_e = elem.nodes.map(|n| nodal[n]);
            let mut integral = 0.0;
            let mut area = 0.0;
            for (xi, w) in quad.points.iter().zip(&quad.weights) {
                let (_, det) = Quad9Basis::shape_derivatives_cartesian(xi, &nodes).ok_or_else(|| {
                    SimError::SolverBreakdown {
                        solver: "vrms",
                        message: "singular element Jacobian".into(),
                    }
                })?;
                let u = Quad9Basis::evaluate_at_point(xi, &u_e);
                integral += u.norm_squared() * w * det.abs();
                area += w * det.abs();
            }
            Ok((integral, area))
        })
        .collect::<SimResult<_>>()?;

    let (integral, area) = per_element
        .iter()
        .fold((0.0, 0.0), |(i, a), (ie, ae)| (i + ie, a + ae));
    Ok(if area > 0.0 { (integral / area).sqrt() } else { 0.0 })
}

/// Smallest and largest quadrature value
fn qp_range(values: &[[f64; QP_PER_ELEMENT]]) -> Option<(f64, f64)> {
    values.iter().flatten().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Project quadrature values and clamp them to their own range
///
/// Keeps projected viscosities inside the material-table bounds and the
/// material index inside `[0, n - 1]`.
fn project_bounded(mesh: &Mesh, values: &[[f64; QP_PER_ELEMENT]]) -> SimResult<Vec<f64>> {
    let projection = match qp_range(values) {
        Some((lo, hi)) => Projection::new().with_bounds(lo, hi),
        None => Projection::new(),
    };
    projection.project(mesh, values)
}

/// Fields written with each mesh snapshot
///
/// # Arguments
/// * `time` - Value stored in the constant `time` field (Myr when scaled)
pub fn mesh_fields(
    mesh: &Mesh,
    velocity: &[Vector2<f64>],
    pressure: &[f64],
    quadrature: &QuadratureFields,
    stats: &CellStatistics,
    time: f64,
) -> SimResult<FieldData> {
    let material_qp: Vec<[f64; QP_PER_ELEMENT]> = mean_material_index(stats)
        .into_iter()
        .map(|m| [m; QP_PER_ELEMENT])
        .collect();

    let mut fields = FieldData::new();
    fields.add_vector_field(VectorField::new("velocity", velocity.to_vec()));
    fields.add_field(ScalarField::new("pressure", pressure.to_vec()));
    fields.add_field(ScalarField::new("strain_rate", project_strain_rate(mesh, &quadrature.strain_rate)?));
    fields.add_field(ScalarField::new("viscosity", project_bounded(mesh, &quadrature.viscosity)?));
    fields.add_field(ScalarField::new("stress", project_bounded(mesh, &quadrature.stress)?));
    fields.add_field(ScalarField::new("material", project_bounded(mesh, &material_qp)?));
    fields.add_field(ScalarField::new("time", vec![time; mesh.num_vertices()]));
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_generator::MeshGenerator;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    #[test]
    fn test_vrms_of_shear_flow() {
        let mesh = MeshGenerator::structured_quad_box([2, 3], Point2::origin(), Point2::new(1.0, 1.0)).unwrap();
        // u = (y, 0): ∫ y² = 1/3
        let nodal: Vec<_> = mesh.geometry.nodes.iter().map(|p| Vector2::new(p.y, 0.0)).collect();
        assert_relative_eq!(vrms(&mesh, &nodal).unwrap(), (1.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_mean_material_index() {
        let stats = CellStatistics {
            fractions: vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.5, 0.5]],
            mean_strain: vec![0.0; 2],
            counts: vec![4, 4],
        };
        assert_eq!(mean_material_index(&stats), vec![0.0, 1.5]);
    }

    #[test]
    fn test_nodal_velocity_checks_length() {
        let mesh = MeshGenerator::structured_quad_box([1, 1], Point2::origin(), Point2::new(1.0, 1.0)).unwrap();
        let dofs = DofManager::new_mixed(mesh.num_nodes(), mesh.num_vertices());
        assert!(nodal_velocity(&mesh, &dofs, &[0.0; 3]).is_err());

        let mut u = vec![0.0; dofs.total_vel_dofs()];
        u[dofs.velocity_dof(2, 1)] = 7.0;
        assert_relative_eq!(nodal_velocity(&mesh, &dofs, &u).unwrap()[2].y, 7.0);
    }

    #[test]
    fn test_mesh_fields_stay_within_bounds() {
        let mesh = MeshGenerator::structured_quad_box([4, 4], Point2::origin(), Point2::new(1.0, 1.0)).unwrap();
        let weak: Vec<bool> = (0..mesh.num_elements()).map(|e| mesh.centroid(e).x > 0.5).collect();
        let viscosity: Vec<_> = weak.iter().map(|&w| [if w { 0.01 } else { 100.0 }; QP_PER_ELEMENT]).collect();
        let quadrature = QuadratureFields {
            strain_rate: vec![[1.0; QP_PER_ELEMENT]; mesh.num_elements()],
            stress: viscosity.iter().map(|eta| eta.map(|v| 2.0 * v)).collect(),
            viscosity,
        };
        let stats = CellStatistics {
            fractions: weak.iter().map(|&w| if w { vec![0.0, 1.0] } else { vec![1.0, 0.0] }).collect(),
            mean_strain: vec![0.0; mesh.num_elements()],
            counts: vec![4; mesh.num_elements()],
        };
        let velocity = vec![Vector2::zeros(); mesh.num_nodes()];
        let pressure = vec![0.0; mesh.num_vertices()];

        let fields = mesh_fields(&mesh, &velocity, &pressure, &quadrature, &stats, 0.0).unwrap();
        let (lo, hi) = fields.get_field("viscosity").unwrap().range().unwrap();
        assert!(lo >= 0.01 && hi <= 100.0, "viscosity range ({}, {})", lo, hi);
        let (lo, hi) = fields.get_field("material").unwrap().range().unwrap();
        assert!(lo >= 0.0 && hi <= 1.0);
        let (lo, hi) = fields.get_field("stress").unwrap().range().unwrap();
        assert!(lo >= 0.02 && hi <= 200.0);
    }
}
