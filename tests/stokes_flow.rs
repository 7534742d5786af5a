use approx::assert_relative_eq;
use nalgebra::Point2;
use slab_simulator::{
    Boundary, BoundaryConditions, Material, MaterialTable, MeshGenerator, Model, ParticleLayout, Swarm,
    ViscosityLaw,
};

/// Model on the unit square with material 1 wherever `inside` holds
fn unit_square_model<F>(res: usize, materials: MaterialTable, bcs: BoundaryConditions, inside: F) -> Model
where
    F: Fn(&Point2<f64>) -> bool,
{
    let mesh = MeshGenerator::structured_quad_box([res, res], Point2::origin(), Point2::new(1.0, 1.0)).unwrap();
    let mut swarm = Swarm::populate(&mesh, 2, ParticleLayout::Gauss).unwrap();
    for (p, m) in swarm.positions.iter().zip(swarm.material.iter_mut()) {
        if inside(p) {
            *m = 1;
        }
    }
    Model::new(mesh, swarm, materials, bcs).unwrap()
}

fn fluid(density: f64, viscosity: f64) -> Material {
    Material::new("fluid", density, ViscosityLaw::constant(viscosity))
}

#[test]
fn test_hydrostatic_box_is_at_rest() {
    let materials = MaterialTable::new(vec![fluid(1.0, 1.0), fluid(1.0, 1.0)]);
    let mut model = unit_square_model(4, materials, BoundaryConditions::free_slip_box(), |_| false);
    let stats = model.solve(true).unwrap();
    assert!(stats.converged);

    let max_v = model.velocity.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    assert!(max_v < 1e-8, "hydrostatic box moved: {:e}", max_v);

    // p = -ρ g y, zero mean over the vertices
    for (v, &node) in model.mesh.vertex_lattice().iter().enumerate() {
        let y = model.mesh.geometry.nodes[node].y;
        assert_relative_eq!(model.pressure[model.dofs.pressure_dof(v)], 0.5 - y, epsilon = 1e-6);
    }
}

#[test]
fn test_two_layer_couette_profile() {
    let (eta_low, eta_high) = (1.0, 10.0);
    let materials = MaterialTable::new(vec![fluid(0.0, eta_low), fluid(0.0, eta_high)]);

    let mut bcs = BoundaryConditions::new();
    bcs.add_dirichlet_bc([0.0, 0.0], Boundary::Bottom, &[0, 1]);
    bcs.add_dirichlet_bc([1.0, 0.0], Boundary::Top, &[0, 1]);
    bcs.add_dirichlet_bc([0.0, 0.0], Boundary::Left, &[1]);
    bcs.add_dirichlet_bc([0.0, 0.0], Boundary::Right, &[1]);

    let mut model = unit_square_model(4, materials, bcs, |p| p.y > 0.5);
    model.solve(true).unwrap();

    // Shear stress continuity: η₁ s₁ = η₂ s₂ with s₁ h + s₂ h = V
    let u_interface = eta_high / (eta_low + eta_high);
    let nodal = model.nodal_velocity().unwrap();
    for (node, p) in model.mesh.geometry.nodes.iter().enumerate() {
        let expected = if p.y <= 0.5 {
            2.0 * u_interface * p.y
        } else {
            u_interface + 2.0 * (1.0 - u_interface) * (p.y - 0.5)
        };
        assert_relative_eq!(nodal[node].x, expected, epsilon = 1e-6);
        assert_relative_eq!(nodal[node].y, 0.0, epsilon = 1e-6);
    }
}

#[test]
fn test_dense_block_sinks_symmetrically() {
    let materials = MaterialTable::new(vec![fluid(1.0, 1.0), fluid(2.0, 1.0)]);
    let block = |p: &Point2<f64>| (0.375..0.625).contains(&p.x) && (0.375..0.625).contains(&p.y);
    let mut model = unit_square_model(8, materials, BoundaryConditions::free_slip_box(), block);
    model.solve(true).unwrap();

    let centre = model
        .mesh
        .geometry
        .nodes
        .iter()
        .position(|p| (p.x - 0.5).abs() < 1e-12 && (p.y - 0.5).abs() < 1e-12)
        .unwrap();
    let nodal = model.nodal_velocity().unwrap();
    let v_max = model.max_velocity();

    assert!(v_max > 0.0);
    assert!(nodal[centre].y < 0.0);
    assert!(nodal[centre].x.abs() < 1e-6 * v_max);
    assert!(model.vrms().unwrap() > 0.0);

    let step = model.estimate_dt();
    assert_relative_eq!(step.dt, 0.5 * 0.125 / v_max, max_relative = 1e-12);
}
