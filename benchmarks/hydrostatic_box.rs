/// Benchmark: Hydrostatic Box
///
/// **Goal:** Check that a uniform-density fluid in a free-slip box stays
/// at rest and carries the lithostatic pressure gradient.
///
/// **Setup:**
/// - Unit square, ρ = 1, g = 1, η = 1
/// - Free slip on all walls
///
/// **Analytical Solution:**
///   u = 0,  p(y) = ρg(H - y) up to a constant
///
/// **Success Criteria:**
/// - max |u| < 1e-8
/// - Pressure gradient matches -ρg within 1e-6 at every resolution

use nalgebra::Point2;
use slab_simulator::{
    BoundaryConditions, Material, MaterialTable, MeshGenerator, Model, ParticleLayout, Swarm, ViscosityLaw,
};

fn main() {
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Hydrostatic Box: Pressure Gradient and Spurious Flow");
    println!("═══════════════════════════════════════════════════════════════\n");

    let mut all_passed = true;

    for n in [2, 4, 8, 16] {
        let mesh = MeshGenerator::structured_quad_box([n, n], Point2::origin(), Point2::new(1.0, 1.0))
            .expect("mesh generation failed");
        let swarm = Swarm::populate(&mesh, 2, ParticleLayout::Gauss).expect("swarm population failed");
        let materials = MaterialTable::new(vec![Material::new("fluid", 1.0, ViscosityLaw::constant(1.0))]);

        let mut model = Model::new(mesh, swarm, materials, BoundaryConditions::free_slip_box())
            .expect("model setup failed");
        model.solve(true).expect("Stokes solve failed");

        let max_v = model.velocity.iter().fold(0.0_f64, |m, v| m.max(v.abs()));

        // Pressure is zero-mean on the vertices, so compare against 1/2 - y
        let mut max_p_err = 0.0_f64;
        for (v, &node) in model.mesh.vertex_lattice().iter().enumerate() {
            let y = model.mesh.geometry.nodes[node].y;
            let p = model.pressure[model.dofs.pressure_dof(v)];
            max_p_err = max_p_err.max((p - (0.5 - y)).abs());
        }

        let passed = max_v < 1e-8 && max_p_err < 1e-6;
        all_passed &= passed;
        println!(
            "  {:>2}×{:<2}  max |u| {:.2e}  max pressure error {:.2e}  {}",
            n,
            n,
            max_v,
            max_p_err,
            if passed { "✓" } else { "✗" }
        );
    }

    println!("\n═══════════════════════════════════════════════════════════════");
    if all_passed {
        println!("  ✓ Box stays at rest at every resolution");
    } else {
        println!("  ✗ Spurious flow or pressure error above tolerance");
        std::process::exit(1);
    }
    println!("═══════════════════════════════════════════════════════════════");
}
