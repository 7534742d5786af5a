use approx::assert_relative_eq;
use nalgebra::{Point2, Vector2};
use slab_simulator::{AdvectionOrder, MeshGenerator, ParticleLayout, Swarm};

fn single_particle(x: f64, y: f64) -> Swarm {
    Swarm {
        positions: vec![Point2::new(x, y)],
        material: vec![0],
        strain: vec![0.0],
        cell: vec![0],
    }
}

#[test]
fn test_rigid_rotation() {
    let mesh = MeshGenerator::structured_quad_box([4, 4], Point2::origin(), Point2::new(1.0, 1.0)).unwrap();
    // Q2 reproduces the linear rotation field exactly
    let velocity: Vec<_> = mesh
        .geometry
        .nodes
        .iter()
        .map(|p| Vector2::new(-(p.y - 0.5), p.x - 0.5))
        .collect();
    let dt = 0.01;

    let mut midpoint = single_particle(0.75, 0.5);
    let mut euler = single_particle(0.75, 0.5);
    midpoint.relocate(&mesh);
    euler.relocate(&mesh);
    for _ in 0..100 {
        assert_eq!(midpoint.advect(&mesh, &velocity, dt, AdvectionOrder::Midpoint).unwrap(), 0);
        euler.advect(&mesh, &velocity, dt, AdvectionOrder::Euler).unwrap();
    }

    let p = midpoint.positions[0];
    assert_relative_eq!(p.x, 0.5 + 0.25 * 1.0_f64.cos(), epsilon = 1e-4);
    assert_relative_eq!(p.y, 0.5 + 0.25 * 1.0_f64.sin(), epsilon = 1e-4);
    assert_relative_eq!((p - Point2::new(0.5, 0.5)).norm(), 0.25, epsilon = 1e-6);

    // Forward Euler spirals outwards
    let r_euler = (euler.positions[0] - Point2::new(0.5, 0.5)).norm();
    assert!(r_euler > 0.25 + 1e-4);
}

#[test]
fn test_particles_leave_through_outflow_wall() {
    let mesh = MeshGenerator::structured_quad_box([4, 4], Point2::origin(), Point2::new(1.0, 1.0)).unwrap();
    let mut swarm = Swarm::populate(&mesh, 2, ParticleLayout::Gauss).unwrap();
    let velocity = vec![Vector2::new(1.0, 0.0); mesh.num_nodes()];

    let dt = 0.3;
    let expected_lost = swarm.positions.iter().filter(|p| p.x + dt > 1.0).count();
    let before = swarm.len();

    let lost = swarm.advect(&mesh, &velocity, dt, AdvectionOrder::Midpoint).unwrap();
    assert_eq!(lost, expected_lost);
    assert_eq!(swarm.len(), before - lost);
    assert_eq!(swarm.material.len(), swarm.len());
    assert!(swarm.positions.iter().all(|p| p.x <= 1.0));

    // Owning cells are refreshed after the move
    for (p, &cell) in swarm.positions.iter().zip(&swarm.cell) {
        assert_eq!(mesh.locate(p).unwrap().0, cell);
    }
}
