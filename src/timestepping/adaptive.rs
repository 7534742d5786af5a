//! Advective timestep selection
//!
//! Particles are moved explicitly, so the step is limited by a Courant
//! condition on the smallest cell:
//!
//! ```text
//! dt = C · h_min / |v|_max,   clamped to [dt_min, dt_max]
//! ```

use serde::{Deserialize, Serialize};
use crate::fem::DofManager;
use crate::mesh::Mesh;

/// Timestep limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimestepConfig {
    /// Courant number C
    pub courant: f64,
    pub dt_min: f64,
    pub dt_max: f64,
}

impl Default for TimestepConfig {
    fn default() -> Self {
        Self {
            courant: 0.5,
            dt_min: 0.0,
            dt_max: f64::INFINITY,
        }
    }
}

/// Timestep with the quantities that produced it
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveTimestep {
    pub dt: f64,
    /// Unclamped Courant step
    pub cfl_dt: f64,
    pub max_velocity: f64,
    pub min_cell_size: f64,
}

impl AdaptiveTimestep {
    /// Check which constraint is limiting the timestep
    pub fn limiting_constraint(&self) -> &'static str {
        if self.dt == self.cfl_dt {
            "CFL"
        } else if self.dt < self.cfl_dt {
            "dt_max"
        } else {
            "dt_min"
        }
    }

    /// Courant number actually used
    pub fn cfl_number(&self) -> f64 {
        if self.max_velocity > 0.0 && self.min_cell_size > 0.0 {
            self.dt * self.max_velocity / self.min_cell_size
        } else {
            0.0
        }
    }
}

/// Largest nodal speed of a velocity DOF vector
pub fn max_speed(mesh: &Mesh, dof_mgr: &DofManager, velocity: &[f64]) -> f64 {
    (0..mesh.num_nodes())
        .map(|node| {
            let vx = velocity[dof_mgr.velocity_dof(node, 0)];
            let vy = velocity[dof_mgr.velocity_dof(node, 1)];
            (vx * vx + vy * vy).sqrt()
        })
        .fold(0.0, f64::max)
}

/// Compute the Courant-limited timestep
///
/// A motionless velocity field gives `dt_max` (infinite unless configured).
pub fn compute_adaptive_timestep(
    mesh: &Mesh,
    dof_mgr: &DofManager,
    velocity: &[f64],
    config: &TimestepConfig,
) -> AdaptiveTimestep {
    let min_cell_size = mesh.min_cell_size();
    let max_velocity = max_speed(mesh, dof_mgr, velocity);

    let cfl_dt = if max_velocity > 0.0 {
        config.courant * min_cell_size / max_velocity
    } else {
        f64::INFINITY
    };
    let dt = cfl_dt.min(config.dt_max).max(config.dt_min);

    AdaptiveTimestep {
        dt,
        cfl_dt,
        max_velocity,
        min_cell_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_generator::MeshGenerator;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    #[test]
    fn test_courant_step_and_clamping() {
        let mesh = MeshGenerator::structured_quad_box([4, 2], Point2::origin(), Point2::new(4.0, 1.0)).unwrap();
        let dofs = DofManager::new_mixed(mesh.num_nodes(), mesh.num_vertices());

        let mut velocity = vec![0.0; dofs.total_vel_dofs()];
        velocity[dofs.velocity_dof(3, 0)] = 3.0;
        velocity[dofs.velocity_dof(3, 1)] = 4.0;

        let config = TimestepConfig::default();
        let step = compute_adaptive_timestep(&mesh, &dofs, &velocity, &config);
        assert_relative_eq!(step.max_velocity, 5.0);
        assert_relative_eq!(step.dt, 0.5 * 0.5 / 5.0);
        assert_eq!(step.limiting_constraint(), "CFL");
        assert_relative_eq!(step.cfl_number(), 0.5);

        let capped = compute_adaptive_timestep(&mesh, &dofs, &velocity, &TimestepConfig { dt_max: 0.01, ..config });
        assert_relative_eq!(capped.dt, 0.01);
        assert_eq!(capped.limiting_constraint(), "dt_max");

        let still = compute_adaptive_timestep(&mesh, &dofs, &vec![0.0; dofs.total_vel_dofs()], &TimestepConfig::default());
        assert!(still.dt.is_infinite());
    }
}
