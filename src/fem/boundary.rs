/// Velocity boundary conditions on the walls of the box
///
/// A condition prescribes selected velocity components on every node of one
/// wall. Free slip is a condition on the normal component only.

use serde::{Deserialize, Serialize};
use crate::error::{SimError, SimResult};
use crate::fem::DofManager;
use crate::mesh::{Boundary, Mesh};

/// Dirichlet condition on one wall
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DirichletBc {
    pub boundary: Boundary,
    /// Prescribed velocity `(vx, vy)`; only entries listed in `components` are used
    pub values: [f64; 2],
    /// Constrained components (0 = x, 1 = y)
    pub components: Vec<usize>,
}

impl DirichletBc {
    /// Free slip: zero normal velocity
    pub fn free_slip(boundary: Boundary) -> Self {
        Self {
            boundary,
            values: [0.0, 0.0],
            components: vec![boundary.normal_component()],
        }
    }

    /// No slip: both components prescribed
    pub fn no_slip(boundary: Boundary, values: [f64; 2]) -> Self {
        Self {
            boundary,
            values,
            components: vec![0, 1],
        }
    }
}

/// Boundary condition manager
#[derive(Debug, Clone, Default)]
pub struct BoundaryConditions {
    dirichlet: Vec<DirichletBc>,
}

impl BoundaryConditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-slip on all four walls
    pub fn free_slip_box() -> Self {
        let mut bcs = Self::new();
        for boundary in Boundary::ALL {
            bcs.dirichlet.push(DirichletBc::free_slip(boundary));
        }
        bcs
    }

    /// Register a Dirichlet condition
    ///
    /// Conditions are applied in registration order, so a later condition
    /// overrides an earlier one on shared corner nodes.
    pub fn add_dirichlet_bc(&mut self, values: [f64; 2], boundary: Boundary, components: &[usize]) {
        self.dirichlet.push(DirichletBc {
            boundary,
            values,
            components: components.to_vec(),
        });
    }

    pub fn push(&mut self, bc: DirichletBc) {
        self.dirichlet.push(bc);
    }

    pub fn dirichlet(&self) -> &[DirichletBc] {
        &self.dirichlet
    }

    pub fn num_dirichlet_bcs(&self) -> usize {
        self.dirichlet.len()
    }

    /// Scale every prescribed value (unit conversion)
    pub fn scale_values(&mut self, factor: f64) {
        for bc in &mut self.dirichlet {
            bc.values[0] *= factor;
            bc.values[1] *= factor;
        }
    }

    /// Whether every wall has its normal velocity prescribed
    ///
    /// When true the pressure is only defined up to a constant.
    pub fn encloses_domain(&self) -> bool {
        Boundary::ALL.iter().all(|b| {
            self.dirichlet
                .iter()
                .any(|bc| bc.boundary == *b && bc.components.contains(&b.normal_component()))
        })
    }

    /// Write the conditions into the DOF manager
    ///
    /// # Errors
    /// `SimError::Config` for a component other than 0 or 1
    pub fn apply(&self, mesh: &Mesh, dof_mgr: &mut DofManager) -> SimResult<()> {
        dof_mgr.clear_dirichlet();
        for bc in &self.dirichlet {
            if let Some(&c) = bc.components.iter().find(|&&c| c > 1) {
                return Err(SimError::Config(format!(
                    "boundary condition on {:?} constrains component {}, expected 0 or 1",
                    bc.boundary, c
                )));
            }
            for node in mesh.boundary_nodes(bc.boundary) {
                for &c in &bc.components {
                    dof_mgr.set_dirichlet(dof_mgr.velocity_dof(node, c), bc.values[c]);
                }
            }
        }
        Ok(())
    }
}
