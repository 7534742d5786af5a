use std::collections::HashSet;

/// Degree of Freedom (DOF) manager for the mixed Q2–Q1 Stokes problem
///
/// Velocity DOFs are interleaved per node (`2 node + component`) and come
/// first. Pressure DOFs live on the Q1 vertices and are numbered after all
/// velocity DOFs in the global ordering; `pressure_dof` returns the offset
/// into the pressure block.
#[derive(Debug, Clone)]
pub struct DofManager {
    /// Number of nodes in the mesh
    num_nodes: usize,

    /// Velocity DOFs per node (2 in the plane)
    vel_dofs_per_node: usize,

    /// Total velocity DOFs
    total_vel_dofs: usize,

    /// Number of pressure DOFs (one per Q1 vertex)
    num_pressure_dofs: usize,

    /// Velocity DOFs with Dirichlet boundary conditions
    dirichlet_dofs: HashSet<usize>,

    /// Values for Dirichlet DOFs (indexed by velocity DOF)
    dirichlet_values: Vec<f64>,
}

impl DofManager {
    /// Create a DOF manager for a velocity-only vector problem
    pub fn new(num_nodes: usize, dofs_per_node: usize) -> Self {
        let total_vel_dofs = num_nodes * dofs_per_node;
        Self {
            num_nodes,
            vel_dofs_per_node: dofs_per_node,
            total_vel_dofs,
            num_pressure_dofs: 0,
            dirichlet_dofs: HashSet::new(),
            dirichlet_values: vec![0.0; total_vel_dofs],
        }
    }

    /// Create a DOF manager for the mixed Q2–Q1 formulation
    ///
    /// # Arguments
    /// * `num_nodes` - Total number of Q2 nodes
    /// * `num_vertices` - Number of Q1 vertices carrying a pressure DOF
    pub fn new_mixed(num_nodes: usize, num_vertices: usize) -> Self {
        let mut dofs = Self::new(num_nodes, 2);
        dofs.num_pressure_dofs = num_vertices;
        dofs
    }

    /// Get the global velocity DOF index for a node and component
    pub fn velocity_dof(&self, node_id: usize, component: usize) -> usize {
        debug_assert!(node_id < self.num_nodes);
        debug_assert!(component < self.vel_dofs_per_node);
        node_id * self.vel_dofs_per_node + component
    }

    /// Get the index of a vertex's DOF within the pressure block
    pub fn pressure_dof(&self, vertex_id: usize) -> usize {
        debug_assert!(vertex_id < self.num_pressure_dofs);
        vertex_id
    }

    /// Prescribe a velocity DOF
    ///
    /// Registering the same DOF twice keeps the last value.
    pub fn set_dirichlet(&mut self, dof: usize, value: f64) {
        debug_assert!(dof < self.total_vel_dofs, "DOF index out of bounds");

        self.dirichlet_dofs.insert(dof);
        self.dirichlet_values[dof] = value;
    }

    /// Remove all Dirichlet conditions
    pub fn clear_dirichlet(&mut self) {
        self.dirichlet_dofs.clear();
        self.dirichlet_values.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Check if a DOF has Dirichlet BC
    pub fn is_dirichlet(&self, dof: usize) -> bool {
        self.dirichlet_dofs.contains(&dof)
    }

    /// Get the Dirichlet value for a DOF
    pub fn get_dirichlet_value(&self, dof: usize) -> f64 {
        self.dirichlet_values[dof]
    }

    /// Boolean mask over velocity DOFs, true where constrained
    pub fn dirichlet_mask(&self) -> Vec<bool> {
        let mut mask = vec![false; self.total_vel_dofs];
        for &dof in &self.dirichlet_dofs {
            mask[dof] = true;
        }
        mask
    }

    /// Velocity vector holding prescribed values and zeros elsewhere
    pub fn dirichlet_vector(&self) -> Vec<f64> {
        let mut u = vec![0.0; self.total_vel_dofs];
        for &dof in &self.dirichlet_dofs {
            u[dof] = self.dirichlet_values[dof];
        }
        u
    }

    /// Total number of DOFs (velocity + pressure)
    pub fn total_dofs(&self) -> usize {
        self.total_vel_dofs + self.num_pressure_dofs
    }

    /// Get number of free velocity DOFs
    pub fn num_free_dofs(&self) -> usize {
        self.total_vel_dofs - self.dirichlet_dofs.len()
    }

    /// Get number of constrained DOFs
    pub fn num_constrained_dofs(&self) -> usize {
        self.dirichlet_dofs.len()
    }

    pub fn dofs_per_node(&self) -> usize {
        self.vel_dofs_per_node
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn total_vel_dofs(&self) -> usize {
        self.total_vel_dofs
    }

    pub fn total_pressure_dofs(&self) -> usize {
        self.num_pressure_dofs
    }
}
