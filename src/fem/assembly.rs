use sprs::{CsMat, TriMat};
use rayon::prelude::*;
use crate::error::{SimError, SimResult};
use crate::fem::element::{strain_rate_invariant, ElementMatrix, QP_PER_ELEMENT, VEL_DOFS_PER_ELEMENT};
use crate::fem::DofManager;
use crate::mesh::Mesh;

/// Assembled blocks of the Stokes saddle-point system
///
/// ```text
/// [ K   G ] [u]   [f]
/// [ Gᵀ  0 ] [p] = [0]
/// ```
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct StokesSystem {
    /// Velocity block (n_vel × n_vel)
    pub K: CsMat<f64>,
    /// Gradient block (n_vel × n_p)
    pub G: CsMat<f64>,
    /// Body-force load
    pub f: Vec<f64>,
    /// Lumped `∫ N^p / η` for the pressure preconditioner
    pub pressure_diag: Vec<f64>,
}

/// Global matrix assembler
pub struct Assembler;

impl Assembler {
    fn check_len(what: &'static str, expected: usize, actual: usize) -> SimResult<()> {
        if expected != actual {
            return Err(SimError::SizeMismatch { what, expected, actual });
        }
        Ok(())
    }

    /// Assemble all Stokes blocks (parallel over elements)
    ///
    /// # Arguments
    /// * `viscosity` - η at the 9 quadrature points of each element
    /// * `density` - Density per element
    /// * `gravity` - Gravity magnitude (acts in -y)
    /// * `penalty` - Grad-div penalty λ
    #[allow(non_snake_case)]
    pub fn assemble_stokes(
        mesh: &Mesh,
        dof_mgr: &DofManager,
        viscosity: &[[f64; QP_PER_ELEMENT]],
        density: &[f64],
        gravity: f64,
        penalty: f64,
    ) -> SimResult<StokesSystem> {
        let n_elem = mesh.num_elements();
        Self::check_len("element viscosity", n_elem, viscosity.len())?;
        Self::check_len("element density", n_elem, density.len())?;

        let n_vel = dof_mgr.total_vel_dofs();
        let n_p = dof_mgr.total_pressure_dofs();

        // Compute element matrices in parallel
        let element_data: Vec<_> = (0..n_elem)
            .into_par_iter()
            .map(|e| {
                let nodes = mesh.element_nodes(e);
                let k = ElementMatrix::stokes_velocity(&nodes, &viscosity[e], penalty)?;
                let g = ElementMatrix::stokes_gradient(&nodes)?;
                let f = ElementMatrix::body_force(&nodes, density[e], gravity)?;
                let d = ElementMatrix::pressure_mass_diagonal(&nodes, &viscosity[e])?;
                Ok((k, g, f, d))
            })
            .collect::<SimResult<Vec<_>>>()?;

        // Sequential assembly of triplets
        let mut k_tri = TriMat::with_capacity((n_vel, n_vel), n_elem * 18 * 18);
        let mut g_tri = TriMat::with_capacity((n_vel, n_p), n_elem * 18 * 4);
        let mut f = vec![0.0; n_vel];
        let mut pressure_diag = vec![0.0; n_p];

        for (e, (k_e, g_e, f_e, d_e)) in element_data.iter().enumerate() {
            let vel_dofs = Self::element_velocity_dofs(mesh, dof_mgr, e);
            let p_dofs = mesh.element_vertices(e).map(|v| dof_mgr.pressure_dof(v));

            for (a, &ga) in vel_dofs.iter().enumerate() {
                f[ga] += f_e[a];
                for (b, &gb) in vel_dofs.iter().enumerate() {
                    k_tri.add_triplet(ga, gb, k_e[(a, b)]);
                }
                for (q, &gq) in p_dofs.iter().enumerate() {
                    g_tri.add_triplet(ga, gq, g_e[(a, q)]);
                }
            }
            for (q, &gq) in p_dofs.iter().enumerate() {
                pressure_diag[gq] += d_e[q];
            }
        }

        Ok(StokesSystem {
            K: k_tri.to_csr(),
            G: g_tri.to_csr(),
            f,
            pressure_diag,
        })
    }

    /// Global velocity DOFs of an element in `2 k + c` order
    pub fn element_velocity_dofs(
        mesh: &Mesh,
        dof_mgr: &DofManager,
        elem_id: usize,
    ) -> [usize; VEL_DOFS_PER_ELEMENT] {
        let elem = &mesh.connectivity.elements[elem_id];
        let mut dofs = [0; VEL_DOFS_PER_ELEMENT];
        for (k, &node) in elem.nodes.iter().enumerate() {
            dofs[2 * k] = dof_mgr.velocity_dof(node, 0);
            dofs[2 * k + 1] = dof_mgr.velocity_dof(node, 1);
        }
        dofs
    }

    /// Strain-rate invariant `ε̇_II` at every quadrature point
    pub fn strain_rate_invariants(
        mesh: &Mesh,
        dof_mgr: &DofManager,
        velocity: &[f64],
    ) -> SimResult<Vec<[f64; QP_PER_ELEMENT]>> {
        Self::check_len("velocity", dof_mgr.total_vel_dofs(), velocity.len())?;
        (0..mesh.num_elements())
            .into_par_iter()
            .map(|e| {
                let dofs = Self::element_velocity_dofs(mesh, dof_mgr, e);
                let u_e = dofs.map(|d| velocity[d]);
                let rates = ElementMatrix::strain_rates(&mesh.element_nodes(e), &u_e)?;
                Ok(rates.map(|eps| strain_rate_invariant(&eps)))
            })
            .collect()
    }

    /// Assemble the Q1 mass matrix and load for projecting quadrature values
    pub fn assemble_q1_projection(
        mesh: &Mesh,
        values: &[[f64; QP_PER_ELEMENT]],
        smoothing: f64,
    ) -> SimResult<(CsMat<f64>, Vec<f64>)> {
        Self::check_len("quadrature values", mesh.num_elements(), values.len())?;
        let n = mesh.num_vertices();

        let element_data: Vec<_> = (0..mesh.num_elements())
            .into_par_iter()
            .map(|e| ElementMatrix::q1_projection(&mesh.element_nodes(e), &values[e], smoothing))
            .collect::<SimResult<Vec<_>>>()?;

        let mut tri = TriMat::with_capacity((n, n), 16 * element_data.len());
        let mut rhs = vec![0.0; n];
        for (e, (m_e, b_e)) in element_data.iter().enumerate() {
            let verts = mesh.element_vertices(e);
            for q in 0..4 {
                rhs[verts[q]] += b_e[q];
                for r in 0..4 {
                    tri.add_triplet(verts[q], verts[r], m_e[(q, r)]);
                }
            }
        }
        Ok((tri.to_csr(), rhs))
    }

    /// Apply Dirichlet boundary conditions to the velocity block
    ///
    /// For a constrained DOF i with value v_i:
    /// 1. `f[j] -= K[j,i] v_i` for every free row j
    /// 2. Row and column i are zeroed
    /// 3. `K[i,i] = 1`, `f[i] = v_i`
    ///
    /// The result stays symmetric positive definite.
    #[allow(non_snake_case)]
    pub fn apply_dirichlet_bcs(
        K: &CsMat<f64>,
        f: &[f64],
        dof_mgr: &DofManager,
    ) -> (CsMat<f64>, Vec<f64>) {
        let n = dof_mgr.total_vel_dofs();
        let mask = dof_mgr.dirichlet_mask();

        let mut f_new = f.to_vec();
        let mut tri = TriMat::with_capacity((n, n), K.nnz());

        for (row_idx, row) in K.outer_iterator().enumerate() {
            if mask[row_idx] {
                tri.add_triplet(row_idx, row_idx, 1.0);
                f_new[row_idx] = dof_mgr.get_dirichlet_value(row_idx);
            } else {
                for (col_idx, &val) in row.iter() {
                    if mask[col_idx] {
                        f_new[row_idx] -= val * dof_mgr.get_dirichlet_value(col_idx);
                    } else {
                        tri.add_triplet(row_idx, col_idx, val);
                    }
                }
            }
        }

        (tri.to_csr(), f_new)
    }
}
