use nalgebra::{Point2, Vector2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::error::{SimError, SimResult};
use crate::fem::{GaussQuadrature, Quad4Basis, Quad9Basis};
use crate::mesh::Mesh;

/// In-cell placement of particles when populating a swarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleLayout {
    /// Gauss–Legendre points of order `fill` in each direction
    #[default]
    Gauss,
    /// Evenly spaced at cell-fraction centres
    Regular,
}

/// Time integration order for particle advection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvectionOrder {
    /// Forward Euler
    Euler,
    /// Midpoint Runge–Kutta
    #[default]
    Midpoint,
}

/// Structure-of-arrays material-point swarm
///
/// Every array has one entry per particle. `cell` caches the element that
/// owns each particle and is refreshed after every move.
#[derive(Debug, Clone, Default)]
pub struct Swarm {
    pub positions: Vec<Point2<f64>>,
    pub material: Vec<usize>,
    /// Accumulated plastic strain
    pub strain: Vec<f64>,
    pub cell: Vec<usize>,
}

/// Particle-derived quantities per mesh cell
#[derive(Debug, Clone)]
pub struct CellStatistics {
    /// `fractions[e][m]`: fraction of particles in cell `e` carrying material `m`
    pub fractions: Vec<Vec<f64>>,
    /// Mean accumulated strain per cell
    pub mean_strain: Vec<f64>,
    /// Particles owned by each cell (before borrowing)
    pub counts: Vec<usize>,
}

impl Swarm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of particles in the swarm
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Fill every cell with `fill × fill` particles of material 0
    ///
    /// # Errors
    /// Returns `SimError::Config` when `fill` is zero or exceeds the
    /// supported Gauss order
    pub fn populate(mesh: &Mesh, fill: usize, layout: ParticleLayout) -> SimResult<Self> {
        if fill == 0 {
            return Err(SimError::Config("swarm fill parameter must be positive".into()));
        }
        let points_1d = match layout {
            ParticleLayout::Gauss => GaussQuadrature::points_1d(fill).ok_or_else(|| {
                SimError::Config(format!("Gauss particle layout supports fill 1..=4, got {}", fill))
            })?,
            ParticleLayout::Regular => (0..fill)
                .map(|k| -1.0 + (2 * k + 1) as f64 / fill as f64)
                .collect(),
        };

        let n = mesh.num_elements() * fill * fill;
        let mut swarm = Swarm {
            positions: Vec::with_capacity(n),
            material: Vec::with_capacity(n),
            strain: Vec::with_capacity(n),
            cell: Vec::with_capacity(n),
        };

        for elem_id in 0..mesh.num_elements() {
            let nodes = mesh.element_nodes(elem_id);
            for &eta in &points_1d {
                for &xi in &points_1d {
                    swarm.positions.push(Quad9Basis::map_to_physical(&[xi, eta], &nodes));
                    swarm.material.push(0);
                    swarm.strain.push(0.0);
                    swarm.cell.push(elem_id);
                }
            }
        }
        Ok(swarm)
    }

    /// Add a uniform random offset in `[0, amplitude)` to each coordinate
    ///
    /// The generator is seeded so runs are reproducible. Particles pushed
    /// outside the domain are removed.
    ///
    /// # Returns
    /// Number of particles removed
    pub fn jitter(&mut self, mesh: &Mesh, amplitude: f64, seed: u64) -> usize {
        let mut rng = StdRng::seed_from_u64(seed);
        for p in self.positions.iter_mut() {
            p.x += amplitude * rng.gen::<f64>();
            p.y += amplitude * rng.gen::<f64>();
        }
        self.relocate(mesh)
    }

    /// Recompute owning cells and drop particles outside the mesh
    ///
    /// # Returns
    /// Number of particles removed
    pub fn relocate(&mut self, mesh: &Mesh) -> usize {
        let located: Vec<Option<usize>> = self
            .positions
            .par_iter()
            .map(|p| mesh.locate(p).map(|(e, _)| e))
            .collect();
        self.retain_located(&located)
    }

    fn retain_located(&mut self, located: &[Option<usize>]) -> usize {
        let before = self.len();
        let mut write = 0;
        for read in 0..before {
            if let Some(elem) = located[read] {
                self.positions[write] = self.positions[read];
                self.material[write] = self.material[read];
                self.strain[write] = self.strain[read];
                self.cell[write] = elem;
                write += 1;
            }
        }
        self.positions.truncate(write);
        self.material.truncate(write);
        self.strain.truncate(write);
        self.cell.truncate(write);
        before - write
    }

    /// Move particles through a Q2 nodal velocity field
    ///
    /// # Arguments
    /// * `velocity` - One velocity vector per mesh node
    ///
    /// # Returns
    /// Number of particles that left the domain and were removed
    pub fn advect(
        &mut self,
        mesh: &Mesh,
        velocity: &[Vector2<f64>],
        dt: f64,
        order: AdvectionOrder,
    ) -> SimResult<usize> {
        if velocity.len() != mesh.num_nodes() {
            return Err(SimError::SizeMismatch {
                what: "nodal velocity",
                expected: mesh.num_nodes(),
                actual: velocity.len(),
            });
        }

        let moved: Vec<Option<(Point2<f64>, usize)>> = self
            .positions
            .par_iter()
            .map(|p| {
                let k1 = sample_q2(mesh, velocity, p)?;
                let step = match order {
                    AdvectionOrder::Euler => k1,
                    AdvectionOrder::Midpoint => {
                        let mid = *p + k1 * (0.5 * dt);
                        sample_q2(mesh, velocity, &mid)?
                    }
                };
                let new_pos = *p + step * dt;
                let (elem, _) = mesh.locate(&new_pos)?;
                Some((new_pos, elem))
            })
            .collect();

        let mut located = Vec::with_capacity(moved.len());
        for (pos, entry) in self.positions.iter_mut().zip(moved) {
            located.push(entry.map(|(new_pos, elem)| {
                *pos = new_pos;
                elem
            }));
        }
        Ok(self.retain_located(&located))
    }

    /// Interpolate a Q1 vertex field to every particle
    pub fn interpolate_q1(&self, mesh: &Mesh, field: &[f64]) -> SimResult<Vec<f64>> {
        if field.len() != mesh.num_vertices() {
            return Err(SimError::SizeMismatch {
                what: "vertex field",
                expected: mesh.num_vertices(),
                actual: field.len(),
            });
        }
        Ok(self
            .positions
            .par_iter()
            .map(|p| sample_q1(mesh, field, p).unwrap_or(0.0))
            .collect())
    }

    /// Accumulate strain from a Q1 strain-rate field
    ///
    /// `ε ← max(ε + dt ε̇_II − dt healing, 0)`
    pub fn update_strain(
        &mut self,
        mesh: &Mesh,
        strain_rate: &[f64],
        dt: f64,
        healing_rate: f64,
    ) -> SimResult<()> {
        let rates = self.interpolate_q1(mesh, strain_rate)?;
        self.strain
            .par_iter_mut()
            .zip(rates.par_iter())
            .for_each(|(strain, &rate)| {
                *strain = (*strain + dt * rate - dt * healing_rate).max(0.0);
            });
        Ok(())
    }

    /// Per-cell material fractions and mean strain
    ///
    /// Cells without particles copy the statistics of the nearest populated
    /// cell on the structured grid.
    ///
    /// # Errors
    /// `SimError::EmptySwarm` if no particle is left, `SimError::Config` if a
    /// particle carries a material index `>= num_materials`
    pub fn cell_statistics(&self, mesh: &Mesh, num_materials: usize) -> SimResult<CellStatistics> {
        if self.is_empty() {
            return Err(SimError::EmptySwarm);
        }
        let n_cells = mesh.num_elements();
        let mut fractions = vec![vec![0.0; num_materials]; n_cells];
        let mut mean_strain = vec![0.0; n_cells];
        let mut counts = vec![0usize; n_cells];

        for ((&cell, &mat), &strain) in self.cell.iter().zip(&self.material).zip(&self.strain) {
            if mat >= num_materials {
                return Err(SimError::Config(format!(
                    "particle material index {} but only {} materials are defined",
                    mat, num_materials
                )));
            }
            fractions[cell][mat] += 1.0;
            mean_strain[cell] += strain;
            counts[cell] += 1;
        }

        for cell in 0..n_cells {
            if counts[cell] > 0 {
                let inv = 1.0 / counts[cell] as f64;
                fractions[cell].iter_mut().for_each(|f| *f *= inv);
                mean_strain[cell] *= inv;
            }
        }

        let empty: Vec<usize> = (0..n_cells).filter(|&c| counts[c] == 0).collect();
        if !empty.is_empty() {
            log::debug!("{} cells without particles borrow from neighbours", empty.len());
        }
        for cell in empty {
            if let Some(donor) = nearest_populated(mesh, &counts, cell) {
                fractions[cell] = fractions[donor].clone();
                mean_strain[cell] = mean_strain[donor];
            }
        }

        Ok(CellStatistics {
            fractions,
            mean_strain,
            counts,
        })
    }

    /// Count particles per material
    pub fn material_counts(&self, num_materials: usize) -> Vec<usize> {
        let mut counts = vec![0; num_materials];
        for &m in &self.material {
            if m < num_materials {
                counts[m] += 1;
            }
        }
        counts
    }
}

/// Search rings of growing radius for the closest cell that owns particles
fn nearest_populated(mesh: &Mesh, counts: &[usize], cell: usize) -> Option<usize> {
    let [nx, ny] = mesh.grid.res;
    let (cx, cy) = mesh.grid.element_coords(cell);
    let max_radius = nx.max(ny);

    for radius in 1..=max_radius {
        let mut best: Option<(usize, usize)> = None;
        let x_lo = cx.saturating_sub(radius);
        let x_hi = (cx + radius).min(nx - 1);
        let y_lo = cy.saturating_sub(radius);
        let y_hi = (cy + radius).min(ny - 1);
        for ey in y_lo..=y_hi {
            for ex in x_lo..=x_hi {
                let dx = ex.abs_diff(cx);
                let dy = ey.abs_diff(cy);
                if dx.max(dy) != radius {
                    continue;
                }
                let candidate = mesh.grid.element_index(ex, ey);
                if counts[candidate] == 0 {
                    continue;
                }
                let dist2 = dx * dx + dy * dy;
                if best.map_or(true, |(_, d)| dist2 < d) {
                    best = Some((candidate, dist2));
                }
            }
        }
        if let Some((candidate, _)) = best {
            return Some(candidate);
        }
    }
    None
}

/// Evaluate a Q2 nodal vector field at a physical point
pub fn sample_q2(mesh: &Mesh, values: &[Vector2<f64>], p: &Point2<f64>) -> Option<Vector2<f64>> {
    let (elem_id, xi) = mesh.locate(p)?;
    let elem = &mesh.connectivity.elements[elem_id];
    let mut nodal = [Vector2::zeros(); 9];
    for (v, &node) in nodal.iter_mut().zip(elem.nodes.iter()) {
        *v = values[node];
    }
    Some(Quad9Basis::evaluate_at_point(&xi, &nodal))
}

/// Evaluate a Q1 vertex field at a physical point
pub fn sample_q1(mesh: &Mesh, values: &[f64], p: &Point2<f64>) -> Option<f64> {
    let (elem_id, xi) = mesh.locate(p)?;
    let verts = mesh.element_vertices(elem_id);
    let nodal = [values[verts[0]], values[verts[1]], values[verts[2]], values[verts[3]]];
    Some(Quad4Basis::evaluate_at_point(&xi, &nodal))
}
