use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use super::topology::Connectivity;
use super::fields::FieldData;

/// Geometric information for the mesh
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    /// Node coordinates
    pub nodes: Vec<Point2<f64>>,
}

impl Geometry {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn get_node(&self, idx: usize) -> Option<&Point2<f64>> {
        self.nodes.get(idx)
    }
}

/// Named walls of the box domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    Left,
    Right,
    Top,
    Bottom,
}

impl Boundary {
    pub const ALL: [Boundary; 4] = [Boundary::Left, Boundary::Right, Boundary::Top, Boundary::Bottom];

    /// Velocity component normal to this wall
    pub fn normal_component(&self) -> usize {
        match self {
            Boundary::Left | Boundary::Right => 0,
            Boundary::Top | Boundary::Bottom => 1,
        }
    }
}

/// Layout of the structured node grid
///
/// The Q2 node lattice has `(2 nx + 1) × (2 ny + 1)` points. Nodes are
/// numbered along the axis with fewer points first, which keeps the
/// envelope of the assembled matrices narrow for the sparse Cholesky.
#[derive(Debug, Clone, Copy)]
pub struct StructuredGrid {
    /// Elements in x and y
    pub res: [usize; 2],
    pub min: Point2<f64>,
    pub max: Point2<f64>,
    /// True when x is the fastest-varying lattice index
    pub x_fastest: bool,
}

impl StructuredGrid {
    /// Lattice points per direction
    pub fn lattice_shape(&self) -> [usize; 2] {
        [2 * self.res[0] + 1, 2 * self.res[1] + 1]
    }

    /// Global node index of lattice point (i, j)
    pub fn node_index(&self, i: usize, j: usize) -> usize {
        let [ni, nj] = self.lattice_shape();
        debug_assert!(i < ni && j < nj);
        if self.x_fastest {
            j * ni + i
        } else {
            i * nj + j
        }
    }

    /// Element size in x and y
    pub fn cell_size(&self) -> [f64; 2] {
        [
            (self.max.x - self.min.x) / self.res[0] as f64,
            (self.max.y - self.min.y) / self.res[1] as f64,
        ]
    }

    pub fn element_index(&self, ex: usize, ey: usize) -> usize {
        ey * self.res[0] + ex
    }

    pub fn element_coords(&self, elem_id: usize) -> (usize, usize) {
        (elem_id % self.res[0], elem_id / self.res[0])
    }
}

/// Complete mesh with geometry and topology
#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Geometry,
    pub connectivity: Connectivity,
    pub field_data: FieldData,
    pub grid: StructuredGrid,
}

impl Mesh {
    pub fn num_nodes(&self) -> usize {
        self.geometry.num_nodes()
    }

    pub fn num_elements(&self) -> usize {
        self.connectivity.num_elements()
    }

    /// Coordinates of the 9 nodes of an element
    pub fn element_nodes(&self, elem_id: usize) -> [Point2<f64>; 9] {
        let elem = &self.connectivity.elements[elem_id];
        let mut nodes = [Point2::origin(); 9];
        for (i, &node_id) in elem.nodes.iter().enumerate() {
            nodes[i] = self.geometry.nodes[node_id];
        }
        nodes
    }

    /// Element centroid
    pub fn centroid(&self, elem_id: usize) -> Point2<f64> {
        // Local node 4 is the element centre
        self.geometry.nodes[self.connectivity.elements[elem_id].nodes[4]]
    }

    /// Nodes lying on a wall of the box
    pub fn boundary_nodes(&self, boundary: Boundary) -> Vec<usize> {
        let [ni, nj] = self.grid.lattice_shape();
        match boundary {
            Boundary::Left => (0..nj).map(|j| self.grid.node_index(0, j)).collect(),
            Boundary::Right => (0..nj).map(|j| self.grid.node_index(ni - 1, j)).collect(),
            Boundary::Bottom => (0..ni).map(|i| self.grid.node_index(i, 0)).collect(),
            Boundary::Top => (0..ni).map(|i| self.grid.node_index(i, nj - 1)).collect(),
        }
    }

    /// Number of Q1 vertices, `(nx + 1) × (ny + 1)`
    pub fn num_vertices(&self) -> usize {
        (self.grid.res[0] + 1) * (self.grid.res[1] + 1)
    }

    /// Q1 vertex indices of an element in tensor order (a + 2 b)
    ///
    /// Vertex indices number the Q1 sub-lattice x-fastest; pressure and
    /// projected fields are stored in this order.
    pub fn element_vertices(&self, elem_id: usize) -> [usize; 4] {
        let (ex, ey) = self.grid.element_coords(elem_id);
        let stride = self.grid.res[0] + 1;
        let v0 = ey * stride + ex;
        [v0, v0 + 1, v0 + stride, v0 + stride + 1]
    }

    /// Global node index of every Q1 vertex, in vertex order
    ///
    /// This is also the point ordering used for VTK output.
    pub fn vertex_lattice(&self) -> Vec<usize> {
        let [nx, ny] = self.grid.res;
        let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                nodes.push(self.grid.node_index(2 * i, 2 * j));
            }
        }
        nodes
    }

    /// Whether a point lies inside the domain (with a relative tolerance)
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        let tol = 1e-10 * (self.grid.max.x - self.grid.min.x).max(self.grid.max.y - self.grid.min.y);
        p.x >= self.grid.min.x - tol
            && p.x <= self.grid.max.x + tol
            && p.y >= self.grid.min.y - tol
            && p.y <= self.grid.max.y + tol
    }

    /// Find the element containing a point and its reference coordinates
    ///
    /// # Returns
    /// `(element id, [ξ, η])` with ξ, η ∈ [-1, 1], or `None` outside the domain
    pub fn locate(&self, p: &Point2<f64>) -> Option<(usize, [f64; 2])> {
        if !p.x.is_finite() || !p.y.is_finite() || !self.contains(p) {
            return None;
        }
        let [hx, hy] = self.grid.cell_size();
        let [nx, ny] = self.grid.res;

        let fx = (p.x - self.grid.min.x) / hx;
        let fy = (p.y - self.grid.min.y) / hy;
        let ex = (fx.floor().max(0.0) as usize).min(nx - 1);
        let ey = (fy.floor().max(0.0) as usize).min(ny - 1);

        let xi = (2.0 * (fx - ex as f64) - 1.0).clamp(-1.0, 1.0);
        let eta = (2.0 * (fy - ey as f64) - 1.0).clamp(-1.0, 1.0);

        Some((self.grid.element_index(ex, ey), [xi, eta]))
    }

    /// Smallest element edge length
    pub fn min_cell_size(&self) -> f64 {
        let [hx, hy] = self.grid.cell_size();
        hx.min(hy)
    }

    /// Domain extent in x and y
    pub fn extent(&self) -> [f64; 2] {
        [self.grid.max.x - self.grid.min.x, self.grid.max.y - self.grid.min.y]
    }
}
