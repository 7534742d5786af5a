use nalgebra::Point2;
use crate::error::{SimError, SimResult};
use crate::mesh::{Connectivity, FieldData, Geometry, Mesh, Quad9Element, StructuredGrid};

/// Structured mesh generator for box domains
pub struct MeshGenerator;

impl MeshGenerator {
    /// Generate a box `[min, max]` subdivided into `res[0] × res[1]` Quad9 elements
    ///
    /// Lattice points are numbered with the axis that has fewer points
    /// varying fastest. Elements are numbered x-fastest.
    ///
    /// # Errors
    /// Returns `SimError::Config` for zero resolution or an empty box
    pub fn structured_quad_box(
        res: [usize; 2],
        min: Point2<f64>,
        max: Point2<f64>,
    ) -> SimResult<Mesh> {
        if res[0] == 0 || res[1] == 0 {
            return Err(SimError::Config(format!(
                "mesh resolution must be positive, got {}x{}",
                res[0], res[1]
            )));
        }
        if !(max.x > min.x && max.y > min.y) {
            return Err(SimError::Config(format!(
                "mesh box is empty: min = ({}, {}), max = ({}, {})",
                min.x, min.y, max.x, max.y
            )));
        }

        let grid = StructuredGrid {
            res,
            min,
            max,
            x_fastest: res[0] <= res[1],
        };
        let [ni, nj] = grid.lattice_shape();
        let [hx, hy] = grid.cell_size();

        let mut geometry = Geometry::new();
        geometry.nodes = vec![Point2::origin(); ni * nj];
        for j in 0..nj {
            for i in 0..ni {
                geometry.nodes[grid.node_index(i, j)] =
                    Point2::new(min.x + 0.5 * hx * i as f64, min.y + 0.5 * hy * j as f64);
            }
        }
        // Pin the far walls exactly to avoid round-off in boundary tests
        for j in 0..nj {
            geometry.nodes[grid.node_index(ni - 1, j)].x = max.x;
        }
        for i in 0..ni {
            geometry.nodes[grid.node_index(i, nj - 1)].y = max.y;
        }

        let mut connectivity = Connectivity::new();
        for ey in 0..res[1] {
            for ex in 0..res[0] {
                let mut nodes = [0usize; 9];
                for b in 0..3 {
                    for a in 0..3 {
                        nodes[a + 3 * b] = grid.node_index(2 * ex + a, 2 * ey + b);
                    }
                }
                connectivity.add_element(Quad9Element::new(nodes));
            }
        }

        Ok(Mesh {
            geometry,
            connectivity,
            field_data: FieldData::new(),
            grid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Boundary;
    use approx::assert_relative_eq;

    #[test]
    fn test_structured_counts() {
        let mesh = MeshGenerator::structured_quad_box(
            [4, 2],
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 1.0),
        )
        .unwrap();

        assert_eq!(mesh.num_elements(), 8);
        assert_eq!(mesh.num_nodes(), 9 * 5);
        assert_eq!(mesh.connectivity.corner_nodes().len(), 5 * 3);
        assert_eq!(mesh.boundary_nodes(Boundary::Left).len(), 5);
        assert_eq!(mesh.boundary_nodes(Boundary::Top).len(), 9);
        assert!(!mesh.grid.x_fastest);
    }

    #[test]
    fn test_element_node_layout() {
        let mesh = MeshGenerator::structured_quad_box(
            [2, 3],
            Point2::new(-1.0, 0.0),
            Point2::new(1.0, 3.0),
        )
        .unwrap();

        let nodes = mesh.element_nodes(mesh.grid.element_index(1, 2));
        assert_relative_eq!(nodes[0].x, 0.0);
        assert_relative_eq!(nodes[0].y, 2.0);
        assert_relative_eq!(nodes[8].x, 1.0);
        assert_relative_eq!(nodes[8].y, 3.0);
        assert_relative_eq!(nodes[4].x, 0.5);
        assert_relative_eq!(nodes[4].y, 2.5);
    }

    #[test]
    fn test_locate() {
        let mesh = MeshGenerator::structured_quad_box(
            [4, 4],
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
        )
        .unwrap();

        let (elem, xi) = mesh.locate(&Point2::new(0.3, 0.9)).unwrap();
        assert_eq!(mesh.grid.element_coords(elem), (1, 3));
        assert_relative_eq!(xi[0], -0.6, epsilon = 1e-12);
        assert_relative_eq!(xi[1], 0.2, epsilon = 1e-12);

        // Upper wall belongs to the last row of elements
        let (elem, xi) = mesh.locate(&Point2::new(1.0, 1.0)).unwrap();
        assert_eq!(mesh.grid.element_coords(elem), (3, 3));
        assert_relative_eq!(xi[0], 1.0);

        assert!(mesh.locate(&Point2::new(1.2, 0.5)).is_none());
        assert!(mesh.locate(&Point2::new(f64::NAN, 0.5)).is_none());
    }

    #[test]
    fn test_invalid_box() {
        assert!(MeshGenerator::structured_quad_box([0, 2], Point2::origin(), Point2::new(1.0, 1.0)).is_err());
        assert!(MeshGenerator::structured_quad_box([2, 2], Point2::new(1.0, 0.0), Point2::new(1.0, 1.0)).is_err());
    }
}
