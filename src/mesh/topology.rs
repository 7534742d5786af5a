/// A 9-node biquadratic quadrilateral element (Quad9)
///
/// Local nodes are numbered in tensor order `k = a + 3 b`, where `a` runs
/// along x and `b` along y:
///
/// ```text
///   6 --- 7 --- 8
///   |           |
///   3     4     5
///   |           |
///   0 --- 1 --- 2
/// ```
///
/// Corners 0, 2, 6, 8 are the vertex nodes that carry the Q1 pressure.
#[derive(Debug, Clone)]
pub struct Quad9Element {
    /// Global node indices for this element (9 nodes)
    pub nodes: [usize; 9],
}

impl Quad9Element {
    /// Local indices of the corner nodes, in Q1 tensor order (a + 2 b)
    pub const CORNERS: [usize; 4] = [0, 2, 6, 8];

    pub fn new(nodes: [usize; 9]) -> Self {
        Self { nodes }
    }

    /// Global indices of the 4 corner nodes in Q1 tensor order
    pub fn vertices(&self) -> [usize; 4] {
        [
            self.nodes[Self::CORNERS[0]],
            self.nodes[Self::CORNERS[1]],
            self.nodes[Self::CORNERS[2]],
            self.nodes[Self::CORNERS[3]],
        ]
    }

    /// Corner nodes in counter-clockwise order (for VTK quads)
    pub fn vertices_ccw(&self) -> [usize; 4] {
        [self.nodes[0], self.nodes[2], self.nodes[8], self.nodes[6]]
    }
}

/// Connectivity information for the mesh
#[derive(Debug, Clone, Default)]
pub struct Connectivity {
    pub elements: Vec<Quad9Element>,
}

impl Connectivity {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    pub fn add_element(&mut self, element: Quad9Element) {
        self.elements.push(element);
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// All unique vertex (corner) nodes, sorted
    pub fn corner_nodes(&self) -> Vec<usize> {
        let mut corners: Vec<usize> = self
            .elements
            .iter()
            .flat_map(|elem| elem.vertices())
            .collect();
        corners.sort_unstable();
        corners.dedup();
        corners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_nodes_are_unique() {
        let mut conn = Connectivity::new();
        conn.add_element(Quad9Element::new([0, 1, 2, 5, 6, 7, 10, 11, 12]));
        conn.add_element(Quad9Element::new([2, 3, 4, 7, 8, 9, 12, 13, 14]));

        assert_eq!(conn.corner_nodes(), vec![0, 2, 4, 10, 12, 14]);
    }

    #[test]
    fn test_vertices_ccw() {
        let elem = Quad9Element::new([0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(elem.vertices(), [0, 2, 6, 8]);
        assert_eq!(elem.vertices_ccw(), [0, 2, 8, 6]);
    }
}
