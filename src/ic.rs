//! Initial material layout
//!
//! Materials are assigned to particles from an ordered list of regions.
//! Every particle starts in material 0 and each region overwrites the index
//! of the particles it contains, so later regions take precedence.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use crate::error::{SimError, SimResult};
use crate::mesh::Swarm;

/// Geometric selector of a material region
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Region {
    Everywhere,
    /// Strictly below a horizontal line
    Below { y: f64 },
    /// Closed polygon, even–odd rule
    Polygon { vertices: Vec<[f64; 2]> },
    /// Axis-aligned box, bounds inclusive
    Box { xmin: f64, xmax: f64, ymin: f64, ymax: f64 },
}

impl Region {
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        match self {
            Region::Everywhere => true,
            Region::Below { y } => p.y < *y,
            Region::Polygon { vertices } => point_in_polygon(vertices, p),
            Region::Box { xmin, xmax, ymin, ymax } => {
                p.x >= *xmin && p.x <= *xmax && p.y >= *ymin && p.y <= *ymax
            }
        }
    }

    /// Same region with every coordinate multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        match self {
            Region::Everywhere => Region::Everywhere,
            Region::Below { y } => Region::Below { y: y * factor },
            Region::Polygon { vertices } => Region::Polygon {
                vertices: vertices.iter().map(|v| [v[0] * factor, v[1] * factor]).collect(),
            },
            Region::Box { xmin, xmax, ymin, ymax } => Region::Box {
                xmin: xmin * factor,
                xmax: xmax * factor,
                ymin: ymin * factor,
                ymax: ymax * factor,
            },
        }
    }
}

/// Region tagged with the material it assigns
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MaterialRegion {
    pub material: usize,
    #[serde(flatten)]
    pub region: Region,
}

impl MaterialRegion {
    pub fn new(material: usize, region: Region) -> Self {
        Self { material, region }
    }
}

/// Crossing-number test
///
/// A horizontal ray from `p` towards +x crosses the boundary an odd number
/// of times when `p` is inside.
pub fn point_in_polygon(vertices: &[[f64; 2]], p: &Point2<f64>) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = vertices[i];
        let [xj, yj] = vertices[j];
        if (yi > p.y) != (yj > p.y) {
            let x_cross = xi + (p.y - yi) * (xj - xi) / (yj - yi);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Assign materials to every particle
///
/// # Returns
/// Number of particles per material after assignment
///
/// # Errors
/// `SimError::Config` if a region names a material `>= num_materials` or a
/// polygon has fewer than three vertices
pub fn apply_regions(swarm: &mut Swarm, regions: &[MaterialRegion], num_materials: usize) -> SimResult<Vec<usize>> {
    for r in regions {
        if r.material >= num_materials {
            return Err(SimError::Config(format!(
                "region assigns material {} but only {} materials are defined",
                r.material, num_materials
            )));
        }
        if let Region::Polygon { vertices } = &r.region {
            if vertices.len() < 3 {
                return Err(SimError::Config("polygon regions need at least three vertices".into()));
            }
        }
    }

    for (mat, p) in swarm.material.iter_mut().zip(&swarm.positions) {
        *mat = 0;
        for r in regions {
            if r.region.contains(p) {
                *mat = r.material;
            }
        }
    }

    let counts = swarm.material_counts(num_materials);
    log::info!("Material layout: particles per material {:?}", counts);
    Ok(counts)
}

/// Material indices of the subduction layout
pub mod slab {
    pub const UPPER_MANTLE: usize = 0;
    pub const LOWER_MANTLE: usize = 1;
    pub const UPPER_SLAB: usize = 2;
    pub const LOWER_SLAB: usize = 3;
    pub const SLAB_CORE: usize = 4;
}

/// Flat-lying slab with a 15° perturbed tip over a two-layer mantle
///
/// Designed for the 4 × 1 box. The lower mantle starts below `y = 0.4`;
/// the slab is a stack of three polygons (lower, core, upper).
pub fn slab_subduction_layout() -> Vec<MaterialRegion> {
    let lower = vec![[1.2, 0.925], [3.25, 0.925], [3.20, 0.900], [1.2, 0.900], [1.02, 0.825], [1.02, 0.850]];
    let core = vec![[1.2, 0.975], [3.35, 0.975], [3.25, 0.925], [1.2, 0.925], [1.02, 0.850], [1.02, 0.900]];
    let upper = vec![[1.2, 1.000], [3.40, 1.000], [3.35, 0.975], [1.2, 0.975], [1.02, 0.900], [1.02, 0.925]];

    vec![
        MaterialRegion::new(slab::LOWER_MANTLE, Region::Below { y: 0.4 }),
        MaterialRegion::new(slab::LOWER_SLAB, Region::Polygon { vertices: lower }),
        MaterialRegion::new(slab::SLAB_CORE, Region::Polygon { vertices: core }),
        MaterialRegion::new(slab::UPPER_SLAB, Region::Polygon { vertices: upper }),
    ]
}

/// Weak brick of width `width` and height `height` centred on the bottom
/// boundary of `[xmin, xmax] × [ymin, ·]`
pub fn notch_layout(xmin: f64, xmax: f64, ymin: f64, width: f64, height: f64) -> Vec<MaterialRegion> {
    let centre = 0.5 * (xmin + xmax);
    vec![MaterialRegion::new(
        1,
        Region::Box {
            xmin: centre - 0.5 * width,
            xmax: centre + 0.5 * width,
            ymin,
            ymax: ymin + height,
        },
    )]
}
