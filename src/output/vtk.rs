//! Legacy VTK output of mesh fields and particle swarms
//!
//! The mesh is written as bilinear quads over the Q1 vertex lattice, which
//! is where pressure and every projected field live. Q2 velocity is
//! sampled at the same vertices. The swarm is written as a vertex-only
//! poly data set.

use std::fs;
use std::path::{Path, PathBuf};
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, IOBuffer,
    Piece, PolyDataPiece, UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};
use crate::error::{SimError, SimResult};
use crate::mesh::{FieldData, Mesh, Swarm};

fn scalar_attribute(name: &str, data: Vec<f64>) -> Attribute {
    Attribute::DataArray(DataArray {
        name: name.to_string(),
        elem: ElementType::Scalars {
            num_comp: 1,
            lookup_table: None,
        },
        data: IOBuffer::F64(data),
    })
}

fn vector_attribute(name: &str, data: Vec<f64>) -> Attribute {
    Attribute::DataArray(DataArray {
        name: name.to_string(),
        elem: ElementType::Vectors,
        data: IOBuffer::F64(data),
    })
}

/// Build the mesh data set
///
/// Scalar fields with one value per vertex become point data, fields with
/// one value per element become cell data. Vector fields may be given per
/// node (Q2) or per vertex.
///
/// # Errors
/// `SimError::Vtk` for a field whose length matches neither layout
pub fn mesh_dataset(mesh: &Mesh, fields: &FieldData) -> SimResult<DataSet> {
    let lattice = mesh.vertex_lattice();
    let n_vertices = lattice.len();
    let n_elements = mesh.num_elements();

    let mut points = Vec::with_capacity(3 * n_vertices);
    for &node in &lattice {
        let p = mesh.geometry.nodes[node];
        points.extend_from_slice(&[p.x, p.y, 0.0]);
    }

    // Vertex order is a + 2 b; VTK quads run counter-clockwise
    let mut vertices = Vec::with_capacity(5 * n_elements);
    for e in 0..n_elements {
        let v = mesh.element_vertices(e);
        vertices.push(4u32);
        for idx in [v[0], v[1], v[3], v[2]] {
            vertices.push(u32::try_from(idx).map_err(|_| SimError::Vtk("vertex index exceeds u32".into()))?);
        }
    }

    let mut data = Attributes::new();
    for field in fields.scalar_fields.values() {
        if field.len() == n_vertices {
            data.point.push(scalar_attribute(&field.name, field.data.clone()));
        } else if field.len() == n_elements {
            data.cell.push(scalar_attribute(&field.name, field.data.clone()));
        } else {
            return Err(SimError::Vtk(format!(
                "field '{}' has {} values, expected {} vertices or {} elements",
                field.name,
                field.len(),
                n_vertices,
                n_elements
            )));
        }
    }
    for field in fields.vector_fields.values() {
        let at_vertices: Vec<_> = if field.len() == mesh.num_nodes() {
            lattice.iter().map(|&node| field.data[node]).collect()
        } else if field.len() == n_vertices {
            field.data.clone()
        } else {
            return Err(SimError::Vtk(format!(
                "vector field '{}' has {} values, expected {} nodes or {} vertices",
                field.name,
                field.len(),
                mesh.num_nodes(),
                n_vertices
            )));
        };
        let flat = at_vertices.iter().flat_map(|v| [v.x, v.y, 0.0]).collect();
        data.point.push(vector_attribute(&field.name, flat));
    }

    let piece = UnstructuredGridPiece {
        points: IOBuffer::F64(points),
        cells: Cells {
            cell_verts: VertexNumbers::Legacy {
                num_cells: n_elements as u32,
                vertices,
            },
            types: vec![CellType::Quad; n_elements],
        },
        data,
    };

    Ok(DataSet::UnstructuredGrid {
        meta: None,
        pieces: vec![Piece::Inline(Box::new(piece))],
    })
}

/// Build the swarm data set with material, strain and extra particle arrays
///
/// # Errors
/// `SimError::SizeMismatch` if an extra array does not have one value per particle
pub fn swarm_dataset(swarm: &Swarm, extra: &[(&str, Vec<f64>)]) -> SimResult<DataSet> {
    let n = swarm.len();
    let points = swarm.positions.iter().flat_map(|p| [p.x, p.y, 0.0]).collect();

    let mut vertices = Vec::with_capacity(2 * n);
    for i in 0..n {
        vertices.push(1u32);
        vertices.push(i as u32);
    }

    let mut data = Attributes::new();
    data.point.push(scalar_attribute(
        "material",
        swarm.material.iter().map(|&m| m as f64).collect(),
    ));
    data.point.push(scalar_attribute("strain", swarm.strain.clone()));
    for (name, values) in extra {
        if values.len() != n {
            return Err(SimError::SizeMismatch {
                what: "particle array",
                expected: n,
                actual: values.len(),
            });
        }
        data.point.push(scalar_attribute(name, values.clone()));
    }

    let piece = PolyDataPiece {
        points: IOBuffer::F64(points),
        verts: Some(VertexNumbers::Legacy {
            num_cells: n as u32,
            vertices,
        }),
        lines: None,
        polys: None,
        strips: None,
        data,
    };

    Ok(DataSet::PolyData {
        meta: None,
        pieces: vec![Piece::Inline(Box::new(piece))],
    })
}

fn export(data: DataSet, title: &str, path: &Path) -> SimResult<()> {
    Vtk {
        version: Version { major: 4, minor: 1 },
        title: title.to_string(),
        byte_order: ByteOrder::BigEndian,
        data,
        file_path: None,
    }
    .export_ascii(path)?;
    Ok(())
}

/// What a snapshot belongs to
///
/// Staged solves and time-loop steps are numbered separately, so they are
/// written under different file stems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    Stage(usize),
    Step(usize),
}

impl Snapshot {
    fn stem(&self) -> String {
        match self {
            Snapshot::Stage(i) => format!("stage_{:02}", i),
            Snapshot::Step(i) => format!("step_{:02}", i),
        }
    }
}

/// Writes numbered mesh and swarm snapshots into an output directory
pub struct VtkWriter {
    output_dir: PathBuf,
}

impl VtkWriter {
    /// Create the writer, creating `output_dir` if it does not exist
    pub fn new<P: AsRef<Path>>(output_dir: P) -> SimResult<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `mesh_step_XX.vtk` or `mesh_stage_XX.vtk`
    pub fn mesh_path(&self, snapshot: Snapshot) -> PathBuf {
        self.output_dir.join(format!("mesh_{}.vtk", snapshot.stem()))
    }

    /// `swarm_step_XX.vtk` or `swarm_stage_XX.vtk`
    pub fn swarm_path(&self, snapshot: Snapshot) -> PathBuf {
        self.output_dir.join(format!("swarm_{}.vtk", snapshot.stem()))
    }

    pub fn write_mesh(&self, mesh: &Mesh, fields: &FieldData, snapshot: Snapshot) -> SimResult<PathBuf> {
        let path = self.mesh_path(snapshot);
        export(mesh_dataset(mesh, fields)?, &format!("mesh {}", snapshot.stem()), &path)?;
        log::debug!("Wrote {}", path.display());
        Ok(path)
    }

    pub fn write_swarm(&self, swarm: &Swarm, extra: &[(&str, Vec<f64>)], snapshot: Snapshot) -> SimResult<PathBuf> {
        let path = self.swarm_path(snapshot);
        export(swarm_dataset(swarm, extra)?, &format!("swarm {}", snapshot.stem()), &path)?;
        log::debug!("Wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{ParticleLayout, ScalarField, VectorField};
    use crate::mesh_generator::MeshGenerator;
    use nalgebra::{Point2, Vector2};

    fn small_mesh() -> Mesh {
        MeshGenerator::structured_quad_box([3, 2], Point2::origin(), Point2::new(3.0, 2.0)).unwrap()
    }

    #[test]
    fn test_mesh_dataset_layout() {
        let mesh = small_mesh();
        let mut fields = FieldData::new();
        fields.add_field(ScalarField::zeros("pressure", mesh.num_vertices()));
        fields.add_field(ScalarField::zeros("density", mesh.num_elements()));
        fields.add_vector_field(VectorField::new("velocity", vec![Vector2::new(1.0, 2.0); mesh.num_nodes()]));

        match mesh_dataset(&mesh, &fields).unwrap() {
            DataSet::UnstructuredGrid { pieces, .. } => match &pieces[0] {
                Piece::Inline(piece) => {
                    assert_eq!(piece.points.len(), 3 * 12);
                    assert_eq!(piece.cells.types.len(), 6);
                    assert_eq!(piece.data.point.len(), 2);
                    assert_eq!(piece.data.cell.len(), 1);
                }
                _ => panic!("expected inline piece"),
            },
            _ => panic!("expected unstructured grid"),
        }

        fields.add_field(ScalarField::zeros("bad", 5));
        assert!(mesh_dataset(&mesh, &fields).is_err());
    }

    #[test]
    fn test_writer_creates_numbered_files() {
        let dir = std::env::temp_dir().join(format!("slab_vtk_test_{}", std::process::id()));
        let writer = VtkWriter::new(dir.join("nested")).unwrap();

        let mesh = small_mesh();
        let swarm = Swarm::populate(&mesh, 2, ParticleLayout::Regular).unwrap();
        let mesh_file = writer.write_mesh(&mesh, &FieldData::new(), Snapshot::Step(4)).unwrap();
        let swarm_file = writer
            .write_swarm(&swarm, &[("cohesion", vec![1.0; swarm.len()])], Snapshot::Step(4))
            .unwrap();

        assert!(mesh_file.ends_with("mesh_step_04.vtk"));
        assert!(swarm_file.exists());
        assert!(writer.write_swarm(&swarm, &[("short", vec![1.0])], Snapshot::Step(5)).is_err());

        // Stage 4 does not replace step 4
        let stage_file = writer.write_mesh(&mesh, &FieldData::new(), Snapshot::Stage(4)).unwrap();
        assert!(stage_file.ends_with("mesh_stage_04.vtk"));
        assert!(mesh_file.exists());
        assert_ne!(writer.swarm_path(Snapshot::Stage(4)), writer.swarm_path(Snapshot::Step(4)));

        let _ = fs::remove_dir_all(&dir);
    }
}
