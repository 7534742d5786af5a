pub mod topology;
pub mod geometry;
pub mod fields;
pub mod swarm;

pub use topology::{Connectivity, Quad9Element};
pub use geometry::{Boundary, Geometry, Mesh, StructuredGrid};
pub use fields::{ScalarField, VectorField, FieldData};
pub use swarm::{sample_q1, sample_q2, AdvectionOrder, CellStatistics, ParticleLayout, Swarm};
