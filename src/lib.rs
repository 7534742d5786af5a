pub mod error;
pub mod mesh;
pub mod mesh_generator;
pub mod fem;
pub mod linalg;
pub mod rheology;
pub mod ic;     // Initial material layout
pub mod updates;
pub mod timestepping;
pub mod utils;
pub mod output;
pub mod model;
pub mod config;

pub use error::{SimError, SimResult};
pub use mesh::{AdvectionOrder, Boundary, CellStatistics, FieldData, Mesh, ParticleLayout, ScalarField, Swarm, VectorField};
pub use mesh_generator::MeshGenerator;
pub use fem::{Assembler, BoundaryConditions, DirichletBc, DofManager, GaussQuadrature, Projection, StokesSystem};
pub use linalg::{picard_solve, PicardConfig, PicardStats, StokesSolution, StokesSolver, StokesSolverConfig};
pub use rheology::{Cohesion, Material, MaterialTable, ViscosityLaw};
pub use ic::{MaterialRegion, Region};
pub use timestepping::{compute_adaptive_timestep, AdaptiveTimestep, TimestepConfig};
pub use output::{Snapshot, VtkWriter};
pub use model::{Model, Stage, StageReport, StepDiagnostics};
pub use config::SimulationConfig;
pub use utils::{units, CharacteristicScales};
