pub mod vtk;

pub use vtk::{mesh_dataset, swarm_dataset, Snapshot, VtkWriter};
