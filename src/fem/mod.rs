pub mod basis;
pub mod quadrature;
pub mod dof;
pub mod element;
pub mod assembly;
pub mod boundary;
pub mod projection;

pub use basis::{Quad4Basis, Quad9Basis};
pub use quadrature::GaussQuadrature;
pub use dof::DofManager;
pub use element::{strain_rate_invariant, ElementMatrix, QP_PER_ELEMENT};
pub use assembly::{Assembler, StokesSystem};
pub use boundary::{BoundaryConditions, DirichletBc};
pub use projection::Projection;
