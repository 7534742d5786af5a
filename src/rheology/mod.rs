//! Material rheology: viscosity laws, strain weakening and material tables

pub mod weakening;
pub mod viscosity;
pub mod material;

pub use weakening::Cohesion;
pub use viscosity::{ViscosityLaw, STRAIN_RATE_REGULARISATION};
pub use material::{deviatoric_stress_invariant, Material, MaterialTable};
