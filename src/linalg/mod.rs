pub mod solver;
pub mod direct;
pub mod iterative;
pub mod preconditioner;
pub mod stokes;
pub mod picard;

pub use solver::{SolverStats, SolverUtils, LinearOperator};
pub use direct::CholeskyFactor;
pub use iterative::ConjugateGradient;
pub use preconditioner::{Preconditioner, JacobiPreconditioner, DiagonalPreconditioner};
pub use stokes::{StokesSolution, StokesSolver, StokesSolverConfig};
pub use picard::{picard_solve, PicardConfig, PicardStats};
