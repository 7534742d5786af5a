//! Error types shared by the simulator

use thiserror::Error;

/// Result alias used throughout the crate
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised while configuring, solving or writing a simulation
#[derive(Error, Debug)]
pub enum SimError {
    /// Configuration is inconsistent or incomplete
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failed to read or write a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a TOML configuration file
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Sparse factorization of the velocity block failed
    #[error("factorization failed: {0}")]
    Factorization(String),

    /// Linear or nonlinear solver produced unusable output
    #[error("solver breakdown in {solver}: {message}")]
    SolverBreakdown {
        solver: &'static str,
        message: String,
    },

    /// Array length does not match what the mesh or swarm expects
    #[error("size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Swarm has no particles left
    #[error("swarm is empty")]
    EmptySwarm,

    /// Failed to export a VTK file
    #[error("VTK export failed: {0}")]
    Vtk(String),
}

impl From<vtkio::Error> for SimError {
    fn from(err: vtkio::Error) -> Self {
        SimError::Vtk(format!("{:?}", err))
    }
}
