//! Timestep selection for particle advection

pub mod adaptive;

pub use adaptive::{compute_adaptive_timestep, max_speed, AdaptiveTimestep, TimestepConfig};
