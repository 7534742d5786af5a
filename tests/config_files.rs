use approx::assert_relative_eq;
use slab_simulator::{AdvectionOrder, PicardConfig, SimulationConfig};
use std::path::PathBuf;

fn config_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs").join(name)
}

#[test]
fn test_slab_config_file_matches_builtin() {
    let file = SimulationConfig::from_file(config_path("slab_subduction.toml")).unwrap();
    let builtin = SimulationConfig::slab_subduction();
    file.validate().unwrap();

    assert_eq!(file.domain.resolution, builtin.domain.resolution);
    assert_eq!(file.domain.max, builtin.domain.max);
    assert_eq!(file.swarm.fill, builtin.swarm.fill);
    assert_relative_eq!(file.swarm.jitter, builtin.swarm.jitter, max_relative = 1e-12);
    assert_eq!(file.materials, builtin.materials);
    assert_eq!(file.regions, builtin.regions);
    assert_eq!(file.boundary_conditions, builtin.boundary_conditions);
    assert_eq!(file.stages, builtin.stages);
    assert_eq!(file.time_stepping.max_steps, 50);
    assert_eq!(file.time_stepping.save_every, 2);
    assert_eq!(file.time_stepping.advection, AdvectionOrder::Euler);
    assert!(file.scaling.is_none());

    // 500 nonlinear iterations down to 1e-6
    assert_eq!(file.solver.picard, builtin.solver.picard);
    assert_eq!(file.solver.picard.max_iterations, 500);
    assert_eq!(file.solver.picard.tolerance, 1e-6);
}

#[test]
fn test_notch_config_file_matches_builtin() {
    let file = SimulationConfig::from_file(config_path("notch_benchmark.toml")).unwrap();
    let builtin = SimulationConfig::notch_benchmark();
    file.validate().unwrap();

    assert_eq!(file.materials, builtin.materials);
    assert_eq!(file.regions, builtin.regions);
    assert_eq!(file.boundary_conditions, builtin.boundary_conditions);
    assert_eq!(file.stages, builtin.stages);
    assert_eq!(file.viscosity_bounds.min, Some(1e20));
    assert_eq!(file.viscosity_bounds.max, Some(1e24));

    // Only the yield stage overrides the nonlinear iteration
    let overrides: Vec<_> = file.stages.iter().map(|s| s.picard.clone()).collect();
    assert_eq!(overrides, vec![None, None, None, Some(PicardConfig::conservative())]);

    let (scaled, scales) = file.to_model_units().unwrap();
    let scales = scales.unwrap();
    assert_relative_eq!(scales.length, 100e3);
    assert_relative_eq!(scaled.domain.max[0], 0.4, epsilon = 1e-12);
    assert_relative_eq!(scaled.physics.gravity * scaled.materials[1].density, 1.0, epsilon = 1e-12);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let err = SimulationConfig::from_file(config_path("does_not_exist.toml")).unwrap_err();
    assert!(matches!(err, slab_simulator::SimError::Io(_)));
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let dir = std::env::temp_dir().join(format!("slab_config_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("broken.toml");
    std::fs::write(&path, "name = \"broken\"\n[domain]\nmin = [0.0]\n").unwrap();

    let err = SimulationConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, slab_simulator::SimError::Toml(_)));
    let _ = std::fs::remove_dir_all(&dir);
}
