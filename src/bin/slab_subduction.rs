/// Slab subduction with strain weakening
///
/// A dense lithospheric slab with a dipping tip sinks into a two-layer
/// mantle. Its upper and lower skins yield with a cohesion that weakens as
/// particles accumulate strain, which lets the slab bend at the hinge.
///
/// Usage: `slab_subduction [config.toml]` (built-in setup when omitted)

use slab_simulator::{Model, SimResult, SimulationConfig};
use std::env;
use std::process;
use std::time::Instant;

fn run() -> SimResult<()> {
    let config = match env::args().nth(1) {
        Some(path) => {
            println!("Loading configuration from {}", path);
            SimulationConfig::from_file(&path)?
        }
        None => SimulationConfig::slab_subduction(),
    };
    config.print_summary();

    let start = Instant::now();
    let mut model = Model::from_config(&config)?;
    println!(
        "Setup: {} elements, {} particles ({:.2} s)",
        model.mesh.num_elements(),
        model.swarm.len(),
        start.elapsed().as_secs_f64()
    );
    for (i, count) in model.swarm.material_counts(model.materials.len()).iter().enumerate() {
        if let Some(m) = model.materials.get(i) {
            println!("  {:<14} {:>8} particles", m.name, count);
        }
    }

    model.run()?;

    println!("\n═══════════════════════════════════════════════════════════════");
    println!("  Summary");
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Steps: {}, model time {:.4e}", model.step, model.time);
    if let Some(last) = model.history.last() {
        println!("  Final vrms {:.4e}, max |v| {:.4e}", last.vrms, last.max_velocity);
    }
    let lost: usize = model.history.iter().map(|d| d.particles_lost).sum();
    println!("  Particles lost through the walls: {}", lost);
    if let Some((lo, hi)) = model.strain_range() {
        println!("  Strain:   min {:.4e}, max {:.4e}", lo, hi);
    }
    if let Some((lo, hi)) = model.cohesion_range() {
        println!("  Cohesion: min {:.4e}, max {:.4e}", lo, hi);
    }
    if let Some(dir) = model.output_dir() {
        println!("  Output: {}", dir.display());
    }
    println!("  Wall time: {:.1} s", start.elapsed().as_secs_f64());
    println!("═══════════════════════════════════════════════════════════════");
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("═══════════════════════════════════════════════════════════════");
    println!("  Slab Subduction with Strain Weakening");
    println!("═══════════════════════════════════════════════════════════════\n");

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
