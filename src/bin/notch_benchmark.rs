/// Notch benchmark: brittle shear bands from a weak inclusion
///
/// A 40 km × 10 km crustal block is shortened from both sides. A weak brick
/// at the bottom centre seeds localisation. The solve runs in stages:
///
/// 1. constant minimum viscosity
/// 2. two-material linear (stiff background, weak brick)
/// 3. power-law background, n = 4
/// 4. von Mises background, C = 40 MPa
///
/// Every stage clamps the viscosity to [1e20, 1e24] Pa·s and is written to
/// `mesh_stage_XX.vtk` / `swarm_stage_XX.vtk`.
///
/// Usage: `notch_benchmark [config.toml]` (built-in setup when omitted)

use slab_simulator::{units, Model, SimResult, SimulationConfig};
use std::env;
use std::process;
use std::time::Instant;

fn run() -> SimResult<()> {
    let config = match env::args().nth(1) {
        Some(path) => {
            println!("Loading configuration from {}", path);
            SimulationConfig::from_file(&path)?
        }
        None => SimulationConfig::notch_benchmark(),
    };
    config.print_summary();

    let start = Instant::now();
    let mut model = Model::from_config(&config)?;
    if let Some(scales) = &model.scales {
        scales.print_summary();
    }

    let reports = model.run_stages()?;

    println!("\n═══════════════════════════════════════════════════════════════");
    println!("  Stage Results");
    println!("═══════════════════════════════════════════════════════════════");
    for (i, report) in reports.iter().enumerate() {
        let (vrms, vmax, unit) = match &model.scales {
            Some(s) => (
                units::m_per_s_to_cm_per_year(s.dim_velocity(report.vrms)),
                units::m_per_s_to_cm_per_year(s.dim_velocity(report.max_velocity)),
                " cm/yr",
            ),
            None => (report.vrms, report.max_velocity, ""),
        };
        println!("  {}. {}", i, report.name);
        println!(
            "     Picard: {} iterations, converged = {}",
            report.picard.iterations, report.picard.converged
        );
        println!("     vrms = {:.4e}{}, max |v| = {:.4e}{}", vrms, unit, vmax, unit);
        if let Some(step) = &report.timestep {
            match &model.scales {
                Some(s) => println!(
                    "     dt = {:.4e} yr ({})",
                    units::seconds_to_years(s.dim_time(step.dt)),
                    step.limiting_constraint()
                ),
                None => println!("     dt = {:.4e} ({})", step.dt, step.limiting_constraint()),
            }
        }
    }

    if model.max_steps > 0 {
        model.run_time_loop()?;
    }
    if let Some(dir) = model.output_dir() {
        println!("\n  Output: {}", dir.display());
    }
    println!("  Wall time: {:.1} s", start.elapsed().as_secs_f64());
    println!("═══════════════════════════════════════════════════════════════");
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("═══════════════════════════════════════════════════════════════");
    println!("  Notch Benchmark: Staged Nonlinear Stokes Solves");
    println!("═══════════════════════════════════════════════════════════════\n");

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
