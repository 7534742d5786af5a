//! Simulation state and the operations of a run
//!
//! A [`Model`] owns the mesh, the particle swarm, the material table and the
//! current Stokes solution. Runs are built from a short list of staged
//! solves (used to warm up nonlinear rheologies) followed by an optional
//! time loop:
//!
//! ```text
//! for each stage: set rheology → solve → [estimate dt] → [save stage]
//! loop:
//!   every save_every steps: update fields → save
//!   solve → dt = estimate_dt → update strain → advect → t += dt
//! ```

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::config::SimulationConfig;
use crate::error::{SimError, SimResult};
use crate::fem::{Assembler, BoundaryConditions, DofManager};
use crate::ic::apply_regions;
use crate::linalg::{picard_solve, PicardConfig, PicardStats, StokesSolution, StokesSolver, StokesSolverConfig};
use crate::mesh::{AdvectionOrder, CellStatistics, Mesh, Swarm};
use crate::mesh_generator::MeshGenerator;
use crate::output::{Snapshot, VtkWriter};
use crate::rheology::{MaterialTable, ViscosityLaw};
use crate::timestepping::{compute_adaptive_timestep, AdaptiveTimestep, TimestepConfig};
use crate::updates;
use crate::utils::CharacteristicScales;

/// One solve of a staged sequence
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Stage {
    pub name: String,
    /// Viscosity law of each material during this stage
    pub viscosity: Vec<ViscosityLaw>,
    /// Grad-div penalty
    #[serde(default)]
    pub penalty: f64,
    #[serde(default)]
    pub zero_init_guess: bool,
    #[serde(default)]
    pub estimate_dt: bool,
    /// Update fields and write `mesh_stage_XX.vtk` / `swarm_stage_XX.vtk`
    #[serde(default)]
    pub save: bool,
    /// Nonlinear iteration settings for this stage only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picard: Option<PicardConfig>,
}

/// Outcome of a staged solve
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub picard: PicardStats,
    pub vrms: f64,
    pub max_velocity: f64,
    pub timestep: Option<AdaptiveTimestep>,
}

/// Per-step record of the time loop
#[derive(Debug, Clone, Copy)]
pub struct StepDiagnostics {
    pub step: usize,
    /// Model time after the step
    pub time: f64,
    pub dt: f64,
    pub vrms: f64,
    pub max_velocity: f64,
    pub picard_iterations: usize,
    pub particles_lost: usize,
}

/// Complete simulation state
pub struct Model {
    pub mesh: Mesh,
    pub dofs: DofManager,
    pub swarm: Swarm,
    pub materials: MaterialTable,
    pub bcs: BoundaryConditions,
    pub gravity: f64,
    pub penalty: f64,
    /// Strain removed per unit time
    pub healing_rate: f64,
    pub stokes: StokesSolver,
    pub picard: PicardConfig,
    pub timestep: TimestepConfig,
    pub advection: AdvectionOrder,
    pub stages: Vec<Stage>,
    pub max_steps: usize,
    pub save_every: usize,
    pub velocity: Vec<f64>,
    pub pressure: Vec<f64>,
    /// Projected ε̇_II on the vertices
    pub strain_rate: Vec<f64>,
    pub time: f64,
    pub step: usize,
    pub scales: Option<CharacteristicScales>,
    pub history: Vec<StepDiagnostics>,
    writer: Option<VtkWriter>,
}

impl Model {
    /// Assemble a model from its parts with unit gravity and no penalty
    ///
    /// # Errors
    /// Invalid material table, an empty swarm or a boundary condition on
    /// a component other than x or y
    pub fn new(mesh: Mesh, swarm: Swarm, materials: MaterialTable, bcs: BoundaryConditions) -> SimResult<Self> {
        materials.validate()?;
        if swarm.is_empty() {
            return Err(SimError::EmptySwarm);
        }

        let mut dofs = DofManager::new_mixed(mesh.num_nodes(), mesh.num_vertices());
        bcs.apply(&mesh, &mut dofs)?;
        let velocity = vec![0.0; dofs.total_vel_dofs()];
        let pressure = vec![0.0; dofs.total_pressure_dofs()];
        let strain_rate = vec![0.0; mesh.num_vertices()];

        Ok(Self {
            mesh,
            dofs,
            swarm,
            materials,
            bcs,
            gravity: 1.0,
            penalty: 0.0,
            healing_rate: 0.0,
            stokes: StokesSolver::default(),
            picard: PicardConfig::default(),
            timestep: TimestepConfig::default(),
            advection: AdvectionOrder::default(),
            stages: Vec::new(),
            max_steps: 0,
            save_every: 1,
            velocity,
            pressure,
            strain_rate,
            time: 0.0,
            step: 0,
            scales: None,
            history: Vec::new(),
            writer: None,
        })
    }

    /// Build mesh, swarm and materials from a configuration
    ///
    /// SI configurations (with a `[scaling]` table) are converted to model
    /// units first.
    pub fn from_config(config: &SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        let (cfg, scales) = config.to_model_units()?;

        let domain = &cfg.domain;
        let mesh = MeshGenerator::structured_quad_box(
            domain.resolution,
            Point2::new(domain.min[0], domain.min[1]),
            Point2::new(domain.max[0], domain.max[1]),
        )?;

        let mut swarm = Swarm::populate(&mesh, cfg.swarm.fill, cfg.swarm.layout)?;
        if cfg.swarm.jitter > 0.0 {
            let lost = swarm.jitter(&mesh, cfg.swarm.jitter, cfg.swarm.seed);
            log::debug!("Jitter pushed {} particles out of the domain", lost);
        }
        let materials = cfg.material_table();
        let counts = apply_regions(&mut swarm, &cfg.regions, materials.len())?;
        for (m, count) in materials.materials.iter().zip(&counts) {
            log::debug!("  {:<16} {} particles", m.name, count);
        }

        let mut bcs = BoundaryConditions::new();
        for bc in &cfg.boundary_conditions {
            bcs.push(bc.clone());
        }

        let mut model = Model::new(mesh, swarm, materials, bcs)?
            .with_gravity(cfg.physics.gravity)
            .with_penalty(cfg.physics.penalty)
            .with_healing_rate(cfg.physics.healing_rate)
            .with_solver(cfg.solver.stokes.clone())
            .with_picard(cfg.solver.picard.clone())
            .with_timestep(cfg.time_stepping.limits())
            .with_advection(cfg.time_stepping.advection)
            .with_stages(cfg.stages.clone())
            .with_run_length(cfg.time_stepping.max_steps, cfg.time_stepping.save_every)
            .with_output(&cfg.output.dir)?;
        if let Some(scales) = scales {
            model = model.with_scales(scales);
        }

        log::info!(
            "Model ready: {} elements, {} velocity DOFs, {} pressure DOFs, {} particles",
            model.mesh.num_elements(),
            model.dofs.total_vel_dofs(),
            model.dofs.total_pressure_dofs(),
            model.swarm.len()
        );
        Ok(model)
    }

    pub fn with_gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_healing_rate(mut self, healing_rate: f64) -> Self {
        self.healing_rate = healing_rate;
        self
    }

    pub fn with_solver(mut self, config: StokesSolverConfig) -> Self {
        self.stokes = StokesSolver::new(config);
        self
    }

    pub fn with_picard(mut self, config: PicardConfig) -> Self {
        self.picard = config;
        self
    }

    pub fn with_timestep(mut self, config: TimestepConfig) -> Self {
        self.timestep = config;
        self
    }

    pub fn with_advection(mut self, order: AdvectionOrder) -> Self {
        self.advection = order;
        self
    }

    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_run_length(mut self, max_steps: usize, save_every: usize) -> Self {
        self.max_steps = max_steps;
        self.save_every = save_every;
        self
    }

    /// Report times in Myr and keep the scales for dimensional output
    pub fn with_scales(mut self, scales: CharacteristicScales) -> Self {
        self.scales = Some(scales);
        self
    }

    /// Write snapshots into `dir`, creating it if needed
    pub fn with_output<P: AsRef<Path>>(mut self, dir: P) -> SimResult<Self> {
        self.writer = Some(VtkWriter::new(dir)?);
        Ok(self)
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.writer.as_ref().map(|w| w.output_dir())
    }

    /// Replace the viscosity law of every material
    pub fn set_rheology(&mut self, laws: &[ViscosityLaw]) -> SimResult<()> {
        self.materials = self.materials.with_viscosities(laws)?;
        Ok(())
    }

    pub fn set_penalty(&mut self, penalty: f64) {
        self.penalty = penalty;
    }

    /// Current viscosity laws, one per material
    pub fn rheology(&self) -> Vec<ViscosityLaw> {
        self.materials.materials.iter().map(|m| m.viscosity.clone()).collect()
    }

    fn cell_statistics(&self) -> SimResult<CellStatistics> {
        self.swarm.cell_statistics(&self.mesh, self.materials.len())
    }

    /// Viscosity from `velocity`, then one linear Stokes solve
    fn stokes_step(&self, velocity: &[f64], stats: &CellStatistics, density: &[f64]) -> SimResult<StokesSolution> {
        let rates = Assembler::strain_rate_invariants(&self.mesh, &self.dofs, velocity)?;
        let viscosity = self.materials.quadrature_viscosity(stats, &rates)?;
        let system = Assembler::assemble_stokes(&self.mesh, &self.dofs, &viscosity, density, self.gravity, self.penalty)?;
        self.stokes.solve_iterate(&system, &self.dofs, velocity)
    }

    /// Solve the Stokes problem for the current particle configuration
    ///
    /// Linear rheologies take a single solve; otherwise Picard iteration
    /// starts from the previous velocity, or from rest when
    /// `zero_init_guess` is set.
    pub fn solve(&mut self, zero_init_guess: bool) -> SimResult<PicardStats> {
        let picard = self.picard.clone();
        self.solve_with(zero_init_guess, &picard)
    }

    /// [`Model::solve`] with explicit nonlinear iteration settings
    pub fn solve_with(&mut self, zero_init_guess: bool, picard: &PicardConfig) -> SimResult<PicardStats> {
        let stats = self.cell_statistics()?;
        let density = self.materials.element_densities(&stats);

        let n_vel = self.dofs.total_vel_dofs();
        let guess = if zero_init_guess || self.velocity.len() != n_vel {
            vec![0.0; n_vel]
        } else {
            self.velocity.clone()
        };
        let config = if self.materials.is_linear() {
            PicardConfig::linear()
        } else {
            picard.clone()
        };

        let (solution, picard) = picard_solve(|u: &[f64]| self.stokes_step(u, &stats, &density), &guess, &config)?;
        if solution.pressure_null_space {
            log::debug!("Pressure fixed to zero mean");
        }
        self.velocity = solution.velocity;
        self.pressure = solution.pressure;

        log::info!(
            "Stokes solve: {} Picard iteration(s), {} pressure iterations, converged = {}",
            picard.iterations,
            picard.total_linear_iterations,
            picard.converged
        );
        Ok(picard)
    }

    /// Courant-limited advection step for the current velocity
    pub fn estimate_dt(&self) -> AdaptiveTimestep {
        compute_adaptive_timestep(&self.mesh, &self.dofs, &self.velocity, &self.timestep)
    }

    /// Node velocities of the current solution
    pub fn nodal_velocity(&self) -> SimResult<Vec<Vector2<f64>>> {
        updates::nodal_velocity(&self.mesh, &self.dofs, &self.velocity)
    }

    pub fn vrms(&self) -> SimResult<f64> {
        updates::vrms(&self.mesh, &self.nodal_velocity()?)
    }

    pub fn max_velocity(&self) -> f64 {
        crate::timestepping::max_speed(&self.mesh, &self.dofs, &self.velocity)
    }

    /// Project the current strain-rate invariant onto the vertices
    pub fn project_strain_rate(&mut self) -> SimResult<&[f64]> {
        let rates = Assembler::strain_rate_invariants(&self.mesh, &self.dofs, &self.velocity)?;
        self.strain_rate = updates::project_strain_rate(&self.mesh, &rates)?;
        Ok(&self.strain_rate)
    }

    /// Accumulate particle strain over `dt`
    pub fn update_strain(&mut self, dt: f64) -> SimResult<()> {
        self.project_strain_rate()?;
        self.swarm.update_strain(&self.mesh, &self.strain_rate, dt, self.healing_rate)
    }

    /// Move the swarm through the current velocity
    ///
    /// # Returns
    /// Number of particles that left the domain
    pub fn advect(&mut self, dt: f64) -> SimResult<usize> {
        let velocity = self.nodal_velocity()?;
        let lost = self.swarm.advect(&self.mesh, &velocity, dt, self.advection)?;
        if lost > 0 {
            log::warn!("{} particles left the domain during advection", lost);
        }
        if self.swarm.is_empty() {
            return Err(SimError::EmptySwarm);
        }
        Ok(lost)
    }

    /// Time shown in output, Myr when the model is scaled
    pub fn output_time(&self) -> f64 {
        match &self.scales {
            Some(scales) => scales.time_in_myr(self.time),
            None => self.time,
        }
    }

    /// Recompute the projected mesh fields
    pub fn update_fields(&mut self) -> SimResult<()> {
        let stats = self.cell_statistics()?;
        let quadrature =
            updates::compute_quadrature_fields(&self.mesh, &self.dofs, &self.velocity, &self.materials, &stats)?;
        let velocity = self.nodal_velocity()?;
        let fields = updates::mesh_fields(
            &self.mesh,
            &velocity,
            &self.pressure,
            &quadrature,
            &stats,
            self.output_time(),
        )?;
        if let Some(rate) = fields.get_field("strain_rate") {
            self.strain_rate = rate.data.clone();
        }
        self.mesh.field_data = fields;
        Ok(())
    }

    /// Cohesion of every particle, zero where the material does not yield
    pub fn particle_cohesion(&self) -> Vec<f64> {
        self.swarm
            .material
            .iter()
            .zip(&self.swarm.strain)
            .map(|(&mat, &strain)| {
                self.materials
                    .get(mat)
                    .and_then(|m| m.viscosity.cohesion())
                    .map_or(0.0, |c| c.value(strain))
            })
            .collect()
    }

    /// Write `mesh_step_XX.vtk` and `swarm_step_XX.vtk`
    ///
    /// # Errors
    /// `SimError::Config` if no output directory was configured
    pub fn save(&self, step: usize) -> SimResult<()> {
        self.write_snapshot(Snapshot::Step(step))
    }

    /// Write `mesh_stage_XX.vtk` and `swarm_stage_XX.vtk`
    pub fn save_stage(&self, index: usize) -> SimResult<()> {
        self.write_snapshot(Snapshot::Stage(index))
    }

    fn write_snapshot(&self, snapshot: Snapshot) -> SimResult<()> {
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| SimError::Config("no output directory configured".into()))?;
        writer.write_mesh(&self.mesh, &self.mesh.field_data, snapshot)?;
        let strain_rate = self.swarm.interpolate_q1(&self.mesh, &self.strain_rate)?;
        writer.write_swarm(
            &self.swarm,
            &[("strain_rate", strain_rate), ("cohesion", self.particle_cohesion())],
            snapshot,
        )?;
        log::info!("Saved {:?} to {}", snapshot, writer.output_dir().display());
        Ok(())
    }

    /// Apply a stage's rheology and penalty, then solve
    pub fn run_stage(&mut self, index: usize, stage: &Stage) -> SimResult<StageReport> {
        log::info!("Stage {}: {}", index, stage.name);
        self.set_rheology(&stage.viscosity)?;
        self.set_penalty(stage.penalty);
        let config = stage.picard.clone().unwrap_or_else(|| self.picard.clone());
        let picard = self.solve_with(stage.zero_init_guess, &config)?;
        if !picard.converged {
            log::warn!("Stage '{}' ended without converging", stage.name);
        }

        let timestep = if stage.estimate_dt {
            let step = self.estimate_dt();
            log::info!("  dt = {:.4e} ({})", step.dt, step.limiting_constraint());
            Some(step)
        } else {
            None
        };
        if stage.save {
            self.update_fields()?;
            self.save_stage(index)?;
        }

        Ok(StageReport {
            name: stage.name.clone(),
            picard,
            vrms: self.vrms()?,
            max_velocity: self.max_velocity(),
            timestep,
        })
    }

    /// Run every configured stage, then restore the base rheology and penalty
    pub fn run_stages(&mut self) -> SimResult<Vec<StageReport>> {
        let base_laws = self.rheology();
        let base_penalty = self.penalty;
        let stages = self.stages.clone();

        let mut reports = Vec::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            reports.push(self.run_stage(i, stage)?);
        }

        self.set_rheology(&base_laws)?;
        self.set_penalty(base_penalty);
        Ok(reports)
    }

    /// Advance one step: solve, choose dt, accumulate strain and advect
    pub fn step_forward(&mut self) -> SimResult<StepDiagnostics> {
        let picard = self.solve(false)?;
        let timestep = self.estimate_dt();
        if !(timestep.dt.is_finite() && timestep.dt > 0.0) {
            return Err(SimError::SolverBreakdown {
                solver: "timestep",
                message: format!(
                    "no finite advection step (max velocity {:.3e}, dt {:e})",
                    timestep.max_velocity, timestep.dt
                ),
            });
        }

        self.update_strain(timestep.dt)?;
        let particles_lost = self.advect(timestep.dt)?;
        self.time += timestep.dt;

        let diagnostics = StepDiagnostics {
            step: self.step,
            time: self.time,
            dt: timestep.dt,
            vrms: self.vrms()?,
            max_velocity: timestep.max_velocity,
            picard_iterations: picard.iterations,
            particles_lost,
        };
        log::info!(
            "Step {:4}: t = {:.4e}, dt = {:.3e} ({}), vrms = {:.4e}",
            diagnostics.step,
            self.output_time(),
            diagnostics.dt,
            timestep.limiting_constraint(),
            diagnostics.vrms
        );
        self.history.push(diagnostics);
        self.step += 1;
        Ok(diagnostics)
    }

    /// Run the configured stages and the time loop
    pub fn run(&mut self) -> SimResult<()> {
        self.run_stages()?;
        self.run_time_loop()
    }

    /// Step until `max_steps`, saving every `save_every` steps
    pub fn run_time_loop(&mut self) -> SimResult<()> {
        if self.save_every == 0 {
            return Err(SimError::Config("save_every must be positive".into()));
        }
        while self.step < self.max_steps {
            if self.step % self.save_every == 0 {
                self.update_fields()?;
                self.save(self.step)?;
            }
            self.step_forward()?;
        }
        Ok(())
    }

    /// Range of accumulated particle strain
    pub fn strain_range(&self) -> Option<(f64, f64)> {
        range(self.swarm.strain.iter().copied())
    }

    /// Range of the weakening law over the strain of every particle
    pub fn cohesion_range(&self) -> Option<(f64, f64)> {
        range(self.materials.particle_cohesion(&self.swarm)?.into_iter())
    }
}

fn range<I: Iterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
