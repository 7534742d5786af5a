//! Configuration management for slab and notch simulations
//!
//! Reads TOML configuration files and provides structured data for setting up
//! the mesh, the particle swarm, material properties, boundary conditions and
//! solver parameters. A configuration with a `[scaling]` table is written in
//! SI units and converted to model units by [`SimulationConfig::to_model_units`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use crate::error::{SimError, SimResult};
use crate::fem::DirichletBc;
use crate::ic::{self, slab, MaterialRegion};
use crate::linalg::{PicardConfig, StokesSolverConfig};
use crate::mesh::{AdvectionOrder, Boundary, ParticleLayout};
use crate::model::Stage;
use crate::rheology::{Cohesion, Material, MaterialTable, ViscosityLaw};
use crate::timestepping::TimestepConfig;
use crate::utils::{units, CharacteristicScales};

/// Main simulation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub name: String,
    pub domain: DomainConfig,
    #[serde(default)]
    pub swarm: SwarmConfig,
    pub materials: Vec<Material>,
    #[serde(default)]
    pub viscosity_bounds: ViscosityBounds,
    /// Applied in order, later regions override
    #[serde(default)]
    pub regions: Vec<MaterialRegion>,
    #[serde(default)]
    pub boundary_conditions: Vec<DirichletBc>,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub time_stepping: TimeSteppingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Reference values; when present every other quantity is in SI units
    #[serde(default)]
    pub scaling: Option<ScalingConfig>,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainConfig {
    /// Lower-left corner
    pub min: [f64; 2],
    /// Upper-right corner
    pub max: [f64; 2],
    /// Elements in x and y
    pub resolution: [usize; 2],
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Particles per cell in each direction
    pub fill: usize,
    pub layout: ParticleLayout,
    /// Maximum random offset added to each coordinate
    pub jitter: f64,
    pub seed: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            fill: 3,
            layout: ParticleLayout::Gauss,
            jitter: 0.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ViscosityBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity magnitude, acting in -y
    pub gravity: f64,
    /// Grad-div penalty, in viscosity units
    pub penalty: f64,
    /// Strain healing rate, in strain-rate units
    pub healing_rate: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 1.0,
            penalty: 0.0,
            healing_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverConfig {
    pub stokes: StokesSolverConfig,
    pub picard: PicardConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeSteppingConfig {
    pub courant: f64,
    pub dt_min: f64,
    pub dt_max: f64,
    /// Steps of the time loop (0 runs only the stages)
    pub max_steps: usize,
    pub save_every: usize,
    pub advection: AdvectionOrder,
}

impl Default for TimeSteppingConfig {
    fn default() -> Self {
        let limits = TimestepConfig::default();
        Self {
            courant: limits.courant,
            dt_min: limits.dt_min,
            dt_max: limits.dt_max,
            max_steps: 0,
            save_every: 1,
            advection: AdvectionOrder::default(),
        }
    }
}

impl TimeSteppingConfig {
    pub fn limits(&self) -> TimestepConfig {
        TimestepConfig {
            courant: self.courant,
            dt_min: self.dt_min,
            dt_max: self.dt_max,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

/// Reference values of the characteristic scales (SI)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScalingConfig {
    pub length: f64,
    pub density: f64,
    pub gravity: f64,
    pub viscosity: f64,
}

impl ScalingConfig {
    pub fn scales(&self) -> CharacteristicScales {
        CharacteristicScales::from_reference(self.length, self.density, self.gravity, self.viscosity)
    }
}

impl SimulationConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: SimulationConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Serialise back to TOML
    pub fn to_toml(&self) -> SimResult<String> {
        toml::to_string_pretty(self).map_err(|e| SimError::Config(format!("failed to serialise config: {}", e)))
    }

    /// Lithosphere slab sinking into a two-layer mantle (nondimensional)
    ///
    /// Both slab skins weaken from a cohesion of 0.06 to 0.01 between
    /// accumulated strains of 0.5 and 1.5. The run starts with one
    /// isoviscous solve.
    pub fn slab_subduction() -> Self {
        let weakening = ViscosityLaw::von_mises(Cohesion::strain_weakening(0.06, 0.01, 0.5, 1.5), Some(500.0));
        let materials = vec![
            Material::new("upper_mantle", 0.5, ViscosityLaw::constant(1.0)),
            Material::new("lower_mantle", 0.5, ViscosityLaw::constant(100.0)),
            Material::new("upper_slab", 1.0, weakening.clone()),
            Material::new("lower_slab", 1.0, weakening),
            Material::new("slab_core", 1.0, ViscosityLaw::constant(500.0)),
        ];
        debug_assert_eq!(materials.len(), slab::SLAB_CORE + 1);

        let resolution = [192, 48];
        let fill = 3;
        let box_length = 4.0;

        Self {
            name: "slab_subduction".into(),
            domain: DomainConfig {
                min: [0.0, 0.0],
                max: [box_length, 1.0],
                resolution,
            },
            swarm: SwarmConfig {
                fill,
                layout: ParticleLayout::Gauss,
                jitter: 0.5 * box_length / resolution[1] as f64 / 5.0,
                seed: 0,
            },
            stages: vec![Stage {
                name: "isoviscous start".into(),
                viscosity: vec![ViscosityLaw::constant(1.0); materials.len()],
                penalty: 0.0,
                zero_init_guess: true,
                estimate_dt: false,
                save: false,
                picard: None,
            }],
            materials,
            viscosity_bounds: ViscosityBounds::default(),
            regions: ic::slab_subduction_layout(),
            boundary_conditions: Boundary::ALL.iter().map(|&b| DirichletBc::free_slip(b)).collect(),
            physics: PhysicsConfig::default(),
            solver: SolverConfig {
                picard: PicardConfig {
                    max_iterations: 500,
                    tolerance: 1e-6,
                    ..PicardConfig::default()
                },
                ..SolverConfig::default()
            },
            time_stepping: TimeSteppingConfig {
                max_steps: 50,
                save_every: 2,
                advection: AdvectionOrder::Euler,
                ..TimeSteppingConfig::default()
            },
            output: OutputConfig {
                dir: PathBuf::from("output/slab_subduction"),
            },
            scaling: None,
        }
    }

    /// Notched brick under compression (SI units)
    ///
    /// A 40 km × 10 km box with a weak 800 m × 400 m brick at the bottom
    /// centre. Solved in stages of increasing nonlinearity; every stage is
    /// saved.
    pub fn notch_benchmark() -> Self {
        let min_viscosity = 1e20;
        let max_viscosity = 1e24;
        let brick = ViscosityLaw::constant(1e20);
        let von_mises = ViscosityLaw::von_mises(Cohesion::Constant(40e6), None);
        let velocity = 2e-11;
        let (lx, ly) = (40e3, 10e3);

        let stage = |name: &str, background: ViscosityLaw, penalty: f64, zero: bool, estimate_dt: bool| Stage {
            name: name.into(),
            viscosity: vec![background, brick.clone()],
            penalty,
            zero_init_guess: zero,
            estimate_dt,
            save: true,
            picard: None,
        };

        let mut boundary_conditions = vec![
            DirichletBc::no_slip(Boundary::Left, [velocity, 0.0]),
            DirichletBc::no_slip(Boundary::Right, [-velocity, 0.0]),
        ];
        boundary_conditions.push(DirichletBc::free_slip(Boundary::Bottom));

        Self {
            name: "notch_benchmark".into(),
            domain: DomainConfig {
                min: [0.0, 0.0],
                max: [lx, ly],
                resolution: [40, 10],
            },
            swarm: SwarmConfig {
                fill: 2,
                ..SwarmConfig::default()
            },
            materials: vec![
                Material::new("background", 2700.0, von_mises.clone()),
                Material::new("brick", 2700.0, brick.clone()),
            ],
            viscosity_bounds: ViscosityBounds {
                min: Some(min_viscosity),
                max: Some(max_viscosity),
            },
            regions: ic::notch_layout(0.0, lx, 0.0, 800.0, 400.0),
            boundary_conditions,
            physics: PhysicsConfig {
                gravity: 9.81,
                ..PhysicsConfig::default()
            },
            solver: SolverConfig::default(),
            time_stepping: TimeSteppingConfig::default(),
            output: OutputConfig {
                dir: PathBuf::from("output/notch_benchmark"),
            },
            scaling: Some(ScalingConfig {
                length: 100e3,
                density: 2700.0,
                gravity: 9.81,
                viscosity: 1e22,
            }),
            stages: vec![
                stage("constant minimum viscosity", ViscosityLaw::constant(min_viscosity), 0.0, true, false),
                stage("linear two-material", ViscosityLaw::constant(max_viscosity), 0.0, false, false),
                stage("power-law background", ViscosityLaw::power_law(4.75e11, 4.0), 1e21, false, true),
                Stage {
                    picard: Some(PicardConfig::conservative()),
                    ..stage("von Mises background", von_mises, 1e21, false, true)
                },
            ],
        }
    }

    /// Material table with the configured viscosity bounds
    pub fn material_table(&self) -> MaterialTable {
        MaterialTable::new(self.materials.clone()).with_bounds(self.viscosity_bounds.min, self.viscosity_bounds.max)
    }

    /// Check the configuration for inconsistencies
    pub fn validate(&self) -> SimResult<()> {
        let d = &self.domain;
        if d.resolution[0] == 0 || d.resolution[1] == 0 {
            return Err(SimError::Config("domain.resolution must be positive".into()));
        }
        if !(d.max[0] > d.min[0] && d.max[1] > d.min[1]) {
            return Err(SimError::Config("domain.max must exceed domain.min".into()));
        }
        if self.swarm.fill == 0 {
            return Err(SimError::Config("swarm.fill must be positive".into()));
        }
        if self.swarm.jitter < 0.0 {
            return Err(SimError::Config("swarm.jitter must not be negative".into()));
        }

        self.material_table().validate()?;
        let n_materials = self.materials.len();
        if let Some(region) = self.regions.iter().find(|r| r.material >= n_materials) {
            return Err(SimError::Config(format!(
                "region assigns material {} but only {} materials are defined",
                region.material, n_materials
            )));
        }
        for bc in &self.boundary_conditions {
            if bc.components.is_empty() || bc.components.iter().any(|&c| c > 1) {
                return Err(SimError::Config(format!(
                    "boundary condition on {:?} has invalid components {:?}",
                    bc.boundary, bc.components
                )));
            }
        }
        for stage in &self.stages {
            if stage.viscosity.len() != n_materials {
                return Err(SimError::Config(format!(
                    "stage '{}' has {} viscosity laws for {} materials",
                    stage.name,
                    stage.viscosity.len(),
                    n_materials
                )));
            }
            for law in &stage.viscosity {
                law.validate()
                    .map_err(|e| SimError::Config(format!("stage '{}': {}", stage.name, e)))?;
            }
        }

        let ts = &self.time_stepping;
        if !(ts.courant > 0.0) {
            return Err(SimError::Config("time_stepping.courant must be positive".into()));
        }
        if ts.dt_min > ts.dt_max {
            return Err(SimError::Config("time_stepping.dt_min exceeds dt_max".into()));
        }
        if ts.save_every == 0 {
            return Err(SimError::Config("time_stepping.save_every must be positive".into()));
        }
        self.solver.picard.validate()?;
        for picard in self.stages.iter().filter_map(|stage| stage.picard.as_ref()) {
            picard.validate()?;
        }
        if !(self.solver.stokes.tolerance > 0.0) || self.solver.stokes.max_iterations == 0 {
            return Err(SimError::Config("solver.stokes needs a positive tolerance and iteration cap".into()));
        }

        if let Some(s) = &self.scaling {
            if !(s.length > 0.0 && s.density > 0.0 && s.gravity > 0.0 && s.viscosity > 0.0) {
                return Err(SimError::Config("scaling reference values must be positive".into()));
            }
        }
        Ok(())
    }

    /// Copy of the configuration in model units
    ///
    /// Without a `[scaling]` table the configuration is returned unchanged.
    pub fn to_model_units(&self) -> SimResult<(Self, Option<CharacteristicScales>)> {
        let Some(reference) = &self.scaling else {
            return Ok((self.clone(), None));
        };
        let scales = reference.scales();
        let length = |x: f64| scales.nondim_length(x);

        let mut cfg = self.clone();
        cfg.scaling = None;
        cfg.domain.min = self.domain.min.map(length);
        cfg.domain.max = self.domain.max.map(length);
        cfg.swarm.jitter = length(self.swarm.jitter);

        let table = self.material_table().nondimensionalise(&scales);
        cfg.viscosity_bounds = ViscosityBounds {
            min: table.min_viscosity,
            max: table.max_viscosity,
        };
        cfg.materials = table.materials;

        cfg.regions = self
            .regions
            .iter()
            .map(|r| MaterialRegion::new(r.material, r.region.scaled(1.0 / scales.length)))
            .collect();
        for bc in &mut cfg.boundary_conditions {
            bc.values = bc.values.map(|v| scales.nondim_velocity(v));
        }

        cfg.physics = PhysicsConfig {
            gravity: scales.nondim_gravity(self.physics.gravity),
            penalty: scales.nondim_viscosity(self.physics.penalty),
            healing_rate: scales.nondim_strain_rate(self.physics.healing_rate),
        };
        cfg.time_stepping.dt_min = scales.nondim_time(self.time_stepping.dt_min);
        cfg.time_stepping.dt_max = scales.nondim_time(self.time_stepping.dt_max);

        for stage in &mut cfg.stages {
            stage.penalty = scales.nondim_viscosity(stage.penalty);
            stage.viscosity = stage
                .viscosity
                .iter()
                .map(|law| law.nondimensionalise(scales.viscosity, scales.stress, scales.strain_rate))
                .collect();
        }

        Ok((cfg, Some(scales)))
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let si = self.scaling.is_some();
        let (nx, ny) = (self.domain.resolution[0], self.domain.resolution[1]);

        println!("═══════════════════════════════════════════════════════════════");
        println!("  Simulation Configuration: {}", self.name);
        println!("═══════════════════════════════════════════════════════════════");
        println!("Domain:");
        if si {
            println!(
                "  Size: {:.1} × {:.1} km",
                (self.domain.max[0] - self.domain.min[0]) / 1e3,
                (self.domain.max[1] - self.domain.min[1]) / 1e3
            );
        } else {
            println!(
                "  Size: {:.3} × {:.3}",
                self.domain.max[0] - self.domain.min[0],
                self.domain.max[1] - self.domain.min[1]
            );
        }
        println!("  Grid: {} × {} Q2-Q1 elements ({} elements)", nx, ny, nx * ny);
        println!(
            "  Swarm: {}×{} particles per cell ({:?}), jitter {:.3e}",
            self.swarm.fill, self.swarm.fill, self.swarm.layout, self.swarm.jitter
        );

        println!("\nMaterials:");
        for (i, m) in self.materials.iter().enumerate() {
            println!("  {} {:<14} ρ = {:.3e}, η: {}", i, m.name, m.density, describe_law(&m.viscosity));
        }
        if let (Some(min), Some(max)) = (self.viscosity_bounds.min, self.viscosity_bounds.max) {
            println!("  Viscosity clamped to [{:.1e}, {:.1e}]", min, max);
        }

        println!("\nBoundary Conditions:");
        for bc in &self.boundary_conditions {
            if si {
                let cm_per_yr = bc.values.map(units::m_per_s_to_cm_per_year);
                println!(
                    "  {:?}: components {:?}, values ({:.2}, {:.2}) cm/yr",
                    bc.boundary, bc.components, cm_per_yr[0], cm_per_yr[1]
                );
            } else {
                println!(
                    "  {:?}: components {:?}, values ({:.3e}, {:.3e})",
                    bc.boundary, bc.components, bc.values[0], bc.values[1]
                );
            }
        }

        println!("\nSolver:");
        println!(
            "  Stokes: Uzawa-CG (tol = {:.1e}, max_iter = {})",
            self.solver.stokes.tolerance, self.solver.stokes.max_iterations
        );
        println!(
            "  Picard: tol = {:.1e}, max_iter = {}, α = {:.2}",
            self.solver.picard.tolerance, self.solver.picard.max_iterations, self.solver.picard.relaxation
        );

        if !self.stages.is_empty() {
            println!("\nStages:");
            for (i, stage) in self.stages.iter().enumerate() {
                println!("  {}. {} (penalty {:.1e})", i, stage.name, stage.penalty);
                if let Some(picard) = &stage.picard {
                    println!(
                        "     Picard: tol = {:.1e}, max_iter = {}, α = {:.2}, Anderson depth {}",
                        picard.tolerance, picard.max_iterations, picard.relaxation, picard.anderson_depth
                    );
                }
            }
        }
        if self.time_stepping.max_steps > 0 {
            println!("\nTime stepping:");
            println!(
                "  {} steps, Courant {:.2}, {:?} advection, save every {}",
                self.time_stepping.max_steps,
                self.time_stepping.courant,
                self.time_stepping.advection,
                self.time_stepping.save_every
            );
        }
        println!("\nOutput: {}", self.output.dir.display());
        println!("═══════════════════════════════════════════════════════════════\n");
    }
}

fn describe_law(law: &ViscosityLaw) -> String {
    match law {
        ViscosityLaw::Constant { value } => format!("constant {:.3e}", value),
        ViscosityLaw::PowerLaw { prefactor, exponent } => format!("power law A = {:.3e}, n = {}", prefactor, exponent),
        ViscosityLaw::VonMises { cohesion, cap } => {
            let (lo, hi) = cohesion.bounds();
            match cap {
                Some(cap) => format!("von Mises C ∈ [{:.3e}, {:.3e}], cap {:.3e}", lo, hi, cap),
                None => format!("von Mises C ∈ [{:.3e}, {:.3e}]", lo, hi),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builtin_configs_validate() {
        SimulationConfig::slab_subduction().validate().unwrap();
        SimulationConfig::notch_benchmark().validate().unwrap();
    }

    #[test]
    fn test_toml_roundtrip_of_slab_config() {
        let config = SimulationConfig::slab_subduction();
        let text = config.to_toml().unwrap();
        let parsed: SimulationConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.materials, config.materials);
        assert_eq!(parsed.regions, config.regions);
        assert_eq!(parsed.stages, config.stages);
        assert_eq!(parsed.time_stepping.advection, AdvectionOrder::Euler);
    }

    #[test]
    fn test_notch_model_units() {
        let (cfg, scales) = SimulationConfig::notch_benchmark().to_model_units().unwrap();
        let scales = scales.unwrap();

        assert_relative_eq!(cfg.domain.max[0], 0.4);
        assert_relative_eq!(cfg.domain.max[1], 0.1);
        // ρ̂ ĝ = 1 for the reference material
        assert_relative_eq!(cfg.materials[0].density * cfg.physics.gravity, 1.0, epsilon = 1e-12);
        assert_relative_eq!(cfg.viscosity_bounds.min.unwrap(), 0.01, epsilon = 1e-12);
        assert_relative_eq!(cfg.stages[2].penalty, 0.1, epsilon = 1e-12);
        assert_relative_eq!(
            cfg.boundary_conditions[0].values[0],
            2e-11 / scales.velocity,
            max_relative = 1e-12
        );
        assert!(cfg.scaling.is_none());
        assert!(cfg.regions[0].region.contains(&nalgebra::Point2::new(0.2, 0.003)));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = SimulationConfig::slab_subduction();
        config.stages[0].viscosity.pop();
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::notch_benchmark();
        config.regions.push(MaterialRegion::new(5, crate::ic::Region::Everywhere));
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::notch_benchmark();
        config.boundary_conditions[0].components = vec![2];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_minimal_toml() {
        let text = r#"
            name = "box"

            [domain]
            min = [0.0, 0.0]
            max = [1.0, 1.0]
            resolution = [8, 8]

            [[materials]]
            name = "fluid"
            density = 1.0
            viscosity = { type = "constant", value = 1.0 }

            [[boundary_conditions]]
            boundary = "bottom"
            values = [0.0, 0.0]
            components = [0, 1]
        "#;
        let config: SimulationConfig = toml::from_str(text).unwrap();
        config.validate().unwrap();
        assert_eq!(config.swarm.fill, 3);
        assert_eq!(config.boundary_conditions[0].boundary, Boundary::Bottom);
        assert!(config.scaling.is_none());
        assert_eq!(config.time_stepping.max_steps, 0);
    }
}
