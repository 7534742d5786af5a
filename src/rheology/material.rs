use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::error::{SimError, SimResult};
use crate::fem::QP_PER_ELEMENT;
use crate::mesh::{CellStatistics, Swarm};
use crate::utils::CharacteristicScales;
use super::{Cohesion, ViscosityLaw};

/// Properties carried by one material index
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Material {
    pub name: String,
    pub density: f64,
    pub viscosity: ViscosityLaw,
}

impl Material {
    pub fn new(name: &str, density: f64, viscosity: ViscosityLaw) -> Self {
        Self {
            name: name.to_string(),
            density,
            viscosity,
        }
    }
}

/// Materials indexed by the swarm's material index
///
/// Cell properties are blended from the particle fractions,
/// `Σ_m f_m · value_m`, and the viscosity is then clamped to the optional
/// global bounds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialTable {
    pub materials: Vec<Material>,
    pub min_viscosity: Option<f64>,
    pub max_viscosity: Option<f64>,
}

impl MaterialTable {
    pub fn new(materials: Vec<Material>) -> Self {
        Self {
            materials,
            min_viscosity: None,
            max_viscosity: None,
        }
    }

    pub fn with_bounds(mut self, min_viscosity: Option<f64>, max_viscosity: Option<f64>) -> Self {
        self.min_viscosity = min_viscosity;
        self.max_viscosity = max_viscosity;
        self
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    /// Copy of the table with new viscosity laws, one per material
    ///
    /// # Errors
    /// `SimError::SizeMismatch` if the number of laws differs from the
    /// number of materials
    pub fn with_viscosities(&self, laws: &[ViscosityLaw]) -> SimResult<Self> {
        if laws.len() != self.len() {
            return Err(SimError::SizeMismatch {
                what: "viscosity laws",
                expected: self.len(),
                actual: laws.len(),
            });
        }
        let mut table = self.clone();
        for (material, law) in table.materials.iter_mut().zip(laws) {
            material.viscosity = law.clone();
        }
        Ok(table)
    }

    /// True when no material depends on the strain rate
    pub fn is_linear(&self) -> bool {
        self.materials.iter().all(|m| m.viscosity.is_linear())
    }

    /// `max(min(η, max), min)`
    pub fn clamp(&self, eta: f64) -> f64 {
        let eta = match self.max_viscosity {
            Some(max) => eta.min(max),
            None => eta,
        };
        match self.min_viscosity {
            Some(min) => eta.max(min),
            None => eta,
        }
    }

    /// Fraction-weighted sum, skipping absent materials
    fn blend<F: Fn(&Material) -> f64>(&self, fractions: &[f64], value: F) -> f64 {
        self.materials
            .iter()
            .zip(fractions)
            .filter(|(_, &f)| f > 0.0)
            .map(|(m, &f)| f * value(m))
            .sum()
    }

    /// Element densities from the particle material fractions
    pub fn element_densities(&self, stats: &CellStatistics) -> Vec<f64> {
        stats
            .fractions
            .iter()
            .map(|fractions| self.blend(fractions, |m| m.density))
            .collect()
    }

    /// Effective viscosity at every quadrature point
    ///
    /// # Arguments
    /// * `strain_rates` - ε̇_II at the quadrature points of each element
    ///
    /// Strain weakening uses the cell's mean particle strain.
    pub fn quadrature_viscosity(
        &self,
        stats: &CellStatistics,
        strain_rates: &[[f64; QP_PER_ELEMENT]],
    ) -> SimResult<Vec<[f64; QP_PER_ELEMENT]>> {
        if strain_rates.len() != stats.fractions.len() {
            return Err(SimError::SizeMismatch {
                what: "strain rates",
                expected: stats.fractions.len(),
                actual: strain_rates.len(),
            });
        }
        Ok(strain_rates
            .par_iter()
            .zip(stats.fractions.par_iter())
            .zip(stats.mean_strain.par_iter())
            .map(|((rates, fractions), &strain)| {
                rates.map(|rate| self.clamp(self.blend(fractions, |m| m.viscosity.evaluate(rate, strain))))
            })
            .collect())
    }

    /// Cohesion law of the first material that yields
    pub fn weakening_law(&self) -> Option<&Cohesion> {
        self.materials.iter().find_map(|m| m.viscosity.cohesion())
    }

    /// Weakening law evaluated at the strain of every particle
    ///
    /// `None` when no material yields.
    pub fn particle_cohesion(&self, swarm: &Swarm) -> Option<Vec<f64>> {
        let law = self.weakening_law()?;
        Some(swarm.strain.iter().map(|&strain| law.value(strain)).collect())
    }

    /// Convert SI densities, viscosities and stresses to model units
    pub fn nondimensionalise(&self, scales: &CharacteristicScales) -> Self {
        let materials = self
            .materials
            .iter()
            .map(|m| Material {
                name: m.name.clone(),
                density: scales.nondim_density(m.density),
                viscosity: m.viscosity.nondimensionalise(scales.viscosity, scales.stress, scales.strain_rate),
            })
            .collect();
        Self {
            materials,
            min_viscosity: self.min_viscosity.map(|v| scales.nondim_viscosity(v)),
            max_viscosity: self.max_viscosity.map(|v| scales.nondim_viscosity(v)),
        }
    }

    /// # Errors
    /// Empty table, invalid laws or inconsistent viscosity bounds
    pub fn validate(&self) -> SimResult<()> {
        if self.is_empty() {
            return Err(SimError::Config("at least one material is required".into()));
        }
        for m in &self.materials {
            m.viscosity
                .validate()
                .map_err(|e| SimError::Config(format!("material '{}': {}", m.name, e)))?;
        }
        if let (Some(min), Some(max)) = (self.min_viscosity, self.max_viscosity) {
            if !(min > 0.0 && min <= max) {
                return Err(SimError::Config(format!(
                    "viscosity bounds [{:e}, {:e}] are inconsistent",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

/// Deviatoric stress invariant `τ_II = 2 η ε̇_II`
pub fn deviatoric_stress_invariant(viscosity: f64, strain_rate: f64) -> f64 {
    2.0 * viscosity * strain_rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_materials() -> MaterialTable {
        MaterialTable::new(vec![
            Material::new("matrix", 1.0, ViscosityLaw::constant(1.0)),
            Material::new("inclusion", 3.0, ViscosityLaw::power_law(1.0, 1.0)),
        ])
    }

    fn stats(fractions: Vec<Vec<f64>>, mean_strain: Vec<f64>) -> CellStatistics {
        let counts = vec![1; fractions.len()];
        CellStatistics {
            fractions,
            mean_strain,
            counts,
        }
    }

    #[test]
    fn test_blended_density_and_viscosity() {
        let table = two_materials().with_viscosities(&[ViscosityLaw::constant(1.0), ViscosityLaw::constant(100.0)]).unwrap();
        let s = stats(vec![vec![1.0, 0.0], vec![0.25, 0.75]], vec![0.0, 0.0]);

        let rho = table.element_densities(&s);
        assert_relative_eq!(rho[0], 1.0);
        assert_relative_eq!(rho[1], 0.25 + 2.25);

        let eta = table.quadrature_viscosity(&s, &[[0.0; 9]; 2]).unwrap();
        assert_relative_eq!(eta[1][4], 0.25 + 75.0);
        assert!(table.is_linear());
        assert!(table.with_viscosities(&[ViscosityLaw::constant(1.0)]).is_err());
    }

    #[test]
    fn test_bounds_clamp_yielding() {
        let table = MaterialTable::new(vec![Material::new(
            "background",
            1.0,
            ViscosityLaw::von_mises(Cohesion::Constant(2.0), None),
        )])
        .with_bounds(Some(0.1), Some(10.0));
        let s = stats(vec![vec![1.0]], vec![0.0]);

        let mut rates = [1.0; 9];
        rates[0] = 0.0;
        rates[1] = 1e3;
        let eta = table.quadrature_viscosity(&s, &[rates]).unwrap();
        assert_relative_eq!(eta[0][0], 10.0);
        assert_relative_eq!(eta[0][1], 0.1);
        assert_relative_eq!(eta[0][2], 1.0, max_relative = 1e-12);
        assert!(!table.is_linear());
    }

    #[test]
    fn test_particle_cohesion_covers_every_particle() {
        let table = MaterialTable::new(vec![
            Material::new("mantle", 0.5, ViscosityLaw::constant(1.0)),
            Material::new("slab", 1.0, ViscosityLaw::von_mises(Cohesion::strain_weakening(0.06, 0.01, 0.5, 1.5), Some(500.0))),
        ]);
        let swarm = Swarm {
            positions: vec![nalgebra::Point2::origin(); 3],
            material: vec![0, 1, 1],
            strain: vec![5.0, 0.0, 1.0],
            cell: vec![0; 3],
        };
        let c = table.particle_cohesion(&swarm).unwrap();
        assert_eq!(c.len(), 3);
        assert_relative_eq!(c[0], 0.01);
        assert_relative_eq!(c[1], 0.06);
        assert_relative_eq!(c[2], 0.035, epsilon = 1e-12);
        assert!(two_materials().particle_cohesion(&swarm).is_none());
        assert_relative_eq!(deviatoric_stress_invariant(2.0, 0.25), 1.0);
    }

    #[test]
    fn test_validate() {
        assert!(MaterialTable::default().validate().is_err());
        assert!(two_materials().with_bounds(Some(10.0), Some(1.0)).validate().is_err());
        assert!(two_materials().validate().is_ok());
    }
}
