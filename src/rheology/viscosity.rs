/// Effective viscosity laws
///
/// All laws are written in terms of the second invariant of the strain
/// rate `ε̇_II = sqrt(½ ε̇:ε̇)`:
///
/// ```text
/// constant:   η = η₀
/// power law:  η = A · ε̇_II^(1/n − 1)
/// von Mises:  η = C(ε) / (2 (ε̇_II + ε̇_reg)),   optionally min(η, η_cap)
/// ```
///
/// The von Mises form keeps the deviatoric stress `τ_II = 2 η ε̇_II` at the
/// yield stress `C`.
///
/// # References
/// - Moresi & Solomatov (1998), "Mantle convection with a brittle lithosphere"
/// - Schmalholz (2011), "A simple analytical solution for slab detachment"

use serde::{Deserialize, Serialize};
use crate::error::{SimError, SimResult};
use super::Cohesion;

/// Regularisation added to `ε̇_II` before dividing by it
pub const STRAIN_RATE_REGULARISATION: f64 = 1.0e-18;

/// Viscosity law of one material
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViscosityLaw {
    /// Newtonian viscosity
    Constant { value: f64 },
    /// Dislocation-creep style power law with stress exponent `exponent`
    PowerLaw { prefactor: f64, exponent: f64 },
    /// Pressure-independent yielding, capped by an optional upper viscosity
    VonMises {
        cohesion: Cohesion,
        #[serde(default)]
        cap: Option<f64>,
    },
}

impl ViscosityLaw {
    pub fn constant(value: f64) -> Self {
        ViscosityLaw::Constant { value }
    }

    pub fn power_law(prefactor: f64, exponent: f64) -> Self {
        ViscosityLaw::PowerLaw { prefactor, exponent }
    }

    pub fn von_mises(cohesion: Cohesion, cap: Option<f64>) -> Self {
        ViscosityLaw::VonMises { cohesion, cap }
    }

    /// Effective viscosity
    ///
    /// # Arguments
    /// * `strain_rate` - Second invariant ε̇_II
    /// * `strain` - Accumulated plastic strain (used by weakening cohesion)
    pub fn evaluate(&self, strain_rate: f64, strain: f64) -> f64 {
        match self {
            ViscosityLaw::Constant { value } => *value,
            ViscosityLaw::PowerLaw { prefactor, exponent } => {
                let rate = strain_rate.max(0.0) + STRAIN_RATE_REGULARISATION;
                prefactor * rate.powf(1.0 / exponent - 1.0)
            }
            ViscosityLaw::VonMises { cohesion, cap } => {
                let eta = 0.5 * cohesion.value(strain) / (strain_rate.max(0.0) + STRAIN_RATE_REGULARISATION);
                match cap {
                    Some(cap) => eta.min(*cap),
                    None => eta,
                }
            }
        }
    }

    /// Whether the viscosity is independent of the velocity
    pub fn is_linear(&self) -> bool {
        match self {
            ViscosityLaw::Constant { .. } => true,
            ViscosityLaw::PowerLaw { exponent, .. } => *exponent == 1.0,
            ViscosityLaw::VonMises { .. } => false,
        }
    }

    pub fn cohesion(&self) -> Option<&Cohesion> {
        match self {
            ViscosityLaw::VonMises { cohesion, .. } => Some(cohesion),
            _ => None,
        }
    }

    /// Convert dimensional parameters to model units
    ///
    /// # Arguments
    /// * `viscosity_scale` - η* (Pa·s)
    /// * `stress_scale` - τ* (Pa)
    /// * `strain_rate_scale` - ε̇* (1/s)
    pub fn nondimensionalise(&self, viscosity_scale: f64, stress_scale: f64, strain_rate_scale: f64) -> Self {
        match self {
            ViscosityLaw::Constant { value } => ViscosityLaw::Constant {
                value: value / viscosity_scale,
            },
            // A ε̇^(1/n − 1) has units of viscosity once ε̇ is dimensional
            ViscosityLaw::PowerLaw { prefactor, exponent } => ViscosityLaw::PowerLaw {
                prefactor: prefactor * strain_rate_scale.powf(1.0 / exponent - 1.0) / viscosity_scale,
                exponent: *exponent,
            },
            ViscosityLaw::VonMises { cohesion, cap } => ViscosityLaw::VonMises {
                cohesion: cohesion.scaled(1.0 / stress_scale),
                cap: cap.map(|c| c / viscosity_scale),
            },
        }
    }

    /// # Errors
    /// Non-positive viscosities, prefactors or exponents, invalid cohesion
    pub fn validate(&self) -> SimResult<()> {
        match self {
            ViscosityLaw::Constant { value } if !(*value > 0.0) => {
                Err(SimError::Config(format!("viscosity must be positive, got {}", value)))
            }
            ViscosityLaw::PowerLaw { prefactor, exponent } if !(*prefactor > 0.0 && *exponent > 0.0) => {
                Err(SimError::Config(format!(
                    "power law needs positive prefactor and exponent, got A = {}, n = {}",
                    prefactor, exponent
                )))
            }
            ViscosityLaw::VonMises { cohesion, cap } => {
                cohesion.validate()?;
                match cap {
                    Some(c) if !(*c > 0.0) => {
                        Err(SimError::Config(format!("viscosity cap must be positive, got {}", c)))
                    }
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_power_law() {
        let law = ViscosityLaw::power_law(2.0, 4.0);
        // η = 2 · (1e-2)^(-3/4)
        assert_relative_eq!(law.evaluate(1e-2, 0.0), 2.0 * 1e-2_f64.powf(-0.75), max_relative = 1e-12);
        assert!(!law.is_linear());
        assert!(ViscosityLaw::power_law(5.0, 1.0).is_linear());
        assert_relative_eq!(ViscosityLaw::power_law(5.0, 1.0).evaluate(3.0, 0.0), 5.0);
    }

    #[test]
    fn test_von_mises_yield_stress_and_cap() {
        let law = ViscosityLaw::von_mises(Cohesion::strain_weakening(0.06, 0.01, 0.5, 1.5), Some(500.0));

        // Yielding: τ_II = 2 η ε̇_II = C
        let eta = law.evaluate(1.0, 0.0);
        assert_relative_eq!(2.0 * eta * 1.0, 0.06, max_relative = 1e-12);
        assert_relative_eq!(law.evaluate(1.0, 2.0), 0.005, max_relative = 1e-12);

        // Slow deformation hits the cap
        assert_relative_eq!(law.evaluate(0.0, 0.0), 500.0);
        assert!(law.cohesion().is_some());
    }

    #[test]
    fn test_nondimensionalise_power_law() {
        let law = ViscosityLaw::power_law(4.75e11, 4.0);
        let (eta_s, tau_s, rate_s) = (1e22, 2.6487e9, 2.6487e9 / 1e22);
        let nd = law.nondimensionalise(eta_s, tau_s, rate_s);

        // Same viscosity at the same physical strain rate
        let rate = 1e-9;
        let eta_phys = law.evaluate(rate, 0.0);
        let eta_nd = nd.evaluate(rate / rate_s, 0.0);
        assert_relative_eq!(eta_nd * eta_s, eta_phys, max_relative = 1e-6);
    }

    #[test]
    fn test_validate_and_deserialize() {
        assert!(ViscosityLaw::constant(0.0).validate().is_err());
        assert!(ViscosityLaw::power_law(1.0, -2.0).validate().is_err());

        let law: ViscosityLaw = toml::from_str("type = \"von_mises\"\ncohesion = 40e6").unwrap();
        assert_eq!(law, ViscosityLaw::von_mises(Cohesion::Constant(40e6), None));
    }
}
