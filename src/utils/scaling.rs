/// Non-dimensionalisation for buoyancy-driven Stokes flow
///
/// **Problem:** Lithospheric models mix viscosities of 1e20–1e24 Pa·s,
/// lengths of 1e3–1e5 m and velocities of 1e-11–1e-9 m/s. Solving in SI
/// units gives matrices whose entries span more than thirty orders of
/// magnitude.
///
/// **Solution:** Pick reference length L*, density ρ*, gravity g* and
/// viscosity η* and derive the remaining scales from them:
///
/// ```text
/// pressure  p* = ρ* g* L*
/// time      t* = η* / p*
/// velocity  v* = L* / t*
/// mass      M* = ρ* g* L*² t*²
/// density   ρ̂  = ρ / (M* / L*³)
/// gravity   ĝ  = g / (L* / t*²)
/// ```
///
/// With this choice the reference buoyancy `ρ* g*` is exactly one in model
/// units, so a uniform material with the reference density has `ρ̂ ĝ = 1`.

use crate::utils::units::SECONDS_PER_MYR;

/// Characteristic scales for non-dimensionalisation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacteristicScales {
    /// Length scale L* [m]
    pub length: f64,
    /// Viscosity scale η* [Pa·s]
    pub viscosity: f64,

    // Derived scales
    /// Pressure and stress scale p* = ρ* g* L* [Pa]
    pub stress: f64,
    /// Time scale t* [s]
    pub time: f64,
    /// Velocity scale v* [m/s]
    pub velocity: f64,
    /// Strain rate scale 1/t* [1/s]
    pub strain_rate: f64,
    /// Mass scale M* [kg]
    pub mass: f64,
    /// Density scale M*/L*³ [kg/m³]
    pub density: f64,
    /// Acceleration scale L*/t*² [m/s²]
    pub gravity: f64,
}

impl CharacteristicScales {
    /// Derive all scales from the four reference values
    ///
    /// # Example
    /// ```
    /// use slab_simulator::utils::CharacteristicScales;
    /// let scales = CharacteristicScales::from_reference(100e3, 2.7e3, 9.81, 1e22);
    /// assert!((scales.nondim_density(2.7e3) * scales.nondim_gravity(9.81) - 1.0).abs() < 1e-12);
    /// ```
    pub fn from_reference(length: f64, density: f64, gravity: f64, viscosity: f64) -> Self {
        let stress = density * gravity * length;
        let time = viscosity / stress;
        let velocity = length / time;
        let mass = density * gravity * length * length * time * time;

        Self {
            length,
            viscosity,
            stress,
            time,
            velocity,
            strain_rate: 1.0 / time,
            mass,
            density: mass / length.powi(3),
            gravity: length / (time * time),
        }
    }

    /// Print scaling information for diagnostics
    pub fn print_summary(&self) {
        println!("═══════════════════════════════════════════════════════════════");
        println!("  Non-dimensionalization Scales");
        println!("═══════════════════════════════════════════════════════════════");
        println!("  Length (L*):      {:.2e} m ({:.1} km)", self.length, self.length / 1e3);
        println!("  Viscosity (η*):   {:.2e} Pa·s", self.viscosity);
        println!("  Stress (p*):      {:.2e} Pa ({:.2} MPa)", self.stress, self.stress / 1e6);
        println!("  Time (t*):        {:.2e} s ({:.3} Myr)", self.time, self.time / SECONDS_PER_MYR);
        println!("  Velocity (v*):    {:.2e} m/s", self.velocity);
        println!("  Strain rate (ė*): {:.2e} 1/s", self.strain_rate);
        println!("═══════════════════════════════════════════════════════════════\n");
    }

    // ========================================================================
    // Nondimensionalization (Physical → Dimensionless)
    // ========================================================================

    pub fn nondim_length(&self, x: f64) -> f64 {
        x / self.length
    }

    pub fn nondim_velocity(&self, v: f64) -> f64 {
        v / self.velocity
    }

    pub fn nondim_stress(&self, p: f64) -> f64 {
        p / self.stress
    }

    pub fn nondim_time(&self, t: f64) -> f64 {
        t / self.time
    }

    pub fn nondim_viscosity(&self, eta: f64) -> f64 {
        eta / self.viscosity
    }

    pub fn nondim_density(&self, rho: f64) -> f64 {
        rho / self.density
    }

    pub fn nondim_gravity(&self, g: f64) -> f64 {
        g / self.gravity
    }

    pub fn nondim_strain_rate(&self, rate: f64) -> f64 {
        rate / self.strain_rate
    }

    // ========================================================================
    // Dimensionalization (Dimensionless → Physical)
    // ========================================================================

    pub fn dim_length(&self, x: f64) -> f64 {
        x * self.length
    }

    pub fn dim_velocity(&self, v: f64) -> f64 {
        v * self.velocity
    }

    pub fn dim_stress(&self, p: f64) -> f64 {
        p * self.stress
    }

    pub fn dim_time(&self, t: f64) -> f64 {
        t * self.time
    }

    pub fn dim_viscosity(&self, eta: f64) -> f64 {
        eta * self.viscosity
    }

    pub fn dim_strain_rate(&self, rate: f64) -> f64 {
        rate * self.strain_rate
    }

    /// Model time in million years
    pub fn time_in_myr(&self, t: f64) -> f64 {
        self.dim_time(t) / SECONDS_PER_MYR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_notch_reference_scales() {
        let s = CharacteristicScales::from_reference(100e3, 2.7e3, 9.81, 1e22);

        assert_relative_eq!(s.stress, 2.7e3 * 9.81 * 100e3, max_relative = 1e-14);
        assert_relative_eq!(s.time, 1e22 / 2.6487e9, max_relative = 1e-12);
        assert_relative_eq!(s.velocity * s.time, 100e3, max_relative = 1e-12);

        // Reference buoyancy is one
        assert_relative_eq!(s.nondim_density(2.7e3) * s.nondim_gravity(9.81), 1.0, max_relative = 1e-12);

        // Brick of 800 m and the 40 km box
        assert_relative_eq!(s.nondim_length(800.0), 0.008, max_relative = 1e-14);
        assert_relative_eq!(s.nondim_length(40e3), 0.4, max_relative = 1e-14);
        assert_relative_eq!(s.nondim_viscosity(1e20), 0.01);
    }

    #[test]
    fn test_conversions_invert() {
        let s = CharacteristicScales::from_reference(1e3, 3e3, 10.0, 1e21);
        assert_relative_eq!(s.dim_velocity(s.nondim_velocity(2e-11)), 2e-11, max_relative = 1e-14);
        assert_relative_eq!(s.dim_stress(s.nondim_stress(40e6)), 40e6, max_relative = 1e-14);
        assert_relative_eq!(s.dim_strain_rate(s.nondim_strain_rate(1e-15)), 1e-15, max_relative = 1e-14);
        assert_relative_eq!(s.time_in_myr(s.nondim_time(SECONDS_PER_MYR)), 1.0, max_relative = 1e-12);
    }
}
