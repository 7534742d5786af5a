//! Unit conversions used when reading SI configuration and reporting results
//!
//! Model quantities are dimensionless once a scaling is active; these helpers
//! handle the SI side (time in years, stresses in MPa, plate rates in cm/yr).

// ============================================================================
// Time Conversions
// ============================================================================

/// Seconds per year (365.25 days)
pub const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// Seconds per million years
pub const SECONDS_PER_MYR: f64 = SECONDS_PER_YEAR * 1e6;

/// Convert years to seconds
#[inline]
pub fn years_to_seconds(years: f64) -> f64 {
    years * SECONDS_PER_YEAR
}

/// Convert seconds to years
#[inline]
pub fn seconds_to_years(seconds: f64) -> f64 {
    seconds / SECONDS_PER_YEAR
}

/// Convert million years to seconds
#[inline]
pub fn myr_to_seconds(myr: f64) -> f64 {
    myr * SECONDS_PER_MYR
}

/// Convert seconds to million years
///
/// # Examples
/// ```
/// use slab_simulator::utils::units::seconds_to_myr;
/// let t = seconds_to_myr(3.15576e13);
/// assert!((t - 1.0).abs() < 1e-12);
/// ```
#[inline]
pub fn seconds_to_myr(seconds: f64) -> f64 {
    seconds / SECONDS_PER_MYR
}

// ============================================================================
// Stress Conversions
// ============================================================================

pub const MPA_TO_PA: f64 = 1e6;

/// Convert pascals to megapascals
#[inline]
pub fn pa_to_mpa(pa: f64) -> f64 {
    pa / MPA_TO_PA
}

/// Convert megapascals to pascals
///
/// # Examples
/// ```
/// use slab_simulator::utils::units::mpa_to_pa;
/// assert_eq!(mpa_to_pa(40.0), 40e6); // notch background cohesion
/// ```
#[inline]
pub fn mpa_to_pa(mpa: f64) -> f64 {
    mpa * MPA_TO_PA
}

// ============================================================================
// Length and Velocity Conversions
// ============================================================================

/// Convert kilometers to meters
#[inline]
pub fn km_to_m(km: f64) -> f64 {
    km * 1e3
}

/// Convert meters to kilometers
#[inline]
pub fn m_to_km(m: f64) -> f64 {
    m * 1e-3
}

/// Convert centimeters per year to meters per second
#[inline]
pub fn cm_per_year_to_m_per_s(cm_per_year: f64) -> f64 {
    cm_per_year * 1e-2 / SECONDS_PER_YEAR
}

/// Convert meters per second to centimeters per year
#[inline]
pub fn m_per_s_to_cm_per_year(m_per_s: f64) -> f64 {
    m_per_s * 1e2 * SECONDS_PER_YEAR
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_time_conversions() {
        assert_relative_eq!(seconds_to_years(years_to_seconds(1000.0)), 1000.0, max_relative = 1e-14);
        assert_relative_eq!(seconds_to_myr(myr_to_seconds(2.0)), 2.0, max_relative = 1e-14);
        assert!((SECONDS_PER_YEAR - 31_557_600.0).abs() < 1.0);
    }

    #[test]
    fn test_stress_and_velocity() {
        assert_relative_eq!(pa_to_mpa(mpa_to_pa(44.0)), 44.0);
        assert_relative_eq!(km_to_m(m_to_km(40e3)), 40e3);

        // 1 cm/yr ≈ 3.17e-10 m/s
        let v = cm_per_year_to_m_per_s(1.0);
        assert_relative_eq!(v, 3.168_808_781e-10, max_relative = 1e-8);
        assert_relative_eq!(m_per_s_to_cm_per_year(v), 1.0, max_relative = 1e-14);
    }
}
