//! Unit conversions and non-dimensionalisation

pub mod units;
pub mod scaling;

pub use units::{
    years_to_seconds, seconds_to_years,
    myr_to_seconds, seconds_to_myr,
    pa_to_mpa, mpa_to_pa,
    km_to_m, m_to_km,
    cm_per_year_to_m_per_s, m_per_s_to_cm_per_year,
};
pub use scaling::CharacteristicScales;
