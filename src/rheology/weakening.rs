/// Cohesion laws for von Mises yielding
///
/// **Strain weakening** reduces cohesion linearly with accumulated plastic
/// strain between two thresholds:
///
/// ```text
///        ⎧ C₀                                   ε < ε₁
/// C(ε) = ⎨ C₁                                   ε > ε₂
///        ⎩ C₀ + (C₀ − C₁)/(ε₁ − ε₂) · (ε − ε₁)   otherwise
/// ```
///
/// # References
/// - Lavier et al. (2000), "Factors controlling normal fault offset"
/// - Huismans & Beaumont (2003), "Symmetric and asymmetric lithospheric extension"

use serde::{Deserialize, Serialize};
use crate::error::{SimError, SimResult};

/// Cohesion as a function of accumulated strain
///
/// Deserialises from a bare number (constant) or a table with the four
/// weakening parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Cohesion {
    Constant(f64),
    StrainWeakening {
        /// Intact cohesion C₀
        initial: f64,
        /// Fully weakened cohesion C₁
        weakened: f64,
        /// Strain ε₁ where weakening starts
        strain_start: f64,
        /// Strain ε₂ where weakening is complete
        strain_end: f64,
    },
}

impl Cohesion {
    /// Piecewise-linear weakening from `initial` to `weakened`
    pub fn strain_weakening(initial: f64, weakened: f64, strain_start: f64, strain_end: f64) -> Self {
        Cohesion::StrainWeakening {
            initial,
            weakened,
            strain_start,
            strain_end,
        }
    }

    /// Cohesion at accumulated strain `strain`
    pub fn value(&self, strain: f64) -> f64 {
        match *self {
            Cohesion::Constant(c) => c,
            Cohesion::StrainWeakening {
                initial,
                weakened,
                strain_start,
                strain_end,
            } => {
                if strain < strain_start {
                    initial
                } else if strain > strain_end || strain_end <= strain_start {
                    weakened
                } else {
                    initial + (initial - weakened) / (strain_start - strain_end) * (strain - strain_start)
                }
            }
        }
    }

    /// Smallest and largest value the law can return
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Cohesion::Constant(c) => (c, c),
            Cohesion::StrainWeakening { initial, weakened, .. } => {
                (initial.min(weakened), initial.max(weakened))
            }
        }
    }

    /// Multiply every cohesion value by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        match *self {
            Cohesion::Constant(c) => Cohesion::Constant(c * factor),
            Cohesion::StrainWeakening {
                initial,
                weakened,
                strain_start,
                strain_end,
            } => Cohesion::StrainWeakening {
                initial: initial * factor,
                weakened: weakened * factor,
                strain_start,
                strain_end,
            },
        }
    }

    /// # Errors
    /// Negative cohesion or a strain window with `strain_end < strain_start`
    pub fn validate(&self) -> SimResult<()> {
        let (lo, _) = self.bounds();
        if !(lo >= 0.0) {
            return Err(SimError::Config(format!("cohesion must be non-negative, got {}", lo)));
        }
        if let Cohesion::StrainWeakening {
            strain_start,
            strain_end,
            ..
        } = *self
        {
            if strain_end < strain_start {
                return Err(SimError::Config(format!(
                    "weakening window [{}, {}] is reversed",
                    strain_start, strain_end
                )));
            }
        }
        Ok(())
    }
}
