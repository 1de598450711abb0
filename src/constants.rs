//! Planet and atmosphere physical constants (spec.md §6 "A model
//! descriptor composes..."). Plain serde structs in the teacher's
//! model-parameter style (`models/halo_kilonova.rs`: public fields,
//! `deny_unknown_fields`, no builder).

use serde::{Deserialize, Serialize};

/// Constants of the planet itself, independent of the atmosphere on it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanetConstants {
    /// Gravitational acceleration, m/s^2.
    pub gravity: f64,
    /// Rotation rate Ω, rad/s.
    pub rotation_rate: f64,
    /// Mean radius R, m.
    pub radius: f64,
}

impl PlanetConstants {
    pub fn earth() -> Self {
        Self { gravity: 9.81, rotation_rate: 7.292e-5, radius: 6.371e6 }
    }
}

/// Constants of the bulk atmosphere. `kappa` is derived, not
/// configured, to keep `R_d / c_p` from drifting out of sync with the
/// two inputs it's computed from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtmosphereConstants {
    /// Gas constant for dry air, J/(kg K).
    pub r_dry: f64,
    /// Gas constant for water vapor, J/(kg K).
    pub r_vapor: f64,
    /// Specific heat at constant pressure, J/(kg K).
    pub c_p: f64,
}

impl AtmosphereConstants {
    pub fn earth() -> Self {
        Self { r_dry: 287.0, r_vapor: 461.5, c_p: 1004.0 }
    }

    /// `κ = R_d / c_p`, used by the temperature tendency (spec.md
    /// §4.3 step 7).
    pub fn kappa(&self) -> f64 {
        self.r_dry / self.c_p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kappa_matches_earth_textbook_value() {
        let atmo = AtmosphereConstants::earth();
        assert!((atmo.kappa() - 0.2859).abs() < 1e-3);
    }
}
