//! Shallow-water interface relaxation (spec.md §4.6 "R — Relaxation"):
//! relaxes the `(l=1,m=0)` and `(l=2,m=0)` modes of `pres_tend` toward
//! a seasonally varying target declination.

use anyhow::{bail, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::spectral::SpectralField;

/// Empirical conversion from the tropic-of-cancer latitude (in degrees)
/// to the Legendre-mode amplitude scale spec.md §4.6 calls `s = 45/23.5`.
const DECLINATION_SCALE: f64 = 45.0 / 23.5;

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_YEAR: f64 = 365.25;

/// Seasonal interface-relaxation parameters (spec.md §4.6).
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaxationConfig {
    /// `S` in spec.md §4.6: `false` pins the target declination at zero
    /// (no seasonal cycle).
    pub seasonal: bool,
    /// `t_eq`, seconds since the simulation epoch.
    pub equinox_time: f64,
    /// `φ_T`, the tropic-of-cancer latitude in radians.
    pub tropic_latitude: f64,
    /// `A`, the relaxation-target amplitude.
    pub amplitude: f64,
    /// `τ`, the relaxation timescale in seconds.
    pub relaxation_time: f64,
}

impl RelaxationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.relaxation_time <= 0.0 {
            bail!("relaxation_time must be positive, got {}", self.relaxation_time);
        }
        Ok(())
    }

    /// Target declination `θ` at model time `t` (seconds), spec.md §4.6.
    fn declination(&self, t: f64) -> f64 {
        if !self.seasonal {
            return 0.0;
        }
        let days = (t - self.equinox_time) / SECONDS_PER_DAY;
        DECLINATION_SCALE * self.tropic_latitude * (2.0 * std::f64::consts::PI * days / DAYS_PER_YEAR).sin()
    }

    /// Relaxes `pres_tend`'s `(1,0)` and `(2,0)` modes toward the
    /// seasonal target (spec.md §4.6): `pres_current` supplies the
    /// present-day values of those two modes, read from the surface
    /// field's current leapfrog slot.
    pub fn apply(&self, t: f64, pres_current: &SpectralField, pres_tend: &mut SpectralField) {
        let theta = self.declination(t);
        let eta2 = self.amplitude * 2.0 * theta.sin();
        let eta3 = self.amplitude * (0.2 - 1.5 * theta.cos());
        let inv_tau = 1.0 / self.relaxation_time;

        let relaxed2 = pres_tend.get(1, 0) + inv_tau * (Complex64::new(eta2, 0.0) - pres_current.get(1, 0));
        let relaxed3 = pres_tend.get(2, 0) + inv_tau * (Complex64::new(eta3, 0.0) - pres_current.get(2, 0));
        pres_tend.set(1, 0, relaxed2);
        pres_tend.set(2, 0, relaxed3);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RelaxationConfig {
        RelaxationConfig {
            seasonal: true,
            equinox_time: 0.0,
            tropic_latitude: 23.5_f64.to_radians(),
            amplitude: 2.0,
            relaxation_time: 86_400.0,
        }
    }

    #[test]
    fn rejects_nonpositive_relaxation_time() {
        let mut cfg = config();
        cfg.relaxation_time = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_seasonal_target_is_time_independent() {
        let mut cfg = config();
        cfg.seasonal = false;
        assert_eq!(cfg.declination(0.0), 0.0);
        assert_eq!(cfg.declination(200.0 * SECONDS_PER_DAY), 0.0);
    }

    #[test]
    fn apply_only_touches_the_two_named_modes() {
        let cfg = config();
        let current = SpectralField::zeros(4);
        let mut tend = SpectralField::zeros(4);
        tend.set(3, 1, Complex64::new(7.0, -2.0));
        let before = tend.get(3, 1);

        cfg.apply(0.0, &current, &mut tend);

        assert_eq!(tend.get(3, 1), before);
        assert!(tend.get(1, 0).norm() > 0.0 || tend.get(2, 0).norm() > 0.0);
    }
}
