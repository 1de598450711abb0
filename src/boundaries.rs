//! Orography variants (spec.md §4.7 "B — Boundaries"): zero, an
//! analytic zonal ridge (Jablonowski–Williamson), and data-file
//! orography. Each produces grid-space orography and the spectral
//! surface geopotential `Φ_s = g·h_s`; both are written once at
//! initialization and read-only afterward.
//!
//! Grounded on the teacher's per-model parameter structs
//! (`models/halo_kilonova.rs`: `#[derive(Clone, Serialize, Deserialize)]`
//! `#[serde(deny_unknown_fields)]` plus an inherent `validate`) and on
//! `app.rs`'s `AnyModel`/`AnyHydro` tagged-enum dispatch for the
//! variant switch.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::PlanetConstants;
use crate::geometry::Geometry;
use crate::spectral::{SpectralField, SpectralTransform};

/// Grid-space orography plus the spectral surface geopotential it
/// implies.
pub struct Orography {
    pub height_grid: Vec<f64>,
    pub geopotential: SpectralField,
}

/// A single latitude-only Gaussian ridge, constant in longitude — the
/// zonal-ridge reading of spec.md §4.7's "analytic zonal ridge
/// (Jablonowski–Williamson)".
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZonalRidgeOrography {
    pub peak_height: f64,
    pub center_latitude: f64,
    pub half_width: f64,
}

impl ZonalRidgeOrography {
    pub fn validate(&self) -> Result<()> {
        if self.half_width <= 0.0 {
            bail!("zonal ridge half_width must be positive, got {}", self.half_width);
        }
        Ok(())
    }

    fn height_at(&self, lat: f64) -> f64 {
        let dlat = lat - self.center_latitude;
        self.peak_height * (-(dlat * dlat) / (2.0 * self.half_width * self.half_width)).exp()
    }
}

/// Spectral-degree taper applied above `fraction·L` (SPEC_FULL.md §2:
/// spec.md §6 names `power, strength, fraction` for the data-file
/// variant's smoothing but not the formula).
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpectralSmoothing {
    pub power: f64,
    pub strength: f64,
    pub fraction: f64,
}

impl SpectralSmoothing {
    fn taper(&self, l: usize, l_max: usize) -> f64 {
        let cutoff = self.fraction * l_max as f64;
        if l as f64 <= cutoff {
            1.0
        } else {
            1.0 / (1.0 + self.strength * (l as f64 / l_max as f64).powf(self.power))
        }
    }
}

/// Data-file orography (spec.md §6 "Orography initializer"): a NetCDF
/// field on a `file_Grid` grid kind, scaled by `scale`, optionally
/// smoothed in spectral space.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataFileOrography {
    pub path: String,
    pub file: String,
    pub variable: String,
    pub scale: f64,
    pub smoothing: Option<SpectralSmoothing>,
}

fn read_netcdf_orography(geometry: &Geometry, data: &DataFileOrography) -> Result<Vec<f64>> {
    let full_path = std::path::Path::new(&data.path).join(&data.file);
    let file = netcdf::open(&full_path)
        .with_context(|| format!("opening orography file {}", full_path.display()))?;
    let var = file
        .variable(&data.variable)
        .with_context(|| format!("orography file missing variable '{}'", data.variable))?;
    let raw: Vec<f64> = var
        .values::<f64, _>(..)
        .context("reading orography variable")?
        .into_raw_vec();
    geometry.assert_grid_len("data-file orography", raw.len())?;
    Ok(raw.into_iter().map(|h| h * data.scale).collect())
}

/// Tagged dispatch over the three orography variants (spec.md §4.7),
/// selected once at `App::from_config` time — the same "tagged variant
/// composed at construction" shape as the teacher's `AnyModel`.
#[derive(Clone, Serialize, Deserialize, derive_more::From)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub enum OrographyVariant {
    Zero,
    JablonowskiWilliamson(ZonalRidgeOrography),
    DataFile(DataFileOrography),
}

impl OrographyVariant {
    pub fn validate(&self) -> Result<()> {
        match self {
            OrographyVariant::Zero => Ok(()),
            OrographyVariant::JablonowskiWilliamson(ridge) => ridge.validate(),
            OrographyVariant::DataFile(data) => {
                if data.scale == 0.0 {
                    bail!("data-file orography scale must be nonzero");
                }
                Ok(())
            }
        }
    }

    /// Builds grid orography and spectral `Φ_s` once at startup
    /// (spec.md §4.7: "Initialization writes both; subsequent RHS
    /// evaluations read-only").
    pub fn build(&self, geometry: &Geometry, transform: &SpectralTransform, planet: &PlanetConstants) -> Result<Orography> {
        let height_grid = match self {
            OrographyVariant::Zero => vec![0.0; geometry.npoints],
            OrographyVariant::JablonowskiWilliamson(ridge) => {
                let mut grid = vec![0.0; geometry.npoints];
                for (j, range) in geometry.each_ring() {
                    let h = ridge.height_at(geometry.rings[j].lat);
                    for idx in range {
                        grid[idx] = h;
                    }
                }
                grid
            }
            OrographyVariant::DataFile(data) => read_netcdf_orography(geometry, data)?,
        };

        let mut geopotential = transform.forward(&height_grid, geometry)?;
        geopotential.scale(planet.gravity);

        if let OrographyVariant::DataFile(DataFileOrography { smoothing: Some(smoothing), .. }) = self {
            for l in 0..=geometry.trunc {
                let factor = smoothing.taper(l, geometry.trunc);
                if (factor - 1.0).abs() > f64::EPSILON {
                    for m in 0..=l {
                        let scaled = geopotential.get(l, m) * factor;
                        geopotential.set(l, m, scaled);
                    }
                }
            }
        }

        Ok(Orography { height_grid, geopotential })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GridKind;

    fn geometry() -> Geometry {
        Geometry::new(10, 8, GridKind::FullGaussianGrid, 7.29e-5, None).unwrap()
    }

    #[test]
    fn zero_orography_has_no_relief_or_geopotential() {
        let geometry = geometry();
        let transform = SpectralTransform::new(&geometry);
        let planet = PlanetConstants::earth();
        let orography = OrographyVariant::Zero.build(&geometry, &transform, &planet).unwrap();

        assert!(orography.height_grid.iter().all(|&h| h == 0.0));
        for l in 0..=geometry.trunc {
            for m in 0..=l {
                assert_eq!(orography.geopotential.get(l, m).norm(), 0.0);
            }
        }
    }

    #[test]
    fn zonal_ridge_rejects_nonpositive_half_width() {
        let ridge = ZonalRidgeOrography { peak_height: 1000.0, center_latitude: 0.5, half_width: 0.0 };
        assert!(ridge.validate().is_err());
    }

    #[test]
    fn zonal_ridge_is_constant_along_each_ring() {
        let geometry = geometry();
        let transform = SpectralTransform::new(&geometry);
        let planet = PlanetConstants::earth();
        let ridge = ZonalRidgeOrography { peak_height: 2000.0, center_latitude: 0.6, half_width: 0.3 };
        let orography = OrographyVariant::JablonowskiWilliamson(ridge).build(&geometry, &transform, &planet).unwrap();

        for (_, range) in geometry.each_ring() {
            let first = orography.height_grid[range.start];
            for idx in range {
                assert!((orography.height_grid[idx] - first).abs() < 1e-12);
            }
        }
        // Φ_s = g·h_s, so a nonzero ridge must leave a nonzero geopotential mean.
        assert!(orography.geopotential.mean().norm() > 0.0);
    }
}
