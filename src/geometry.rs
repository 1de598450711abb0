use std::ops::Range;

use anyhow::{bail, Result};

/// Per-ring metadata for a latitude ring of a Gaussian grid.
///
/// Rings are stored south-to-north-independent: ring `j` and ring
/// `nlat - 1 - j` are the Southern/Northern mirror pair used by the
/// transform (§4.1). `start`/`len` index into the flat, ring-major grid
/// buffer so reduced Gaussian grids (variable `nlon` per ring) work
/// without a 2-D array.
#[derive(Clone, Debug)]
pub struct RingGeometry {
    pub start: usize,
    pub len: usize,
    pub lat: f64,
    pub cos_lat: f64,
    pub cos_lat_inv2: f64,
    pub weight: f64,
    pub coriolis: f64,
}

/// Which member of the Gaussian-latitude family the grid uses.
///
/// `FullGaussianGrid` keeps `nlon` constant across rings.
/// `OctahedralGaussianGrid` shrinks `nlon` toward the poles following
/// the reduction rule in SPEC_FULL.md §2 (not specified exactly by
/// spec.md, resolved there as an Open Question).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    FullGaussianGrid,
    OctahedralGaussianGrid,
}

/// Sigma-level vertical metadata for a layered (primitive-equation)
/// state. `Σ delta_sigma[k] = 1` is a hard invariant checked at
/// construction (spec.md §3, §7 "configuration error").
#[derive(Clone, Debug)]
pub struct SigmaLevels {
    pub nlev: usize,
    /// Half-level sigma values, length `nlev + 1`: `half[0] = 0` (model
    /// top), `half[nlev] = 1` (surface).
    pub half: Vec<f64>,
    /// Full-level sigma values, length `nlev`.
    pub full: Vec<f64>,
    /// Layer thickness `Δσ_k`, length `nlev`.
    pub delta_sigma: Vec<f64>,
    /// Vertical-advection interpolation weight toward the half-level
    /// above the layer, length `nlev`; `a_coeff[k] + b_coeff[k] == 1`.
    pub a_coeff: Vec<f64>,
    /// Vertical-advection interpolation weight toward the half-level
    /// below the layer, length `nlev`.
    pub b_coeff: Vec<f64>,
}

impl SigmaLevels {
    /// Build sigma levels from `nlev` equal-thickness layers.
    pub fn equal(nlev: usize) -> Result<Self> {
        if nlev == 0 {
            bail!("nlev must be > 0");
        }
        let half: Vec<f64> = (0..=nlev).map(|k| k as f64 / nlev as f64).collect();
        Self::from_half_levels(half)
    }

    /// Build sigma levels from arbitrary half-level values. `half` must
    /// be increasing, start at 0.0 and end at 1.0.
    pub fn from_half_levels(half: Vec<f64>) -> Result<Self> {
        if half.len() < 2 {
            bail!("need at least one layer (two half levels)");
        }
        if (half[0] - 0.0).abs() > 1e-12 || (half[half.len() - 1] - 1.0).abs() > 1e-12 {
            bail!("half levels must run from 0.0 to 1.0");
        }
        for w in half.windows(2) {
            if w[1] <= w[0] {
                bail!("half levels must be strictly increasing");
            }
        }
        let nlev = half.len() - 1;
        let delta_sigma: Vec<f64> = (0..nlev).map(|k| half[k + 1] - half[k]).collect();
        let total: f64 = delta_sigma.iter().sum();
        if (total - 1.0).abs() > 1e-10 {
            bail!("sigma layer thicknesses must sum to 1.0, got {}", total);
        }
        let full: Vec<f64> = (0..nlev).map(|k| 0.5 * (half[k] + half[k + 1])).collect();
        let a_coeff: Vec<f64> = (0..nlev)
            .map(|k| (half[k + 1] - full[k]) / delta_sigma[k])
            .collect();
        let b_coeff: Vec<f64> = (0..nlev).map(|k| 1.0 - a_coeff[k]).collect();
        Ok(Self { nlev, half, full, delta_sigma, a_coeff, b_coeff })
    }
}

/// Precomputed per-ring geometry and vertical metadata for one model
/// instance. Built once at startup and shared read-only across the
/// integration (spec.md §5 "Shared-resource policy").
#[derive(Clone, Debug)]
pub struct Geometry {
    pub trunc: usize,
    pub grid_kind: GridKind,
    pub nlat: usize,
    pub nlon_full: usize,
    pub rings: Vec<RingGeometry>,
    pub npoints: usize,
    pub sigma: Option<SigmaLevels>,
    pub rotation_rate: f64,
}

impl Geometry {
    /// `nlat_half` is the number of Gaussian latitudes in one
    /// hemisphere; spec.md §4.1 requires `nlat >= (3L+1)/2`. `sigma` is
    /// `None` for single-layer (barotropic/shallow-water) runs.
    pub fn new(
        trunc: usize,
        nlat_half: usize,
        grid_kind: GridKind,
        rotation_rate: f64,
        sigma: Option<SigmaLevels>,
    ) -> Result<Self> {
        let nlat = 2 * nlat_half;
        let min_nlat = (3 * trunc + 1 + 1) / 2;
        if nlat < min_nlat {
            bail!(
                "nlat ({}) too small for truncation T{}: need nlat >= {}",
                nlat,
                trunc,
                min_nlat,
            );
        }
        let nlon_full = next_fft_friendly(3 * trunc + 1);

        let (lats, weights) = crate::spectral::gaussian::latitudes_and_weights(nlat_half);

        let mut rings = Vec::with_capacity(nlat);
        let mut start = 0usize;
        for j in 0..nlat {
            let lat = if j < nlat_half { lats[j] } else { -lats[nlat - 1 - j] };
            let weight = if j < nlat_half { weights[j] } else { weights[nlat - 1 - j] };
            let len = match grid_kind {
                GridKind::FullGaussianGrid => nlon_full,
                GridKind::OctahedralGaussianGrid => reduced_nlon(j, nlat, nlon_full),
            };
            if len < 3 * trunc + 1 {
                bail!(
                    "ring {} has nlon={} which cannot represent truncation T{}",
                    j,
                    len,
                    trunc,
                );
            }
            let cos_lat = lat.cos();
            rings.push(RingGeometry {
                start,
                len,
                lat,
                cos_lat,
                cos_lat_inv2: 1.0 / (cos_lat * cos_lat),
                weight,
                coriolis: 2.0 * rotation_rate * lat.sin(),
            });
            start += len;
        }

        Ok(Self { trunc, grid_kind, nlat, nlon_full, rings, npoints: start, sigma, rotation_rate })
    }

    pub fn nlev(&self) -> usize {
        self.sigma.as_ref().map(|s| s.nlev).unwrap_or(1)
    }

    /// The single iteration primitive over rings: yields `(ring index,
    /// flat-buffer range)` pairs. Callers index every grid-space field
    /// with the same range, so shapes are implicitly aligned; use
    /// [`Geometry::assert_grid_len`] at entry points that accept
    /// caller-supplied buffers.
    pub fn each_ring(&self) -> impl Iterator<Item = (usize, Range<usize>)> + '_ {
        self.rings.iter().enumerate().map(|(j, r)| (j, r.start..r.start + r.len))
    }

    /// Boundscheck a grid-space field against this geometry's point
    /// count. Shape mismatches are caller errors (spec.md §7).
    pub fn assert_grid_len(&self, name: &str, len: usize) -> Result<()> {
        if len != self.npoints {
            bail!("shape mismatch: field '{}' has {} points, expected {}", name, len, self.npoints);
        }
        Ok(())
    }
}

fn reduced_nlon(j: usize, nlat: usize, nlon_full: usize) -> usize {
    let jh = j.min(nlat - 1 - j) as f64;
    let nlat_half = nlat as f64 / 2.0;
    // cos(latitude)-proportional reduction, snapped to an FFT-friendly
    // length and never smaller than needed for the ring closest to the
    // pole to still resolve a handful of zonal wavenumbers.
    let lat = std::f64::consts::FRAC_PI_2 * (1.0 - (jh + 0.5) / nlat_half);
    let raw = (nlon_full as f64 * lat.cos()).round() as usize;
    next_fft_friendly(raw.max(nlon_full / 8))
}

/// Round up to a length with only small prime factors (2, 3, 5), which
/// keeps `rustfft`'s planner on its fast paths.
fn next_fft_friendly(mut n: usize) -> usize {
    if n < 4 {
        return 4;
    }
    loop {
        let mut m = n;
        for p in [2usize, 3, 5] {
            while m % p == 0 {
                m /= p;
            }
        }
        if m == 1 {
            return n;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigma_levels_equal_sum_to_one() {
        let sigma = SigmaLevels::equal(8).unwrap();
        let total: f64 = sigma.delta_sigma.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(sigma.nlev, 8);
    }

    #[test]
    fn sigma_levels_reject_bad_sum() {
        assert!(SigmaLevels::from_half_levels(vec![0.0, 0.3, 0.5]).is_err());
    }

    #[test]
    fn geometry_rejects_too_few_latitudes() {
        assert!(Geometry::new(42, 4, GridKind::FullGaussianGrid, 7.29e-5, None).is_err());
    }

    #[test]
    fn geometry_full_gaussian_has_constant_nlon() {
        let geom = Geometry::new(21, 16, GridKind::FullGaussianGrid, 7.29e-5, None).unwrap();
        assert_eq!(geom.nlat, 32);
        assert!(geom.rings.iter().all(|r| r.len == geom.nlon_full));
        assert_eq!(geom.npoints, geom.nlat * geom.nlon_full);
    }

    #[test]
    fn geometry_rings_are_hemisphere_mirrored() {
        let geom = Geometry::new(21, 16, GridKind::FullGaussianGrid, 7.29e-5, None).unwrap();
        let n = geom.nlat;
        for j in 0..n / 2 {
            let a = &geom.rings[j];
            let b = &geom.rings[n - 1 - j];
            assert!((a.lat + b.lat).abs() < 1e-12);
            assert!((a.weight - b.weight).abs() < 1e-12);
        }
    }
}
