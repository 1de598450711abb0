//! Bidirectional transform between the packed triangular spectral
//! representation and the ring-indexed Gaussian grid (spec.md §4.1).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use ndarray::Array2;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::geometry::Geometry;
use crate::spectral::field::SpectralField;
use crate::spectral::legendre::{epsilon_inverse_table, epsilon_table, legendre_table};

/// All the precomputed, read-only tables a transform needs: Legendre
/// functions per Northern ring, ε-recurrence coefficients, and one FFT
/// plan pair per distinct ring length. Built once per [`Geometry`] and
/// shared across the integration (spec.md §5).
pub struct SpectralTransform {
    trunc: usize,
    pub eps: Array2<f64>,
    pub eps_inv: Array2<f64>,
    legendre_north: Vec<Array2<f64>>,
    fft_plans: HashMap<usize, (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>)>,
}

impl SpectralTransform {
    pub fn new(geometry: &Geometry) -> Self {
        let trunc = geometry.trunc;
        let eps = epsilon_table(trunc);
        let eps_inv = epsilon_inverse_table(&eps);
        let nlat_half = geometry.nlat / 2;
        let legendre_north: Vec<Array2<f64>> = (0..nlat_half)
            .map(|j| legendre_table(trunc, geometry.rings[j].lat.sin(), &eps))
            .collect();

        let mut planner = FftPlanner::new();
        let mut fft_plans = HashMap::new();
        for ring in &geometry.rings {
            fft_plans
                .entry(ring.len)
                .or_insert_with(|| (planner.plan_fft_forward(ring.len), planner.plan_fft_inverse(ring.len)));
        }

        Self { trunc, eps, eps_inv, legendre_north, fft_plans }
    }

    pub fn trunc(&self) -> usize {
        self.trunc
    }

    /// Grid → spectral. Per spec.md §4.1: FFT each ring, form even/odd
    /// hemispheric combinations weighted by the Gaussian weight, then
    /// accumulate against the Legendre table by parity of `l - m`.
    pub fn forward(&self, grid: &[f64], geometry: &Geometry) -> Result<SpectralField> {
        geometry.assert_grid_len("forward input", grid.len())?;
        if geometry.trunc != self.trunc {
            bail!("shape mismatch: geometry trunc {} vs transform trunc {}", geometry.trunc, self.trunc);
        }
        let nlat_half = geometry.nlat / 2;
        let mut field = SpectralField::zeros(self.trunc);

        let mut even = vec![vec![Complex64::new(0.0, 0.0); nlat_half]; self.trunc + 1];
        let mut odd = vec![vec![Complex64::new(0.0, 0.0); nlat_half]; self.trunc + 1];

        for j in 0..nlat_half {
            let ring_n = &geometry.rings[j];
            let ring_s = &geometry.rings[geometry.nlat - 1 - j];
            let f_n = self.fourier_analyze(&grid[ring_n.start..ring_n.start + ring_n.len])?;
            let f_s = self.fourier_analyze(&grid[ring_s.start..ring_s.start + ring_s.len])?;
            let w = ring_n.weight;
            for m in 0..=self.trunc {
                even[m][j] = (f_n[m] + f_s[m]) * w;
                odd[m][j] = (f_n[m] - f_s[m]) * w;
            }
        }

        for m in 0..=self.trunc {
            for l in m..=self.trunc {
                let parity_even = (l - m) % 2 == 0;
                let mut acc = Complex64::new(0.0, 0.0);
                for j in 0..nlat_half {
                    let p = self.legendre_north[j][(l, m)];
                    acc += (if parity_even { even[m][j] } else { odd[m][j] }) * p;
                }
                field.set(l, m, acc);
            }
        }
        Ok(field)
    }

    /// Spectral → grid, the mirror of [`SpectralTransform::forward`].
    pub fn inverse(&self, field: &SpectralField, geometry: &Geometry) -> Result<Vec<f64>> {
        if field.trunc() != self.trunc {
            bail!("shape mismatch: field trunc {} vs transform trunc {}", field.trunc(), self.trunc);
        }
        if geometry.trunc != self.trunc {
            bail!("shape mismatch: geometry trunc {} vs transform trunc {}", geometry.trunc, self.trunc);
        }
        let nlat_half = geometry.nlat / 2;
        let mut grid = vec![0.0; geometry.npoints];

        for j in 0..nlat_half {
            let ring_n = &geometry.rings[j];
            let ring_s = &geometry.rings[geometry.nlat - 1 - j];
            let mut four_n = vec![Complex64::new(0.0, 0.0); ring_n.len];
            let mut four_s = vec![Complex64::new(0.0, 0.0); ring_s.len];

            for m in 0..=self.trunc {
                let mut e = Complex64::new(0.0, 0.0);
                let mut o = Complex64::new(0.0, 0.0);
                for l in m..=self.trunc {
                    let p = self.legendre_north[j][(l, m)];
                    let term = field.get(l, m) * p;
                    if (l - m) % 2 == 0 {
                        e += term;
                    } else {
                        o += term;
                    }
                }
                four_n[m] = e + o;
                four_s[m] = e - o;
                if m > 0 && m < ring_n.len {
                    four_n[ring_n.len - m] = four_n[m].conj();
                }
                if m > 0 && m < ring_s.len {
                    four_s[ring_s.len - m] = four_s[m].conj();
                }
            }

            let grid_n = self.fourier_synthesize(four_n, ring_n.len)?;
            let grid_s = self.fourier_synthesize(four_s, ring_s.len)?;
            grid[ring_n.start..ring_n.start + ring_n.len].copy_from_slice(&grid_n);
            grid[ring_s.start..ring_s.start + ring_s.len].copy_from_slice(&grid_s);
        }

        Ok(grid)
    }

    /// Per-ring FFT, returning the first `trunc + 1` normalized
    /// amplitudes (the grid truncates away everything beyond `T_trunc`
    /// at the analysis step, not just at reconstruction).
    fn fourier_analyze(&self, ring: &[f64]) -> Result<Vec<Complex64>> {
        let n = ring.len();
        let (fft, _) = self.plan_for(n)?;
        let mut buf: Vec<Complex64> = ring.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        fft.process(&mut buf);
        let scale = 1.0 / n as f64;
        let take = (self.trunc + 1).min(n);
        let mut out = vec![Complex64::new(0.0, 0.0); self.trunc + 1];
        for m in 0..take {
            out[m] = buf[m] * scale;
        }
        Ok(out)
    }

    fn fourier_synthesize(&self, mut buf: Vec<Complex64>, n: usize) -> Result<Vec<f64>> {
        let (_, ifft) = self.plan_for(n)?;
        ifft.process(&mut buf);
        Ok(buf.iter().map(|c| c.re).collect())
    }

    fn plan_for(&self, n: usize) -> Result<&(Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>)> {
        self.fft_plans.get(&n).ok_or_else(|| anyhow!("no fft plan for ring length {n}"))
    }
}
