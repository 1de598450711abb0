//! The packed triangular spectral array (spec.md §3).

use anyhow::{bail, Result};
use ndarray::Array2;
use num_complex::Complex64;

/// A field of maximum degree `trunc` stored as a dense `(trunc + 2) x
/// (trunc + 1)` rectangle indexed `[l][m]`, `0 <= m <= l <= trunc + 1`.
/// The extra row `l = trunc + 1` is the "tail" used by the ε-recurrence
/// (§4.2); entries with `m > l` are always exactly zero and are never
/// read by any operator in this crate.
#[derive(Clone, Debug)]
pub struct SpectralField {
    trunc: usize,
    data: Array2<Complex64>,
}

impl SpectralField {
    pub fn zeros(trunc: usize) -> Self {
        Self { trunc, data: Array2::zeros((trunc + 2, trunc + 1)) }
    }

    pub fn trunc(&self) -> usize {
        self.trunc
    }

    /// One past the largest valid `l`, i.e. the tail row's index + 1.
    pub fn l_max(&self) -> usize {
        self.trunc + 1
    }

    #[inline]
    pub fn get(&self, l: usize, m: usize) -> Complex64 {
        debug_assert!(m <= l, "spectral coefficient read above the diagonal: l={l} m={m}");
        self.data[(l, m)]
    }

    #[inline]
    pub fn set(&mut self, l: usize, m: usize, value: Complex64) {
        debug_assert!(m <= l, "spectral coefficient write above the diagonal: l={l} m={m}");
        // (l=0, m=0) is required to be real; forcing it here rather than
        // asserting keeps this invariant exact regardless of upstream
        // floating-point noise.
        self.data[(l, m)] = if l == 0 && m == 0 { Complex64::new(value.re, 0.0) } else { value };
    }

    #[inline]
    pub fn add_assign(&mut self, l: usize, m: usize, value: Complex64) {
        self.data[(l, m)] += value;
    }

    /// Raw access to the packed rectangle, for the transform and FFT
    /// glue which operate on whole columns/rows at once.
    pub fn raw(&self) -> &Array2<Complex64> {
        &self.data
    }

    pub fn raw_mut(&mut self) -> &mut Array2<Complex64> {
        &mut self.data
    }

    /// Zero the `l = trunc + 1` tail row. Every operator whose output
    /// can populate the tail calls this before returning (spec.md §4.2
    /// "Spectral truncation").
    pub fn truncate_tail(&mut self) {
        let l = self.l_max();
        for m in 0..=self.trunc {
            self.data[(l, m)] = Complex64::new(0.0, 0.0);
        }
    }

    /// Force the `(l=0, m=0)` mode to zero (used by `∇⁻²` and by the
    /// mass-conservation policy on `pres_tend`, spec.md §4.2/§4.3).
    pub fn zero_mean(&mut self) {
        self.data[(0, 0)] = Complex64::new(0.0, 0.0);
    }

    pub fn mean(&self) -> Complex64 {
        self.data[(0, 0)]
    }

    /// Iterate over all valid `(l, m)` pairs including the tail row, in
    /// column-major (`m` outer, `l` inner) order matching the storage
    /// layout described in spec.md §3.
    pub fn iter_lm(&self) -> impl Iterator<Item = (usize, usize, Complex64)> + '_ {
        let l_max = self.l_max();
        let trunc = self.trunc;
        (0..=trunc).flat_map(move |m| (m..=l_max).map(move |l| (l, m, self.data[(l, m)])))
    }

    pub fn assert_same_shape(&self, other: &Self, context: &str) -> Result<()> {
        if self.trunc != other.trunc {
            bail!("shape mismatch in {context}: trunc {} vs {}", self.trunc, other.trunc);
        }
        Ok(())
    }

    pub fn scale(&mut self, factor: f64) {
        self.data.mapv_inplace(|v| v * factor);
    }

    pub fn add_scaled(&mut self, other: &Self, factor: f64) {
        self.data.zip_mut_with(&other.data, |a, &b| *a += b * factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_are_triangular_and_real_at_origin() {
        let f = SpectralField::zeros(5);
        assert_eq!(f.get(0, 0), Complex64::new(0.0, 0.0));
        assert_eq!(f.l_max(), 6);
    }

    #[test]
    fn truncate_tail_clears_only_the_tail_row() {
        let mut f = SpectralField::zeros(3);
        let l_max = f.l_max();
        for m in 0..=3 {
            f.set(l_max, m, Complex64::new(1.0, 0.0));
            f.set(l_max - 1, m.min(l_max - 1), Complex64::new(2.0, 0.0));
        }
        f.truncate_tail();
        for m in 0..=3 {
            assert_eq!(f.get(l_max, m), Complex64::new(0.0, 0.0));
        }
    }

    #[test]
    fn zero_mean_only_touches_00() {
        let mut f = SpectralField::zeros(2);
        f.set(1, 0, Complex64::new(3.0, 0.0));
        f.set(0, 0, Complex64::new(5.0, 0.0));
        f.zero_mean();
        assert_eq!(f.get(0, 0), Complex64::new(0.0, 0.0));
        assert_eq!(f.get(1, 0), Complex64::new(3.0, 0.0));
    }

    #[test]
    fn iter_lm_covers_triangle_plus_tail() {
        let f = SpectralField::zeros(2);
        let count = f.iter_lm().count();
        // m=0: l=0..=3 (4), m=1: l=1..=3 (3), m=2: l=2..=3 (2) = 9
        assert_eq!(count, 9);
    }
}
