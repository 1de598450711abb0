//! Normalized associated Legendre functions and the epsilon-recurrence
//! coefficients shared by the transform (§4.1) and the meridional
//! derivative operator (§4.2).

use ndarray::Array2;

/// `ε_l^m = sqrt((l² − m²) / (4l² − 1))`, tabulated for `0 <= m <= l <=
/// trunc + 1`. Entries with `m > l` are zero and never read
/// (spec.md §3 triangular-packing invariant).
pub fn epsilon_table(trunc: usize) -> Array2<f64> {
    let l_max = trunc + 1;
    let mut eps = Array2::<f64>::zeros((l_max + 1, trunc + 1));
    for l in 0..=l_max {
        for m in 0..=l.min(trunc) {
            let lf = l as f64;
            let mf = m as f64;
            eps[(l, m)] = ((lf * lf - mf * mf) / (4.0 * lf * lf - 1.0)).sqrt();
        }
    }
    eps
}

/// Reciprocal of [`epsilon_table`], with `0` wherever the epsilon entry
/// itself is zero (the numerator `l² − m²` vanishing at `l == m`),
/// exactly as spec.md §4.1 specifies.
pub fn epsilon_inverse_table(eps: &Array2<f64>) -> Array2<f64> {
    eps.mapv(|e| if e == 0.0 { 0.0 } else { 1.0 / e })
}

/// `P_l^m(sin φⱼ)` for one Northern-Hemisphere ring, normalized so that
/// `∫_{-1}^{1} (P_l^0)^2 dx = 1` (the "fully normalized" convention used
/// throughout spectral dynamical cores, e.g. NCAR CCM / SPEEDY). Shape
/// `(trunc + 2, trunc + 1)`, indexed `[l][m]`; entries with `m > l` are
/// zero.
///
/// Uses the same ε-recurrence as the meridional derivative operator:
/// `P_m^m` seeded directly, `P_{m+1}^m` from the first-order step, and
/// `P_l^m = (x P_{l-1}^m − ε_{l-1}^m P_{l-2}^m) / ε_l^m` for `l > m + 1`.
pub fn legendre_table(trunc: usize, sin_lat: f64, eps: &Array2<f64>) -> Array2<f64> {
    let l_max = trunc + 1;
    let mut p = Array2::<f64>::zeros((l_max + 1, trunc + 1));
    let cos_lat = (1.0 - sin_lat * sin_lat).max(0.0).sqrt();

    p[(0, 0)] = std::f64::consts::FRAC_1_SQRT_2;
    for m in 1..=trunc {
        let mf = m as f64;
        let prev = p[(m - 1, m - 1)];
        p[(m, m)] = -((2.0 * mf + 1.0) / (2.0 * mf)).sqrt() * cos_lat * prev;
    }
    for m in 0..=trunc {
        if m + 1 <= l_max {
            let mf = m as f64;
            p[(m + 1, m)] = (2.0 * mf + 3.0).sqrt() * sin_lat * p[(m, m)];
        }
    }
    for m in 0..=trunc {
        let mut l = m + 2;
        while l <= l_max {
            let e_l = eps[(l, m)];
            let e_l1 = eps[(l - 1, m)];
            p[(l, m)] = (sin_lat * p[(l - 1, m)] - e_l1 * p[(l - 2, m)]) / e_l;
            l += 1;
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legendre_table_is_triangular() {
        let trunc = 10;
        let eps = epsilon_table(trunc);
        let p = legendre_table(trunc, 0.3, &eps);
        for l in 0..=trunc {
            for m in (l + 1)..=trunc {
                assert_eq!(p[(l, m)], 0.0);
            }
        }
    }

    #[test]
    fn legendre_p00_is_constant_in_latitude() {
        let trunc = 4;
        let eps = epsilon_table(trunc);
        for &x in &[-0.8, -0.1, 0.2, 0.9] {
            let p = legendre_table(trunc, x, &eps);
            assert!((p[(0, 0)] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
        }
    }

    #[test]
    fn epsilon_vanishes_on_diagonal() {
        // l == m => l^2 - m^2 == 0
        let eps = epsilon_table(8);
        for l in 0..=8 {
            assert_eq!(eps[(l, l)], 0.0);
        }
    }
}
