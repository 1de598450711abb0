//! Gaussian latitudes and quadrature weights, Northern Hemisphere half.
//!
//! Roots of the Legendre polynomial `P_n(x)` (`n = 2 * nlat_half`) give
//! the Gaussian abscissas; the companion quadrature weights make
//! `SpectralTransform::forward` exact for band-limited fields
//! (spec.md §4.1).

/// Returns `(latitudes, weights)` for the Northern Hemisphere, ordered
/// from the pole (index 0) to the equator (index `nlat_half - 1`).
/// Southern-ring values are the caller's responsibility to mirror
/// (`Geometry::new` does this).
pub fn latitudes_and_weights(nlat_half: usize) -> (Vec<f64>, Vec<f64>) {
    let n = 2 * nlat_half;
    let mut x = vec![0.0; nlat_half];
    let mut w = vec![0.0; nlat_half];

    for i in 0..nlat_half {
        // Initial guess from the asymptotic root distribution (Numerical
        // Recipes' `gauleg`), then refine with Newton's method. Index `i`
        // counts from the pole, i.e. from x near +1.
        let mut xi = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp;
        loop {
            let (p, d) = legendre_p_and_deriv(n, xi);
            dp = d;
            let dx = p / dp;
            xi -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        x[i] = xi;
        w[i] = 2.0 / ((1.0 - xi * xi) * dp * dp);
    }

    let lats: Vec<f64> = x.iter().map(|&xi| xi.asin()).collect();
    (lats, w)
}

/// `P_n(x)` and `P_n'(x)` via the standard three-term Legendre
/// recurrence, `n` unnormalized (ordinary Legendre polynomials, used
/// only to locate Gaussian abscissas — distinct from the normalized
/// associated Legendre functions in `legendre.rs`).
fn legendre_p_and_deriv(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    if n == 0 {
        return (p0, 0.0);
    }
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one_hemisphere() {
        let (_, w) = latitudes_and_weights(16);
        // Full-sphere Gaussian weights sum to 2 (the measure of [-1, 1]);
        // one hemisphere sums to 1.
        let total: f64 = w.iter().sum();
        assert!((total - 1.0).abs() < 1e-10, "total={total}");
    }

    #[test]
    fn latitudes_are_decreasing_from_pole() {
        let (lats, _) = latitudes_and_weights(16);
        for w in lats.windows(2) {
            assert!(w[0] > w[1]);
        }
        assert!(lats[0] < std::f64::consts::FRAC_PI_2);
        assert!(lats.last().unwrap() > &0.0);
    }
}
