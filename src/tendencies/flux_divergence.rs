//! `−∇·((u,v)A)` (spec.md §4.5), shared by the temperature and humidity
//! tendency steps of the primitive-equation tier.

use anyhow::Result;

use crate::diagnostic::LayerDiagnostics;
use crate::spectral::operators::divergence_into;
use crate::spectral::SpectralField;
use crate::tendencies::TendencyContext;

/// Accumulates `−∇·((u,v)A)` into `target`. `a_grid` is read-only;
/// `scratch.a`, `scratch.b`, `scratch.a_grid`, `scratch.b_grid` are
/// clobbered (spec.md §4.5 "Invariant").
pub fn flux_divergence(
    ctx: &TendencyContext,
    u_coslat: &[f64],
    v_coslat: &[f64],
    a_grid: &[f64],
    scratch: &mut LayerDiagnostics,
    target: &mut SpectralField,
) -> Result<()> {
    let geometry = ctx.geometry.as_ref();
    geometry.assert_grid_len("flux_divergence a_grid", a_grid.len())?;

    for (j, range) in geometry.each_ring() {
        let inv2 = geometry.rings[j].cos_lat_inv2;
        for idx in range {
            let scaled = a_grid[idx] * inv2;
            scratch.a_grid[idx] = scaled * u_coslat[idx];
            scratch.b_grid[idx] = scaled * v_coslat[idx];
        }
    }
    scratch.a = ctx.transform.forward(&scratch.a_grid, geometry)?;
    scratch.b = ctx.transform.forward(&scratch.b_grid, geometry)?;
    divergence_into(&scratch.a, &scratch.b, &ctx.transform.eps, ctx.planet.radius, target, true, true);
    Ok(())
}
