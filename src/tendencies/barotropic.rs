//! Barotropic tendency (spec.md §4.4, first bullet): the only prognostic
//! field is `vor`.

use anyhow::Result;

use crate::diagnostic::LayerDiagnostics;
use crate::prognostic::LayerPrognostic;
use crate::spectral::operators::{divergence_into, uv_from_vordiv};
use crate::spectral::SpectralField;
use crate::tendencies::TendencyContext;

/// `vor_tend = −∇·(uω,vω)` where `ω = (ζ+f)/cos²φ`, `(u,v)` the coslat
/// grids recovered from `vor` with zero divergence.
pub fn compute(
    ctx: &TendencyContext,
    layer: &LayerPrognostic,
    lf: usize,
    scratch: &mut LayerDiagnostics,
) -> Result<()> {
    let geometry = ctx.geometry.as_ref();
    let slot = crate::prognostic::PrognosticVariables::slot(lf)?;
    let vor = &layer.vor[slot];
    let zero_div = SpectralField::zeros(vor.trunc());

    let (u_spec, v_spec) = uv_from_vordiv(vor, &zero_div, &ctx.transform.eps, ctx.planet.radius);
    scratch.u_coslat = ctx.transform.inverse(&u_spec, geometry)?;
    scratch.v_coslat = ctx.transform.inverse(&v_spec, geometry)?;
    scratch.vor_grid = ctx.transform.inverse(vor, geometry)?;

    for (j, range) in geometry.each_ring() {
        let ring = &geometry.rings[j];
        for idx in range {
            let omega = (scratch.vor_grid[idx] + ring.coriolis) * ring.cos_lat_inv2;
            scratch.a_grid[idx] = scratch.u_coslat[idx] * omega;
            scratch.b_grid[idx] = scratch.v_coslat[idx] * omega;
        }
    }
    scratch.a = ctx.transform.forward(&scratch.a_grid, geometry)?;
    scratch.b = ctx.transform.forward(&scratch.b_grid, geometry)?;
    scratch.vor_tend = SpectralField::zeros(vor.trunc());
    divergence_into(&scratch.a, &scratch.b, &ctx.transform.eps, ctx.planet.radius, &mut scratch.vor_tend, false, true);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AtmosphereConstants, PlanetConstants};
    use crate::diagnostic::DiagnosticVariables;
    use crate::geometry::{Geometry, GridKind};
    use crate::prognostic::PrognosticVariables;
    use crate::spectral::SpectralTransform;

    /// Barotropic invariant: a purely zonal (m=0) vorticity field has
    /// no vorticity tendency contribution from itself combining with a
    /// rotation-symmetric Coriolis term beyond what the flux produces;
    /// here we just check the computation runs and preserves shape /
    /// mass conservation (no (0,0) mode is ever populated by a curl).
    #[test]
    fn zero_vorticity_state_has_zero_tendency() {
        let geometry = Geometry::new(10, 8, GridKind::FullGaussianGrid, 7.29e-5, None).unwrap();
        let transform = SpectralTransform::new(&geometry);
        let ctx = TendencyContext::new(
            std::sync::Arc::new(geometry.clone()),
            std::sync::Arc::new(transform),
            PlanetConstants::earth(),
            AtmosphereConstants::earth(),
            true,
        );
        let state = PrognosticVariables::barotropic(geometry.trunc);
        let mut diag = DiagnosticVariables::new(&geometry);

        compute(&ctx, &state.layers[0], 1, &mut diag.layers[0]).unwrap();
        for l in 0..=geometry.trunc {
            for m in 0..=l {
                assert!(diag.layers[0].vor_tend.get(l, m).norm() < 1e-9);
            }
        }
    }
}
