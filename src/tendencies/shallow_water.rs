//! Shallow-water tendency (spec.md §4.4, second bullet): adds `div_tend`
//! and a continuity equation for the interface displacement `η`
//! (carried in [`SurfacePrognostic::pres`]).

use anyhow::{Context, Result};

use crate::diagnostic::{LayerDiagnostics, SurfaceDiagnostics};
use crate::prognostic::{LayerPrognostic, PrognosticVariables, SurfacePrognostic};
use crate::relaxation::RelaxationConfig;
use crate::spectral::operators::{divergence_curl, divergence_into, laplacian, uv_from_vordiv};
use crate::spectral::SpectralField;
use crate::tendencies::TendencyContext;

/// `reference_depth` is `H₀` in spec.md §4.4; `orography_grid` is the
/// grid-space topography produced once at startup (spec.md §4.7).
/// `relaxation` and `model_time` implement the optional interface
/// relaxation of spec.md §4.6, applied to `pres_tend` after continuity.
#[allow(clippy::too_many_arguments)]
pub fn compute(
    ctx: &TendencyContext,
    layer: &LayerPrognostic,
    surface: &SurfacePrognostic,
    lf: usize,
    reference_depth: f64,
    orography_grid: &[f64],
    relaxation: Option<&RelaxationConfig>,
    model_time: f64,
    scratch: &mut LayerDiagnostics,
    surface_scratch: &mut SurfaceDiagnostics,
) -> Result<()> {
    let geometry = ctx.geometry.as_ref();
    geometry.assert_grid_len("shallow_water orography", orography_grid.len())?;
    let slot = PrognosticVariables::slot(lf)?;
    let vor = &layer.vor[slot];
    let div = layer.div.as_ref().context("shallow-water layer is missing divergence")?[slot].clone();
    let eta = &surface.pres[slot];

    let (u_spec, v_spec) = uv_from_vordiv(vor, &div, &ctx.transform.eps, ctx.planet.radius);
    scratch.u_coslat = ctx.transform.inverse(&u_spec, geometry)?;
    scratch.v_coslat = ctx.transform.inverse(&v_spec, geometry)?;
    scratch.vor_grid = ctx.transform.inverse(vor, geometry)?;
    let eta_grid = ctx.transform.inverse(eta, geometry)?;

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
    let (div_uv, curl_uv) = divergence_curl(&scratch.a, &scratch.b, &ctx.transform.eps, ctx.planet.radius);

    scratch.vor_tend = div_uv;
    scratch.vor_tend.scale(-1.0);

    for (j, range) in geometry.each_ring() {
        let inv2 = geometry.rings[j].cos_lat_inv2;
        for idx in range {
            let speed2 = scratch.u_coslat[idx].powi(2) + scratch.v_coslat[idx].powi(2);
            scratch.bernoulli_grid[idx] = 0.5 * speed2 * inv2 + ctx.planet.gravity * eta_grid[idx];
        }
    }
    scratch.bernoulli = ctx.transform.forward(&scratch.bernoulli_grid, geometry)?;
    let lap_b = laplacian(&scratch.bernoulli, ctx.planet.radius);

    let mut div_tend = curl_uv;
    div_tend.add_scaled(&lap_b, -1.0);
    scratch.div_tend = div_tend;

    for (_, range) in geometry.each_ring() {
        for idx in range {
            let thickness = eta_grid[idx] + reference_depth - orography_grid[idx];
            scratch.a_grid[idx] = scratch.u_coslat[idx] * thickness;
            scratch.b_grid[idx] = scratch.v_coslat[idx] * thickness;
        }
    }
    scratch.a = ctx.transform.forward(&scratch.a_grid, geometry)?;
    scratch.b = ctx.transform.forward(&scratch.b_grid, geometry)?;
    surface_scratch.pres_tend_spec = SpectralField::zeros(eta.trunc());
    divergence_into(
        &scratch.a,
        &scratch.b,
        &ctx.transform.eps,
        ctx.planet.radius,
        &mut surface_scratch.pres_tend_spec,
        false,
        true,
    );
    surface_scratch.pres_tend_spec.zero_mean();

    if let Some(relaxation) = relaxation {
        relaxation.apply(model_time, eta, &mut surface_scratch.pres_tend_spec);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AtmosphereConstants, PlanetConstants};
    use crate::diagnostic::DiagnosticVariables;
    use crate::geometry::{Geometry, GridKind};
    use crate::spectral::SpectralTransform;
    use num_complex::Complex64;

    #[test]
    fn resting_state_has_no_tendencies() {
        let geometry = Geometry::new(10, 8, GridKind::FullGaussianGrid, 7.29e-5, None).unwrap();
        let transform = SpectralTransform::new(&geometry);
        let ctx = TendencyContext::new(
            std::sync::Arc::new(geometry.clone()),
            std::sync::Arc::new(transform),
            PlanetConstants::earth(),
            AtmosphereConstants::earth(),
            true,
        );
        let state = PrognosticVariables::shallow_water(geometry.trunc);
        let mut diag = DiagnosticVariables::new(&geometry);
        let orography = vec![0.0; geometry.npoints];

        compute(
            &ctx,
            &state.layers[0],
            state.surface.as_ref().unwrap(),
            1,
            1.0,
            &orography,
            None,
            0.0,
            &mut diag.layers[0],
            &mut diag.surface,
        )
        .unwrap();

        for l in 0..=geometry.trunc {
            for m in 0..=l {
                assert!(diag.layers[0].vor_tend.get(l, m).norm() < 1e-9);
                assert!(diag.layers[0].div_tend.get(l, m).norm() < 1e-9);
                assert!(diag.surface.pres_tend_spec.get(l, m).norm() < 1e-9);
            }
        }
    }

    /// Invariant 6 (spec.md §8): the `(0,0)` mode of `pres_tend` vanishes
    /// in shallow water, i.e. the mass integral is conserved. A resting
    /// state can't catch this — `divergence_into`'s own `(0,0)` mode is
    /// `-2ε_1^0 B_{1,0}/R`, nonzero whenever the Bernoulli potential has
    /// any `l=1` content, so this exercises a state with nonzero flow.
    #[test]
    fn pres_tend_mean_mode_vanishes_for_nonresting_state() {
        let geometry = Geometry::new(10, 8, GridKind::FullGaussianGrid, 7.29e-5, None).unwrap();
        let transform = SpectralTransform::new(&geometry);
        let ctx = TendencyContext::new(
            std::sync::Arc::new(geometry.clone()),
            std::sync::Arc::new(transform),
            PlanetConstants::earth(),
            AtmosphereConstants::earth(),
            true,
        );
        let mut state = PrognosticVariables::shallow_water(geometry.trunc);
        state.layers[0].vor[1].set(2, 1, Complex64::new(1.0e-5, -0.5e-5));
        state.layers[0].div.as_mut().unwrap()[1].set(1, 0, Complex64::new(2.0e-6, 0.0));
        state.layers[0].div.as_mut().unwrap()[1].set(3, 2, Complex64::new(-1.0e-6, 0.5e-6));
        state.surface.as_mut().unwrap().pres[1].set(1, 0, Complex64::new(50.0, 0.0));
        state.surface.as_mut().unwrap().pres[1].set(2, 1, Complex64::new(10.0, -5.0));
        let mut diag = DiagnosticVariables::new(&geometry);
        let orography = vec![0.0; geometry.npoints];

        compute(
            &ctx,
            &state.layers[0],
            state.surface.as_ref().unwrap(),
            1,
            1.0e4,
            &orography,
            None,
            0.0,
            &mut diag.layers[0],
            &mut diag.surface,
        )
        .unwrap();

        assert!(diag.surface.pres_tend_spec.get(0, 0).norm() < 1e-9);
    }
}
