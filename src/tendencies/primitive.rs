//! Primitive-equation tendency (spec.md §4.3), the full nine-step RHS.
//! Steps 1, 6, 7, 8, 9 are embarrassingly parallel across layers (spec.md
//! §5) and are fanned out with `tokio::spawn` + `futures::future::join_all`,
//! the same shape as the teacher's `state.rs`
//! `WeightedAverageAsync::weighted_average`. Steps 2-4 are sequential
//! reductions/scans across the column; step 5 is folded into the
//! steps-6-9 per-layer task since it, too, only reads already-finished
//! neighbor data once step 4 completes.

use anyhow::{Context, Result};
use futures::future::join_all;

use crate::diagnostic::DiagnosticVariables;
use crate::prognostic::{LayerPrognostic, PrognosticVariables};
use crate::spectral::operators::{divergence_curl, gradient, laplacian, uv_from_vordiv};
use crate::spectral::SpectralField;
use crate::tendencies::flux_divergence::flux_divergence;
use crate::tendencies::TendencyContext;

struct GriddedLayer {
    u_coslat: Vec<f64>,
    v_coslat: Vec<f64>,
    vor_grid: Vec<f64>,
    div_grid: Vec<f64>,
    temp_grid: Vec<f64>,
    humid_grid: Vec<f64>,
    temp_virt_grid: Vec<f64>,
}

/// Step 1, run once per layer.
async fn gridded_layer(ctx: TendencyContext, layer: LayerPrognostic, lf: usize) -> Result<GriddedLayer> {
    let geometry = &ctx.geometry;
    let slot = PrognosticVariables::slot(lf)?;
    let vor = &layer.vor[slot];
    let div = &layer.div.as_ref().context("primitive layer is missing divergence")?[slot];
    let temp = &layer.temp.as_ref().context("primitive layer is missing temperature")?[slot];

    let (u_spec, v_spec) = uv_from_vordiv(vor, div, &ctx.transform.eps, ctx.planet.radius);
    let u_coslat = ctx.transform.inverse(&u_spec, geometry)?;
    let v_coslat = ctx.transform.inverse(&v_spec, geometry)?;
    let vor_grid = ctx.transform.inverse(vor, geometry)?;
    let div_grid = ctx.transform.inverse(div, geometry)?;
    let temp_grid = ctx.transform.inverse(temp, geometry)?;
    let humid_grid = match &layer.humid {
        Some(humid) => ctx.transform.inverse(&humid[slot], geometry)?,
        None => vec![0.0; geometry.npoints],
    };
    let temp_virt_grid = if ctx.dry_core {
        temp_grid.clone()
    } else {
        let ratio = ctx.atmosphere.r_vapor / ctx.atmosphere.r_dry - 1.0;
        temp_grid.iter().zip(&humid_grid).map(|(&t, &q)| t * (1.0 + ratio * q)).collect()
    };

    Ok(GriddedLayer { u_coslat, v_coslat, vor_grid, div_grid, temp_grid, humid_grid, temp_virt_grid })
}

/// Hydrostatic integration of full-level geopotential from surface
/// geopotential and virtual temperature, bottom layer upward
/// (trapezoidal in `ln σ`, standard for sigma-coordinate primitive
/// equations; spec.md §4.3 step 9 consumes `Φ_k` but does not itself
/// define how it's built from `Φ_s`).
fn hydrostatic_geopotential(
    ctx: &TendencyContext,
    temp_virt_grid: &[Vec<f64>],
    geopot_surface_grid: &[f64],
) -> Vec<Vec<f64>> {
    let sigma = ctx.geometry.sigma.as_ref().expect("primitive tier requires sigma levels");
    let nlev = sigma.nlev;
    let npoints = ctx.geometry.npoints;
    let r_dry = ctx.atmosphere.r_dry;
    let mut geopot = vec![vec![0.0; npoints]; nlev];

    for idx in 0..npoints {
        let mut phi_below = geopot_surface_grid[idx];
        for k in (0..nlev).rev() {
            let sigma_full = sigma.full[k];
            let sigma_below = if k == nlev - 1 { 1.0 } else { sigma.full[k + 1] };
            let dln = (sigma_below / sigma_full).ln();
            let phi_k = phi_below + r_dry * temp_virt_grid[k][idx] * dln;
            geopot[k][idx] = phi_k;
            phi_below = phi_k;
        }
    }
    geopot
}

struct DynamicsResult {
    vor_tend: SpectralField,
    div_tend: SpectralField,
    temp_tend: SpectralField,
    humid_tend: Option<SpectralField>,
}

/// Steps 5-9 for one layer, once the sequential steps 2-4 have
/// produced the vertical means, `∇ ln p_s`, and this layer's
/// half-level mass fluxes.
#[allow(clippy::too_many_arguments)]
async fn dynamics_layer(
    ctx: TendencyContext,
    gridded: GriddedLayerOwned,
    geopot_grid: Vec<f64>,
    sigma_tend_above: Vec<f64>,
    sigma_tend_below: Vec<f64>,
    a_coeff: f64,
    b_coeff: f64,
    delta_sigma: f64,
    div_mean_grid: Vec<f64>,
    u_mean_grid: Vec<f64>,
    v_mean_grid: Vec<f64>,
    dpres_dlon_grid: Vec<f64>,
    dpres_dlat_grid: Vec<f64>,
) -> Result<(DynamicsResult, Vec<f64>)> {
    let geometry = &ctx.geometry;
    let npoints = geometry.npoints;
    let radius = ctx.planet.radius;
    let r_dry = ctx.atmosphere.r_dry;
    let kappa = ctx.atmosphere.kappa();

    let mut uv_grad_lnp = vec![0.0; npoints];
    let mut u_tend_grid = vec![0.0; npoints];
    let mut v_tend_grid = vec![0.0; npoints];
    let mut temp_tend_grid = vec![0.0; npoints];
    let mut humid_tend_grid = vec![0.0; npoints];
    let mut lnp_vert_adv_grid = vec![0.0; npoints];

    let adv_factor = radius / (2.0 * delta_sigma);
    for (j, range) in geometry.each_ring() {
        let ring = &geometry.rings[j];
        for idx in range {
            uv_grad_lnp[idx] = (gridded.u_coslat[idx] - u_mean_grid[idx]) * dpres_dlon_grid[idx]
                + (gridded.v_coslat[idx] - v_mean_grid[idx]) * dpres_dlat_grid[idx];

            // Step 5: centered vertical advection. "above"/"below" are
            // each other's only neighbor; at a boundary the matching
            // half-level flux is zero so the term vanishes on its own.
            let adv = |field_above: f64, field_here: f64, field_below: f64| {
                adv_factor
                    * (sigma_tend_above[idx] * (field_here - field_above)
                        + sigma_tend_below[idx] * (field_below - field_here))
            };
            u_tend_grid[idx] += adv(gridded.u_above[idx], gridded.u_coslat[idx], gridded.u_below[idx]);
            v_tend_grid[idx] += adv(gridded.v_above[idx], gridded.v_coslat[idx], gridded.v_below[idx]);
            temp_tend_grid[idx] +=
                adv(gridded.temp_above[idx], gridded.temp_grid[idx], gridded.temp_below[idx]);
            if let (Some(q_above), Some(q_here), Some(q_below)) =
                (&gridded.humid_above, &gridded.humid_grid_opt, &gridded.humid_below)
            {
                humid_tend_grid[idx] += adv(q_above[idx], q_here[idx], q_below[idx]);
            }
            lnp_vert_adv_grid[idx] = a_coeff * sigma_tend_above[idx] + b_coeff * sigma_tend_below[idx];

            // Step 6: vordiv_tendencies. Only this step's own terms get
            // the cos⁻²φ metric factor; the vertical-advection
            // contribution from step 5 above is already in coslat
            // units and is added in afterwards.
            let f = ring.coriolis;
            let inv2 = ring.cos_lat_inv2;
            let u_vordiv = (gridded.v_coslat[idx] * (gridded.vor_grid[idx] + f)
                - r_dry * gridded.temp_virt_grid[idx] * dpres_dlon_grid[idx])
                * inv2;
            let v_vordiv = (-gridded.u_coslat[idx] * (gridded.vor_grid[idx] + f)
                - r_dry * gridded.temp_virt_grid[idx] * dpres_dlat_grid[idx])
                * inv2;
            u_tend_grid[idx] += u_vordiv;
            v_tend_grid[idx] += v_vordiv;

            // Step 7: temperature_tendency (dynamical part only; the
            // flux-divergence part is added below in spectral space).
            temp_tend_grid[idx] += gridded.temp_grid[idx] * gridded.div_grid[idx]
                + kappa
                    * gridded.temp_virt_grid[idx]
                    * (uv_grad_lnp[idx] - div_mean_grid[idx] + lnp_vert_adv_grid[idx]);

            // Step 8: humidity_tendency (dynamical part only).
            humid_tend_grid[idx] += gridded.humid_grid[idx] * gridded.div_grid[idx];
        }
    }

    let u_tend_spec = ctx.transform.forward(&u_tend_grid, geometry)?;
    let v_tend_spec = ctx.transform.forward(&v_tend_grid, geometry)?;
    let (mut div_tend, vor_tend) = divergence_curl(&u_tend_spec, &v_tend_spec, &ctx.transform.eps, radius);

    let mut temp_tend = ctx.transform.forward(&temp_tend_grid, geometry)?;

    let mut scratch = crate::diagnostic::LayerDiagnostics::new(ctx.transform.trunc(), npoints);
    flux_divergence(&ctx, &gridded.u_coslat, &gridded.v_coslat, &gridded.temp_grid, &mut scratch, &mut temp_tend)?;

    let humid_tend = if ctx.dry_core {
        None
    } else {
        let mut humid_tend = ctx.transform.forward(&humid_tend_grid, geometry)?;
        flux_divergence(&ctx, &gridded.u_coslat, &gridded.v_coslat, &gridded.humid_grid, &mut scratch, &mut humid_tend)?;
        Some(humid_tend)
    };

    // Step 9: bernoulli_potential.
    let mut bernoulli_grid = vec![0.0; npoints];
    for (j, range) in geometry.each_ring() {
        let inv2 = geometry.rings[j].cos_lat_inv2;
        for idx in range {
            bernoulli_grid[idx] = 0.5 * (gridded.u_coslat[idx].powi(2) + gridded.v_coslat[idx].powi(2)) * inv2
                + geopot_grid[idx];
        }
    }
    let bernoulli_spec = ctx.transform.forward(&bernoulli_grid, geometry)?;
    let lap_b = laplacian(&bernoulli_spec, radius);
    div_tend.add_scaled(&lap_b, -1.0);

    Ok((DynamicsResult { vor_tend, div_tend, temp_tend, humid_tend }, uv_grad_lnp))
}

/// Owned per-layer grid data plus the immediate vertical neighbors
/// `dynamics_layer` needs for step 5's centered difference.
struct GriddedLayerOwned {
    u_coslat: Vec<f64>,
    v_coslat: Vec<f64>,
    vor_grid: Vec<f64>,
    div_grid: Vec<f64>,
    temp_grid: Vec<f64>,
    temp_virt_grid: Vec<f64>,
    humid_grid: Vec<f64>,
    humid_grid_opt: Option<Vec<f64>>,
    u_above: Vec<f64>,
    u_below: Vec<f64>,
    v_above: Vec<f64>,
    v_below: Vec<f64>,
    temp_above: Vec<f64>,
    temp_below: Vec<f64>,
    humid_above: Option<Vec<f64>>,
    humid_below: Option<Vec<f64>>,
}

/// Runs the full primitive-equation RHS for one leapfrog slot, writing
/// every tendency into `diagnostics`.
pub async fn compute(
    ctx: &TendencyContext,
    state: &PrognosticVariables,
    lf: usize,
    geopot_surface: &SpectralField,
    diagnostics: &mut DiagnosticVariables,
) -> Result<()> {
    let geometry = ctx.geometry.clone();
    let nlev = state.nlev();
    let npoints = geometry.npoints;
    let slot = PrognosticVariables::slot(lf)?;
    let sigma = geometry.sigma.as_ref().context("primitive tier requires sigma levels")?.clone();

    // Step 1, fanned out across layers.
    let gridded_futures = state
        .layers
        .iter()
        .map(|layer| tokio::spawn(gridded_layer(ctx.clone(), layer.clone(), lf)));
    let gridded: Vec<GriddedLayer> = join_all(gridded_futures)
        .await
        .into_iter()
        .map(|joined| joined.context("gridded! task panicked")?)
        .collect::<Result<Vec<_>>>()?;

    let surface = state.surface.as_ref().context("primitive tier requires a surface field")?;
    let geopot_surface_grid = ctx.transform.inverse(geopot_surface, &geometry)?;
    let pres_grid = ctx.transform.inverse(&surface.pres[slot], &geometry)?;

    let temp_virt_owned: Vec<Vec<f64>> = gridded.iter().map(|g| g.temp_virt_grid.clone()).collect();
    let geopot_by_layer = hydrostatic_geopotential(ctx, &temp_virt_owned, &geopot_surface_grid);

    // Step 2: vertical averages.
    diagnostics.surface.reset_means();
    diagnostics.surface.pres_grid = pres_grid;
    for k in 0..nlev {
        let dsig = sigma.delta_sigma[k];
        for idx in 0..npoints {
            diagnostics.surface.u_mean_grid[idx] += gridded[k].u_coslat[idx] * dsig;
            diagnostics.surface.v_mean_grid[idx] += gridded[k].v_coslat[idx] * dsig;
            diagnostics.surface.div_mean_grid[idx] += gridded[k].div_grid[idx] * dsig;
        }
        diagnostics.surface.div_mean_spec.add_scaled(&state.layers[k].div.as_ref().unwrap()[slot], dsig);
    }

    // Step 3: surface pressure tendency.
    let (dlon_spec, dlat_spec) = gradient(&surface.pres[slot], &ctx.transform.eps);
    diagnostics.surface.dpres_dlon_grid = ctx.transform.inverse(&dlon_spec, &geometry)?;
    diagnostics.surface.dpres_dlat_grid = ctx.transform.inverse(&dlat_spec, &geometry)?;
    diagnostics.surface.dpres_dlon_spec = dlon_spec;
    diagnostics.surface.dpres_dlat_spec = dlat_spec;

    let mut pres_tend_grid = vec![0.0; npoints];
    for (j, range) in geometry.each_ring() {
        let inv1 = 1.0 / geometry.rings[j].cos_lat;
        for idx in range {
            pres_tend_grid[idx] = -(diagnostics.surface.u_mean_grid[idx] * diagnostics.surface.dpres_dlon_grid[idx]
                + diagnostics.surface.v_mean_grid[idx] * diagnostics.surface.dpres_dlat_grid[idx])
                * inv1;
        }
    }
    let mut pres_tend_spec = ctx.transform.forward(&pres_tend_grid, &geometry)?;
    pres_tend_spec.add_scaled(&diagnostics.surface.div_mean_spec, -1.0);
    pres_tend_spec.zero_mean();
    diagnostics.surface.pres_tend_spec = pres_tend_spec;

    // Step 4: vertical velocity, top to bottom.
    let mut sigma_tend_above_per_layer = vec![vec![0.0; npoints]; nlev];
    let mut sigma_tend_below_per_layer = vec![vec![0.0; npoints]; nlev];
    let mut sigma_tend_running = vec![0.0; npoints];
    let mut sigma_m_running = vec![0.0; npoints];
    for k in 0..nlev {
        sigma_tend_above_per_layer[k] = sigma_tend_running.clone();
        let dsig = sigma.delta_sigma[k];
        for idx in 0..npoints {
            let uv_grad = (gridded[k].u_coslat[idx] - diagnostics.surface.u_mean_grid[idx])
                * diagnostics.surface.dpres_dlon_grid[idx]
                + (gridded[k].v_coslat[idx] - diagnostics.surface.v_mean_grid[idx])
                    * diagnostics.surface.dpres_dlat_grid[idx];
            sigma_tend_running[idx] -=
                dsig * (uv_grad + gridded[k].div_grid[idx] - diagnostics.surface.div_mean_grid[idx]);
            sigma_m_running[idx] -= dsig * uv_grad;
        }
        sigma_tend_below_per_layer[k] = sigma_tend_running.clone();
        diagnostics.layers[k].sigma_tend_below = sigma_tend_running.clone();
        diagnostics.layers[k].sigma_m_below = sigma_m_running.clone();
    }

    // Steps 5-9, fanned out across layers.
    let mut dynamics_futures = Vec::with_capacity(nlev);
    for k in 0..nlev {
        let above_u = if k == 0 { gridded[k].u_coslat.clone() } else { gridded[k - 1].u_coslat.clone() };
        let below_u = if k + 1 == nlev { gridded[k].u_coslat.clone() } else { gridded[k + 1].u_coslat.clone() };
        let above_v = if k == 0 { gridded[k].v_coslat.clone() } else { gridded[k - 1].v_coslat.clone() };
        let below_v = if k + 1 == nlev { gridded[k].v_coslat.clone() } else { gridded[k + 1].v_coslat.clone() };
        let above_t = if k == 0 { gridded[k].temp_grid.clone() } else { gridded[k - 1].temp_grid.clone() };
        let below_t = if k + 1 == nlev { gridded[k].temp_grid.clone() } else { gridded[k + 1].temp_grid.clone() };
        let (above_q, below_q, humid_opt) = if ctx.dry_core {
            (None, None, None)
        } else {
            let above = if k == 0 { gridded[k].humid_grid.clone() } else { gridded[k - 1].humid_grid.clone() };
            let below =
                if k + 1 == nlev { gridded[k].humid_grid.clone() } else { gridded[k + 1].humid_grid.clone() };
            (Some(above), Some(below), Some(gridded[k].humid_grid.clone()))
        };

        let owned = GriddedLayerOwned {
            u_coslat: gridded[k].u_coslat.clone(),
            v_coslat: gridded[k].v_coslat.clone(),
            vor_grid: gridded[k].vor_grid.clone(),
            div_grid: gridded[k].div_grid.clone(),
            temp_grid: gridded[k].temp_grid.clone(),
            temp_virt_grid: gridded[k].temp_virt_grid.clone(),
            humid_grid: gridded[k].humid_grid.clone(),
            humid_grid_opt: humid_opt,
            u_above: above_u,
            u_below: below_u,
            v_above: above_v,
            v_below: below_v,
            temp_above: above_t,
            temp_below: below_t,
            humid_above: above_q,
            humid_below: below_q,
        };

        dynamics_futures.push(tokio::spawn(dynamics_layer(
            ctx.clone(),
            owned,
            geopot_by_layer[k].clone(),
            sigma_tend_above_per_layer[k].clone(),
            sigma_tend_below_per_layer[k].clone(),
            sigma.a_coeff[k],
            sigma.b_coeff[k],
            sigma.delta_sigma[k],
            diagnostics.surface.div_mean_grid.clone(),
            diagnostics.surface.u_mean_grid.clone(),
            diagnostics.surface.v_mean_grid.clone(),
            diagnostics.surface.dpres_dlon_grid.clone(),
            diagnostics.surface.dpres_dlat_grid.clone(),
        )));
    }

    let results = join_all(dynamics_futures).await;
    for (k, joined) in results.into_iter().enumerate() {
        let (dynamics, uv_grad_lnp) = joined.context("dynamics task panicked")??;
        diagnostics.layers[k].vor_tend = dynamics.vor_tend;
        diagnostics.layers[k].div_tend = dynamics.div_tend;
        diagnostics.layers[k].temp_tend = dynamics.temp_tend;
        if let Some(humid_tend) = dynamics.humid_tend {
            diagnostics.layers[k].humid_tend = humid_tend;
        }
        diagnostics.layers[k].uv_grad_lnp = uv_grad_lnp;
        diagnostics.layers[k].vor_grid = gridded[k].vor_grid.clone();
        diagnostics.layers[k].div_grid = gridded[k].div_grid.clone();
        diagnostics.layers[k].u_coslat = gridded[k].u_coslat.clone();
        diagnostics.layers[k].v_coslat = gridded[k].v_coslat.clone();
        diagnostics.layers[k].temp_grid = gridded[k].temp_grid.clone();
        diagnostics.layers[k].humid_grid = gridded[k].humid_grid.clone();
        diagnostics.layers[k].temp_virt_grid = gridded[k].temp_virt_grid.clone();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AtmosphereConstants, PlanetConstants};
    use crate::geometry::{GridKind, SigmaLevels};
    use crate::spectral::SpectralTransform;
    use num_complex::Complex64;
    use std::sync::Arc;

    fn resting_state(geometry: &crate::geometry::Geometry) -> PrognosticVariables {
        let mut state = PrognosticVariables::primitive(geometry.trunc, geometry.nlev(), false).unwrap();
        let temp_00 = Complex64::new(280.0 * std::f64::consts::SQRT_2, 0.0);
        for layer in &mut state.layers {
            layer.temp.as_mut().unwrap()[0].set(0, 0, temp_00);
            layer.temp.as_mut().unwrap()[1].set(0, 0, temp_00);
        }
        state
    }

    /// A calm, horizontally uniform atmosphere over flat orography
    /// produces no tendency anywhere: no wind, no pressure gradient, no
    /// divergence to advect anything with (spec.md §8's general
    /// "well-posed at rest" expectation, checked directly rather than
    /// inferred from round-trip tests alone).
    #[tokio::test]
    async fn resting_isothermal_atmosphere_has_no_tendencies() {
        let sigma = SigmaLevels::equal(3).unwrap();
        let geometry = crate::geometry::Geometry::new(8, 8, GridKind::FullGaussianGrid, 7.29e-5, Some(sigma)).unwrap();
        let transform = SpectralTransform::new(&geometry);
        let ctx = TendencyContext::new(
            Arc::new(geometry.clone()),
            Arc::new(transform),
            PlanetConstants::earth(),
            AtmosphereConstants::earth(),
            true,
        );
        let state = resting_state(&geometry);
        let geopot_surface = SpectralField::zeros(geometry.trunc);
        let mut diagnostics = DiagnosticVariables::new(&geometry);

        compute(&ctx, &state, 1, &geopot_surface, &mut diagnostics).await.unwrap();

        for layer in &diagnostics.layers {
            for l in 0..=geometry.trunc {
                for m in 0..=l {
                    assert!(layer.vor_tend.get(l, m).norm() < 1e-6);
                    assert!(layer.div_tend.get(l, m).norm() < 1e-6);
                    assert!(layer.temp_tend.get(l, m).norm() < 1e-4);
                }
            }
        }
    }

    /// Dry-core invariant (spec.md §8): humidity tendency and humidity
    /// grid are left untouched when `dry_core` is set.
    #[tokio::test]
    async fn dry_core_leaves_humidity_untouched() {
        let sigma = SigmaLevels::equal(2).unwrap();
        let geometry = crate::geometry::Geometry::new(6, 8, GridKind::FullGaussianGrid, 7.29e-5, Some(sigma)).unwrap();
        let transform = SpectralTransform::new(&geometry);
        let ctx = TendencyContext::new(
            Arc::new(geometry.clone()),
            Arc::new(transform),
            PlanetConstants::earth(),
            AtmosphereConstants::earth(),
            true,
        );
        let state = resting_state(&geometry);
        let geopot_surface = SpectralField::zeros(geometry.trunc);
        let mut diagnostics = DiagnosticVariables::new(&geometry);

        compute(&ctx, &state, 1, &geopot_surface, &mut diagnostics).await.unwrap();

        for layer in &diagnostics.layers {
            for l in 0..=geometry.trunc {
                for m in 0..=l {
                    assert_eq!(layer.humid_tend.get(l, m), Complex64::new(0.0, 0.0));
                }
            }
        }
    }
}
