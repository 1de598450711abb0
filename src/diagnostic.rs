//! Scratch grids and per-layer dynamics scratch (spec.md §3 "D —
//! DiagnosticVariables"). Every buffer here is allocated once at
//! startup and reused for every RHS evaluation; tendency arrays are
//! overwritten, never accumulated across steps (spec.md §3
//! "Lifecycle").

use crate::geometry::Geometry;
use crate::spectral::SpectralField;

/// Per-layer diagnostic grids and scratch, exclusively owned by that
/// layer (spec.md §3 "Scratch ownership"): no cross-layer aliasing
/// except the explicit vertical-neighbor reads in the vertical-velocity
/// and vertical-advection steps (§4.3 steps 4–5).
#[derive(Clone)]
pub struct LayerDiagnostics {
    pub u_coslat: Vec<f64>,
    pub v_coslat: Vec<f64>,
    pub vor_grid: Vec<f64>,
    pub div_grid: Vec<f64>,
    pub temp_grid: Vec<f64>,
    pub humid_grid: Vec<f64>,
    pub temp_virt_grid: Vec<f64>,

    pub a: SpectralField,
    pub b: SpectralField,
    pub a_grid: Vec<f64>,
    pub b_grid: Vec<f64>,

    /// Half-level vertical mass flux below this layer (`σ_tend_{k+½}`).
    /// Zero for the bottom layer (the bottom half-level is always
    /// zero, spec.md §4.3 step 4 / §8 invariant 9).
    pub sigma_tend_below: Vec<f64>,
    /// Half-level `uv∇lnp`-only flux below this layer (`σ_m_{k+½}`),
    /// kept distinct from `sigma_tend_below` (spec.md §9: the source's
    /// aliasing of these two arrays is a documented bug, not a design
    /// choice to repeat).
    pub sigma_m_below: Vec<f64>,
    pub uv_grad_lnp: Vec<f64>,
    pub lnp_vert_adv_grid: Vec<f64>,

    pub bernoulli: SpectralField,
    pub bernoulli_grid: Vec<f64>,
    pub geopot: SpectralField,

    pub vor_tend: SpectralField,
    pub div_tend: SpectralField,
    pub temp_tend: SpectralField,
    pub humid_tend: SpectralField,
}

impl LayerDiagnostics {
    pub fn new(trunc: usize, npoints: usize) -> Self {
        Self {
            u_coslat: vec![0.0; npoints],
            v_coslat: vec![0.0; npoints],
            vor_grid: vec![0.0; npoints],
            div_grid: vec![0.0; npoints],
            temp_grid: vec![0.0; npoints],
            humid_grid: vec![0.0; npoints],
            temp_virt_grid: vec![0.0; npoints],
            a: SpectralField::zeros(trunc),
            b: SpectralField::zeros(trunc),
            a_grid: vec![0.0; npoints],
            b_grid: vec![0.0; npoints],
            sigma_tend_below: vec![0.0; npoints],
            sigma_m_below: vec![0.0; npoints],
            uv_grad_lnp: vec![0.0; npoints],
            lnp_vert_adv_grid: vec![0.0; npoints],
            bernoulli: SpectralField::zeros(trunc),
            bernoulli_grid: vec![0.0; npoints],
            geopot: SpectralField::zeros(trunc),
            vor_tend: SpectralField::zeros(trunc),
            div_tend: SpectralField::zeros(trunc),
            temp_tend: SpectralField::zeros(trunc),
            humid_tend: SpectralField::zeros(trunc),
        }
    }
}

/// Surface-level scratch: vertical means, the surface-pressure
/// gradient in both representations, and its tendency.
#[derive(Clone)]
pub struct SurfaceDiagnostics {
    pub pres_grid: Vec<f64>,
    pub dpres_dlon_spec: SpectralField,
    pub dpres_dlat_spec: SpectralField,
    pub dpres_dlon_grid: Vec<f64>,
    pub dpres_dlat_grid: Vec<f64>,

    pub u_mean_grid: Vec<f64>,
    pub v_mean_grid: Vec<f64>,
    pub div_mean_grid: Vec<f64>,
    pub div_mean_spec: SpectralField,

    pub pres_tend_spec: SpectralField,
    pub pres_tend_grid: Vec<f64>,
}

impl SurfaceDiagnostics {
    fn new(trunc: usize, npoints: usize) -> Self {
        Self {
            pres_grid: vec![0.0; npoints],
            dpres_dlon_spec: SpectralField::zeros(trunc),
            dpres_dlat_spec: SpectralField::zeros(trunc),
            dpres_dlon_grid: vec![0.0; npoints],
            dpres_dlat_grid: vec![0.0; npoints],
            u_mean_grid: vec![0.0; npoints],
            v_mean_grid: vec![0.0; npoints],
            div_mean_grid: vec![0.0; npoints],
            div_mean_spec: SpectralField::zeros(trunc),
            pres_tend_spec: SpectralField::zeros(trunc),
            pres_tend_grid: vec![0.0; npoints],
        }
    }

    /// Reset the vertical-mean accumulators before `vertical_averages!`
    /// re-accumulates them (spec.md §4.3 step 2: "Reset accumulators
    /// first").
    pub fn reset_means(&mut self) {
        self.u_mean_grid.iter_mut().for_each(|v| *v = 0.0);
        self.v_mean_grid.iter_mut().for_each(|v| *v = 0.0);
        self.div_mean_grid.iter_mut().for_each(|v| *v = 0.0);
        self.div_mean_spec = SpectralField::zeros(self.div_mean_spec.trunc());
    }
}

/// All diagnostic state for one model instance.
#[derive(Clone)]
pub struct DiagnosticVariables {
    pub layers: Vec<LayerDiagnostics>,
    pub surface: SurfaceDiagnostics,
}

impl DiagnosticVariables {
    pub fn new(geometry: &Geometry) -> Self {
        let nlev = geometry.nlev();
        let layers = (0..nlev).map(|_| LayerDiagnostics::new(geometry.trunc, geometry.npoints)).collect();
        Self { layers, surface: SurfaceDiagnostics::new(geometry.trunc, geometry.npoints) }
    }
}
