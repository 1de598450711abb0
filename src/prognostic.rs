//! Packed triangular spectral state, leapfrog-slotted (spec.md §3 "V —
//! PrognosticVariables"). Shaped like the teacher's `state.rs`
//! (`BlockState`/`State`: plain data, `Clone`, constructed once and
//! mutated in place) but re-keyed from AMR blocks (`HashMap<BlockIndex,
//! _>`) to σ-levels (`Vec<LayerPrognostic>`), since this domain has a
//! single global grid rather than block decomposition.

use anyhow::{bail, Result};

use crate::spectral::SpectralField;

/// Prognostic spectral fields owned by one σ-layer. Which fields are
/// populated depends on the model tier (spec.md §4.4): barotropic runs
/// only ever read/write `vor`.
#[derive(Clone)]
pub struct LayerPrognostic {
    pub vor: [SpectralField; 2],
    pub div: Option<[SpectralField; 2]>,
    pub temp: Option<[SpectralField; 2]>,
    pub humid: Option<[SpectralField; 2]>,
}

impl LayerPrognostic {
    fn new(trunc: usize, has_div: bool, has_temp: bool, has_humid: bool) -> Self {
        let pair = || [SpectralField::zeros(trunc), SpectralField::zeros(trunc)];
        Self {
            vor: pair(),
            div: has_div.then(pair),
            temp: has_temp.then(pair),
            humid: has_humid.then(pair),
        }
    }
}

/// The surface field: log surface pressure for the primitive-equation
/// tier, interface displacement `η` for shallow water. `None` for
/// barotropic.
#[derive(Clone)]
pub struct SurfacePrognostic {
    pub pres: [SpectralField; 2],
}

/// Full prognostic state for one model instance: one [`LayerPrognostic`]
/// per σ-layer (a single layer for barotropic/shallow-water tiers) plus
/// an optional surface field.
#[derive(Clone)]
pub struct PrognosticVariables {
    pub trunc: usize,
    pub layers: Vec<LayerPrognostic>,
    pub surface: Option<SurfacePrognostic>,
}

impl PrognosticVariables {
    pub fn barotropic(trunc: usize) -> Self {
        Self { trunc, layers: vec![LayerPrognostic::new(trunc, false, false, false)], surface: None }
    }

    pub fn shallow_water(trunc: usize) -> Self {
        Self {
            trunc,
            layers: vec![LayerPrognostic::new(trunc, true, false, false)],
            surface: Some(SurfacePrognostic { pres: [SpectralField::zeros(trunc), SpectralField::zeros(trunc)] }),
        }
    }

    pub fn primitive(trunc: usize, nlev: usize, humid: bool) -> Result<Self> {
        if nlev == 0 {
            bail!("nlev must be > 0");
        }
        let layers = (0..nlev).map(|_| LayerPrognostic::new(trunc, true, true, humid)).collect();
        Ok(Self {
            trunc,
            layers,
            surface: Some(SurfacePrognostic { pres: [SpectralField::zeros(trunc), SpectralField::zeros(trunc)] }),
        })
    }

    pub fn nlev(&self) -> usize {
        self.layers.len()
    }

    /// Converts the public `lf ∈ {1, 2}` leapfrog index (spec.md §3)
    /// into a `{0, 1}` array index.
    pub fn slot(lf: usize) -> Result<usize> {
        match lf {
            1 => Ok(0),
            2 => Ok(1),
            other => bail!("leapfrog index must be 1 or 2, got {other}"),
        }
    }
}
