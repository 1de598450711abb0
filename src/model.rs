//! Model-tier dispatch (spec.md §4.4, §9 "M — Model dispatch"):
//! `ModelKind` is selected once, at construction time, and determines
//! which RHS step sequence a simulation runs. Grounded on the
//! teacher's `AnyHydro`/`AnyModel` tagged enums in `app.rs`:
//! `#[derive(Clone, Serialize, Deserialize, derive_more::From)]`,
//! `#[serde(deny_unknown_fields, rename_all = "snake_case")]`, a
//! match-dispatching inherent method.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::diagnostic::DiagnosticVariables;
use crate::prognostic::PrognosticVariables;
use crate::relaxation::RelaxationConfig;
use crate::spectral::SpectralField;
use crate::tendencies::{barotropic, primitive, shallow_water, TendencyContext};

/// Shallow-water-only parameters spec.md §4.4/§4.6 needs beyond the
/// shared [`TendencyContext`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShallowWaterConfig {
    /// `H₀` in spec.md §4.4's continuity thickness `h = η + H₀ − orography`.
    pub reference_depth: f64,
    pub relaxation: Option<RelaxationConfig>,
}

impl ShallowWaterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reference_depth <= 0.0 {
            anyhow::bail!("shallow-water reference_depth must be positive, got {}", self.reference_depth);
        }
        if let Some(relaxation) = &self.relaxation {
            relaxation.validate()?;
        }
        Ok(())
    }
}

/// Which of the three RHS step sequences a simulation runs (spec.md
/// §4.4). Selected once, at construction time, and fixed for the life
/// of the simulation — spec.md §9's "tagged variant... composed at
/// construction".
#[derive(Clone, Serialize, Deserialize, derive_more::From)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub enum ModelKind {
    Barotropic,
    ShallowWater(ShallowWaterConfig),
    Primitive,
}

impl ModelKind {
    pub fn validate(&self) -> Result<()> {
        match self {
            ModelKind::Barotropic | ModelKind::Primitive => Ok(()),
            ModelKind::ShallowWater(config) => config.validate(),
        }
    }

    /// `true` for the only tier with more than one σ-layer (spec.md
    /// §4.4: barotropic and shallow water are always single-layer).
    pub fn is_layered(&self) -> bool {
        matches!(self, ModelKind::Primitive)
    }

    /// Runs this tier's RHS for one leapfrog slot, writing every
    /// tendency into `diagnostics` (spec.md §4.3/§4.4). `orography_grid`
    /// and `geopot_surface` are read by the shallow-water and
    /// primitive tiers respectively and ignored by barotropic.
    #[allow(clippy::too_many_arguments)]
    pub async fn evaluate(
        &self,
        ctx: &TendencyContext,
        state: &PrognosticVariables,
        lf: usize,
        orography_grid: &[f64],
        geopot_surface: &SpectralField,
        model_time: f64,
        diagnostics: &mut DiagnosticVariables,
    ) -> Result<()> {
        match self {
            ModelKind::Barotropic => barotropic::compute(ctx, &state.layers[0], lf, &mut diagnostics.layers[0]),
            ModelKind::ShallowWater(config) => shallow_water::compute(
                ctx,
                &state.layers[0],
                state.surface.as_ref().context("shallow-water model is missing a surface field")?,
                lf,
                config.reference_depth,
                orography_grid,
                config.relaxation.as_ref(),
                model_time,
                &mut diagnostics.layers[0],
                &mut diagnostics.surface,
            ),
            ModelKind::Primitive => primitive::compute(ctx, state, lf, geopot_surface, diagnostics).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_water_rejects_nonpositive_reference_depth() {
        let config = ShallowWaterConfig { reference_depth: 0.0, relaxation: None };
        assert!(config.validate().is_err());
    }

    #[test]
    fn barotropic_and_primitive_are_always_layered_correctly() {
        assert!(!ModelKind::Barotropic.is_layered());
        assert!(!ModelKind::ShallowWater(ShallowWaterConfig { reference_depth: 1.0, relaxation: None }).is_layered());
        assert!(ModelKind::Primitive.is_layered());
    }

    #[test]
    fn barotropic_and_primitive_validate_trivially() {
        assert!(ModelKind::Barotropic.validate().is_ok());
        assert!(ModelKind::Primitive.validate().is_ok());
    }
}
