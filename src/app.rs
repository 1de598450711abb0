pub static DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub static VERSION_AND_BUILD: &str = git_version::git_version!(prefix=concat!("v", env!("CARGO_PKG_VERSION"), " "));

use std::ffi::OsStr;
use std::fs::read_to_string;
use std::path::Path;
use std::sync::Arc;

use crate::boundaries::Orography;
use crate::config::ModelConfiguration;
use crate::diagnostic::DiagnosticVariables;
use crate::error::Error;
use crate::geometry::{Geometry, SigmaLevels};
use crate::model::ModelKind;
use crate::prognostic::PrognosticVariables;
use crate::spectral::SpectralTransform;
use crate::tasks::Tasks;
use crate::tendencies::TendencyContext;

/// App state: the complete runnable unit this crate produces —
/// prognostic and diagnostic arrays, the shared tendency context, the
/// startup-computed orography, task bookkeeping, and the configuration
/// it was built from. Shaped like the teacher's `App`.
pub struct App {
    pub state: PrognosticVariables,
    pub diagnostics: DiagnosticVariables,
    pub orography: Orography,
    pub ctx: TendencyContext,
    pub tasks: Tasks,
    pub config: ModelConfiguration,
    pub version: String,
}

impl App {
    /// Return self as a result, which will be in an error state if any
    /// of the configuration items did not pass validation.
    pub fn validate(self) -> anyhow::Result<Self> {
        self.config.validate()?;
        Ok(self)
    }

    /// Construct a new App instance from a user configuration.
    pub fn from_config(mut config: ModelConfiguration, overrides: Vec<String>) -> Result<Self, Error> {
        config.patch_from(overrides)?;
        config
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        let sigma = if config.model.is_layered() {
            Some(SigmaLevels::equal(config.spectral_grid.nlev).map_err(|e| Error::Config(e.to_string()))?)
        } else {
            None
        };
        let geometry = Geometry::new(
            config.spectral_grid.trunc,
            config.spectral_grid.nlat_half,
            config.spectral_grid.grid_kind,
            config.planet.rotation_rate,
            sigma,
        )
        .map_err(|e| Error::Config(e.to_string()))?;
        let transform = SpectralTransform::new(&geometry);
        let orography = config
            .orography
            .build(&geometry, &transform, &config.planet)
            .map_err(|e| Error::Config(e.to_string()))?;

        let state = match &config.model {
            ModelKind::Barotropic => PrognosticVariables::barotropic(geometry.trunc),
            ModelKind::ShallowWater(_) => PrognosticVariables::shallow_water(geometry.trunc),
            ModelKind::Primitive => {
                PrognosticVariables::primitive(geometry.trunc, geometry.nlev(), !config.dry_core)
                    .map_err(|e| Error::Config(e.to_string()))?
            }
        };
        let diagnostics = DiagnosticVariables::new(&geometry);
        let ctx = TendencyContext::new(Arc::new(geometry), Arc::new(transform), config.planet, config.atmosphere, config.dry_core);
        let tasks = Tasks::new();

        Ok(Self { state, diagnostics, orography, ctx, tasks, config, version: VERSION_AND_BUILD.to_string() })
    }

    /// Patch the config struct with inputs from the command line, then
    /// rebuild the geometry/transform/state from the patched config —
    /// overrides to `spectral_grid` or `model` change the grid shape,
    /// so a patch cannot just mutate `self.config` in place.
    pub fn with_patched_config(self, overrides: Vec<String>) -> Result<Self, Error> {
        Self::from_config(self.config, overrides)
    }

    /// Construct a new App instance from a YAML configuration file.
    pub fn from_file(filename: &str, overrides: Vec<String>) -> Result<Self, Error> {
        match Path::new(filename).extension().and_then(OsStr::to_str) {
            Some("yaml") => Self::from_config(serde_yaml::from_str(&read_to_string(filename)?)?, overrides),
            _ => Err(Error::Config(format!("unknown input file type '{filename}'"))),
        }
    }

    /// Construct a new App instance from a preset (built-in) configuration
    /// name, or otherwise an input file if no matching preset is found.
    pub fn from_preset_or_file(input: &str, overrides: Vec<String>) -> Result<Self, Error> {
        for (key, yaml) in Self::presets() {
            if input == key {
                return Self::from_config(serde_yaml::from_str(yaml)?, overrides);
            }
        }
        Self::from_file(input, overrides)
    }

    pub fn presets() -> Vec<(&'static str, &'static str)> {
        vec![
            ("barotropic_default", include_str!("setups/barotropic_default.yaml")),
            ("shallow_water_default", include_str!("setups/shallow_water_default.yaml")),
            ("primitive_default", include_str!("setups/primitive_default.yaml")),
        ]
    }

    /// Runs this model's RHS once for leapfrog slot `lf` at model time
    /// `model_time` (spec.md §4.3/§4.4), writing tendencies into
    /// `self.diagnostics`. There is no leapfrog integrator wired in
    /// here (spec.md §1 keeps that an external collaborator); repeated
    /// calls do not advance `self.state`.
    pub async fn evaluate(&mut self, lf: usize, model_time: f64) -> anyhow::Result<()> {
        self.config
            .model
            .evaluate(
                &self.ctx,
                &self.state,
                lf,
                &self.orography.height_grid,
                &self.orography.geopotential,
                model_time,
                &mut self.diagnostics,
            )
            .await
    }

    /// L2 norm of the vorticity tendency across all layers, summarized
    /// for the diagnostic CLI harness's progress reporting.
    pub fn vorticity_tendency_norm(&self) -> f64 {
        self.diagnostics
            .layers
            .iter()
            .map(|layer| layer.vor_tend.iter_lm().map(|(_, _, v)| v.norm_sqr()).sum::<f64>())
            .sum::<f64>()
            .sqrt()
    }
}
