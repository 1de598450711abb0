//! User-facing configuration (spec.md §6, SPEC_FULL.md §0.3). Mirrors
//! the teacher's `Configuration`/`Control` shape: `#[serde(deny_unknown_fields)]`
//! on every struct, a doc comment above each field, and an inherent
//! `validate(&self) -> anyhow::Result<()>` per struct that the
//! top-level `ModelConfiguration::validate` composes.

use std::fs::File;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{AtmosphereConstants, PlanetConstants};
use crate::error::Error;
use crate::geometry::GridKind;
use crate::model::ModelKind;
use crate::yaml_patch::Patch;

pub use crate::boundaries::OrographyVariant as OrographyConfig;

/// Spectral-grid descriptor (spec.md §6): truncation, grid density,
/// grid kind, and the precision/device fields spec.md names but the
/// core itself does not branch on (both are carried through to the
/// output writer as metadata).
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpectralGridConfig {
    /// Triangular truncation `L`.
    pub trunc: usize,
    /// Number of Gaussian latitudes in one hemisphere.
    pub nlat_half: usize,
    pub grid_kind: GridKind,
    /// Number of σ-layers. Must be `1` for the barotropic and
    /// shallow-water tiers (spec.md §4.4).
    pub nlev: usize,
    #[serde(default = "SpectralGridConfig::default_precision")]
    pub precision: Precision,
    #[serde(default = "SpectralGridConfig::default_device")]
    pub device: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    F32,
    F64,
}

impl SpectralGridConfig {
    fn default_precision() -> Precision {
        Precision::F64
    }

    fn default_device() -> String {
        "cpu".to_string()
    }

    pub fn validate(&self) -> Result<()> {
        if self.nlev == 0 {
            bail!("nlev must be > 0");
        }
        Ok(())
    }
}

/// Time-stepping parameters (spec.md §6): data only, consumed by the
/// external leapfrog integrator collaborator, not by the RHS itself.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeStepping {
    /// `Δt`, seconds.
    pub dt: f64,
    /// Robert–Asselin filter coefficient.
    pub robert_filter: f64,
    /// Williams (second-order correction) filter coefficient.
    pub williams_filter: f64,
}

impl TimeStepping {
    pub fn validate(&self) -> Result<()> {
        if self.dt <= 0.0 {
            bail!("dt must be positive, got {}", self.dt);
        }
        Ok(())
    }
}

/// Horizontal hyperdiffusion coefficients (spec.md §6): data only, for
/// the external time integrator to apply before committing a tendency.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffusionConfig {
    /// Diffusion coefficient at `l = trunc`, 1/s.
    pub coefficient: f64,
    /// Power of the Laplacian (`2` = ∇⁴ hyperdiffusion).
    pub power: u32,
}

impl DiffusionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.coefficient < 0.0 {
            bail!("diffusion coefficient must be non-negative, got {}", self.coefficient);
        }
        Ok(())
    }
}

/// Simulation control: how long to run, how often to perform side
/// effects. Ported near-verbatim from the teacher's `Control`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Control {
    pub start_time: f64,
    pub final_time: f64,
    pub checkpoint_interval: f64,
    /// Number of RHS evaluations between performing side effects.
    pub fold: usize,
    /// Number of worker threads on the Tokio runtime. Defaults to 2x
    /// the number of physical cores, as in the teacher.
    pub num_threads: Option<usize>,
    #[serde(default = "Control::default_output_directory")]
    pub output_directory: String,
}

impl Control {
    pub fn num_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| num_cpus::get() * 2)
    }

    fn default_output_directory() -> String {
        ".".to_string()
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_threads() == 0 || self.num_threads() >= 1024 {
            bail!("num_threads must be > 0 and < 1024");
        }
        if self.checkpoint_interval < 0.0 {
            bail!("checkpoint_interval must be >= 0.0");
        }
        if self.final_time < self.start_time {
            bail!("final_time must be >= start_time");
        }
        Ok(())
    }
}

/// The top-level user configuration (spec.md §6's "model descriptor"),
/// analogous to the teacher's `Configuration`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfiguration {
    pub spectral_grid: SpectralGridConfig,
    pub planet: PlanetConstants,
    pub atmosphere: AtmosphereConstants,
    pub model: ModelKind,
    pub orography: OrographyConfig,
    pub time_stepping: TimeStepping,
    pub diffusion: DiffusionConfig,
    pub control: Control,
    /// Toggles humidity (spec.md §6's `dry_core: bool`).
    pub dry_core: bool,
}

impl ModelConfiguration {
    pub fn validate(&self) -> Result<()> {
        self.spectral_grid.validate()?;
        self.model.validate()?;
        self.orography.validate()?;
        self.time_stepping.validate()?;
        self.diffusion.validate()?;
        self.control.validate()?;
        if !self.model.is_layered() && self.spectral_grid.nlev != 1 {
            bail!("barotropic and shallow-water tiers require nlev == 1, got {}", self.spectral_grid.nlev);
        }
        Ok(())
    }

    /// Patches this config with CLI overrides: `*.yaml` file paths are
    /// merged wholesale, anything else is parsed as a `key=value` pair
    /// and merged as a single-field YAML mapping. Mirrors the teacher's
    /// `Configuration::patch_from`.
    pub fn patch_from(&mut self, overrides: Vec<String>) -> Result<(), Error> {
        for extra in overrides {
            if extra.ends_with(".yaml") {
                self.patch_from_reader(File::open(&extra)?)?;
            } else {
                let (key, value) = extra
                    .split_once('=')
                    .ok_or_else(|| Error::Config(format!("override '{extra}' is neither a .yaml file nor a key=value pair")))?;
                self.patch_from_str(&format!("{key}: {value}"))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ModelConfiguration {
        ModelConfiguration {
            spectral_grid: SpectralGridConfig {
                trunc: 21,
                nlat_half: 16,
                grid_kind: GridKind::FullGaussianGrid,
                nlev: 1,
                precision: Precision::F64,
                device: "cpu".to_string(),
            },
            planet: PlanetConstants::earth(),
            atmosphere: AtmosphereConstants::earth(),
            model: ModelKind::Barotropic,
            orography: OrographyConfig::Zero,
            time_stepping: TimeStepping { dt: 900.0, robert_filter: 0.03, williams_filter: 0.53 },
            diffusion: DiffusionConfig { coefficient: 1e16, power: 2 },
            control: Control {
                start_time: 0.0,
                final_time: 86_400.0,
                checkpoint_interval: 3600.0,
                fold: 10,
                num_threads: None,
                output_directory: ".".to_string(),
            },
            dry_core: true,
        }
    }

    #[test]
    fn barotropic_config_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn barotropic_rejects_multiple_layers() {
        let mut config = base_config();
        config.spectral_grid.nlev = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn primitive_requires_no_fixed_layer_count() {
        let mut config = base_config();
        config.model = ModelKind::Primitive;
        config.spectral_grid.nlev = 8;
        assert!(config.validate().is_ok());
    }
}
