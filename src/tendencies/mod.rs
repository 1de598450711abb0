//! Tendency computation for the three model tiers (spec.md §4.3, §4.4).
//! Grounded on the teacher's `state.rs` `weighted_average` for the
//! per-layer `tokio::spawn` + `futures::future::join_all` fan-out
//! pattern used wherever the spec calls a step "embarrassingly
//! parallel across layers".

pub mod barotropic;
pub mod flux_divergence;
pub mod primitive;
pub mod shallow_water;

use std::sync::Arc;

use crate::constants::{AtmosphereConstants, PlanetConstants};
use crate::geometry::Geometry;
use crate::spectral::SpectralTransform;

/// The read-only context every tendency step borrows: geometry, the
/// precomputed transform tables, and the physical constants. None of
/// this is mutated during an RHS evaluation (spec.md §5
/// "Shared-resource policy"). Held behind `Arc` rather than a
/// reference so the per-layer steps of §4.3 can hand a cheap clone of
/// the context to `tokio::spawn`, which requires `'static` futures.
#[derive(Clone)]
pub struct TendencyContext {
    pub geometry: Arc<Geometry>,
    pub transform: Arc<SpectralTransform>,
    pub planet: PlanetConstants,
    pub atmosphere: AtmosphereConstants,
    pub dry_core: bool,
}

impl TendencyContext {
    pub fn new(
        geometry: Arc<Geometry>,
        transform: Arc<SpectralTransform>,
        planet: PlanetConstants,
        atmosphere: AtmosphereConstants,
        dry_core: bool,
    ) -> Self {
        Self { geometry, transform, planet, atmosphere, dry_core }
    }
}
