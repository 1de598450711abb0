//! Spectral-transform dynamical core for the primitive equations on
//! the sphere (spec.md §1). See [`app::App`] for the top-level entry
//! point.

pub mod app;
pub mod boundaries;
pub mod config;
pub mod constants;
pub mod diagnostic;
pub mod error;
pub mod geometry;
pub mod model;
pub mod prognostic;
pub mod relaxation;
pub mod spectral;
pub mod tasks;
pub mod tendencies;
pub mod yaml_patch;
