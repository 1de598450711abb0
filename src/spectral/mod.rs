//! Spectral-transform method: packed triangular fields, the
//! bidirectional grid transform, and the spectral differential
//! operators (spec.md §4.1–§4.2).

pub mod field;
pub mod gaussian;
pub mod legendre;
pub mod operators;
pub mod transform;

pub use field::SpectralField;
pub use transform::SpectralTransform;
