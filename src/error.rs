//! The crate's error type (spec.md §7, SPEC_FULL.md §0.1). Mirrors the
//! teacher's `app::Error`: a flat `thiserror::Error` enum with `#[from]`
//! conversions for the ambient I/O/config error sources, plus the three
//! kinds spec.md §7 names explicitly for the dynamical core itself.

use thiserror::Error;

/// Errors surfaced at the public API boundary. Shape mismatches inside
/// the hot tendency path are `debug_assert!`-checked instead (spec.md
/// §7 "Propagation": bounds checks are immediate and fatal to the RHS,
/// not retried); this variant exists for the boundary checks performed
/// once per call at `TendencyEngine::evaluate` and the transform.
#[derive(Error, Debug)]
pub enum Error {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    SerdeYaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_formats_its_message() {
        let err = Error::ShapeMismatch("field 'vor' has 10 points, expected 20".to_string());
        assert_eq!(err.to_string(), "shape mismatch: field 'vor' has 10 points, expected 20");
    }
}
