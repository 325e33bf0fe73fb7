//! Error types for the fieldglow core.
//!
//! Errors only surface from construction and configuration. The per-frame
//! path never returns one: faults there degrade to a blank frame or a
//! skipped spawn.

use thiserror::Error;

/// Errors produced while building or configuring a scene.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A viewport or bitmap dimension was unusable (e.g. overflowing area).
    #[error("invalid dimensions: width and height must be finite and fit in memory")]
    InvalidDimensions,

    /// A configuration value would break an engine invariant.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A color string could not be parsed.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// No preset is registered under the given name.
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    /// Snapshot or file output failed.
    #[error("i/o error: {0}")]
    Io(String),
}
