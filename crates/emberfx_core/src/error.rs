//! Error types for the EMBERFX core simulation.
//!
//! Bind-time failures are hard errors; almost everything else in the engine
//! degrades with a warning instead of failing, so this module stays small.

use thiserror::Error;

/// Errors that can fail binding an emitter (or re-resolving its species).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The configuration names no species at all.
    #[error("species list is empty")]
    EmptySpeciesList,

    /// None of the configured species names resolved against the library.
    #[error("no configured species could be resolved")]
    NoSpeciesResolved,

    /// A species identifier exceeds the maximum accepted length.
    #[error("species identifier '{name}' is {length} bytes (max {max})")]
    IdentifierTooLong {
        /// The offending identifier, truncated for display.
        name: String,
        /// Length of the identifier in bytes.
        length: usize,
        /// Maximum accepted length.
        max: usize,
    },
}

/// Result alias for bind-time operations.
pub type BindResult<T> = Result<T, BindError>;

/// Errors raised when constructing a keyframe track.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyframeError {
    /// Fewer than two keys were supplied.
    #[error("keyframe track needs at least 2 keys, got {0}")]
    TooFewKeys(usize),

    /// The time, color, and size arrays disagree on length.
    #[error("keyframe arrays have mismatched lengths (times {times}, colors {colors}, sizes {sizes})")]
    MismatchedLengths {
        /// Number of time keys.
        times: usize,
        /// Number of color keys.
        colors: usize,
        /// Number of size keys.
        sizes: usize,
    },

    /// The first key time is not 0.0.
    #[error("keyframe times must start at 0.0, got {0}")]
    BadStart(f32),

    /// The last key time is not 1.0.
    #[error("keyframe times must end at 1.0, got {0}")]
    BadEnd(f32),

    /// A key time decreases relative to its predecessor.
    #[error("keyframe times must be non-decreasing (violated at key {index})")]
    NotMonotonic {
        /// Index of the offending key.
        index: usize,
    },
}
