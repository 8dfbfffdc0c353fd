//! Emitter-to-owner notifications.
//!
//! The emitter never touches GPU resources or scene objects directly. Anything
//! the owning system must react to is queued here and drained once per tick
//! via [`crate::Emitter::drain_events`].

/// A notification queued by the emitter for its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterEvent {
    /// The particle store grew.
    ///
    /// Dependent resources sized to the old capacity (e.g. quad index
    /// buffers) must be resized before the next draw.
    CapacityGrown {
        /// New total slot capacity.
        capacity: usize,
    },

    /// The species list was re-resolved after a library reload.
    SpeciesReloaded {
        /// Number of species templates now bound (0 when the reload failed).
        count: usize,
    },

    /// The progress value driving the position function crossed a
    /// configured bound.
    ProgressBoundary {
        /// True for the upper bound, false for the lower bound.
        upper: bool,
    },
}
