//! # EMBERFX Core
//!
//! CPU-side particle simulation: pooled storage, time-accurate emission
//! scheduling, per-tick physics, and keyframe-driven appearance.
//!
//! ## Architecture
//!
//! - [`store`] - preallocated particle pool (free stack + live list)
//! - [`species`] - shared per-kind templates and the resolution library
//! - [`config`] - emitter configuration and clamping validation
//! - [`keyframe`] - piecewise-linear age interpolation
//! - [`emitter`] - the scheduler and integrator
//! - [`services`] - capability traits for collision, anchors, and
//!   procedural positions
//! - [`events`] - notifications drained by the owner each tick
//!
//! ## House rules
//!
//! - No per-particle heap allocation after bind
//! - No GPU types; rendering consumes the store through a read-only view
//! - Identical seeds and inputs produce identical particles

pub mod config;
pub mod emitter;
pub mod error;
pub mod events;
pub mod keyframe;
pub mod services;
pub mod species;
pub mod store;

pub use config::{
    AnchorSettings, AttractionMode, BlendStyle, EmitterConfig, OrientationMode, ProgressConfig,
    ProgressMode, ValidationWarning,
};
pub use emitter::{Emitter, AGED_SPIN_TO_RADIANS};
pub use error::{BindError, BindResult, KeyframeError};
pub use events::EmitterEvent;
pub use keyframe::KeyframeTrack;
pub use services::{
    AnchorResolver, AnchorTransform, CollisionMask, CollisionQuery, PositionFn, PositionFnError,
    PositionInput, RayHit, SimulationContext,
};
pub use species::{
    AnimationConfig, SpeciesConfig, SpeciesLibrary, SpeciesTemplate, TextureAnimation,
    MAX_SPECIES_NAME_LEN,
};
pub use store::{Particle, ParticleHandle, ParticleStore, GROWTH_SLAB};
