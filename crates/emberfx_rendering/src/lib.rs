//! # EMBERFX Rendering
//!
//! CPU-side batch assembly for the EMBERFX particle engine.
//!
//! The host renderer owns every GPU resource; this crate stops at a Pod
//! vertex slice plus the metadata needed to draw it (blend mode, texture,
//! inter-batch sort key) and a grow-only quad index buffer.
//!
//! ## Architecture
//!
//! - [`vertex`] - `#[repr(C)]` vertex layout and the shared quad index
//!   buffer
//! - [`camera`] - per-frame camera/lighting inputs
//! - [`batch`] - the batch builder: snapshot, sort, orient, write

pub mod batch;
pub mod camera;
pub mod vertex;

pub use batch::{BatchBuilder, RenderBatch};
pub use camera::CameraContext;
pub use vertex::{ParticleVertex, QuadIndexBuffer, MAX_QUADS, QUAD_INDEX_PATTERN};
