//! Capability interfaces the simulation consumes.
//!
//! The emitter never reaches into a scene graph or global state. Everything
//! environmental arrives through these traits, passed per tick inside a
//! [`SimulationContext`]. A `None` service simply disables the feature that
//! needs it.

use glam::{Quat, Vec3};
use thiserror::Error;

/// Bit mask selecting which world object classes a collision ray may hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CollisionMask(u32);

impl CollisionMask {
    /// Terrain geometry.
    pub const TERRAIN: Self = Self(1);
    /// Static world objects.
    pub const STATIC: Self = Self(1 << 1);
    /// Vehicles.
    pub const VEHICLE: Self = Self(1 << 2);
    /// Player-controlled objects.
    pub const PLAYER: Self = Self(1 << 3);
    /// Everything.
    pub const ALL: Self = Self(u32::MAX);

    /// Raw bit representation.
    #[must_use]
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Builds a mask from raw bits.
    #[must_use]
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Union of two masks.
    #[must_use]
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True if any of `other`'s bits are set in this mask.
    #[must_use]
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for CollisionMask {
    fn default() -> Self {
        Self::TERRAIN.union(Self::STATIC)
    }
}

/// Result of a collision ray cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// World-space intersection point.
    pub point: Vec3,
    /// Surface normal at the intersection (unit length expected).
    pub normal: Vec3,
}

/// Spatial collision query service.
pub trait CollisionQuery {
    /// Casts a ray from `from` to `to`; `None` means nothing was hit.
    fn cast_ray(&self, from: Vec3, to: Vec3, mask: CollisionMask) -> Option<RayHit>;
}

/// Position and orientation of a resolved anchor object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorTransform {
    /// World position of the anchor.
    pub position: Vec3,
    /// World rotation of the anchor.
    pub rotation: Quat,
}

/// Resolves anchor identifiers to live transforms.
///
/// Resolution failure is a normal runtime condition (the target left the
/// scene); the anchor term is skipped for that tick.
pub trait AnchorResolver {
    /// Looks up the current transform for `id`.
    fn resolve(&self, id: &str) -> Option<AnchorTransform>;
}

/// Inputs handed to a position function for one emission.
#[derive(Clone, Copy, Debug)]
pub struct PositionInput {
    /// Current progress value (see the emitter's progress configuration).
    pub progress: f32,
    /// Emitter internal clock in milliseconds.
    pub clock_ms: u32,
    /// Raw emission point before any procedural offset.
    pub point: Vec3,
}

/// A position function evaluation failure.
///
/// Carried as a value, never panicked: a failing function degrades that
/// emission to the plain cone position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("position function failed: {0}")]
pub struct PositionFnError(pub String);

/// Pluggable procedural emission-offset function.
///
/// When installed on an emitter, each emission's offset from the emission
/// point is taken from this function instead of the ejection cone.
pub trait PositionFn {
    /// Evaluates the offset for one emission.
    ///
    /// # Errors
    /// An error is logged and that emission falls back to the cone position.
    fn eval(&mut self, input: &PositionInput) -> Result<Vec3, PositionFnError>;
}

/// Per-tick environmental inputs, passed explicitly to `advance_time`.
pub struct SimulationContext<'a> {
    /// Ambient wind velocity in world units per second.
    pub wind: Vec3,
    /// Collision service; `None` disables collision response.
    pub collision: Option<&'a dyn CollisionQuery>,
    /// Anchor resolver; `None` disables anchor attraction.
    pub anchors: Option<&'a dyn AnchorResolver>,
}

impl Default for SimulationContext<'_> {
    fn default() -> Self {
        Self {
            wind: Vec3::ZERO,
            collision: None,
            anchors: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_default_covers_world_geometry() {
        let mask = CollisionMask::default();
        assert!(mask.intersects(CollisionMask::TERRAIN));
        assert!(mask.intersects(CollisionMask::STATIC));
        assert!(!mask.intersects(CollisionMask::PLAYER));
    }

    #[test]
    fn test_mask_union_and_bits() {
        let mask = CollisionMask::TERRAIN.union(CollisionMask::VEHICLE);
        assert_eq!(mask.bits(), 0b101);
        assert_eq!(CollisionMask::from_bits(0b101), mask);
    }
}
