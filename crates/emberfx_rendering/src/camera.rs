//! Per-frame camera inputs for batch assembly.

use glam::{Mat3, Mat4, Vec3, Vec4};

/// Immutable camera and lighting inputs for one batch build.
#[derive(Debug, Clone, Copy)]
pub struct CameraContext {
    /// Camera world position.
    pub position: Vec3,
    /// Ambient light color used by the emitter's ambient blend.
    pub ambient: Vec4,
    /// Camera basis in world space (inverse view rotation).
    view_rotation: Mat3,
    /// World-space view direction.
    forward: Vec3,
}

impl CameraContext {
    /// Builds a context from a world-to-camera view matrix.
    #[must_use]
    pub fn from_view(view: &Mat4, position: Vec3, ambient: Vec4) -> Self {
        // The rotation part of a rigid view matrix inverts by transposition.
        let view_rotation = Mat3::from_mat4(*view).transpose();
        Self::from_basis(view_rotation, position, ambient)
    }

    /// Builds a context from an explicit camera basis.
    #[must_use]
    pub fn from_basis(view_rotation: Mat3, position: Vec3, ambient: Vec4) -> Self {
        Self {
            position,
            ambient,
            view_rotation,
            forward: view_rotation * Vec3::NEG_Z,
        }
    }

    /// Rotation that turns a camera-plane quad to face the camera.
    #[must_use]
    #[inline]
    pub fn billboard_rotation(&self) -> Mat3 {
        self.view_rotation
    }

    /// World-space view direction, used as the depth-sort axis.
    #[must_use]
    #[inline]
    pub fn view_forward(&self) -> Vec3 {
        self.forward
    }
}
