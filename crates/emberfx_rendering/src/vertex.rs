//! Vertex layout and quad index data for particle batches.

use bytemuck::{Pod, Zeroable};

/// A single particle-quad vertex.
///
/// Layout is `#[repr(C)]` and padding-free so the whole staging buffer can
/// be uploaded with one cast.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    /// World-space position.
    pub position: [f32; 3],
    /// RGBA color after ambient blending.
    pub color: [f32; 4],
    /// Texture coordinate.
    pub texcoord: [f32; 2],
}

impl ParticleVertex {
    /// Size in bytes (9 floats, no padding).
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Index pattern for one quad: two triangles sharing the 1-3 diagonal.
pub const QUAD_INDEX_PATTERN: [u16; 6] = [0, 1, 3, 1, 3, 2];

/// Largest quad count addressable with 16-bit indices (4 vertices each).
pub const MAX_QUADS: usize = (u16::MAX / 4) as usize;

/// Grow-only index buffer shared by every batch built from one emitter.
///
/// The pattern repeats per quad with a vertex offset of 4, so the buffer
/// only needs regenerating when the store's capacity grows.
#[derive(Debug, Default)]
pub struct QuadIndexBuffer {
    indices: Vec<u16>,
    quad_capacity: usize,
}

impl QuadIndexBuffer {
    /// Creates an empty index buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer sized for `quads` quads.
    #[must_use]
    pub fn with_quads(quads: usize) -> Self {
        let mut buffer = Self::new();
        buffer.ensure_quads(quads);
        buffer
    }

    /// Grows the buffer to cover at least `quads` quads. Never shrinks.
    ///
    /// Returns the effective capacity, which is below the request when
    /// `quads` exceeds [`MAX_QUADS`]; callers that might overrun 16-bit
    /// indexing compare it against their live count and split the draw.
    pub fn ensure_quads(&mut self, quads: usize) -> usize {
        let quads = quads.min(MAX_QUADS);
        if quads <= self.quad_capacity {
            return self.quad_capacity;
        }
        self.indices.reserve((quads - self.quad_capacity) * 6);
        for quad in self.quad_capacity..quads {
            let base = (quad * 4) as u16;
            for offset in QUAD_INDEX_PATTERN {
                self.indices.push(base + offset);
            }
        }
        self.quad_capacity = quads;
        self.quad_capacity
    }

    /// Number of quads this buffer covers.
    #[must_use]
    #[inline]
    pub fn quad_capacity(&self) -> usize {
        self.quad_capacity
    }

    /// The index data, 6 entries per quad.
    #[must_use]
    #[inline]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// The index data as bytes, ready for upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
