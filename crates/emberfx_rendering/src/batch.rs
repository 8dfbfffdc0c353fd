//! Assembles live particles into upload-ready vertex quads.
//!
//! The builder owns reusable scratch buffers so a steady frame performs no
//! allocation: the live list is snapshotted, optionally depth-sorted, and
//! expanded into four vertices per particle in draw order.

use std::cmp::Ordering;

use emberfx_core::{
    BlendStyle, Emitter, OrientationMode, Particle, ParticleHandle, SpeciesTemplate,
    AGED_SPIN_TO_RADIANS,
};
use glam::{Quat, Vec2, Vec3, Vec4};

use crate::camera::CameraContext;
use crate::vertex::ParticleVertex;

/// Corner UVs for a static (non-animated) texture.
const STATIC_UVS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(1.0, 0.0),
];

/// Camera-plane base corners for billboard quads, matching the UV order:
/// top-left, bottom-left, bottom-right, top-right.
const BILLBOARD_CORNERS: [Vec3; 4] = [
    Vec3::new(-1.0, 1.0, 0.0),
    Vec3::new(-1.0, -1.0, 0.0),
    Vec3::new(1.0, -1.0, 0.0),
    Vec3::new(1.0, 1.0, 0.0),
];

/// Finished per-frame output for one emitter.
pub struct RenderBatch<'a> {
    /// Four vertices per particle, already in draw order.
    pub vertices: &'a [ParticleVertex],
    /// Number of particles (quads) in the batch.
    pub particle_count: usize,
    /// Blend mode resolved at bind time.
    pub blend_style: BlendStyle,
    /// Soft-particle fade distance from the emitter config.
    pub softness_distance: f32,
    /// Squared camera distance, for inter-batch draw ordering.
    pub sort_dist_sq: f32,
    /// Texture to bind: the emitter override, or the newest particle's
    /// species texture.
    pub texture: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
struct SortEntry {
    key: f32,
    handle: ParticleHandle,
}

/// Reusable batch builder.
///
/// One instance per render thread; scratch buffers grow to the largest
/// batch seen and stay allocated.
#[derive(Debug, Default)]
pub struct BatchBuilder {
    order: Vec<SortEntry>,
    staging: Vec<ParticleVertex>,
}

impl BatchBuilder {
    /// Creates a builder with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the batch for one emitter, or `None` when there is nothing
    /// to draw.
    pub fn build<'a>(
        &'a mut self,
        emitter: &'a Emitter,
        camera: &CameraContext,
    ) -> Option<RenderBatch<'a>> {
        if emitter.is_dead() || emitter.particle_count() == 0 {
            return None;
        }
        let store = emitter.store();
        let config = emitter.config();

        self.order.clear();
        if config.sort_particles {
            let forward = camera.view_forward();
            for handle in store.live_handles() {
                self.order.push(SortEntry {
                    key: store.get(handle).pos.dot(forward),
                    handle,
                });
            }
            // Farthest along the view axis first (back to front). Stable,
            // so equal keys keep newest-first order.
            self.order
                .sort_by(|a, b| b.key.partial_cmp(&a.key).unwrap_or(Ordering::Equal));
        } else {
            for handle in store.live_handles() {
                self.order.push(SortEntry { key: 0.0, handle });
            }
        }

        let count = self.order.len();
        self.staging.clear();
        self.staging.resize(count * 4, ParticleVertex::default());

        for (slot, entry) in self.order.iter().enumerate() {
            let write = if config.reverse_order {
                count - 1 - slot
            } else {
                slot
            };
            let quad = &mut self.staging[write * 4..write * 4 + 4];
            let particle = store.get(entry.handle);
            let species = &emitter.species()[usize::from(particle.species)];
            let color = ambient_blend(particle.color, camera.ambient, config.ambient_factor);
            let uvs = corner_uvs(particle, species);

            match config.orientation {
                OrientationMode::Billboard => {
                    write_billboard(particle, camera, color, &uvs, quad);
                }
                OrientationMode::Oriented => {
                    // A zero direction leaves a degenerate quad, which
                    // rasterizes to nothing.
                    write_oriented(particle, config.orient_on_velocity, camera, color, &uvs, quad);
                }
                OrientationMode::Aligned => {
                    write_aligned(particle, config.align_axis(), color, &uvs, quad);
                }
            }
        }

        let newest = store.live_particles().next()?;
        let texture = config.texture.as_deref().or_else(|| {
            emitter.species()[usize::from(newest.species)]
                .texture
                .as_deref()
        });
        let sort_dist_sq = (emitter.last_position() - camera.position).length_squared();

        Some(RenderBatch {
            vertices: &self.staging,
            particle_count: count,
            blend_style: config.blend_style,
            softness_distance: config.softness_distance,
            sort_dist_sq,
            texture,
        })
    }
}

/// Blends a particle color toward `color * ambient` by `factor`.
fn ambient_blend(color: Vec4, ambient: Vec4, factor: f32) -> Vec4 {
    color.lerp(color * ambient, factor.clamp(0.0, 1.0))
}

fn corner_uvs(particle: &Particle, species: &SpeciesTemplate) -> [Vec2; 4] {
    species
        .animation
        .as_ref()
        .map_or(STATIC_UVS, |animation| animation.frame_uvs(particle.age_ms))
}

fn write_billboard(
    particle: &Particle,
    camera: &CameraContext,
    color: Vec4,
    uvs: &[Vec2; 4],
    out: &mut [ParticleVertex],
) {
    let half_size = particle.size * 0.5;
    let spin = particle.spin_speed * particle.age_ms as f32 * AGED_SPIN_TO_RADIANS;
    let (sin, cos) = spin.sin_cos();
    let rotation = camera.billboard_rotation();

    for (vertex, (&base, &uv)) in out.iter_mut().zip(BILLBOARD_CORNERS.iter().zip(uvs)) {
        let spun = Vec3::new(cos * base.x - sin * base.y, sin * base.x + cos * base.y, 0.0);
        let position = rotation * (spun * half_size) + particle.pos;
        *vertex = ParticleVertex {
            position: position.to_array(),
            color: color.to_array(),
            texcoord: uv.to_array(),
        };
    }
}

fn write_oriented(
    particle: &Particle,
    orient_on_velocity: bool,
    camera: &CameraContext,
    color: Vec4,
    uvs: &[Vec2; 4],
    out: &mut [ParticleVertex],
) {
    let raw_direction = if orient_on_velocity {
        particle.vel
    } else {
        particle.orient_dir
    };
    let Some(direction) = raw_direction.try_normalize() else {
        return;
    };
    let from_camera = particle.pos - camera.position;
    let cross = from_camera.cross(direction).normalize_or_zero();

    let half_size = particle.size * 0.5;
    let along = direction * half_size;
    let across = cross * half_size;
    let start = particle.pos - along;
    let end = particle.pos + along;

    write_quad(
        [start + across, start - across, end - across, end + across],
        color,
        uvs,
        out,
    );
}

fn write_aligned(
    particle: &Particle,
    axis: Vec3,
    color: Vec4,
    uvs: &[Vec2; 4],
    out: &mut [ParticleVertex],
) {
    // Pick the world axis most orthogonal to the alignment direction.
    let reference = if axis.y.abs() > axis.z.abs() {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let mut right = reference.cross(axis).normalize_or_zero();
    if particle.spin_speed != 0.0 {
        let spin = particle.spin_speed * particle.age_ms as f32 * AGED_SPIN_TO_RADIANS;
        right = Quat::from_axis_angle(axis, spin) * right;
    }
    let cross = right.cross(axis);

    let half_size = particle.size * 0.5;
    let along = right * half_size;
    let across = cross * half_size;
    let start = particle.pos - along;
    let end = particle.pos + along;

    write_quad(
        [start + across, start - across, end - across, end + across],
        color,
        uvs,
        out,
    );
}

fn write_quad(corners: [Vec3; 4], color: Vec4, uvs: &[Vec2; 4], out: &mut [ParticleVertex]) {
    for (vertex, (corner, &uv)) in out.iter_mut().zip(corners.into_iter().zip(uvs)) {
        *vertex = ParticleVertex {
            position: corner.to_array(),
            color: color.to_array(),
            texcoord: uv.to_array(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberfx_core::{EmitterConfig, SpeciesConfig, SpeciesLibrary};
    use glam::Mat3;

    fn library() -> SpeciesLibrary {
        SpeciesLibrary::from_configs(&[SpeciesConfig {
            name: "ember".into(),
            lifetime_ms: 60_000,
            ..SpeciesConfig::default()
        }])
        .unwrap()
    }

    fn still_config() -> EmitterConfig {
        EmitterConfig {
            ejection_period_ms: 100,
            ejection_velocity: 0.0,
            velocity_variance: 0.0,
            theta_min: 0.0,
            theta_max: 0.0,
            phi_variance: 0.0,
            species: vec!["ember".into()],
            seed: Some(3),
            ..EmitterConfig::default()
        }
    }

    /// One particle per call, exactly at `position`.
    fn emit_at(emitter: &mut Emitter, position: Vec3) {
        let before = emitter.particle_count();
        emitter.emit_particles(position, position, Vec3::Z, Vec3::ZERO, 100);
        assert_eq!(emitter.particle_count(), before + 1);
    }

    fn identity_camera() -> CameraContext {
        CameraContext::from_basis(Mat3::IDENTITY, Vec3::ZERO, Vec4::ONE)
    }

    fn quad_center(vertices: &[ParticleVertex], quad: usize) -> Vec3 {
        let mut sum = Vec3::ZERO;
        for vertex in &vertices[quad * 4..quad * 4 + 4] {
            sum += Vec3::from(vertex.position);
        }
        sum / 4.0
    }

    #[test]
    fn test_empty_emitter_yields_no_batch() {
        let emitter = Emitter::bind(still_config(), &library()).unwrap();
        let mut builder = BatchBuilder::new();
        assert!(builder.build(&emitter, &identity_camera()).is_none());
    }

    #[test]
    fn test_depth_sort_back_to_front() {
        let config = EmitterConfig {
            sort_particles: true,
            ..still_config()
        };
        let mut emitter = Emitter::bind(config, &library()).unwrap();
        // Identity camera looks down -Z, so the sort key is -z.
        for z in [-5.0, -1.0, -9.0] {
            emit_at(&mut emitter, Vec3::new(0.0, 0.0, z));
        }

        let mut builder = BatchBuilder::new();
        let batch = builder.build(&emitter, &identity_camera()).unwrap();
        assert_eq!(batch.particle_count, 3);

        let zs: Vec<f32> = (0..3)
            .map(|quad| quad_center(batch.vertices, quad).z)
            .collect();
        assert_eq!(zs, vec![-9.0, -5.0, -1.0]);
    }

    #[test]
    fn test_reverse_order_flips_writes() {
        let config = EmitterConfig {
            sort_particles: true,
            reverse_order: true,
            ..still_config()
        };
        let mut emitter = Emitter::bind(config, &library()).unwrap();
        for z in [-5.0, -1.0, -9.0] {
            emit_at(&mut emitter, Vec3::new(0.0, 0.0, z));
        }

        let mut builder = BatchBuilder::new();
        let batch = builder.build(&emitter, &identity_camera()).unwrap();
        let zs: Vec<f32> = (0..3)
            .map(|quad| quad_center(batch.vertices, quad).z)
            .collect();
        assert_eq!(zs, vec![-1.0, -5.0, -9.0]);
    }

    #[test]
    fn test_unsorted_batches_are_newest_first() {
        let mut emitter = Emitter::bind(still_config(), &library()).unwrap();
        for x in [1.0, 2.0, 3.0] {
            emit_at(&mut emitter, Vec3::new(x, 0.0, -1.0));
        }

        let mut builder = BatchBuilder::new();
        let batch = builder.build(&emitter, &identity_camera()).unwrap();
        let xs: Vec<f32> = (0..3)
            .map(|quad| quad_center(batch.vertices, quad).x)
            .collect();
        assert_eq!(xs, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_billboard_quad_faces_identity_camera() {
        let mut emitter = Emitter::bind(still_config(), &library()).unwrap();
        emit_at(&mut emitter, Vec3::new(0.0, 0.0, -2.0));

        let mut builder = BatchBuilder::new();
        let batch = builder.build(&emitter, &identity_camera()).unwrap();

        // Size 1 quad: corners half a unit from the center, all at z = -2.
        for vertex in batch.vertices {
            assert_eq!(vertex.position[2], -2.0);
            assert_eq!(vertex.position[0].abs(), 0.5);
            assert_eq!(vertex.position[1].abs(), 0.5);
        }
        // Top-left corner carries uv (0, 0).
        assert_eq!(batch.vertices[0].texcoord, [0.0, 0.0]);
        assert_eq!(batch.vertices[0].position[..2], [-0.5, 0.5]);
    }

    #[test]
    fn test_oriented_zero_velocity_degenerates() {
        let config = EmitterConfig {
            orientation: OrientationMode::Oriented,
            orient_on_velocity: true,
            ..still_config()
        };
        let mut emitter = Emitter::bind(config, &library()).unwrap();
        emit_at(&mut emitter, Vec3::new(1.0, 2.0, 3.0));

        let mut builder = BatchBuilder::new();
        let batch = builder.build(&emitter, &identity_camera()).unwrap();
        // Ejection velocity is zero, so the quad collapses to nothing.
        for vertex in batch.vertices {
            assert_eq!(vertex.position, [0.0; 3]);
        }
    }

    #[test]
    fn test_oriented_quad_stretches_along_velocity() {
        let config = EmitterConfig {
            orientation: OrientationMode::Oriented,
            orient_on_velocity: true,
            ejection_velocity: 4.0,
            ..still_config()
        };
        let mut emitter = Emitter::bind(config, &library()).unwrap();
        // Theta 0: velocity points along the emission axis.
        emitter.emit_particles(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::X,
            Vec3::ZERO,
            100,
        );

        let mut builder = BatchBuilder::new();
        let batch = builder.build(&emitter, &identity_camera()).unwrap();
        let xs: Vec<f32> = batch.vertices.iter().map(|v| v.position[0]).collect();
        assert!((xs.iter().copied().fold(f32::INFINITY, f32::min) - (-0.5)).abs() < 1e-5);
        assert!((xs.iter().copied().fold(f32::NEG_INFINITY, f32::max) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_aligned_quad_ignores_camera() {
        let config = EmitterConfig {
            orientation: OrientationMode::Aligned,
            align_direction: [0.0, 0.0, 1.0],
            ..still_config()
        };
        let mut emitter = Emitter::bind(config, &library()).unwrap();
        emit_at(&mut emitter, Vec3::ZERO);

        let mut builder = BatchBuilder::new();
        let far_camera = CameraContext::from_basis(
            Mat3::from_rotation_y(1.0),
            Vec3::new(100.0, -50.0, 7.0),
            Vec4::ONE,
        );
        let near = builder.build(&emitter, &identity_camera()).unwrap();
        let near_positions: Vec<[f32; 3]> = near.vertices.iter().map(|v| v.position).collect();
        let far = builder.build(&emitter, &far_camera).unwrap();
        let far_positions: Vec<[f32; 3]> = far.vertices.iter().map(|v| v.position).collect();
        assert_eq!(near_positions, far_positions);
    }

    #[test]
    fn test_ambient_blend() {
        let half_gray = Vec4::new(0.5, 0.5, 0.5, 1.0);
        assert_eq!(ambient_blend(Vec4::ONE, half_gray, 0.0), Vec4::ONE);
        assert_eq!(ambient_blend(Vec4::ONE, half_gray, 1.0), half_gray);
        let mid = ambient_blend(Vec4::ONE, half_gray, 0.5);
        assert!((mid.x - 0.75).abs() < 1e-6);
        // Out-of-range factors clamp instead of extrapolating.
        assert_eq!(ambient_blend(Vec4::ONE, half_gray, 5.0), half_gray);
    }

    #[test]
    fn test_batch_metadata() {
        let config = EmitterConfig {
            texture: Some("fire_atlas".into()),
            softness_distance: 2.5,
            ..still_config()
        };
        let mut emitter = Emitter::bind(config, &library()).unwrap();
        emit_at(&mut emitter, Vec3::new(3.0, 0.0, 0.0));

        let mut builder = BatchBuilder::new();
        let batch = builder.build(&emitter, &identity_camera()).unwrap();
        assert_eq!(batch.texture, Some("fire_atlas"));
        assert_eq!(batch.softness_distance, 2.5);
        assert_eq!(batch.sort_dist_sq, 9.0);
        assert_eq!(batch.blend_style, BlendStyle::Additive);
    }
}
