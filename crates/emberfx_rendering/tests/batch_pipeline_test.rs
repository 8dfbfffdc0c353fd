//! Full-pipeline test: emit, simulate, react to capacity events, and build
//! frames the way a host renderer would.

use emberfx_core::{
    Emitter, EmitterConfig, EmitterEvent, SimulationContext, SpeciesConfig, SpeciesLibrary,
};
use emberfx_rendering::{BatchBuilder, CameraContext, ParticleVertex, QuadIndexBuffer};
use glam::{Mat3, Vec3, Vec4};

fn smoke_library() -> SpeciesLibrary {
    SpeciesLibrary::from_configs(&[SpeciesConfig {
        name: "smoke".into(),
        lifetime_ms: 1500,
        drag_coefficient: 0.3,
        times: vec![0.0, 0.25, 1.0],
        colors: vec![
            [1.0, 1.0, 1.0, 0.0],
            [0.6, 0.6, 0.6, 0.8],
            [0.3, 0.3, 0.3, 0.0],
        ],
        sizes: vec![0.5, 1.0, 3.0],
        texture: Some("smoke_puff".into()),
        ..SpeciesConfig::default()
    }])
    .expect("valid species")
}

#[test]
fn frames_stay_consistent_across_capacity_growth() {
    let library = smoke_library();
    let config = EmitterConfig {
        ejection_period_ms: 5,
        species: vec!["smoke".into()],
        sort_particles: true,
        seed: Some(99),
        ..EmitterConfig::default()
    };
    let mut emitter = Emitter::bind(config, &library).expect("valid bind");
    let mut builder = BatchBuilder::new();
    let mut indices = QuadIndexBuffer::with_quads(emitter.store().capacity());
    let camera = CameraContext::from_basis(
        Mat3::IDENTITY,
        Vec3::new(0.0, 0.0, 10.0),
        Vec4::new(0.2, 0.2, 0.3, 1.0),
    );

    let context = SimulationContext::default();
    for frame in 0..120 {
        let t = frame as f32 * 0.05;
        let position = Vec3::new(t.sin(), t.cos(), 0.0);
        emitter.emit_from_point(position, true, Vec3::Z, Vec3::ZERO, 50);
        emitter.advance_time(0.05, &context);

        for event in emitter.drain_events() {
            if let EmitterEvent::CapacityGrown { capacity } = event {
                indices.ensure_quads(capacity);
            }
        }

        if let Some(batch) = builder.build(&emitter, &camera) {
            assert_eq!(batch.vertices.len(), batch.particle_count * 4);
            assert_eq!(batch.texture, Some("smoke_puff"));
            // The shared index buffer always covers the batch.
            assert!(indices.quad_capacity() >= batch.particle_count);
            assert_eq!(indices.indices().len(), indices.quad_capacity() * 6);

            // Upload path: both buffers cast cleanly to bytes.
            let vertex_bytes: &[u8] = bytemuck::cast_slice(batch.vertices);
            assert_eq!(
                vertex_bytes.len(),
                batch.particle_count * 4 * ParticleVertex::SIZE
            );
            assert_eq!(indices.as_bytes().len(), indices.indices().len() * 2);
        }
    }

    // Steady state: one live particle per period across the lifetime.
    assert!(emitter.particle_count() > 200);
    assert!(indices.quad_capacity() >= emitter.particle_count());
}

#[test]
fn sizes_and_colors_follow_the_key_track_between_frames() {
    let library = smoke_library();
    let config = EmitterConfig {
        ejection_period_ms: 100,
        ejection_velocity: 0.0,
        velocity_variance: 0.0,
        theta_max: 0.0,
        phi_variance: 0.0,
        species: vec!["smoke".into()],
        seed: Some(5),
        ..EmitterConfig::default()
    };
    let mut emitter = Emitter::bind(config, &library).expect("valid bind");
    emitter.emit_particles(Vec3::ZERO, Vec3::ZERO, Vec3::Z, Vec3::ZERO, 100);

    let camera = CameraContext::from_basis(Mat3::IDENTITY, Vec3::ZERO, Vec4::ONE);
    let mut builder = BatchBuilder::new();

    let fresh_width = {
        let batch = builder.build(&emitter, &camera).expect("one particle");
        batch.vertices[3].position[0] - batch.vertices[0].position[0]
    };
    assert!((fresh_width - 0.5).abs() < 1e-5);

    // Half a lifetime later the size key has grown past 1.0.
    let context = SimulationContext::default();
    for _ in 0..15 {
        emitter.advance_time(0.05, &context);
    }
    let batch = builder.build(&emitter, &camera).expect("still alive");
    let aged_width = batch.vertices[3].position[0] - batch.vertices[0].position[0];
    assert!(aged_width > 1.0, "size should grow with age: {aged_width}");
}
