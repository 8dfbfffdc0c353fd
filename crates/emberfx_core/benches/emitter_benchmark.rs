//! Hot-path benchmarks: emission scheduling and the per-tick integrator.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use emberfx_core::{Emitter, EmitterConfig, SimulationContext, SpeciesConfig, SpeciesLibrary};
use glam::Vec3;

fn dense_emitter() -> Emitter {
    let library = SpeciesLibrary::from_configs(&[SpeciesConfig {
        name: "ember".into(),
        lifetime_ms: 2000,
        drag_coefficient: 0.5,
        gravity_coefficient: 1.0,
        ..SpeciesConfig::default()
    }])
    .expect("valid species");

    let config = EmitterConfig {
        ejection_period_ms: 2,
        period_variance_ms: 1,
        species: vec!["ember".into()],
        seed: Some(1),
        ..EmitterConfig::default()
    };
    Emitter::bind(config, &library).expect("valid bind")
}

fn bench_emission(c: &mut Criterion) {
    c.bench_function("emit_1s_at_500hz", |b| {
        b.iter(|| {
            let mut emitter = dense_emitter();
            emitter.emit_particles(
                black_box(Vec3::ZERO),
                black_box(Vec3::ONE),
                Vec3::Z,
                Vec3::ZERO,
                1000,
            );
            black_box(emitter.particle_count())
        });
    });
}

fn bench_advance(c: &mut Criterion) {
    let mut emitter = dense_emitter();
    emitter.emit_particles(Vec3::ZERO, Vec3::ONE, Vec3::Z, Vec3::ZERO, 1000);
    let context = SimulationContext {
        wind: Vec3::new(1.0, 0.0, 0.0),
        ..SimulationContext::default()
    };

    c.bench_function("advance_500_particles_16ms", |b| {
        b.iter(|| {
            emitter.advance_time(black_box(0.016), &context);
            // Keep the pool populated across iterations.
            emitter.emit_particles(Vec3::ZERO, Vec3::ONE, Vec3::Z, Vec3::ZERO, 16);
        });
    });
}

criterion_group!(benches, bench_emission, bench_advance);
criterion_main!(benches);
