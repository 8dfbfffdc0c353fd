//! The particle emitter: emission scheduling, per-tick integration, and
//! lifecycle management.
//!
//! The scheduler is time-accurate across irregular frame durations: leftover
//! sub-period time carries over between calls, emission points are
//! interpolated along the source's movement during the frame, and (when
//! clump prevention is on) particles emitted mid-frame are advanced to the
//! frame boundary so high-rate emitters do not bunch up.

use std::sync::Arc;

use glam::{Quat, Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{AttractionMode, BlendStyle, EmitterConfig, ProgressConfig, ProgressMode};
use crate::error::BindResult;
use crate::events::EmitterEvent;
use crate::services::{CollisionMask, PositionFn, PositionInput, SimulationContext};
use crate::species::{SpeciesLibrary, SpeciesTemplate};
use crate::store::{Particle, ParticleHandle, ParticleStore};

/// Converts spin speed (degrees per second) times age (milliseconds) into
/// radians.
pub const AGED_SPIN_TO_RADIANS: f32 = (1.0 / 1000.0) * (std::f32::consts::PI / 180.0);

/// World gravity, scaled per species by its gravity coefficient.
const GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -9.81);

/// Longest timestep a single tick will integrate, in seconds.
const MAX_TICK_SECONDS: f32 = 0.5;

/// Timesteps below this are ignored entirely.
const MIN_TICK_SECONDS: f32 = 1e-5;

/// Extra slots allocated beyond the steady-state live count at bind time.
const CAPACITY_FUDGE: usize = 8;

/// Seed used when the configuration supplies none.
const DEFAULT_SEED: u64 = 0x454D_4245_5246_5800;

/// Tracks the scalar progress value fed to a position function.
#[derive(Debug, Clone)]
struct ProgressTracker {
    value: f32,
    last_clock_ms: u32,
    config: ProgressConfig,
}

impl ProgressTracker {
    fn new(config: ProgressConfig) -> Self {
        Self {
            value: config.min,
            last_clock_ms: 0,
            config,
        }
    }

    /// Applies boundary handling and the zero guard, then returns the value
    /// to evaluate with. Looping wraps to the opposite bound; non-looping
    /// reverses direction (ping-pong). Either way a boundary event fires.
    fn clamp_for_eval(&mut self, events: &mut Vec<EmitterEvent>) -> f32 {
        if self.value > self.config.max {
            events.push(EmitterEvent::ProgressBoundary { upper: true });
            if self.config.looping {
                self.value = self.config.min;
            } else {
                self.value = self.config.max;
                self.config.reverse = !self.config.reverse;
            }
        } else if self.value < self.config.min {
            events.push(EmitterEvent::ProgressBoundary { upper: false });
            if self.config.looping {
                self.value = self.config.max;
            } else {
                self.value = self.config.min;
                self.config.reverse = !self.config.reverse;
            }
        }
        // Many authored functions divide by the progress value.
        if self.value == 0.0 {
            self.value = f32::MIN_POSITIVE;
        }
        self.value
    }

    /// Advances the value after one emission.
    fn step(&mut self, clock_ms: u32) {
        let delta = match self.config.mode {
            ProgressMode::ByParticleCount => self.config.time_scale,
            ProgressMode::ByTime => {
                (clock_ms.saturating_sub(self.last_clock_ms)) as f32 * self.config.time_scale
            }
        };
        self.last_clock_ms = clock_ms;
        if self.config.reverse {
            self.value -= delta;
        } else {
            self.value += delta;
        }
    }
}

/// A bound, running particle emitter.
pub struct Emitter {
    config: EmitterConfig,
    species: Vec<Arc<SpeciesTemplate>>,
    store: ParticleStore,
    rng: ChaCha8Rng,

    /// Internal emission clock in milliseconds.
    clock_ms: u32,
    /// Sub-period leftover carried into the next emission call.
    next_particle_ms: u32,
    /// Source position at the end of the previous emission call.
    last_position: Vec3,
    has_last_position: bool,
    /// Anchor point for pinned particles (latest emission end point).
    source_position: Vec3,

    /// Rolled emission budget in milliseconds; 0 means unbounded.
    lifetime_budget_ms: u32,
    dead: bool,
    delete_when_empty: bool,

    progress: ProgressTracker,
    position_fn: Option<Box<dyn PositionFn>>,
    events: Vec<EmitterEvent>,

    /// Per-species flags: emitter override array lengths match the species
    /// key count. Mismatched overrides are disabled, not fatal.
    color_override_ok: Vec<bool>,
    size_override_ok: Vec<bool>,
    override_colors: Vec<Vec4>,
    override_sizes: Vec<f32>,
}

impl Emitter {
    /// Validates the configuration, resolves its species against `library`,
    /// and preallocates the particle store.
    ///
    /// # Errors
    /// Fails only when no species can be bound; see
    /// [`crate::error::BindError`].
    pub fn bind(mut config: EmitterConfig, library: &SpeciesLibrary) -> BindResult<Self> {
        for warning in config.validate() {
            tracing::warn!("emitter config: {warning}");
        }
        let species = library.resolve(&config.species)?;

        if config.blend_style == BlendStyle::Undefined {
            let inferred = if species[0].use_inv_alpha {
                BlendStyle::Normal
            } else {
                BlendStyle::Additive
            };
            if species
                .iter()
                .any(|s| s.use_inv_alpha != species[0].use_inv_alpha)
            {
                tracing::warn!("species disagree on the legacy inverse-alpha flag, using first");
            }
            tracing::warn!(style = ?inferred, "blend style unset, inferred from first species");
            config.blend_style = inferred;
        }
        if config.texture.is_none() {
            let first = species[0].texture.as_deref();
            if species.iter().any(|s| s.texture.as_deref() != first) {
                tracing::warn!("species reference different textures in one emitter");
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed.unwrap_or(DEFAULT_SEED));

        let mut lifetime_budget_ms = config.lifetime_ms;
        if lifetime_budget_ms > 0 && config.lifetime_variance_ms > 0 {
            lifetime_budget_ms +=
                rng.gen_range(-config.lifetime_variance_ms..=config.lifetime_variance_ms);
        }

        // Steady-state live count: the longest-lived particle divided by the
        // fastest emission period, plus headroom.
        let max_life = species
            .iter()
            .map(|s| s.max_lifetime_ms())
            .max()
            .unwrap_or(0);
        let min_period = (config.ejection_period_ms - config.period_variance_ms).max(1);
        let initial_capacity = (max_life / min_period).max(0) as usize + CAPACITY_FUDGE;

        let (color_override_ok, size_override_ok) = override_flags(&config, &species);
        let override_colors = config.colors.iter().map(|&c| Vec4::from(c)).collect();
        let override_sizes = config.sizes.clone();
        let progress = ProgressTracker::new(config.progress.clone());

        Ok(Self {
            config,
            species,
            store: ParticleStore::with_capacity(initial_capacity),
            rng,
            clock_ms: 0,
            next_particle_ms: 0,
            last_position: Vec3::ZERO,
            has_last_position: false,
            source_position: Vec3::ZERO,
            lifetime_budget_ms: lifetime_budget_ms.max(0) as u32,
            dead: false,
            delete_when_empty: false,
            progress,
            position_fn: None,
            events: Vec::new(),
            color_override_ok,
            size_override_ok,
            override_colors,
            override_sizes,
        })
    }

    /// The validated configuration this emitter was bound with.
    #[must_use]
    #[inline]
    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// The bound species templates, in pick order.
    #[must_use]
    #[inline]
    pub fn species(&self) -> &[Arc<SpeciesTemplate>] {
        &self.species
    }

    /// The particle store (read-only; rendering snapshots from here).
    #[must_use]
    #[inline]
    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// Number of live particles.
    #[must_use]
    #[inline]
    pub fn particle_count(&self) -> usize {
        self.store.live_count()
    }

    /// Internal emission clock in milliseconds.
    #[must_use]
    #[inline]
    pub fn clock_ms(&self) -> u32 {
        self.clock_ms
    }

    /// Source position at the end of the latest emission call.
    #[must_use]
    #[inline]
    pub fn last_position(&self) -> Vec3 {
        self.last_position
    }

    /// True once the emitter has shut down; it emits and simulates nothing.
    #[must_use]
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Shuts the emitter down immediately.
    pub fn kill(&mut self) {
        self.dead = true;
    }

    /// Stops accepting emissions and marks the emitter dead once the last
    /// live particle expires.
    pub fn shutdown_when_empty(&mut self) {
        self.delete_when_empty = true;
    }

    /// Installs a procedural position function for subsequent emissions.
    pub fn set_position_fn(&mut self, function: Box<dyn PositionFn>) {
        self.position_fn = Some(function);
    }

    /// Drains queued notifications for the owner.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, EmitterEvent> {
        self.events.drain(..)
    }

    /// Average color of all live particles; zero when empty.
    #[must_use]
    pub fn collective_color(&self) -> Vec4 {
        let count = self.store.live_count();
        if count == 0 {
            return Vec4::ZERO;
        }
        let sum: Vec4 = self.store.live_particles().map(|p| p.color).sum();
        sum / count as f32
    }

    /// Re-resolves the species list against `library`, recomputing override
    /// compatibility and releasing all live particles (their species
    /// indices would dangle across a changed list).
    ///
    /// # Errors
    /// On failure the old species list is kept and a zero-count reload
    /// event is still queued so owners can react.
    pub fn reload(&mut self, library: &SpeciesLibrary) -> BindResult<usize> {
        match library.resolve(&self.config.species) {
            Ok(species) => {
                let (color_ok, size_ok) = override_flags(&self.config, &species);
                self.species = species;
                self.color_override_ok = color_ok;
                self.size_override_ok = size_ok;
                self.store.clear_live();
                let count = self.species.len();
                self.events.push(EmitterEvent::SpeciesReloaded { count });
                Ok(count)
            }
            Err(err) => {
                tracing::warn!(error = %err, "species reload failed, keeping previous set");
                self.events.push(EmitterEvent::SpeciesReloaded { count: 0 });
                Err(err)
            }
        }
    }

    /// Emits particles for a frame during which the source moved from
    /// `start` to `end` along emission axis `axis` with velocity `velocity`,
    /// over `elapsed_ms` milliseconds.
    ///
    /// Emission times are spaced one sampled period apart on the emitter's
    /// internal clock; positions are interpolated between `start` and `end`
    /// by emission time. Sub-period leftover carries into the next call.
    pub fn emit_particles(
        &mut self,
        start: Vec3,
        end: Vec3,
        axis: Vec3,
        velocity: Vec3,
        elapsed_ms: u32,
    ) {
        if self.dead || self.delete_when_empty {
            return;
        }
        let axis = axis.try_normalize().unwrap_or(Vec3::Z);
        let ortho = orthogonal_to(axis);
        let mut current_ms: u32 = 0;

        // Leftover from the previous call comes due first.
        if self.next_particle_ms != 0 {
            if self.next_particle_ms > elapsed_ms {
                self.next_particle_ms -= elapsed_ms;
                self.clock_ms += elapsed_ms;
                self.finish_emission(end);
                return;
            }
            current_ms += self.next_particle_ms;
            self.clock_ms += self.next_particle_ms;
            self.next_particle_ms = 0;
            if self.within_budget() {
                let point = start.lerp(end, current_ms as f32 / elapsed_ms as f32);
                self.spawn_particle(point, axis, ortho, velocity);
            }
        }

        while current_ms < elapsed_ms {
            let period = self.sample_period();
            if current_ms + period > elapsed_ms {
                self.next_particle_ms = current_ms + period - elapsed_ms;
                self.clock_ms += elapsed_ms - current_ms;
                break;
            }
            current_ms += period;
            self.clock_ms += period;
            if !self.within_budget() {
                continue;
            }
            let point = start.lerp(end, current_ms as f32 / elapsed_ms as f32);
            self.spawn_particle(point, axis, ortho, velocity);

            let advance_ms = elapsed_ms - current_ms;
            if !self.config.override_advance && advance_ms != 0 {
                self.advance_newest(advance_ms);
            }
        }

        self.finish_emission(end);
    }

    /// Emits from a stationary (or externally tracked) point.
    ///
    /// With `use_last_position`, the frame's motion is taken from the
    /// previous call's end point, giving interpolated emission for sources
    /// that only report discrete positions.
    pub fn emit_from_point(
        &mut self,
        point: Vec3,
        use_last_position: bool,
        axis: Vec3,
        velocity: Vec3,
        elapsed_ms: u32,
    ) {
        let start = if use_last_position && self.has_last_position {
            self.last_position
        } else {
            point
        };
        self.emit_particles(start, point, axis, velocity, elapsed_ms);
    }

    /// Emits `count` particles at once, scattered through a box of
    /// half-extent `radius` around `center` and ejected outward.
    ///
    /// Burst emission bypasses the period scheduler; the internal clock and
    /// leftover are unchanged.
    pub fn emit_burst(
        &mut self,
        center: Vec3,
        normal: Vec3,
        velocity: Vec3,
        radius: f32,
        count: u32,
    ) {
        if self.dead || self.delete_when_empty || !self.within_budget() {
            return;
        }
        let axis_z = normal.try_normalize().unwrap_or(Vec3::Z);
        let axis_y = orthogonal_to(axis_z);
        let axis_x = axis_z.cross(axis_y).normalize_or_zero();

        for _ in 0..count {
            let mut offset = axis_x * (radius * (1.0 - 2.0 * self.rng.gen::<f32>()));
            offset += axis_y * (radius * (1.0 - 2.0 * self.rng.gen::<f32>()));
            offset += axis_z * (radius * self.rng.gen::<f32>());
            let direction = offset.try_normalize().unwrap_or(axis_z);
            self.spawn_particle(center + offset, direction, axis_z, velocity);
        }
        self.has_last_position = false;
        self.source_position = center;
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Timesteps below 10 microseconds are ignored; timesteps above half a
    /// second are clamped. Expiry runs first, then force integration,
    /// collision response, anchoring, and appearance refresh.
    pub fn advance_time(&mut self, dt: f32, context: &SimulationContext<'_>) {
        if self.dead || dt < MIN_TICK_SECONDS {
            return;
        }
        let dt = dt.min(MAX_TICK_SECONDS);
        let elapsed_ms = (dt * 1000.0) as i32;
        if elapsed_ms == 0 {
            return;
        }

        self.store.retain_live(|p| {
            p.age_ms += elapsed_ms;
            p.age_ms <= p.lifetime_ms
        });

        if self.store.live_count() == 0 {
            if self.delete_when_empty {
                self.dead = true;
            }
            return;
        }

        self.integrate(dt, context);
    }

    fn integrate(&mut self, dt: f32, context: &SimulationContext<'_>) {
        let species = &self.species;
        let config = &self.config;
        let override_colors = &self.override_colors;
        let override_sizes = &self.override_sizes;
        let color_ok = &self.color_override_ok;
        let size_ok = &self.size_override_ok;
        let source = self.source_position;
        let mask = CollisionMask::from_bits(config.collision_mask);

        self.store.for_each_live_mut(|p| {
            let sp = &species[usize::from(p.species)];

            // Anchor attraction rewrites the acceleration accumulator.
            if !config.anchors.is_empty() {
                if let Some(resolver) = context.anchors {
                    p.acc = Vec3::ZERO;
                    for anchor in &config.anchors {
                        if anchor.mode == AttractionMode::None {
                            continue;
                        }
                        let Some(transform) = resolver.resolve(&anchor.target) else {
                            continue;
                        };
                        let target =
                            transform.position + transform.rotation * Vec3::from(anchor.offset);
                        let diff = target - p.pos;
                        let distance = diff.length();
                        if distance <= f32::EPSILON {
                            continue;
                        }
                        let falloff = (config.attraction_range / distance - 1.0).max(0.0);
                        let pull = (diff / distance) * (falloff * anchor.amount);
                        match anchor.mode {
                            AttractionMode::Attract => p.acc += pull,
                            AttractionMode::Repel => p.acc -= pull,
                            AttractionMode::None => {}
                        }
                    }
                }
            }

            let mut accel = p.acc;
            accel -= p.vel * sp.drag_coefficient;
            accel -= context.wind * sp.wind_coefficient;
            accel += GRAVITY * sp.gravity_coefficient;
            p.vel += accel * dt;

            if config.collide_with_world {
                if let Some(world) = context.collision {
                    let destination = p.pos + p.vel * dt;
                    if let Some(hit) = world.cast_ray(p.pos, destination, mask) {
                        // Kill the normal component, keep the tangential one.
                        let normal = hit.normal.normalize_or_zero();
                        let normal_speed = p.vel.dot(normal);
                        p.vel -= normal * (normal_speed * (1.0 + config.restitution));
                    }
                }
            }

            p.pos += p.vel * dt;
            if config.pinned {
                p.pos = source + p.rel_pos;
            }

            let colors = (config.use_emitter_colors && color_ok[usize::from(p.species)])
                .then_some(override_colors.as_slice());
            let sizes = (config.use_emitter_sizes && size_ok[usize::from(p.species)])
                .then_some(override_sizes.as_slice());
            apply_keyed_values(p, sp, colors, sizes);
        });
    }

    /// Samples the next emission period, at least 1 ms.
    fn sample_period(&mut self) -> u32 {
        let base = self.config.ejection_period_ms;
        let variance = self.config.period_variance_ms;
        let period = if variance != 0 {
            base + self.rng.gen_range(-variance..=variance)
        } else {
            base
        };
        period.max(1) as u32
    }

    fn within_budget(&self) -> bool {
        self.lifetime_budget_ms == 0 || self.clock_ms <= self.lifetime_budget_ms
    }

    fn finish_emission(&mut self, end: Vec3) {
        self.last_position = end;
        self.has_last_position = true;
        self.source_position = end;
    }

    /// Creates one particle at `point`, ejected into the cone around `axis`.
    fn spawn_particle(&mut self, point: Vec3, axis: Vec3, ortho: Vec3, source_velocity: Vec3) {
        if self.species.is_empty() {
            return;
        }

        let theta = self
            .rng
            .gen_range(self.config.theta_min..=self.config.theta_max);
        let reference = (self.clock_ms as f32 / 1000.0) * self.config.phi_reference_vel;
        let phi = reference
            + self
                .rng
                .gen_range(-self.config.phi_variance..=self.config.phi_variance);

        let mut ejection_axis = Quat::from_axis_angle(ortho, theta.to_radians()) * axis;
        ejection_axis = Quat::from_axis_angle(axis, phi.to_radians()) * ejection_axis;

        let speed = self.config.ejection_velocity
            + self
                .rng
                .gen_range(-self.config.velocity_variance..=self.config.velocity_variance);

        let species_index = self.rng.gen_range(0..self.species.len());

        let mut offset = ejection_axis * self.config.ejection_offset;
        if let Some(function) = self.position_fn.as_mut() {
            let progress = self.progress.clamp_for_eval(&mut self.events);
            let input = PositionInput {
                progress,
                clock_ms: self.clock_ms,
                point,
            };
            match function.eval(&input) {
                Ok(procedural) => offset = procedural,
                Err(err) => {
                    tracing::warn!(error = %err, "position function failed, using cone position");
                }
            }
            self.progress.step(self.clock_ms);
        }

        let sp = &self.species[species_index];
        let mut lifetime_ms = sp.lifetime_ms;
        if sp.lifetime_variance_ms != 0 {
            lifetime_ms += self
                .rng
                .gen_range(-sp.lifetime_variance_ms..=sp.lifetime_variance_ms);
        }
        let lifetime_ms = lifetime_ms.max(1);
        let spin_speed =
            sp.spin_speed * self.rng.gen_range(sp.spin_random_min..=sp.spin_random_max);
        let vel = ejection_axis * speed + source_velocity * sp.inherited_velocity_factor;
        let acc = vel * sp.constant_acceleration;

        let handle = self.store.acquire();
        if let Some(capacity) = self.store.take_capacity_change() {
            self.events.push(EmitterEvent::CapacityGrown { capacity });
        }
        *self.store.get_mut(handle) = Particle {
            pos: point + offset,
            vel,
            acc,
            orient_dir: ejection_axis,
            rel_pos: offset,
            age_ms: 0,
            lifetime_ms,
            color: Vec4::ONE,
            size: 1.0,
            spin_speed,
            species: species_index as u16,
        };
        self.refresh_appearance(handle);
    }

    /// Advances the newest particle by the frame time remaining after its
    /// emission, retiring it outright if it would not survive that long.
    /// Only drag and gravity apply here; a sub-frame of wind is noise.
    fn advance_newest(&mut self, advance_ms: u32) {
        let Some(handle) = self.store.newest() else {
            return;
        };
        if advance_ms as i32 > self.store.get(handle).lifetime_ms {
            self.store.retire_newest();
            return;
        }
        let species_index = usize::from(self.store.get(handle).species);
        let drag = self.species[species_index].drag_coefficient;
        let gravity = self.species[species_index].gravity_coefficient;
        let dt = advance_ms as f32 / 1000.0;

        let p = self.store.get_mut(handle);
        let accel = p.acc - p.vel * drag + GRAVITY * gravity;
        p.vel += accel * dt;
        p.pos += p.vel * dt;
    }

    fn refresh_appearance(&mut self, handle: ParticleHandle) {
        let species_index = usize::from(self.store.get(handle).species);
        let sp = &self.species[species_index];
        let colors = (self.config.use_emitter_colors && self.color_override_ok[species_index])
            .then_some(self.override_colors.as_slice());
        let sizes = (self.config.use_emitter_sizes && self.size_override_ok[species_index])
            .then_some(self.override_sizes.as_slice());
        let p = &mut self.store;
        apply_keyed_values(p.get_mut(handle), sp, colors, sizes);
    }
}

/// Samples a particle's keyed color and size at its current age.
fn apply_keyed_values(
    p: &mut Particle,
    sp: &SpeciesTemplate,
    color_override: Option<&[Vec4]>,
    size_override: Option<&[f32]>,
) {
    let lifetime = p.lifetime_ms.max(1);
    let t = (p.age_ms as f32 / lifetime as f32).clamp(0.0, 1.0);
    let (color, size) = sp.keys.sample_with(t, color_override, size_override);
    p.color = color;
    p.size = size;
}

/// Per-species override compatibility: an override array only applies where
/// its length matches the species' key count.
fn override_flags(
    config: &EmitterConfig,
    species: &[Arc<SpeciesTemplate>],
) -> (Vec<bool>, Vec<bool>) {
    let mut color_ok = Vec::with_capacity(species.len());
    let mut size_ok = Vec::with_capacity(species.len());
    for sp in species {
        let colors_match = config.colors.len() == sp.keys.len();
        if config.use_emitter_colors && !colors_match {
            tracing::warn!(species = %sp.name, "color override length mismatch, override disabled");
        }
        color_ok.push(colors_match);
        let sizes_match = config.sizes.len() == sp.keys.len();
        if config.use_emitter_sizes && !sizes_match {
            tracing::warn!(species = %sp.name, "size override length mismatch, override disabled");
        }
        size_ok.push(sizes_match);
    }
    (color_ok, size_ok)
}

/// A unit vector perpendicular to `axis`.
fn orthogonal_to(axis: Vec3) -> Vec3 {
    let reference = if axis.z.abs() < 0.9 { Vec3::Z } else { Vec3::Y };
    axis.cross(reference).normalize_or_zero()
}
