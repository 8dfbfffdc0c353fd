//! Emitter configuration.
//!
//! A plain deserializable struct, validated once before bind. Validation
//! never fails: out-of-range values are clamped into the documented legal
//! ranges and reported as warnings so authored content keeps working.

use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How emitted quads are oriented at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationMode {
    /// Camera-facing quads with in-plane spin.
    #[default]
    Billboard,
    /// Quads stretched along each particle's travel (or ejection) direction.
    Oriented,
    /// Quads aligned to a fixed world axis.
    Aligned,
}

/// How a batch blends with the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendStyle {
    /// Not set; inferred at bind from the first species' legacy flag.
    #[default]
    Undefined,
    /// Standard alpha blending.
    Normal,
    /// Additive blending.
    Additive,
    /// Subtractive blending.
    Subtractive,
    /// Premultiplied alpha.
    PremulAlpha,
}

/// Attraction polarity for one anchor term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttractionMode {
    /// Slot disabled.
    #[default]
    None,
    /// Accelerate particles toward the anchor.
    Attract,
    /// Accelerate particles away from the anchor.
    Repel,
}

/// One attraction anchor slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorSettings {
    /// Anchor identifier, resolved each tick through the anchor resolver.
    pub target: String,
    /// Attraction polarity.
    pub mode: AttractionMode,
    /// Acceleration scale.
    pub amount: f32,
    /// Offset from the anchor origin, rotated by the anchor's orientation.
    pub offset: [f32; 3],
}

/// How the progress value advances between emissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// Advance by one per emitted particle.
    #[default]
    ByParticleCount,
    /// Advance by the milliseconds elapsed since the previous emission.
    ByTime,
}

/// Settings for the progress value fed to a position function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Lower progress bound.
    pub min: f32,
    /// Upper progress bound.
    pub max: f32,
    /// Wrap to the opposite bound when a bound is crossed.
    pub looping: bool,
    /// Advance downward instead of upward.
    pub reverse: bool,
    /// Multiplier applied to each advance step.
    pub time_scale: f32,
    /// Advance source.
    pub mode: ProgressMode,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1000.0,
            looping: true,
            reverse: false,
            time_scale: 1.0,
            mode: ProgressMode::ByParticleCount,
        }
    }
}

/// A clamp applied during [`EmitterConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    /// Ejection period below the 1 ms floor.
    #[error("ejection period < 1 ms, clamped to 1")]
    PeriodTooSmall,
    /// Period variance leaves a non-positive minimum period.
    #[error("period variance >= period, clamped to {0} ms")]
    PeriodVarianceTooLarge(i32),
    /// Negative ejection velocity.
    #[error("ejection velocity < 0, clamped to 0")]
    NegativeVelocity,
    /// Negative velocity variance.
    #[error("velocity variance < 0, clamped to 0")]
    NegativeVelocityVariance,
    /// Velocity variance could produce a negative speed.
    #[error("velocity variance > ejection velocity, clamped to {0}")]
    VelocityVarianceTooLarge(f32),
    /// Negative ejection offset.
    #[error("ejection offset < 0, clamped to 0")]
    NegativeOffset,
    /// Theta lower bound below 0 degrees.
    #[error("theta min < 0, clamped to 0")]
    ThetaMinTooSmall,
    /// Theta upper bound above 180 degrees.
    #[error("theta max > 180, clamped to 180")]
    ThetaMaxTooLarge,
    /// Theta bounds inverted.
    #[error("theta min > theta max, clamped to {0}")]
    ThetaRangeInverted(f32),
    /// Phi variance outside [0, 360] degrees.
    #[error("phi variance outside [0, 360], clamped to {0}")]
    PhiVarianceOutOfRange(f32),
    /// Negative softness distance.
    #[error("softness distance < 0, clamped to 0")]
    NegativeSoftnessDistance,
    /// Negative emitter lifetime.
    #[error("lifetime < 0, clamped to 0")]
    NegativeLifetime,
    /// Lifetime variance exceeds the lifetime.
    #[error("lifetime variance > lifetime, clamped to {0} ms")]
    LifetimeVarianceTooLarge(i32),
    /// Ambient factor outside [0, 1].
    #[error("ambient factor outside [0, 1], clamped to {0}")]
    AmbientFactorOutOfRange(f32),
    /// Restitution outside [0, 1].
    #[error("restitution outside [0, 1], clamped to {0}")]
    RestitutionOutOfRange(f32),
    /// Zero-length alignment direction.
    #[error("align direction is zero length, using +Y")]
    AlignDirectionZero,
    /// Progress bounds inverted.
    #[error("progress min > max, swapped")]
    ProgressBoundsInverted,
}

/// Complete emitter configuration.
///
/// Immutable after bind; [`EmitterConfig::validate`] clamps every field into
/// its legal range first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Milliseconds between emissions.
    pub ejection_period_ms: i32,
    /// Period variance in milliseconds (sampled symmetrically).
    pub period_variance_ms: i32,
    /// Base ejection speed.
    pub ejection_velocity: f32,
    /// Ejection speed variance (sampled symmetrically).
    pub velocity_variance: f32,
    /// Distance from the emission point along the ejection axis.
    pub ejection_offset: f32,
    /// Cone angle lower bound, degrees from the emission axis.
    pub theta_min: f32,
    /// Cone angle upper bound, degrees from the emission axis.
    pub theta_max: f32,
    /// Azimuthal sweep rate, degrees per second of emitter clock.
    pub phi_reference_vel: f32,
    /// Azimuthal variance, degrees (sampled symmetrically).
    pub phi_variance: f32,
    /// Emitter lifetime budget in milliseconds; 0 means unbounded.
    pub lifetime_ms: i32,
    /// Lifetime budget variance in milliseconds.
    pub lifetime_variance_ms: i32,
    /// When false, particles emitted mid-frame are advanced to the frame
    /// end so high-rate emitters do not clump.
    pub override_advance: bool,
    /// Quad orientation mode.
    pub orientation: OrientationMode,
    /// In oriented mode, stretch along velocity instead of ejection axis.
    pub orient_on_velocity: bool,
    /// World axis for aligned mode (normalized during validation).
    pub align_direction: [f32; 3],
    /// Depth-sort particles back to front each frame.
    pub sort_particles: bool,
    /// Write quads in reverse draw order.
    pub reverse_order: bool,
    /// Batch blend mode; `Undefined` is inferred at bind.
    pub blend_style: BlendStyle,
    /// Ambient light blend factor, 0 (unlit) to 1 (fully ambient-tinted).
    pub ambient_factor: f32,
    /// Soft-particle fade distance handed through to the renderer.
    pub softness_distance: f32,
    /// Texture override; when set, all species render with this texture.
    pub texture: Option<String>,
    /// Replace species key colors with [`EmitterConfig::colors`].
    pub use_emitter_colors: bool,
    /// Replace species key sizes with [`EmitterConfig::sizes`].
    pub use_emitter_sizes: bool,
    /// Override color keys (lengths must match each species' key count).
    pub colors: Vec<[f32; 4]>,
    /// Override size keys (lengths must match each species' key count).
    pub sizes: Vec<f32>,
    /// Species identifiers to bind, in pick order.
    pub species: Vec<String>,
    /// Attraction falloff range in world units.
    pub attraction_range: f32,
    /// Attraction anchor slots.
    pub anchors: Vec<AnchorSettings>,
    /// Pin particles to the emission source (they move with it).
    pub pinned: bool,
    /// Enable collision ray casts against the collision service.
    pub collide_with_world: bool,
    /// Velocity fraction kept along the surface normal after a bounce.
    pub restitution: f32,
    /// Raw collision mask bits.
    pub collision_mask: u32,
    /// RNG seed; emitters with equal seeds and inputs emit identically.
    pub seed: Option<u64>,
    /// Progress settings for the position function.
    pub progress: ProgressConfig,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            ejection_period_ms: 100,
            period_variance_ms: 0,
            ejection_velocity: 2.0,
            velocity_variance: 1.0,
            ejection_offset: 0.0,
            theta_min: 0.0,
            theta_max: 90.0,
            phi_reference_vel: 0.0,
            phi_variance: 360.0,
            lifetime_ms: 0,
            lifetime_variance_ms: 0,
            override_advance: true,
            orientation: OrientationMode::Billboard,
            orient_on_velocity: true,
            align_direction: [0.0, 1.0, 0.0],
            sort_particles: false,
            reverse_order: false,
            blend_style: BlendStyle::Undefined,
            ambient_factor: 0.0,
            softness_distance: 1.0,
            texture: None,
            use_emitter_colors: false,
            use_emitter_sizes: false,
            colors: Vec::new(),
            sizes: Vec::new(),
            species: Vec::new(),
            attraction_range: 50.0,
            anchors: Vec::new(),
            pinned: false,
            collide_with_world: false,
            restitution: 0.8,
            collision_mask: crate::services::CollisionMask::default().bits(),
            seed: None,
            progress: ProgressConfig::default(),
        }
    }
}

impl EmitterConfig {
    /// Clamps every field into its legal range, returning one warning per
    /// adjustment. Never fails.
    pub fn validate(&mut self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if self.ejection_period_ms < 1 {
            self.ejection_period_ms = 1;
            warnings.push(ValidationWarning::PeriodTooSmall);
        }
        if self.period_variance_ms >= self.ejection_period_ms {
            self.period_variance_ms = self.ejection_period_ms - 1;
            warnings.push(ValidationWarning::PeriodVarianceTooLarge(
                self.period_variance_ms,
            ));
        }
        if self.period_variance_ms < 0 {
            self.period_variance_ms = 0;
        }
        if self.ejection_velocity < 0.0 {
            self.ejection_velocity = 0.0;
            warnings.push(ValidationWarning::NegativeVelocity);
        }
        if self.velocity_variance < 0.0 {
            self.velocity_variance = 0.0;
            warnings.push(ValidationWarning::NegativeVelocityVariance);
        }
        if self.velocity_variance > self.ejection_velocity {
            self.velocity_variance = self.ejection_velocity;
            warnings.push(ValidationWarning::VelocityVarianceTooLarge(
                self.velocity_variance,
            ));
        }
        if self.ejection_offset < 0.0 {
            self.ejection_offset = 0.0;
            warnings.push(ValidationWarning::NegativeOffset);
        }
        if self.theta_min < 0.0 {
            self.theta_min = 0.0;
            warnings.push(ValidationWarning::ThetaMinTooSmall);
        }
        if self.theta_max > 180.0 {
            self.theta_max = 180.0;
            warnings.push(ValidationWarning::ThetaMaxTooLarge);
        }
        if self.theta_min > self.theta_max {
            self.theta_min = self.theta_max;
            warnings.push(ValidationWarning::ThetaRangeInverted(self.theta_min));
        }
        if !(0.0..=360.0).contains(&self.phi_variance) {
            self.phi_variance = self.phi_variance.clamp(0.0, 360.0);
            warnings.push(ValidationWarning::PhiVarianceOutOfRange(self.phi_variance));
        }
        if self.softness_distance < 0.0 {
            self.softness_distance = 0.0;
            warnings.push(ValidationWarning::NegativeSoftnessDistance);
        }
        if self.lifetime_ms < 0 {
            self.lifetime_ms = 0;
            warnings.push(ValidationWarning::NegativeLifetime);
        }
        if self.lifetime_variance_ms < 0 {
            self.lifetime_variance_ms = 0;
        }
        if self.lifetime_variance_ms > self.lifetime_ms {
            self.lifetime_variance_ms = self.lifetime_ms;
            warnings.push(ValidationWarning::LifetimeVarianceTooLarge(
                self.lifetime_variance_ms,
            ));
        }
        if !(0.0..=1.0).contains(&self.ambient_factor) {
            self.ambient_factor = self.ambient_factor.clamp(0.0, 1.0);
            warnings.push(ValidationWarning::AmbientFactorOutOfRange(
                self.ambient_factor,
            ));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            self.restitution = self.restitution.clamp(0.0, 1.0);
            warnings.push(ValidationWarning::RestitutionOutOfRange(self.restitution));
        }

        let axis = Vec3::from(self.align_direction);
        match axis.try_normalize() {
            Some(normalized) => self.align_direction = normalized.to_array(),
            None => {
                self.align_direction = [0.0, 1.0, 0.0];
                warnings.push(ValidationWarning::AlignDirectionZero);
            }
        }

        if self.progress.min > self.progress.max {
            std::mem::swap(&mut self.progress.min, &mut self.progress.max);
            warnings.push(ValidationWarning::ProgressBoundsInverted);
        }

        warnings
    }

    /// Normalized alignment axis for aligned-mode rendering.
    #[must_use]
    #[inline]
    pub fn align_axis(&self) -> Vec3 {
        Vec3::from(self.align_direction)
    }
}

impl FromStr for EmitterConfig {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}
