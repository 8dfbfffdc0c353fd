//! Particle species: shared, read-only per-kind templates.
//!
//! A species owns everything that is identical for every particle of its
//! kind: physics coefficients, the keyframe track, the texture, and the
//! optional texture animation. Templates are resolved by name from a
//! [`SpeciesLibrary`] at bind time and shared between emitters via `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{BindError, KeyframeError};
use crate::keyframe::KeyframeTrack;

/// Maximum accepted species identifier length, in bytes.
pub const MAX_SPECIES_NAME_LEN: usize = 255;

/// Serialized form of a species template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesConfig {
    /// Unique identifier used by emitter configs.
    pub name: String,
    /// Base lifetime in milliseconds.
    pub lifetime_ms: i32,
    /// Lifetime variance in milliseconds (sampled symmetrically).
    pub lifetime_variance_ms: i32,
    /// Velocity damping coefficient.
    pub drag_coefficient: f32,
    /// Wind response coefficient.
    pub wind_coefficient: f32,
    /// Gravity response coefficient.
    pub gravity_coefficient: f32,
    /// Fraction of the emission source velocity inherited at spawn.
    pub inherited_velocity_factor: f32,
    /// Constant acceleration along the initial velocity direction.
    pub constant_acceleration: f32,
    /// Base spin speed in degrees per second.
    pub spin_speed: f32,
    /// Lower bound of the random spin multiplier.
    pub spin_random_min: f32,
    /// Upper bound of the random spin multiplier.
    pub spin_random_max: f32,
    /// Legacy flag: render with inverse-alpha blending.
    pub use_inv_alpha: bool,
    /// Keyframe times (normalized age, 0.0 to 1.0).
    pub times: Vec<f32>,
    /// Per-key RGBA colors.
    pub colors: Vec<[f32; 4]>,
    /// Per-key sizes in world units.
    pub sizes: Vec<f32>,
    /// Texture identifier, if any.
    pub texture: Option<String>,
    /// Animated-texture settings, if any.
    pub animation: Option<AnimationConfig>,
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            lifetime_ms: 1000,
            lifetime_variance_ms: 0,
            drag_coefficient: 0.0,
            wind_coefficient: 1.0,
            gravity_coefficient: 0.0,
            inherited_velocity_factor: 0.0,
            constant_acceleration: 0.0,
            spin_speed: 0.0,
            spin_random_min: 1.0,
            spin_random_max: 1.0,
            use_inv_alpha: false,
            times: vec![0.0, 1.0],
            colors: vec![[1.0, 1.0, 1.0, 1.0], [1.0, 1.0, 1.0, 0.0]],
            sizes: vec![1.0, 1.0],
            texture: None,
            animation: None,
        }
    }
}

/// Animated-texture configuration: a tiling grid plus an explicit frame
/// playback order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// Tile indices in playback order (row-major into the grid).
    pub frames: Vec<u8>,
    /// Number of tile columns in the texture.
    pub tiles_x: u32,
    /// Number of tile rows in the texture.
    pub tiles_y: u32,
    /// Playback rate.
    pub frames_per_sec: f32,
}

/// Precomputed animated-texture data.
///
/// The UV grid holds every tile corner once; frame lookup is two adds and a
/// modulo, with no per-frame float division.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureAnimation {
    frames: Vec<u8>,
    tiles_x: usize,
    frames_per_sec: f32,
    uv_grid: Vec<Vec2>,
}

impl TextureAnimation {
    /// Precomputes the UV grid from a config.
    ///
    /// Returns `None` (with a warning) for degenerate configs: no frames,
    /// a zero-sized grid, or a non-positive playback rate.
    #[must_use]
    pub fn from_config(config: &AnimationConfig) -> Option<Self> {
        if config.frames.is_empty()
            || config.tiles_x == 0
            || config.tiles_y == 0
            || config.frames_per_sec <= 0.0
        {
            tracing::warn!("degenerate texture animation config ignored");
            return None;
        }
        let tiles_x = config.tiles_x as usize;
        let tiles_y = config.tiles_y as usize;
        let tile_count = tiles_x * tiles_y;
        let frames: Vec<u8> = config
            .frames
            .iter()
            .map(|&frame| {
                let clamped = (usize::from(frame)).min(tile_count - 1);
                if clamped != usize::from(frame) {
                    tracing::warn!(frame, "animation frame outside tile grid, clamped");
                }
                clamped as u8
            })
            .collect();

        let mut uv_grid = Vec::with_capacity((tiles_x + 1) * (tiles_y + 1));
        for y in 0..=tiles_y {
            for x in 0..=tiles_x {
                uv_grid.push(Vec2::new(
                    x as f32 / tiles_x as f32,
                    y as f32 / tiles_y as f32,
                ));
            }
        }

        Some(Self {
            frames,
            tiles_x,
            frames_per_sec: config.frames_per_sec,
            uv_grid,
        })
    }

    /// Playback rate in frames per second.
    #[must_use]
    #[inline]
    pub fn frames_per_sec(&self) -> f32 {
        self.frames_per_sec
    }

    /// Returns the four corner UVs for the tile active at `age_ms`, in quad
    /// corner order (top-left, bottom-left, bottom-right, top-right).
    #[must_use]
    pub fn frame_uvs(&self, age_ms: i32) -> [Vec2; 4] {
        let elapsed_frames = (age_ms.max(0) as f32 * (1.0 / 1000.0) * self.frames_per_sec) as usize;
        let tile = usize::from(self.frames[elapsed_frames % self.frames.len()]);
        // The grid has one extra corner column per row.
        let top_left = tile + tile / self.tiles_x;
        let bottom_left = top_left + self.tiles_x + 1;
        [
            self.uv_grid[top_left],
            self.uv_grid[bottom_left],
            self.uv_grid[bottom_left + 1],
            self.uv_grid[top_left + 1],
        ]
    }
}

/// A resolved, immutable species template.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesTemplate {
    /// Unique identifier.
    pub name: String,
    /// Base lifetime in milliseconds (floored at 1).
    pub lifetime_ms: i32,
    /// Lifetime variance in milliseconds.
    pub lifetime_variance_ms: i32,
    /// Velocity damping coefficient.
    pub drag_coefficient: f32,
    /// Wind response coefficient.
    pub wind_coefficient: f32,
    /// Gravity response coefficient.
    pub gravity_coefficient: f32,
    /// Fraction of the emission source velocity inherited at spawn.
    pub inherited_velocity_factor: f32,
    /// Constant acceleration along the initial velocity direction.
    pub constant_acceleration: f32,
    /// Base spin speed in degrees per second.
    pub spin_speed: f32,
    /// Lower bound of the random spin multiplier.
    pub spin_random_min: f32,
    /// Upper bound of the random spin multiplier.
    pub spin_random_max: f32,
    /// Legacy flag: render with inverse-alpha blending.
    pub use_inv_alpha: bool,
    /// Validated keyframe track.
    pub keys: KeyframeTrack,
    /// Texture identifier, if any.
    pub texture: Option<String>,
    /// Precomputed texture animation, if any.
    pub animation: Option<TextureAnimation>,
}

impl SpeciesTemplate {
    /// Builds a template from its serialized form, validating the keyframe
    /// track and clamping out-of-range scalars with warnings.
    ///
    /// # Errors
    /// Returns a [`KeyframeError`] if the key arrays are invalid.
    pub fn from_config(config: &SpeciesConfig) -> Result<Self, KeyframeError> {
        let mut lifetime_ms = config.lifetime_ms;
        if lifetime_ms < 1 {
            tracing::warn!(species = %config.name, "lifetime < 1 ms, clamped to 1");
            lifetime_ms = 1;
        }
        let mut lifetime_variance_ms = config.lifetime_variance_ms.max(0);
        if lifetime_variance_ms >= lifetime_ms {
            tracing::warn!(species = %config.name, "lifetime variance >= lifetime, clamped");
            lifetime_variance_ms = lifetime_ms - 1;
        }
        let mut spin_random_min = config.spin_random_min;
        let mut spin_random_max = config.spin_random_max;
        if spin_random_min > spin_random_max {
            tracing::warn!(species = %config.name, "spin random bounds inverted, swapped");
            std::mem::swap(&mut spin_random_min, &mut spin_random_max);
        }

        let colors = config.colors.iter().map(|&c| Vec4::from(c)).collect();
        let keys = KeyframeTrack::new(config.times.clone(), colors, config.sizes.clone())?;

        Ok(Self {
            name: config.name.clone(),
            lifetime_ms,
            lifetime_variance_ms,
            drag_coefficient: config.drag_coefficient,
            wind_coefficient: config.wind_coefficient,
            gravity_coefficient: config.gravity_coefficient,
            inherited_velocity_factor: config.inherited_velocity_factor,
            constant_acceleration: config.constant_acceleration,
            spin_speed: config.spin_speed,
            spin_random_min,
            spin_random_max,
            use_inv_alpha: config.use_inv_alpha,
            keys,
            texture: config.texture.clone(),
            animation: config.animation.as_ref().and_then(TextureAnimation::from_config),
        })
    }

    /// Worst-case lifetime for a particle of this species.
    #[must_use]
    #[inline]
    pub fn max_lifetime_ms(&self) -> i32 {
        self.lifetime_ms + self.lifetime_variance_ms
    }
}

/// Name-to-template resolution used by emitter bind and reload.
#[derive(Debug, Default)]
pub struct SpeciesLibrary {
    templates: HashMap<String, Arc<SpeciesTemplate>>,
}

impl SpeciesLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a library from serialized species configs.
    ///
    /// # Errors
    /// Returns the first [`KeyframeError`] encountered.
    pub fn from_configs(configs: &[SpeciesConfig]) -> Result<Self, KeyframeError> {
        let mut library = Self::new();
        for config in configs {
            library.insert(SpeciesTemplate::from_config(config)?);
        }
        Ok(library)
    }

    /// Inserts a template, replacing any previous one with the same name.
    pub fn insert(&mut self, template: SpeciesTemplate) {
        self.templates
            .insert(template.name.clone(), Arc::new(template));
    }

    /// Looks up a template by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<SpeciesTemplate>> {
        self.templates.get(name).cloned()
    }

    /// Number of templates in the library.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True if the library holds no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Resolves a list of names to templates.
    ///
    /// Unknown names are skipped with a warning; the bind only fails when
    /// the list is empty, an identifier is unacceptably long, or nothing at
    /// all resolves.
    ///
    /// # Errors
    /// See [`BindError`].
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<SpeciesTemplate>>, BindError> {
        if names.is_empty() {
            return Err(BindError::EmptySpeciesList);
        }
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            if name.len() > MAX_SPECIES_NAME_LEN {
                return Err(BindError::IdentifierTooLong {
                    name: name.chars().take(32).collect(),
                    length: name.len(),
                    max: MAX_SPECIES_NAME_LEN,
                });
            }
            match self.get(name) {
                Some(template) => resolved.push(template),
                None => tracing::warn!(species = %name, "unknown species skipped"),
            }
        }
        if resolved.is_empty() {
            return Err(BindError::NoSpeciesResolved);
        }
        Ok(resolved)
    }
}
