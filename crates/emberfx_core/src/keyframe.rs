//! Piecewise-linear keyframe interpolation over normalized particle age.
//!
//! A [`KeyframeTrack`] is validated once at construction; sampling is a pure
//! function with no allocation, suitable for the per-particle hot path.

use glam::Vec4;

use crate::error::KeyframeError;

/// A validated piecewise-linear track of (time, color, size) control points.
///
/// Times are normalized age fractions: non-decreasing, starting at 0.0 and
/// ending at 1.0. Color and size arrays always have the same length as the
/// time array.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack {
    times: Vec<f32>,
    colors: Vec<Vec4>,
    sizes: Vec<f32>,
}

impl KeyframeTrack {
    /// Builds a track, validating key counts and time monotonicity.
    ///
    /// # Errors
    /// Returns a [`KeyframeError`] if fewer than two keys are given, the
    /// arrays disagree on length, or the times are not a non-decreasing
    /// sequence from 0.0 to 1.0.
    pub fn new(times: Vec<f32>, colors: Vec<Vec4>, sizes: Vec<f32>) -> Result<Self, KeyframeError> {
        if times.len() < 2 {
            return Err(KeyframeError::TooFewKeys(times.len()));
        }
        if times.len() != colors.len() || times.len() != sizes.len() {
            return Err(KeyframeError::MismatchedLengths {
                times: times.len(),
                colors: colors.len(),
                sizes: sizes.len(),
            });
        }
        if times[0] != 0.0 {
            return Err(KeyframeError::BadStart(times[0]));
        }
        let last = times[times.len() - 1];
        if last != 1.0 {
            return Err(KeyframeError::BadEnd(last));
        }
        for i in 1..times.len() {
            if times[i] < times[i - 1] {
                return Err(KeyframeError::NotMonotonic { index: i });
            }
        }
        Ok(Self { times, colors, sizes })
    }

    /// Number of keys in the track.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Always false; a constructed track holds at least two keys.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Normalized key times.
    #[must_use]
    #[inline]
    pub fn times(&self) -> &[f32] {
        &self.times
    }

    /// Per-key colors.
    #[must_use]
    #[inline]
    pub fn colors(&self) -> &[Vec4] {
        &self.colors
    }

    /// Per-key sizes.
    #[must_use]
    #[inline]
    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    /// Finds the active segment for `t`: the first key with time >= `t`
    /// (never index 0) and the local interpolation fraction within it.
    ///
    /// Ages at or past the final time always resolve to the last key, even
    /// when earlier keys share time 1.0.
    fn segment(&self, t: f32) -> (usize, f32) {
        let mut upper = self.times.len() - 1;
        if t >= self.times[upper] {
            return (upper, 1.0);
        }
        for (i, &key_time) in self.times.iter().enumerate().skip(1) {
            if key_time >= t {
                upper = i;
                break;
            }
        }
        let span = self.times[upper] - self.times[upper - 1];
        let fraction = if span > f32::EPSILON {
            (t - self.times[upper - 1]) / span
        } else {
            1.0
        };
        (upper, fraction)
    }

    /// Samples color and size at normalized age `t` (clamped to [0, 1]).
    #[must_use]
    pub fn sample(&self, t: f32) -> (Vec4, f32) {
        self.sample_with(t, None, None)
    }

    /// Samples at `t`, substituting override value arrays where provided.
    ///
    /// Overrides must have the same length as the track; callers verify that
    /// once at bind time rather than per sample.
    #[must_use]
    pub fn sample_with(
        &self,
        t: f32,
        color_override: Option<&[Vec4]>,
        size_override: Option<&[f32]>,
    ) -> (Vec4, f32) {
        let t = t.clamp(0.0, 1.0);
        let (upper, fraction) = self.segment(t);
        let colors = color_override.unwrap_or(&self.colors);
        let sizes = size_override.unwrap_or(&self.sizes);
        let color = colors[upper - 1].lerp(colors[upper], fraction);
        let size = sizes[upper - 1] + (sizes[upper] - sizes[upper - 1]) * fraction;
        (color, size)
    }
}
