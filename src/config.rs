// ============================================================================
// EFFECT CONFIG — immutable per-instance parameters
// ============================================================================

use std::path::PathBuf;

use crate::error::EffectError;

/// Multiplier applied to `strength * velocity` when injecting.
pub const INJECTION_SCALE: f32 = 100.0;
/// Upper bound on the radial falloff so a cell under the pointer doesn't blow up.
pub const POWER_CAP: f32 = 10.0;
/// How far (in UV units) one unit of displacement shifts the image lookup.
pub const DISPLACEMENT_SCALE: f32 = 0.02;
/// Decorative time accumulator step per tick (shader-side only).
pub const TIME_STEP: f32 = 0.05;

/// Largest accepted grid: the downlevel `max_texture_dimension_2d`, since the
/// field is uploaded as one N×N texture.
pub const MAX_GRID: usize = 2048;

/// Parameters fixed for the lifetime of one effect instance.  Changing any of
/// them means tearing the instance down and building a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectConfig {
    /// Field resolution N (N×N cells).
    pub grid: usize,
    /// Influence radius as a fraction of the grid size.
    pub mouse: f32,
    /// Injection magnitude multiplier.
    pub strength: f32,
    /// Per-tick decay factor, strictly between 0 and 1.
    pub relaxation: f32,
    /// Source image to warp.
    pub image_src: PathBuf,
    /// Cap on the device pixel ratio used for the drawable size.
    pub max_pixel_ratio: f64,
    /// Start from a noisy field that relaxes to rest.
    pub seed_noise: bool,
    /// Fixed RNG seed for the initial noise; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            grid: 15,
            mouse: 0.1,
            strength: 0.15,
            relaxation: 0.9,
            image_src: PathBuf::new(),
            max_pixel_ratio: 2.0,
            seed_noise: true,
            seed: None,
        }
    }
}

impl EffectConfig {
    pub fn new(image_src: impl Into<PathBuf>) -> Self {
        Self {
            image_src: image_src.into(),
            ..Default::default()
        }
    }

    pub fn with_grid(mut self, grid: usize) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_mouse(mut self, mouse: f32) -> Self {
        self.mouse = mouse;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_relaxation(mut self, relaxation: f32) -> Self {
        self.relaxation = relaxation;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_seed_noise(mut self, on: bool) -> Self {
        self.seed_noise = on;
        self
    }

    /// Check the invariants the integrator relies on.  `relaxation < 1` is
    /// what keeps the field bounded once injection stops.
    pub fn validate(&self) -> Result<(), EffectError> {
        if self.grid == 0 {
            return Err(EffectError::Config("grid must be at least 1".into()));
        }
        if self.grid > MAX_GRID {
            return Err(EffectError::Config(format!(
                "grid must be at most {}, got {}",
                MAX_GRID, self.grid
            )));
        }
        if !(self.relaxation > 0.0 && self.relaxation < 1.0) {
            return Err(EffectError::Config(format!(
                "relaxation must be in (0, 1), got {}",
                self.relaxation
            )));
        }
        if !self.mouse.is_finite() || self.mouse < 0.0 {
            return Err(EffectError::Config(format!(
                "mouse radius must be a non-negative number, got {}",
                self.mouse
            )));
        }
        if !self.strength.is_finite() {
            return Err(EffectError::Config("strength must be finite".into()));
        }
        if !(self.max_pixel_ratio.is_finite() && self.max_pixel_ratio > 0.0) {
            return Err(EffectError::Config(format!(
                "max pixel ratio must be positive, got {}",
                self.max_pixel_ratio
            )));
        }
        Ok(())
    }

    /// Influence radius in grid cells.
    pub fn max_dist(&self) -> f32 {
        self.grid as f32 * self.mouse
    }
}
