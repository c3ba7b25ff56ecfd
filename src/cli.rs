// ============================================================================
// GridWarp CLI — command-line options for the window and headless hosts
// ============================================================================
//
// Usage examples:
//   gridwarp photo.jpg                                   (interactive window)
//   gridwarp photo.jpg --grid 30 --mouse 0.2 --strength 0.3
//   gridwarp photo.jpg --frames 120 --sweep --output warped.png
//   gridwarp photo.jpg --frames 1 --no-noise -o plain.png --width 800 --height 600
//
// Without --frames a window opens.  With --frames the effect renders into an
// offscreen texture and the last frame is written to --output.

use std::path::PathBuf;

use clap::Parser;

use crate::config::EffectConfig;
use crate::error::EffectError;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Interactive grid-distortion warp for a single image.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gridwarp",
    version,
    about = "Pointer-driven grid distortion of an image",
    long_about = "Warps IMAGE through a coarse displacement grid that follows the pointer\n\
                  and relaxes back to rest.\n\n\
                  Window keys:\n  \
                  Esc        quit\n  \
                  R          restart the effect (new field noise)\n  \
                  Up / Down  grow / shrink the grid by one cell and restart"
)]
pub struct CliArgs {
    /// Image file to warp (PNG, JPEG, WEBP, BMP, TGA, ICO, TIFF).
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Field resolution: the grid is GRID × GRID cells.
    #[arg(long, default_value_t = 15, value_name = "N")]
    pub grid: usize,

    /// Pointer influence radius as a fraction of the grid size.
    #[arg(long, default_value_t = 0.1)]
    pub mouse: f32,

    /// Injection strength multiplier.
    #[arg(long, default_value_t = 0.15)]
    pub strength: f32,

    /// Per-tick decay factor, strictly between 0 and 1.
    #[arg(long, default_value_t = 0.9)]
    pub relaxation: f32,

    /// Upper bound on the device pixel ratio used for the render target.
    #[arg(long, default_value_t = 2.0, value_name = "RATIO")]
    pub max_pixel_ratio: f64,

    /// Fixed seed for the initial field noise (random when omitted).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Start from a zero field instead of random noise.
    #[arg(long)]
    pub no_noise: bool,

    /// Window width, or output width in headless mode (logical pixels).
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Window height, or output height in headless mode (logical pixels).
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// GPU adapter preference: "high performance" or "low power".
    #[arg(long, default_value = "high performance", value_name = "PREF")]
    pub gpu: String,

    /// Render this many ticks offscreen instead of opening a window.
    #[arg(long, value_name = "N")]
    pub frames: Option<u32>,

    /// PNG file for the final headless frame.
    #[arg(short, long, value_name = "FILE", default_value = "gridwarp.png")]
    pub output: PathBuf,

    /// Drive a scripted pointer sweep across the image in headless mode.
    #[arg(long)]
    pub sweep: bool,

    /// Echo log lines to stderr as well as the log file.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Headless when a frame count was given.
    pub fn is_headless(&self) -> bool {
        self.frames.is_some()
    }

    /// Build and validate the effect configuration.
    pub fn to_config(&self) -> Result<EffectConfig, EffectError> {
        let mut config = EffectConfig::new(self.image.clone())
            .with_grid(self.grid)
            .with_mouse(self.mouse)
            .with_strength(self.strength)
            .with_relaxation(self.relaxation)
            .with_seed(self.seed)
            .with_seed_noise(!self.no_noise);
        config.max_pixel_ratio = self.max_pixel_ratio;
        config.validate()?;
        Ok(config)
    }

    pub fn validate_host(&self) -> Result<(), EffectError> {
        if self.width == 0 || self.height == 0 {
            return Err(EffectError::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.frames == Some(0) {
            return Err(EffectError::Config("--frames must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("gridwarp").chain(args.iter().copied())).expect("parse")
    }

    #[test]
    fn defaults_match_effect_defaults() {
        let args = parse(&["photo.png"]);
        assert!(!args.is_headless());
        let cfg = args.to_config().expect("config");
        let def = EffectConfig::default();
        assert_eq!(cfg.grid, def.grid);
        assert_eq!(cfg.mouse, def.mouse);
        assert_eq!(cfg.strength, def.strength);
        assert_eq!(cfg.relaxation, def.relaxation);
        assert_eq!(cfg.max_pixel_ratio, def.max_pixel_ratio);
        assert!(cfg.seed_noise);
        assert_eq!(cfg.image_src, PathBuf::from("photo.png"));
        assert_eq!((args.width, args.height), (1280, 720));
    }

    #[test]
    fn headless_flags() {
        let args = parse(&["a.jpg", "--frames", "30", "--sweep", "-o", "out.png", "--no-noise", "--seed", "7"]);
        assert!(args.is_headless());
        assert!(args.sweep);
        assert_eq!(args.output, PathBuf::from("out.png"));
        let cfg = args.to_config().expect("config");
        assert!(!cfg.seed_noise);
        assert_eq!(cfg.seed, Some(7));
    }

    #[test]
    fn image_is_required() {
        assert!(CliArgs::try_parse_from(["gridwarp"]).is_err());
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(parse(&["a.png", "--relaxation", "1.5"]).to_config().is_err());
        assert!(parse(&["a.png", "--grid", "0"]).to_config().is_err());
        assert!(parse(&["a.png", "--width", "0"]).validate_host().is_err());
        assert!(parse(&["a.png", "--frames", "0"]).validate_host().is_err());
        assert!(parse(&["a.png", "--frames", "2"]).validate_host().is_ok());
    }
}
