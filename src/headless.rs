// ============================================================================
// HEADLESS HOST — render N ticks offscreen and write the last frame as PNG
// ============================================================================
//
// Same effect, same pipeline as the window host, but the render target is an
// offscreen texture and the frame callback is a plain loop.  With `sweep`
// enabled a scripted pointer crosses the image so the output actually shows
// displacement.

use std::f64::consts::TAU;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::EffectConfig;
use crate::effect::GridDistortion;
use crate::error::EffectError;
use crate::gpu::WarpRenderer;
use crate::pointer::Region;

/// Options that only the headless host uses.
#[derive(Clone, Debug)]
pub struct HeadlessOptions {
    pub width: u32,
    pub height: u32,
    pub frames: u32,
    pub sweep: bool,
    pub output: PathBuf,
    pub gpu: String,
}

/// What a headless run produced.
#[derive(Clone, Debug)]
pub struct HeadlessReport {
    pub adapter: String,
    pub ticks: u64,
    pub frames_drawn: u64,
    pub output: PathBuf,
    pub elapsed_ms: f64,
}

/// Pointer position (region pixels, top-left origin) for tick `k` of a
/// `frames`-tick sweep: left to right across the middle 80%, with a
/// vertical swing of a quarter of the height.
pub fn sweep_position(k: u32, frames: u32, region: Region) -> (f64, f64) {
    let t = if frames <= 1 {
        0.5
    } else {
        k as f64 / (frames - 1) as f64
    };
    let x = region.left + region.width * (0.1 + 0.8 * t);
    let y = region.top + region.height * (0.5 + 0.25 * (TAU * t).sin());
    (x, y)
}

pub fn run(config: EffectConfig, opts: &HeadlessOptions) -> Result<HeadlessReport, EffectError> {
    let start = Instant::now();
    let region = Region::new(opts.width as f64, opts.height as f64);

    let mut effect: GridDistortion<WarpRenderer> = GridDistortion::new(config, region, 1.0)?;
    effect.initialize(|viewport, cfg| WarpRenderer::offscreen(viewport, cfg.grid, &opts.gpu))?;

    let adapter = effect
        .sink()
        .map(|r| r.adapter_name().to_string())
        .unwrap_or_default();
    crate::log_info!(
        "Headless run: {} tick(s) at {}x{} on {}",
        opts.frames,
        opts.width,
        opts.height,
        adapter
    );

    // Decode up front so every rendered tick sees the image.
    effect.wait_for_image();

    for k in 0..opts.frames {
        if opts.sweep {
            let (x, y) = sweep_position(k, opts.frames, region);
            effect.on_pointer_move(x, y);
        }
        effect.on_frame()?;
    }

    let frame = effect
        .sink()
        .ok_or_else(|| EffectError::Frame("renderer released before readback".into()))?
        .read_frame()?;
    save_png(&frame, &opts.output)?;

    let frames_drawn = effect.sink().map(WarpRenderer::frames_drawn).unwrap_or(0);
    let ticks = effect.ticks();
    effect.teardown();

    Ok(HeadlessReport {
        adapter,
        ticks,
        frames_drawn,
        output: opts.output.clone(),
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    })
}

fn save_png(frame: &image::RgbaImage, path: &Path) -> Result<(), EffectError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| EffectError::Frame(format!("could not create '{}': {}", parent.display(), e)))?;
    }
    frame
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| EffectError::Frame(format!("could not write '{}': {}", path.display(), e)))
}
