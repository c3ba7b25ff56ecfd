// ============================================================================
// GRID DISTORTION EFFECT — lifecycle, per-frame tick and host callbacks
// ============================================================================
//
// One `GridDistortion` owns the field, the pointer tracker, the viewport and
// (through a `WarpSink`) every GPU resource.  The host drives it:
//
//   new()          Uninitialized, field seeded, no GPU yet
//   initialize()   builds the sink, starts the image load → Running
//   on_frame()     one tick if a frame is pending, re-schedules itself
//   on_pointer_*   overwrite pointer state (last write wins)
//   on_resize()    rebuild the viewport immediately
//   teardown()     cancel frames, drop loader, release sink → Disposed
//
// Disposed is terminal.  Reconfiguration is teardown + a fresh instance.
// ============================================================================

use image::RgbaImage;

use crate::config::{EffectConfig, TIME_STEP};
use crate::error::EffectError;
use crate::field::DisplacementField;
use crate::frame::FrameScheduler;
use crate::gpu::WarpUniforms;
use crate::integrator;
use crate::loader::{self, ImageLoader, LoadResult};
use crate::pointer::{PointerTracker, Region};
use crate::viewport::Viewport;

/// The GPU side of the effect, as seen by the tick loop.
pub trait WarpSink {
    /// Replace the source image texture.  On error the previous texture
    /// stays bound.
    fn set_image(&mut self, image: &RgbaImage) -> Result<(), EffectError>;
    /// Resize the render target and remember the new viewport.
    fn resize(&mut self, viewport: &Viewport);
    /// Copy the whole field into the displacement texture.
    fn upload_field(&mut self, field: &DisplacementField);
    /// Issue the single draw for this tick.
    fn draw(&mut self, uniforms: &WarpUniforms) -> Result<DrawOutcome, EffectError>;
    /// Free every resource still held; returns how many were freed.  Must be
    /// safe to call repeatedly.
    fn release(&mut self) -> usize;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn,
    /// Nothing to draw into this tick (collapsed region, lost surface, ...).
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Running,
    Disposed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageStatus {
    Pending,
    Loaded,
    Failed,
}

pub struct GridDistortion<S: WarpSink> {
    config: EffectConfig,
    state: Lifecycle,
    sink: Option<S>,
    field: DisplacementField,
    pointer: PointerTracker,
    viewport: Viewport,
    scale_factor: f64,
    image_aspect: f32,
    image_status: ImageStatus,
    loader: Option<ImageLoader>,
    frames: FrameScheduler,
    time: f32,
    ticks: u64,
}

impl<S: WarpSink> GridDistortion<S> {
    /// Validate `config` and build the CPU-side state.  No GPU work yet.
    pub fn new(config: EffectConfig, region: Region, scale_factor: f64) -> Result<Self, EffectError> {
        config.validate()?;

        let field = if config.seed_noise {
            DisplacementField::seeded(config.grid, config.seed)
        } else {
            DisplacementField::new(config.grid)
        };
        let image_aspect = 1.0;
        let viewport = Viewport::compute(
            region.width,
            region.height,
            scale_factor,
            config.max_pixel_ratio,
            image_aspect,
        );

        Ok(Self {
            config,
            state: Lifecycle::Uninitialized,
            sink: None,
            field,
            pointer: PointerTracker::new(region),
            viewport,
            scale_factor,
            image_aspect,
            image_status: ImageStatus::Pending,
            loader: None,
            frames: FrameScheduler::new(),
            time: 0.0,
            ticks: 0,
        })
    }

    /// Build the GPU side with `create` and start loading the image.
    ///
    /// On failure the instance is torn down (whatever `create` allocated was
    /// already released when its partial state dropped) and the error is
    /// returned to the host.
    pub fn initialize<F>(&mut self, create: F) -> Result<(), EffectError>
    where
        F: FnOnce(&Viewport, &EffectConfig) -> Result<S, EffectError>,
    {
        match self.state {
            Lifecycle::Uninitialized => {}
            Lifecycle::Running => return Ok(()),
            Lifecycle::Disposed => {
                return Err(EffectError::ResourceInit("effect instance already disposed".into()));
            }
        }

        match create(&self.viewport, &self.config) {
            Ok(sink) => {
                self.sink = Some(sink);
                self.state = Lifecycle::Running;
                self.loader = Some(ImageLoader::spawn(&self.config.image_src));
                self.frames.schedule();
                crate::log_info!(
                    "Effect running: grid {}, radius {}, strength {}, relaxation {}",
                    self.config.grid,
                    self.config.mouse,
                    self.config.strength,
                    self.config.relaxation
                );
                Ok(())
            }
            Err(e) => {
                crate::log_err!("Effect init failed: {}", e);
                self.teardown();
                Err(e)
            }
        }
    }

    /// Host per-frame callback.  Runs one tick when the effect is running and
    /// a frame was requested, then requests the next one.  Returns whether a
    /// tick ran.
    pub fn on_frame(&mut self) -> Result<bool, EffectError> {
        if self.state != Lifecycle::Running || self.frames.take().is_none() {
            return Ok(false);
        }
        self.tick()?;
        self.frames.schedule();
        Ok(true)
    }

    /// Whether the host should deliver another frame callback.
    pub fn wants_frame(&self) -> bool {
        self.state == Lifecycle::Running && self.frames.is_pending()
    }

    fn tick(&mut self) -> Result<DrawOutcome, EffectError> {
        self.time += TIME_STEP;
        self.ticks += 1;
        self.poll_loader();

        let pointer = self.pointer.state();
        integrator::step(&mut self.field, &pointer, &self.config);

        let Some(sink) = self.sink.as_mut() else {
            return Ok(DrawOutcome::Skipped);
        };
        sink.upload_field(&self.field);
        self.field.mark_clean();

        let uniforms = WarpUniforms::new(&self.viewport, self.time, self.config.grid);
        match sink.draw(&uniforms) {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_fatal() => {
                crate::log_err!("Fatal frame error on tick {}: {}", self.ticks, e);
                self.teardown();
                Err(e)
            }
            Err(e) => {
                // Dropped frame; the next tick simply tries again.
                crate::log_warn!("Frame {} skipped: {}", self.ticks, e);
                Ok(DrawOutcome::Skipped)
            }
        }
    }

    fn poll_loader(&mut self) {
        let Some(result) = self.loader.as_ref().and_then(ImageLoader::poll) else {
            return;
        };
        self.loader = None;
        self.apply_load_result(result);
    }

    /// Block until the pending image load (if any) reports.  Headless hosts
    /// use this so the first rendered frame already has the image.
    pub fn wait_for_image(&mut self) {
        if let Some(loader) = self.loader.take() {
            let result = loader.wait();
            self.apply_load_result(result);
        }
    }

    fn apply_load_result(&mut self, result: LoadResult) {
        match result {
            LoadResult::Loaded { image, path } => {
                crate::log_info!(
                    "Loaded {} ({}x{})",
                    path.display(),
                    image.width(),
                    image.height()
                );
                self.on_image_loaded(&image);
            }
            LoadResult::Failed(e) => self.on_image_failed(&e),
        }
    }

    /// Image-loaded callback: upload it, record its aspect, refit the mesh.
    pub fn on_image_loaded(&mut self, image: &RgbaImage) {
        if self.state != Lifecycle::Running {
            return;
        }
        if let Some(sink) = self.sink.as_mut()
            && let Err(e) = sink.set_image(image)
        {
            self.on_image_failed(&e);
            return;
        }
        self.image_aspect = loader::aspect_of(image);
        self.image_status = ImageStatus::Loaded;
        self.recompute_viewport();
    }

    /// The image could not be loaded.  Rendering continues on a blank image.
    pub fn on_image_failed(&mut self, err: &EffectError) {
        crate::log_warn!("{}; continuing without an image", err);
        self.image_status = ImageStatus::Failed;
    }

    pub fn on_pointer_move(&mut self, raw_x: f64, raw_y: f64) {
        if self.state != Lifecycle::Disposed {
            self.pointer.on_pointer_move(raw_x, raw_y);
        }
    }

    pub fn on_pointer_leave(&mut self) {
        if self.state != Lifecycle::Disposed {
            self.pointer.on_pointer_leave();
        }
    }

    /// The drawable region changed size (or moved, or the pixel ratio
    /// changed).  Takes effect immediately, independent of the tick.
    pub fn on_resize(&mut self, region: Region, scale_factor: f64) {
        if self.state == Lifecycle::Disposed {
            return;
        }
        self.pointer.set_region(region);
        self.scale_factor = scale_factor;
        self.recompute_viewport();
    }

    fn recompute_viewport(&mut self) {
        let region = self.pointer.region();
        self.viewport = Viewport::compute(
            region.width,
            region.height,
            self.scale_factor,
            self.config.max_pixel_ratio,
            self.image_aspect,
        );
        if let Some(sink) = self.sink.as_mut() {
            sink.resize(&self.viewport);
        }
    }

    /// Release everything and enter `Disposed`.  Safe at any point and any
    /// number of times; returns how many GPU resources this call freed.
    pub fn teardown(&mut self) -> usize {
        if self.state == Lifecycle::Disposed {
            return 0;
        }
        self.frames.cancel();
        // Disconnects the channel; a late decode result is discarded.
        self.loader = None;
        let freed = self.sink.take().map(|mut s| s.release()).unwrap_or(0);
        if self.state == Lifecycle::Running {
            crate::log_info!("Effect disposed after {} tick(s)", self.ticks);
        }
        self.state = Lifecycle::Disposed;
        freed
    }

    /// Tear this instance down and build a new one with `config` on the same
    /// region.
    pub fn reconfigure<F>(mut self, config: EffectConfig, create: F) -> Result<Self, EffectError>
    where
        F: FnOnce(&Viewport, &EffectConfig) -> Result<S, EffectError>,
    {
        let region = self.pointer.region();
        let scale_factor = self.scale_factor;
        self.teardown();
        let mut next = Self::new(config, region, scale_factor)?;
        next.initialize(create)?;
        Ok(next)
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    pub fn field(&self) -> &DisplacementField {
        &self.field
    }

    pub fn pointer(&self) -> &PointerTracker {
        &self.pointer
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn image_status(&self) -> ImageStatus {
        self.image_status
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }
}

impl<S: WarpSink> Drop for GridDistortion<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    /// Everything the fake sink saw, shared with the test after the sink is gone.
    #[derive(Default)]
    struct Journal {
        uploads: usize,
        draws: usize,
        resizes: Vec<Viewport>,
        images: Vec<(u32, u32)>,
        released: usize,
        release_calls: usize,
        last_uniforms: Option<WarpUniforms>,
    }

    struct FakeSink {
        journal: Rc<RefCell<Journal>>,
        held: usize,
        max_image_dim: u32,
        fail_draw: Option<fn() -> EffectError>,
    }

    impl WarpSink for FakeSink {
        fn set_image(&mut self, image: &RgbaImage) -> Result<(), EffectError> {
            assert!(self.held > 0, "image set on released sink");
            if image.width() > self.max_image_dim || image.height() > self.max_image_dim {
                return Err(EffectError::AssetLoad("image too large".into()));
            }
            self.journal.borrow_mut().images.push(image.dimensions());
            Ok(())
        }

        fn resize(&mut self, viewport: &Viewport) {
            self.journal.borrow_mut().resizes.push(*viewport);
        }

        fn upload_field(&mut self, _field: &DisplacementField) {
            assert!(self.held > 0, "upload on released sink");
            self.journal.borrow_mut().uploads += 1;
        }

        fn draw(&mut self, uniforms: &WarpUniforms) -> Result<DrawOutcome, EffectError> {
            assert!(self.held > 0, "draw on released sink");
            if let Some(fail) = self.fail_draw {
                return Err(fail());
            }
            let mut j = self.journal.borrow_mut();
            j.draws += 1;
            j.last_uniforms = Some(*uniforms);
            Ok(DrawOutcome::Drawn)
        }

        fn release(&mut self) -> usize {
            let freed = std::mem::take(&mut self.held);
            let mut j = self.journal.borrow_mut();
            j.release_calls += 1;
            j.released += freed;
            freed
        }
    }

    fn config() -> EffectConfig {
        EffectConfig::new(PathBuf::from("/nonexistent/warp-source.png"))
            .with_grid(10)
            .with_seed(Some(1))
    }

    fn effect() -> GridDistortion<FakeSink> {
        GridDistortion::new(config(), Region::new(1600.0, 900.0), 1.0).expect("valid config")
    }

    fn fake(journal: &Rc<RefCell<Journal>>) -> impl FnOnce(&Viewport, &EffectConfig) -> Result<FakeSink, EffectError> {
        let journal = journal.clone();
        move |_, _| {
            Ok(FakeSink {
                journal,
                held: 6,
                max_image_dim: 4096,
                fail_draw: None,
            })
        }
    }

    #[test]
    fn starts_uninitialized_and_runs_after_init() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        assert_eq!(fx.state(), Lifecycle::Uninitialized);
        assert!(!fx.wants_frame());
        assert_eq!(fx.on_frame().ok(), Some(false));

        fx.initialize(fake(&journal)).expect("init");
        assert_eq!(fx.state(), Lifecycle::Running);
        assert!(fx.wants_frame());
    }

    #[test]
    fn each_frame_uploads_and_draws_once() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        fx.initialize(fake(&journal)).expect("init");
        for _ in 0..5 {
            assert_eq!(fx.on_frame().ok(), Some(true));
        }
        let j = journal.borrow();
        assert_eq!(j.uploads, 5);
        assert_eq!(j.draws, 5);
        assert!(!fx.field().is_dirty());
        assert!((fx.time() - 5.0 * TIME_STEP).abs() < 1e-6);
        let u = j.last_uniforms.expect("uniforms");
        assert_eq!(u.grid, 10.0);
    }

    #[test]
    fn frame_without_pending_request_does_nothing() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        fx.initialize(fake(&journal)).expect("init");
        fx.frames.take();
        assert_eq!(fx.on_frame().ok(), Some(false));
        assert_eq!(journal.borrow().draws, 0);
    }

    #[test]
    fn teardown_twice_releases_once() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        fx.initialize(fake(&journal)).expect("init");
        fx.on_frame().expect("tick");

        assert_eq!(fx.teardown(), 6);
        assert_eq!(fx.teardown(), 0);
        drop(fx);

        let j = journal.borrow();
        assert_eq!(j.released, 6);
        assert_eq!(j.release_calls, 1);
    }

    #[test]
    fn teardown_before_init_is_safe_and_terminal() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        assert_eq!(fx.teardown(), 0);
        assert_eq!(fx.state(), Lifecycle::Disposed);
        assert!(fx.initialize(fake(&journal)).is_err());
        assert_eq!(journal.borrow().release_calls, 0);
    }

    #[test]
    fn pending_frame_cancelled_by_teardown() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        fx.initialize(fake(&journal)).expect("init");
        assert!(fx.wants_frame());
        fx.teardown();
        assert!(!fx.wants_frame());
        // A redraw that was already queued by the host arrives late.
        assert_eq!(fx.on_frame().ok(), Some(false));
        assert_eq!(journal.borrow().draws, 0);
    }

    #[test]
    fn drop_releases_resources() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        {
            let mut fx = effect();
            fx.initialize(fake(&journal)).expect("init");
        }
        assert_eq!(journal.borrow().released, 6);
    }

    #[test]
    fn init_failure_disposes_instance() {
        let mut fx = effect();
        let err = fx
            .initialize(|_, _| Err(EffectError::ResourceInit("no adapter".into())))
            .unwrap_err();
        assert!(matches!(err, EffectError::ResourceInit(_)));
        assert_eq!(fx.state(), Lifecycle::Disposed);
        assert_eq!(fx.on_frame().ok(), Some(false));
    }

    #[test]
    fn fatal_draw_error_tears_down() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        let j2 = journal.clone();
        fx.initialize(move |_, _| {
            Ok(FakeSink {
                journal: j2,
                held: 6,
                max_image_dim: 4096,
                fail_draw: Some(|| EffectError::Frame("out of memory".into())),
            })
        })
        .expect("init");
        assert!(fx.on_frame().is_err());
        assert_eq!(fx.state(), Lifecycle::Disposed);
        assert_eq!(journal.borrow().released, 6);
    }

    #[test]
    fn non_fatal_draw_error_keeps_running() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        let j2 = journal.clone();
        fx.initialize(move |_, _| {
            Ok(FakeSink {
                journal: j2,
                held: 6,
                max_image_dim: 4096,
                fail_draw: Some(|| EffectError::AssetLoad("texture gone".into())),
            })
        })
        .expect("init");
        assert_eq!(fx.on_frame().ok(), Some(true));
        assert_eq!(fx.state(), Lifecycle::Running);
        assert!(fx.wants_frame());
    }

    #[test]
    fn pointer_drives_injection_through_ticks() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let cfg = config().with_seed_noise(false);
        let mut fx: GridDistortion<FakeSink> =
            GridDistortion::new(cfg, Region::new(100.0, 100.0), 1.0).expect("config");
        fx.initialize(fake(&journal)).expect("init");

        fx.on_pointer_move(50.0, 50.0);
        fx.on_pointer_move(60.0, 50.0);
        fx.on_frame().expect("tick");
        assert!(fx.field().get(6, 5).0 > 0.0);

        // After leaving, the field only decays.
        fx.on_pointer_leave();
        let before = fx.field().max_magnitude();
        fx.on_frame().expect("tick");
        assert!(fx.field().max_magnitude() < before);
    }

    #[test]
    fn image_load_refits_viewport() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        fx.initialize(fake(&journal)).expect("init");
        // The configured path does not exist; feed the callback directly.
        fx.wait_for_image();
        assert_eq!(fx.image_status(), ImageStatus::Failed);
        assert_eq!(fx.viewport().image_aspect, 1.0);

        let img = RgbaImage::new(400, 300);
        fx.on_image_loaded(&img);
        assert_eq!(fx.image_status(), ImageStatus::Loaded);
        let vp = *fx.viewport();
        assert!((vp.cover_scale - 1.3333).abs() < 1e-3);
        assert!((vp.mesh_scale[0] - 1.7778).abs() < 1e-3);

        let j = journal.borrow();
        assert_eq!(j.images, vec![(400, 300)]);
        assert_eq!(j.resizes.last().copied(), Some(vp));
    }

    #[test]
    fn rejected_image_counts_as_failure() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        let j2 = journal.clone();
        fx.initialize(move |_, _| {
            Ok(FakeSink {
                journal: j2,
                held: 6,
                max_image_dim: 100,
                fail_draw: None,
            })
        })
        .expect("init");
        let before = *fx.viewport();

        fx.on_image_loaded(&RgbaImage::new(400, 300));
        assert_eq!(fx.image_status(), ImageStatus::Failed);
        assert_eq!(*fx.viewport(), before);
        assert_eq!(fx.viewport().image_aspect, 1.0);
        let j = journal.borrow();
        assert!(j.images.is_empty());
        assert!(j.resizes.is_empty());
        drop(j);

        // Still running on the placeholder.
        assert_eq!(fx.on_frame().ok(), Some(true));
    }

    #[test]
    fn resize_recomputes_immediately() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        fx.initialize(fake(&journal)).expect("init");
        fx.on_resize(Region::new(500.0, 1000.0), 3.0);
        let vp = *fx.viewport();
        assert_eq!(vp.pixel_ratio, 2.0);
        assert_eq!((vp.pixel_width, vp.pixel_height), (1000, 2000));
        assert_eq!(journal.borrow().resizes.len(), 1);

        // Pointer normalization follows the new region.
        fx.on_pointer_move(250.0, 500.0);
        assert!((fx.pointer().state().x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn events_after_dispose_are_ignored() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        fx.initialize(fake(&journal)).expect("init");
        fx.teardown();
        fx.on_pointer_move(10.0, 10.0);
        fx.on_resize(Region::new(10.0, 10.0), 1.0);
        fx.on_image_loaded(&RgbaImage::new(2, 1));
        let j = journal.borrow();
        assert!(j.resizes.is_empty());
        assert!(j.images.is_empty());
    }

    #[test]
    fn reconfigure_replaces_instance() {
        let first = Rc::new(RefCell::new(Journal::default()));
        let second = Rc::new(RefCell::new(Journal::default()));
        let mut fx = effect();
        fx.initialize(fake(&first)).expect("init");

        let next = fx.reconfigure(config().with_grid(12), fake(&second)).expect("reconfigure");
        assert_eq!(first.borrow().released, 6);
        assert_eq!(next.state(), Lifecycle::Running);
        assert_eq!(next.field().size(), 12);
        assert_eq!(next.pointer().region(), Region::new(1600.0, 900.0));
        assert_eq!(second.borrow().released, 0);
    }

    #[test]
    fn invalid_config_rejected_up_front() {
        let bad = config().with_relaxation(1.0);
        let result: Result<GridDistortion<FakeSink>, _> = GridDistortion::new(bad, Region::new(10.0, 10.0), 1.0);
        assert!(matches!(result, Err(EffectError::Config(_))));
    }
}
