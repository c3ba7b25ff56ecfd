// ============================================================================
// WINDOW HOST — winit window + wgpu surface driving one GridDistortion
// ============================================================================
//
// Event mapping:
//   CursorMoved        → on_pointer_move (physical px → logical px)
//   CursorLeft         → on_pointer_leave
//   Resized / scale    → on_resize
//   RedrawRequested    → on_frame
//   AboutToWait        → request_redraw while the effect wants frames
//   Esc / close        → teardown + exit
//   R, Up, Down        → reconfigure (teardown + fresh instance)

use std::sync::Arc;

use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use crate::config::{EffectConfig, MAX_GRID};
use crate::effect::{GridDistortion, Lifecycle};
use crate::error::EffectError;
use crate::gpu::WarpRenderer;
use crate::pointer::Region;

/// Window size and adapter choice for the interactive host.
#[derive(Clone, Debug)]
pub struct WindowOptions {
    pub width: u32,
    pub height: u32,
    pub gpu: String,
}

pub struct WarpApp {
    window: Arc<Window>,
    effect: Option<GridDistortion<WarpRenderer>>,
    config: EffectConfig,
    gpu: String,
    scale_factor: f64,
    /// First fatal error; reported after the event loop returns.
    failure: Option<EffectError>,
}

/// Logical region covered by a window of `size` physical pixels.
fn logical_region(size: PhysicalSize<u32>, scale_factor: f64) -> Region {
    let scale = if scale_factor > 0.0 { scale_factor } else { 1.0 };
    Region::new(size.width as f64 / scale, size.height as f64 / scale)
}

fn window_title(config: &EffectConfig) -> String {
    let name = config
        .image_src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("GridWarp - {} (grid {})", name, config.grid)
}

/// Next config for a grid change of `delta` cells, or `None` when the grid
/// would leave `1..=MAX_GRID`.
fn regrid(config: &EffectConfig, delta: isize) -> Option<EffectConfig> {
    let grid = config.grid.checked_add_signed(delta).filter(|g| (1..=MAX_GRID).contains(g))?;
    Some(config.clone().with_grid(grid))
}

impl WarpApp {
    fn new(
        event_loop: &EventLoop<()>,
        config: EffectConfig,
        opts: &WindowOptions,
    ) -> Result<Self, EffectError> {
        let window = WindowBuilder::new()
            .with_title(window_title(&config))
            .with_inner_size(LogicalSize::new(opts.width as f64, opts.height as f64))
            .with_min_inner_size(LogicalSize::new(64.0, 64.0))
            .build(event_loop)
            .map_err(|e| EffectError::ResourceInit(format!("window: {}", e)))?;
        let window = Arc::new(window);

        let scale_factor = window.scale_factor();
        let region = logical_region(window.inner_size(), scale_factor);

        let mut app = Self {
            window,
            effect: None,
            config: config.clone(),
            gpu: opts.gpu.clone(),
            scale_factor,
            failure: None,
        };

        let mut effect = GridDistortion::new(config, region, scale_factor)?;
        let window = app.window.clone();
        let gpu = app.gpu.clone();
        effect.initialize(move |viewport, cfg| WarpRenderer::for_window(window, viewport, cfg.grid, &gpu))?;
        if let Some(renderer) = effect.sink() {
            crate::log_info!("Window host on adapter: {}", renderer.adapter_name());
        }
        app.effect = Some(effect);
        Ok(app)
    }

    fn handle_event(&mut self, event: Event<()>, elwt: &EventLoopWindowTarget<()>) {
        match event {
            Event::WindowEvent { window_id, event } if window_id == self.window.id() => {
                self.handle_window_event(event, elwt);
            }
            Event::AboutToWait => {
                if self.effect.as_ref().is_some_and(GridDistortion::wants_frame) {
                    self.window.request_redraw();
                }
            }
            Event::LoopExiting => self.shutdown(),
            _ => {}
        }
    }

    fn handle_window_event(&mut self, event: WindowEvent, elwt: &EventLoopWindowTarget<()>) {
        match event {
            WindowEvent::CloseRequested => {
                self.shutdown();
                elwt.exit();
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(effect) = self.effect.as_mut() {
                    effect.on_pointer_move(position.x / self.scale_factor, position.y / self.scale_factor);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                if let Some(effect) = self.effect.as_mut() {
                    effect.on_pointer_leave();
                }
            }
            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = scale_factor;
                self.resize(self.window.inner_size());
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(key_code, elwt),
            WindowEvent::RedrawRequested => self.redraw(elwt),
            _ => {}
        }
    }

    fn handle_key(&mut self, key_code: KeyCode, elwt: &EventLoopWindowTarget<()>) {
        let next = match key_code {
            KeyCode::Escape => {
                self.shutdown();
                elwt.exit();
                return;
            }
            KeyCode::KeyR => Some(self.config.clone()),
            KeyCode::ArrowUp => regrid(&self.config, 1),
            KeyCode::ArrowDown => regrid(&self.config, -1),
            _ => None,
        };
        if let Some(config) = next {
            self.restart(config, elwt);
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        let region = logical_region(size, self.scale_factor);
        if let Some(effect) = self.effect.as_mut() {
            effect.on_resize(region, self.scale_factor);
        }
        self.window.request_redraw();
    }

    fn redraw(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let Some(effect) = self.effect.as_mut() else {
            return;
        };
        if let Err(e) = effect.on_frame() {
            self.fail(e, elwt);
            return;
        }
        if effect.state() == Lifecycle::Disposed {
            self.fail(EffectError::Frame("effect stopped".into()), elwt);
        }
    }

    /// Replace the running effect with a fresh one built from `config`.
    fn restart(&mut self, config: EffectConfig, elwt: &EventLoopWindowTarget<()>) {
        let Some(effect) = self.effect.take() else {
            return;
        };
        crate::log_info!("Restarting effect with grid {}", config.grid);
        let window = self.window.clone();
        let gpu = self.gpu.clone();
        let result = effect.reconfigure(config.clone(), move |viewport, cfg| {
            WarpRenderer::for_window(window, viewport, cfg.grid, &gpu)
        });
        match result {
            Ok(next) => {
                self.window.set_title(&window_title(&config));
                self.config = config;
                self.effect = Some(next);
                self.window.request_redraw();
            }
            Err(e) => self.fail(e, elwt),
        }
    }

    fn fail(&mut self, err: EffectError, elwt: &EventLoopWindowTarget<()>) {
        crate::log_err!("Window host stopping: {}", err);
        self.shutdown();
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        elwt.exit();
    }

    fn shutdown(&mut self) {
        if let Some(mut effect) = self.effect.take() {
            effect.teardown();
        }
    }
}

/// Open the window and run until it is closed.  Returns the first fatal error,
/// if any.
pub fn run(config: EffectConfig, opts: &WindowOptions) -> Result<(), EffectError> {
    let event_loop = EventLoop::new().map_err(|e| EffectError::ResourceInit(format!("event loop: {}", e)))?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = WarpApp::new(&event_loop, config, opts)?;
    event_loop
        .run(|event, elwt| app.handle_event(event, elwt))
        .map_err(|e| EffectError::Frame(format!("event loop: {}", e)))?;

    app.shutdown();
    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_is_logical() {
        let r = logical_region(PhysicalSize::new(2560, 1440), 2.0);
        assert_eq!(r, Region::new(1280.0, 720.0));
        let r = logical_region(PhysicalSize::new(800, 600), 0.0);
        assert_eq!(r, Region::new(800.0, 600.0));
    }

    #[test]
    fn grid_keys_never_reach_zero() {
        let cfg = EffectConfig::new("a.png").with_grid(1);
        assert!(regrid(&cfg, -1).is_none());
        assert_eq!(regrid(&cfg, 1).map(|c| c.grid), Some(2));
        let cfg = cfg.with_grid(15);
        assert_eq!(regrid(&cfg, -1).map(|c| c.grid), Some(14));
        assert!(regrid(&cfg.with_grid(MAX_GRID), 1).is_none());
    }

    #[test]
    fn title_names_image_and_grid() {
        let cfg = EffectConfig::new("/tmp/photos/beach.jpg").with_grid(20);
        assert_eq!(window_title(&cfg), "GridWarp - beach.jpg (grid 20)");
    }
}
