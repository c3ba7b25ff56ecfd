// ============================================================================
// WARP RENDERER — owns every GPU resource of one effect instance
// ============================================================================

use image::RgbaImage;

use super::context::GpuContext;
use super::pipeline::{QuadMesh, UniformBlock, WarpProgram, WarpUniforms};
use super::texture::{FieldTexture, ImageTexture, OffscreenTexture};
use crate::effect::{DrawOutcome, WarpSink};
use crate::error::EffectError;
use crate::field::DisplacementField;
use crate::viewport::Viewport;

// ============================================================================
// RENDER TARGET
// ============================================================================

pub enum RenderTarget {
    /// Window surface, presented every frame.
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    /// Offscreen texture for headless runs; read back with `read_frame`.
    Offscreen(OffscreenTexture),
}

impl RenderTarget {
    fn format(&self) -> wgpu::TextureFormat {
        match self {
            RenderTarget::Window { config, .. } => config.format,
            RenderTarget::Offscreen(_) => OffscreenTexture::FORMAT,
        }
    }

    fn release(self) {
        match self {
            // Dropping the surface unconfigures it.
            RenderTarget::Window { surface, .. } => drop(surface),
            RenderTarget::Offscreen(tex) => tex.destroy(),
        }
    }
}

// ============================================================================
// RESOURCE SLOTS
// ============================================================================

/// Every GPU allocation the effect makes, one optional slot each.
///
/// Slots are filled one by one during setup.  [`GpuResources::release`]
/// empties whichever slots are filled and reports how many it freed, so it
/// can run after a partial setup, twice in a row, or from `Drop`.
#[derive(Default)]
pub struct GpuResources {
    pub target: Option<RenderTarget>,
    pub program: Option<WarpProgram>,
    pub mesh: Option<QuadMesh>,
    pub uniforms: Option<UniformBlock>,
    pub image: Option<ImageTexture>,
    pub field: Option<FieldTexture>,
}

impl GpuResources {
    /// Release every allocated resource.  Returns the number of slots freed.
    pub fn release(&mut self) -> usize {
        let mut freed = 0;
        if let Some(image) = self.image.take() {
            image.destroy();
            freed += 1;
        }
        if let Some(field) = self.field.take() {
            field.destroy();
            freed += 1;
        }
        if let Some(uniforms) = self.uniforms.take() {
            uniforms.destroy();
            freed += 1;
        }
        if let Some(mesh) = self.mesh.take() {
            mesh.destroy();
            freed += 1;
        }
        if self.program.take().is_some() {
            freed += 1;
        }
        if let Some(target) = self.target.take() {
            target.release();
            freed += 1;
        }
        freed
    }
}

impl Drop for GpuResources {
    fn drop(&mut self) {
        self.release();
    }
}

// ============================================================================
// RENDERER
// ============================================================================

pub struct WarpRenderer {
    ctx: GpuContext,
    res: GpuResources,
    viewport: Viewport,
    frames_drawn: u64,
}

impl WarpRenderer {
    /// Renderer presenting to a window surface.
    pub fn for_window(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        viewport: &Viewport,
        grid: usize,
        preferred_gpu: &str,
    ) -> Result<Self, EffectError> {
        let (ctx, surface) = GpuContext::for_surface(target, preferred_gpu)?;

        let caps = surface.get_capabilities(&ctx.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| EffectError::ResourceInit("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: viewport.pixel_width.max(1),
            height: viewport.pixel_height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        if viewport.is_drawable() {
            surface.configure(&ctx.device, &config);
        }

        Self::build(ctx, RenderTarget::Window { surface, config }, viewport, grid)
    }

    /// Renderer drawing into an offscreen texture of the viewport's size.
    pub fn offscreen(viewport: &Viewport, grid: usize, preferred_gpu: &str) -> Result<Self, EffectError> {
        let ctx = GpuContext::new_headless(preferred_gpu)?;
        if !ctx.supports_size(viewport.pixel_width, viewport.pixel_height) {
            return Err(EffectError::ResourceInit(format!(
                "{}x{} exceeds the device texture limit of {}",
                viewport.pixel_width, viewport.pixel_height, ctx.max_texture_dim
            )));
        }
        let target = OffscreenTexture::new(&ctx.device, viewport.pixel_width, viewport.pixel_height);
        Self::build(ctx, RenderTarget::Offscreen(target), viewport, grid)
    }

    /// Fill the remaining slots.  Any early return drops `res`, which
    /// releases what was already allocated.
    fn build(ctx: GpuContext, target: RenderTarget, viewport: &Viewport, grid: usize) -> Result<Self, EffectError> {
        let grid_u32 = u32::try_from(grid)
            .map_err(|_| EffectError::ResourceInit(format!("grid {} too large", grid)))?;

        let mut res = GpuResources::default();
        res.target = Some(target);

        if !ctx.supports_size(grid_u32, grid_u32) {
            return Err(EffectError::ResourceInit(format!(
                "grid {} exceeds the device texture limit of {}",
                grid, ctx.max_texture_dim
            )));
        }

        let format = res.target.as_ref().map(RenderTarget::format).unwrap_or(OffscreenTexture::FORMAT);

        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let program = WarpProgram::new(&ctx.device, format);
        if let Some(err) = pollster::block_on(ctx.device.pop_error_scope()) {
            return Err(EffectError::ResourceInit(format!("shader program: {}", err)));
        }

        res.mesh = Some(QuadMesh::new(&ctx.device));
        res.uniforms = Some(UniformBlock::new(
            &ctx.device,
            &program.uniform_bgl,
            &WarpUniforms::new(viewport, 0.0, grid),
        ));
        res.image = Some(ImageTexture::blank(&ctx.device, &ctx.queue, &program.image_bgl, &program.sampler));
        res.field = Some(FieldTexture::new(&ctx.device, &program.field_bgl, grid_u32));
        res.program = Some(program);

        crate::log_info!(
            "[GPU] Warp pipeline ready: {}x{} target, {}x{} field",
            viewport.pixel_width,
            viewport.pixel_height,
            grid,
            grid
        );

        Ok(Self {
            ctx,
            res,
            viewport: *viewport,
            frames_drawn: 0,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    pub fn resources(&self) -> &GpuResources {
        &self.res
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Copy the offscreen target back to the CPU.
    pub fn read_frame(&self) -> Result<RgbaImage, EffectError> {
        let Some(RenderTarget::Offscreen(target)) = self.res.target.as_ref() else {
            return Err(EffectError::Frame("no offscreen target to read back".into()));
        };
        let (w, h) = (target.width, target.height);
        let device = &self.ctx.device;

        let bytes_per_row = super::aligned_bytes_per_row(w);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("warp_readback"),
            size: (bytes_per_row * h) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("warp_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(h),
                },
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.submit_one(encoder);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(EffectError::Frame(format!("readback map error: {:?}", e))),
            Err(e) => return Err(EffectError::Frame(format!("readback channel error: {:?}", e))),
        }

        let mapped = slice.get_mapped_range();
        let out = super::unpad_rows(&mapped, w, h, bytes_per_row);
        drop(mapped);
        staging.unmap();
        staging.destroy();

        RgbaImage::from_raw(w, h, out)
            .ok_or_else(|| EffectError::Frame("readback size mismatch".into()))
    }

    fn reconfigure_surface(&self) {
        if let Some(RenderTarget::Window { surface, config }) = self.res.target.as_ref() {
            surface.configure(&self.ctx.device, config);
        }
    }
}

impl WarpSink for WarpRenderer {
    fn set_image(&mut self, image: &RgbaImage) -> Result<(), EffectError> {
        let Some(program) = self.res.program.as_ref() else {
            return Err(EffectError::AssetLoad("renderer already released".into()));
        };
        if !self.ctx.supports_size(image.width(), image.height()) {
            return Err(EffectError::AssetLoad(format!(
                "image {}x{} exceeds the device texture limit of {}",
                image.width(),
                image.height(),
                self.ctx.max_texture_dim
            )));
        }
        let next = ImageTexture::from_image(
            &self.ctx.device,
            &self.ctx.queue,
            &program.image_bgl,
            &program.sampler,
            image,
        );
        // The old texture may still have an unsubmitted upload queued, so it
        // is dropped (freed once the queue is done with it), not destroyed.
        self.res.image = Some(next);
        Ok(())
    }

    fn resize(&mut self, viewport: &Viewport) {
        let size_changed = viewport.pixel_width != self.viewport.pixel_width
            || viewport.pixel_height != self.viewport.pixel_height;
        self.viewport = *viewport;
        if !size_changed || !viewport.is_drawable() {
            return;
        }
        match self.res.target.as_mut() {
            Some(RenderTarget::Window { surface, config }) => {
                config.width = viewport.pixel_width;
                config.height = viewport.pixel_height;
                surface.configure(&self.ctx.device, config);
            }
            Some(RenderTarget::Offscreen(tex)) => {
                *tex = OffscreenTexture::new(&self.ctx.device, viewport.pixel_width, viewport.pixel_height);
            }
            None => {}
        }
    }

    fn upload_field(&mut self, field: &DisplacementField) {
        if let Some(tex) = self.res.field.as_ref()
            && tex.size as usize == field.size()
        {
            tex.upload(&self.ctx.queue, field.as_slice());
        }
    }

    fn draw(&mut self, uniforms: &WarpUniforms) -> Result<DrawOutcome, EffectError> {
        if !self.viewport.is_drawable() {
            return Ok(DrawOutcome::Skipped);
        }

        // Acquire the frame before borrowing the rest of the slots.
        let frame = match self.res.target.as_ref() {
            Some(RenderTarget::Window { surface, .. }) => match surface.get_current_texture() {
                Ok(frame) => Some(frame),
                Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                    crate::log_warn!("[GPU] Surface lost or outdated, reconfiguring");
                    self.reconfigure_surface();
                    return Ok(DrawOutcome::Skipped);
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    crate::log_warn!("[GPU] Surface timeout, dropping frame");
                    return Ok(DrawOutcome::Skipped);
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    return Err(EffectError::Frame("surface out of memory".into()));
                }
            },
            Some(RenderTarget::Offscreen(_)) => None,
            None => return Ok(DrawOutcome::Skipped),
        };

        let GpuResources {
            target: Some(target),
            program: Some(program),
            mesh: Some(mesh),
            uniforms: Some(block),
            image: Some(image),
            field: Some(field),
        } = &self.res
        else {
            return Ok(DrawOutcome::Skipped);
        };

        block.write(&self.ctx.queue, uniforms);

        let surface_view = frame
            .as_ref()
            .map(|f| f.texture.create_view(&wgpu::TextureViewDescriptor::default()));
        let view = match (&surface_view, target) {
            (Some(v), _) => v,
            (None, RenderTarget::Offscreen(tex)) => &tex.view,
            (None, RenderTarget::Window { .. }) => return Ok(DrawOutcome::Skipped),
        };

        let mut encoder = self.ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("warp_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("warp_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &block.bind_group, &[]);
            pass.set_bind_group(1, &image.bind_group, &[]);
            pass.set_bind_group(2, &field.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        self.ctx.submit_one(encoder);

        if let Some(frame) = frame {
            frame.present();
        }
        self.frames_drawn += 1;
        Ok(DrawOutcome::Drawn)
    }

    fn release(&mut self) -> usize {
        let freed = self.res.release();
        if freed > 0 {
            crate::log_info!("[GPU] Released {} resource slot(s) after {} frame(s)", freed, self.frames_drawn);
        }
        freed
    }
}
