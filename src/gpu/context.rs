// ============================================================================
// GPU CONTEXT — wgpu Device, Queue, and adapter initialization
// ============================================================================

use std::sync::Arc;

use crate::error::EffectError;

/// Core wgpu handles for one effect instance.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Maximum texture dimension supported by this device.
    pub max_texture_dim: u32,
}

impl GpuContext {
    /// Context with no presentation surface (offscreen rendering, tests).
    /// Tries a hardware adapter first, then the software fallback.
    pub fn new_headless(preferred_gpu: &str) -> Result<Self, EffectError> {
        let instance = new_instance();
        if let Some(ctx) = pollster::block_on(Self::request(&instance, None, preferred_gpu, false))? {
            return Ok(ctx.with_instance(instance));
        }
        crate::log_warn!("[GPU] Hardware adapter unavailable, trying software fallback");
        match pollster::block_on(Self::request(&instance, None, preferred_gpu, true))? {
            Some(ctx) => Ok(ctx.with_instance(instance)),
            None => Err(EffectError::ResourceInit("no GPU adapter available".into())),
        }
    }

    /// Context plus a presentation surface for `target` (usually an
    /// `Arc<winit::window::Window>`).
    pub fn for_surface(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        preferred_gpu: &str,
    ) -> Result<(Self, wgpu::Surface<'static>), EffectError> {
        let instance = new_instance();
        let surface = instance.create_surface(target)?;
        let found = pollster::block_on(Self::request(&instance, Some(&surface), preferred_gpu, false))?;
        let ctx = match found {
            Some(ctx) => ctx,
            None => {
                crate::log_warn!("[GPU] No hardware adapter for this surface, trying software fallback");
                pollster::block_on(Self::request(&instance, Some(&surface), preferred_gpu, true))?
                    .ok_or_else(|| {
                        EffectError::ResourceInit("no GPU adapter can present to this window".into())
                    })?
            }
        };
        Ok((ctx.with_instance(instance), surface))
    }

    async fn request(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'static>>,
        preferred_gpu: &str,
        force_fallback: bool,
    ) -> Result<Option<PartialContext>, EffectError> {
        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power_preference(preferred_gpu),
                compatible_surface: surface,
                force_fallback_adapter: force_fallback,
            })
            .await
        {
            Some(a) => a,
            None => return Ok(None),
        };

        let adapter_name = adapter.get_info().name.clone();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("GridWarp GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(limits.clone()),
                },
                None,
            )
            .await?;

        crate::log_info!("[GPU] Using adapter '{}'", adapter_name);

        Ok(Some(PartialContext {
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name,
            max_texture_dim: limits.max_texture_dimension_2d,
        }))
    }

    /// Check if a texture of the given dimensions can be created.
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    /// Submit a single encoder's commands.
    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Adapter + device before the owning instance is attached.
struct PartialContext {
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_name: String,
    max_texture_dim: u32,
}

impl PartialContext {
    fn with_instance(self, instance: wgpu::Instance) -> GpuContext {
        GpuContext {
            instance,
            adapter: self.adapter,
            device: self.device,
            queue: self.queue,
            adapter_name: self.adapter_name,
            max_texture_dim: self.max_texture_dim,
        }
    }
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

/// Map a user-facing preference string to a wgpu power preference.
pub fn power_preference(preferred_gpu: &str) -> wgpu::PowerPreference {
    match preferred_gpu.to_lowercase().as_str() {
        "low power" | "low-power" | "integrated" => wgpu::PowerPreference::LowPower,
        "high performance" | "high-performance" | "discrete" => wgpu::PowerPreference::HighPerformance,
        _ => wgpu::PowerPreference::HighPerformance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_preference_strings() {
        assert_eq!(power_preference("Integrated"), wgpu::PowerPreference::LowPower);
        assert_eq!(power_preference("low-power"), wgpu::PowerPreference::LowPower);
        assert_eq!(power_preference("discrete"), wgpu::PowerPreference::HighPerformance);
        assert_eq!(power_preference("whatever"), wgpu::PowerPreference::HighPerformance);
    }
}
