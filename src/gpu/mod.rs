// ============================================================================
// GPU MODULE — wgpu pipeline that turns the displacement field into pixels
// ============================================================================
//
// Architecture:
//   context.rs   — wgpu Instance, Adapter, Device, Queue init
//   shaders.rs   — WGSL source (inline strings)
//   texture.rs   — image texture, field texture, offscreen target
//   pipeline.rs  — render pipeline, quad mesh, uniform block
//   renderer.rs  — WarpRenderer: owns every slot, draws, tears down
// ============================================================================

pub mod context;
pub mod pipeline;
pub mod renderer;
pub mod shaders;
pub mod texture;

pub use context::GpuContext;
pub use pipeline::WarpUniforms;
pub use renderer::{GpuResources, RenderTarget, WarpRenderer};

/// Row pitch for a texture-to-buffer copy of an RGBA8 texture: `width * 4`
/// rounded up to wgpu's 256-byte alignment.
pub fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

/// Strip the row padding from a readback buffer into tightly packed RGBA8.
pub fn unpad_rows(padded: &[u8], width: u32, height: u32, bytes_per_row: u32) -> Vec<u8> {
    let actual_row = width as usize * 4;
    let mut out = vec![0u8; actual_row * height as usize];
    for y in 0..height as usize {
        let src_start = y * bytes_per_row as usize;
        let dst_start = y * actual_row;
        out[dst_start..dst_start + actual_row].copy_from_slice(&padded[src_start..src_start + actual_row]);
    }
    out
}
