// ============================================================================
// GPU SHADERS — WGSL source kept inline
// ============================================================================

// ============================================================================
// WARP SHADER — samples the image offset by the displacement field
// ============================================================================
//
// Vertex stage: unit quad (-0.5..0.5) through `view_proj`, which already
// folds in the cover scale and the orthographic camera.
//
// Fragment stage: `uv` is bottom-up, matching the field's row order, so the
// field is read with a plain nearest-cell `textureLoad`.  Image rows are
// stored top-down, so the final lookup flips v.
pub const WARP_SHADER: &str = r#"
struct WarpUniforms {
    view_proj: mat4x4<f32>,
    resolution: vec4<f32>,   // drawable width, height, 1, 1
    time: f32,
    displacement_scale: f32,
    grid: f32,
    _pad0: f32,
};

@group(0) @binding(0) var<uniform> u: WarpUniforms;
@group(1) @binding(0) var image_tex: texture_2d<f32>;
@group(1) @binding(1) var image_samp: sampler;
@group(2) @binding(0) var field_tex: texture_2d<f32>;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_warp(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = u.view_proj * vec4<f32>(in.position, 0.0, 1.0);
    out.uv = in.uv;
    return out;
}

fn field_at(uv: vec2<f32>) -> vec2<f32> {
    let n = i32(u.grid);
    let cell = clamp(vec2<i32>(floor(uv * u.grid)), vec2<i32>(0, 0), vec2<i32>(n - 1, n - 1));
    return textureLoad(field_tex, cell, 0).rg;
}

@fragment
fn fs_warp(in: VertexOutput) -> @location(0) vec4<f32> {
    let offset = field_at(in.uv);
    let p = in.uv - u.displacement_scale * offset;
    return textureSample(image_tex, image_samp, vec2<f32>(p.x, 1.0 - p.y));
}
"#;
