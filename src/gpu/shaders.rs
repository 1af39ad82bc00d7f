// ============================================================================
// GPU SHADERS — all WGSL code kept inline for containment
// ============================================================================
//
// Every pipeline shares the same uniform block: the view projection, the
// back-of-fold mask colour and the back texture x offset.  Vertex layouts
// mirror `frame::MeshVertex` and `frame::ShadowVertex`.

/// Flat and front-facing page triangles.
pub const PAGE_SHADER: &str = r#"
struct FlipUniforms {
    mvp: mat4x4<f32>,
    mask: vec4<f32>,
    tex_x_offset: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0) var<uniform> u: FlipUniforms;
@group(1) @binding(0) var page_tex: texture_2d<f32>;
@group(1) @binding(1) var page_samp: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec4<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = u.mvp * vec4<f32>(pos.xyz, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(page_tex, page_samp, in.uv);
}
"#;

/// Back of the fold: page texture blended toward the mask colour, then lit by
/// the gradient light sampled at the curl shade (w of the position).
pub const BACK_OF_FOLD_SHADER: &str = r#"
struct FlipUniforms {
    mvp: mat4x4<f32>,
    mask: vec4<f32>,
    tex_x_offset: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0) var<uniform> u: FlipUniforms;
@group(1) @binding(0) var page_tex: texture_2d<f32>;
@group(1) @binding(1) var page_samp: sampler;
@group(2) @binding(0) var light_tex: texture_2d<f32>;
@group(2) @binding(1) var light_samp: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) shadow_x: f32,
};

@vertex
fn vs_main(@location(0) pos: vec4<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = u.mvp * vec4<f32>(pos.xyz, 1.0);
    out.uv = vec2<f32>(abs(uv.x - u.tex_x_offset), uv.y);
    out.shadow_x = clamp(abs(pos.w), 0.01, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(page_tex, page_samp, in.uv);
    let light = textureSample(light_tex, light_samp, vec2<f32>(in.shadow_x, 0.0));
    let masked = mix(color.rgb, u.mask.rgb, u.mask.a);
    return vec4<f32>(masked * (1.0 - light.a) + light.rgb, 1.0);
}
"#;

/// Vertex-coloured shadow bands, alpha blended.
pub const SHADOW_SHADER: &str = r#"
struct FlipUniforms {
    mvp: mat4x4<f32>,
    mask: vec4<f32>,
    tex_x_offset: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0) var<uniform> u: FlipUniforms;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(
    @location(0) pos: vec3<f32>,
    @location(1) color: f32,
    @location(2) alpha: f32,
) -> VertexOutput {
    var out: VertexOutput;
    out.position = u.mvp * vec4<f32>(pos, 1.0);
    out.color = vec4<f32>(color, color, color, alpha);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;
