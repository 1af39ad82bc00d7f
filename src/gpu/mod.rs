// ============================================================================
// GPU MODULE — wgpu renderer for the page flip engine
// ============================================================================
//
// Architecture:
//   context.rs    — headless wgpu device, adapter preference
//   shaders.rs    — WGSL source for the page, back-of-fold and shadow passes
//   texture.rs    — GpuTexture: sampled page texture + bind group
//   compositor.rs — render pipelines, uniform block, readback
//   pool.rs       — texture recycling pool
//   renderer.rs   — WgpuBackend, the `RenderBackend` implementation
// ============================================================================

pub mod context;
pub mod shaders;
pub mod texture;
pub mod compositor;
pub mod pool;
pub mod renderer;

pub use context::GpuPreference;
pub use renderer::WgpuBackend;
