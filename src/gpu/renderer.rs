// ============================================================================
// GPU RENDERER — wgpu implementation of `RenderBackend`
// ============================================================================
//
// Frames are drawn into an offscreen RGBA8 target with a Depth32Float
// attachment; hosts read the result back with `read_pixels` / `snapshot`.
// Page textures come from a size-keyed pool so the per-flip texture churn
// doesn't hit the allocator every time.
// ============================================================================

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use super::compositor::{Compositor, FlipUniforms, COLOR_FORMAT, DEPTH_FORMAT};
use super::context::{GpuContext, GpuPreference};
use super::pool::TexturePool;
use super::texture::GpuTexture;
use crate::error::{FlipError, Result};
use crate::frame::{DrawCommand, Frame};
use crate::render::RenderBackend;
use crate::texture::TextureId;

/// Offscreen colour + depth attachments.
struct RenderTarget {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("flip_target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("flip_depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        Self { color, color_view, depth_view, width, height }
    }
}

#[derive(Clone, Copy)]
enum Pass {
    Page(TextureId),
    Back(TextureId, Option<TextureId>),
    Shadow,
}

/// GPU resources for one draw command, built before the render pass opens.
struct PreparedDraw {
    pass: Pass,
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    uniforms: wgpu::BindGroup,
}

pub struct WgpuBackend {
    ctx: GpuContext,
    compositor: Option<Compositor>,
    textures: HashMap<TextureId, GpuTexture>,
    next_id: u64,
    pool: TexturePool,
    /// Bound when a back-of-fold draw has no gradient light: 1×1 transparent.
    fallback_light: Option<GpuTexture>,
    target: Option<RenderTarget>,
    staging: Option<(wgpu::Buffer, u64)>,
    frames_submitted: u64,
}

impl WgpuBackend {
    pub fn new(ctx: GpuContext) -> Self {
        Self {
            ctx,
            compositor: None,
            textures: HashMap::new(),
            next_id: 0,
            pool: TexturePool::new(),
            fallback_light: None,
            target: None,
            staging: None,
            frames_submitted: 0,
        }
    }

    /// Backend on the preferred adapter, `None` when no adapter is usable.
    pub fn try_new(preference: GpuPreference) -> Option<Self> {
        GpuContext::new(preference).map(Self::new)
    }

    pub fn is_software(&self) -> bool {
        self.ctx.is_software
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn pooled_textures(&self) -> usize {
        self.pool.pooled_count()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    fn compositor(&self) -> Result<&Compositor> {
        self.compositor
            .as_ref()
            .ok_or_else(|| FlipError::Backend("renderer used before prepare".into()))
    }

    fn upload(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<GpuTexture> {
        let compositor = self
            .compositor
            .as_ref()
            .ok_or_else(|| FlipError::Backend("renderer used before prepare".into()))?;
        let texture = match self.pool.acquire(width, height) {
            Some(t) => t,
            None => self.ctx.device.create_texture(&GpuTexture::descriptor(width, height)),
        };
        Ok(GpuTexture::upload(
            &self.ctx.device,
            &self.ctx.queue,
            &compositor.tex_sampler_bgl,
            &compositor.sampler_linear,
            texture,
            width,
            height,
            rgba,
        ))
    }

    fn prepare_draw(&self, compositor: &Compositor, mvp: [[f32; 4]; 4], cmd: &DrawCommand) -> Option<PreparedDraw> {
        let device = &self.ctx.device;
        let (pass, uniforms, vertices, indices): (Pass, FlipUniforms, &[u8], &[u32]) = match cmd {
            DrawCommand::Clear { .. } => return None,
            DrawCommand::Textured { texture, mesh, .. } => (
                Pass::Page(*texture),
                FlipUniforms::new(mvp),
                bytemuck::cast_slice(&mesh.vertices),
                &mesh.indices,
            ),
            DrawCommand::BackOfFold { texture, gradient, mask, tex_x_offset, mesh } => (
                Pass::Back(*texture, *gradient),
                FlipUniforms::new(mvp).with_back(*mask, *tex_x_offset),
                bytemuck::cast_slice(&mesh.vertices),
                &mesh.indices,
            ),
            DrawCommand::Shadow { mesh } => (
                Pass::Shadow,
                FlipUniforms::new(mvp),
                bytemuck::cast_slice(&mesh.vertices),
                &mesh.indices,
            ),
        };
        if indices.is_empty() {
            return None;
        }

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("flip_uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("flip_uniform_bg"),
            layout: &compositor.uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("flip_vertices"),
            contents: vertices,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("flip_indices"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Some(PreparedDraw {
            pass,
            vertices: vertex_buffer,
            indices: index_buffer,
            index_count: indices.len() as u32,
            uniforms: uniform_bg,
        })
    }

    /// Last submitted frame as tightly packed RGBA8, top row first.
    pub fn read_pixels(&mut self) -> Result<Vec<u8>> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| FlipError::Backend("no render target, surface size unknown".into()))?;
        Compositor::readback_texture(&self.ctx, &target.color, target.width, target.height, &mut self.staging)
    }

    pub fn snapshot(&mut self) -> Result<image::RgbaImage> {
        let (width, height) = self.size();
        let pixels = self.read_pixels()?;
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| FlipError::Backend("readback size mismatch".into()))
    }

    pub fn size(&self) -> (u32, u32) {
        self.target.as_ref().map_or((0, 0), |t| (t.width, t.height))
    }
}

impl RenderBackend for WgpuBackend {
    fn prepare(&mut self) -> Result<()> {
        if self.compositor.is_some() {
            return Ok(());
        }
        self.compositor = Some(Compositor::new(&self.ctx)?);
        self.fallback_light = Some(self.upload(1, 1, &[0, 0, 0, 0])?);
        log::debug!("flip pipelines ready on {}", self.ctx.adapter_name);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || !self.ctx.supports_size(width, height) {
            return Err(FlipError::invalid(format!(
                "surface {width}x{height} (max {})",
                self.ctx.max_texture_dim
            )));
        }
        if self.size() != (width, height) {
            self.target = Some(RenderTarget::new(&self.ctx.device, width, height));
            self.staging = None;
        }
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId> {
        if rgba.len() < width as usize * height as usize * 4 {
            return Err(FlipError::GetBitmapData(format!(
                "{} bytes for {width}x{height}",
                rgba.len()
            )));
        }
        if width == 0 || height == 0 || !self.ctx.supports_size(width, height) {
            return Err(FlipError::invalid(format!("texture {width}x{height}")));
        }
        let texture = self.upload(width, height, &rgba[..width as usize * height as usize * 4])?;
        self.next_id += 1;
        let id = TextureId(self.next_id);
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn delete_textures(&mut self, ids: &[TextureId]) {
        for id in ids {
            if let Some(t) = self.textures.remove(id) {
                self.pool.release(t.texture, t.width, t.height);
            }
        }
    }

    fn submit(&mut self, frame: &Frame) -> Result<()> {
        let compositor = self.compositor()?;
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| FlipError::Backend("submit before resize".into()))?;
        if let Some(dead) = frame.textures().into_iter().find(|id| !self.textures.contains_key(id)) {
            return Err(FlipError::Backend(format!("frame samples unknown texture {dead:?}")));
        }
        let fallback = self
            .fallback_light
            .as_ref()
            .ok_or_else(|| FlipError::Backend("renderer used before prepare".into()))?;

        let clear = frame.commands.iter().find_map(|cmd| match cmd {
            DrawCommand::Clear { color } => Some(*color),
            _ => None,
        });
        let draws: Vec<PreparedDraw> = frame
            .commands
            .iter()
            .filter_map(|cmd| self.prepare_draw(compositor, frame.mvp, cmd))
            .collect();

        let mut encoder = self.ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("flip_frame_encoder"),
        });
        {
            let load = match clear {
                Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                }),
                None => wgpu::LoadOp::Load,
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("flip_frame_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &draws {
                match draw.pass {
                    Pass::Page(tex) => {
                        let Some(page) = self.textures.get(&tex) else { continue };
                        pass.set_pipeline(&compositor.page_pipeline);
                        pass.set_bind_group(1, &page.bind_group, &[]);
                    }
                    Pass::Back(tex, light) => {
                        let Some(page) = self.textures.get(&tex) else { continue };
                        let light = light.and_then(|id| self.textures.get(&id)).unwrap_or(fallback);
                        pass.set_pipeline(&compositor.back_pipeline);
                        pass.set_bind_group(1, &page.bind_group, &[]);
                        pass.set_bind_group(2, &light.bind_group, &[]);
                    }
                    Pass::Shadow => pass.set_pipeline(&compositor.shadow_pipeline),
                }
                pass.set_bind_group(0, &draw.uniforms, &[]);
                pass.set_vertex_buffer(0, draw.vertices.slice(..));
                pass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }
        self.ctx.submit_one(encoder);
        self.frames_submitted += 1;
        log::trace!("flip frame #{}: {} draws", self.frames_submitted, draws.len());
        Ok(())
    }
}

impl Drop for WgpuBackend {
    fn drop(&mut self) {
        log::debug!(
            "releasing {} textures, {} KiB pooled, pool hits {}/{}",
            self.textures.len(),
            self.pool.pooled_memory_bytes() / 1024,
            self.pool.hits,
            self.pool.hits + self.pool.misses
        );
        self.pool.clear();
    }
}
