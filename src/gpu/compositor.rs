// ============================================================================
// COMPOSITOR — render pipelines for page, back-of-fold and shadow draws
// ============================================================================
//
// Three pipelines share one uniform layout and one texture+sampler layout:
//
//   page         — opaque textured triangles, depth tested and written
//   back_of_fold — page texture masked and lit by the gradient light
//   shadow       — vertex-coloured bands, alpha blended, depth tested only
//
// Depth runs 0 (nearest) .. 1 (farthest), matching `ViewRect::mvp`.
// ============================================================================

use bytemuck::{Pod, Zeroable};

use super::context::GpuContext;
use crate::error::{FlipError, Result};
use crate::frame::{MeshVertex, ShadowVertex};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// ============================================================================
// UNIFORM TYPES
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FlipUniforms {
    pub mvp: [[f32; 4]; 4],
    pub mask: [f32; 4],
    pub tex_x_offset: f32,
    pub _pad: [f32; 3],
}

impl FlipUniforms {
    pub fn new(mvp: [[f32; 4]; 4]) -> Self {
        Self { mvp, mask: [0.0; 4], tex_x_offset: 0.0, _pad: [0.0; 3] }
    }

    pub fn with_back(mut self, mask: [f32; 4], tex_x_offset: f32) -> Self {
        self.mask = mask;
        self.tex_x_offset = tex_x_offset;
        self
    }
}

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x2];
const SHADOW_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32, 2 => Float32];

pub fn mesh_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &MESH_ATTRIBUTES,
    }
}

pub fn shadow_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<ShadowVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &SHADOW_ATTRIBUTES,
    }
}

// ============================================================================
// COMPOSITOR
// ============================================================================

pub struct Compositor {
    pub page_pipeline: wgpu::RenderPipeline,
    pub back_pipeline: wgpu::RenderPipeline,
    pub shadow_pipeline: wgpu::RenderPipeline,
    /// Group 0: `FlipUniforms`.
    pub uniform_bgl: wgpu::BindGroupLayout,
    /// Groups 1 and 2: texture + sampler.
    pub tex_sampler_bgl: wgpu::BindGroupLayout,
    pub sampler_linear: wgpu::Sampler,
}

impl Compositor {
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        let device = &ctx.device;

        let page_shader = Self::shader(device, "page_shader", super::shaders::PAGE_SHADER)?;
        let back_shader = Self::shader(device, "back_of_fold_shader", super::shaders::BACK_OF_FOLD_SHADER)?;
        let shadow_shader = Self::shader(device, "shadow_shader", super::shaders::SHADOW_SHADER)?;

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("flip_uniform_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let tex_sampler_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tex_sampler_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let page_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("page_pipeline_layout"),
            bind_group_layouts: &[&uniform_bgl, &tex_sampler_bgl],
            push_constant_ranges: &[],
        });
        let back_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("back_of_fold_pipeline_layout"),
            bind_group_layouts: &[&uniform_bgl, &tex_sampler_bgl, &tex_sampler_bgl],
            push_constant_ranges: &[],
        });
        let shadow_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow_pipeline_layout"),
            bind_group_layouts: &[&uniform_bgl],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let page_pipeline = Self::pipeline(
            device,
            "page_pipeline",
            &page_layout,
            &page_shader,
            mesh_vertex_layout(),
            Some(wgpu::BlendState::REPLACE),
            true,
        );
        let back_pipeline = Self::pipeline(
            device,
            "back_of_fold_pipeline",
            &back_layout,
            &back_shader,
            mesh_vertex_layout(),
            Some(wgpu::BlendState::REPLACE),
            true,
        );
        let shadow_pipeline = Self::pipeline(
            device,
            "shadow_pipeline",
            &shadow_layout,
            &shadow_shader,
            shadow_vertex_layout(),
            Some(wgpu::BlendState::ALPHA_BLENDING),
            false,
        );
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("pipeline creation failed: {err}");
            return Err(FlipError::LinkProgram(err.to_string()));
        }

        let sampler_linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sampler_linear"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            page_pipeline,
            back_pipeline,
            shadow_pipeline,
            uniform_bgl,
            tex_sampler_bgl,
            sampler_linear,
        })
    }

    fn shader(device: &wgpu::Device, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => {
                log::error!("{label} failed to compile: {err}");
                Err(FlipError::CompileShader(label.to_string()))
            }
            None => Ok(module),
        }
    }

    fn pipeline(
        device: &wgpu::Device,
        label: &str,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        vertex_layout: wgpu::VertexBufferLayout<'static>,
        blend: Option<wgpu::BlendState>,
        depth_write: bool,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_main",
                buffers: &[vertex_layout],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // The curl mirrors triangles; both windings are visible.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: depth_write,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
        })
    }

    /// Read back a render target as tightly packed RGBA bytes.
    pub fn readback_texture(
        ctx: &GpuContext,
        texture: &wgpu::Texture,
        width: u32,
        height: u32,
        cached_staging: &mut Option<(wgpu::Buffer, u64)>,
    ) -> Result<Vec<u8>> {
        let device = &ctx.device;
        let bytes_per_row = aligned_bytes_per_row(width);
        let buffer_size = (bytes_per_row * height) as u64;

        if cached_staging.as_ref().is_none_or(|(_, size)| *size < buffer_size) {
            let buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("readback_staging"),
                size: buffer_size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            *cached_staging = Some((buf, buffer_size));
        }
        let Some((staging, _)) = cached_staging.as_ref() else {
            return Err(FlipError::Backend("readback staging buffer missing".into()));
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        ctx.submit_one(encoder);

        let slice = staging.slice(..buffer_size);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(FlipError::Backend(format!("readback map error: {e:?}"))),
            Err(e) => return Err(FlipError::Backend(format!("readback channel error: {e}"))),
        }

        let mapped = slice.get_mapped_range();
        let actual_row = (width * 4) as usize;
        let mut result = Vec::with_capacity(actual_row * height as usize);
        for row in mapped.chunks(bytes_per_row as usize).take(height as usize) {
            result.extend_from_slice(&row[..actual_row]);
        }
        drop(mapped);
        staging.unmap();
        Ok(result)
    }
}

/// `bytes_per_row` padded to wgpu's copy alignment.
pub fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}
