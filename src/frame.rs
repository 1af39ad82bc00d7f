// ============================================================================
// FRAME — backend-neutral draw list produced by the engine every frame
// ============================================================================
//
// The engine never talks to a graphics API directly.  `draw_flip_frame` and
// `draw_page_frame` build a `Frame` (an ordered list of `DrawCommand`s plus
// the projection) and hand it to a `RenderBackend`.  The vertex structs are
// `Pod` so the wgpu backend can upload them with `bytemuck::cast_slice`.
// ============================================================================

use bytemuck::{Pod, Zeroable};

use crate::texture::TextureId;

/// Textured vertex: `position.w` carries the curl shade (sin θ).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 4],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(x: f32, y: f32, z: f32, shade: f32, u: f32, v: f32) -> Self {
        Self { position: [x, y, z, shade], uv: [u, v] }
    }
}

/// Untextured shadow vertex: grey level + alpha.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ShadowVertex {
    pub position: [f32; 3],
    pub color: f32,
    pub alpha: f32,
}

/// Indexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Triangles<V> {
    pub vertices: Vec<V>,
    pub indices: Vec<u32>,
}

impl<V> Triangles<V> {
    pub fn new() -> Self {
        Self { vertices: Vec::new(), indices: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Which slot a textured draw samples, recorded for inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawLayer {
    /// Page revealed under the fold.
    Underlay,
    /// Stationary page (opposite page, or the whole page when idle).
    FullPage,
    /// Unfolded and front-facing curled part of the fold page.
    Front,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear {
        color: [f32; 4],
    },
    /// Plain textured triangles.
    Textured {
        layer: DrawLayer,
        texture: TextureId,
        mesh: Triangles<MeshVertex>,
    },
    /// Back of the fold: texture tinted by `mask` and lit by the gradient.
    BackOfFold {
        texture: TextureId,
        gradient: Option<TextureId>,
        mask: [f32; 4],
        tex_x_offset: f32,
        mesh: Triangles<MeshVertex>,
    },
    /// Alpha-blended shadow band.
    Shadow {
        mesh: Triangles<ShadowVertex>,
    },
}

/// One frame worth of draw calls, executed in order.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub mvp: [[f32; 4]; 4],
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    pub fn new(mvp: [[f32; 4]; 4]) -> Self {
        Self { mvp, commands: Vec::new() }
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    /// Textures sampled by this frame.
    pub fn textures(&self) -> Vec<TextureId> {
        let mut ids = Vec::new();
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Textured { texture, .. } => ids.push(*texture),
                DrawCommand::BackOfFold { texture, gradient, .. } => {
                    ids.push(*texture);
                    ids.extend(gradient.iter().copied());
                }
                _ => {}
            }
        }
        ids
    }
}
