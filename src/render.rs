// ============================================================================
// RENDER BACKEND — the seam between the engine and a graphics API
// ============================================================================
//
// The engine owns geometry and texture bookkeeping; a backend owns the GPU
// objects.  `RecordingBackend` keeps everything in memory so tests (and the
// demo, when no adapter is available) can inspect every frame.
// ============================================================================

use std::collections::HashMap;

use crate::error::{FlipError, Result};
use crate::frame::{DrawCommand, Frame};
use crate::texture::TextureId;

pub trait RenderBackend {
    /// Create shaders and pipelines.  Called once the surface exists.
    fn prepare(&mut self) -> Result<()>;

    /// The drawable surface changed size.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Upload tightly packed RGBA8 pixels.
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId>;

    /// Release textures.  Unknown ids are ignored.
    fn delete_textures(&mut self, ids: &[TextureId]);

    /// Execute a frame's draw commands in order.
    fn submit(&mut self, frame: &Frame) -> Result<()>;
}

/// Per-frame counters, handy for logs and assertions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub commands: usize,
    pub triangles: usize,
    pub shadow_triangles: usize,
}

impl FrameStats {
    pub fn of(frame: &Frame) -> Self {
        let mut stats = FrameStats { commands: frame.commands.len(), ..Default::default() };
        for cmd in &frame.commands {
            match cmd {
                DrawCommand::Textured { mesh, .. } | DrawCommand::BackOfFold { mesh, .. } => {
                    stats.triangles += mesh.triangle_count();
                }
                DrawCommand::Shadow { mesh } => stats.shadow_triangles += mesh.triangle_count(),
                DrawCommand::Clear { .. } => {}
            }
        }
        stats
    }
}

/// In-memory backend: stores uploads and submitted frames.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u64,
    textures: HashMap<TextureId, (u32, u32)>,
    pub frames: Vec<Frame>,
    pub deleted: Vec<TextureId>,
    pub prepared: bool,
    pub size: (u32, u32),
    /// Makes the next `submit` fail, to exercise error paths.
    pub fail_next_submit: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn is_live(&self, id: TextureId) -> bool {
        self.textures.contains_key(&id)
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }
}

impl RenderBackend for RecordingBackend {
    fn prepare(&mut self) -> Result<()> {
        self.prepared = true;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.size = (width, height);
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId> {
        if rgba.len() < width as usize * height as usize * 4 {
            return Err(FlipError::GetBitmapData(format!(
                "{} bytes for {width}x{height}",
                rgba.len()
            )));
        }
        self.next_id += 1;
        let id = TextureId(self.next_id);
        self.textures.insert(id, (width, height));
        Ok(id)
    }

    fn delete_textures(&mut self, ids: &[TextureId]) {
        for id in ids {
            if self.textures.remove(id).is_some() {
                self.deleted.push(*id);
            }
        }
    }

    fn submit(&mut self, frame: &Frame) -> Result<()> {
        if std::mem::take(&mut self.fail_next_submit) {
            return Err(FlipError::Backend("submit failed".into()));
        }
        if let Some(dead) = frame.textures().into_iter().find(|id| !self.is_live(*id)) {
            return Err(FlipError::Backend(format!("frame samples deleted texture {dead:?}")));
        }
        self.frames.push(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{DrawLayer, Triangles};

    #[test]
    fn ids_are_unique_and_deletion_is_tracked() {
        let mut b = RecordingBackend::new();
        let a = b.create_texture(1, 1, &[0; 4]).unwrap();
        let c = b.create_texture(1, 1, &[0; 4]).unwrap();
        assert_ne!(a, c);
        b.delete_textures(&[a, TextureId(999)]);
        assert_eq!(b.deleted, vec![a]);
        assert_eq!(b.live_textures(), 1);
    }

    #[test]
    fn submit_rejects_dead_textures() {
        let mut b = RecordingBackend::new();
        let id = b.create_texture(1, 1, &[0; 4]).unwrap();
        let mut frame = Frame::new([[0.0; 4]; 4]);
        frame.push(DrawCommand::Textured {
            layer: DrawLayer::FullPage,
            texture: id,
            mesh: Triangles::new(),
        });
        assert!(b.submit(&frame).is_ok());
        b.delete_textures(&[id]);
        assert_eq!(b.submit(&frame).unwrap_err().code(), -5);
        assert_eq!(b.frames.len(), 1);
    }

    #[test]
    fn short_upload_is_rejected() {
        let mut b = RecordingBackend::new();
        assert!(b.create_texture(2, 2, &[0; 8]).is_err());
    }
}
