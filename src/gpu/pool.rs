// ============================================================================
// TEXTURE POOL — page textures recycled between flips
// ============================================================================
//
// Each committed flip deletes a page texture and the next frame uploads one of
// the same size, so a small per-size free list absorbs nearly all allocations.

use std::collections::HashMap;

const MAX_PER_SIZE: usize = 4;

#[derive(Default)]
pub struct TexturePool {
    free: HashMap<(u32, u32), Vec<wgpu::Texture>>,
    pub hits: u64,
    pub misses: u64,
}

impl TexturePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, width: u32, height: u32) -> Option<wgpu::Texture> {
        let texture = self.free.get_mut(&(width, height)).and_then(Vec::pop);
        if texture.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        texture
    }

    /// Keep `texture` for reuse unless its size bucket is full.
    pub fn release(&mut self, texture: wgpu::Texture, width: u32, height: u32) {
        let bucket = self.free.entry((width, height)).or_default();
        if bucket.len() < MAX_PER_SIZE {
            bucket.push(texture);
        }
    }

    pub fn clear(&mut self) {
        self.free.clear();
    }

    pub fn pooled_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    pub fn pooled_memory_bytes(&self) -> usize {
        self.free
            .iter()
            .map(|((w, h), bucket)| *w as usize * *h as usize * 4 * bucket.len())
            .sum()
    }
}
