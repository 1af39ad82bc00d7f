// ============================================================================
// MESH — page grid curled through the fold mapping
// ============================================================================
//
// The page is cut into `ceil(w / px) × ceil(h / px)` cells, two triangles
// each, wound counter-clockwise in view space (y up).  Every grid vertex is
// pushed through `FoldGeometry::map`; a triangle whose projected winding
// flips has been mirrored by the curl and belongs to the back of the fold.
//
// The flat grid is kept between frames and only rebuilt when the page
// rectangle or the cell size change.
// ============================================================================

use rayon::prelude::*;

use crate::frame::{MeshVertex, Triangles};
use crate::geometry::{FoldGeometry, Point, Rect};

/// From this many vertices on, mapping runs on the rayon pool.
pub const PARALLEL_VERTEX_THRESHOLD: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq)]
struct GridPoint {
    pos: Point,
    uv: [f32; 2],
}

/// Curled page split by facing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FoldMesh {
    pub front: Triangles<MeshVertex>,
    pub back: Triangles<MeshVertex>,
}

impl FoldMesh {
    pub fn triangle_count(&self) -> usize {
        self.front.triangle_count() + self.back.triangle_count()
    }
}

#[derive(Debug, Default)]
pub struct Tessellator {
    rect: Rect,
    pixels: u32,
    columns: usize,
    rows: usize,
    grid: Vec<GridPoint>,
    indices: Vec<[u32; 3]>,
}

impl Tessellator {
    pub fn new(rect: Rect, pixels: u32) -> Self {
        let mut t = Self::default();
        t.rebuild(rect, pixels);
        t
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn vertex_count(&self) -> usize {
        self.grid.len()
    }

    /// Make sure the grid matches `rect` and `pixels`; no-op when it does.
    pub fn ensure(&mut self, rect: Rect, pixels: u32) {
        if self.rect != rect || self.pixels != pixels || self.grid.is_empty() {
            self.rebuild(rect, pixels);
        }
    }

    fn rebuild(&mut self, rect: Rect, pixels: u32) {
        let px = pixels.max(1) as f32;
        let (w, h) = (rect.width().max(0.0), rect.height().max(0.0));
        let columns = ((w / px).ceil() as usize).max(1);
        let rows = ((h / px).ceil() as usize).max(1);

        let mut grid = Vec::with_capacity((columns + 1) * (rows + 1));
        for j in 0..=rows {
            let v = j as f32 / rows as f32;
            let y = rect.top - h * v;
            for i in 0..=columns {
                let u = i as f32 / columns as f32;
                grid.push(GridPoint { pos: Point::new(rect.left + w * u, y), uv: [u, v] });
            }
        }

        let stride = (columns + 1) as u32;
        let mut indices = Vec::with_capacity(columns * rows * 2);
        for j in 0..rows as u32 {
            for i in 0..columns as u32 {
                let a = j * stride + i;
                let b = a + 1;
                let c = a + stride;
                let d = c + 1;
                // a b
                // c d
                indices.push([a, c, b]);
                indices.push([b, c, d]);
            }
        }

        log::debug!("mesh grid {columns}x{rows} for {w}x{h} @ {pixels}px");
        *self = Self { rect, pixels, columns, rows, grid, indices };
    }

    fn map_vertex(fold: &FoldGeometry, g: &GridPoint) -> MeshVertex {
        let c = fold.map(g.pos);
        MeshVertex::new(c.x, c.y, c.z, c.shade, g.uv[0], g.uv[1])
    }

    /// Curl the grid through `fold`.
    pub fn curl(&self, fold: &FoldGeometry) -> FoldMesh {
        let vertices: Vec<MeshVertex> = if self.grid.len() >= PARALLEL_VERTEX_THRESHOLD {
            self.grid.par_iter().map(|g| Self::map_vertex(fold, g)).collect()
        } else {
            self.grid.iter().map(|g| Self::map_vertex(fold, g)).collect()
        };

        let mut front = Vec::with_capacity(self.indices.len() * 3);
        let mut back = Vec::new();
        for tri in &self.indices {
            if signed_area(&vertices, tri) >= 0.0 {
                front.extend_from_slice(tri);
            } else {
                back.extend_from_slice(tri);
            }
        }

        if back.is_empty() {
            return FoldMesh { front: Triangles { vertices, indices: front }, back: Triangles::new() };
        }
        FoldMesh { front: gather(&vertices, front), back: gather(&vertices, back) }
    }
}

/// Pull the vertices `indices` touch out of `vertices`, renumbering the
/// indices to match.  Vertices on the fold line land on both sides.
fn gather(vertices: &[MeshVertex], mut indices: Vec<u32>) -> Triangles<MeshVertex> {
    let mut remap = vec![u32::MAX; vertices.len()];
    let mut used = Vec::new();
    for i in indices.iter_mut() {
        let slot = &mut remap[*i as usize];
        if *slot == u32::MAX {
            *slot = used.len() as u32;
            used.push(vertices[*i as usize]);
        }
        *i = *slot;
    }
    Triangles { vertices: used, indices }
}

/// Twice the signed area of a triangle projected onto the view plane.
fn signed_area(vertices: &[MeshVertex], tri: &[u32; 3]) -> f32 {
    let [a, b, c] = tri.map(|i| vertices[i as usize].position);
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}
