// ============================================================================
// PAGE — one page rectangle, its gesture corners and texture slots
// ============================================================================

use crate::frame::{MeshVertex, Triangles};
use crate::geometry::{Point, Rect};
use crate::texture::PageTextures;

#[derive(Debug, Default)]
pub struct Page {
    rect: Rect,
    /// Corner being lifted during the current gesture.
    pub origin: Point,
    /// Corner opposite the origin.
    pub diagonal: Point,
    pub textures: PageTextures,
}

impl Page {
    pub fn new(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self { rect: Rect::new(left, right, top, bottom), ..Default::default() }
    }

    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn left(&self) -> f32 {
        self.rect.left
    }

    pub fn right(&self) -> f32 {
        self.rect.right
    }

    pub fn top(&self) -> f32 {
        self.rect.top
    }

    pub fn bottom(&self) -> f32 {
        self.rect.bottom
    }

    pub fn width(&self) -> f32 {
        self.rect.width()
    }

    pub fn height(&self) -> f32 {
        self.rect.height()
    }

    pub fn is_left_page(&self) -> bool {
        self.rect.right <= 0.0
    }

    pub fn is_right_page(&self) -> bool {
        self.rect.left >= 0.0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.rect.contains(x, y)
    }

    /// Pick the gesture corners.  With two pages the left page lifts its
    /// outer left edge, otherwise the right edge lifts.  A finger moving up
    /// (`is_top_area`) lifts a bottom corner.
    pub fn set_origin_diagonal_points(&mut self, has_second_page: bool, is_top_area: bool) {
        if has_second_page && self.rect.left < 0.0 {
            self.origin.x = self.rect.left;
            self.diagonal.x = self.rect.right;
        } else {
            self.origin.x = self.rect.right;
            self.diagonal.x = self.rect.left;
        }

        if is_top_area {
            self.origin.y = self.rect.bottom;
            self.diagonal.y = self.rect.top;
        } else {
            self.origin.y = self.rect.top;
            self.diagonal.y = self.rect.bottom;
        }
    }

    /// The finger crossed the origin's horizontal edge: lift the other corner.
    pub fn invert_y_of_origin(&mut self) {
        std::mem::swap(&mut self.origin.y, &mut self.diagonal.y);
    }

    /// Whether `x` lies within `ratio` of the page width from the origin edge.
    pub fn is_x_in_range(&self, x: f32, ratio: f32) -> bool {
        let w = self.width() * ratio;
        if self.origin.x < 0.0 {
            x < self.origin.x + w
        } else {
            x > self.origin.x - w
        }
    }

    /// Whether `x` lies beyond the diagonal edge, away from the origin.
    pub fn is_x_outside_page(&self, x: f32) -> bool {
        if self.origin.x < 0.0 {
            x > self.diagonal.x
        } else {
            x < self.diagonal.x
        }
    }

    pub fn texture_x(&self, x: f32) -> f32 {
        let w = self.width();
        if w > 0.0 { (x - self.rect.left) / w } else { 0.0 }
    }

    pub fn texture_y(&self, y: f32) -> f32 {
        let h = self.height();
        if h > 0.0 { (self.rect.top - y) / h } else { 0.0 }
    }

    /// Two triangles covering the page at depth `z`.
    pub fn full_quad(&self, z: f32) -> Triangles<MeshVertex> {
        let r = &self.rect;
        let mut quad = Triangles::new();
        quad.vertices = vec![
            MeshVertex::new(r.left, r.top, z, 0.0, 0.0, 0.0),
            MeshVertex::new(r.right, r.top, z, 0.0, 1.0, 0.0),
            MeshVertex::new(r.left, r.bottom, z, 0.0, 0.0, 1.0),
            MeshVertex::new(r.right, r.bottom, z, 0.0, 1.0, 1.0),
        ];
        quad.indices = vec![0, 2, 1, 1, 2, 3];
        quad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page_lifts_right_edge() {
        let mut p = Page::new(-500.0, 500.0, 750.0, -750.0);
        p.set_origin_diagonal_points(false, true);
        assert_eq!(p.origin, Point::new(500.0, -750.0));
        assert_eq!(p.diagonal, Point::new(-500.0, 750.0));

        p.invert_y_of_origin();
        assert_eq!(p.origin, Point::new(500.0, 750.0));
        assert_eq!(p.diagonal, Point::new(-500.0, -750.0));
    }

    #[test]
    fn left_page_lifts_left_edge_in_double_mode() {
        let mut p = Page::new(-1000.0, 0.0, 750.0, -750.0);
        assert!(p.is_left_page() && !p.is_right_page());
        p.set_origin_diagonal_points(true, false);
        assert_eq!(p.origin, Point::new(-1000.0, 750.0));
        assert_eq!(p.diagonal.x, 0.0);
        assert!(p.is_x_in_range(-700.0, 0.4));
        assert!(!p.is_x_in_range(-500.0, 0.4));
        assert!(p.is_x_outside_page(10.0));
        assert!(!p.is_x_outside_page(-10.0));
    }

    #[test]
    fn right_page_ranges() {
        let mut p = Page::new(0.0, 1000.0, 750.0, -750.0);
        assert!(p.is_right_page());
        p.set_origin_diagonal_points(true, true);
        assert_eq!(p.origin.x, 1000.0);
        assert!(p.is_x_in_range(700.0, 0.4));
        assert!(!p.is_x_in_range(500.0, 0.4));
        assert!(p.is_x_outside_page(-1.0));
    }

    #[test]
    fn texture_coordinates() {
        let p = Page::new(-500.0, 500.0, 750.0, -750.0);
        assert_eq!(p.texture_x(-500.0), 0.0);
        assert_eq!(p.texture_x(500.0), 1.0);
        assert_eq!(p.texture_y(750.0), 0.0);
        assert_eq!(p.texture_y(-750.0), 1.0);
        let quad = p.full_quad(-1.0);
        assert_eq!(quad.triangle_count(), 2);
        assert!(quad.vertices.iter().all(|v| v.position[2] == -1.0));
    }
}
