// ============================================================================
// SHADOWS — fold edge / fold base bands and the back-of-fold light ramp
// ============================================================================
//
//   base shadow   cast on the revealed page, along the curl's silhouette,
//                 fading toward the origin corner
//   edge shadow   cast by the flipped-over flap onto the page under it,
//                 along both flipped edges with a rounded corner at T
//
// Both bands are plain per-vertex gradients (grey level + alpha) blended at
// draw time, so nothing here touches the GPU.
// ============================================================================

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{FlipError, Result};
use crate::frame::{ShadowVertex, Triangles};
use crate::geometry::{FoldGeometry, Point, Rect};
use crate::texture::{Bitmap, PixelFormat};

/// Depth of the base shadow: above the revealed page (-1), below the fold.
pub const BASE_SHADOW_Z: f32 = -0.5;
/// Depth of the edge shadow: just above the flat page.
pub const EDGE_SHADOW_Z: f32 = 1.0;
/// Segments of the rounded corner around the touch point.
const CORNER_SEGMENTS: usize = 10;

/// Width range of a shadow band.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadowWidth {
    pub min: f32,
    pub max: f32,
    /// Multiplier applied to the curl radius.
    pub ratio: f32,
}

impl ShadowWidth {
    pub fn new(min: f32, max: f32, ratio: f32) -> Result<Self> {
        let width = Self { min, max, ratio };
        width.validate()?;
        Ok(width)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min >= 0.0 && self.max >= 0.0 && self.min <= self.max) {
            return Err(FlipError::invalid(format!(
                "shadow width range [{}, {}]",
                self.min, self.max
            )));
        }
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(FlipError::invalid(format!("shadow width ratio {}", self.ratio)));
        }
        Ok(())
    }

    /// Width for a curvature ratio in `[0, 1]`: linear from `min` to `max`.
    pub fn width_at(&self, curvature: f32) -> f32 {
        let c = curvature.clamp(0.0, 1.0);
        self.min + (self.max - self.min) * c
    }

    /// Curvature ratio of a curl radius for this range.
    pub fn curvature_of(&self, radius: f32) -> f32 {
        let span = self.max - self.min;
        if span <= f32::EPSILON {
            return if radius * self.ratio >= self.max { 1.0 } else { 0.0 };
        }
        ((radius * self.ratio - self.min) / span).clamp(0.0, 1.0)
    }

    /// Width for a curl radius: `clamp(radius * ratio, min, max)`.
    pub fn width(&self, radius: f32) -> f32 {
        self.width_at(self.curvature_of(radius))
    }
}

/// Grey level and alpha at both ends of a shadow band.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadowColor {
    pub start_color: f32,
    pub start_alpha: f32,
    pub end_color: f32,
    pub end_alpha: f32,
}

impl ShadowColor {
    pub fn new(start_color: f32, start_alpha: f32, end_color: f32, end_alpha: f32) -> Result<Self> {
        let color = Self { start_color, start_alpha, end_color, end_alpha };
        color.validate()?;
        Ok(color)
    }

    pub fn validate(&self) -> Result<()> {
        let all = [self.start_color, self.start_alpha, self.end_color, self.end_alpha];
        if all.iter().all(|c| (0.0..=1.0).contains(c)) {
            Ok(())
        } else {
            Err(FlipError::invalid(format!("shadow color {:?}", all)))
        }
    }

    fn start(&self, p: Point, z: f32) -> ShadowVertex {
        ShadowVertex { position: [p.x, p.y, z], color: self.start_color, alpha: self.start_alpha }
    }

    fn end(&self, p: Point, z: f32) -> ShadowVertex {
        ShadowVertex { position: [p.x, p.y, z], color: self.end_color, alpha: self.end_alpha }
    }
}

impl Triangles<ShadowVertex> {
    /// Quad from segment `a..b` (start colour) to `a+offset..b+offset` (end).
    fn push_band(&mut self, a: Point, b: Point, offset: Point, z: f32, color: &ShadowColor) {
        let i = self.vertices.len() as u32;
        self.vertices.extend([
            color.start(a, z),
            color.start(b, z),
            color.end(a + offset, z),
            color.end(b + offset, z),
        ]);
        self.indices.extend([i, i + 1, i + 2, i + 1, i + 3, i + 2]);
    }

    /// Rounded corner: a fan around `center` sweeping from `from` to `to`
    /// (unit directions) the short way round.
    fn push_corner(
        &mut self,
        center: Point,
        from: Point,
        to: Point,
        radius: f32,
        z: f32,
        color: &ShadowColor,
    ) {
        let a0 = from.y.atan2(from.x);
        let mut sweep = to.y.atan2(to.x) - a0;
        if sweep > PI {
            sweep -= 2.0 * PI;
        } else if sweep < -PI {
            sweep += 2.0 * PI;
        }

        let c = self.vertices.len() as u32;
        self.vertices.push(color.start(center, z));
        for s in 0..=CORNER_SEGMENTS {
            let a = a0 + sweep * s as f32 / CORNER_SEGMENTS as f32;
            let p = center + Point::new(a.cos(), a.sin()) * radius;
            self.vertices.push(color.end(p, z));
        }
        for s in 0..CORNER_SEGMENTS as u32 {
            self.indices.extend([c, c + 1 + s, c + 2 + s]);
        }
    }
}

/// Base shadow: the band just outside the curl silhouette, on the page being
/// revealed, clipped to the fold page.
pub fn base_shadow(
    fold: &FoldGeometry,
    page: &Rect,
    width: &ShadowWidth,
    color: &ShadowColor,
) -> Triangles<ShadowVertex> {
    let mut out = Triangles::new();
    if fold.is_flat() {
        return out;
    }

    let w = width.width(fold.radius);
    let silhouette = fold.base() - fold.radius;
    if w <= 0.0 || silhouette <= 0.0 {
        return out;
    }

    if let Some((a, b)) = page.clip_line(fold.origin, fold.axis(), silhouette) {
        out.push_band(a, b, fold.axis() * -w, BASE_SHADOW_Z, color);
    }
    out
}

/// Edge shadow: bands along both edges of the flipped flap, from the touch
/// point to the curl, plus the rounded corner around the touch point.
///
/// `diagonal` is the page corner opposite the origin; it fixes the directions
/// and lengths of the two page edges that meet at the origin.
pub fn edge_shadow(
    fold: &FoldGeometry,
    diagonal: Point,
    width: &ShadowWidth,
    color: &ShadowColor,
) -> Triangles<ShadowVertex> {
    let mut out = Triangles::new();
    if fold.is_flat() {
        return out;
    }

    let w = width.width(fold.radius);
    // Only points this close to O end up flat on the flap.
    let limit = fold.base() - PI * fold.radius;
    if w <= 0.0 || limit <= 0.0 {
        return out;
    }

    let n = fold.axis();
    let o = fold.origin;
    let touch = fold.reflect(o);
    let span = diagonal - o;
    let ex = Point::new(span.x.signum(), 0.0);
    let ey = Point::new(0.0, span.y.signum());

    // (edge direction, inward direction, edge length)
    let horizontal = (ex, ey, span.x.abs());
    let vertical = (ey, ex, span.y.abs());

    let mut outward = Vec::with_capacity(2);
    for (i, (dir, inward, len)) in [horizontal, vertical].into_iter().enumerate() {
        // A vertical fold folds the horizontal edge onto itself.
        if i == 0 && fold.vertical {
            continue;
        }
        let along = dir.dot(n);
        let reach = if along > 1e-6 { (limit / along).min(len) } else { len };
        if reach <= 1e-3 {
            continue;
        }
        let flipped_dir = dir.reflect(n);
        let out_dir = inward.reflect(n) * -1.0;
        out.push_band(touch, touch + flipped_dir * reach, out_dir * w, EDGE_SHADOW_Z, color);
        outward.push(out_dir);
    }

    if let [a, b] = outward[..] {
        out.push_corner(touch, a, b, w, EDGE_SHADOW_Z, color);
    }
    out
}

/// Colour stops of the back-of-fold light ramp, as (position, ARGB).
const GRADIENT_STOPS: [(f32, u32); 4] = [
    (0.5, 0x00FF_FFFF),
    (0.9, 0x2400_0000),
    (0.94, 0x2410_1010),
    (1.0, 0x4800_0000),
];

pub const GRADIENT_LIGHT_WIDTH: u32 = 256;

fn unpack_argb(c: u32) -> [f32; 4] {
    [
        ((c >> 16) & 0xff) as f32,
        ((c >> 8) & 0xff) as f32,
        (c & 0xff) as f32,
        ((c >> 24) & 0xff) as f32,
    ]
}

/// Premultiplied RGBA of the light ramp at position `t` in `[0, 1]`.
pub fn gradient_light_at(t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let (first_pos, first) = GRADIENT_STOPS[0];
    let mut rgba = unpack_argb(first);
    if t > first_pos {
        for pair in GRADIENT_STOPS.windows(2) {
            let (p0, c0) = pair[0];
            let (p1, c1) = pair[1];
            if t <= p1 {
                let k = (t - p0) / (p1 - p0);
                let (a, b) = (unpack_argb(c0), unpack_argb(c1));
                for ch in 0..4 {
                    rgba[ch] = a[ch] + (b[ch] - a[ch]) * k;
                }
                break;
            }
        }
    }
    let alpha = rgba[3] / 255.0;
    [
        (rgba[0] * alpha).round() as u8,
        (rgba[1] * alpha).round() as u8,
        (rgba[2] * alpha).round() as u8,
        rgba[3].round() as u8,
    ]
}

/// The 256x1 light ramp sampled by the back of the fold.
pub fn gradient_light_bitmap() -> Bitmap {
    let data = (0..GRADIENT_LIGHT_WIDTH)
        .flat_map(|x| gradient_light_at(x as f32 / (GRADIENT_LIGHT_WIDTH - 1) as f32))
        .collect();
    Bitmap::new(GRADIENT_LIGHT_WIDTH, 1, PixelFormat::Rgba8888, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_color() -> ShadowColor {
        ShadowColor::new(0.1, 0.25, 0.3, 0.0).unwrap()
    }

    #[test]
    fn width_interpolates_between_bounds() {
        let w = ShadowWidth::new(5.0, 60.0, 0.3).unwrap();
        assert_eq!(w.width_at(0.0), 5.0);
        assert_eq!(w.width_at(1.0), 60.0);
        assert_eq!(w.width_at(0.5), 32.5);
        assert_eq!(w.width_at(7.0), 60.0);
    }

    #[test]
    fn width_from_radius_is_clamped() {
        let w = ShadowWidth::new(5.0, 30.0, 0.25).unwrap();
        assert_eq!(w.width(0.0), 5.0);
        assert!((w.width(80.0) - 20.0).abs() < 1e-4);
        assert_eq!(w.width(1000.0), 30.0);
    }

    #[test]
    fn invalid_widths_and_colors_are_rejected() {
        assert!(ShadowWidth::new(10.0, 5.0, 0.5).is_err());
        assert!(ShadowWidth::new(-1.0, 5.0, 0.5).is_err());
        assert!(ShadowWidth::new(1.0, 5.0, 0.0).is_err());
        assert!(ShadowWidth::new(1.0, 5.0, 1.5).is_err());
        assert!(ShadowColor::new(1.1, 0.0, 0.0, 0.0).is_err());
        assert!(ShadowColor::new(0.0, 0.0, 0.0, -0.1).is_err());
    }

    #[test]
    fn flat_fold_casts_nothing() {
        let o = Point::new(500.0, -750.0);
        let fold = FoldGeometry::vertical(o, 750.0, 500.0, 0.8);
        let page = Rect::new(-500.0, 500.0, 750.0, -750.0);
        let w = ShadowWidth::new(2.0, 40.0, 0.4).unwrap();
        assert!(base_shadow(&fold, &page, &w, &edge_color()).is_empty());
        assert!(edge_shadow(&fold, Point::new(-500.0, 750.0), &w, &edge_color()).is_empty());
    }

    #[test]
    fn vertical_fold_base_shadow_spans_page_height() {
        let o = Point::new(500.0, -750.0);
        let fold = FoldGeometry::vertical(o, 750.0, 0.0, 0.8);
        let page = Rect::new(-500.0, 500.0, 750.0, -750.0);
        let w = ShadowWidth::new(2.0, 40.0, 0.4).unwrap();
        let band = base_shadow(&fold, &page, &w, &edge_color());
        assert_eq!(band.triangle_count(), 2);

        let silhouette_x = o.x - (fold.base() - fold.radius);
        let ys: Vec<f32> = band.vertices.iter().map(|v| v.position[1]).collect();
        assert!(ys.iter().any(|y| (*y - 750.0).abs() < 1e-3));
        assert!(ys.iter().any(|y| (*y + 750.0).abs() < 1e-3));
        // Start edge on the silhouette, end edge toward the origin.
        assert!((band.vertices[0].position[0] - silhouette_x).abs() < 1e-3);
        assert!(band.vertices[2].position[0] > silhouette_x);
        assert!(band.vertices.iter().all(|v| v.position[2] == BASE_SHADOW_Z));
    }

    #[test]
    fn vertical_fold_edge_shadow_follows_flipped_side() {
        let o = Point::new(500.0, -750.0);
        let fold = FoldGeometry::vertical(o, 750.0, 0.0, 0.8);
        let w = ShadowWidth::new(5.0, 30.0, 0.25).unwrap();
        let band = edge_shadow(&fold, Point::new(-500.0, 750.0), &w, &edge_color());
        // Only the vertical edge: no corner fan without two edges.
        assert_eq!(band.triangle_count(), 2);
        let start = band.vertices[0];
        let end = band.vertices[2];
        assert!((start.position[0] - 0.0).abs() < 1e-3);
        assert!(end.position[0] < 0.0, "shadow falls away from the flap");
        assert_eq!(start.alpha, 0.25);
        assert_eq!(end.alpha, 0.0);
    }

    #[test]
    fn slanted_fold_edge_shadow_has_corner() {
        let o = Point::new(500.0, -750.0);
        let fold = FoldGeometry::slope(o, Point::new(0.0, -500.0), 0.8);
        let w = ShadowWidth::new(5.0, 30.0, 0.25).unwrap();
        let band = edge_shadow(&fold, Point::new(-500.0, 750.0), &w, &edge_color());
        assert_eq!(band.triangle_count(), 2 + 2 + CORNER_SEGMENTS);
        let corner_center = band.vertices[8];
        assert!((corner_center.position[0] - fold.touch.x).abs() < 1e-2);
        assert!((corner_center.position[1] - fold.touch.y).abs() < 1e-2);
    }

    #[test]
    fn light_ramp_stops() {
        assert_eq!(gradient_light_at(0.0), [0, 0, 0, 0]);
        assert_eq!(gradient_light_at(0.5), [0, 0, 0, 0]);
        assert_eq!(gradient_light_at(1.0), [0, 0, 0, 0x48]);
        assert_eq!(gradient_light_at(0.9), [0, 0, 0, 0x24]);
        let bmp = gradient_light_bitmap();
        assert_eq!((bmp.width(), bmp.height()), (256, 1));
        assert_eq!(&bmp.data()[255 * 4..], &[0, 0, 0, 0x48]);
    }
}
