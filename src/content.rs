// ============================================================================
// CONTENT — page bitmaps for the demo book
// ============================================================================
//
// The engine never decides what a page shows; a `ContentRasterizer` is handed
// to the book controller and asked for page N at the page's pixel size.
//
//   SolidRasterizer — one flat colour per page, cheap and deterministic
//   PaperRasterizer — paper background with ruled lines and the page number
//                     set in a system font (ab_glyph + font-kit)
// ============================================================================

use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use rayon::prelude::*;

use crate::error::{FlipError, Result};
use crate::texture::Bitmap;

pub trait ContentRasterizer {
    /// RGBA bitmap for 1-based page `page`.
    fn rasterize(&mut self, page: u32, width: u32, height: u32) -> Result<Bitmap>;
}

fn check_request(page: u32, width: u32, height: u32) -> Result<()> {
    if page == 0 {
        return Err(FlipError::invalid("pages are numbered from 1"));
    }
    if width == 0 || height == 0 {
        return Err(FlipError::invalid(format!("page bitmap {width}x{height}")));
    }
    Ok(())
}

// ============================================================================
// SOLID
// ============================================================================

/// Cycles through a palette, one colour per page.
#[derive(Clone, Debug)]
pub struct SolidRasterizer {
    palette: Vec<[u8; 4]>,
}

impl Default for SolidRasterizer {
    fn default() -> Self {
        Self {
            palette: vec![
                [0xF4, 0xEC, 0xD8, 0xFF],
                [0xD8, 0xE4, 0xF4, 0xFF],
                [0xE4, 0xF4, 0xD8, 0xFF],
                [0xF4, 0xD8, 0xE4, 0xFF],
            ],
        }
    }
}

impl SolidRasterizer {
    pub fn new(palette: Vec<[u8; 4]>) -> Result<Self> {
        if palette.is_empty() {
            return Err(FlipError::invalid("empty palette"));
        }
        Ok(Self { palette })
    }

    pub fn color_of(&self, page: u32) -> [u8; 4] {
        self.palette[(page.saturating_sub(1) as usize) % self.palette.len()]
    }
}

impl ContentRasterizer for SolidRasterizer {
    fn rasterize(&mut self, page: u32, width: u32, height: u32) -> Result<Bitmap> {
        check_request(page, width, height)?;
        Ok(Bitmap::solid(width, height, self.color_of(page)))
    }
}

// ============================================================================
// PAPER
// ============================================================================

const PAPER: [u8; 3] = [0xFA, 0xF6, 0xEC];
const RULE: [u8; 3] = [0xC8, 0xD4, 0xE8];
const INK: [u8; 3] = [0x30, 0x2C, 0x28];
/// Line pitch and digit height as fractions of the page height.
const RULE_PITCH_RATIO: f32 = 1.0 / 24.0;
const NUMBER_SIZE_RATIO: f32 = 1.0 / 6.0;

/// Paper-like pages.  Without a font only the paper is drawn.
#[derive(Clone, Default)]
pub struct PaperRasterizer {
    font: Option<FontArc>,
}

impl std::fmt::Debug for PaperRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperRasterizer").field("has_font", &self.font.is_some()).finish()
    }
}

impl PaperRasterizer {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// Look up `family` through the platform font source.  Falls back to
    /// fontless paper when the family can't be loaded.
    pub fn with_system_font(family: &str) -> Self {
        let font = load_system_font(family);
        if font.is_none() {
            log::warn!("font family '{family}' not found, page numbers disabled");
        }
        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }
}

impl ContentRasterizer for PaperRasterizer {
    fn rasterize(&mut self, page: u32, width: u32, height: u32) -> Result<Bitmap> {
        check_request(page, width, height)?;
        let mut buf = paper(width, height);
        if let Some(font) = &self.font {
            let size = (height as f32 * NUMBER_SIZE_RATIO).max(8.0);
            draw_centered(&mut buf, width, height, font, &page.to_string(), size);
        }
        let image = image::RgbaImage::from_raw(width, height, buf)
            .ok_or_else(|| FlipError::Other("page buffer size mismatch".into()))?;
        Ok(Bitmap::from_rgba(image))
    }
}

/// Paper background with ruled lines, filled row by row on the rayon pool.
fn paper(width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 4;
    let mut buf = vec![0u8; row_bytes * height as usize];
    let pitch = ((height as f32 * RULE_PITCH_RATIO) as usize).max(2);

    buf.par_chunks_mut(row_bytes).enumerate().for_each(|(y, row)| {
        // First pitch stays blank as a header margin.
        let rgb = if y >= pitch && y % pitch == 0 { RULE } else { PAPER };
        for px in row.chunks_exact_mut(4) {
            px[..3].copy_from_slice(&rgb);
            px[3] = 255;
        }
    });
    buf
}

fn layout(font: &FontArc, text: &str, size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(size);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor = 0.0f32;
    let mut last: Option<GlyphId> = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor));
        cursor += scaled.h_advance(id);
        last = Some(id);
    }
    (glyphs, cursor)
}

/// Blend `text` in ink, centred on the page.
fn draw_centered(buf: &mut [u8], width: u32, height: u32, font: &FontArc, text: &str, size: f32) {
    let scaled = font.as_scaled(size);
    let (glyphs, total) = layout(font, text, size);
    let origin_x = (width as f32 - total) * 0.5;
    let baseline = (height as f32 + scaled.ascent() + scaled.descent()) * 0.5;

    for (id, x) in glyphs {
        let glyph = id.with_scale_and_position(size, point(origin_x + x, baseline));
        let Some(outline) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outline.px_bounds();
        outline.draw(|gx, gy, coverage| {
            let px = bounds.min.x as i32 + gx as i32;
            let py = bounds.min.y as i32 + gy as i32;
            if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                return;
            }
            let at = (py as usize * width as usize + px as usize) * 4;
            let a = coverage.clamp(0.0, 1.0);
            for c in 0..3 {
                let dst = buf[at + c] as f32;
                buf[at + c] = (dst + (INK[c] as f32 - dst) * a).round() as u8;
            }
        });
    }
}

/// Best regular-weight match for `family`, as an ab_glyph font.
pub fn load_system_font(family: &str) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let handle = SystemSource::new()
        .select_best_match(&[FamilyName::Title(family.to_string()), FamilyName::SansSerif], &Properties::new())
        .ok()?;
    let font = handle.load().ok()?;
    let data = font.copy_font_data()?;
    FontArc::try_from_vec((*data).clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_pages_cycle_palette() {
        let mut r = SolidRasterizer::default();
        let a = r.rasterize(1, 4, 4).unwrap();
        let e = r.rasterize(5, 4, 4).unwrap();
        assert_eq!(a, e);
        assert_ne!(r.color_of(1), r.color_of(2));
        assert_eq!(&a.data()[..4], &r.color_of(1));
    }

    #[test]
    fn page_zero_and_empty_sizes_are_rejected() {
        let mut r = SolidRasterizer::default();
        assert_eq!(r.rasterize(0, 4, 4).unwrap_err().code(), -4);
        assert_eq!(r.rasterize(1, 0, 4).unwrap_err().code(), -4);
        assert!(SolidRasterizer::new(Vec::new()).is_err());
    }

    #[test]
    fn paper_without_font_has_rules() {
        let mut r = PaperRasterizer::new(None);
        let bmp = r.rasterize(3, 20, 48).unwrap();
        assert_eq!((bmp.width(), bmp.height()), (20, 48));
        bmp.validate().unwrap();

        let pixel = |y: usize| &bmp.data()[y * 20 * 4..y * 20 * 4 + 3];
        assert_eq!(pixel(0), &PAPER);
        assert_eq!(pixel(1), &PAPER);
        assert_eq!(pixel(2), &RULE);
        assert_eq!(pixel(3), &PAPER);
        assert!(bmp.data().chunks_exact(4).all(|p| p[3] == 255));
    }
}
