// ============================================================================
// PAGE TEXTURES — bitmaps, per-page texture slots and deferred recycling
// ============================================================================
//
// Every page owns three slots:
//
//   First   the page content currently shown
//   Second  what is revealed underneath while the page curls
//   Back    what is printed on the back of the curled page (falls back to
//           First when unset)
//
// A slot owns its texture handle exclusively.  Moving a texture between
// slots is a `take()`, never a copy, and anything replaced goes into the
// page's recycler.  The recycler is drained once per frame by the engine,
// which hands the ids to the render backend for deletion.
// ============================================================================

use crate::error::{FlipError, Result};

/// Opaque handle of a texture living in a render backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Pixel layouts a page bitmap may arrive in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8 bits per channel, R G B A byte order.
    Rgba8888,
    /// Little-endian 5-6-5, no alpha.
    Rgb565,
    /// Coverage only.  Recognised but never uploadable.
    Alpha8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            PixelFormat::Rgb565 => 2,
            PixelFormat::Alpha8 => 1,
        }
    }
}

/// An externally rasterized page image.
#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Bitmap {
    /// Tightly packed bitmap (`stride == width * bpp`).
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        let stride = width as usize * format.bytes_per_pixel();
        Self { width, height, stride, format, data }
    }

    /// Bitmap with padded rows.
    pub fn with_stride(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Self {
        Self { width, height, stride, format, data }
    }

    pub fn from_rgba(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, PixelFormat::Rgba8888, image.into_raw())
    }

    /// Single-colour RGBA bitmap, handy for placeholders and tests.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, PixelFormat::Rgba8888, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Reject anything the backends can't upload as-is.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FlipError::GetBitmapInfo(format!(
                "empty bitmap {}x{}",
                self.width, self.height
            )));
        }
        if self.format == PixelFormat::Alpha8 {
            return Err(FlipError::UnsupportedBitmapFormat(format!("{:?}", self.format)));
        }
        let row = self.width as usize * self.format.bytes_per_pixel();
        if self.stride < row {
            return Err(FlipError::GetBitmapInfo(format!(
                "stride {} shorter than row of {} bytes",
                self.stride, row
            )));
        }
        let needed = self
            .stride
            .checked_mul(self.height as usize - 1)
            .and_then(|n| n.checked_add(row))
            .ok_or_else(|| {
                FlipError::GetBitmapInfo(format!(
                    "stride {} x height {} overflows",
                    self.stride, self.height
                ))
            })?;
        if self.data.len() < needed {
            return Err(FlipError::GetBitmapData(format!(
                "{} bytes, need {}",
                self.data.len(),
                needed
            )));
        }
        Ok(())
    }

    /// RGBA of one pixel.  Caller guarantees a validated bitmap and in-range
    /// coordinates.
    fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let at = y * self.stride + x * self.format.bytes_per_pixel();
        match self.format {
            PixelFormat::Rgba8888 => [
                self.data[at],
                self.data[at + 1],
                self.data[at + 2],
                self.data[at + 3],
            ],
            PixelFormat::Rgb565 => {
                let v = u16::from_le_bytes([self.data[at], self.data[at + 1]]);
                let r = ((v >> 11) & 0x1f) as u32;
                let g = ((v >> 5) & 0x3f) as u32;
                let b = (v & 0x1f) as u32;
                [
                    (r * 255 / 31) as u8,
                    (g * 255 / 63) as u8,
                    (b * 255 / 31) as u8,
                    255,
                ]
            }
            PixelFormat::Alpha8 => [0, 0, 0, self.data[at]],
        }
    }

    /// Tightly packed RGBA8 copy for upload.
    pub fn to_rgba8(&self) -> Result<Vec<u8>> {
        self.validate()?;
        if self.format == PixelFormat::Rgba8888 && self.stride == self.width as usize * 4 {
            let len = self.width as usize * self.height as usize * 4;
            return Ok(self.data[..len].to_vec());
        }
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                out.extend_from_slice(&self.pixel(x, y));
            }
        }
        Ok(out)
    }

    /// Average colour of five `count`-pixel diagonals: the four corners and
    /// the centre.  `count` is capped at a third of either dimension.
    pub fn average_color(&self, count: usize) -> Result<[u8; 4]> {
        self.validate()?;
        let (w, h) = (self.width as usize, self.height as usize);
        let count = count.min(w / 3).min(h / 3).max(1).min(w).min(h);

        let right = w - count;
        let bottom = h - count;
        let center_left = right / 2;
        let center_top = bottom / 2;

        let mut sum = [0u32; 4];
        for i in 0..count {
            for (x, y) in [
                (i, i),
                (center_left + i, center_top + i),
                (right + i, i),
                (i, bottom + i),
                (right + i, bottom + i),
            ] {
                let px = self.pixel(x, y);
                for (s, c) in sum.iter_mut().zip(px) {
                    *s += c as u32;
                }
            }
        }

        let n = (count * 5) as u32;
        Ok(sum.map(|s| (s / n) as u8))
    }
}

/// The three logical slots of a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    First = 0,
    Second = 1,
    Back = 2,
}

/// An uploaded page texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageTexture {
    pub id: TextureId,
    /// Average colour of the source bitmap, used to tint the back of a fold.
    pub mask_color: [f32; 3],
    pub width: u32,
    pub height: u32,
}

/// Texture ids waiting to be released by the render thread.
#[derive(Debug, Default)]
pub struct TextureRecycler {
    ids: Vec<TextureId>,
}

impl TextureRecycler {
    pub fn add(&mut self, texture: Option<PageTexture>) {
        if let Some(t) = texture {
            self.ids.push(t.id);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn drain(&mut self) -> Vec<TextureId> {
        std::mem::take(&mut self.ids)
    }
}

/// Slots of one page plus its recycler.
#[derive(Debug, Default)]
pub struct PageTextures {
    slots: [Option<PageTexture>; 3],
    recycler: TextureRecycler,
}

impl PageTextures {
    pub fn get(&self, kind: TextureKind) -> Option<&PageTexture> {
        self.slots[kind as usize].as_ref()
    }

    pub fn is_set(&self, kind: TextureKind) -> bool {
        self.slots[kind as usize].is_some()
    }

    /// Install a texture, sending whatever was there to the recycler.
    pub fn set(&mut self, kind: TextureKind, texture: PageTexture) {
        let old = self.slots[kind as usize].replace(texture);
        self.recycler.add(old);
    }

    /// Invalidate a slot.
    pub fn clear(&mut self, kind: TextureKind) {
        let old = self.slots[kind as usize].take();
        self.recycler.add(old);
    }

    /// Texture for the back of the fold: Back if set, else First.
    pub fn back_texture(&self) -> Option<&PageTexture> {
        self.get(TextureKind::Back).or_else(|| self.get(TextureKind::First))
    }

    /// Forward flip committed: the revealed page becomes the shown one.
    pub fn set_first_texture_with_second(&mut self) {
        let first = self.slots[TextureKind::First as usize].take();
        self.recycler.add(first);
        self.slots[TextureKind::First as usize] = self.slots[TextureKind::Second as usize].take();
    }

    /// Backward flip started: the shown page moves underneath.
    pub fn set_second_texture_with_first(&mut self) {
        let second = self.slots[TextureKind::Second as usize].take();
        self.recycler.add(second);
        self.slots[TextureKind::Second as usize] = self.slots[TextureKind::First as usize].take();
    }

    /// Double-page forward commit.  Called on the stationary page with the
    /// page that just flipped as `rhs`.
    pub fn swap_textures_with(&mut self, rhs: &mut PageTextures) {
        use TextureKind::*;

        let second = self.slots[Second as usize].take();
        self.recycler.add(second);
        self.slots[Second as usize] = self.slots[First as usize].take();

        let back = self.slots[Back as usize].take();
        self.recycler.add(back);
        self.slots[Back as usize] = rhs.slots[First as usize].take();

        self.slots[First as usize] = rhs.slots[Back as usize].take();
        rhs.slots[First as usize] = rhs.slots[Second as usize].take();
    }

    /// Drain ids released since the last call.
    pub fn recycle(&mut self) -> Vec<TextureId> {
        self.recycler.drain()
    }

    /// Release every slot and everything pending.
    pub fn recycle_all(&mut self) -> Vec<TextureId> {
        for slot in self.slots.iter_mut() {
            self.recycler.add(slot.take());
        }
        self.recycler.drain()
    }

    pub fn pending(&self) -> usize {
        self.recycler.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tex(id: u64) -> PageTexture {
        PageTexture { id: TextureId(id), mask_color: [0.0; 3], width: 4, height: 4 }
    }

    fn filled(first: u64, second: u64, back: u64) -> PageTextures {
        let mut t = PageTextures::default();
        t.set(TextureKind::First, tex(first));
        t.set(TextureKind::Second, tex(second));
        t.set(TextureKind::Back, tex(back));
        t
    }

    #[test]
    fn set_marks_valid_and_recycles_previous() {
        let mut t = PageTextures::default();
        assert!(!t.is_set(TextureKind::First));
        t.set(TextureKind::First, tex(1));
        assert!(t.is_set(TextureKind::First));
        t.set(TextureKind::First, tex(2));
        assert_eq!(t.get(TextureKind::First).unwrap().id, TextureId(2));
        assert_eq!(t.recycle(), vec![TextureId(1)]);
        assert!(t.recycle().is_empty());
    }

    #[test]
    fn back_falls_back_to_first() {
        let mut t = PageTextures::default();
        t.set(TextureKind::First, tex(7));
        assert_eq!(t.back_texture().unwrap().id, TextureId(7));
        t.set(TextureKind::Back, tex(8));
        assert_eq!(t.back_texture().unwrap().id, TextureId(8));
        t.clear(TextureKind::Back);
        assert_eq!(t.back_texture().unwrap().id, TextureId(7));
        assert_eq!(t.recycle(), vec![TextureId(8)]);
    }

    #[test]
    fn first_with_second_moves_without_sharing() {
        let mut t = filled(1, 2, 3);
        t.set_first_texture_with_second();
        assert_eq!(t.get(TextureKind::First).unwrap().id, TextureId(2));
        assert!(!t.is_set(TextureKind::Second));
        assert_eq!(t.recycle(), vec![TextureId(1)]);
    }

    #[test]
    fn second_with_first_moves_without_sharing() {
        let mut t = filled(1, 2, 3);
        t.set_second_texture_with_first();
        assert_eq!(t.get(TextureKind::Second).unwrap().id, TextureId(1));
        assert!(!t.is_set(TextureKind::First));
        assert_eq!(t.recycle(), vec![TextureId(2)]);
    }

    #[test]
    fn swap_with_opposite_page() {
        let mut fold = filled(1, 2, 3);
        let mut other = filled(4, 5, 6);
        fold.swap_textures_with(&mut other);

        assert_eq!(fold.get(TextureKind::First).unwrap().id, TextureId(6));
        assert_eq!(fold.get(TextureKind::Second).unwrap().id, TextureId(1));
        assert_eq!(fold.get(TextureKind::Back).unwrap().id, TextureId(4));
        assert_eq!(other.get(TextureKind::First).unwrap().id, TextureId(5));
        assert!(!other.is_set(TextureKind::Second));
        assert!(!other.is_set(TextureKind::Back));

        let mut released = fold.recycle();
        released.sort();
        assert_eq!(released, vec![TextureId(2), TextureId(3)]);
    }

    #[test]
    fn recycle_all_empties_every_slot() {
        let mut t = filled(1, 2, 3);
        t.set(TextureKind::First, tex(9));
        let mut ids = t.recycle_all();
        ids.sort();
        assert_eq!(ids, vec![TextureId(1), TextureId(2), TextureId(3), TextureId(9)]);
        for kind in [TextureKind::First, TextureKind::Second, TextureKind::Back] {
            assert!(!t.is_set(kind));
        }
        assert_eq!(t.pending(), 0);
    }

    #[test]
    fn bitmap_validation() {
        assert!(matches!(
            Bitmap::new(0, 4, PixelFormat::Rgba8888, vec![]).validate(),
            Err(FlipError::GetBitmapInfo(_))
        ));
        assert!(matches!(
            Bitmap::new(2, 2, PixelFormat::Rgba8888, vec![0; 15]).validate(),
            Err(FlipError::GetBitmapData(_))
        ));
        assert!(matches!(
            Bitmap::new(2, 2, PixelFormat::Alpha8, vec![0; 4]).validate(),
            Err(FlipError::UnsupportedBitmapFormat(_))
        ));
        assert!(Bitmap::solid(2, 2, [1, 2, 3, 4]).validate().is_ok());
    }

    #[test]
    fn oversized_layout_is_rejected_not_wrapped() {
        let bmp = Bitmap::with_stride(4, u32::MAX, usize::MAX / 2, PixelFormat::Rgba8888, vec![0; 64]);
        let err = bmp.validate().unwrap_err();
        assert!(matches!(err, FlipError::GetBitmapInfo(_)), "{err:?}");
        assert_eq!(err.code(), -13);
    }

    #[test]
    fn rgb565_expands_to_rgba() {
        // Pure red, pure green.
        let data = [0x00, 0xF8, 0xE0, 0x07];
        let bmp = Bitmap::new(2, 1, PixelFormat::Rgb565, data.to_vec());
        assert_eq!(bmp.to_rgba8().unwrap(), vec![255, 0, 0, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn padded_rows_are_repacked() {
        let data = vec![
            1, 1, 1, 1, 9, 9, //
            2, 2, 2, 2, 9, 9,
        ];
        let bmp = Bitmap::with_stride(1, 2, 6, PixelFormat::Rgba8888, data);
        assert_eq!(bmp.to_rgba8().unwrap(), vec![1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn average_of_solid_is_the_colour() {
        let bmp = Bitmap::solid(120, 90, [200, 100, 50, 255]);
        assert_eq!(bmp.average_color(30).unwrap(), [200, 100, 50, 255]);
    }

    #[test]
    fn average_samples_corners() {
        // 9x9 white page with a black top-left 3x3 block: count caps at 3 so
        // one of five diagonals is black.
        let mut img = image::RgbaImage::from_pixel(9, 9, image::Rgba([255, 255, 255, 255]));
        for y in 0..3 {
            for x in 0..3 {
                img.put_pixel(x, y, image::Rgba([0, 0, 0, 255]));
            }
        }
        let avg = Bitmap::from_rgba(img).average_color(30).unwrap();
        assert_eq!(avg, [204, 204, 204, 255]);
    }
}
