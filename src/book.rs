// ============================================================================
// BOOK — page numbering and texture feeding on top of the engine
// ============================================================================
//
// The engine only knows textures.  `Book` knows which page number belongs in
// which slot, asks its rasterizer for missing ones each frame, and commits
// the page number once a flip animation ends.
//
// Single mode: `page` is the shown page.
// Double mode: `page` is the left page of the open spread, the right page is
// `page + 1`.  Pages past the end render blank.
// ============================================================================

use crate::content::ContentRasterizer;
use crate::engine::PageFlip;
use crate::error::{FlipError, Result};
use crate::render::RenderBackend;
use crate::state::FlipState;
use crate::texture::{Bitmap, TextureKind};

const BLANK: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// What the next frame draws.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderRequest {
    #[default]
    FullPage,
    MovingFrame,
    AnimatingFrame,
}

pub struct Book<R: ContentRasterizer> {
    page: u32,
    count: u32,
    rasterizer: R,
    request: RenderRequest,
}

impl<R: ContentRasterizer> Book<R> {
    pub fn new(count: u32, rasterizer: R) -> Result<Self> {
        if count == 0 {
            return Err(FlipError::invalid("a book needs at least one page"));
        }
        Ok(Self { page: 1, count, rasterizer, request: RenderRequest::FullPage })
    }

    pub fn page_no(&self) -> u32 {
        self.page
    }

    pub fn page_count(&self) -> u32 {
        self.count
    }

    pub fn request(&self) -> RenderRequest {
        self.request
    }

    /// Jump to `page`.  Every texture is dropped and reloaded on the next frame.
    pub fn set_page<B: RenderBackend>(&mut self, engine: &mut PageFlip<B>, page: u32) -> Result<()> {
        if page == 0 || page > self.count {
            return Err(FlipError::invalid(format!("page {page} of {}", self.count)));
        }
        self.page = page;
        for first in [true, false] {
            if first || engine.has_second_page() {
                for kind in [TextureKind::First, TextureKind::Second, TextureKind::Back] {
                    engine.clear_texture(first, kind)?;
                }
            }
        }
        self.request = RenderRequest::FullPage;
        Ok(())
    }

    // ========================================================================
    // CAPABILITIES
    // ========================================================================

    pub fn can_flip_forward<B: RenderBackend>(&self, engine: &PageFlip<B>) -> bool {
        if engine.has_second_page() {
            match engine.page(true) {
                Ok(p) if p.is_left_page() => self.page > 1,
                Ok(_) => self.page + 2 <= self.count,
                Err(_) => false,
            }
        } else {
            self.page < self.count
        }
    }

    pub fn can_flip_backward<B: RenderBackend>(&self, engine: &PageFlip<B>) -> bool {
        !engine.has_second_page() && self.page > 1
    }

    // ========================================================================
    // INPUT
    // ========================================================================

    /// A new touch finishes whatever flip is still pending first.
    pub fn on_finger_down<B: RenderBackend>(&mut self, engine: &mut PageFlip<B>, x: f32, y: f32) -> Result<bool> {
        let state = engine.flip_state();
        if state.is_flipping() || state.is_terminal() {
            engine.abort_animating();
            self.commit(engine)?;
        }
        engine.on_finger_down(x, y)
    }

    /// Ignored while a flip animates.
    pub fn on_finger_move<B: RenderBackend>(&mut self, engine: &mut PageFlip<B>, x: f32, y: f32) -> Result<bool> {
        if engine.is_animating() {
            return Ok(false);
        }
        let (fwd, back) = (self.can_flip_forward(engine), self.can_flip_backward(engine));
        let moved = engine.on_finger_move(x, y, fwd, back)?;
        if moved {
            self.request = RenderRequest::MovingFrame;
        }
        Ok(moved)
    }

    pub fn on_finger_up<B: RenderBackend>(
        &mut self,
        engine: &mut PageFlip<B>,
        x: f32,
        y: f32,
        duration_ms: u32,
    ) -> Result<bool> {
        if engine.is_animating() {
            return Ok(false);
        }
        let (fwd, back) = (self.can_flip_forward(engine), self.can_flip_backward(engine));
        let animating = engine.on_finger_up(x, y, duration_ms, fwd, back)?;
        self.request = if animating { RenderRequest::AnimatingFrame } else { RenderRequest::FullPage };
        Ok(animating)
    }

    // ========================================================================
    // FRAME
    // ========================================================================

    /// Draw one frame.  True while more frames are needed.
    pub fn render<B: RenderBackend>(&mut self, engine: &mut PageFlip<B>) -> Result<bool> {
        engine.recycle_textures();

        match self.request {
            RenderRequest::FullPage => {
                self.fill_pages(engine)?;
                engine.draw_page_frame()?;
                Ok(false)
            }
            RenderRequest::MovingFrame => {
                self.fill_pages(engine)?;
                self.fill_flip(engine)?;
                engine.draw_flip_frame()?;
                Ok(false)
            }
            RenderRequest::AnimatingFrame => {
                self.fill_pages(engine)?;
                self.fill_flip(engine)?;
                if engine.animating()? {
                    engine.draw_flip_frame()?;
                    Ok(true)
                } else {
                    self.commit(engine)?;
                    self.fill_pages(engine)?;
                    engine.draw_page_frame()?;
                    Ok(false)
                }
            }
        }
    }

    /// Apply a finished flip to the page number and texture slots.
    fn commit<B: RenderBackend>(&mut self, engine: &mut PageFlip<B>) -> Result<()> {
        let state = engine.settle();
        if state == FlipState::EndWithForward {
            if engine.has_second_page() {
                let left = engine.page(true)?.is_left_page();
                engine.swap_second_textures_with_first()?;
                self.page = if left { self.page.saturating_sub(2).max(1) } else { self.page + 2 };
            } else {
                engine.set_first_texture_with_second()?;
                self.page += 1;
            }
        }
        log::debug!("{state:?} committed, now on page {}", self.page);
        self.request = RenderRequest::FullPage;
        Ok(())
    }

    /// Front faces of every page.
    fn fill_pages<B: RenderBackend>(&mut self, engine: &mut PageFlip<B>) -> Result<()> {
        if engine.has_second_page() {
            for first in [true, false] {
                let number = if engine.page(first)?.is_left_page() { self.page } else { self.page + 1 };
                self.load(engine, first, TextureKind::First, number)?;
            }
        } else if engine.flip_state() != FlipState::BackwardFlip {
            self.load(engine, true, TextureKind::First, self.page)?;
        }
        Ok(())
    }

    /// Slots a moving flip reveals.
    fn fill_flip<B: RenderBackend>(&mut self, engine: &mut PageFlip<B>) -> Result<()> {
        if engine.has_second_page() {
            let left = engine.page(true)?.is_left_page();
            let (back, second) = if left {
                (self.page as i64 - 1, self.page as i64 - 2)
            } else {
                (self.page as i64 + 2, self.page as i64 + 3)
            };
            self.load_signed(engine, TextureKind::Back, back)?;
            self.load_signed(engine, TextureKind::Second, second)?;
            return Ok(());
        }

        match engine.flip_state() {
            FlipState::ForwardFlip | FlipState::RestoreFlip => {
                self.load(engine, true, TextureKind::Second, self.page + 1)?;
            }
            FlipState::BackwardFlip if !engine.is_texture_set(true, TextureKind::First)? => {
                let previous = self.page.saturating_sub(1).max(1);
                self.load(engine, true, TextureKind::First, previous)?;
                self.page = previous;
            }
            _ => {}
        }
        Ok(())
    }

    fn load_signed<B: RenderBackend>(&mut self, engine: &mut PageFlip<B>, kind: TextureKind, page: i64) -> Result<()> {
        // Before page 1 there is nothing to flip onto; render blank.
        self.load(engine, true, kind, u32::try_from(page).unwrap_or(0))
    }

    /// Rasterize `page` into a slot unless it's already filled.
    fn load<B: RenderBackend>(
        &mut self,
        engine: &mut PageFlip<B>,
        first: bool,
        kind: TextureKind,
        page: u32,
    ) -> Result<()> {
        if engine.is_texture_set(first, kind)? {
            return Ok(());
        }
        let p = engine.page(first)?;
        let (w, h) = (p.width() as u32, p.height() as u32);
        let bitmap = if page == 0 || page > self.count {
            Bitmap::solid(w.max(1), h.max(1), BLANK)
        } else {
            self.rasterizer.rasterize(page, w, h)?
        };
        engine.set_texture(first, kind, &bitmap)?;
        log::debug!("page {page} loaded into {kind:?} slot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlipConfig;
    use crate::content::SolidRasterizer;
    use crate::render::RecordingBackend;
    use crate::scroller::ManualClock;
    use test_log::test;

    struct Rig {
        engine: PageFlip<RecordingBackend>,
        book: Book<SolidRasterizer>,
        clock: ManualClock,
    }

    impl Rig {
        fn new(width: u32, height: u32, auto_page: bool, count: u32) -> Self {
            let clock = ManualClock::new();
            let config = FlipConfig { auto_page, pixels_of_mesh: 50, ..FlipConfig::default() };
            let mut engine = PageFlip::with_clock(RecordingBackend::new(), config, Box::new(clock.clone())).unwrap();
            engine.on_surface_created().unwrap();
            engine.on_surface_changed(width, height).unwrap();
            let mut book = Book::new(count, SolidRasterizer::default()).unwrap();
            assert!(!book.render(&mut engine).unwrap());
            Rig { engine, book, clock }
        }

        /// Touch, move along `path` and lift, without running the animation.
        fn release(&mut self, path: &[(f32, f32)]) -> bool {
            let (x, y) = path[0];
            assert!(self.book.on_finger_down(&mut self.engine, x, y).unwrap());
            for &(x, y) in &path[1..] {
                self.book.on_finger_move(&mut self.engine, x, y).unwrap();
                self.book.render(&mut self.engine).unwrap();
            }
            let &(x, y) = path.last().unwrap();
            self.book.on_finger_up(&mut self.engine, x, y, 250).unwrap()
        }

        fn drag(&mut self, path: &[(f32, f32)]) {
            self.release(path);
            let mut frames = 0;
            while self.book.render(&mut self.engine).unwrap() {
                self.clock.advance(16);
                frames += 1;
                assert!(frames < 100);
            }
            assert_eq!(self.engine.flip_state(), FlipState::EndFlip);
            assert_eq!(self.book.request(), RenderRequest::FullPage);
        }

        fn shown(&self, first: bool) -> [f32; 3] {
            self.engine.page(first).unwrap().textures.get(TextureKind::First).unwrap().mask_color
        }
    }

    fn mask(rgba: [u8; 4]) -> [f32; 3] {
        [rgba[0] as f32 / 255.0, rgba[1] as f32 / 255.0, rgba[2] as f32 / 255.0]
    }

    const FORWARD: [(f32, f32); 3] = [(900.0, 1400.0), (850.0, 1390.0), (300.0, 1390.0)];
    const BACKWARD: [(f32, f32); 3] = [(100.0, 1400.0), (200.0, 1390.0), (900.0, 1390.0)];
    const RESTORE: [(f32, f32); 2] = [(900.0, 1400.0), (850.0, 1390.0)];

    #[test]
    fn single_forward_advances_one_page() {
        let mut rig = Rig::new(1000, 1500, false, 5);
        let palette = SolidRasterizer::default();
        assert_eq!(rig.shown(true), mask(palette.color_of(1)));

        rig.drag(&FORWARD);
        assert_eq!(rig.book.page_no(), 2);
        assert_eq!(rig.shown(true), mask(palette.color_of(2)));
        assert!(!rig.engine.is_texture_set(true, TextureKind::Second).unwrap());
    }

    #[test]
    fn single_backward_goes_back_one_page() {
        let mut rig = Rig::new(1000, 1500, false, 5);
        rig.drag(&FORWARD);
        rig.drag(&FORWARD);
        assert_eq!(rig.book.page_no(), 3);

        rig.drag(&BACKWARD);
        assert_eq!(rig.book.page_no(), 2);
        assert_eq!(rig.shown(true), mask(SolidRasterizer::default().color_of(2)));
    }

    #[test]
    fn short_backward_drag_returns_to_the_same_page() {
        let mut rig = Rig::new(1000, 1500, false, 5);
        rig.drag(&FORWARD);
        rig.drag(&[(100.0, 1400.0), (200.0, 1390.0)]);
        assert_eq!(rig.book.page_no(), 2);
        assert_eq!(rig.shown(true), mask(SolidRasterizer::default().color_of(2)));
    }

    #[test]
    fn restore_keeps_the_page() {
        let mut rig = Rig::new(1000, 1500, false, 5);
        rig.drag(&RESTORE);
        assert_eq!(rig.book.page_no(), 1);
    }

    #[test]
    fn ends_of_the_book_refuse_to_flip() {
        let mut rig = Rig::new(1000, 1500, false, 2);
        assert!(!rig.book.can_flip_backward(&rig.engine));
        rig.drag(&BACKWARD);
        assert_eq!(rig.book.page_no(), 1);

        rig.drag(&FORWARD);
        assert_eq!(rig.book.page_no(), 2);
        assert!(!rig.book.can_flip_forward(&rig.engine));
        rig.drag(&FORWARD);
        assert_eq!(rig.book.page_no(), 2);
    }

    #[test]
    fn double_mode_flips_two_pages_at_a_time() {
        let mut rig = Rig::new(2000, 1500, true, 6);
        let palette = SolidRasterizer::default();
        assert!(rig.engine.has_second_page());
        assert!(!rig.book.can_flip_backward(&rig.engine));

        // Right page forward: spread (1, 2) -> (3, 4).
        rig.drag(&[(1900.0, 1400.0), (1800.0, 1390.0), (1100.0, 1390.0)]);
        assert_eq!(rig.book.page_no(), 3);
        let left_first = rig.engine.page(true).unwrap().is_left_page();
        assert_eq!(rig.shown(left_first), mask(palette.color_of(3)));
        assert_eq!(rig.shown(!left_first), mask(palette.color_of(4)));

        // Left page back: spread (3, 4) -> (1, 2).
        rig.drag(&[(100.0, 1400.0), (200.0, 1390.0), (900.0, 1390.0)]);
        assert_eq!(rig.book.page_no(), 1);
        let left_first = rig.engine.page(true).unwrap().is_left_page();
        assert_eq!(rig.shown(left_first), mask(palette.color_of(1)));
        assert_eq!(rig.shown(!left_first), mask(palette.color_of(2)));
    }

    #[test]
    fn double_mode_stops_at_the_last_spread() {
        let mut rig = Rig::new(2000, 1500, true, 3);
        rig.drag(&[(1900.0, 1400.0), (1800.0, 1390.0), (1100.0, 1390.0)]);
        assert_eq!(rig.book.page_no(), 3);
        rig.drag(&[(1900.0, 1400.0), (1800.0, 1390.0), (1100.0, 1390.0)]);
        assert_eq!(rig.book.page_no(), 3);
    }

    #[test]
    fn set_page_reloads_textures() {
        let mut rig = Rig::new(1000, 1500, false, 5);
        rig.book.set_page(&mut rig.engine, 4).unwrap();
        assert!(!rig.engine.is_texture_set(true, TextureKind::First).unwrap());
        rig.book.render(&mut rig.engine).unwrap();
        assert_eq!(rig.shown(true), mask(SolidRasterizer::default().color_of(4)));
        assert!(rig.book.set_page(&mut rig.engine, 6).is_err());
    }

    #[test]
    fn last_animation_frame_commits_before_the_next_touch() {
        let mut rig = Rig::new(1000, 1500, false, 5);
        assert!(rig.release(&FORWARD));
        rig.clock.advance(1000);
        assert!(!rig.book.render(&mut rig.engine).unwrap());
        assert_eq!(rig.engine.flip_state(), FlipState::EndFlip);
        assert_eq!(rig.book.page_no(), 2);

        assert!(rig.book.on_finger_down(&mut rig.engine, 900.0, 1400.0).unwrap());
        rig.book.on_finger_up(&mut rig.engine, 900.0, 1400.0, 250).unwrap();
        assert_eq!(rig.book.page_no(), 2);
    }

    #[test]
    fn touch_during_animation_commits_the_flip() {
        let mut rig = Rig::new(1000, 1500, false, 5);
        assert!(rig.release(&FORWARD));
        assert!(rig.engine.is_animating());

        assert!(rig.book.on_finger_down(&mut rig.engine, 900.0, 1400.0).unwrap());
        assert_eq!(rig.book.page_no(), 2);
        assert_eq!(rig.engine.flip_state(), FlipState::BeginFlip);
        assert!(!rig.engine.is_animating());
    }

    #[test]
    fn moves_and_lifts_are_ignored_while_animating() {
        let mut rig = Rig::new(1000, 1500, false, 5);
        assert!(rig.release(&FORWARD));
        assert!(rig.book.render(&mut rig.engine).unwrap());
        rig.clock.advance(16);
        let touch = rig.engine.fold().touch;

        assert!(!rig.book.on_finger_move(&mut rig.engine, 900.0, 1400.0).unwrap());
        assert_eq!(rig.engine.fold().touch, touch);
        assert!(!rig.book.on_finger_up(&mut rig.engine, 900.0, 1400.0, 250).unwrap());
        assert_eq!(rig.engine.flip_state(), FlipState::ForwardFlip);
        assert_eq!(rig.book.request(), RenderRequest::AnimatingFrame);

        // The next frame keeps following the scroller toward the left edge.
        assert!(rig.book.render(&mut rig.engine).unwrap());
        assert!(rig.engine.fold().touch.x < touch.x);

        let mut frames = 0;
        while rig.book.render(&mut rig.engine).unwrap() {
            rig.clock.advance(16);
            frames += 1;
            assert!(frames < 100);
        }
        assert_eq!(rig.book.page_no(), 2);
    }

    #[test]
    fn empty_book_is_rejected() {
        assert!(Book::new(0, SolidRasterizer::default()).is_err());
    }
}
