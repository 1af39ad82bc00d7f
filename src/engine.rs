// ============================================================================
// PAGE FLIP ENGINE — finger handling, animation and per-frame draw lists
// ============================================================================
//
// Owns everything a flip needs: config, surface, the one or two pages, the
// fold geometry, the curled mesh and its shadows, the scroller and the render
// backend.  All coordinates taken from the host are device pixels (y down)
// and converted once on entry.
//
// A flip always concerns pages[0] (the FIRST page).  In double-page mode a
// finger landing on the other page swaps the two so the touched page becomes
// FIRST.
// ============================================================================

use std::f32::consts::PI;

use crate::config::FlipConfig;
use crate::error::{FlipError, Result};
use crate::frame::{DrawCommand, DrawLayer, Frame, ShadowVertex, Triangles};
use crate::geometry::fold::tan_of_curl_angle;
use crate::geometry::{FoldGeometry, Point, ViewRect};
use crate::mesh::{FoldMesh, Tessellator};
use crate::page::Page;
use crate::render::RenderBackend;
use crate::scroller::{Clock, Scroller, SystemClock};
use crate::shadow::{self, ShadowColor, ShadowWidth};
use crate::state::{FlipState, PageMode};
use crate::texture::{Bitmap, PageTexture, TextureId, TextureKind};

const FIRST_PAGE: usize = 0;
const SECOND_PAGE: usize = 1;

/// A drag must cover this much of the half width before a flip starts.
const MOVE_THRESHOLD_RATIO: f32 = 0.05;
/// Releasing a forward flip this close to the origin edge restores the page.
const RESTORE_WIDTH_RATIO: f32 = 0.4;
/// Releasing a backward flip short of this ratio turns it forward again.
const BACKWARD_WIDTH_RATIO: f32 = 0.5;
/// The touch point runs ahead of the finger by these factors.
const FORWARD_LEAD: f32 = 1.2;
const OTHER_LEAD: f32 = 1.1;
/// Finger travel below which a release counts as a click.
const CLICK_SLOP: f32 = 2.0;
/// Backward/restore animations stop this close to the origin edge.
const BACKWARD_STOP_DISTANCE: f32 = 10.0;
/// Pixels per corner diagonal sampled for a texture's mask colour.
const MASK_SAMPLE_COUNT: usize = 30;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const UNDERLAY_Z: f32 = -1.0;

fn forward_click_tan() -> f32 {
    (PI / 6.0).tan()
}

fn backward_click_tan() -> f32 {
    (PI / 20.0).tan()
}

pub struct PageFlip<B: RenderBackend> {
    backend: B,
    config: FlipConfig,
    mode: PageMode,
    view: ViewRect,
    pages: [Option<Page>; 2],
    state: FlipState,
    vertical: bool,

    start_touch: Point,
    last_touch: Point,
    touch: Point,
    max_t2o_tan: f32,
    max_t2d_tan: f32,
    /// Slope of the current T→O line; drives backward/restore animation.
    k: f32,

    fold: FoldGeometry,
    tessellator: Tessellator,
    mesh: FoldMesh,
    base_shadow: Triangles<ShadowVertex>,
    edge_shadow: Triangles<ShadowVertex>,

    scroller: Scroller,
    gradient_light: Option<TextureId>,
}

impl<B: RenderBackend> PageFlip<B> {
    pub fn new(backend: B, config: FlipConfig) -> Result<Self> {
        Self::with_clock(backend, config, Box::new(SystemClock::new()))
    }

    pub fn with_clock(backend: B, config: FlipConfig, clock: Box<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let scroller = Scroller::new(clock, config.interpolator);
        Ok(Self {
            backend,
            mode: PageMode::from_auto_page(config.auto_page),
            config,
            view: ViewRect::default(),
            pages: [None, None],
            state: FlipState::EndFlip,
            vertical: false,
            start_touch: Point::default(),
            last_touch: Point::default(),
            touch: Point::default(),
            max_t2o_tan: 0.0,
            max_t2d_tan: 0.0,
            k: 0.0,
            fold: FoldGeometry::default(),
            tessellator: Tessellator::default(),
            mesh: FoldMesh::default(),
            base_shadow: Triangles::new(),
            edge_shadow: Triangles::new(),
            scroller,
            gradient_light: None,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &FlipConfig {
        &self.config
    }

    pub fn mode(&self) -> PageMode {
        self.mode
    }

    pub fn view(&self) -> &ViewRect {
        &self.view
    }

    pub fn fold(&self) -> &FoldGeometry {
        &self.fold
    }

    pub fn mesh(&self) -> &FoldMesh {
        &self.mesh
    }

    /// Release every texture this engine still holds.
    pub fn release(&mut self) {
        let mut ids = Vec::new();
        for page in self.pages.iter_mut().flatten() {
            ids.extend(page.textures.recycle_all());
        }
        ids.extend(self.gradient_light.take());
        self.backend.delete_textures(&ids);
        self.pages = [None, None];
        log::debug!("released {} textures", ids.len());
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    pub fn set_pixels_of_mesh(&mut self, pixels: u32) -> Result<()> {
        self.config.set_pixels_of_mesh(pixels)
    }

    pub fn pixels_of_mesh(&self) -> u32 {
        self.config.pixels_of_mesh
    }

    pub fn set_semi_perimeter_ratio(&mut self, ratio: f32) -> Result<()> {
        self.config.set_semi_perimeter_ratio(ratio)
    }

    pub fn set_mask_alpha_of_fold(&mut self, alpha: i32) -> Result<()> {
        self.config.set_mask_alpha(alpha)
    }

    pub fn set_shadow_color_of_fold_edges(&mut self, color: ShadowColor) -> Result<()> {
        self.config.set_edge_shadow_color(color)
    }

    pub fn set_shadow_color_of_fold_base(&mut self, color: ShadowColor) -> Result<()> {
        self.config.set_base_shadow_color(color)
    }

    pub fn set_shadow_width_of_fold_edges(&mut self, width: ShadowWidth) -> Result<()> {
        self.config.set_edge_shadow_width(width)
    }

    pub fn set_shadow_width_of_fold_base(&mut self, width: ShadowWidth) -> Result<()> {
        self.config.set_base_shadow_width(width)
    }

    pub fn enable_click_to_flip(&mut self, enable: bool) {
        self.config.click_to_flip = enable;
    }

    pub fn set_width_ratio_of_click_to_flip(&mut self, ratio: f32) -> Result<()> {
        self.config.set_click_to_flip_width_ratio(ratio)
    }

    pub fn is_auto_page_enabled(&self) -> bool {
        self.mode == PageMode::Auto
    }

    /// Switch page mode.  True when the pages had to be rebuilt, in which
    /// case every texture was released and must be set again.
    pub fn enable_auto_page(&mut self, enable: bool) -> bool {
        let mode = PageMode::from_auto_page(enable);
        self.config.auto_page = enable;
        if self.mode == mode {
            return false;
        }
        self.mode = mode;

        let has_second = self.pages[SECOND_PAGE].is_some();
        let wants_second = mode.is_double(self.view.surface_width as u32, self.view.surface_height as u32);
        if self.pages[FIRST_PAGE].is_some() && has_second != wants_second {
            self.create_pages();
            return true;
        }
        false
    }

    // ========================================================================
    // SURFACE LIFECYCLE
    // ========================================================================

    pub fn on_surface_created(&mut self) -> Result<()> {
        self.state = FlipState::EndFlip;
        self.vertical = false;
        self.backend.prepare()?;

        // Unknown ids are ignored, so a lost surface is harmless here.
        if let Some(old) = self.gradient_light.take() {
            self.backend.delete_textures(&[old]);
        }
        let ramp = shadow::gradient_light_bitmap();
        self.gradient_light = Some(self.upload(&ramp)?.id);
        Ok(())
    }

    pub fn on_surface_changed(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(FlipError::invalid(format!("surface {width}x{height}")));
        }
        self.backend.resize(width, height)?;
        self.view.set(width, height);
        self.create_pages();
        Ok(())
    }

    fn create_pages(&mut self) {
        let mut released = Vec::new();
        for page in self.pages.iter_mut().flatten() {
            released.extend(page.textures.recycle_all());
        }
        self.backend.delete_textures(&released);

        let v = self.view;
        if self.mode.is_double(v.surface_width as u32, v.surface_height as u32) {
            self.pages = [
                Some(Page::new(v.left, 0.0, v.top, v.bottom)),
                Some(Page::new(0.0, v.right, v.top, v.bottom)),
            ];
        } else {
            self.pages = [Some(Page::new(v.left, v.right, v.top, v.bottom)), None];
        }

        self.state = FlipState::EndFlip;
        self.scroller.abort_animation();
        self.mesh = FoldMesh::default();
        self.base_shadow = Triangles::new();
        self.edge_shadow = Triangles::new();
        log::debug!(
            "pages rebuilt for {}x{} ({:?}), released {} textures",
            v.surface_width,
            v.surface_height,
            self.mode,
            released.len()
        );
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn surface_width(&self) -> u32 {
        self.view.surface_width as u32
    }

    pub fn surface_height(&self) -> u32 {
        self.view.surface_height as u32
    }

    pub fn flip_state(&self) -> FlipState {
        self.state
    }

    pub fn has_first_page(&self) -> bool {
        self.pages[FIRST_PAGE].is_some()
    }

    pub fn has_second_page(&self) -> bool {
        self.pages[SECOND_PAGE].is_some()
    }

    pub fn is_animating(&self) -> bool {
        !self.scroller.is_finished()
    }

    pub fn page(&self, first: bool) -> Result<&Page> {
        let index = if first { FIRST_PAGE } else { SECOND_PAGE };
        match (&self.pages[FIRST_PAGE], &self.pages[index]) {
            (None, _) => Err(FlipError::NullPage),
            (_, None) => Err(FlipError::NoTwoPages),
            (_, Some(page)) => Ok(page),
        }
    }

    fn page_mut(&mut self, first: bool) -> Result<&mut Page> {
        self.page(first)?;
        let index = if first { FIRST_PAGE } else { SECOND_PAGE };
        self.pages[index].as_mut().ok_or(FlipError::NullPage)
    }

    fn first_page(&self) -> Result<&Page> {
        self.page(true)
    }

    pub fn is_texture_set(&self, first: bool, kind: TextureKind) -> Result<bool> {
        Ok(self.page(first)?.textures.is_set(kind))
    }

    // ========================================================================
    // TEXTURES
    // ========================================================================

    fn upload(&mut self, bitmap: &Bitmap) -> Result<PageTexture> {
        let rgba = bitmap.to_rgba8()?;
        let mask = bitmap.average_color(MASK_SAMPLE_COUNT)?;
        let id = self.backend.create_texture(bitmap.width(), bitmap.height(), &rgba)?;
        Ok(PageTexture {
            id,
            mask_color: [mask[0] as f32 / 255.0, mask[1] as f32 / 255.0, mask[2] as f32 / 255.0],
            width: bitmap.width(),
            height: bitmap.height(),
        })
    }

    /// Upload `bitmap` into a slot of the first or second page.
    pub fn set_texture(&mut self, first: bool, kind: TextureKind, bitmap: &Bitmap) -> Result<()> {
        // Resolve the page before touching the backend.
        self.page(first)?;
        let texture = self.upload(bitmap)?;
        self.page_mut(first)?.textures.set(kind, texture);
        log::debug!("{kind:?} texture of {} page set", if first { "first" } else { "second" });
        Ok(())
    }

    pub fn set_first_texture(&mut self, first: bool, bitmap: &Bitmap) -> Result<()> {
        self.set_texture(first, TextureKind::First, bitmap)
    }

    pub fn set_second_texture(&mut self, first: bool, bitmap: &Bitmap) -> Result<()> {
        self.set_texture(first, TextureKind::Second, bitmap)
    }

    /// `None` drops the back texture so the fold shows its first texture.
    pub fn set_back_texture(&mut self, first: bool, bitmap: Option<&Bitmap>) -> Result<()> {
        match bitmap {
            Some(b) => self.set_texture(first, TextureKind::Back, b),
            None => self.clear_texture(first, TextureKind::Back),
        }
    }

    /// Empty a slot; its texture is released on the next recycle.
    pub fn clear_texture(&mut self, first: bool, kind: TextureKind) -> Result<()> {
        self.page_mut(first)?.textures.clear(kind);
        Ok(())
    }

    pub fn set_gradient_light_texture(&mut self, bitmap: &Bitmap) -> Result<()> {
        let texture = self.upload(bitmap)?;
        if let Some(old) = self.gradient_light.replace(texture.id) {
            self.backend.delete_textures(&[old]);
        }
        Ok(())
    }

    pub fn set_first_texture_with_second(&mut self) -> Result<()> {
        self.page_mut(true)?.textures.set_first_texture_with_second();
        Ok(())
    }

    pub fn set_second_texture_with_first(&mut self) -> Result<()> {
        self.page_mut(true)?.textures.set_second_texture_with_first();
        Ok(())
    }

    /// Double-page forward commit: the flipped sheet's back lands on the
    /// stationary page and the fold page shows what it revealed.
    pub fn swap_second_textures_with_first(&mut self) -> Result<()> {
        match &mut self.pages {
            [Some(first), Some(second)] => {
                second.textures.swap_textures_with(&mut first.textures);
                Ok(())
            }
            _ => Err(FlipError::NullPage),
        }
    }

    /// Hand every texture released since the last call to the backend.
    pub fn recycle_textures(&mut self) {
        let mut ids = Vec::new();
        for page in self.pages.iter_mut().flatten() {
            ids.extend(page.textures.recycle());
        }
        if !ids.is_empty() {
            self.backend.delete_textures(&ids);
        }
    }

    // ========================================================================
    // FINGER EVENTS
    // ========================================================================

    /// Start a gesture.  Refused while a finished flip waits for `settle`.
    pub fn on_finger_down(&mut self, x: f32, y: f32) -> Result<bool> {
        if self.state.is_terminal() {
            log::debug!("finger down ignored, {:?} not settled yet", self.state);
            return Ok(false);
        }
        let x = self.view.to_gl_x(x);
        let y = self.view.to_gl_y(y);

        let mut contained = self.first_page()?.contains(x, y);
        if !contained && self.pages[SECOND_PAGE].as_ref().is_some_and(|p| p.contains(x, y)) {
            contained = true;
            self.pages.swap(FIRST_PAGE, SECOND_PAGE);
        }

        if contained {
            self.max_t2o_tan = 0.0;
            self.max_t2d_tan = 0.0;
            self.last_touch.set(x, y);
            self.start_touch.set(x, y);
            self.touch.set(x, y);
            self.state = FlipState::BeginFlip;
            log::debug!("finger down at ({x}, {y})");
        }
        Ok(contained)
    }

    pub fn on_finger_move(&mut self, x: f32, y: f32, can_forward: bool, can_backward: bool) -> Result<bool> {
        let x = self.view.to_gl_x(x);
        let y = self.view.to_gl_y(y);
        let has_second = self.has_second_page();
        let half_width = self.view.half_width;

        let mut dy = y - self.start_touch.y;
        let mut dx = x - self.start_touch.x;

        if self.state == FlipState::BeginFlip && dx.abs() > half_width * MOVE_THRESHOLD_RATIO {
            let page = self.page_mut(true)?;
            page.set_origin_diagonal_points(has_second, dy > 0.0);
            let (origin, diagonal, right) = (page.origin, page.diagonal, page.right());

            // Steepest curl allowed toward the origin and the diagonal edge.
            let half_height = self.view.half_height;
            self.max_t2o_tan = tan_of_curl_angle((self.start_touch.y - origin.y).abs(), half_height);
            self.max_t2d_tan = tan_of_curl_angle((self.start_touch.y - diagonal.y).abs(), half_height);
            if (origin.y < 0.0 && right > 0.0) || (origin.y > 0.0 && right <= 0.0) {
                self.max_t2o_tan = -self.max_t2o_tan;
            } else {
                self.max_t2d_tan = -self.max_t2d_tan;
            }

            if !has_second && dx > 0.0 && can_backward {
                self.start_touch.x = origin.x;
                dx = x - self.start_touch.x;
                self.state = FlipState::BackwardFlip;
                self.page_mut(true)?.textures.set_second_texture_with_first();
                log::debug!("backward flip started");
            } else if can_forward && ((dx < 0.0 && origin.x > 0.0) || (dx > 0.0 && origin.x < 0.0)) {
                self.state = FlipState::ForwardFlip;
                log::debug!("forward flip started");
            }
        }

        if !self.state.is_flipping() {
            return Ok(false);
        }

        self.vertical = dy.abs() <= 1.0;
        dx *= if self.state == FlipState::ForwardFlip { FORWARD_LEAD } else { OTHER_LEAD };

        // The finger crossed over to the other half: lift the other corner.
        let origin_y = self.first_page()?.origin.y;
        if (dy < 0.0 && origin_y < 0.0) || (dy > 0.0 && origin_y > 0.0) {
            std::mem::swap(&mut self.max_t2o_tan, &mut self.max_t2d_tan);
            self.page_mut(true)?.invert_y_of_origin();
        }

        let page = self.first_page()?;
        let (origin, diagonal, width) = (page.origin, page.diagonal, page.width());

        let max_y = dx * self.max_t2o_tan;
        if dy.abs() > max_y.abs() {
            dy = max_y;
        }

        // Keep XFold1 inside the page width.
        let t2o_k = if dx != 0.0 { dy / dx } else { 0.0 };
        let x_touch_x = dx + dy * t2o_k;
        let x_ratio = (1.0 + self.config.semi_perimeter_ratio) * 0.5;
        let x_fold_x1 = x_ratio * x_touch_x;
        if x_fold_x1.abs() + 2.0 >= width {
            let dy2 = ((diagonal.x - origin.x) / x_ratio - dx) * dx;
            if dy2 < 0.0 {
                // e.g. dragging from one page onto the other
                return Ok(false);
            }
            let t = dy2.sqrt();
            dy = if origin.y > 0.0 { (-t).ceil() } else { t.floor() };
        }

        self.last_touch.set(x, y);
        self.touch.set(dx + origin.x, dy + origin.y);
        self.compute_key_points()?;
        self.compute_vertexes()?;
        Ok(true)
    }

    pub fn on_finger_up(
        &mut self,
        x: f32,
        y: f32,
        duration_ms: u32,
        can_forward: bool,
        can_backward: bool,
    ) -> Result<bool> {
        let x = self.view.to_gl_x(x);
        let y = self.view.to_gl_y(y);
        let has_second = self.has_second_page();

        let page = self.first_page()?;
        let (origin, diagonal, width) = (page.origin, page.diagonal, page.width());
        let near_origin = page.is_x_in_range(x, RESTORE_WIDTH_RATIO);
        let past_middle = page.is_x_in_range(x, BACKWARD_WIDTH_RATIO);
        let mut start = self.touch;
        let mut end = Point::default();

        match self.state {
            FlipState::ForwardFlip => {
                if near_origin {
                    end.x = origin.x;
                    self.state = FlipState::RestoreFlip;
                } else if has_second && origin.x < 0.0 {
                    end.x = diagonal.x + width;
                } else {
                    end.x = diagonal.x - width;
                }
                end.y = origin.y;
            }
            FlipState::BackwardFlip => {
                if !past_middle {
                    self.state = FlipState::ForwardFlip;
                    end.set(diagonal.x - width, origin.y);
                } else {
                    end.set(origin.x.trunc(), origin.y.trunc());
                }
            }
            FlipState::BeginFlip => {
                self.vertical = false;
                self.state = FlipState::EndFlip;
                self.page_mut(true)?.set_origin_diagonal_points(has_second, -y > 0.0);
                if self.config.click_to_flip && (x - self.start_touch.x).abs() < CLICK_SLOP {
                    self.compute_scroll_points_for_click(x, can_forward, can_backward, &mut start, &mut end)?;
                }
            }
            _ => {}
        }

        if self.state.is_flipping() {
            self.scroller.set_interpolator(self.config.interpolator);
            self.scroller.start_scroll(
                start.x as i32,
                start.y as i32,
                (end.x - start.x) as i32,
                (end.y - start.y) as i32,
                duration_ms,
            );
            log::debug!("{:?} animating from {start:?} to {end:?} over {duration_ms}ms", self.state);
            return Ok(true);
        }
        Ok(false)
    }

    /// A click near an edge flips without dragging.
    fn compute_scroll_points_for_click(
        &mut self,
        x: f32,
        can_forward: bool,
        can_backward: bool,
        start: &mut Point,
        end: &mut Point,
    ) -> Result<()> {
        let has_second = self.has_second_page();
        let ratio = self.config.click_to_flip_width_ratio;
        let page = self.first_page()?;
        let (origin, diagonal, width) = (page.origin, page.diagonal, page.width());
        let in_range = page.is_x_in_range(x, ratio);

        let (mut forward_tan, mut backward_tan) = (forward_click_tan(), backward_click_tan());
        if (origin.y < 0.0 && origin.x > 0.0) || (origin.y > 0.0 && origin.x < 0.0) {
            forward_tan = -forward_tan;
            backward_tan = -backward_tan;
        }

        if !has_second && x < diagonal.x + width * ratio && can_backward {
            self.state = FlipState::BackwardFlip;
            self.k = backward_tan;
            self.page_mut(true)?.textures.set_second_texture_with_first();
            start.set(diagonal.x, origin.y + (diagonal.x - origin.x) * self.k);
            end.set(origin.x - 5.0, origin.y);
        } else if can_forward && in_range {
            self.state = FlipState::ForwardFlip;
            self.k = forward_tan;
            start.x = if origin.x < 0.0 {
                (origin.x + width * 0.25).trunc()
            } else {
                (origin.x - width * 0.25).trunc()
            };
            start.y = origin.y + (start.x - origin.x) * self.k;
            end.x = if has_second && origin.x < 0.0 {
                diagonal.x + width
            } else {
                diagonal.x - width
            };
            end.y = origin.y;
        }
        Ok(())
    }

    /// Whether releasing at (x, y) should keep a forward flip animating.
    pub fn can_animate(&self, x: f32, y: f32) -> bool {
        self.state == FlipState::ForwardFlip
            && self
                .pages[FIRST_PAGE]
                .as_ref()
                .is_some_and(|p| !p.contains(self.view.to_gl_x(x), self.view.to_gl_y(y)))
    }

    // ========================================================================
    // ANIMATION
    // ========================================================================

    /// Advance one animation step.  False once the animation stopped, in
    /// which case the state moved to its END_WITH_* counterpart.
    pub fn animating(&mut self) -> Result<bool> {
        let has_second = self.has_second_page();
        let page = self.first_page()?;
        let (origin, diagonal, width) = (page.origin, page.diagonal, page.width());

        let mut is_animating = !self.scroller.is_finished();
        if is_animating {
            self.scroller.compute_scroll_offset();
            self.touch.set(self.scroller.curr_x() as f32, self.scroller.curr_y() as f32);

            if matches!(self.state, FlipState::BackwardFlip | FlipState::RestoreFlip) {
                self.touch.y = (self.touch.x - origin.x) * self.k + origin.y;
                is_animating = (self.touch.x - origin.x).abs() > BACKWARD_STOP_DISTANCE;
            } else {
                self.vertical = (self.touch.y - origin.y).abs() < 1.0;
            }

            self.compute_key_points()?;

            if has_second {
                // Wrap around the spine instead of sliding past it.
                if self.first_page()?.is_x_outside_page(self.fold.x_fold1.x) {
                    self.fold.clamp_to_spine(diagonal.x, width);
                    is_animating = (self.fold.middle.x - self.fold.x_fold0.x).abs() >= 1.0
                        && (self.fold.x_fold0.x - diagonal.x).abs() >= 2.0;
                }
            } else if self.state == FlipState::ForwardFlip {
                // Stop once the whole fold left the page area.
                let r = self.fold.len_t2o * self.config.semi_perimeter_ratio / PI;
                let x = (self.fold.y_fold1.y - diagonal.y) * self.k + r;
                is_animating = x > diagonal.x - origin.x;
            }

            // The scroller's last step ends the flip in the same call.
            if self.scroller.is_finished() {
                is_animating = false;
            }
        }

        if is_animating {
            self.compute_vertexes()?;
        } else {
            self.abort_animating();
        }
        Ok(is_animating)
    }

    pub fn abort_animating(&mut self) {
        self.scroller.abort_animation();
        if let Some(end) = self.state.aborted() {
            log::debug!("{:?} -> {end:?}", self.state);
            self.state = end;
        }
    }

    /// Return a finished gesture to idle.  Hosts call this after committing
    /// the page change an END_WITH_* state asks for.
    pub fn settle(&mut self) -> FlipState {
        let finished = self.state;
        if finished.is_terminal() {
            self.state = FlipState::EndFlip;
        }
        finished
    }

    // ========================================================================
    // GEOMETRY
    // ========================================================================

    fn compute_key_points(&mut self) -> Result<()> {
        let page = self.first_page()?;
        let ratio = self.config.semi_perimeter_ratio;
        self.fold = if self.vertical {
            FoldGeometry::vertical(page.origin, page.diagonal.y, self.touch.x, ratio)
        } else {
            FoldGeometry::slope(page.origin, self.touch, ratio)
        };
        self.touch = self.fold.touch;
        self.k = self.fold.k;
        Ok(())
    }

    fn compute_vertexes(&mut self) -> Result<()> {
        let page = self.pages[FIRST_PAGE].as_ref().ok_or(FlipError::NullPage)?;
        self.tessellator.ensure(*page.rect(), self.config.pixels_of_mesh);
        self.mesh = self.tessellator.curl(&self.fold);
        self.base_shadow = shadow::base_shadow(
            &self.fold,
            page.rect(),
            &self.config.base_shadow_width,
            &self.config.base_shadow_color,
        );
        self.edge_shadow = shadow::edge_shadow(
            &self.fold,
            page.diagonal,
            &self.config.edge_shadow_width,
            &self.config.edge_shadow_color,
        );
        Ok(())
    }

    // ========================================================================
    // FRAMES
    // ========================================================================

    /// Draw list for a page being flipped.
    pub fn build_flip_frame(&self) -> Result<Frame> {
        let page = self.first_page()?;
        let double = self.has_second_page();
        let mut frame = Frame::new(self.view.mvp());
        frame.push(DrawCommand::Clear { color: CLEAR_COLOR });

        if let Some(second) = page.textures.get(TextureKind::Second) {
            frame.push(DrawCommand::Textured {
                layer: DrawLayer::Underlay,
                texture: second.id,
                mesh: page.full_quad(UNDERLAY_Z),
            });
        }

        if let Some(other) = self.pages[SECOND_PAGE].as_ref() {
            if let Some(t) = other.textures.get(TextureKind::First) {
                frame.push(DrawCommand::Textured {
                    layer: DrawLayer::FullPage,
                    texture: t.id,
                    mesh: other.full_quad(0.0),
                });
            }
        }

        let first = page.textures.get(TextureKind::First);
        if let Some(t) = first {
            if !self.mesh.front.is_empty() {
                frame.push(DrawCommand::Textured {
                    layer: DrawLayer::Front,
                    texture: t.id,
                    mesh: self.mesh.front.clone(),
                });
            }
        }

        if let Some(back) = page.textures.back_texture() {
            if !self.mesh.back.is_empty() {
                let tint = first.map(|t| t.mask_color).unwrap_or(back.mask_color);
                let alpha = if double { 0.0 } else { self.config.mask_alpha };
                frame.push(DrawCommand::BackOfFold {
                    texture: back.id,
                    gradient: self.gradient_light,
                    mask: [tint[0], tint[1], tint[2], alpha],
                    tex_x_offset: if double { 1.0 } else { 0.0 },
                    mesh: self.mesh.back.clone(),
                });
            }
        }

        for band in [&self.base_shadow, &self.edge_shadow] {
            if !band.is_empty() {
                frame.push(DrawCommand::Shadow { mesh: band.clone() });
            }
        }
        Ok(frame)
    }

    /// Draw list for stationary pages.
    pub fn build_page_frame(&self) -> Result<Frame> {
        self.first_page()?;
        let mut frame = Frame::new(self.view.mvp());
        frame.push(DrawCommand::Clear { color: CLEAR_COLOR });
        for page in self.pages.iter().flatten() {
            if let Some(t) = page.textures.get(TextureKind::First) {
                frame.push(DrawCommand::Textured {
                    layer: DrawLayer::FullPage,
                    texture: t.id,
                    mesh: page.full_quad(0.0),
                });
            }
        }
        Ok(frame)
    }

    pub fn draw_flip_frame(&mut self) -> Result<()> {
        let frame = self.build_flip_frame()?;
        self.backend.submit(&frame)
    }

    pub fn draw_page_frame(&mut self) -> Result<()> {
        let frame = self.build_page_frame()?;
        self.backend.submit(&frame)
    }
}

impl<B: RenderBackend> std::fmt::Debug for PageFlip<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFlip")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("surface", &(self.view.surface_width, self.view.surface_height))
            .field("touch", &self.touch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingBackend;
    use crate::scroller::ManualClock;
    use test_log::test;

    const FRAME_MS: u64 = 16;

    fn engine(width: u32, height: u32, auto_page: bool) -> (PageFlip<RecordingBackend>, ManualClock) {
        let clock = ManualClock::new();
        let config = FlipConfig { auto_page, ..FlipConfig::default() };
        let mut e = PageFlip::with_clock(RecordingBackend::new(), config, Box::new(clock.clone())).unwrap();
        e.on_surface_created().unwrap();
        e.on_surface_changed(width, height).unwrap();
        (e, clock)
    }

    fn single() -> (PageFlip<RecordingBackend>, ManualClock) {
        let (mut e, clock) = engine(1000, 1500, false);
        e.set_first_texture(true, &Bitmap::solid(100, 150, [250, 250, 240, 255])).unwrap();
        e.set_second_texture(true, &Bitmap::solid(100, 150, [200, 200, 255, 255])).unwrap();
        (e, clock)
    }

    fn run_animation(e: &mut PageFlip<RecordingBackend>, clock: &ManualClock) -> usize {
        let mut frames = 0;
        while e.animating().unwrap() {
            e.draw_flip_frame().unwrap();
            clock.advance(FRAME_MS);
            frames += 1;
            assert!(frames < 100, "animation never ends");
        }
        frames
    }

    fn drag_forward(e: &mut PageFlip<RecordingBackend>) {
        assert!(e.on_finger_down(900.0, 1400.0).unwrap());
        assert_eq!(e.flip_state(), FlipState::BeginFlip);
        assert!(e.on_finger_move(850.0, 1390.0, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::ForwardFlip);
        assert!(e.on_finger_move(300.0, 1390.0, true, true).unwrap());
    }

    #[test]
    fn forward_flip_runs_to_end_with_forward() {
        let (mut e, clock) = single();
        drag_forward(&mut e);
        assert!((e.fold().touch.x - -220.0).abs() < 1e-3, "{:?}", e.fold());

        assert!(e.on_finger_up(300.0, 1390.0, 250, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::ForwardFlip);
        assert!(e.is_animating());

        let frames = run_animation(&mut e, &clock);
        assert!(frames > 0);
        assert_eq!(e.flip_state(), FlipState::EndWithForward);
        assert!(!e.is_animating());
        assert_eq!(e.settle(), FlipState::EndWithForward);
        assert_eq!(e.flip_state(), FlipState::EndFlip);
    }

    #[test]
    fn scroller_end_stops_the_flip_in_the_same_step() {
        let (mut e, clock) = single();
        drag_forward(&mut e);
        assert!(e.on_finger_up(300.0, 1390.0, 250, true, true).unwrap());
        clock.advance(1000);
        assert!(!e.animating().unwrap());
        assert_eq!(e.flip_state(), FlipState::EndWithForward);

        // Unsettled flips refuse new gestures.
        assert!(!e.on_finger_down(900.0, 1400.0).unwrap());
        assert_eq!(e.flip_state(), FlipState::EndWithForward);
        e.settle();
        assert!(e.on_finger_down(900.0, 1400.0).unwrap());
    }

    #[test]
    fn early_release_restores() {
        let (mut e, clock) = single();
        assert!(e.on_finger_down(900.0, 1400.0).unwrap());
        assert!(e.on_finger_move(850.0, 1390.0, true, true).unwrap());
        assert!(e.on_finger_up(850.0, 1390.0, 250, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::RestoreFlip);
        run_animation(&mut e, &clock);
        assert_eq!(e.flip_state(), FlipState::EndWithRestore);
    }

    #[test]
    fn backward_flip_moves_first_texture_underneath() {
        let (mut e, clock) = single();
        let first_id = e.page(true).unwrap().textures.get(TextureKind::First).unwrap().id;

        assert!(e.on_finger_down(100.0, 1400.0).unwrap());
        assert!(e.on_finger_move(200.0, 1390.0, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::BackwardFlip);
        let page = e.page(true).unwrap();
        assert!(!page.textures.is_set(TextureKind::First));
        assert_eq!(page.textures.get(TextureKind::Second).unwrap().id, first_id);

        assert!(e.on_finger_move(900.0, 1390.0, true, true).unwrap());
        assert!(e.on_finger_up(900.0, 1390.0, 250, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::BackwardFlip);
        run_animation(&mut e, &clock);
        assert_eq!(e.flip_state(), FlipState::EndWithBackward);
    }

    #[test]
    fn short_backward_release_turns_forward() {
        let (mut e, _clock) = single();
        assert!(e.on_finger_down(100.0, 1400.0).unwrap());
        assert!(e.on_finger_move(200.0, 1390.0, true, true).unwrap());
        assert!(e.on_finger_up(200.0, 1390.0, 250, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::ForwardFlip);
    }

    #[test]
    fn refused_forward_leaves_state_unchanged() {
        let (mut e, _clock) = single();
        assert!(e.on_finger_down(900.0, 1400.0).unwrap());
        for x in [850.0, 600.0, 300.0] {
            assert!(!e.on_finger_move(x, 1390.0, false, true).unwrap());
            assert_eq!(e.flip_state(), FlipState::BeginFlip);
        }
        assert!(e.mesh().front.is_empty());
        assert!(!e.on_finger_up(300.0, 1390.0, 250, false, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::EndFlip);
        assert!(!e.is_animating());
    }

    #[test]
    fn refused_backward_leaves_state_unchanged() {
        let (mut e, _clock) = single();
        assert!(e.on_finger_down(100.0, 1400.0).unwrap());
        assert!(!e.on_finger_move(200.0, 1390.0, true, false).unwrap());
        assert_eq!(e.flip_state(), FlipState::BeginFlip);
        assert!(e.page(true).unwrap().textures.is_set(TextureKind::First));
    }

    #[test]
    fn finger_down_outside_pages_is_ignored() {
        let (mut e, _clock) = single();
        assert!(!e.on_finger_down(-10.0, 100.0).unwrap());
        assert_eq!(e.flip_state(), FlipState::EndFlip);
    }

    #[test]
    fn click_near_edge_flips_forward() {
        let (mut e, clock) = single();
        assert!(e.on_finger_down(950.0, 1400.0).unwrap());
        assert!(e.on_finger_up(950.0, 1400.0, 250, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::ForwardFlip);
        run_animation(&mut e, &clock);
        assert_eq!(e.flip_state(), FlipState::EndWithForward);
    }

    #[test]
    fn click_in_the_middle_does_nothing() {
        let (mut e, _clock) = single();
        e.set_width_ratio_of_click_to_flip(0.2).unwrap();
        assert!(e.on_finger_down(500.0, 700.0).unwrap());
        assert!(!e.on_finger_up(500.0, 700.0, 250, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::EndFlip);
    }

    #[test]
    fn click_ratio_sizes_both_edge_strips() {
        let click = |x: f32| {
            let (mut e, _clock) = single();
            e.set_width_ratio_of_click_to_flip(0.2).unwrap();
            assert!(e.on_finger_down(x, 700.0).unwrap());
            e.on_finger_up(x, 700.0, 250, true, true).unwrap();
            e.flip_state()
        };
        // Strip along the spine side, just past it, strip along the free edge.
        assert_eq!(click(150.0), FlipState::BackwardFlip);
        assert_eq!(click(250.0), FlipState::EndFlip);
        assert_eq!(click(750.0), FlipState::EndFlip);
        assert_eq!(click(850.0), FlipState::ForwardFlip);
    }

    #[test]
    fn click_disabled_does_nothing() {
        let (mut e, _clock) = single();
        e.enable_click_to_flip(false);
        assert!(e.on_finger_down(950.0, 1400.0).unwrap());
        assert!(!e.on_finger_up(950.0, 1400.0, 250, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::EndFlip);
    }

    #[test]
    fn abort_ends_in_terminal_state() {
        let (mut e, _clock) = single();
        drag_forward(&mut e);
        e.on_finger_up(300.0, 1390.0, 250, true, true).unwrap();
        e.abort_animating();
        assert_eq!(e.flip_state(), FlipState::EndWithForward);
        assert!(!e.is_animating());

        // Anything else is left alone.
        e.abort_animating();
        assert_eq!(e.flip_state(), FlipState::EndWithForward);
    }

    #[test]
    fn can_animate_only_outside_page_while_forward() {
        let (mut e, _clock) = single();
        assert!(!e.can_animate(-10.0, 100.0));
        drag_forward(&mut e);
        assert!(e.can_animate(-10.0, 100.0));
        assert!(!e.can_animate(500.0, 700.0));
    }

    #[test]
    fn flip_frame_draw_order() {
        let (mut e, _clock) = single();
        drag_forward(&mut e);
        e.draw_flip_frame().unwrap();

        let frame = e.backend().last_frame().unwrap();
        let kinds: Vec<&str> = frame
            .commands
            .iter()
            .map(|c| match c {
                DrawCommand::Clear { .. } => "clear",
                DrawCommand::Textured { layer: DrawLayer::Underlay, .. } => "underlay",
                DrawCommand::Textured { layer: DrawLayer::FullPage, .. } => "full",
                DrawCommand::Textured { layer: DrawLayer::Front, .. } => "front",
                DrawCommand::BackOfFold { .. } => "back",
                DrawCommand::Shadow { .. } => "shadow",
            })
            .collect();
        assert_eq!(kinds, ["clear", "underlay", "front", "back", "shadow", "shadow"]);

        match &frame.commands[3] {
            DrawCommand::BackOfFold { gradient, mask, tex_x_offset, .. } => {
                assert!(gradient.is_some());
                assert_eq!(mask[3], e.config().mask_alpha);
                assert!((mask[0] - 250.0 / 255.0).abs() < 1e-6);
                assert_eq!(*tex_x_offset, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unset_textures_are_skipped() {
        let (mut e, _clock) = engine(1000, 1500, false);
        drag_forward(&mut e);
        let frame = e.build_flip_frame().unwrap();
        assert!(frame.commands.iter().all(|c| matches!(c, DrawCommand::Clear { .. } | DrawCommand::Shadow { .. })));
    }

    #[test]
    fn page_frame_draws_first_textures() {
        let (mut e, _clock) = single();
        e.draw_page_frame().unwrap();
        let frame = e.backend().last_frame().unwrap();
        assert_eq!(frame.commands.len(), 2);
    }

    #[test]
    fn second_page_texture_needs_two_pages() {
        let (mut e, _clock) = engine(1000, 1500, false);
        let live = e.backend().live_textures();
        let err = e.set_first_texture(false, &Bitmap::solid(4, 4, [0, 0, 0, 255])).unwrap_err();
        assert_eq!(err, FlipError::NoTwoPages);
        assert_eq!(err.code(), -15);
        assert_eq!(e.backend().live_textures(), live);
    }

    #[test]
    fn texture_before_surface_is_null_page() {
        let mut e = PageFlip::new(RecordingBackend::new(), FlipConfig::default()).unwrap();
        let err = e.set_first_texture(true, &Bitmap::solid(4, 4, [0; 4])).unwrap_err();
        assert_eq!(err.code(), -16);
    }

    #[test]
    fn bad_bitmap_does_not_reach_backend() {
        let (mut e, _clock) = engine(1000, 1500, false);
        let live = e.backend().live_textures();
        let bad = Bitmap::new(4, 4, crate::texture::PixelFormat::Alpha8, vec![0; 16]);
        assert_eq!(e.set_first_texture(true, &bad).unwrap_err().code(), -12);
        assert_eq!(e.backend().live_textures(), live);
        assert!(!e.is_texture_set(true, TextureKind::First).unwrap());
    }

    #[test]
    fn replaced_textures_are_recycled_once_per_frame() {
        let (mut e, _clock) = single();
        let old = e.page(true).unwrap().textures.get(TextureKind::First).unwrap().id;
        e.set_first_texture_with_second().unwrap();
        assert!(e.backend().is_live(old));
        e.recycle_textures();
        assert!(!e.backend().is_live(old));
        assert!(e.is_texture_set(true, TextureKind::First).unwrap());
        assert!(!e.is_texture_set(true, TextureKind::Second).unwrap());
    }

    #[test]
    fn back_texture_none_falls_back_to_first() {
        let (mut e, _clock) = single();
        e.set_back_texture(true, Some(&Bitmap::solid(4, 4, [9, 9, 9, 255]))).unwrap();
        assert!(e.is_texture_set(true, TextureKind::Back).unwrap());
        e.set_back_texture(true, None).unwrap();
        assert!(!e.is_texture_set(true, TextureKind::Back).unwrap());
        let page = e.page(true).unwrap();
        assert_eq!(
            page.textures.back_texture().map(|t| t.id),
            page.textures.get(TextureKind::First).map(|t| t.id)
        );
    }

    #[test]
    fn auto_page_splits_landscape_surface() {
        let (mut e, _clock) = engine(2000, 1500, true);
        assert!(e.has_second_page());
        assert!(e.page(true).unwrap().is_left_page());
        assert!(e.page(false).unwrap().is_right_page());
        assert_eq!(e.page(true).unwrap().width(), 1000.0);

        e.set_first_texture(true, &Bitmap::solid(4, 4, [1, 1, 1, 255])).unwrap();
        assert!(e.enable_auto_page(false));
        assert!(!e.has_second_page());
        assert_eq!(e.backend().live_textures(), 1, "only the light ramp survives");
        assert!(!e.enable_auto_page(false));
    }

    #[test]
    fn double_page_forward_flip_swaps_textures() {
        let (mut e, clock) = engine(2000, 1500, true);
        let solid = |v: u8| Bitmap::solid(8, 8, [v, v, v, 255]);
        // left page: p, right page: p+1, back p+2, second p+3
        e.set_first_texture(true, &solid(10)).unwrap();
        e.set_first_texture(false, &solid(11)).unwrap();
        e.set_back_texture(false, Some(&solid(12))).unwrap();
        e.set_second_texture(false, &solid(13)).unwrap();

        // Touching the right page makes it FIRST.
        assert!(e.on_finger_down(1900.0, 1400.0).unwrap());
        assert!(e.page(true).unwrap().is_right_page());
        assert!(e.on_finger_move(1800.0, 1390.0, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::ForwardFlip);
        assert!(e.on_finger_move(1100.0, 1390.0, true, true).unwrap());

        e.draw_flip_frame().unwrap();
        let frame = e.backend().last_frame().unwrap();
        assert!(frame.commands.iter().any(|c| matches!(
            c,
            DrawCommand::Textured { layer: DrawLayer::FullPage, .. }
        )));
        assert!(frame.commands.iter().any(|c| matches!(
            c,
            DrawCommand::BackOfFold { mask, tex_x_offset, .. } if mask[3] == 0.0 && *tex_x_offset == 1.0
        )));

        assert!(e.on_finger_up(1100.0, 1390.0, 250, true, true).unwrap());
        run_animation(&mut e, &clock);
        assert_eq!(e.flip_state(), FlipState::EndWithForward);

        let mask_of = |e: &PageFlip<RecordingBackend>, first: bool| {
            e.page(first).unwrap().textures.get(TextureKind::First).unwrap().mask_color[0]
        };
        e.swap_second_textures_with_first().unwrap();
        assert!((mask_of(&e, true) - 13.0 / 255.0).abs() < 1e-6);
        assert!((mask_of(&e, false) - 12.0 / 255.0).abs() < 1e-6);
        e.recycle_textures();
    }

    #[test]
    fn dragging_onto_other_page_is_rejected() {
        let (mut e, _clock) = engine(2000, 1500, true);
        assert!(e.on_finger_down(1900.0, 1400.0).unwrap());
        assert!(e.on_finger_move(1800.0, 1390.0, true, true).unwrap());
        assert!(!e.on_finger_move(500.0, 1390.0, true, true).unwrap());
        assert_eq!(e.flip_state(), FlipState::ForwardFlip);
    }

    #[test]
    fn rejected_config_keeps_previous_values() {
        let (mut e, _clock) = single();
        assert!(e.set_semi_perimeter_ratio(0.0).is_err());
        assert!(e.set_pixels_of_mesh(0).is_err());
        assert_eq!(e.config(), &FlipConfig::default());
        e.set_pixels_of_mesh(25).unwrap();
        assert_eq!(e.pixels_of_mesh(), 25);
    }

    #[test]
    fn failed_submit_leaves_state_alone() {
        let (mut e, _clock) = single();
        drag_forward(&mut e);
        let before = *e.fold();
        e.backend_mut().fail_next_submit = true;
        assert_eq!(e.draw_flip_frame().unwrap_err().code(), -5);
        assert_eq!(*e.fold(), before);
        assert_eq!(e.flip_state(), FlipState::ForwardFlip);
        assert!(e.draw_flip_frame().is_ok());
    }
}
