// ============================================================================
// SESSION — lifecycle-checked facade over one engine
// ============================================================================
//
// Hosts that drive the engine through integer codes go through `FlipSession`:
// every call fails with `Uninitialized` until `init` and again after
// `release`, and the code of the latest call is kept for `last_error`.
//
// `SharedSession` wraps a session in one coarse lock so an input thread and a
// render thread can share it.
// ============================================================================

use std::sync::{Arc, Mutex};

use crate::config::FlipConfig;
use crate::engine::PageFlip;
use crate::error::{FlipError, Result};
use crate::render::RenderBackend;
use crate::scroller::Clock;
use crate::shadow::{ShadowColor, ShadowWidth};
use crate::state::FlipState;
use crate::texture::{Bitmap, TextureKind};

pub struct FlipSession<B: RenderBackend> {
    engine: Option<PageFlip<B>>,
    last_error: i32,
}

impl<B: RenderBackend> Default for FlipSession<B> {
    fn default() -> Self {
        Self { engine: None, last_error: FlipError::OK }
    }
}

impl<B: RenderBackend> FlipSession<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the live engine, recording its outcome.
    fn with<T>(&mut self, f: impl FnOnce(&mut PageFlip<B>) -> Result<T>) -> Result<T> {
        let result = match self.engine.as_mut() {
            Some(engine) => f(engine),
            None => Err(FlipError::Uninitialized),
        };
        self.record(result)
    }

    fn read<T>(&mut self, f: impl FnOnce(&PageFlip<B>) -> Result<T>) -> Result<T> {
        let result = match self.engine.as_ref() {
            Some(engine) => f(engine),
            None => Err(FlipError::Uninitialized),
        };
        self.record(result)
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        self.last_error = match &result {
            Ok(_) => FlipError::OK,
            Err(e) => {
                log::warn!("page flip call failed: {e}");
                e.code()
            }
        };
        result
    }

    fn bitmap<'a>(bitmap: Option<&'a Bitmap>) -> Result<&'a Bitmap> {
        bitmap.ok_or(FlipError::NullParameter("bitmap"))
    }

    pub fn engine(&self) -> Option<&PageFlip<B>> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut PageFlip<B>> {
        self.engine.as_mut()
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    pub fn init(&mut self, backend: B) -> Result<()> {
        self.init_with(backend, FlipConfig::default())
    }

    /// Start a session.  Re-initializing releases the previous engine first.
    pub fn init_with(&mut self, backend: B, config: FlipConfig) -> Result<()> {
        let result = PageFlip::new(backend, config);
        self.install(result)
    }

    pub fn init_with_clock(&mut self, backend: B, config: FlipConfig, clock: Box<dyn Clock>) -> Result<()> {
        let result = PageFlip::with_clock(backend, config, clock);
        self.install(result)
    }

    fn install(&mut self, result: Result<PageFlip<B>>) -> Result<()> {
        let result = result.map(|engine| {
            if let Some(mut old) = self.engine.replace(engine) {
                old.release();
            }
            log::info!("page flip session initialized");
        });
        self.record(result)
    }

    pub fn release(&mut self) -> Result<()> {
        let result = match self.engine.take() {
            Some(mut engine) => {
                engine.release();
                log::info!("page flip session released");
                Ok(())
            }
            None => Err(FlipError::Uninitialized),
        };
        self.record(result)
    }

    pub fn on_surface_created(&mut self) -> Result<()> {
        self.with(|e| e.on_surface_created())
    }

    pub fn on_surface_changed(&mut self, width: u32, height: u32) -> Result<()> {
        self.with(|e| e.on_surface_changed(width, height))
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    pub fn set_pixels_of_mesh(&mut self, pixels: u32) -> Result<()> {
        self.with(|e| e.set_pixels_of_mesh(pixels))
    }

    pub fn set_semi_perimeter_ratio(&mut self, ratio: f32) -> Result<()> {
        self.with(|e| e.set_semi_perimeter_ratio(ratio))
    }

    pub fn set_shadow_color_of_fold_edges(&mut self, color: ShadowColor) -> Result<()> {
        self.with(|e| e.set_shadow_color_of_fold_edges(color))
    }

    pub fn set_shadow_color_of_fold_base(&mut self, color: ShadowColor) -> Result<()> {
        self.with(|e| e.set_shadow_color_of_fold_base(color))
    }

    pub fn set_shadow_width_of_fold_edges(&mut self, width: ShadowWidth) -> Result<()> {
        self.with(|e| e.set_shadow_width_of_fold_edges(width))
    }

    pub fn set_shadow_width_of_fold_base(&mut self, width: ShadowWidth) -> Result<()> {
        self.with(|e| e.set_shadow_width_of_fold_base(width))
    }

    pub fn set_mask_alpha_of_fold(&mut self, alpha: i32) -> Result<()> {
        self.with(|e| e.set_mask_alpha_of_fold(alpha))
    }

    pub fn enable_auto_page(&mut self, enable: bool) -> Result<bool> {
        self.with(|e| Ok(e.enable_auto_page(enable)))
    }

    pub fn enable_click_to_flip(&mut self, enable: bool) -> Result<()> {
        self.with(|e| {
            e.enable_click_to_flip(enable);
            Ok(())
        })
    }

    pub fn set_width_ratio_of_click_to_flip(&mut self, ratio: f32) -> Result<()> {
        self.with(|e| e.set_width_ratio_of_click_to_flip(ratio))
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn pixels_of_mesh(&mut self) -> Result<u32> {
        self.read(|e| Ok(e.pixels_of_mesh()))
    }

    pub fn surface_width(&mut self) -> Result<u32> {
        self.read(|e| Ok(e.surface_width()))
    }

    pub fn surface_height(&mut self) -> Result<u32> {
        self.read(|e| Ok(e.surface_height()))
    }

    pub fn page_width(&mut self, first: bool) -> Result<f32> {
        self.read(|e| Ok(e.page(first)?.width()))
    }

    pub fn page_height(&mut self, first: bool) -> Result<f32> {
        self.read(|e| Ok(e.page(first)?.height()))
    }

    pub fn is_left_page(&mut self, first: bool) -> Result<bool> {
        self.read(|e| Ok(e.page(first)?.is_left_page()))
    }

    pub fn is_right_page(&mut self, first: bool) -> Result<bool> {
        self.read(|e| Ok(e.page(first)?.is_right_page()))
    }

    pub fn has_first_page(&mut self) -> Result<bool> {
        self.read(|e| Ok(e.has_first_page()))
    }

    pub fn has_second_page(&mut self) -> Result<bool> {
        self.read(|e| Ok(e.has_second_page()))
    }

    pub fn is_first_texture_set(&mut self, first: bool) -> Result<bool> {
        self.read(|e| e.is_texture_set(first, TextureKind::First))
    }

    pub fn is_second_texture_set(&mut self, first: bool) -> Result<bool> {
        self.read(|e| e.is_texture_set(first, TextureKind::Second))
    }

    pub fn is_back_texture_set(&mut self, first: bool) -> Result<bool> {
        self.read(|e| e.is_texture_set(first, TextureKind::Back))
    }

    pub fn is_animating(&mut self) -> Result<bool> {
        self.read(|e| Ok(e.is_animating()))
    }

    pub fn flip_state(&mut self) -> Result<FlipState> {
        self.read(|e| Ok(e.flip_state()))
    }

    pub fn is_auto_page_enabled(&mut self) -> Result<bool> {
        self.read(|e| Ok(e.is_auto_page_enabled()))
    }

    /// Code of the most recent call; 0 after a success.
    pub fn last_error(&self) -> i32 {
        self.last_error
    }

    // ========================================================================
    // TEXTURES
    // ========================================================================

    pub fn set_first_texture(&mut self, first: bool, bitmap: Option<&Bitmap>) -> Result<()> {
        self.with(|e| e.set_first_texture(first, Self::bitmap(bitmap)?))
    }

    pub fn set_second_texture(&mut self, first: bool, bitmap: Option<&Bitmap>) -> Result<()> {
        self.with(|e| e.set_second_texture(first, Self::bitmap(bitmap)?))
    }

    /// `None` clears the back texture.
    pub fn set_back_texture(&mut self, first: bool, bitmap: Option<&Bitmap>) -> Result<()> {
        self.with(|e| e.set_back_texture(first, bitmap))
    }

    pub fn set_gradient_light_texture(&mut self, bitmap: Option<&Bitmap>) -> Result<()> {
        self.with(|e| e.set_gradient_light_texture(Self::bitmap(bitmap)?))
    }

    pub fn set_first_texture_with_second(&mut self) -> Result<()> {
        self.with(|e| e.set_first_texture_with_second())
    }

    pub fn set_second_texture_with_first(&mut self) -> Result<()> {
        self.with(|e| e.set_second_texture_with_first())
    }

    pub fn swap_second_textures_with_first(&mut self) -> Result<()> {
        self.with(|e| e.swap_second_textures_with_first())
    }

    pub fn recycle_textures(&mut self) -> Result<()> {
        self.with(|e| {
            e.recycle_textures();
            Ok(())
        })
    }

    // ========================================================================
    // INPUT
    // ========================================================================

    pub fn on_finger_down(&mut self, x: f32, y: f32) -> Result<bool> {
        self.with(|e| e.on_finger_down(x, y))
    }

    pub fn on_finger_move(&mut self, x: f32, y: f32, can_forward: bool, can_backward: bool) -> Result<bool> {
        self.with(|e| e.on_finger_move(x, y, can_forward, can_backward))
    }

    pub fn on_finger_up(
        &mut self,
        x: f32,
        y: f32,
        duration_ms: u32,
        can_forward: bool,
        can_backward: bool,
    ) -> Result<bool> {
        self.with(|e| e.on_finger_up(x, y, duration_ms, can_forward, can_backward))
    }

    pub fn can_animate(&mut self, x: f32, y: f32) -> Result<bool> {
        self.read(|e| Ok(e.can_animate(x, y)))
    }

    pub fn animating(&mut self) -> Result<bool> {
        self.with(|e| e.animating())
    }

    pub fn abort_animating(&mut self) -> Result<()> {
        self.with(|e| {
            e.abort_animating();
            Ok(())
        })
    }

    /// Return an END_WITH_* state to END_FLIP once the host has turned the
    /// page.  Yields the state that was settled.
    pub fn settle(&mut self) -> Result<FlipState> {
        self.with(|e| Ok(e.settle()))
    }

    // ========================================================================
    // DRAW
    // ========================================================================

    pub fn draw_flip_frame(&mut self) -> Result<()> {
        self.with(|e| e.draw_flip_frame())
    }

    pub fn draw_page_frame(&mut self) -> Result<()> {
        self.with(|e| e.draw_page_frame())
    }
}

/// A session shared between threads.
pub struct SharedSession<B: RenderBackend> {
    inner: Arc<Mutex<FlipSession<B>>>,
}

impl<B: RenderBackend> Clone for SharedSession<B> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<B: RenderBackend> Default for SharedSession<B> {
    fn default() -> Self {
        Self::new(FlipSession::new())
    }
}

impl<B: RenderBackend> SharedSession<B> {
    pub fn new(session: FlipSession<B>) -> Self {
        Self { inner: Arc::new(Mutex::new(session)) }
    }

    /// Run `f` under the lock.  A poisoned lock is reported as a generic
    /// error instead of propagating the panic.
    pub fn lock<T>(&self, f: impl FnOnce(&mut FlipSession<B>) -> Result<T>) -> Result<T> {
        match self.inner.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(_) => {
                log::error!("page flip session lock poisoned");
                Err(FlipError::Other("session lock poisoned".into()))
            }
        }
    }
}
