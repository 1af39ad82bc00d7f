// ============================================================================
// FLIP CONFIG — validated fold parameters, persisted as JSON
// ============================================================================

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FlipError, Result};
use crate::scroller::Interpolator;
use crate::shadow::{ShadowColor, ShadowWidth};

pub const DEFAULT_PIXELS_OF_MESH: u32 = 10;
pub const DEFAULT_SEMI_PERIMETER_RATIO: f32 = 0.8;
pub const DEFAULT_MASK_ALPHA: f32 = 0.6;
pub const DEFAULT_CLICK_TO_FLIP_WIDTH_RATIO: f32 = 0.5;
pub const DEFAULT_DURATION_MS: u32 = 250;

/// Everything that shapes a fold.  Missing JSON fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipConfig {
    /// Mesh cell size in pixels.
    pub pixels_of_mesh: u32,
    /// Portion of |T - O| spent on the curl, in (0, 1].
    pub semi_perimeter_ratio: f32,
    pub edge_shadow_color: ShadowColor,
    pub base_shadow_color: ShadowColor,
    pub edge_shadow_width: ShadowWidth,
    pub base_shadow_width: ShadowWidth,
    /// Opacity of the page tint on the back of a fold, in [0, 1].
    pub mask_alpha: f32,
    pub auto_page: bool,
    pub click_to_flip: bool,
    /// Width ratio of the click-sensitive strips, in (0, 0.5].  The same
    /// ratio sizes the forward strip along the page's free edge and the
    /// backward strip along the opposite edge.
    pub click_to_flip_width_ratio: f32,
    pub interpolator: Interpolator,
    pub duration_ms: u32,
}

impl Default for FlipConfig {
    fn default() -> Self {
        Self {
            pixels_of_mesh: DEFAULT_PIXELS_OF_MESH,
            semi_perimeter_ratio: DEFAULT_SEMI_PERIMETER_RATIO,
            edge_shadow_color: ShadowColor {
                start_color: 0.1,
                start_alpha: 0.25,
                end_color: 0.3,
                end_alpha: 0.0,
            },
            base_shadow_color: ShadowColor {
                start_color: 0.05,
                start_alpha: 0.4,
                end_color: 0.3,
                end_alpha: 0.0,
            },
            edge_shadow_width: ShadowWidth { min: 5.0, max: 30.0, ratio: 0.25 },
            base_shadow_width: ShadowWidth { min: 2.0, max: 40.0, ratio: 0.4 },
            mask_alpha: DEFAULT_MASK_ALPHA,
            auto_page: false,
            click_to_flip: true,
            click_to_flip_width_ratio: DEFAULT_CLICK_TO_FLIP_WIDTH_RATIO,
            interpolator: Interpolator::default(),
            duration_ms: DEFAULT_DURATION_MS,
        }
    }
}

impl FlipConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FlipConfig = serde_json::from_str(json)
            .map_err(|e| FlipError::invalid(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| FlipError::Other(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| FlipError::Other(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        check_pixels(self.pixels_of_mesh)?;
        check_ratio(self.semi_perimeter_ratio)?;
        self.edge_shadow_color.validate()?;
        self.base_shadow_color.validate()?;
        self.edge_shadow_width.validate()?;
        self.base_shadow_width.validate()?;
        if !(0.0..=1.0).contains(&self.mask_alpha) {
            return Err(FlipError::invalid(format!("mask alpha {}", self.mask_alpha)));
        }
        check_click_ratio(self.click_to_flip_width_ratio)?;
        self.interpolator.validate()?;
        Ok(())
    }

    // --- setters: validate, then mutate ---------------------------------

    pub fn set_pixels_of_mesh(&mut self, pixels: u32) -> Result<()> {
        check_pixels(pixels)?;
        self.pixels_of_mesh = pixels;
        Ok(())
    }

    pub fn set_semi_perimeter_ratio(&mut self, ratio: f32) -> Result<()> {
        check_ratio(ratio)?;
        self.semi_perimeter_ratio = ratio;
        Ok(())
    }

    /// Mask alpha arrives as a byte-sized integer.
    pub fn set_mask_alpha(&mut self, alpha: i32) -> Result<()> {
        if !(0..=255).contains(&alpha) {
            return Err(FlipError::invalid(format!("mask alpha {alpha}")));
        }
        self.mask_alpha = alpha as f32 / 255.0;
        Ok(())
    }

    pub fn set_edge_shadow_color(&mut self, color: ShadowColor) -> Result<()> {
        color.validate()?;
        self.edge_shadow_color = color;
        Ok(())
    }

    pub fn set_base_shadow_color(&mut self, color: ShadowColor) -> Result<()> {
        color.validate()?;
        self.base_shadow_color = color;
        Ok(())
    }

    pub fn set_edge_shadow_width(&mut self, width: ShadowWidth) -> Result<()> {
        width.validate()?;
        self.edge_shadow_width = width;
        Ok(())
    }

    pub fn set_base_shadow_width(&mut self, width: ShadowWidth) -> Result<()> {
        width.validate()?;
        self.base_shadow_width = width;
        Ok(())
    }

    pub fn set_click_to_flip_width_ratio(&mut self, ratio: f32) -> Result<()> {
        check_click_ratio(ratio)?;
        self.click_to_flip_width_ratio = ratio;
        Ok(())
    }
}

fn check_pixels(pixels: u32) -> Result<()> {
    if pixels == 0 {
        return Err(FlipError::invalid("pixels of mesh must be positive"));
    }
    Ok(())
}

fn check_ratio(ratio: f32) -> Result<()> {
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(FlipError::invalid(format!("semi-perimeter ratio {ratio}")));
    }
    Ok(())
}

fn check_click_ratio(ratio: f32) -> Result<()> {
    if !(ratio > 0.0 && ratio <= 0.5) {
        return Err(FlipError::invalid(format!("click-to-flip width ratio {ratio}")));
    }
    Ok(())
}
