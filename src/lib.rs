//! Page curl engine: turns finger gestures into a curled-page mesh, shadow
//! bands and per-frame draw lists, rendered through a pluggable backend.
//!
//! [`PageFlip`] is the engine, [`FlipSession`] the handle-style facade with
//! integer error codes, and [`Book`] a page-numbering controller built on top.
//! [`gpu::WgpuBackend`] draws frames offscreen with wgpu; [`RecordingBackend`]
//! keeps them in memory.

#![allow(clippy::too_many_arguments)]

pub mod book;
pub mod cli;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod gpu;
pub mod logger;
pub mod mesh;
pub mod page;
pub mod render;
pub mod scroller;
pub mod session;
pub mod shadow;
pub mod state;
pub mod texture;

pub use book::{Book, RenderRequest};
pub use config::FlipConfig;
pub use content::{ContentRasterizer, PaperRasterizer, SolidRasterizer};
pub use engine::PageFlip;
pub use error::{FlipError, Result};
pub use frame::{DrawCommand, Frame};
pub use render::{RecordingBackend, RenderBackend};
pub use scroller::{Clock, Interpolator, ManualClock, SystemClock};
pub use session::{FlipSession, SharedSession};
pub use shadow::{ShadowColor, ShadowWidth};
pub use state::{FlipState, PageMode};
pub use texture::{Bitmap, PixelFormat, TextureKind};
