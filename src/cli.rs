// ============================================================================
// PageFlip CLI — headless flip demo driven by a scripted gesture
// ============================================================================
//
// Usage examples:
//   pageflip --gesture forward --frames-dir out/
//   pageflip --double --width 1600 --height 1000 --pages 8 --gesture backward
//   pageflip --gesture click --config fold.json --font "DejaVu Serif" -v
//
// Frames are rendered offscreen through wgpu and written as numbered PNGs.
// Without a usable adapter the demo still runs the full gesture against the
// recording backend and prints per-frame statistics instead.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use crate::book::Book;
use crate::config::FlipConfig;
use crate::content::PaperRasterizer;
use crate::engine::PageFlip;
use crate::gpu::{GpuPreference, WgpuBackend};
use crate::render::{FrameStats, RecordingBackend, RenderBackend};
use crate::scroller::ManualClock;

/// Simulated frame interval.
const FRAME_MS: u64 = 16;
/// Upper bound on animation frames after the finger lifts.
const MAX_ANIMATION_FRAMES: usize = 600;
/// Intermediate finger positions between the first move and the release.
const DRAG_STEPS: usize = 12;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Gesture {
    /// Drag the bottom-right corner across the page.
    Forward,
    /// Drag the bottom-left corner back across the page.
    Backward,
    /// Tap near the right edge.
    Click,
}

/// Headless page flip demo.
#[derive(Parser, Debug)]
#[command(
    name = "pageflip",
    about = "Render a page flip gesture to PNG frames",
    long_about = "Drives the page flip engine with a scripted finger gesture and renders\n\
                  every frame offscreen.  Frames are written as frame_0000.png,\n\
                  frame_0001.png, ... when --frames-dir is given.\n\n\
                  Example:\n  \
                  pageflip --gesture forward --frames-dir out/\n  \
                  pageflip --double --pages 8 --gesture backward"
)]
pub struct CliArgs {
    /// Surface width in pixels.
    #[arg(long, default_value_t = 720)]
    pub width: u32,

    /// Surface height in pixels.
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// Number of pages in the demo book.
    #[arg(long, default_value_t = 6)]
    pub pages: u32,

    /// Show two pages side by side (auto page on a landscape surface).
    #[arg(long)]
    pub double: bool,

    /// Mesh cell size in pixels (overrides --config).
    #[arg(long, value_name = "PX")]
    pub mesh_pixels: Option<u32>,

    /// Animation duration in milliseconds (overrides --config).
    #[arg(long, value_name = "MS")]
    pub duration: Option<u32>,

    #[arg(long, value_enum, default_value_t = Gesture::Forward)]
    pub gesture: Gesture,

    /// Directory for the rendered PNG frames.
    #[arg(long, value_name = "DIR")]
    pub frames_dir: Option<PathBuf>,

    /// Fold configuration as JSON.
    #[arg(long, value_name = "FILE.json")]
    pub config: Option<PathBuf>,

    /// Font family for page numbers.
    #[arg(long, value_name = "FAMILY")]
    pub font: Option<String>,

    /// GPU preference: "high performance", "low power" or "software".
    #[arg(long, default_value = "high performance", value_parser = parse_gpu)]
    pub gpu: GpuPreference,

    /// Log debug output and per-frame statistics.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the demo and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();
    match run_inner(&args) {
        Ok(frames) => {
            println!(
                "{frames} frames in {:.0}ms",
                start.elapsed().as_secs_f64() * 1000.0
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_inner(args: &CliArgs) -> Result<usize, String> {
    let config = build_config(args)?;

    if let Some(dir) = &args.frames_dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("could not create '{}': {e}", dir.display()))?;
    }

    let rasterizer = match &args.font {
        Some(family) => PaperRasterizer::with_system_font(family),
        None => PaperRasterizer::new(crate::content::load_system_font("serif")),
    };

    match WgpuBackend::try_new(args.gpu) {
        Some(backend) => {
            let kind = if backend.is_software() { "software" } else { "hardware" };
            println!("rendering on {} ({kind})", backend.adapter_name());
            let frames_dir = args.frames_dir.clone();
            drive(args, config, backend, rasterizer, move |engine, index| {
                let Some(dir) = &frames_dir else {
                    return Ok(());
                };
                let image = engine.backend_mut().snapshot().map_err(|e| e.to_string())?;
                let path = frame_path(dir, index);
                image
                    .save(&path)
                    .map_err(|e| format!("could not write '{}': {e}", path.display()))
            })
        }
        None => {
            log::warn!("no GPU adapter, falling back to the recording backend");
            eprintln!("warning: no GPU adapter available, frames are recorded but not rasterized");
            if args.frames_dir.is_some() {
                eprintln!("warning: --frames-dir ignored without a GPU");
            }
            let verbose = args.verbose;
            drive(args, config, RecordingBackend::new(), rasterizer, move |engine, index| {
                if let Some(frame) = engine.backend().last_frame() {
                    let stats = FrameStats::of(frame);
                    if verbose {
                        println!(
                            "  frame {index:04}: {} commands, {} triangles, {} shadow triangles",
                            stats.commands, stats.triangles, stats.shadow_triangles
                        );
                    }
                }
                Ok(())
            })
        }
    }
}

fn parse_gpu(s: &str) -> Result<GpuPreference, String> {
    s.parse()
}

fn build_config(args: &CliArgs) -> Result<FlipConfig, String> {
    let mut config = match &args.config {
        Some(path) => FlipConfig::load(path).map_err(|e| e.to_string())?,
        None => FlipConfig::default(),
    };
    if let Some(px) = args.mesh_pixels {
        config.set_pixels_of_mesh(px).map_err(|e| e.to_string())?;
    }
    if let Some(ms) = args.duration {
        config.duration_ms = ms;
    }
    config.auto_page = args.double;
    Ok(config)
}

fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{index:04}.png"))
}

// ============================================================================
// Gesture driver
// ============================================================================

/// Finger positions for `gesture`, in surface pixels (y down).
fn gesture_path(gesture: Gesture, width: u32, height: u32, double: bool) -> Vec<(f32, f32)> {
    let (w, h) = (width as f32, height as f32);
    let (y0, y1) = (h * 0.93, h * 0.925);
    let (first, second, last) = match (gesture, double) {
        (Gesture::Click, _) => return vec![(w * 0.95, y0)],
        (Gesture::Forward, false) => (w * 0.9, w * 0.85, w * 0.3),
        (Gesture::Backward, false) => (w * 0.1, w * 0.2, w * 0.9),
        // Stop short of the spine so the fold never crosses into the other page.
        (Gesture::Forward, true) => (w * 0.95, w * 0.925, w * 0.52),
        (Gesture::Backward, true) => (w * 0.05, w * 0.075, w * 0.48),
    };
    let mut path = vec![(first, y0)];
    for i in 0..=DRAG_STEPS {
        let t = i as f32 / DRAG_STEPS as f32;
        path.push((second + (last - second) * t, y1));
    }
    path
}

fn drive<B, F>(
    args: &CliArgs,
    config: FlipConfig,
    backend: B,
    rasterizer: PaperRasterizer,
    mut on_frame: F,
) -> Result<usize, String>
where
    B: RenderBackend,
    F: FnMut(&mut PageFlip<B>, usize) -> Result<(), String>,
{
    let clock = ManualClock::new();
    let duration = config.duration_ms;
    let mut engine = PageFlip::with_clock(backend, config, Box::new(clock.clone())).map_err(|e| e.to_string())?;
    engine.on_surface_created().map_err(|e| e.to_string())?;
    engine
        .on_surface_changed(args.width, args.height)
        .map_err(|e| e.to_string())?;
    let double = engine.has_second_page();
    if args.double && !double {
        log::warn!("{}x{} is portrait, showing a single page", args.width, args.height);
    }

    let mut book = Book::new(args.pages, rasterizer).map_err(|e| e.to_string())?;
    if args.gesture == Gesture::Backward {
        // Start one flip in so there is a page to go back to.
        let page = if double { 3 } else { 2 };
        book.set_page(&mut engine, page)
            .map_err(|e| format!("backward gesture needs at least {page} pages: {e}"))?;
    }

    let mut frames = 0usize;
    let mut render = |engine: &mut PageFlip<B>, book: &mut Book<PaperRasterizer>| -> Result<bool, String> {
        let more = book.render(engine).map_err(|e| e.to_string())?;
        on_frame(engine, frames)?;
        frames += 1;
        Ok(more)
    };

    render(&mut engine, &mut book)?;

    let path = gesture_path(args.gesture, args.width, args.height, double);
    let (x, y) = path[0];
    if !book.on_finger_down(&mut engine, x, y).map_err(|e| e.to_string())? {
        return Err(format!("gesture starts outside the page at ({x}, {y})"));
    }
    for &(x, y) in &path[1..] {
        if book.on_finger_move(&mut engine, x, y).map_err(|e| e.to_string())? {
            render(&mut engine, &mut book)?;
        }
    }
    let (x, y) = path[path.len() - 1];
    let animating = book
        .on_finger_up(&mut engine, x, y, duration)
        .map_err(|e| e.to_string())?;
    log::info!("finger up at ({x}, {y}), animating: {animating}");

    let mut animation_frames = 0;
    while render(&mut engine, &mut book)? {
        clock.advance(FRAME_MS);
        animation_frames += 1;
        if animation_frames > MAX_ANIMATION_FRAMES {
            return Err("animation did not finish".into());
        }
    }
    log::info!("gesture {:?} done on page {} of {}", args.gesture, book.page_no(), book.page_count());
    println!("now on page {} of {}", book.page_no(), book.page_count());
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["pageflip"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    fn recorded(args: &CliArgs) -> (usize, usize) {
        let config = build_config(args).unwrap();
        let mut shadows = 0;
        let frames = drive(args, config, RecordingBackend::new(), PaperRasterizer::new(None), |engine, _| {
            let frame = engine.backend().last_frame().unwrap();
            shadows = shadows.max(FrameStats::of(frame).shadow_triangles);
            Ok(())
        })
        .unwrap();
        (frames, shadows)
    }

    #[test]
    fn defaults_parse() {
        let a = args(&[]);
        assert_eq!((a.width, a.height, a.pages), (720, 1080, 6));
        assert_eq!(a.gesture, Gesture::Forward);
        assert!(!a.double && a.frames_dir.is_none());
    }

    #[test]
    fn overrides_reach_the_config() {
        let a = args(&["--mesh-pixels", "20", "--duration", "300", "--double"]);
        let c = build_config(&a).unwrap();
        assert_eq!((c.pixels_of_mesh, c.duration_ms, c.auto_page), (20, 300, true));
        assert!(build_config(&args(&["--mesh-pixels", "0"])).is_err());
    }

    #[test]
    fn every_gesture_runs_to_completion() {
        for gesture in ["forward", "backward", "click"] {
            let a = args(&["--width", "400", "--height", "600", "--gesture", gesture, "--duration", "200"]);
            let (frames, shadows) = recorded(&a);
            assert!(frames > 2, "{gesture}: {frames} frames");
            assert!(shadows > 0, "{gesture}: no shadow drawn");
        }
    }

    #[test]
    fn double_page_gestures_run() {
        for gesture in ["forward", "backward"] {
            let a = args(&["--double", "--width", "800", "--height", "500", "--gesture", gesture]);
            let (frames, _) = recorded(&a);
            assert!(frames > 2);
        }
    }

    #[test]
    fn frame_names_are_zero_padded() {
        assert_eq!(frame_path(Path::new("out"), 7), Path::new("out").join("frame_0007.png"));
    }
}
