// ============================================================================
// SCROLLER — timed interpolation of the touch point during animation
// ============================================================================
//
// There is no timer thread.  The render loop calls `compute_scroll_offset`
// once per frame and the scroller reads elapsed time from its `Clock`.
// Tests drive a `ManualClock` so every frame lands on a known instant.
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{FlipError, Result};

/// Milliseconds source for animations.
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time since construction.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Hand-advanced clock.  Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

const VISCOUS_FLUID_SCALE: f32 = 8.0;

fn viscous_fluid(x: f32) -> f32 {
    let x = x * VISCOUS_FLUID_SCALE;
    if x < 1.0 {
        x - (1.0 - (-x).exp())
    } else {
        // 1/e: value of the first branch at x = 1
        let start = 0.367_879_44;
        let x = 1.0 - (1.0 - x).exp();
        start + x * (1.0 - start)
    }
}

/// Progress curve of an animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolator {
    Linear,
    Accelerate { factor: f32 },
    /// Quick start, long soft landing.
    #[default]
    ViscousFluid,
}

impl Interpolator {
    pub fn validate(&self) -> Result<()> {
        match self {
            Interpolator::Accelerate { factor } if !(*factor > 0.0) => {
                Err(FlipError::invalid(format!("accelerate factor {factor}")))
            }
            _ => Ok(()),
        }
    }

    /// Map linear progress in [0, 1] onto the curve.
    pub fn interpolate(&self, input: f32) -> f32 {
        match *self {
            Interpolator::Linear => input,
            Interpolator::Accelerate { factor } => {
                if factor == 1.0 {
                    input * input
                } else {
                    input.powf(2.0 * factor)
                }
            }
            Interpolator::ViscousFluid => {
                let normalize = 1.0 / viscous_fluid(1.0);
                let offset = 1.0 - normalize * viscous_fluid(1.0);
                let v = normalize * viscous_fluid(input);
                if v > 0.0 { v + offset } else { v }
            }
        }
    }
}

/// Integer-pixel position animated from a start to a final point.
pub struct Scroller {
    clock: Box<dyn Clock>,
    interpolator: Interpolator,
    start: (i32, i32),
    delta: (i32, i32),
    current: (i32, i32),
    start_ms: u64,
    duration_ms: u32,
    finished: bool,
}

impl Scroller {
    pub fn new(clock: Box<dyn Clock>, interpolator: Interpolator) -> Self {
        Self {
            clock,
            interpolator,
            start: (0, 0),
            delta: (0, 0),
            current: (0, 0),
            start_ms: 0,
            duration_ms: 0,
            finished: true,
        }
    }

    pub fn set_interpolator(&mut self, interpolator: Interpolator) {
        self.interpolator = interpolator;
    }

    pub fn start_scroll(&mut self, sx: i32, sy: i32, dx: i32, dy: i32, duration_ms: u32) {
        self.start = (sx, sy);
        self.delta = (dx, dy);
        self.current = (sx, sy);
        self.start_ms = self.clock.now_ms();
        self.duration_ms = duration_ms;
        self.finished = false;
    }

    pub fn final_x(&self) -> i32 {
        self.start.0 + self.delta.0
    }

    pub fn final_y(&self) -> i32 {
        self.start.1 + self.delta.1
    }

    pub fn curr_x(&self) -> i32 {
        self.current.0
    }

    pub fn curr_y(&self) -> i32 {
        self.current.1
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advance to the clock's current time.  False once the scroll had
    /// already finished before this call.
    pub fn compute_scroll_offset(&mut self) -> bool {
        if self.finished {
            return false;
        }

        let elapsed = self.clock.now_ms().saturating_sub(self.start_ms);
        if elapsed < self.duration_ms as u64 {
            let x = self.interpolator.interpolate(elapsed as f32 / self.duration_ms as f32);
            self.current = (
                self.start.0 + (x * self.delta.0 as f32).round() as i32,
                self.start.1 + (x * self.delta.1 as f32).round() as i32,
            );
        } else {
            self.current = (self.final_x(), self.final_y());
            self.finished = true;
        }
        true
    }

    /// Jump to the end.
    pub fn abort_animation(&mut self) {
        self.current = (self.final_x(), self.final_y());
        self.finished = true;
    }
}

impl std::fmt::Debug for Scroller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scroller")
            .field("interpolator", &self.interpolator)
            .field("current", &self.current)
            .field("finished", &self.finished)
            .finish()
    }
}
