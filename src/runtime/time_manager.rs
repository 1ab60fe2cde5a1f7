/// Frame clock with a fixed-step accumulator
///
/// The outer loop calls `begin_frame` once per rendered frame, then drains
/// `consume_fixed_step` in a `while` loop. `interpolation_alpha` is the
/// fraction of a fixed step left in the accumulator.

use std::time::Instant;

/// Upper bound on a single frame delta (prevents a spiral of death after stalls)
pub const MAX_FRAME_DELTA: f64 = 0.1;
pub const MIN_FIXED_DELTA: f64 = 1.0 / 240.0;
pub const MAX_FIXED_DELTA: f64 = 1.0 / 10.0;
pub const DEFAULT_FIXED_DELTA: f64 = 1.0 / 60.0;

#[derive(Debug, Clone)]
pub struct TimeManager {
    start_time: Instant,
    last_time: Instant,
    delta_time: f64,
    unscaled_delta_time: f64,
    fixed_delta_time: f64,
    time_scale: f64,
    total_time: f64,
    unscaled_total_time: f64,
    fixed_accumulator: f64,
    frame_count: u64,
}

impl Default for TimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeManager {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_time: now,
            delta_time: 0.0,
            unscaled_delta_time: 0.0,
            fixed_delta_time: DEFAULT_FIXED_DELTA,
            time_scale: 1.0,
            total_time: 0.0,
            unscaled_total_time: 0.0,
            fixed_accumulator: 0.0,
            frame_count: 0,
        }
    }

    /// Sample the wall clock and advance one frame
    pub fn begin_frame(&mut self) {
        let now = Instant::now();
        let raw = now.duration_since(self.last_time).as_secs_f64();
        self.last_time = now;
        self.advance(raw);
    }

    /// Advance one frame with an injected clock delta (headless runs, tests)
    pub fn begin_frame_with(&mut self, raw_delta: f64) {
        self.last_time = Instant::now();
        self.advance(raw_delta);
    }

    fn advance(&mut self, raw_delta: f64) {
        let raw = if raw_delta.is_finite() { raw_delta } else { 0.0 };
        self.unscaled_delta_time = raw.clamp(0.0, MAX_FRAME_DELTA);
        self.delta_time = self.unscaled_delta_time * self.time_scale;
        self.fixed_accumulator += self.delta_time;
        self.total_time += self.delta_time;
        self.unscaled_total_time += self.unscaled_delta_time;
        self.frame_count += 1;
    }

    /// Take one fixed step out of the accumulator if one is available
    pub fn consume_fixed_step(&mut self) -> bool {
        if self.fixed_accumulator >= self.fixed_delta_time {
            self.fixed_accumulator -= self.fixed_delta_time;
            true
        } else {
            false
        }
    }

    pub fn interpolation_alpha(&self) -> f64 {
        if self.fixed_delta_time <= 0.0 {
            return 1.0;
        }
        (self.fixed_accumulator / self.fixed_delta_time).clamp(0.0, 1.0)
    }

    pub fn set_fixed_delta_time(&mut self, dt: f64) {
        if !dt.is_finite() {
            return;
        }
        self.fixed_delta_time = dt.clamp(MIN_FIXED_DELTA, MAX_FIXED_DELTA);
    }

    /// Negative scales clamp to zero (paused)
    pub fn set_time_scale(&mut self, scale: f64) {
        if scale.is_finite() {
            self.time_scale = scale.max(0.0);
        }
    }

    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    pub fn unscaled_delta_time(&self) -> f64 {
        self.unscaled_delta_time
    }

    pub fn fixed_delta_time(&self) -> f64 {
        self.fixed_delta_time
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn unscaled_total_time(&self) -> f64 {
        self.unscaled_total_time
    }

    pub fn fixed_accumulator(&self) -> f64 {
        self.fixed_accumulator
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Wall-clock seconds since construction
    pub fn real_time_since_start(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}
