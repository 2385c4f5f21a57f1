//! Frame timing and FPS estimation.
//!
//! Preset time advances by a fixed `1/fps` step each frame rather than by
//! wall-clock delta, so a hitched frame slows the animation instead of
//! jumping it. The FPS estimate comes from a trailing window of measured
//! deltas, heavily damped, with a snap to the window average once the
//! window has filled and the damped value has drifted more than 3 fps.

use std::collections::VecDeque;
use std::time::Instant;

const TIME_HIST_MAX: usize = 120;
const FPS_DAMPING: f64 = 0.93;
const FPS_SNAP_THRESHOLD: f64 = 3.0;
const FALLBACK_DELTA: f64 = 1.0 / 30.0;

pub struct FrameClock {
    time: f64,
    fps: f64,
    frame_num: u64,
    last_instant: Option<Instant>,
    time_hist: VecDeque<f64>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        let mut time_hist = VecDeque::with_capacity(TIME_HIST_MAX + 1);
        time_hist.push_back(0.0);
        Self {
            time: 0.0,
            fps: 30.0,
            frame_num: 0,
            last_instant: None,
            time_hist,
        }
    }

    /// Advance one frame. A caller-supplied `elapsed` (seconds) is trusted
    /// as-is; otherwise the delta is measured from the wall clock and
    /// replaced by 1/30 when it is implausible or too early to measure.
    pub fn tick(&mut self, elapsed: Option<f64>) {
        let elapsed = match elapsed {
            Some(value) => value,
            None => {
                let now = Instant::now();
                let measured = self
                    .last_instant
                    .map(|last| now.duration_since(last).as_secs_f64());
                self.last_instant = Some(now);
                match measured {
                    Some(delta) if delta <= 1.0 && self.frame_num >= 2 => delta,
                    _ => FALLBACK_DELTA,
                }
            }
        };

        self.time += 1.0 / self.fps;
        self.frame_num += 1;

        let last = *self.time_hist.back().unwrap_or(&0.0);
        self.time_hist.push_back(last + elapsed);
        if self.time_hist.len() > TIME_HIST_MAX {
            self.time_hist.pop_front();
        }

        let span = self.time_hist.back().unwrap() - self.time_hist.front().unwrap();
        if span <= 0.0 {
            return;
        }
        // N history entries bound N-1 intervals.
        let window_fps = (self.time_hist.len() - 1) as f64 / span;

        let window_full = self.frame_num > TIME_HIST_MAX as u64;
        if window_full && (window_fps - self.fps).abs() > FPS_SNAP_THRESHOLD {
            self.fps = window_fps;
        } else {
            self.fps = FPS_DAMPING * self.fps + (1.0 - FPS_DAMPING) * window_fps;
        }
    }

    /// Preset time in seconds, advanced by `1/fps` per frame.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_num(&self) -> u64 {
        self.frame_num
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_advances_by_fixed_step() {
        let mut clock = FrameClock::new();
        let fps = clock.fps();
        clock.tick(Some(1.0 / 60.0));
        assert!((clock.time() - 1.0 / fps).abs() < 1e-9);
        assert_eq!(clock.frame_num(), 1);
    }

    #[test]
    fn test_time_is_monotonic() {
        let mut clock = FrameClock::new();
        let mut last = 0.0;
        for _ in 0..200 {
            clock.tick(Some(1.0 / 60.0));
            assert!(clock.time() > last);
            last = clock.time();
        }
    }

    #[test]
    fn test_fps_exact_at_steady_rate() {
        let mut clock = FrameClock::new();
        // The initial estimate is already 30; ticking at exactly 1/30
        // must hold it there from the first measurement on.
        for _ in 0..10 {
            clock.tick(Some(1.0 / 30.0));
            assert!((clock.fps() - 30.0).abs() < 1e-9, "fps = {}", clock.fps());
        }
    }

    #[test]
    fn test_fps_converges_to_measured_rate() {
        let mut clock = FrameClock::new();
        for _ in 0..300 {
            clock.tick(Some(1.0 / 60.0));
        }
        assert!((clock.fps() - 60.0).abs() < 5.0, "fps = {}", clock.fps());
    }

    #[test]
    fn test_fps_snaps_after_window_fills() {
        let mut clock = FrameClock::new();
        // Fill the window at 30 fps, then switch to 120 fps.
        for _ in 0..TIME_HIST_MAX + 1 {
            clock.tick(Some(1.0 / 30.0));
        }
        for _ in 0..TIME_HIST_MAX {
            clock.tick(Some(1.0 / 120.0));
        }
        assert!(clock.fps() > 60.0, "fps = {}", clock.fps());
    }

    #[test]
    fn test_wall_clock_fallback_on_first_frames() {
        let mut clock = FrameClock::new();
        clock.tick(None);
        clock.tick(None);
        // Early frames use the 1/30 fallback delta, keeping fps near 30.
        assert!((clock.fps() - 30.0).abs() < 2.0);
    }
}
