//! Preset blend transitions.
//!
//! Loading a preset while another is on screen starts a timed transition.
//! Both presets render during the transition and their frame variables and
//! pass outputs are mixed by a cosine-eased weight. The ease keeps the
//! hand-off velocity zero at both ends; a linear ramp visibly pops at the
//! endpoints.

use crate::equations::FrameVariables;
use crate::preset::BaseValues;

pub const DEFAULT_BLEND_DURATION: f64 = 5.7;

pub struct BlendTransition {
    active: bool,
    start_time: f64,
    duration: f64,
    progress: f64,
}

impl Default for BlendTransition {
    fn default() -> Self {
        Self::new()
    }
}

impl BlendTransition {
    pub fn new() -> Self {
        Self {
            active: false,
            start_time: 0.0,
            duration: DEFAULT_BLEND_DURATION,
            progress: 0.0,
        }
    }

    /// Begin a transition at `time`. A non-positive duration completes
    /// immediately.
    pub fn start(&mut self, time: f64, duration: f64) {
        if duration <= 0.0 {
            self.active = false;
            self.progress = 1.0;
            return;
        }
        self.active = true;
        self.start_time = time;
        self.duration = duration;
        self.progress = 0.0;
    }

    /// Advance to `time`; the transition deactivates once it completes.
    pub fn update(&mut self, time: f64) {
        if !self.active {
            return;
        }
        self.progress = ((time - self.start_time) / self.duration).clamp(0.0, 1.0);
        if self.progress >= 1.0 {
            self.active = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Cosine-eased weight of the incoming preset: 0 at the start of the
    /// transition, 1 at the end, with zero slope at both.
    pub fn mix_weight(&self) -> f32 {
        (0.5 - 0.5 * (self.progress * std::f64::consts::PI).cos()) as f32
    }
}

macro_rules! lerp_fields {
    ($prev:expr, $curr:expr, $t:expr; $($field:ident),* $(,)?) => {
        BaseValues {
            $($field: $prev.$field + ($curr.$field - $prev.$field) * $t,)*
        }
    };
}

/// Blend every frame variable between the outgoing and incoming preset.
pub fn mix_frames(prev: &FrameVariables, curr: &FrameVariables, mix: f32) -> FrameVariables {
    lerp_fields!(prev, curr, mix;
        decay, zoom, zoomexp, rot, warp, cx, cy, dx, dy, sx, sy,
        red_blue, brighten, darken, solarize, invert, gamma_adj,
        b1n, b1x, b2n, b2x, b3n, b3x,
        wave_a, wave_r, wave_g, wave_b, wave_x, wave_y, wave_scale,
        ob_size, ob_r, ob_g, ob_b, ob_a,
        ib_size, ib_r, ib_g, ib_b, ib_a,
        mv_x, mv_y, mv_dx, mv_dy, mv_l, mv_r, mv_g, mv_b, mv_a,
        darken_center,
    )
}
