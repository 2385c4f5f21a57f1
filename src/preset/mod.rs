//! Preset data model.
//!
//! A preset is an author-supplied bundle: scalar base values, warp and
//! composite shader body text, shape/waveform descriptors, and a flag
//! selecting the equation-execution backend. Presets are immutable once
//! loaded; the render orchestrator owns the current/previous pair.

use serde::{Deserialize, Serialize};

/// Which equation-execution backend evaluates this preset's formulas.
///
/// Both backends satisfy the same [`crate::equations::EquationRunner`]
/// contract; numerical equivalence between them is not assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquationBackend {
    #[default]
    Interpreted,
    Compiled,
}

/// Scalar knobs a preset starts each frame from. Per-frame equations may
/// override any of these; with no equations they pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseValues {
    pub decay: f32,
    pub zoom: f32,
    pub zoomexp: f32,
    pub rot: f32,
    pub warp: f32,
    pub cx: f32,
    pub cy: f32,
    pub dx: f32,
    pub dy: f32,
    pub sx: f32,
    pub sy: f32,

    // Color post-effects
    pub red_blue: f32,
    pub brighten: f32,
    pub darken: f32,
    pub solarize: f32,
    pub invert: f32,
    pub gamma_adj: f32,

    // Blur value ranges per cascade level
    pub b1n: f32,
    pub b1x: f32,
    pub b2n: f32,
    pub b2x: f32,
    pub b3n: f32,
    pub b3x: f32,

    // Basic waveform
    pub wave_a: f32,
    pub wave_r: f32,
    pub wave_g: f32,
    pub wave_b: f32,
    pub wave_x: f32,
    pub wave_y: f32,
    pub wave_scale: f32,

    // Borders
    pub ob_size: f32,
    pub ob_r: f32,
    pub ob_g: f32,
    pub ob_b: f32,
    pub ob_a: f32,
    pub ib_size: f32,
    pub ib_r: f32,
    pub ib_g: f32,
    pub ib_b: f32,
    pub ib_a: f32,

    // Motion vectors
    pub mv_x: f32,
    pub mv_y: f32,
    pub mv_dx: f32,
    pub mv_dy: f32,
    pub mv_l: f32,
    pub mv_r: f32,
    pub mv_g: f32,
    pub mv_b: f32,
    pub mv_a: f32,

    pub darken_center: f32,
}

impl Default for BaseValues {
    fn default() -> Self {
        Self {
            decay: 0.98,
            zoom: 1.0,
            zoomexp: 1.0,
            rot: 0.0,
            warp: 1.0,
            cx: 0.5,
            cy: 0.5,
            dx: 0.0,
            dy: 0.0,
            sx: 1.0,
            sy: 1.0,
            red_blue: 0.0,
            brighten: 0.0,
            darken: 0.0,
            solarize: 0.0,
            invert: 0.0,
            gamma_adj: 1.0,
            b1n: 0.0,
            b1x: 1.0,
            b2n: 0.0,
            b2x: 1.0,
            b3n: 0.0,
            b3x: 1.0,
            wave_a: 0.8,
            wave_r: 1.0,
            wave_g: 1.0,
            wave_b: 1.0,
            wave_x: 0.5,
            wave_y: 0.5,
            wave_scale: 1.0,
            ob_size: 0.01,
            ob_r: 0.0,
            ob_g: 0.0,
            ob_b: 0.0,
            ob_a: 0.0,
            ib_size: 0.01,
            ib_r: 0.25,
            ib_g: 0.25,
            ib_b: 0.25,
            ib_a: 0.0,
            mv_x: 12.0,
            mv_y: 9.0,
            mv_dx: 0.0,
            mv_dy: 0.0,
            mv_l: 0.9,
            mv_r: 1.0,
            mv_g: 1.0,
            mv_b: 1.0,
            mv_a: 0.0,
            darken_center: 0.0,
        }
    }
}

/// A custom shape drawn as an n-gon fan into the target framebuffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeDescriptor {
    pub enabled: bool,
    /// Number of polygon sides (clamped to 3..=100 at draw time).
    pub sides: u32,
    pub x: f32,
    pub y: f32,
    pub rad: f32,
    pub ang: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
    /// Edge color fades toward this at the rim.
    pub r2: f32,
    pub g2: f32,
    pub b2: f32,
    pub a2: f32,
    pub additive: bool,
}

impl Default for ShapeDescriptor {
    fn default() -> Self {
        Self {
            enabled: false,
            sides: 4,
            x: 0.5,
            y: 0.5,
            rad: 0.1,
            ang: 0.0,
            r: 1.0,
            g: 0.0,
            b: 0.0,
            a: 1.0,
            r2: 0.0,
            g2: 1.0,
            b2: 0.0,
            a2: 0.0,
            additive: false,
        }
    }
}

/// A custom waveform drawn as a line strip over the audio buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveDescriptor {
    pub enabled: bool,
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
    /// Horizontal anchor in `[0, 1]` screen space.
    pub x: f32,
    /// Vertical anchor in `[0, 1]` screen space.
    pub y: f32,
    pub scaling: f32,
    /// Requested sample count (clamped to the buffer and the 512 cap).
    pub samples: u32,
    /// Sample the frequency-domain buffer instead of time-domain.
    pub spectrum: bool,
    pub additive: bool,
}

impl Default for WaveDescriptor {
    fn default() -> Self {
        Self {
            enabled: false,
            r: 1.0,
            g: 1.0,
            b: 1.0,
            a: 1.0,
            x: 0.5,
            y: 0.5,
            scaling: 1.0,
            samples: 512,
            spectrum: false,
            additive: false,
        }
    }
}

/// An author-supplied visual effect bundle. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub name: String,
    pub base_values: BaseValues,
    /// Fragment body for the warp pass; empty selects the passthrough program.
    pub warp_shader: String,
    /// Fragment body for the composite pass; empty selects passthrough.
    pub comp_shader: String,
    pub shapes: Vec<ShapeDescriptor>,
    pub waves: Vec<WaveDescriptor>,
    pub backend: EquationBackend,
}

impl Preset {
    /// The preset installed at startup: identity transform, no shader
    /// bodies, no shapes or waves.
    pub fn blank() -> Self {
        Self {
            name: "blank".into(),
            ..Default::default()
        }
    }
}
