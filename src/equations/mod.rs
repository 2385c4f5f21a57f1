//! Seam to the external equation-runner collaborator.
//!
//! The domain-specific interpreter that evaluates preset-authored formulas
//! lives outside this crate. Here we define the contract it must satisfy
//! plus a default runner that simply passes the preset's base values
//! through, which is what a preset with no equations means.

use crate::params::GlobalParams;
use crate::preset::{BaseValues, Preset};

/// Per-frame evaluated outputs of a preset's formulas.
///
/// Same shape as the base values they start from: frame equations receive
/// the base values and overwrite whichever fields they touch. Recomputed
/// every frame, never mutated after creation.
pub type FrameVariables = BaseValues;

/// Read-only inputs handed to frame and vertex equations each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlobalVariables {
    pub frame: u32,
    pub time: f32,
    pub fps: f32,
    pub bass: f32,
    pub bass_att: f32,
    pub mid: f32,
    pub mid_att: f32,
    pub treb: f32,
    pub treb_att: f32,
    pub meshx: f32,
    pub meshy: f32,
    pub aspectx: f32,
    pub aspecty: f32,
    pub pixelsx: f32,
    pub pixelsy: f32,
}

/// Contract for the equation-execution backends.
///
/// One runner instance is bound to one preset; the orchestrator creates a
/// fresh runner on every `load_preset` and keeps the outgoing preset's
/// runner alive for the duration of the blend.
pub trait EquationRunner {
    /// Evaluate the preset's per-frame equations.
    fn run_frame_equations(&mut self, globals: &GlobalVariables) -> FrameVariables;

    /// Evaluate the per-vertex displacement at grid point `(x, y)` with
    /// polar values `(rad, ang)`. `None` means identity.
    fn evaluate_vertex(
        &mut self,
        x: f32,
        y: f32,
        rad: f32,
        ang: f32,
        globals: &GlobalVariables,
    ) -> Option<[f32; 2]>;

    /// Whether this preset defines any vertex equations. When false the
    /// mesh engine emits the identity grid and skips the warp transform.
    fn has_vertex_equations(&self) -> bool;

    /// Mirror of the orchestrator's resize notification.
    fn update_globals(&mut self, params: &GlobalParams);
}

/// Creates a runner for a freshly installed preset.
pub type RunnerFactory =
    Box<dyn Fn(&Preset, &GlobalVariables, &GlobalParams) -> Box<dyn EquationRunner>>;

/// Fallback runner: returns the preset's base values untouched and no
/// vertex displacement.
pub struct BaseValueRunner {
    base: BaseValues,
}

impl BaseValueRunner {
    pub fn new(preset: &Preset) -> Self {
        Self {
            base: preset.base_values,
        }
    }
}

impl EquationRunner for BaseValueRunner {
    fn run_frame_equations(&mut self, _globals: &GlobalVariables) -> FrameVariables {
        self.base
    }

    fn evaluate_vertex(
        &mut self,
        _x: f32,
        _y: f32,
        _rad: f32,
        _ang: f32,
        _globals: &GlobalVariables,
    ) -> Option<[f32; 2]> {
        None
    }

    fn has_vertex_equations(&self) -> bool {
        false
    }

    fn update_globals(&mut self, _params: &GlobalParams) {}
}

/// The factory used when the host supplies no interpreter.
pub fn base_value_factory() -> RunnerFactory {
    Box::new(|preset, _globals, _params| Box::new(BaseValueRunner::new(preset)))
}
