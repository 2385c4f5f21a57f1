//! Audio-levels collaborator surface.
//!
//! Capture and spectral analysis happen outside this crate; the host hands
//! us smoothed band levels and a time-domain buffer once per frame, before
//! frame-equation evaluation.

/// Smoothed per-band levels plus their attenuated variants, refreshed once
/// per frame by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioLevels {
    pub bass: f32,
    pub bass_att: f32,
    pub mid: f32,
    pub mid_att: f32,
    pub treb: f32,
    pub treb_att: f32,
    /// Time-domain samples in `[-1, 1]`, consumed by the waveform passes.
    /// May be empty; the passes no-op without data.
    pub samples: Vec<f32>,
    /// Frequency-domain magnitudes, consumed by spectrum-flagged custom
    /// waveforms. May be empty.
    pub spectrum: Vec<f32>,
}

impl AudioLevels {
    /// Neutral levels (all bands at 1.0), matching the engine's startup
    /// state before the host delivers real audio.
    pub fn silent() -> Self {
        Self {
            bass: 1.0,
            bass_att: 1.0,
            mid: 1.0,
            mid_att: 1.0,
            treb: 1.0,
            treb_att: 1.0,
            samples: Vec::new(),
            spectrum: Vec::new(),
        }
    }
}
