//! Vuzic Visualizer Core
//!
//! Audio-reactive feedback rendering engine in the Milkdrop lineage.
//!
//! # Features
//!
//! - Ping-pong feedback framebuffers with an analytic mesh warp
//! - Per-preset WGSL warp/composite shaders, validated and hot-swapped at
//!   load time with a passthrough fallback
//! - Three-level separable blur cascade for `sampler_blur1..3`
//! - Cosine-eased blend transitions between presets
//! - Headless GPU rendering via wgpu (Metal on macOS, Vulkan on Linux)

pub mod audio;
pub mod equations;
pub mod gpu;
pub mod mesh;
pub mod params;
pub mod preset;
pub mod render;

// Re-export commonly used types
pub use audio::AudioLevels;
pub use equations::{
    base_value_factory, BaseValueRunner, EquationRunner, FrameVariables, GlobalVariables,
    RunnerFactory,
};
pub use gpu::{BlurConfig, GpuContext, GpuError};
pub use mesh::WarpMesh;
pub use params::GlobalParams;
pub use preset::{BaseValues, EquationBackend, Preset, ShapeDescriptor, WaveDescriptor};
pub use render::{
    FrameOutput, RenderError, RenderOptions, RenderOrchestrator, RendererConfig, ResizeOptions,
};
