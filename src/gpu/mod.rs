//! GPU rendering infrastructure.

pub mod blur;
pub mod context;
pub mod decorations;
pub mod feedback;
pub mod layouts;
pub mod noise;
pub mod output;
pub mod pipelines;
pub mod shader;
pub mod textures;

pub use blur::{BlurCascade, BlurConfig};
pub use context::{GpuContext, GpuError};
pub use decorations::DecorationPasses;
pub use feedback::FeedbackBuffers;
pub use noise::{ImageTextures, NoiseTextures};
pub use output::OutputPass;
pub use shader::{FrameUniforms, ShaderProgramManager};
pub use textures::{ReadbackBuffer, RenderTarget};
