//! Feedback framebuffer pair.
//!
//! The warp pass samples last frame's composited output while drawing into
//! this frame's accumulation surface. The two surfaces strictly alternate
//! roles every frame; an index into a fixed two-element array makes it
//! impossible for "previous" and "target" to alias within one frame.

use super::textures::RenderTarget;
use wgpu::{Device, TextureFormat};

pub struct FeedbackBuffers {
    frames: [RenderTarget; 2],
    current: usize,
    format: TextureFormat,
}

impl FeedbackBuffers {
    pub fn new(device: &Device, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            frames: Self::create_pair(device, width, height, format),
            current: 0,
            format,
        }
    }

    fn create_pair(
        device: &Device,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> [RenderTarget; 2] {
        [
            RenderTarget::for_feedback(device, "feedback_frame_a", width, height, format),
            RenderTarget::for_feedback(device, "feedback_frame_b", width, height, format),
        ]
    }

    /// Alternate the roles of the pair. Called once at the top of each
    /// frame, before the warp pass.
    pub fn swap(&mut self) {
        self.current ^= 1;
    }

    /// This frame's accumulation surface.
    pub fn target(&self) -> &RenderTarget {
        &self.frames[self.current]
    }

    /// Last frame's final content, read-only this frame.
    pub fn previous(&self) -> &RenderTarget {
        &self.frames[self.current ^ 1]
    }

    /// Index of the current target, exposed for the alternation invariant.
    pub fn target_index(&self) -> usize {
        self.current
    }

    /// Drop and recreate both surfaces at a new size. Content is lost; the
    /// caller re-renders the last frame afterwards.
    pub fn recreate(&mut self, device: &Device, width: u32, height: u32) {
        self.frames = Self::create_pair(device, width, height, self.format);
    }
}
