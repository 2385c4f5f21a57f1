//! Three-level separable blur cascade.
//!
//! Each level runs a horizontal then a vertical 5-tap Gaussian pass at a
//! reduced resolution. The cascade is chained: level 0 blurs the main
//! frame, level 1 blurs level 0's output, level 2 blurs level 1's. Preset
//! shaders pick a level by sampling `sampler_blur1` through
//! `sampler_blur3`; only the levels actually referenced are rendered.

use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroupLayout, Buffer, Device, Queue, RenderPipeline, TextureFormat, TextureView,
};

use super::layouts::create_blur_layout;
use super::pipelines::{create_pipeline_layout, RenderPipelineBuilder};
use super::textures::RenderTarget;
use crate::preset::BaseValues;

pub const BLUR_LEVELS: usize = 3;

/// 5-tap Gaussian kernel shared by both blur directions.
pub const BLUR_WEIGHTS: [f32; 5] = [0.0545, 0.2442, 0.4026, 0.2442, 0.0545];

/// Per-level [width, height] scale relative to the main texture size.
#[derive(Debug, Clone, Copy)]
pub struct BlurConfig {
    pub ratios: [[f32; 2]; BLUR_LEVELS],
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            ratios: [[0.5, 0.25], [0.125, 0.125], [0.0625, 0.0625]],
        }
    }
}

/// Highest blur level a shader body references, 0 when it references none.
pub fn highest_blur_level(text: &str) -> usize {
    for (level, names) in [
        (3, ["sampler_blur3", "blur3_tex"]),
        (2, ["sampler_blur2", "blur2_tex"]),
        (1, ["sampler_blur1", "blur1_tex"]),
    ] {
        if names.iter().any(|name| text.contains(name)) {
            return level;
        }
    }
    0
}

/// Number of blur levels a preset needs: the highest level referenced by
/// either shader body. An empty warp body contributes nothing, but the
/// composite body is still consulted.
pub fn num_blur_passes(warp: &str, comp: &str) -> usize {
    let warp = warp.trim();
    let comp = comp.trim();
    let mut passes = if warp.is_empty() {
        0
    } else {
        highest_blur_level(warp)
    };
    if !comp.is_empty() {
        passes = passes.max(highest_blur_level(comp));
    }
    passes
}

/// Remap applied on each level's final pass so the preset's blur min/max
/// range fills 0..1. Defaults are the identity.
fn range_remap(min: f32, max: f32) -> (f32, f32) {
    let span = max - min;
    if span.abs() < f32::EPSILON {
        return (1.0, 0.0);
    }
    let scale = 1.0 / span;
    (scale, -min * scale)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlurUniforms {
    texel: [f32; 2],
    direction: [f32; 2],
    scale: f32,
    bias: f32,
    _pad: [f32; 2],
}

struct BlurLevel {
    temp: RenderTarget,
    output: RenderTarget,
    horizontal_uniforms: Buffer,
    vertical_uniforms: Buffer,
    width: u32,
    height: u32,
}

impl BlurLevel {
    fn new(device: &Device, level: usize, width: u32, height: u32, format: TextureFormat) -> Self {
        let make_uniforms = |suffix: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("blur{level}_{suffix}_uniforms")),
                size: std::mem::size_of::<BlurUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            temp: RenderTarget::for_feedback(
                device,
                &format!("blur{level}_temp"),
                width,
                height,
                format,
            ),
            output: RenderTarget::for_feedback(
                device,
                &format!("blur{level}_output"),
                width,
                height,
                format,
            ),
            horizontal_uniforms: make_uniforms("h"),
            vertical_uniforms: make_uniforms("v"),
            width,
            height,
        }
    }
}

pub struct BlurCascade {
    config: BlurConfig,
    levels: Vec<BlurLevel>,
    layout: BindGroupLayout,
    pipeline: RenderPipeline,
    sampler: wgpu::Sampler,
    format: TextureFormat,
}

impl BlurCascade {
    pub fn new(
        device: &Device,
        texsize_x: u32,
        texsize_y: u32,
        format: TextureFormat,
        config: BlurConfig,
    ) -> Self {
        let layout = create_blur_layout(device);
        let pipeline_layout = create_pipeline_layout(device, "blur_pipeline", &[&layout]);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blur_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blur.wgsl").into()),
        });
        let pipeline = RenderPipelineBuilder::new("blur_pipeline")
            .layout(&pipeline_layout)
            .shader(&module)
            .format(format)
            .build(device);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blur_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let levels = Self::create_levels(device, texsize_x, texsize_y, format, &config);

        Self {
            config,
            levels,
            layout,
            pipeline,
            sampler,
            format,
        }
    }

    fn create_levels(
        device: &Device,
        texsize_x: u32,
        texsize_y: u32,
        format: TextureFormat,
        config: &BlurConfig,
    ) -> Vec<BlurLevel> {
        config
            .ratios
            .iter()
            .enumerate()
            .map(|(level, [rx, ry])| {
                let width = ((texsize_x as f32 * rx) as u32).max(1);
                let height = ((texsize_y as f32 * ry) as u32).max(1);
                BlurLevel::new(device, level + 1, width, height, format)
            })
            .collect()
    }

    /// Recreate all level targets for a new main texture size.
    pub fn resize(&mut self, device: &Device, texsize_x: u32, texsize_y: u32) {
        self.levels = Self::create_levels(device, texsize_x, texsize_y, self.format, &self.config);
    }

    /// Blurred output of a level (1-based, matching `sampler_blurN`).
    pub fn output_view(&self, level: usize) -> &TextureView {
        self.levels[level - 1].output.view()
    }

    pub fn level_size(&self, level: usize) -> (u32, u32) {
        let entry = &self.levels[level - 1];
        (entry.width, entry.height)
    }

    /// Run the first `passes` levels of the cascade over `source`.
    ///
    /// Level N reads level N-1's output, so a preset that samples only
    /// `sampler_blur3` still pays for all three levels.
    pub fn render(
        &self,
        device: &Device,
        queue: &Queue,
        encoder: &mut wgpu::CommandEncoder,
        source: &TextureView,
        passes: usize,
        frame: &BaseValues,
    ) {
        let ranges = [
            (frame.b1n, frame.b1x),
            (frame.b2n, frame.b2x),
            (frame.b3n, frame.b3x),
        ];

        for (index, level) in self.levels.iter().take(passes.min(BLUR_LEVELS)).enumerate() {
            let texel = [1.0 / level.width as f32, 1.0 / level.height as f32];
            let (scale, bias) = range_remap(ranges[index].0, ranges[index].1);

            queue.write_buffer(
                &level.horizontal_uniforms,
                0,
                bytemuck::bytes_of(&BlurUniforms {
                    texel,
                    direction: [1.0, 0.0],
                    scale: 1.0,
                    bias: 0.0,
                    _pad: [0.0; 2],
                }),
            );
            queue.write_buffer(
                &level.vertical_uniforms,
                0,
                bytemuck::bytes_of(&BlurUniforms {
                    texel,
                    direction: [0.0, 1.0],
                    scale,
                    bias,
                    _pad: [0.0; 2],
                }),
            );

            let input = if index == 0 {
                source
            } else {
                self.levels[index - 1].output.view()
            };

            self.run_pass(device, encoder, &level.horizontal_uniforms, input, level.temp.view());
            self.run_pass(
                device,
                encoder,
                &level.vertical_uniforms,
                level.temp.view(),
                level.output.view(),
            );
        }
    }

    fn run_pass(
        &self,
        device: &Device,
        encoder: &mut wgpu::CommandEncoder,
        uniforms: &Buffer,
        input: &TextureView,
        output: &TextureView,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blur_pass"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("blur_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
