//! Overlay geometry drawn between the warp and composite passes.
//!
//! Borders, the motion vector grid, the basic waveform, and custom shapes
//! are all flat-colored vertices built on the CPU each frame and drawn
//! with one shared shader at varying topologies. The darken-center overlay
//! is a separate radial fragment pass. Every element is a no-op when its
//! alpha or its geometry collapses to nothing, so a preset that sets
//! `ob_a = 0` pays nothing for borders.

use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, Buffer, Device, Queue, RenderPipeline, TextureFormat, TextureView,
};

use super::layouts::BindGroupLayoutBuilder;
use super::pipelines::{create_pipeline_layout, RenderPipelineBuilder};
use crate::audio::AudioLevels;
use crate::preset::{BaseValues, ShapeDescriptor, WaveDescriptor};

const MAX_SHAPE_SIDES: u32 = 100;
const MIN_SHAPE_SIDES: u32 = 3;
const MAX_WAVE_SAMPLES: usize = 512;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl SpriteVertex {
    fn new(x: f32, y: f32, color: [f32; 4]) -> Self {
        Self {
            position: [x, y],
            color,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DarkenUniforms {
    amount: f32,
    _pad: [f32; 3],
}

const SPRITE_ATTRS: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];

const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawKind {
    Triangles,
    TrianglesAdditive,
    Lines,
    LineStrip,
    LineStripAdditive,
}

struct DrawItem {
    kind: DrawKind,
    range: std::ops::Range<u32>,
}

/// Build the clip-space line loop for the outer or inner border.
fn border_loop(inset: f32) -> [[f32; 2]; 5] {
    let lo = -1.0 + inset;
    let hi = 1.0 - inset;
    [[lo, lo], [hi, lo], [hi, hi], [lo, hi], [lo, lo]]
}

/// Motion vector grid as line-list segments, empty when invisible.
fn motion_vector_segments(frame: &BaseValues) -> Vec<SpriteVertex> {
    if frame.mv_a <= 0.0 {
        return Vec::new();
    }
    let grid_x = frame.mv_x.round().max(2.0) as u32;
    let grid_y = frame.mv_y.round().max(2.0) as u32;
    let color = [frame.mv_r, frame.mv_g, frame.mv_b, frame.mv_a];

    let mut verts = Vec::with_capacity((grid_x * grid_y * 2) as usize);
    for y in 0..grid_y {
        for x in 0..grid_x {
            let gx = (x as f32 / (grid_x - 1) as f32) * 2.0 - 1.0;
            let gy = (y as f32 / (grid_y - 1) as f32) * 2.0 - 1.0;
            verts.push(SpriteVertex::new(gx, gy, color));
            verts.push(SpriteVertex::new(
                gx + frame.mv_dx * frame.mv_l * 0.1,
                gy + frame.mv_dy * frame.mv_l * 0.1,
                color,
            ));
        }
    }
    verts
}

/// Basic waveform line strip over the time-domain samples.
fn waveform_strip(frame: &BaseValues, audio: &AudioLevels) -> Vec<SpriteVertex> {
    if frame.wave_a <= 0.0 || audio.samples.len() < 2 {
        return Vec::new();
    }
    let count = audio.samples.len().min(MAX_WAVE_SAMPLES);
    let color = [frame.wave_r, frame.wave_g, frame.wave_b, frame.wave_a];
    let baseline = frame.wave_y * 2.0 - 1.0;

    audio.samples[..count]
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let x = (i as f32 / (count - 1) as f32) * 2.0 - 1.0;
            let y = baseline + sample * 0.5 * frame.wave_scale;
            SpriteVertex::new(x, y, color)
        })
        .collect()
}

/// Custom waveform line strip anchored at the descriptor's `(x, y)`.
/// Spectrum-flagged waves read the frequency-domain buffer instead of
/// the time-domain samples.
fn custom_wave_strip(wave: &WaveDescriptor, audio: &AudioLevels) -> Vec<SpriteVertex> {
    if !wave.enabled || wave.a <= 0.0 {
        return Vec::new();
    }
    let buffer = if wave.spectrum {
        &audio.spectrum
    } else {
        &audio.samples
    };
    let count = buffer
        .len()
        .min(wave.samples as usize)
        .min(MAX_WAVE_SAMPLES);
    if count < 2 {
        return Vec::new();
    }
    let color = [wave.r, wave.g, wave.b, wave.a];

    buffer[..count]
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let t = i as f32 / (count - 1) as f32;
            let x = (wave.x + t * wave.scaling - 0.5) * 2.0 - 1.0;
            let y = (wave.y + value * wave.scaling) * 2.0 - 1.0;
            SpriteVertex::new(x, y, color)
        })
        .collect()
}

/// Custom shape as a center-rooted triangle fan, flattened to a list.
/// Center carries the primary color, the rim fades to the secondary.
fn shape_triangles(shape: &ShapeDescriptor) -> Vec<SpriteVertex> {
    if !shape.enabled || (shape.a <= 0.0 && shape.a2 <= 0.0) {
        return Vec::new();
    }
    let sides = shape.sides.clamp(MIN_SHAPE_SIDES, MAX_SHAPE_SIDES);
    let cx = shape.x * 2.0 - 1.0;
    let cy = shape.y * 2.0 - 1.0;
    let center_color = [shape.r, shape.g, shape.b, shape.a];
    let rim_color = [shape.r2, shape.g2, shape.b2, shape.a2];

    let rim = |i: u32| {
        let theta = (i % sides) as f32 / sides as f32 * std::f32::consts::TAU + shape.ang;
        SpriteVertex::new(
            cx + theta.cos() * shape.rad,
            cy + theta.sin() * shape.rad,
            rim_color,
        )
    };

    let mut verts = Vec::with_capacity((sides * 3) as usize);
    for i in 0..sides {
        verts.push(SpriteVertex::new(cx, cy, center_color));
        verts.push(rim(i));
        verts.push(rim(i + 1));
    }
    verts
}

/// All decoration pipelines plus a single per-frame vertex buffer.
pub struct DecorationPasses {
    triangles: RenderPipeline,
    triangles_additive: RenderPipeline,
    lines: RenderPipeline,
    line_strip: RenderPipeline,
    line_strip_additive: RenderPipeline,
    darken: RenderPipeline,
    darken_uniforms: Buffer,
    darken_bind_group: BindGroup,
    vertex_buffer: Buffer,
    vertex_capacity: u64,
}

impl DecorationPasses {
    pub fn new(device: &Device, format: TextureFormat) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprite_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/sprite.wgsl").into()),
        });
        let pipeline_layout = create_pipeline_layout(device, "sprite_pipeline", &[]);

        let sprite_buffers = || {
            vec![wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<SpriteVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &SPRITE_ATTRS,
            }]
        };
        let sprite_pipeline = |label, topology, blend| {
            RenderPipelineBuilder::new(label)
                .layout(&pipeline_layout)
                .shader(&module)
                .vertex_buffers(sprite_buffers())
                .topology(topology)
                .format(format)
                .blend(blend)
                .build(device)
        };

        let triangles = sprite_pipeline(
            "sprite_triangles",
            wgpu::PrimitiveTopology::TriangleList,
            wgpu::BlendState::ALPHA_BLENDING,
        );
        let triangles_additive = sprite_pipeline(
            "sprite_triangles_additive",
            wgpu::PrimitiveTopology::TriangleList,
            ADDITIVE_BLEND,
        );
        let lines = sprite_pipeline(
            "sprite_lines",
            wgpu::PrimitiveTopology::LineList,
            wgpu::BlendState::ALPHA_BLENDING,
        );
        let line_strip = sprite_pipeline(
            "sprite_line_strip",
            wgpu::PrimitiveTopology::LineStrip,
            wgpu::BlendState::ALPHA_BLENDING,
        );
        let line_strip_additive = sprite_pipeline(
            "sprite_line_strip_additive",
            wgpu::PrimitiveTopology::LineStrip,
            ADDITIVE_BLEND,
        );

        let darken_layout = BindGroupLayoutBuilder::new("darken_center_layout")
            .uniform(0, wgpu::ShaderStages::FRAGMENT)
            .build(device);
        let darken_pipeline_layout =
            create_pipeline_layout(device, "darken_center_pipeline", &[&darken_layout]);
        let darken_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("darken_center_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/darken_center.wgsl").into()),
        });
        let darken = RenderPipelineBuilder::new("darken_center")
            .layout(&darken_pipeline_layout)
            .shader(&darken_module)
            .format(format)
            .blend(wgpu::BlendState::ALPHA_BLENDING)
            .build(device);

        let darken_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("darken_center_uniforms"),
            size: std::mem::size_of::<DarkenUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let darken_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("darken_center_bind_group"),
            layout: &darken_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: darken_uniforms.as_entire_binding(),
            }],
        });

        let vertex_capacity = 16 * 1024 * std::mem::size_of::<SpriteVertex>() as u64;
        let vertex_buffer = Self::create_vertex_buffer(device, vertex_capacity);

        Self {
            triangles,
            triangles_additive,
            lines,
            line_strip,
            line_strip_additive,
            darken,
            darken_uniforms,
            darken_bind_group,
            vertex_buffer,
            vertex_capacity,
        }
    }

    fn create_vertex_buffer(device: &Device, size: u64) -> Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("decoration_vertices"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Draw all decorations over `target` in pipeline order: borders,
    /// motion vectors, basic waveform, custom waveforms, custom shapes,
    /// darken center.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &TextureView,
        frame: &BaseValues,
        audio: &AudioLevels,
        waves: &[WaveDescriptor],
        shapes: &[ShapeDescriptor],
    ) {
        let mut vertices: Vec<SpriteVertex> = Vec::new();
        let mut items: Vec<DrawItem> = Vec::new();

        let mut push = |verts: Vec<SpriteVertex>, kind: DrawKind, out: &mut Vec<SpriteVertex>| {
            if verts.is_empty() {
                return None;
            }
            let start = out.len() as u32;
            out.extend_from_slice(&verts);
            Some(DrawItem {
                kind,
                range: start..out.len() as u32,
            })
        };

        if frame.ob_a > 0.0 {
            let color = [frame.ob_r, frame.ob_g, frame.ob_b, frame.ob_a];
            let verts = border_loop(0.0)
                .iter()
                .map(|[x, y]| SpriteVertex::new(*x, *y, color))
                .collect();
            items.extend(push(verts, DrawKind::LineStrip, &mut vertices));
        }
        if frame.ib_a > 0.0 {
            let color = [frame.ib_r, frame.ib_g, frame.ib_b, frame.ib_a];
            let verts = border_loop(frame.ob_size.max(0.0))
                .iter()
                .map(|[x, y]| SpriteVertex::new(*x, *y, color))
                .collect();
            items.extend(push(verts, DrawKind::LineStrip, &mut vertices));
        }

        items.extend(push(
            motion_vector_segments(frame),
            DrawKind::Lines,
            &mut vertices,
        ));
        items.extend(push(
            waveform_strip(frame, audio),
            DrawKind::LineStrip,
            &mut vertices,
        ));

        for wave in waves {
            let kind = if wave.additive {
                DrawKind::LineStripAdditive
            } else {
                DrawKind::LineStrip
            };
            items.extend(push(custom_wave_strip(wave, audio), kind, &mut vertices));
        }

        for shape in shapes {
            let kind = if shape.additive {
                DrawKind::TrianglesAdditive
            } else {
                DrawKind::Triangles
            };
            items.extend(push(shape_triangles(shape), kind, &mut vertices));
        }

        let draw_darken = frame.darken_center > 0.0;
        if items.is_empty() && !draw_darken {
            return;
        }

        if !vertices.is_empty() {
            let needed = (vertices.len() * std::mem::size_of::<SpriteVertex>()) as u64;
            if needed > self.vertex_capacity {
                self.vertex_capacity = needed.next_power_of_two();
                self.vertex_buffer = Self::create_vertex_buffer(device, self.vertex_capacity);
            }
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
        }
        if draw_darken {
            queue.write_buffer(
                &self.darken_uniforms,
                0,
                bytemuck::bytes_of(&DarkenUniforms {
                    amount: frame.darken_center,
                    _pad: [0.0; 3],
                }),
            );
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("decoration_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        for item in &items {
            let pipeline = match item.kind {
                DrawKind::Triangles => &self.triangles,
                DrawKind::TrianglesAdditive => &self.triangles_additive,
                DrawKind::Lines => &self.lines,
                DrawKind::LineStrip => &self.line_strip,
                DrawKind::LineStripAdditive => &self.line_strip_additive,
            };
            pass.set_pipeline(pipeline);
            pass.draw(item.range.clone(), 0..1);
        }

        if draw_darken {
            pass.set_pipeline(&self.darken);
            pass.set_bind_group(0, &self.darken_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invisible_motion_vectors_emit_nothing() {
        let frame = BaseValues::default();
        assert_eq!(frame.mv_a, 0.0);
        assert!(motion_vector_segments(&frame).is_empty());
    }

    #[test]
    fn test_motion_vector_grid_count() {
        let frame = BaseValues {
            mv_a: 1.0,
            mv_x: 4.0,
            mv_y: 3.0,
            ..Default::default()
        };
        // Two vertices per grid point, 4x3 grid.
        assert_eq!(motion_vector_segments(&frame).len(), 24);
    }

    #[test]
    fn test_waveform_requires_samples_and_alpha() {
        let frame = BaseValues::default();
        let silent = AudioLevels::silent();
        assert!(waveform_strip(&frame, &silent).is_empty());

        let audio = AudioLevels {
            samples: vec![0.0; 16],
            ..AudioLevels::silent()
        };
        assert_eq!(waveform_strip(&frame, &audio).len(), 16);

        let muted = BaseValues {
            wave_a: 0.0,
            ..Default::default()
        };
        assert!(waveform_strip(&muted, &audio).is_empty());
    }

    #[test]
    fn test_waveform_caps_sample_count() {
        let frame = BaseValues::default();
        let audio = AudioLevels {
            samples: vec![0.0; 2048],
            ..AudioLevels::silent()
        };
        assert_eq!(waveform_strip(&frame, &audio).len(), MAX_WAVE_SAMPLES);
    }

    #[test]
    fn test_custom_wave_follows_audio_buffer() {
        let wave = WaveDescriptor {
            enabled: true,
            samples: 4,
            ..Default::default()
        };
        let audio = AudioLevels {
            samples: vec![0.25; 64],
            ..AudioLevels::silent()
        };
        let verts = custom_wave_strip(&wave, &audio);
        assert_eq!(verts.len(), 4);
        // Default anchor and scaling span the full width.
        assert_eq!(verts[0].position[0], -1.0);
        assert_eq!(verts[3].position[0], 1.0);
        // y = (0.5 + 0.25) * 2 - 1.
        assert!((verts[0].position[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_custom_wave_disabled_or_silent_emits_nothing() {
        let wave = WaveDescriptor::default();
        let audio = AudioLevels {
            samples: vec![0.0; 64],
            ..AudioLevels::silent()
        };
        assert!(custom_wave_strip(&wave, &audio).is_empty());

        let enabled = WaveDescriptor {
            enabled: true,
            a: 0.0,
            ..Default::default()
        };
        assert!(custom_wave_strip(&enabled, &audio).is_empty());
    }

    #[test]
    fn test_custom_wave_spectrum_selects_frequency_buffer() {
        let wave = WaveDescriptor {
            enabled: true,
            spectrum: true,
            ..Default::default()
        };
        // Time-domain data alone leaves a spectrum wave with nothing to draw.
        let audio = AudioLevels {
            samples: vec![0.5; 64],
            ..AudioLevels::silent()
        };
        assert!(custom_wave_strip(&wave, &audio).is_empty());

        let audio = AudioLevels {
            spectrum: vec![0.5; 32],
            ..AudioLevels::silent()
        };
        assert_eq!(custom_wave_strip(&wave, &audio).len(), 32);
    }

    #[test]
    fn test_custom_wave_caps_sample_count() {
        let wave = WaveDescriptor {
            enabled: true,
            samples: 4096,
            ..Default::default()
        };
        let audio = AudioLevels {
            samples: vec![0.0; 2048],
            ..AudioLevels::silent()
        };
        assert_eq!(custom_wave_strip(&wave, &audio).len(), MAX_WAVE_SAMPLES);
    }

    #[test]
    fn test_shape_sides_are_clamped() {
        let shape = ShapeDescriptor {
            enabled: true,
            sides: 1000,
            ..Default::default()
        };
        assert_eq!(
            shape_triangles(&shape).len(),
            (MAX_SHAPE_SIDES * 3) as usize
        );

        let tiny = ShapeDescriptor {
            enabled: true,
            sides: 1,
            ..Default::default()
        };
        assert_eq!(shape_triangles(&tiny).len(), (MIN_SHAPE_SIDES * 3) as usize);
    }

    #[test]
    fn test_disabled_shape_emits_nothing() {
        let shape = ShapeDescriptor::default();
        assert!(!shape.enabled);
        assert!(shape_triangles(&shape).is_empty());
    }

    #[test]
    fn test_shape_fan_closes() {
        let shape = ShapeDescriptor {
            enabled: true,
            sides: 6,
            ..Default::default()
        };
        let verts = shape_triangles(&shape);
        // Last triangle's outer edge returns to the first rim vertex.
        assert_eq!(verts[1].position, verts[verts.len() - 1].position);
    }

    #[test]
    fn test_border_loop_is_closed() {
        let outer = border_loop(0.0);
        assert_eq!(outer[0], outer[4]);
        let inner = border_loop(0.1);
        assert_eq!(inner[0], [-0.9, -0.9]);
    }
}
