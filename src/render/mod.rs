//! Frame orchestration.
//!
//! Owns the full per-frame sequence: clock and blend bookkeeping, equation
//! evaluation, mesh warp, the warp draw into the feedback pair, the blur
//! cascade, decorations, the composite draw, and the final resolve. During
//! a preset transition both the outgoing and incoming presets draw their
//! warp and composite passes, mixed by the cosine blend weight.

pub mod blend;
pub mod clock;

use std::collections::HashMap;

use wgpu::TextureFormat;

use crate::audio::AudioLevels;
use crate::equations::{base_value_factory, EquationRunner, FrameVariables, GlobalVariables, RunnerFactory};
use crate::gpu::blur::num_blur_passes;
use crate::gpu::shader::ShaderInputs;
use crate::gpu::{
    BlurCascade, BlurConfig, DecorationPasses, FeedbackBuffers, FrameUniforms, GpuContext,
    GpuError, ImageTextures, NoiseTextures, OutputPass, ReadbackBuffer, RenderTarget,
    ShaderProgramManager,
};
use crate::mesh::WarpMesh;
use crate::params::GlobalParams;
use crate::preset::{Preset, ShapeDescriptor, WaveDescriptor};

pub use blend::{mix_frames, BlendTransition, DEFAULT_BLEND_DURATION};
pub use clock::FrameClock;

const RENDER_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
const TITLE_ANIM_DURATION: f64 = 1.7;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Startup configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub mesh_width: u32,
    pub mesh_height: u32,
    pub pixel_ratio: f32,
    pub texture_ratio: f32,
    pub fxaa: bool,
    pub blur: BlurConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 900,
            mesh_width: 48,
            mesh_height: 36,
            pixel_ratio: 1.0,
            texture_ratio: 1.0,
            fxaa: false,
            blur: BlurConfig::default(),
        }
    }
}

/// Per-call inputs to [`RenderOrchestrator::render`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Seconds since the previous frame; measured from the wall clock
    /// when absent.
    pub elapsed: Option<f64>,
    pub audio: AudioLevels,
    /// Skip the final resolve when the host only wants the composite.
    pub render_to_screen: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            elapsed: None,
            audio: AudioLevels::silent(),
            render_to_screen: true,
        }
    }
}

/// Evaluated variables for one rendered frame, also kept for re-rendering
/// after a resize.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub globals: GlobalVariables,
    pub frame: FrameVariables,
    pub mixed: FrameVariables,
}

/// Optional overrides accepted by [`RenderOrchestrator::set_renderer_size`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResizeOptions {
    pub mesh_width: Option<u32>,
    pub mesh_height: Option<u32>,
    pub pixel_ratio: Option<f32>,
    pub texture_ratio: Option<f32>,
}

struct TitleAnimation {
    start_time: f64,
    duration: f64,
    text: String,
}

impl TitleAnimation {
    fn new() -> Self {
        Self {
            start_time: -1.0,
            duration: TITLE_ANIM_DURATION,
            text: String::new(),
        }
    }
}

/// Clip-space positions of the undeformed warp grid, top row first so the
/// vertex order matches the UV buffer.
fn grid_positions(mesh_width: u32, mesh_height: u32) -> Vec<f32> {
    let mut positions =
        Vec::with_capacity((mesh_width as usize + 1) * (mesh_height as usize + 1) * 2);
    for j in 0..=mesh_height {
        for i in 0..=mesh_width {
            positions.push(i as f32 / mesh_width as f32 * 2.0 - 1.0);
            positions.push(1.0 - j as f32 / mesh_height as f32 * 2.0);
        }
    }
    positions
}

/// Two triangles per grid cell.
fn grid_indices(mesh_width: u32, mesh_height: u32) -> Vec<u32> {
    let stride = mesh_width + 1;
    let mut indices = Vec::with_capacity((mesh_width * mesh_height * 6) as usize);
    for j in 0..mesh_height {
        for i in 0..mesh_width {
            let tl = j * stride + i;
            let tr = tl + 1;
            let bl = tl + stride;
            let br = bl + 1;
            indices.extend_from_slice(&[tl, tr, bl, bl, tr, br]);
        }
    }
    indices
}

const QUAD_POSITIONS: [f32; 12] = [
    -1.0, -1.0, 1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0, 1.0,
];
const QUAD_UVS: [f32; 12] = [
    0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0,
];

/// Replace the alpha of every vertex color with the blend weight.
fn colors_with_alpha(colors: &[f32], alpha: f32) -> Vec<f32> {
    let mut out = colors.to_vec();
    for chunk in out.chunks_mut(4) {
        chunk[3] = alpha;
    }
    out
}

struct MeshBuffers {
    positions: wgpu::Buffer,
    uvs: wgpu::Buffer,
    colors: wgpu::Buffer,
    colors_blend: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue, mesh_width: u32, mesh_height: u32) -> Self {
        let positions_data = grid_positions(mesh_width, mesh_height);
        let indices_data = grid_indices(mesh_width, mesh_height);
        let vertex_count = positions_data.len() / 2;

        let make = |label: &str, size: u64, usage| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        };
        let vertex_usage = wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST;

        let positions = make("warp_positions", (vertex_count * 8) as u64, vertex_usage);
        let uvs = make("warp_uvs", (vertex_count * 8) as u64, vertex_usage);
        let colors = make("warp_colors", (vertex_count * 16) as u64, vertex_usage);
        let colors_blend = make("warp_colors_blend", (vertex_count * 16) as u64, vertex_usage);
        let indices = make(
            "warp_indices",
            (indices_data.len() * 4) as u64,
            wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        );

        queue.write_buffer(&positions, 0, bytemuck::cast_slice(&positions_data));
        queue.write_buffer(&indices, 0, bytemuck::cast_slice(&indices_data));

        Self {
            positions,
            uvs,
            colors,
            colors_blend,
            indices,
            index_count: indices_data.len() as u32,
        }
    }
}

struct QuadBuffers {
    positions: wgpu::Buffer,
    uvs: wgpu::Buffer,
    colors: wgpu::Buffer,
    colors_blend: wgpu::Buffer,
}

impl QuadBuffers {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let vertex_usage = wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST;
        let make = |label: &str, size: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: vertex_usage,
                mapped_at_creation: false,
            })
        };

        let positions = make("quad_positions", 48);
        let uvs = make("quad_uvs", 48);
        let colors = make("quad_colors", 96);
        let colors_blend = make("quad_colors_blend", 96);

        queue.write_buffer(&positions, 0, bytemuck::cast_slice(&QUAD_POSITIONS));
        queue.write_buffer(&uvs, 0, bytemuck::cast_slice(&QUAD_UVS));
        queue.write_buffer(&colors, 0, bytemuck::cast_slice(&[1.0f32; 24]));

        Self {
            positions,
            uvs,
            colors,
            colors_blend,
        }
    }
}

/// The engine's public entry point: owns the GPU context, the current and
/// previous presets, and every render pass.
pub struct RenderOrchestrator {
    ctx: GpuContext,
    params: GlobalParams,
    fxaa: bool,

    preset: Preset,
    prev_preset: Preset,
    runner: Box<dyn EquationRunner>,
    prev_runner: Box<dyn EquationRunner>,
    runner_factory: RunnerFactory,

    warp_shader: ShaderProgramManager,
    prev_warp_shader: ShaderProgramManager,
    comp_shader: ShaderProgramManager,
    prev_comp_shader: ShaderProgramManager,
    num_blur_passes: usize,

    feedback: FeedbackBuffers,
    composite_target: RenderTarget,
    output_target: RenderTarget,
    blur: BlurCascade,
    decorations: DecorationPasses,
    output_pass: OutputPass,
    noise: NoiseTextures,
    images: ImageTextures,

    mesh: WarpMesh,
    mesh_buffers: MeshBuffers,
    quad_buffers: QuadBuffers,

    clock: FrameClock,
    blend: BlendTransition,
    title: TitleAnimation,
    last_globals: GlobalVariables,
    last_output: Option<FrameOutput>,
}

impl RenderOrchestrator {
    pub async fn new(config: RendererConfig) -> Result<Self, RenderError> {
        let ctx = GpuContext::new().await?;
        Self::with_context(ctx, config)
    }

    /// Blocking constructor for hosts without an async runtime.
    pub fn new_blocking(config: RendererConfig) -> Result<Self, RenderError> {
        pollster::block_on(Self::new(config))
    }

    /// Build the orchestrator on an existing GPU context.
    pub fn with_context(ctx: GpuContext, config: RendererConfig) -> Result<Self, RenderError> {
        let params = GlobalParams::new(
            config.width,
            config.height,
            config.pixel_ratio,
            config.texture_ratio,
            config.mesh_width,
            config.mesh_height,
        );
        log::info!(
            "Renderer {}x{} (texture {}x{}, mesh {}x{})",
            params.width,
            params.height,
            params.texsize_x,
            params.texsize_y,
            params.mesh_width,
            params.mesh_height
        );

        let device = ctx.device.clone();
        let queue = ctx.queue.clone();

        let feedback =
            FeedbackBuffers::new(&device, params.texsize_x, params.texsize_y, RENDER_FORMAT);
        let composite_target = RenderTarget::for_feedback(
            &device,
            "composite",
            params.texsize_x,
            params.texsize_y,
            RENDER_FORMAT,
        );
        let output_target = RenderTarget::for_output(
            &device,
            "output",
            params.texsize_x,
            params.texsize_y,
            RENDER_FORMAT,
        );

        let blur = BlurCascade::new(
            &device,
            params.texsize_x,
            params.texsize_y,
            RENDER_FORMAT,
            config.blur,
        );
        let decorations = DecorationPasses::new(&device, RENDER_FORMAT);
        let output_pass = OutputPass::new(&device, RENDER_FORMAT);
        let noise = NoiseTextures::new(&device, &queue);

        let preset = Preset::blank();
        let runner_factory = base_value_factory();
        let globals = GlobalVariables::default();
        let runner = runner_factory(&preset, &globals, &params);
        let prev_runner = runner_factory(&preset, &globals, &params);

        let mesh = WarpMesh::new(params.mesh_width, params.mesh_height);
        let mesh_buffers = MeshBuffers::new(&device, &queue, params.mesh_width, params.mesh_height);
        let quad_buffers = QuadBuffers::new(&device, &queue);

        Ok(Self {
            params,
            fxaa: config.fxaa,
            preset: preset.clone(),
            prev_preset: preset,
            runner,
            prev_runner,
            runner_factory,
            warp_shader: ShaderProgramManager::new(&device, "warp_shader", RENDER_FORMAT),
            prev_warp_shader: ShaderProgramManager::new(&device, "prev_warp_shader", RENDER_FORMAT),
            comp_shader: ShaderProgramManager::new(&device, "comp_shader", RENDER_FORMAT),
            prev_comp_shader: ShaderProgramManager::new(&device, "prev_comp_shader", RENDER_FORMAT),
            num_blur_passes: 0,
            feedback,
            composite_target,
            output_target,
            blur,
            decorations,
            output_pass,
            noise,
            images: ImageTextures::new(),
            mesh,
            mesh_buffers,
            quad_buffers,
            clock: FrameClock::new(),
            blend: BlendTransition::new(),
            title: TitleAnimation::new(),
            last_globals: globals,
            last_output: None,
            ctx,
        })
    }

    /// Replace the equation backend for both installed presets.
    pub fn set_runner_factory(&mut self, factory: RunnerFactory) {
        self.runner = factory(&self.preset, &self.last_globals, &self.params);
        self.prev_runner = factory(&self.prev_preset, &self.last_globals, &self.params);
        self.runner_factory = factory;
    }

    /// Install a preset, starting a blend from whatever is on screen.
    ///
    /// The outgoing preset keeps rendering until the blend completes, so
    /// its runner and compiled shaders move to the `prev` slots rather
    /// than being dropped.
    pub fn load_preset(&mut self, preset: Preset, blend_time: f64) {
        let device = self.ctx.device.clone();

        std::mem::swap(&mut self.warp_shader, &mut self.prev_warp_shader);
        std::mem::swap(&mut self.comp_shader, &mut self.prev_comp_shader);
        std::mem::swap(&mut self.runner, &mut self.prev_runner);
        self.prev_preset = std::mem::replace(&mut self.preset, preset);

        self.runner = (self.runner_factory)(&self.preset, &self.last_globals, &self.params);
        self.warp_shader
            .update_shader(&device, &self.preset.warp_shader);
        self.comp_shader
            .update_shader(&device, &self.preset.comp_shader);
        self.num_blur_passes =
            num_blur_passes(&self.preset.warp_shader, &self.preset.comp_shader);

        self.blend.start(self.clock.time(), blend_time);
        log::info!(
            "Loaded preset '{}' (blend {:.1}s, blur passes {})",
            self.preset.name,
            blend_time,
            self.num_blur_passes
        );
    }

    /// Decode and install user-supplied textures for preset shaders.
    pub fn load_extra_images(&mut self, images: &HashMap<String, Vec<u8>>) {
        self.images
            .load_extra_images(&self.ctx.device, &self.ctx.queue, images);
    }

    /// Start the song-title overlay animation.
    pub fn launch_title_anim(&mut self, text: &str) {
        self.title.start_time = self.clock.time();
        self.title.text = text.to_string();
        log::debug!("Title animation started: {text}");
    }

    /// Progress of the running title animation, `None` when idle.
    pub fn title_progress(&self) -> Option<f64> {
        if self.title.start_time < 0.0 {
            return None;
        }
        Some((self.clock.time() - self.title.start_time) / self.title.duration)
    }

    /// Text of the running title animation; the host rasterizes it.
    pub fn title_text(&self) -> Option<&str> {
        self.title_progress().map(|_| self.title.text.as_str())
    }

    pub fn params(&self) -> &GlobalParams {
        &self.params
    }

    pub fn fps(&self) -> f64 {
        self.clock.fps()
    }

    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn is_blending(&self) -> bool {
        self.blend.is_active()
    }

    pub fn set_output_aa(&mut self, fxaa: bool) {
        self.fxaa = fxaa;
    }

    fn global_variables(&self, audio: &AudioLevels) -> GlobalVariables {
        let (inv_ax, inv_ay) = self.params.inv_aspect();
        GlobalVariables {
            frame: self.clock.frame_num() as u32,
            time: self.clock.time() as f32,
            fps: self.clock.fps() as f32,
            bass: audio.bass,
            bass_att: audio.bass_att,
            mid: audio.mid,
            mid_att: audio.mid_att,
            treb: audio.treb,
            treb_att: audio.treb_att,
            meshx: self.params.mesh_width as f32,
            meshy: self.params.mesh_height as f32,
            aspectx: inv_ax,
            aspecty: inv_ay,
            pixelsx: self.params.texsize_x as f32,
            pixelsy: self.params.texsize_y as f32,
        }
    }

    fn frame_uniforms(&self, frame: &FrameVariables) -> FrameUniforms {
        let tx = self.params.texsize_x as f32;
        let ty = self.params.texsize_y as f32;
        let ax = self.params.aspect_x;
        let ay = self.params.aspect_y;
        FrameUniforms {
            resolution: [tx, ty, 1.0 / tx, 1.0 / ty],
            aspect: [ax, ay, 1.0 / ax, 1.0 / ay],
            time: self.clock.time() as f32,
            frame_num: self.clock.frame_num() as f32,
            decay: frame.decay,
            _pad: 0.0,
        }
    }

    fn shader_inputs<'a>(&'a self, main: &'a wgpu::TextureView) -> ShaderInputs<'a> {
        ShaderInputs {
            main,
            blur1: self.blur.output_view(1),
            blur2: self.blur.output_view(2),
            blur3: self.blur.output_view(3),
            noise_lq: self.noise.lq_view(),
            noise_mq: self.noise.mq_view(),
            noise_hq: self.noise.hq_view(),
            images: &self.images,
        }
    }

    /// Render one frame. Returns the evaluated variables so the host can
    /// inspect what drove the frame.
    pub fn render(&mut self, opts: &RenderOptions) -> FrameOutput {
        let device = self.ctx.device.clone();
        let queue = self.ctx.queue.clone();

        self.clock.tick(opts.elapsed);
        self.blend.update(self.clock.time());

        if let Some(progress) = self.title_progress() {
            if progress >= 1.0 {
                self.title.start_time = -1.0;
            }
        }

        let globals = self.global_variables(&opts.audio);
        self.last_globals = globals;

        let frame = self.runner.run_frame_equations(&globals);
        self.mesh.compute(self.runner.as_mut(), &frame, &globals);

        let blending = self.blend.is_active();
        let mix = self.blend.mix_weight();
        let (prev_frame, mixed) = if blending {
            let prev_frame = self.prev_runner.run_frame_equations(&globals);
            // The outgoing preset's vertex equations win while blending;
            // the warp geometry cuts over when the blend completes.
            self.mesh
                .compute(self.prev_runner.as_mut(), &prev_frame, &globals);
            (prev_frame, mix_frames(&prev_frame, &frame, mix))
        } else {
            (frame, frame)
        };

        self.feedback.swap();

        queue.write_buffer(
            &self.mesh_buffers.uvs,
            0,
            bytemuck::cast_slice(self.mesh.uv()),
        );
        queue.write_buffer(
            &self.mesh_buffers.colors,
            0,
            bytemuck::cast_slice(self.mesh.color()),
        );
        if blending {
            let blend_colors = colors_with_alpha(self.mesh.color(), mix);
            queue.write_buffer(
                &self.mesh_buffers.colors_blend,
                0,
                bytemuck::cast_slice(&blend_colors),
            );
            let quad_blend = colors_with_alpha(&[1.0f32; 24], mix);
            queue.write_buffer(
                &self.quad_buffers.colors_blend,
                0,
                bytemuck::cast_slice(&quad_blend),
            );
        }

        let warp_uniforms = self.frame_uniforms(if blending { &mixed } else { &frame });
        self.warp_shader.write_uniforms(&queue, &warp_uniforms);
        self.comp_shader
            .write_uniforms(&queue, &self.frame_uniforms(if blending { &mixed } else { &frame }));
        if blending {
            let prev_uniforms = self.frame_uniforms(&prev_frame);
            self.prev_warp_shader.write_uniforms(&queue, &prev_uniforms);
            self.prev_comp_shader.write_uniforms(&queue, &prev_uniforms);
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });

        // Warp pass: previous frame through the mesh into the new target.
        {
            let inputs = self.shader_inputs(self.feedback.previous().view());
            let warp_bind = self.warp_shader.make_bind_group(&device, &inputs);
            let prev_bind = blending
                .then(|| self.prev_warp_shader.make_bind_group(&device, &inputs));

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("warp_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.feedback.target().view(),
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

            pass.set_vertex_buffer(0, self.mesh_buffers.positions.slice(..));
            pass.set_vertex_buffer(1, self.mesh_buffers.uvs.slice(..));
            pass.set_index_buffer(self.mesh_buffers.indices.slice(..), wgpu::IndexFormat::Uint32);

            if let Some(prev_bind) = &prev_bind {
                pass.set_pipeline(self.prev_warp_shader.pipeline());
                pass.set_bind_group(0, prev_bind, &[]);
                pass.set_vertex_buffer(2, self.mesh_buffers.colors.slice(..));
                pass.draw_indexed(0..self.mesh_buffers.index_count, 0, 0..1);

                pass.set_pipeline(self.warp_shader.pipeline());
                pass.set_bind_group(0, &warp_bind, &[]);
                pass.set_vertex_buffer(2, self.mesh_buffers.colors_blend.slice(..));
                pass.draw_indexed(0..self.mesh_buffers.index_count, 0, 0..1);
            } else {
                pass.set_pipeline(self.warp_shader.pipeline());
                pass.set_bind_group(0, &warp_bind, &[]);
                pass.set_vertex_buffer(2, self.mesh_buffers.colors.slice(..));
                pass.draw_indexed(0..self.mesh_buffers.index_count, 0, 0..1);
            }
        }

        // Blur cascade over the freshly warped frame. The mixed variables
        // drive the per-level value ranges so they track the blend.
        self.blur.render(
            &device,
            &queue,
            &mut encoder,
            self.feedback.target().view(),
            self.num_blur_passes,
            &mixed,
        );

        // Decorations draw over the accumulation surface so they feed
        // back through next frame's warp. Both presets' waves and shapes
        // draw while blending.
        let (waves, shapes): (Vec<WaveDescriptor>, Vec<ShapeDescriptor>) = if blending {
            (
                self.prev_preset
                    .waves
                    .iter()
                    .chain(self.preset.waves.iter())
                    .cloned()
                    .collect(),
                self.prev_preset
                    .shapes
                    .iter()
                    .chain(self.preset.shapes.iter())
                    .cloned()
                    .collect(),
            )
        } else {
            (self.preset.waves.clone(), self.preset.shapes.clone())
        };
        self.decorations.render(
            &device,
            &queue,
            &mut encoder,
            self.feedback.target().view(),
            &mixed,
            &opts.audio,
            &waves,
            &shapes,
        );

        self.record_composite(&device, &mut encoder, blending);

        if opts.render_to_screen {
            self.output_pass.render(
                &device,
                &queue,
                &mut encoder,
                self.composite_target.view(),
                self.output_target.view(),
                self.params.texsize_x,
                self.params.texsize_y,
                self.fxaa,
            );
        }

        queue.submit(Some(encoder.finish()));

        let output = FrameOutput {
            globals,
            frame,
            mixed,
        };
        self.last_output = Some(output.clone());
        output
    }

    fn record_composite(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        blending: bool,
    ) {
        let inputs = self.shader_inputs(self.feedback.target().view());
        let comp_bind = self.comp_shader.make_bind_group(device, &inputs);
        let prev_bind = blending
            .then(|| self.prev_comp_shader.make_bind_group(device, &inputs));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("composite_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.composite_target.view(),
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

        pass.set_vertex_buffer(0, self.quad_buffers.positions.slice(..));
        pass.set_vertex_buffer(1, self.quad_buffers.uvs.slice(..));

        if let Some(prev_bind) = &prev_bind {
            pass.set_pipeline(self.prev_comp_shader.pipeline());
            pass.set_bind_group(0, prev_bind, &[]);
            pass.set_vertex_buffer(2, self.quad_buffers.colors.slice(..));
            pass.draw(0..6, 0..1);

            pass.set_pipeline(self.comp_shader.pipeline());
            pass.set_bind_group(0, &comp_bind, &[]);
            pass.set_vertex_buffer(2, self.quad_buffers.colors_blend.slice(..));
            pass.draw(0..6, 0..1);
        } else {
            pass.set_pipeline(self.comp_shader.pipeline());
            pass.set_bind_group(0, &comp_bind, &[]);
            pass.set_vertex_buffer(2, self.quad_buffers.colors.slice(..));
            pass.draw(0..6, 0..1);
        }
    }

    /// Resize the renderer. Texture-backed state is only recreated when
    /// the derived texture size actually changed; the last frame is then
    /// re-resolved so the host is not left with a stale output.
    pub fn set_renderer_size(&mut self, width: u32, height: u32, opts: &ResizeOptions) {
        let device = self.ctx.device.clone();
        let queue = self.ctx.queue.clone();
        let old = self.params;

        self.params = GlobalParams::new(
            width,
            height,
            opts.pixel_ratio.unwrap_or(old.pixel_ratio),
            opts.texture_ratio.unwrap_or(old.texture_ratio),
            opts.mesh_width.unwrap_or(old.mesh_width),
            opts.mesh_height.unwrap_or(old.mesh_height),
        );

        if self.params.texsize_x != old.texsize_x || self.params.texsize_y != old.texsize_y {
            log::info!(
                "Texture size {}x{} -> {}x{}",
                old.texsize_x,
                old.texsize_y,
                self.params.texsize_x,
                self.params.texsize_y
            );
            self.feedback
                .recreate(&device, self.params.texsize_x, self.params.texsize_y);
            self.composite_target = RenderTarget::for_feedback(
                &device,
                "composite",
                self.params.texsize_x,
                self.params.texsize_y,
                RENDER_FORMAT,
            );
            self.output_target = RenderTarget::for_output(
                &device,
                "output",
                self.params.texsize_x,
                self.params.texsize_y,
                RENDER_FORMAT,
            );
            self.blur
                .resize(&device, self.params.texsize_x, self.params.texsize_y);
        }

        if self.params.mesh_width != old.mesh_width || self.params.mesh_height != old.mesh_height {
            self.mesh
                .resize(self.params.mesh_width, self.params.mesh_height);
            self.mesh_buffers = MeshBuffers::new(
                &device,
                &queue,
                self.params.mesh_width,
                self.params.mesh_height,
            );
        }

        self.runner.update_globals(&self.params);
        self.prev_runner.update_globals(&self.params);

        if self.clock.frame_num() > 0 {
            self.re_render_output();
        }
    }

    /// Change only the warp mesh density.
    pub fn set_internal_mesh_size(&mut self, mesh_width: u32, mesh_height: u32) {
        let device = self.ctx.device.clone();
        let queue = self.ctx.queue.clone();
        self.params = GlobalParams::new(
            self.params.width,
            self.params.height,
            self.params.pixel_ratio,
            self.params.texture_ratio,
            mesh_width,
            mesh_height,
        );
        self.mesh.resize(mesh_width, mesh_height);
        self.mesh_buffers = MeshBuffers::new(&device, &queue, mesh_width, mesh_height);
        self.runner.update_globals(&self.params);
        self.prev_runner.update_globals(&self.params);
    }

    /// Re-run the composite and resolve passes from the stored frame
    /// variables, without advancing time.
    fn re_render_output(&mut self) {
        let Some(last) = self.last_output.clone() else {
            return;
        };
        let device = self.ctx.device.clone();
        let queue = self.ctx.queue.clone();

        self.comp_shader
            .write_uniforms(&queue, &self.frame_uniforms(&last.mixed));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("re_render_encoder"),
        });
        self.record_composite(&device, &mut encoder, false);
        self.output_pass.render(
            &device,
            &queue,
            &mut encoder,
            self.composite_target.view(),
            self.output_target.view(),
            self.params.texsize_x,
            self.params.texsize_y,
            self.fxaa,
        );
        queue.submit(Some(encoder.finish()));
    }

    /// Copy the resolved output back to the CPU as tightly packed RGBA.
    pub fn read_pixels(&self) -> Vec<u8> {
        let device = self.ctx.device.clone();
        let queue = self.ctx.queue.clone();

        let readback = ReadbackBuffer::new(
            &device,
            self.output_target.width(),
            self.output_target.height(),
        );
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        readback.copy_from(&mut encoder, &self.output_target);
        queue.submit(Some(encoder.finish()));
        readback.read_pixels(&device)
    }
}
