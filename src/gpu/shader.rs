//! Dynamic preset shader compilation.
//!
//! Presets carry WGSL fragment bodies for the warp and composite passes.
//! Each body is spliced between a fixed prologue and epilogue, legacy
//! identifiers are rewritten to this engine's binding names, and the result
//! is validated with naga before a pipeline is built from it. A body that
//! fails validation falls back to a passthrough shader instead of taking
//! the renderer down.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, Device, PipelineLayout, Queue, RenderPipeline,
    TextureFormat, TextureView, VertexBufferLayout,
};

use super::layouts::create_preset_shader_layout;
use super::noise::ImageTextures;
use super::pipelines::{create_pipeline_layout, RenderPipelineBuilder};

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("WGSL parse error: {0}")]
    Parse(String),
    #[error("WGSL validation error: {0}")]
    Validation(String),
}

/// Per-frame uniforms shared by the warp and composite shaders.
///
/// `resolution` packs texture size in xy and its reciprocal in zw;
/// `aspect` packs the aspect factors in xy and their inverses in zw.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    pub resolution: [f32; 4],
    pub aspect: [f32; 4],
    pub time: f32,
    pub frame_num: f32,
    pub decay: f32,
    pub _pad: f32,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            resolution: [1.0, 1.0, 1.0, 1.0],
            aspect: [1.0, 1.0, 1.0, 1.0],
            time: 0.0,
            frame_num: 0.0,
            decay: 1.0,
            _pad: 0.0,
        }
    }
}

const SHADER_BINDINGS: &str = r#"
struct FrameUniforms {
    resolution: vec4f,
    aspect: vec4f,
    time: f32,
    frame_num: f32,
    decay: f32,
    pad: f32,
};

@group(0) @binding(0) var<uniform> u: FrameUniforms;
@group(0) @binding(1) var main_tex: texture_2d<f32>;
@group(0) @binding(2) var blur1_tex: texture_2d<f32>;
@group(0) @binding(3) var blur2_tex: texture_2d<f32>;
@group(0) @binding(4) var blur3_tex: texture_2d<f32>;
@group(0) @binding(5) var noise_lq_tex: texture_2d<f32>;
@group(0) @binding(6) var noise_mq_tex: texture_2d<f32>;
@group(0) @binding(7) var noise_hq_tex: texture_2d<f32>;
@group(0) @binding(8) var tex_sampler: sampler;
"#;

/// First binding slot available to user images; 0..=8 are fixed.
const USER_IMAGE_BINDING_BASE: u32 = 9;

const SHADER_MAIN: &str = r#"
struct VsOut {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
    @location(1) color: vec4f,
};

@vertex
fn vs_main(
    @location(0) pos: vec2f,
    @location(1) uv_in: vec2f,
    @location(2) color_in: vec4f,
) -> VsOut {
    var out: VsOut;
    out.position = vec4f(pos, 0.0, 1.0);
    out.uv = uv_in;
    out.color = color_in;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4f {
    let uv = in.uv;
    let uv_orig = in.uv;
    let vertex_color = in.color;
    let time = u.time;
    let frame = u.frame_num;
    let decay = u.decay;
    let texsize = u.resolution;
    let aspect = u.aspect;
    let rad = length((uv - 0.5) * 2.0 * aspect.xy);
    let ang = atan2((uv.y - 0.5) * 2.0 * aspect.y, (uv.x - 0.5) * 2.0 * aspect.x);
    var ret = vec4f(0.0);
"#;

const SHADER_EPILOGUE: &str = r#"
    return vec4f(ret.rgb, vertex_color.a);
}
"#;

/// Body used when a preset supplies no shader text or its text fails to
/// validate: last frame's pixels scaled by the per-vertex color.
pub const PASSTHROUGH_BODY: &str =
    "ret = textureSample(main_tex, tex_sampler, uv) * vec4f(vertex_color.rgb, 1.0);";

fn alias_for(ident: &str) -> Option<&'static str> {
    Some(match ident {
        "sampler_main" => "main_tex",
        "sampler_blur1" => "blur1_tex",
        "sampler_blur2" => "blur2_tex",
        "sampler_blur3" => "blur3_tex",
        "sampler_noise_lq" => "noise_lq_tex",
        "sampler_noise_mq" => "noise_mq_tex",
        "sampler_noise_hq" => "noise_hq_tex",
        "sampler_noise_lq_lite" => "noise_lq_tex",
        "aspectx" => "aspect.x",
        "aspecty" => "aspect.y",
        _ => return None,
    })
}

/// A `sampler_*` token that is not a builtin alias names a user image.
fn user_image_name(ident: &str) -> Option<&str> {
    if alias_for(ident).is_some() {
        return None;
    }
    match ident.strip_prefix("sampler_") {
        Some(name) if !name.is_empty() => Some(name),
        _ => None,
    }
}

/// User image names a body references, in first-use order.
pub fn user_image_names(body: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for_each_token(body, |token, out| {
        if let Some(name) = user_image_name(token) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        out.push_str(token);
    });
    names
}

/// Rewrite legacy preset identifiers to this engine's binding names.
/// Unrecognized `sampler_*` tokens become `image_*_tex` user bindings.
///
/// Substitution is token-wise: an alias inside a longer identifier is left
/// untouched.
pub fn rewrite_aliases(body: &str) -> String {
    for_each_token(body, |token, out| match alias_for(token) {
        Some(alias) => out.push_str(alias),
        None => match user_image_name(token) {
            Some(name) => {
                out.push_str("image_");
                out.push_str(name);
                out.push_str("_tex");
            }
            None => out.push_str(token),
        },
    })
}

/// Walk identifier-shaped tokens, letting `visit` decide what to emit.
fn for_each_token(body: &str, mut visit: impl FnMut(&str, &mut String)) -> String {
    let mut out = String::with_capacity(body.len());
    let mut token = String::new();
    for c in body.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            token.push(c);
        } else {
            if !token.is_empty() {
                visit(&token, &mut out);
                token.clear();
            }
            out.push(c);
        }
    }
    if !token.is_empty() {
        visit(&token, &mut out);
    }
    out
}

/// Splice a fragment body between the fixed prologue and epilogue, with one
/// extra texture binding declared per referenced user image.
pub fn compose_shader_source(body: &str, image_names: &[String]) -> String {
    let mut source = String::with_capacity(
        SHADER_BINDINGS.len() + SHADER_MAIN.len() + body.len() + SHADER_EPILOGUE.len() + 64,
    );
    source.push_str(SHADER_BINDINGS);
    for (i, name) in image_names.iter().enumerate() {
        source.push_str(&format!(
            "@group(0) @binding({}) var image_{name}_tex: texture_2d<f32>;\n",
            USER_IMAGE_BINDING_BASE + i as u32
        ));
    }
    source.push_str(SHADER_MAIN);
    source.push_str(body);
    source.push('\n');
    source.push_str(SHADER_EPILOGUE);
    source
}

/// Parse and validate a complete WGSL module without touching the GPU.
pub fn validate_wgsl(source: &str) -> Result<(), ShaderError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|err| ShaderError::Parse(err.emit_to_string(source)))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|err| ShaderError::Validation(err.emit_to_string(source)))?;
    Ok(())
}

fn body_hash(body: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    hasher.finish()
}

const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
const UV_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];
const COLOR_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x4];

/// The three vertex streams every preset shader consumes: position, UV,
/// per-vertex color.
pub fn vertex_buffer_layouts() -> Vec<VertexBufferLayout<'static>> {
    vec![
        VertexBufferLayout {
            array_stride: 8,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &POSITION_ATTRS,
        },
        VertexBufferLayout {
            array_stride: 8,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &UV_ATTRS,
        },
        VertexBufferLayout {
            array_stride: 16,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &COLOR_ATTRS,
        },
    ]
}

/// Texture views bound for one preset shader draw.
pub struct ShaderInputs<'a> {
    pub main: &'a TextureView,
    pub blur1: &'a TextureView,
    pub blur2: &'a TextureView,
    pub blur3: &'a TextureView,
    pub noise_lq: &'a TextureView,
    pub noise_mq: &'a TextureView,
    pub noise_hq: &'a TextureView,
    /// User images referenced as `sampler_<name>`; a missing entry binds
    /// the LQ noise texture so the draw stays valid.
    pub images: &'a ImageTextures,
}

/// Owns one dynamically compiled preset pipeline (warp or composite) and
/// swaps it out when a new preset body arrives.
pub struct ShaderProgramManager {
    label: &'static str,
    bind_layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
    pipeline: RenderPipeline,
    uniform_buffer: Buffer,
    sampler: wgpu::Sampler,
    format: TextureFormat,
    body_hash: u64,
    image_names: Vec<String>,
    using_fallback: bool,
}

impl ShaderProgramManager {
    pub fn new(device: &Device, label: &'static str, format: TextureFormat) -> Self {
        let bind_layout = create_preset_shader_layout(device, 0);
        let pipeline_layout = create_pipeline_layout(device, label, &[&bind_layout]);

        let source = compose_shader_source(PASSTHROUGH_BODY, &[]);
        let pipeline = build_pipeline(device, label, &pipeline_layout, &source, format);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Self {
            label,
            bind_layout,
            pipeline_layout,
            pipeline,
            uniform_buffer,
            sampler,
            format,
            body_hash: body_hash(""),
            image_names: Vec::new(),
            using_fallback: false,
        }
    }

    /// Swap layouts when the user-image binding count changes; layouts for
    /// equal counts are interchangeable.
    fn install_image_bindings(&mut self, device: &Device, names: Vec<String>) {
        if names.len() != self.image_names.len() {
            self.bind_layout = create_preset_shader_layout(device, names.len() as u32);
            self.pipeline_layout = create_pipeline_layout(device, self.label, &[&self.bind_layout]);
        }
        self.image_names = names;
    }

    /// Install a new preset fragment body.
    ///
    /// Returns true when the requested body is active. An empty body means
    /// the preset has no shader for this pass and gets the passthrough. A
    /// body that fails validation is logged and replaced by the
    /// passthrough, returning false. Recompilation is skipped when the
    /// body is unchanged.
    pub fn update_shader(&mut self, device: &Device, body: &str) -> bool {
        let hash = body_hash(body);
        if hash == self.body_hash {
            return !self.using_fallback;
        }
        self.body_hash = hash;

        let (effective, names) = if body.trim().is_empty() {
            (PASSTHROUGH_BODY.to_string(), Vec::new())
        } else {
            (rewrite_aliases(body), user_image_names(body))
        };

        let source = compose_shader_source(&effective, &names);
        match validate_wgsl(&source) {
            Ok(()) => {
                self.install_image_bindings(device, names);
                self.pipeline =
                    build_pipeline(device, self.label, &self.pipeline_layout, &source, self.format);
                self.using_fallback = false;
                true
            }
            Err(err) => {
                log::warn!("{} shader rejected, using passthrough: {err}", self.label);
                self.install_image_bindings(device, Vec::new());
                let fallback = compose_shader_source(PASSTHROUGH_BODY, &[]);
                self.pipeline = build_pipeline(
                    device,
                    self.label,
                    &self.pipeline_layout,
                    &fallback,
                    self.format,
                );
                self.using_fallback = true;
                false
            }
        }
    }

    /// Bind this frame's texture inputs, including any user images the
    /// active body references.
    pub fn make_bind_group(&self, device: &Device, inputs: &ShaderInputs<'_>) -> BindGroup {
        let texture = |binding, view| wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::TextureView(view),
        };

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: self.uniform_buffer.as_entire_binding(),
            },
            texture(1, inputs.main),
            texture(2, inputs.blur1),
            texture(3, inputs.blur2),
            texture(4, inputs.blur3),
            texture(5, inputs.noise_lq),
            texture(6, inputs.noise_mq),
            texture(7, inputs.noise_hq),
            wgpu::BindGroupEntry {
                binding: 8,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for (i, name) in self.image_names.iter().enumerate() {
            let view = inputs.images.get(name).unwrap_or(inputs.noise_lq);
            entries.push(texture(USER_IMAGE_BINDING_BASE + i as u32, view));
        }

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.bind_layout,
            entries: &entries,
        })
    }

    /// Names of the user images the active body references.
    pub fn image_names(&self) -> &[String] {
        &self.image_names
    }

    pub fn write_uniforms(&self, queue: &Queue, uniforms: &FrameUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback
    }
}

fn build_pipeline(
    device: &Device,
    label: &'static str,
    layout: &PipelineLayout,
    source: &str,
    format: TextureFormat,
) -> RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    RenderPipelineBuilder::new(label)
        .layout(layout)
        .shader(&module)
        .vertex_buffers(vertex_buffer_layouts())
        .format(format)
        .blend(wgpu::BlendState::ALPHA_BLENDING)
        .build(device)
}
