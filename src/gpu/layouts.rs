//! Bind group layout builders for GPU pipelines.
//!
//! Provides reusable helpers for creating wgpu bind group layouts.

use wgpu::{BindGroupLayout, BindGroupLayoutEntry, Device, ShaderStages};

/// Builder for creating bind group layouts with common patterns.
pub struct BindGroupLayoutBuilder {
    label: Option<&'static str>,
    entries: Vec<BindGroupLayoutEntry>,
}

impl BindGroupLayoutBuilder {
    /// Create a new bind group layout builder.
    pub fn new(label: &'static str) -> Self {
        Self {
            label: Some(label),
            entries: Vec::new(),
        }
    }

    /// Add a uniform buffer entry.
    pub fn uniform(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
        self
    }

    /// Add a 2D texture entry.
    pub fn texture_2d(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        self
    }

    /// Add a filtering sampler entry.
    pub fn sampler(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        self
    }

    /// Build the bind group layout.
    pub fn build(self, device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: self.label,
            entries: &self.entries,
        })
    }
}

/// Layout shared by preset warp and composite shaders: frame uniforms, the
/// main feedback texture, three blur levels, three noise tiers, one sampler,
/// then one texture per user image starting at binding 9.
pub fn create_preset_shader_layout(device: &Device, image_count: u32) -> BindGroupLayout {
    let mut builder = BindGroupLayoutBuilder::new("preset_shader_bind_group_layout")
        .uniform(0, ShaderStages::VERTEX_FRAGMENT)
        .texture_2d(1, ShaderStages::FRAGMENT)
        .texture_2d(2, ShaderStages::FRAGMENT)
        .texture_2d(3, ShaderStages::FRAGMENT)
        .texture_2d(4, ShaderStages::FRAGMENT)
        .texture_2d(5, ShaderStages::FRAGMENT)
        .texture_2d(6, ShaderStages::FRAGMENT)
        .texture_2d(7, ShaderStages::FRAGMENT)
        .sampler(8, ShaderStages::FRAGMENT);
    for i in 0..image_count {
        builder = builder.texture_2d(9 + i, ShaderStages::FRAGMENT);
    }
    builder.build(device)
}

/// Create blur bind group layout (uniforms, source texture, sampler).
pub fn create_blur_layout(device: &Device) -> BindGroupLayout {
    BindGroupLayoutBuilder::new("blur_bind_group_layout")
        .uniform(0, ShaderStages::FRAGMENT)
        .texture_2d(1, ShaderStages::FRAGMENT)
        .sampler(2, ShaderStages::FRAGMENT)
        .build(device)
}

/// Create output bind group layout (uniforms, composited texture, sampler).
pub fn create_output_layout(device: &Device) -> BindGroupLayout {
    BindGroupLayoutBuilder::new("output_bind_group_layout")
        .uniform(0, ShaderStages::FRAGMENT)
        .texture_2d(1, ShaderStages::FRAGMENT)
        .sampler(2, ShaderStages::FRAGMENT)
        .build(device)
}
