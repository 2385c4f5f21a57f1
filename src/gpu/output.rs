//! Final resolve of the composited frame into the output target.
//!
//! Either a plain blit or an FXAA pass; both share one shader module and
//! differ only in fragment entry point.

use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, Device, Queue, RenderPipeline, TextureFormat, TextureView,
};

use super::layouts::create_output_layout;
use super::pipelines::{create_fullscreen_pipeline, create_pipeline_layout};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct OutputUniforms {
    texel: [f32; 2],
    _pad: [f32; 2],
}

pub struct OutputPass {
    layout: BindGroupLayout,
    basic: RenderPipeline,
    fxaa: RenderPipeline,
    uniforms: Buffer,
    sampler: wgpu::Sampler,
}

impl OutputPass {
    pub fn new(device: &Device, format: TextureFormat) -> Self {
        let layout = create_output_layout(device);
        let pipeline_layout = create_pipeline_layout(device, "output_pipeline", &[&layout]);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("output_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/output.wgsl").into()),
        });

        let basic = create_fullscreen_pipeline(
            device,
            "output_basic",
            &pipeline_layout,
            &module,
            "fs_basic",
            format,
        );
        let fxaa = create_fullscreen_pipeline(
            device,
            "output_fxaa",
            &pipeline_layout,
            &module,
            "fs_fxaa",
            format,
        );

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("output_uniforms"),
            size: std::mem::size_of::<OutputUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("output_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            layout,
            basic,
            fxaa,
            uniforms,
            sampler,
        }
    }

    fn bind_group(&self, device: &Device, input: &TextureView) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("output_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.as_entire_binding(),
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
        })
    }

    /// Resolve `input` into `output`, optionally antialiased.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        device: &Device,
        queue: &Queue,
        encoder: &mut wgpu::CommandEncoder,
        input: &TextureView,
        output: &TextureView,
        width: u32,
        height: u32,
        use_fxaa: bool,
    ) {
        queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&OutputUniforms {
                texel: [1.0 / width as f32, 1.0 / height as f32],
                _pad: [0.0; 2],
            }),
        );
        let bind_group = self.bind_group(device, input);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("output_pass"),
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
        pass.set_pipeline(if use_fxaa { &self.fxaa } else { &self.basic });
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::GpuContext;

    #[tokio::test]
    async fn test_output_pass_creation() {
        let ctx = match GpuContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => return,
        };

        let _pass = OutputPass::new(&ctx.device, TextureFormat::Rgba8Unorm);
    }
}
