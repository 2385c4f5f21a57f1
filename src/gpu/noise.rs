//! Noise texture tiers and user-supplied image textures.
//!
//! Preset shaders sample fixed-size RGBA noise at three quality tiers plus
//! a single-channel "lite" tier. User images arrive as encoded bytes and
//! are decoded off the render path; a failed decode keeps whatever texture
//! was there before.

use std::collections::HashMap;
use wgpu::{Device, Queue, Texture, TextureFormat, TextureView};

const NOISE_SIZE_LQ: u32 = 32;
const NOISE_SIZE_MQ: u32 = 64;
const NOISE_SIZE_HQ: u32 = 128;

fn create_texture_with_data(
    device: &Device,
    queue: &Queue,
    label: &str,
    width: u32,
    height: u32,
    data: &[u8],
) -> (Texture, TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Generate `width * height` RGBA noise texels.
pub fn generate_noise(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0u8; (width * height * 4) as usize];
    for texel in data.iter_mut() {
        *texel = fastrand::u8(..);
    }
    data
}

/// Generate single-channel noise replicated across RGB with full alpha.
pub fn generate_noise_lite(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        let value = fastrand::u8(..);
        data.extend_from_slice(&[value, value, value, 255]);
    }
    data
}

/// The three noise-quality tiers plus the lite tier, created once at
/// startup. Repeat-wrapped sampling is handled by the shader sampler.
pub struct NoiseTextures {
    lq: (Texture, TextureView),
    mq: (Texture, TextureView),
    hq: (Texture, TextureView),
    lq_lite: (Texture, TextureView),
}

impl NoiseTextures {
    pub fn new(device: &Device, queue: &Queue) -> Self {
        let lq_data = generate_noise(NOISE_SIZE_LQ, NOISE_SIZE_LQ);
        let mq_data = generate_noise(NOISE_SIZE_MQ, NOISE_SIZE_MQ);
        let hq_data = generate_noise(NOISE_SIZE_HQ, NOISE_SIZE_HQ);
        let lite_data = generate_noise_lite(NOISE_SIZE_LQ, NOISE_SIZE_LQ);

        Self {
            lq: create_texture_with_data(
                device,
                queue,
                "noise_lq",
                NOISE_SIZE_LQ,
                NOISE_SIZE_LQ,
                &lq_data,
            ),
            mq: create_texture_with_data(
                device,
                queue,
                "noise_mq",
                NOISE_SIZE_MQ,
                NOISE_SIZE_MQ,
                &mq_data,
            ),
            hq: create_texture_with_data(
                device,
                queue,
                "noise_hq",
                NOISE_SIZE_HQ,
                NOISE_SIZE_HQ,
                &hq_data,
            ),
            lq_lite: create_texture_with_data(
                device,
                queue,
                "noise_lq_lite",
                NOISE_SIZE_LQ,
                NOISE_SIZE_LQ,
                &lite_data,
            ),
        }
    }

    pub fn lq_view(&self) -> &TextureView {
        &self.lq.1
    }

    pub fn mq_view(&self) -> &TextureView {
        &self.mq.1
    }

    pub fn hq_view(&self) -> &TextureView {
        &self.hq.1
    }

    pub fn lq_lite_view(&self) -> &TextureView {
        &self.lq_lite.1
    }
}

/// User-supplied image textures keyed by preset-visible name.
///
/// Loads are single-writer: each successful decode swaps its texture into
/// the map; failures leave the previous entry in place.
#[derive(Default)]
pub struct ImageTextures {
    textures: HashMap<String, (Texture, TextureView)>,
}

impl ImageTextures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and install each image; entries that fail to decode are
    /// logged and skipped.
    pub fn load_extra_images(
        &mut self,
        device: &Device,
        queue: &Queue,
        images: &HashMap<String, Vec<u8>>,
    ) {
        for (name, bytes) in images {
            match image::load_from_memory(bytes) {
                Ok(decoded) => {
                    let rgba = decoded.to_rgba8();
                    let (width, height) = rgba.dimensions();
                    let entry = create_texture_with_data(
                        device,
                        queue,
                        &format!("user_image_{name}"),
                        width,
                        height,
                        &rgba,
                    );
                    self.textures.insert(name.clone(), entry);
                }
                Err(err) => {
                    log::warn!("Failed to decode extra image '{name}': {err}");
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TextureView> {
        self.textures.get(name).map(|(_, view)| view)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}
