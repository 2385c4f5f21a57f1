//! End-to-end orchestrator tests. Each test bails out quietly when no GPU
//! adapter is available so CI without a GPU still passes.

use vuzic_visualizer::{
    AudioLevels, Preset, RenderOptions, RenderOrchestrator, RendererConfig, ResizeOptions,
    WaveDescriptor,
};

async fn make_renderer(width: u32, height: u32) -> Option<RenderOrchestrator> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = RendererConfig {
        width,
        height,
        mesh_width: 8,
        mesh_height: 6,
        ..Default::default()
    };
    RenderOrchestrator::new(config).await.ok()
}

fn options_with_audio() -> RenderOptions {
    RenderOptions {
        elapsed: Some(1.0 / 60.0),
        audio: AudioLevels {
            samples: vec![0.0; 128],
            ..AudioLevels::silent()
        },
        render_to_screen: true,
    }
}

#[tokio::test]
async fn test_blank_preset_renders_frames() {
    let Some(mut renderer) = make_renderer(64, 48).await else {
        return;
    };

    let opts = options_with_audio();
    for expected_frame in 1..=3u32 {
        let output = renderer.render(&opts);
        assert_eq!(output.globals.frame, expected_frame);
        assert!(output.globals.time > 0.0);
        // Blank preset: frame variables pass base values through.
        assert_eq!(output.frame.zoom, 1.0);
        assert_eq!(output.frame, output.mixed);
    }
}

#[tokio::test]
async fn test_read_pixels_shape() {
    let Some(mut renderer) = make_renderer(32, 16).await else {
        return;
    };

    renderer.render(&options_with_audio());
    let pixels = renderer.read_pixels();
    assert_eq!(pixels.len(), 32 * 16 * 4);
    // Alpha is forced opaque through the whole pipeline.
    assert!(pixels.chunks(4).all(|px| px[3] == 255));
}

#[tokio::test]
async fn test_preset_load_starts_and_finishes_blend() {
    let Some(mut renderer) = make_renderer(64, 48).await else {
        return;
    };

    let opts = options_with_audio();
    renderer.render(&opts);

    let mut preset = Preset::blank();
    preset.name = "incoming".into();
    preset.base_values.zoom = 1.5;
    renderer.load_preset(preset, 0.1);
    assert!(renderer.is_blending());

    let output = renderer.render(&opts);
    // Mixed variables sit between the two presets mid-blend.
    assert!(output.mixed.zoom > 1.0 && output.mixed.zoom < 1.5);

    // 0.1s blend at a ~30fps fixed step finishes within a few frames.
    for _ in 0..12 {
        renderer.render(&opts);
    }
    assert!(!renderer.is_blending());
    let settled = renderer.render(&opts);
    assert_eq!(settled.mixed.zoom, 1.5);
}

#[tokio::test]
async fn test_bad_shader_body_falls_back_without_panic() {
    let Some(mut renderer) = make_renderer(64, 48).await else {
        return;
    };

    let mut preset = Preset::blank();
    preset.warp_shader = "definitely not wgsl (".into();
    preset.comp_shader = "also broken {{{".into();
    renderer.load_preset(preset, 0.0);

    renderer.render(&options_with_audio());
    let pixels = renderer.read_pixels();
    assert_eq!(pixels.len(), 64 * 48 * 4);
}

#[tokio::test]
async fn test_blur_referencing_preset_renders() {
    let Some(mut renderer) = make_renderer(64, 48).await else {
        return;
    };

    let mut preset = Preset::blank();
    preset.warp_shader =
        "ret = textureSample(sampler_blur2, tex_sampler, uv) * decay;".into();
    // Distinct value ranges so the cascade remap runs off the blended
    // variables during the transition frames.
    preset.base_values.b1n = 0.1;
    preset.base_values.b2x = 0.8;
    renderer.load_preset(preset, 0.1);

    for _ in 0..4 {
        renderer.render(&options_with_audio());
    }
    let pixels = renderer.read_pixels();
    assert_eq!(pixels.len(), 64 * 48 * 4);
}

#[tokio::test]
async fn test_custom_waves_render() {
    let Some(mut renderer) = make_renderer(64, 48).await else {
        return;
    };

    let mut preset = Preset::blank();
    preset.waves.push(WaveDescriptor {
        enabled: true,
        ..Default::default()
    });
    preset.waves.push(WaveDescriptor {
        enabled: true,
        spectrum: true,
        additive: true,
        ..Default::default()
    });
    renderer.load_preset(preset, 0.1);

    let opts = RenderOptions {
        audio: AudioLevels {
            samples: vec![0.1; 128],
            spectrum: vec![0.2; 64],
            ..AudioLevels::silent()
        },
        ..options_with_audio()
    };
    // Mid-blend frames draw both presets' waves, settled frames just the
    // new preset's.
    for _ in 0..6 {
        renderer.render(&opts);
    }
    let pixels = renderer.read_pixels();
    assert_eq!(pixels.len(), 64 * 48 * 4);
}

#[tokio::test]
async fn test_user_image_sampler_renders() {
    let Some(mut renderer) = make_renderer(64, 48).await else {
        return;
    };

    let mut preset = Preset::blank();
    preset.comp_shader =
        "ret = textureSample(sampler_main, tex_sampler, uv) \
         + textureSample(sampler_splash, tex_sampler, uv) * 0.5;".into();
    renderer.load_preset(preset, 0.0);

    // Before the host provides the image, the binding falls back to noise.
    renderer.render(&options_with_audio());

    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    let mut images = std::collections::HashMap::new();
    images.insert("splash".to_string(), bytes.into_inner());
    renderer.load_extra_images(&images);

    renderer.render(&options_with_audio());
    let pixels = renderer.read_pixels();
    assert_eq!(pixels.len(), 64 * 48 * 4);
}

#[tokio::test]
async fn test_resize_keeps_rendering() {
    let Some(mut renderer) = make_renderer(64, 48).await else {
        return;
    };

    renderer.render(&options_with_audio());
    renderer.set_renderer_size(96, 64, &ResizeOptions::default());
    assert_eq!(renderer.params().texsize_x, 96);

    renderer.render(&options_with_audio());
    let pixels = renderer.read_pixels();
    assert_eq!(pixels.len(), 96 * 64 * 4);
}

#[tokio::test]
async fn test_mesh_density_change() {
    let Some(mut renderer) = make_renderer(64, 48).await else {
        return;
    };

    renderer.render(&options_with_audio());
    renderer.set_internal_mesh_size(16, 12);
    assert_eq!(renderer.params().mesh_width, 16);
    renderer.render(&options_with_audio());
}

#[tokio::test]
async fn test_title_animation_lifecycle() {
    let Some(mut renderer) = make_renderer(64, 48).await else {
        return;
    };

    assert!(renderer.title_progress().is_none());
    renderer.launch_title_anim("Artist - Track");
    assert!(renderer.title_progress().is_some());
    assert_eq!(renderer.title_text(), Some("Artist - Track"));

    // Drive the clock at 30fps so 70 frames span ~2.3s, past the 1.7s anim.
    let opts = RenderOptions {
        elapsed: Some(1.0 / 30.0),
        ..options_with_audio()
    };
    for _ in 0..70 {
        renderer.render(&opts);
    }
    assert!(renderer.title_progress().is_none());
}
