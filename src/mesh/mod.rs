//! Mesh warp engine.
//!
//! Turns a uniform grid of `(meshWidth+1) x (meshHeight+1)` vertices into
//! deformed texture coordinates and per-vertex color for the warp draw
//! call. The transform order and the zoom-exponent curve reproduce the
//! legacy visual behavior exactly; reordering silently breaks existing
//! preset content.

use crate::equations::{EquationRunner, FrameVariables, GlobalVariables};

/// Analytic per-vertex warp transform.
///
/// `rad` is the vertex distance from grid center, `(new_x, new_y)` the
/// coordinates after any preset vertex equation (identity if none). Steps,
/// in order: recenter, anisotropic scale, rotate, zoom with exponent
/// curve, translate back plus offset, organic warp toward center.
pub fn warp_vertex(frame: &FrameVariables, rad: f32, new_x: f32, new_y: f32) -> [f32; 2] {
    let mut u = new_x - frame.cx;
    let mut v = new_y - frame.cy;

    u *= frame.sx;
    v *= frame.sy;

    if frame.rot != 0.0 {
        let (sin_rot, cos_rot) = frame.rot.sin_cos();
        let ur = u * cos_rot - v * sin_rot;
        let vr = u * sin_rot + v * cos_rot;
        u = ur;
        v = vr;
    }

    // zoom^(zoomexp^(2*rad - 1)): zoomexp bends the zoom strength from the
    // center outward.
    let effective_zoom = frame.zoom.powf(frame.zoomexp.powf(2.0 * rad - 1.0));
    u /= effective_zoom;
    v /= effective_zoom;

    u += frame.cx + frame.dx;
    v += frame.cy + frame.dy;

    if frame.warp != 1.0 {
        let factor = 1.0 + (frame.warp - 1.0) * (-rad * 10.0).exp();
        u = frame.cx + (u - frame.cx) * factor;
        v = frame.cy + (v - frame.cy) * factor;
    }

    [u, v]
}

/// Per-vertex color post-effect chain: white, then red/blue tint,
/// brighten/darken, solarize, invert, clamp. The chain always executes;
/// neutral knob values leave the color untouched.
pub fn vertex_color(frame: &FrameVariables) -> [f32; 4] {
    let mut r = 1.0f32;
    let mut g = 1.0f32;
    let mut b = 1.0f32;

    if frame.red_blue != 0.0 {
        r = 1.0 + frame.red_blue * 0.3;
        b = 1.0 - frame.red_blue * 0.3;
    }

    let brightness = 1.0 + frame.brighten - frame.darken;
    r *= brightness;
    g *= brightness;
    b *= brightness;

    if frame.solarize > 0.0 {
        let amount = frame.solarize;
        if r > 0.5 {
            r = 1.0 - (r - 0.5) * amount;
        }
        if g > 0.5 {
            g = 1.0 - (g - 0.5) * amount;
        }
        if b > 0.5 {
            b = 1.0 - (b - 0.5) * amount;
        }
    }

    if frame.invert > 0.0 {
        let amount = frame.invert;
        r = r * (1.0 - amount) + (1.0 - r) * amount;
        g = g * (1.0 - amount) + (1.0 - g) * amount;
        b = b * (1.0 - amount) + (1.0 - b) * amount;
    }

    [
        r.clamp(0.0, 1.0),
        g.clamp(0.0, 1.0),
        b.clamp(0.0, 1.0),
        1.0,
    ]
}

/// The UV and color buffers consumed by the warp draw call.
///
/// Both buffers are owned here, rebuilt in place every frame, and only
/// resized on an explicit mesh-size change.
pub struct WarpMesh {
    mesh_width: u32,
    mesh_height: u32,
    uv: Vec<f32>,
    color: Vec<f32>,
}

impl WarpMesh {
    pub fn new(mesh_width: u32, mesh_height: u32) -> Self {
        let mut mesh = Self {
            mesh_width,
            mesh_height,
            uv: Vec::new(),
            color: Vec::new(),
        };
        mesh.allocate();
        mesh.fill_identity();
        mesh
    }

    fn allocate(&mut self) {
        let verts = (self.mesh_width as usize + 1) * (self.mesh_height as usize + 1);
        self.uv = vec![0.0; verts * 2];
        self.color = vec![0.0; verts * 4];
    }

    /// Change the grid dimensions, reallocating both buffers.
    pub fn resize(&mut self, mesh_width: u32, mesh_height: u32) {
        self.mesh_width = mesh_width;
        self.mesh_height = mesh_height;
        self.allocate();
        self.fill_identity();
    }

    pub fn mesh_width(&self) -> u32 {
        self.mesh_width
    }

    pub fn mesh_height(&self) -> u32 {
        self.mesh_height
    }

    pub fn uv(&self) -> &[f32] {
        &self.uv
    }

    pub fn color(&self) -> &[f32] {
        &self.color
    }

    /// Rebuild both buffers for this frame.
    ///
    /// With no vertex equations the mesh is the identity grid with
    /// full-white color and the transform chain is skipped entirely.
    pub fn compute(
        &mut self,
        runner: &mut dyn EquationRunner,
        frame: &FrameVariables,
        globals: &GlobalVariables,
    ) {
        if !runner.has_vertex_equations() {
            self.fill_identity();
            return;
        }

        // Color depends only on frame variables, not vertex position.
        let color = vertex_color(frame);

        let mut uv_idx = 0;
        let mut color_idx = 0;
        for j in 0..=self.mesh_height {
            for i in 0..=self.mesh_width {
                let x = i as f32 / self.mesh_width as f32;
                let y = j as f32 / self.mesh_height as f32;
                let rad = ((x - 0.5) * (x - 0.5) + (y - 0.5) * (y - 0.5)).sqrt();
                let ang = (y - 0.5).atan2(x - 0.5);

                let [new_x, new_y] = runner
                    .evaluate_vertex(x, y, rad, ang, globals)
                    .unwrap_or([x, y]);

                let [u, v] = warp_vertex(frame, rad, new_x, new_y);
                self.uv[uv_idx] = u;
                self.uv[uv_idx + 1] = v;
                uv_idx += 2;

                self.color[color_idx..color_idx + 4].copy_from_slice(&color);
                color_idx += 4;
            }
        }
    }

    fn fill_identity(&mut self) {
        let mut uv_idx = 0;
        let mut color_idx = 0;
        for j in 0..=self.mesh_height {
            for i in 0..=self.mesh_width {
                self.uv[uv_idx] = i as f32 / self.mesh_width as f32;
                self.uv[uv_idx + 1] = j as f32 / self.mesh_height as f32;
                uv_idx += 2;

                self.color[color_idx..color_idx + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);
                color_idx += 4;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equations::{BaseValueRunner, GlobalVariables};
    use crate::params::GlobalParams;
    use crate::preset::Preset;

    /// Runner with identity vertex equations, forcing the transform path.
    struct IdentityEquationRunner;

    impl EquationRunner for IdentityEquationRunner {
        fn run_frame_equations(&mut self, _globals: &GlobalVariables) -> FrameVariables {
            FrameVariables::default()
        }

        fn evaluate_vertex(
            &mut self,
            x: f32,
            y: f32,
            _rad: f32,
            _ang: f32,
            _globals: &GlobalVariables,
        ) -> Option<[f32; 2]> {
            Some([x, y])
        }

        fn has_vertex_equations(&self) -> bool {
            true
        }

        fn update_globals(&mut self, _params: &GlobalParams) {}
    }

    #[test]
    fn test_buffer_lengths() {
        for (w, h) in [(2u32, 2u32), (48, 36), (7, 3)] {
            let mesh = WarpMesh::new(w, h);
            let verts = (w as usize + 1) * (h as usize + 1);
            assert_eq!(mesh.uv().len(), verts * 2);
            assert_eq!(mesh.color().len(), verts * 4);
        }
    }

    #[test]
    fn test_default_mesh_is_identity_grid() {
        let mut mesh = WarpMesh::new(2, 2);
        let mut runner = BaseValueRunner::new(&Preset::blank());
        let frame = FrameVariables::default();
        mesh.compute(&mut runner, &frame, &GlobalVariables::default());

        #[rustfmt::skip]
        let expected = [
            0.0, 0.0, 0.5, 0.0, 1.0, 0.0,
            0.0, 0.5, 0.5, 0.5, 1.0, 0.5,
            0.0, 1.0, 0.5, 1.0, 1.0, 1.0,
        ];
        assert_eq!(mesh.uv(), &expected);
        assert!(mesh.color().chunks(4).all(|c| c == [1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_identity_params_keep_grid_unchanged_through_transform() {
        let mut mesh = WarpMesh::new(4, 4);
        let mut runner = IdentityEquationRunner;
        let frame = FrameVariables::default();
        mesh.compute(&mut runner, &frame, &GlobalVariables::default());

        for j in 0..=4u32 {
            for i in 0..=4u32 {
                let idx = ((j * 5 + i) * 2) as usize;
                let x = i as f32 / 4.0;
                let y = j as f32 / 4.0;
                assert!((mesh.uv()[idx] - x).abs() < 1e-6, "u at ({i},{j})");
                assert!((mesh.uv()[idx + 1] - y).abs() < 1e-6, "v at ({i},{j})");
            }
        }
        assert!(mesh.color().chunks(4).all(|c| c == [1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_zoom_halves_offset_from_center() {
        // At (1.0, 0.5): rad = 0.5, so zoomexp^(2*rad-1) = zoomexp^0 = 1 and
        // effectiveZoom = zoom = 2. Offset from center halves.
        let frame = FrameVariables {
            zoom: 2.0,
            ..Default::default()
        };
        let [u, v] = warp_vertex(&frame, 0.5, 1.0, 0.5);
        assert!((u - 0.75).abs() < 1e-6);
        assert!((v - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zoomexp_bends_zoom_by_radius() {
        let frame = FrameVariables {
            zoom: 2.0,
            zoomexp: 2.0,
            ..Default::default()
        };
        // rad = 0: exponent 2^-1 = 0.5, effective zoom sqrt(2).
        let [u, _] = warp_vertex(&frame, 0.0, 1.0, 0.5);
        let expected = 0.5 + 0.5 / 2f32.powf(0.5);
        assert!((u - expected).abs() < 1e-6);
    }

    #[test]
    fn test_rotation_is_standard_2x2() {
        let frame = FrameVariables {
            rot: std::f32::consts::FRAC_PI_2,
            ..Default::default()
        };
        // (1.0, 0.5) is (0.5, 0) from center; quarter turn sends it to
        // (0, 0.5) from center.
        let [u, v] = warp_vertex(&frame, 0.5, 1.0, 0.5);
        assert!((u - 0.5).abs() < 1e-6);
        assert!((v - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_translation_applied_after_zoom() {
        let frame = FrameVariables {
            dx: 0.1,
            dy: -0.05,
            ..Default::default()
        };
        let [u, v] = warp_vertex(&frame, 0.5, 1.0, 0.5);
        assert!((u - 1.1).abs() < 1e-6);
        assert!((v - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_organic_warp_pulls_toward_center() {
        let frame = FrameVariables {
            warp: 0.0,
            ..Default::default()
        };
        // factor = 1 - exp(-10*rad) < 1, so the offset shrinks.
        let [u, _] = warp_vertex(&frame, 0.25, 0.75, 0.5);
        assert!(u < 0.75 && u > 0.5);
    }

    #[test]
    fn test_vertex_color_neutral_is_white() {
        assert_eq!(
            vertex_color(&FrameVariables::default()),
            [1.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_vertex_color_red_blue_tint() {
        let frame = FrameVariables {
            red_blue: 1.0,
            ..Default::default()
        };
        let c = vertex_color(&frame);
        // Red pushed above 1.0 then clamped, blue pulled down.
        assert_eq!(c[0], 1.0);
        assert!((c[2] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_vertex_color_darken_scales_down() {
        let frame = FrameVariables {
            darken: 0.5,
            ..Default::default()
        };
        let c = vertex_color(&frame);
        // 0.5 is not above the solarize midpoint boundary strictly; the
        // brightness factor applies before solarize/invert.
        assert!((c[0] - 0.5).abs() < 1e-6);
        assert!((c[1] - 0.5).abs() < 1e-6);
        assert!((c[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_vertex_color_solarize_reflects_above_half() {
        let frame = FrameVariables {
            solarize: 1.0,
            ..Default::default()
        };
        let c = vertex_color(&frame);
        // White (1.0) reflects to 1.0 - 0.5 = 0.5.
        assert!((c[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_vertex_color_full_invert_complements() {
        let frame = FrameVariables {
            invert: 1.0,
            ..Default::default()
        };
        let c = vertex_color(&frame);
        assert!((c[0] - 0.0).abs() < 1e-6);
        assert_eq!(c[3], 1.0);
    }

    #[test]
    fn test_vertex_color_clamped() {
        let frame = FrameVariables {
            brighten: 5.0,
            ..Default::default()
        };
        // Brighten pushes above 1.0, then solarize is off and clamp caps it.
        let c = vertex_color(&frame);
        assert!(c.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_resize_reallocates_buffers() {
        let mut mesh = WarpMesh::new(2, 2);
        mesh.resize(8, 6);
        assert_eq!(mesh.uv().len(), 9 * 7 * 2);
        assert_eq!(mesh.color().len(), 9 * 7 * 4);
    }
}
