//! Integration tests for the mesh warp engine against known preset
//! scenarios.

use vuzic_visualizer::equations::{EquationRunner, FrameVariables, GlobalVariables};
use vuzic_visualizer::mesh::{vertex_color, warp_vertex, WarpMesh};
use vuzic_visualizer::preset::BaseValues;

fn identity_frame() -> FrameVariables {
    BaseValues::default()
}

#[test]
fn test_identity_frame_is_a_fixed_point() {
    let frame = identity_frame();
    for &(x, y) in &[(0.0, 0.0), (0.25, 0.75), (0.5, 0.5), (1.0, 1.0)] {
        let rad = ((x - 0.5f32).powi(2) + (y - 0.5f32).powi(2)).sqrt();
        let [u, v] = warp_vertex(&frame, rad, x, y);
        assert!((u - x).abs() < 1e-6, "u {u} != x {x}");
        assert!((v - y).abs() < 1e-6, "v {v} != y {y}");
    }
}

#[test]
fn test_zoom_pulls_coordinates_toward_center() {
    let frame = BaseValues {
        zoom: 2.0,
        ..Default::default()
    };
    // At the grid corner, rad = sqrt(0.5); zoomexp = 1 keeps the exponent
    // curve flat so the sample point halves its distance from center.
    let [u, v] = warp_vertex(&frame, 0.5f32.sqrt(), 1.0, 1.0);
    assert!((u - 0.75).abs() < 1e-6);
    assert!((v - 0.75).abs() < 1e-6);
}

#[test]
fn test_zoomexp_bends_zoom_away_from_center() {
    let frame = BaseValues {
        zoom: 2.0,
        zoomexp: 2.0,
        ..Default::default()
    };
    // rad = 0.5 gives exponent 2^(2*0.5-1) = 1, so zoom stays 2.
    let [u, _] = warp_vertex(&frame, 0.5, 1.0, 0.5);
    assert!((u - 0.75).abs() < 1e-6);
    // rad = 1 gives exponent 2, so effective zoom is 4.
    let [u_far, _] = warp_vertex(&frame, 1.0, 1.0, 0.5);
    assert!((u_far - 0.625).abs() < 1e-6);
}

#[test]
fn test_rotation_spins_around_center() {
    let frame = BaseValues {
        rot: std::f32::consts::FRAC_PI_2,
        ..Default::default()
    };
    let [u, v] = warp_vertex(&frame, 0.25, 0.75, 0.5);
    // (0.25, 0) rotated 90 degrees lands at (0, 0.25).
    assert!((u - 0.5).abs() < 1e-5);
    assert!((v - 0.75).abs() < 1e-5);
}

#[test]
fn test_translation_applies_after_zoom() {
    let frame = BaseValues {
        dx: 0.1,
        dy: -0.05,
        ..Default::default()
    };
    let [u, v] = warp_vertex(&frame, 0.3, 0.5, 0.5);
    assert!((u - 0.6).abs() < 1e-6);
    assert!((v - 0.45).abs() < 1e-6);
}

#[test]
fn test_organic_warp_decays_with_radius() {
    let frame = BaseValues {
        warp: 2.0,
        ..Default::default()
    };
    let near = warp_vertex(&frame, 0.05, 0.6, 0.5);
    let far = warp_vertex(&frame, 0.9, 0.6, 0.5);
    let near_push = (near[0] - 0.6).abs();
    let far_push = (far[0] - 0.6).abs();
    assert!(
        near_push > far_push,
        "warp should be strongest near center: {near_push} vs {far_push}"
    );
}

#[test]
fn test_color_chain_neutral_knobs_give_white() {
    assert_eq!(vertex_color(&identity_frame()), [1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn test_color_chain_brightness_and_clamp() {
    let bright = BaseValues {
        brighten: 2.0,
        ..Default::default()
    };
    assert_eq!(vertex_color(&bright), [1.0, 1.0, 1.0, 1.0]);

    let dark = BaseValues {
        darken: 0.5,
        ..Default::default()
    };
    let [r, g, b, a] = vertex_color(&dark);
    assert!((r - 0.5).abs() < 1e-6);
    assert_eq!(r, g);
    assert_eq!(g, b);
    assert_eq!(a, 1.0);
}

#[test]
fn test_color_chain_full_invert() {
    let frame = BaseValues {
        invert: 1.0,
        ..Default::default()
    };
    let [r, _, _, _] = vertex_color(&frame);
    assert!(r.abs() < 1e-6);
}

/// Runner that displaces every vertex by a constant, to force the mesh
/// down the equation path.
struct ShiftRunner;

impl EquationRunner for ShiftRunner {
    fn run_frame_equations(&mut self, _globals: &GlobalVariables) -> FrameVariables {
        BaseValues::default()
    }

    fn evaluate_vertex(
        &mut self,
        x: f32,
        y: f32,
        _rad: f32,
        _ang: f32,
        _globals: &GlobalVariables,
    ) -> Option<[f32; 2]> {
        Some([x + 0.1, y])
    }

    fn has_vertex_equations(&self) -> bool {
        true
    }

    fn update_globals(&mut self, _params: &vuzic_visualizer::params::GlobalParams) {}
}

#[test]
fn test_mesh_applies_vertex_equations() {
    let mut mesh = WarpMesh::new(4, 4);
    let frame = identity_frame();
    let globals = GlobalVariables::default();
    let mut runner = ShiftRunner;

    mesh.compute(&mut runner, &frame, &globals);

    // Every u coordinate shifted by 0.1 relative to the identity grid.
    for j in 0..=4u32 {
        for i in 0..=4u32 {
            let idx = ((j * 5 + i) * 2) as usize;
            let expected = i as f32 / 4.0 + 0.1;
            assert!(
                (mesh.uv()[idx] - expected).abs() < 1e-6,
                "vertex ({i},{j})"
            );
        }
    }
}

#[test]
fn test_mesh_buffer_lengths_track_resize() {
    let mut mesh = WarpMesh::new(48, 36);
    assert_eq!(mesh.uv().len(), 49 * 37 * 2);
    assert_eq!(mesh.color().len(), 49 * 37 * 4);

    mesh.resize(8, 6);
    assert_eq!(mesh.uv().len(), 9 * 7 * 2);
    assert_eq!(mesh.color().len(), 9 * 7 * 4);
}
