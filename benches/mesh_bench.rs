//! Benchmarks for the per-frame mesh warp computation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vuzic_visualizer::equations::{EquationRunner, FrameVariables, GlobalVariables};
use vuzic_visualizer::mesh::{warp_vertex, WarpMesh};
use vuzic_visualizer::params::GlobalParams;
use vuzic_visualizer::preset::BaseValues;

struct SwirlRunner;

impl EquationRunner for SwirlRunner {
    fn run_frame_equations(&mut self, _globals: &GlobalVariables) -> FrameVariables {
        BaseValues::default()
    }

    fn evaluate_vertex(
        &mut self,
        x: f32,
        y: f32,
        rad: f32,
        ang: f32,
        _globals: &GlobalVariables,
    ) -> Option<[f32; 2]> {
        Some([x + 0.02 * (ang + rad).sin(), y + 0.02 * (ang - rad).cos()])
    }

    fn has_vertex_equations(&self) -> bool {
        true
    }

    fn update_globals(&mut self, _params: &GlobalParams) {}
}

fn bench_warp_vertex(c: &mut Criterion) {
    let frame = BaseValues {
        zoom: 1.05,
        zoomexp: 1.2,
        rot: 0.02,
        warp: 1.3,
        ..Default::default()
    };

    c.bench_function("warp_vertex", |b| {
        b.iter(|| black_box(warp_vertex(black_box(&frame), 0.4, 0.3, 0.7)));
    });
}

fn bench_mesh_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("Mesh Compute");
    let frame = BaseValues {
        zoom: 1.05,
        rot: 0.02,
        ..Default::default()
    };
    let globals = GlobalVariables::default();

    for (width, height) in [(24, 18), (48, 36), (96, 72)] {
        let verts = (width as u64 + 1) * (height as u64 + 1);
        group.throughput(Throughput::Elements(verts));
        group.bench_with_input(
            BenchmarkId::new("equations", format!("{width}x{height}")),
            &(width, height),
            |b, &(w, h)| {
                let mut mesh = WarpMesh::new(w, h);
                let mut runner = SwirlRunner;
                b.iter(|| {
                    mesh.compute(&mut runner, black_box(&frame), &globals);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_warp_vertex, bench_mesh_compute);
criterion_main!(benches);
