use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use freeview_core::Viewport;
use freeview_render::{LayoutTracker, place};

pub fn bench_place(c: &mut Criterion) {
    let mut group = c.benchmark_group("place");
    for (w, h) in [(375, 667), (1280, 720), (1920, 1080), (3840, 2160)] {
        let viewport = Viewport::new(w, h);
        group.bench_with_input(BenchmarkId::from_parameter(viewport), &viewport, |b, vp| {
            b.iter(|| black_box(place(black_box(*vp))));
        });
    }
    group.finish();
}

/// Resize storm: layout recomputed only when the tracker says so
pub fn bench_resize_tracking(c: &mut Criterion) {
    c.bench_function("resize_storm", |b| {
        b.iter(|| {
            let mut tracker = LayoutTracker::new(Viewport::new(1280, 720));
            let mut placed = 0;
            for step in 0..200u32 {
                let vp = Viewport::new(1280 + step * 7, 720 + step * 3);
                if tracker.observe(vp) {
                    black_box(place(vp));
                    placed += 1;
                }
            }
            black_box(placed)
        });
    });
}

criterion_group!(benches, bench_place, bench_resize_tracking);
criterion_main!(benches);
