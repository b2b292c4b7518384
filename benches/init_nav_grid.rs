//! Measure building a large NavGrid from baked data
//!

use bevy_platform_nav_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Build a grid from an open deck asset
fn init_nav_grid(asset: &NavGridAsset) {
	let _grid = NavGrid::from_asset(asset).unwrap();
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let mut group = c.benchmark_group("data_initialisation");
	group.significance_level(0.05).sample_size(100);
	let asset = NavGridAsset::new_open_deck(512, 512, 0.5, 1.0);
	group.bench_function("init_nav_grid", |b| {
		b.iter(|| init_nav_grid(black_box(&asset)))
	});
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
