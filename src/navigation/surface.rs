//! Surface height lookups used when laying a route onto a platform deck
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Baked surface height of the voxel containing `local`, clamped onto the
/// grid. `0.0` when `local` is not finite
pub fn surface_height(grid: &NavGrid, local: Vec3) -> f32 {
	grid.local_to_cell(local)
		.and_then(|cell| grid.get_height(grid.cell_index(cell)))
		.unwrap_or(0.0)
}

/// Live surface height beneath `local`, measured in the platform's local
/// space by casting along the platform's own up axis and ignoring every
/// agent. Falls back to [surface_height] when the cast misses
pub fn true_surface_height<Id: Copy>(
	grid: &NavGrid,
	platform: &Transform,
	local: Vec3,
	probe: &impl PhysicsProbe<Id>,
	probe_distance: f32,
) -> f32 {
	let world = to_world(platform, local);
	let up = platform.rotation * Vec3::Y;
	let start = world + up * probe_distance;
	let end = world - up * probe_distance;
	match probe.raycast(start, end, RayFilter::ExcludeAllAgents) {
		Some(hit) => to_local(platform, hit.location).y,
		None => surface_height(grid, local),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Probe with a flat floor at a fixed world height
	struct Floor(Option<f32>);

	impl PhysicsProbe<u32> for Floor {
		fn sweep_sphere(&self, _: Vec3, _: Vec3, _: f32, _: f32, _: u32) -> Vec<ProbeHit<u32>> {
			vec![]
		}
		fn raycast(&self, start: Vec3, end: Vec3, filter: RayFilter<u32>) -> Option<ProbeHit<u32>> {
			assert_eq!(RayFilter::ExcludeAllAgents, filter);
			let height = self.0?;
			if (start.y - height) * (end.y - height) > 0.0 {
				return None;
			}
			let t = (start.y - height) / (start.y - end.y);
			Some(ProbeHit {
				location: start.lerp(end, t),
				agent: None,
			})
		}
	}

	/// Two by two grid with distinct baked heights
	fn grid() -> NavGrid {
		let dimensions = GridDimensions::new(2, 2, 1);
		NavGrid::new(dimensions, 1.0, 1.0, dimensions.get_half_extent(1.0, 1.0), vec![true; 4])
			.unwrap()
			.with_heights(vec![0.1, 0.2, 0.3, 0.4])
			.unwrap()
	}

	#[test]
	fn baked_height_clamped() {
		let grid = grid();
		assert_eq!(0.1, surface_height(&grid, Vec3::new(-0.5, 0.0, -0.5)));
		assert_eq!(0.4, surface_height(&grid, Vec3::new(0.5, 0.0, 0.5)));
		assert_eq!(0.2, surface_height(&grid, Vec3::new(30.0, 0.0, -30.0)));
	}
	#[test]
	fn live_height_in_local_space() {
		let grid = grid();
		let platform = Transform::from_xyz(0.0, 10.0, 0.0);
		let result = true_surface_height(&grid, &platform, Vec3::new(0.5, 0.0, 0.5), &Floor(Some(10.25)), 1.5);
		assert!((result - 0.25).abs() < 1.0e-5);
	}
	#[test]
	fn miss_falls_back_to_baked() {
		let grid = grid();
		let platform = Transform::from_xyz(0.0, 10.0, 0.0);
		let result = true_surface_height(&grid, &platform, Vec3::new(0.5, 0.0, 0.5), &Floor(None), 1.5);
		assert_eq!(0.4, result);
		let result = true_surface_height(&grid, &platform, Vec3::new(0.5, 0.0, 0.5), &Floor(Some(50.0)), 1.5);
		assert_eq!(0.4, result);
	}
}
