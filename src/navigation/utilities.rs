//! Useful structures and tools used by the grid, the pathfinder and the
//! motion controller
//!

use bevy::prelude::*;

/// How many rings of cells are searched for a walkable substitute when the
/// start or end of a world path resolves to an unwalkable cell
pub const FALLBACK_SEARCH_RADIUS: usize = 2;

/// Below this squared length a vector is treated as having no direction
const NEARLY_ZERO_SQUARED: f32 = 1.0e-8;

/// ID of a voxel within a [crate::prelude::NavGrid]
///
/// A platform's local space is Y-up, the horizontal deck is the `x-z` plane:
///
/// * `column` - position along local `x`
/// * `row` - position along local `z`
/// * `layer` - position along local `y` (vertical)
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct VoxelCell((usize, usize, usize));

impl VoxelCell {
	/// Create a new instance of [VoxelCell]
	pub fn new(column: usize, row: usize, layer: usize) -> Self {
		VoxelCell((column, row, layer))
	}
	/// Get the `(column, row, layer)` tuple
	pub fn get_column_row_layer(&self) -> (usize, usize, usize) {
		self.0
	}
	/// Get the column (local `x`)
	pub fn get_column(&self) -> usize {
		self.0 .0
	}
	/// Get the row (local `z`)
	pub fn get_row(&self) -> usize {
		self.0 .1
	}
	/// Get the layer (local `y`)
	pub fn get_layer(&self) -> usize {
		self.0 .2
	}
}

/// Number of cells along each axis of a [crate::prelude::NavGrid]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Reflect)]
pub struct GridDimensions {
	/// Cells along local `x`
	columns: usize,
	/// Cells along local `z`
	rows: usize,
	/// Cells along local `y`
	layers: usize,
}

impl GridDimensions {
	/// Create a new instance of [GridDimensions]
	pub fn new(columns: usize, rows: usize, layers: usize) -> Self {
		GridDimensions {
			columns,
			rows,
			layers,
		}
	}
	pub fn get_columns(&self) -> usize {
		self.columns
	}
	pub fn get_rows(&self) -> usize {
		self.rows
	}
	pub fn get_layers(&self) -> usize {
		self.layers
	}
	/// True when every axis has at least one cell
	pub fn is_non_zero(&self) -> bool {
		self.columns > 0 && self.rows > 0 && self.layers > 0
	}
	/// Total number of cells, [None] if it would overflow
	pub fn get_cell_count(&self) -> Option<usize> {
		self.columns
			.checked_mul(self.rows)
			.and_then(|c| c.checked_mul(self.layers))
	}
	/// Half-size of the volume these dimensions fill when laid out with the
	/// given pitches and centred on the local origin
	pub fn get_half_extent(&self, cell_size: f32, cell_height: f32) -> Vec3 {
		Vec3::new(
			self.columns as f32 * cell_size * 0.5,
			self.layers as f32 * cell_height * 0.5,
			self.rows as f32 * cell_size * 0.5,
		)
	}
}

/// Move a world-space point into the local frame of a platform
pub fn to_local(platform: &Transform, world: Vec3) -> Vec3 {
	platform.compute_affine().inverse().transform_point3(world)
}

/// Move a point in the local frame of a platform out into world space
pub fn to_world(platform: &Transform, local: Vec3) -> Vec3 {
	platform.transform_point(local)
}

/// Drop the vertical component of a vector
pub fn horizontal(v: Vec3) -> Vec3 {
	Vec3::new(v.x, 0.0, v.z)
}

/// Whether `local` lies within `half_extent` on the horizontal axes only
pub fn within_horizontal_extent(local: Vec3, half_extent: Vec3) -> bool {
	local.x >= -half_extent.x
		&& local.x <= half_extent.x
		&& local.z >= -half_extent.z
		&& local.z <= half_extent.z
}

/// Whether `local` lies within the box `[-half_extent, half_extent]`
pub fn within_extent(local: Vec3, half_extent: Vec3) -> bool {
	within_horizontal_extent(local, half_extent)
		&& local.y >= -half_extent.y
		&& local.y <= half_extent.y
}

/// Clamp a coordinate into `[-half_extent + margin, half_extent - margin]`.
/// When the margin swallows the whole extent the axis collapses onto the
/// centre line
pub fn clamp_with_margin(value: f32, half_extent: f32, margin: f32) -> f32 {
	let min = -half_extent + margin;
	let max = half_extent - margin;
	if min > max {
		0.0
	} else {
		value.clamp(min, max)
	}
}

/// Exponential approach of `current` towards `target` at rate `speed`
pub fn interp_to(current: Vec3, target: Vec3, delta: f32, speed: f32) -> Vec3 {
	if speed <= 0.0 {
		return target;
	}
	let distance = target - current;
	if distance.length_squared() < NEARLY_ZERO_SQUARED {
		return target;
	}
	current + distance * (delta * speed).clamp(0.0, 1.0)
}

/// Exponential approach of a rotation towards `target` at rate `speed`
pub fn interp_rotation_to(current: Quat, target: Quat, delta: f32, speed: f32) -> Quat {
	if speed <= 0.0 {
		return target;
	}
	current.slerp(target, (delta * speed).clamp(0.0, 1.0)).normalize()
}

/// Yaw-only rotation whose forward (`-z`) faces along the horizontal part of
/// `direction`. [None] if `direction` has no horizontal component
pub fn heading_rotation(direction: Vec3) -> Option<Quat> {
	let flat = horizontal(direction);
	if flat.length_squared() < NEARLY_ZERO_SQUARED {
		return None;
	}
	let flat = flat.normalize();
	Some(Quat::from_rotation_y(f32::atan2(-flat.x, -flat.z)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::f32::consts::FRAC_PI_2;

	#[test]
	fn local_world_round_trip() {
		let platform = Transform::from_xyz(30.0, -2.0, 7.5)
			.with_rotation(Quat::from_rotation_y(0.7) * Quat::from_rotation_x(0.1));
		let world = Vec3::new(12.0, 4.0, -3.0);
		let local = to_local(&platform, world);
		let result = to_world(&platform, local);
		assert!((result - world).length() < 1.0e-4);
	}
	#[test]
	fn local_of_platform_origin_is_zero() {
		let platform = Transform::from_xyz(5.0, 1.0, 5.0).with_rotation(Quat::from_rotation_y(1.2));
		let result = to_local(&platform, Vec3::new(5.0, 1.0, 5.0));
		assert!(result.length() < 1.0e-5);
	}
	#[test]
	fn half_extent_from_dimensions() {
		let dimensions = GridDimensions::new(4, 6, 2);
		let result = dimensions.get_half_extent(1.0, 0.5);
		assert_eq!(Vec3::new(2.0, 0.5, 3.0), result);
	}
	#[test]
	fn cell_count_overflow() {
		let dimensions = GridDimensions::new(usize::MAX, 2, 1);
		assert_eq!(None, dimensions.get_cell_count());
	}
	#[test]
	fn margin_larger_than_extent_collapses() {
		assert_eq!(0.0, clamp_with_margin(3.0, 1.0, 2.0));
		assert_eq!(0.5, clamp_with_margin(3.0, 1.0, 0.5));
		assert_eq!(-0.5, clamp_with_margin(-3.0, 1.0, 0.5));
	}
	#[test]
	fn interp_moves_part_way() {
		let result = interp_to(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 0.01, 20.0);
		assert!((result.x - 2.0).abs() < 1.0e-5);
	}
	#[test]
	fn interp_never_overshoots() {
		let result = interp_to(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 1.0, 20.0);
		assert_eq!(Vec3::new(10.0, 0.0, 0.0), result);
	}
	#[test]
	fn heading_faces_direction() {
		let rotation = heading_rotation(Vec3::new(1.0, 3.0, 0.0)).unwrap();
		let forward = rotation * Vec3::NEG_Z;
		assert!((forward - Vec3::X).length() < 1.0e-5);
		let rotation = heading_rotation(Vec3::new(0.0, 0.0, 1.0)).unwrap();
		let forward = rotation * Vec3::NEG_Z;
		assert!((forward - Vec3::Z).length() < 1.0e-5);
	}
	#[test]
	fn heading_of_vertical_is_none() {
		assert_eq!(None, heading_rotation(Vec3::Y));
	}
	#[test]
	fn rotation_interp_halfway() {
		let current = Quat::IDENTITY;
		let target = Quat::from_rotation_y(FRAC_PI_2);
		let result = interp_rotation_to(current, target, 0.0625, 8.0);
		let (_, angle) = result.to_axis_angle();
		assert!((angle - FRAC_PI_2 * 0.5).abs() < 1.0e-4);
	}
}
