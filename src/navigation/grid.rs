//! The [NavGrid] is the runtime form of a baked walkability volume attached to
//! a platform. It is built once from a [NavGridAsset] and never changes
//! afterwards, which lets every agent on the platform read it at the same
//! time.
//!
//! The volume is centred on the platform's local origin. Cells are stacked in
//! layers along local `y`, each layer being a `columns x rows` sheet across
//! the local `x-z` deck plane:
//!
//! ```text
//!              layer 1
//!          ___________________
//!         /__/__/__/__/__/__/ |
//!        /__/__/__/__/__/__/  |   layer 0
//!       |  |  |  |  |  |  |  /|__________________
//!       |__|__|__|__|__|__|_//__/__/__/__/__/__/ |
//!                          /__/__/__/__/__/__/  |
//!    row (z)              |  |  |  |  |  |  |  /
//!      ^                  |__|__|__|__|__|__|_/
//!      |
//!      o--> column (x)
//! ```
//!
//! A cell's flat index is `column + row * columns + layer * columns * rows`
//!

use crate::prelude::*;
use bevy::prelude::*;
use thiserror::Error;

/// Reasons a baked grid is refused
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
	/// One of the axes has no cells
	#[error("grid dimensions {0:?} must all be greater than zero")]
	ZeroDimension(GridDimensions),
	/// Cell pitch must describe a real volume
	#[error("cell pitch must be finite and positive, got cell_size {cell_size} and cell_height {cell_height}")]
	InvalidPitch {
		/// Horizontal pitch supplied
		cell_size: f32,
		/// Vertical pitch supplied
		cell_height: f32,
	},
	/// The per-cell data does not cover the dimensions exactly
	#[error("expected {expected} cells but the baked data has {actual}")]
	CellCountMismatch {
		/// `columns * rows * layers`
		expected: usize,
		/// Length of the supplied data
		actual: usize,
	},
	/// The baked data could not be read
	#[error("failed loading baked grid: {0}")]
	Load(String),
}

/// Baked record of a single voxel
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Reflect)]
pub struct GridNode {
	/// Whether an agent may stand in this cell
	pub walkable: bool,
	/// Local-space height of the surface found in this cell
	pub height: f32,
	/// The surface was baked from a slope rather than a flat deck
	pub is_ramp: bool,
}

/// Persisted output of baking a platform's navigation volume, supplied whole
/// to [NavGrid::from_asset]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, Default, PartialEq, Reflect)]
pub struct NavGridAsset {
	/// Cell counts along each axis
	pub dimensions: GridDimensions,
	/// Horizontal pitch of a cell
	pub cell_size: f32,
	/// Vertical pitch of a cell
	pub cell_height: f32,
	/// Half-size of the volume in the platform's local space
	pub half_extent: Vec3,
	/// One record per cell in flat index order
	pub nodes: Vec<GridNode>,
}

impl NavGridAsset {
	/// Create an asset where every cell of a single layer is walkable with a
	/// surface at height `0.0`, sized so the volume exactly fits the cells
	pub fn new_open_deck(columns: usize, rows: usize, cell_size: f32, cell_height: f32) -> Self {
		let dimensions = GridDimensions::new(columns, rows, 1);
		let nodes = vec![
			GridNode {
				walkable: true,
				height: 0.0,
				is_ramp: false,
			};
			columns * rows
		];
		NavGridAsset {
			dimensions,
			cell_size,
			cell_height,
			half_extent: dimensions.get_half_extent(cell_size, cell_height),
			nodes,
		}
	}
	/// From a `ron` file generate the [NavGridAsset]
	#[cfg(feature = "ron")]
	pub fn from_ron(path: String) -> Result<Self, GridError> {
		let file = std::fs::File::open(&path)
			.map_err(|e| GridError::Load(format!("opening {}: {}", path, e)))?;
		ron::de::from_reader(file).map_err(|e| GridError::Load(format!("{}: {}", path, e)))
	}
}

/// Immutable 3d walkability grid for one platform
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct NavGrid {
	/// Cell counts along each axis
	dimensions: GridDimensions,
	/// Horizontal pitch of a cell
	cell_size: f32,
	/// Vertical pitch of a cell
	cell_height: f32,
	/// Half-size of the volume in local space, maps local coordinates to cells
	half_extent: Vec3,
	/// Walkability of each cell in flat index order
	walkable: Vec<bool>,
	/// Baked local surface height of each cell in flat index order
	heights: Vec<f32>,
}

impl NavGrid {
	/// Create a new instance of [NavGrid] from a walkability array, surface
	/// heights default to `0.0`
	pub fn new(
		dimensions: GridDimensions,
		cell_size: f32,
		cell_height: f32,
		half_extent: Vec3,
		walkable: Vec<bool>,
	) -> Result<Self, GridError> {
		let expected = validate(dimensions, cell_size, cell_height)?;
		if walkable.len() != expected {
			return Err(GridError::CellCountMismatch {
				expected,
				actual: walkable.len(),
			});
		}
		Ok(NavGrid {
			dimensions,
			cell_size,
			cell_height,
			half_extent,
			walkable,
			heights: vec![0.0; expected],
		})
	}
	/// Replace the baked surface heights
	pub fn with_heights(mut self, heights: Vec<f32>) -> Result<Self, GridError> {
		if heights.len() != self.walkable.len() {
			return Err(GridError::CellCountMismatch {
				expected: self.walkable.len(),
				actual: heights.len(),
			});
		}
		self.heights = heights;
		Ok(self)
	}
	/// Build the runtime grid from baked data
	pub fn from_asset(asset: &NavGridAsset) -> Result<Self, GridError> {
		let built = validate(asset.dimensions, asset.cell_size, asset.cell_height).and_then(
			|expected| {
				if asset.nodes.len() != expected {
					Err(GridError::CellCountMismatch {
						expected,
						actual: asset.nodes.len(),
					})
				} else {
					Ok(NavGrid {
						dimensions: asset.dimensions,
						cell_size: asset.cell_size,
						cell_height: asset.cell_height,
						half_extent: asset.half_extent,
						walkable: asset.nodes.iter().map(|n| n.walkable).collect(),
						heights: asset.nodes.iter().map(|n| n.height).collect(),
					})
				}
			},
		);
		match &built {
			Ok(grid) => debug!(
				"Built NavGrid {}x{}x{}, cell {} height {}, {} walkable cells",
				grid.dimensions.get_columns(),
				grid.dimensions.get_rows(),
				grid.dimensions.get_layers(),
				grid.cell_size,
				grid.cell_height,
				grid.walkable.iter().filter(|w| **w).count()
			),
			Err(e) => error!("Failed building NavGrid: {}", e),
		}
		built
	}
	pub fn get_dimensions(&self) -> GridDimensions {
		self.dimensions
	}
	pub fn get_cell_size(&self) -> f32 {
		self.cell_size
	}
	pub fn get_cell_height(&self) -> f32 {
		self.cell_height
	}
	pub fn get_half_extent(&self) -> Vec3 {
		self.half_extent
	}
	/// Get the walkability array
	pub fn get_walkable(&self) -> &[bool] {
		&self.walkable
	}
	/// Number of cells in the grid
	pub fn get_cell_count(&self) -> usize {
		self.walkable.len()
	}
	/// Whether the cell at `index` exists and is walkable
	pub fn is_walkable(&self, index: usize) -> bool {
		self.walkable.get(index).copied().unwrap_or(false)
	}
	/// Baked surface height of the cell at `index`
	pub fn get_height(&self, index: usize) -> Option<f32> {
		self.heights.get(index).copied()
	}
	/// Whether the dimensions, pitch and per-cell data are consistent. An
	/// invalid grid rejects all queries
	pub fn is_valid(&self) -> bool {
		match validate(self.dimensions, self.cell_size, self.cell_height) {
			Ok(expected) => self.walkable.len() == expected && self.heights.len() == expected,
			Err(_) => false,
		}
	}
	/// Flat index of a cell. No bounds check is made, validate with
	/// [NavGrid::in_bounds] first
	pub fn index(&self, column: usize, row: usize, layer: usize) -> usize {
		let columns = self.dimensions.get_columns();
		column + row * columns + layer * columns * self.dimensions.get_rows()
	}
	/// Flat index of a [VoxelCell]
	pub fn cell_index(&self, cell: VoxelCell) -> usize {
		self.index(cell.get_column(), cell.get_row(), cell.get_layer())
	}
	/// Whether each coordinate lies within `[0, dimension)`
	pub fn in_bounds(&self, column: isize, row: isize, layer: isize) -> bool {
		column >= 0
			&& row >= 0
			&& layer >= 0
			&& (column as usize) < self.dimensions.get_columns()
			&& (row as usize) < self.dimensions.get_rows()
			&& (layer as usize) < self.dimensions.get_layers()
	}
	/// The inverse of [NavGrid::index]
	pub fn cell_to_coords(&self, index: usize) -> VoxelCell {
		let columns = self.dimensions.get_columns().max(1);
		let sheet = columns * self.dimensions.get_rows().max(1);
		let layer = index / sheet;
		let remainder = index % sheet;
		VoxelCell::new(remainder % columns, remainder / columns, layer)
	}
	/// Walkable cells offset by `{-1, 0, 1}` on every axis (up to 26), this
	/// allows diagonal and vertical steps such as ramps
	pub fn neighbours_26(&self, index: usize) -> Vec<usize> {
		let mut neighbours = Vec::with_capacity(26);
		let (c, r, l) = signed(self.cell_to_coords(index));
		for dl in -1..=1 {
			for dr in -1..=1 {
				for dc in -1..=1 {
					if dc == 0 && dr == 0 && dl == 0 {
						continue;
					}
					self.push_if_walkable(c + dc, r + dr, l + dl, &mut neighbours);
				}
			}
		}
		neighbours
	}
	/// Walkable cells offset along a single axis (up to 6)
	pub fn neighbours_6(&self, index: usize) -> Vec<usize> {
		const OFFSETS: [(isize, isize, isize); 6] = [
			(1, 0, 0),
			(-1, 0, 0),
			(0, 1, 0),
			(0, -1, 0),
			(0, 0, 1),
			(0, 0, -1),
		];
		let mut neighbours = Vec::with_capacity(6);
		let (c, r, l) = signed(self.cell_to_coords(index));
		for (dc, dr, dl) in OFFSETS.iter() {
			self.push_if_walkable(c + dc, r + dr, l + dl, &mut neighbours);
		}
		neighbours
	}
	/// Record the index of a neighbour when it exists and can be walked on
	fn push_if_walkable(&self, column: isize, row: isize, layer: isize, out: &mut Vec<usize>) {
		if self.in_bounds(column, row, layer) {
			let index = self.index(column as usize, row as usize, layer as usize);
			if self.is_walkable(index) {
				out.push(index);
			}
		}
	}
	/// Expanding cubic search for a walkable cell around `cell`, ring radius
	/// `0..=max_radius`. The first in-bounds walkable cell found is returned
	pub fn nearest_walkable(&self, cell: VoxelCell, max_radius: usize) -> Option<usize> {
		let (c, r, l) = signed(cell);
		for radius in 0..=max_radius as isize {
			for dc in -radius..=radius {
				for dr in -radius..=radius {
					for dl in -radius..=radius {
						let (nc, nr, nl) = (c + dc, r + dr, l + dl);
						if !self.in_bounds(nc, nr, nl) {
							continue;
						}
						let index = self.index(nc as usize, nr as usize, nl as usize);
						if self.is_walkable(index) {
							return Some(index);
						}
					}
				}
			}
		}
		None
	}
	/// Map a local-space point onto the cell containing it, clamped onto the
	/// grid. [None] if the point is not finite
	pub fn local_to_cell(&self, local: Vec3) -> Option<VoxelCell> {
		if !local.is_finite() {
			return None;
		}
		let column = clamped_axis(
			local.x + self.half_extent.x,
			self.cell_size,
			self.dimensions.get_columns(),
		);
		let row = clamped_axis(
			local.z + self.half_extent.z,
			self.cell_size,
			self.dimensions.get_rows(),
		);
		let layer = clamped_axis(
			local.y + self.half_extent.y,
			self.cell_height,
			self.dimensions.get_layers(),
		);
		Some(VoxelCell::new(column, row, layer))
	}
	/// Local-space point at the centre of a voxel
	pub fn cell_centre(&self, cell: VoxelCell) -> Vec3 {
		Vec3::new(
			-self.half_extent.x + self.cell_size * 0.5 + cell.get_column() as f32 * self.cell_size,
			-self.half_extent.y
				+ self.cell_height * 0.5
				+ cell.get_layer() as f32 * self.cell_height,
			-self.half_extent.z + self.cell_size * 0.5 + cell.get_row() as f32 * self.cell_size,
		)
	}
	/// Baked height of the first walkable cell at or below `local` within its
	/// column of layers. [None] if `local` lies horizontally outside the grid
	/// or nothing beneath it is walkable
	pub fn surface_below(&self, local: Vec3) -> Option<f32> {
		if !within_horizontal_extent(local, self.half_extent) {
			return None;
		}
		let cell = self.local_to_cell(local)?;
		(0..=cell.get_layer()).rev().find_map(|layer| {
			let index = self.index(cell.get_column(), cell.get_row(), layer);
			if self.is_walkable(index) {
				self.get_height(index)
			} else {
				None
			}
		})
	}
}

/// Check dimensions and pitch, returning the expected number of cells
fn validate(
	dimensions: GridDimensions,
	cell_size: f32,
	cell_height: f32,
) -> Result<usize, GridError> {
	if !dimensions.is_non_zero() {
		return Err(GridError::ZeroDimension(dimensions));
	}
	let pitch_ok = |p: f32| p.is_finite() && p > 0.0;
	if !pitch_ok(cell_size) || !pitch_ok(cell_height) {
		return Err(GridError::InvalidPitch {
			cell_size,
			cell_height,
		});
	}
	dimensions.get_cell_count().ok_or(GridError::ZeroDimension(dimensions))
}

/// `floor(offset / pitch)` clamped into `[0, count - 1]`
fn clamped_axis(offset: f32, pitch: f32, count: usize) -> usize {
	let cell = (offset / pitch).floor();
	if cell <= 0.0 {
		0
	} else {
		(cell as usize).min(count.saturating_sub(1))
	}
}

/// A cell as signed coordinates so offsets can step below zero
fn signed(cell: VoxelCell) -> (isize, isize, isize) {
	(
		cell.get_column() as isize,
		cell.get_row() as isize,
		cell.get_layer() as isize,
	)
}

#[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;

	/// Build an open grid with `blocked` cells made unwalkable
	fn grid_with_blocked(dimensions: GridDimensions, blocked: &[(usize, usize, usize)]) -> NavGrid {
		let count = dimensions.get_cell_count().unwrap();
		let half_extent = dimensions.get_half_extent(1.0, 1.0);
		let mut grid = NavGrid::new(dimensions, 1.0, 1.0, half_extent, vec![true; count]).unwrap();
		for (c, r, l) in blocked {
			let i = grid.index(*c, *r, *l);
			grid.walkable[i] = false;
		}
		grid
	}

	#[test]
	fn index_round_trip() {
		let grid = grid_with_blocked(GridDimensions::new(4, 3, 5), &[]);
		for l in 0..5 {
			for r in 0..3 {
				for c in 0..4 {
					let index = grid.index(c, r, l);
					assert_eq!(VoxelCell::new(c, r, l), grid.cell_to_coords(index));
				}
			}
		}
	}
	#[test]
	fn index_layout() {
		let grid = grid_with_blocked(GridDimensions::new(4, 3, 2), &[]);
		assert_eq!(0, grid.index(0, 0, 0));
		assert_eq!(1, grid.index(1, 0, 0));
		assert_eq!(4, grid.index(0, 1, 0));
		assert_eq!(12, grid.index(0, 0, 1));
		assert_eq!(23, grid.index(3, 2, 1));
	}
	#[test]
	fn bounds() {
		let grid = grid_with_blocked(GridDimensions::new(2, 2, 1), &[]);
		assert!(grid.in_bounds(0, 0, 0));
		assert!(grid.in_bounds(1, 1, 0));
		assert!(!grid.in_bounds(-1, 0, 0));
		assert!(!grid.in_bounds(2, 0, 0));
		assert!(!grid.in_bounds(0, 0, 1));
	}
	#[test]
	fn reject_zero_dimension() {
		let result = NavGrid::new(GridDimensions::new(3, 0, 1), 1.0, 1.0, Vec3::ONE, vec![]);
		assert_eq!(Err(GridError::ZeroDimension(GridDimensions::new(3, 0, 1))), result);
	}
	#[test]
	fn reject_bad_pitch() {
		let result = NavGrid::new(GridDimensions::new(1, 1, 1), 0.0, 1.0, Vec3::ONE, vec![true]);
		assert!(matches!(result, Err(GridError::InvalidPitch { .. })));
		let result = NavGrid::new(GridDimensions::new(1, 1, 1), 1.0, f32::NAN, Vec3::ONE, vec![true]);
		assert!(matches!(result, Err(GridError::InvalidPitch { .. })));
	}
	#[test]
	fn reject_cell_count_mismatch() {
		let result = NavGrid::new(GridDimensions::new(2, 2, 1), 1.0, 1.0, Vec3::ONE, vec![true; 3]);
		assert_eq!(Err(GridError::CellCountMismatch { expected: 4, actual: 3 }), result);
	}
	#[test]
	fn reject_asset_with_missing_nodes() {
		let mut asset = NavGridAsset::new_open_deck(3, 3, 1.0, 1.0);
		asset.nodes.pop();
		let result = NavGrid::from_asset(&asset);
		assert_eq!(Err(GridError::CellCountMismatch { expected: 9, actual: 8 }), result);
	}
	#[test]
	fn build_from_asset_copies_heights() {
		let mut asset = NavGridAsset::new_open_deck(2, 2, 1.0, 1.0);
		asset.nodes[3].height = 0.25;
		asset.nodes[1].walkable = false;
		let grid = NavGrid::from_asset(&asset).unwrap();
		assert!(grid.is_valid());
		assert_eq!(Some(0.25), grid.get_height(3));
		assert!(!grid.is_walkable(1));
		assert!(grid.is_walkable(0));
	}
	#[test]
	fn heights_must_match() {
		let grid = grid_with_blocked(GridDimensions::new(2, 2, 1), &[]);
		let result = grid.with_heights(vec![1.0; 5]);
		assert!(matches!(result, Err(GridError::CellCountMismatch { expected: 4, actual: 5 })));
	}
	#[test]
	fn neighbours_26_centre() {
		let grid = grid_with_blocked(GridDimensions::new(3, 3, 3), &[]);
		let result = grid.neighbours_26(grid.index(1, 1, 1));
		assert_eq!(26, result.len());
		assert!(!result.contains(&grid.index(1, 1, 1)));
	}
	#[test]
	fn neighbours_26_corner() {
		let grid = grid_with_blocked(GridDimensions::new(3, 3, 3), &[]);
		let result = grid.neighbours_26(grid.index(0, 0, 0));
		assert_eq!(7, result.len());
	}
	#[test]
	fn neighbours_skip_unwalkable() {
		//  ________
		// |__|x_|__|
		// |__|o_|x_|
		// |__|__|__|
		let grid = grid_with_blocked(GridDimensions::new(3, 3, 1), &[(1, 0, 0), (2, 1, 0)]);
		let result = grid.neighbours_26(grid.index(1, 1, 0));
		assert_eq!(6, result.len());
		assert!(!result.contains(&grid.index(1, 0, 0)));
		assert!(!result.contains(&grid.index(2, 1, 0)));
	}
	#[test]
	fn neighbours_6_centre() {
		let grid = grid_with_blocked(GridDimensions::new(3, 3, 3), &[(1, 1, 2)]);
		let result = grid.neighbours_6(grid.index(1, 1, 1));
		let actual = vec![
			grid.index(2, 1, 1),
			grid.index(0, 1, 1),
			grid.index(1, 2, 1),
			grid.index(1, 0, 1),
			grid.index(1, 1, 0),
		];
		assert_eq!(actual, result);
	}
	#[test]
	fn nearest_walkable_radius_zero_is_self() {
		let grid = grid_with_blocked(GridDimensions::new(3, 3, 1), &[(0, 0, 0)]);
		let cell = VoxelCell::new(1, 1, 0);
		assert_eq!(Some(grid.cell_index(cell)), grid.nearest_walkable(cell, 0));
		assert_eq!(None, grid.nearest_walkable(VoxelCell::new(0, 0, 0), 0));
	}
	#[test]
	fn nearest_walkable_one_ring_out() {
		//  ________
		// |x_|x_|x_|
		// |x_|o_|x_|
		// |x_|x_|__|
		let grid = grid_with_blocked(
			GridDimensions::new(3, 3, 1),
			&[(0, 0, 0), (1, 0, 0), (2, 0, 0), (0, 1, 0), (1, 1, 0), (2, 1, 0), (0, 2, 0), (1, 2, 0)],
		);
		let result = grid.nearest_walkable(VoxelCell::new(1, 1, 0), 1);
		assert_eq!(Some(grid.index(2, 2, 0)), result);
	}
	#[test]
	fn nearest_walkable_none_within_radius() {
		let blocked: Vec<(usize, usize, usize)> =
			(0..5).flat_map(|c| (0..5).map(move |r| (c, r, 0))).filter(|p| *p != (4, 4, 0)).collect();
		let grid = grid_with_blocked(GridDimensions::new(5, 5, 1), &blocked);
		assert_eq!(None, grid.nearest_walkable(VoxelCell::new(0, 0, 0), 3));
		assert_eq!(Some(grid.index(4, 4, 0)), grid.nearest_walkable(VoxelCell::new(0, 0, 0), 4));
	}
	#[test]
	fn local_to_cell_clamps() {
		let grid = grid_with_blocked(GridDimensions::new(4, 4, 2), &[]);
		// half extent is (2, 1, 2)
		assert_eq!(Some(VoxelCell::new(0, 0, 0)), grid.local_to_cell(Vec3::new(-2.0, -1.0, -2.0)));
		assert_eq!(Some(VoxelCell::new(3, 3, 1)), grid.local_to_cell(Vec3::new(2.0, 1.0, 2.0)));
		assert_eq!(Some(VoxelCell::new(0, 3, 1)), grid.local_to_cell(Vec3::new(-50.0, 50.0, 50.0)));
		assert_eq!(Some(VoxelCell::new(2, 1, 0)), grid.local_to_cell(Vec3::new(0.5, -0.5, -0.5)));
		assert_eq!(None, grid.local_to_cell(Vec3::new(f32::NAN, 0.0, 0.0)));
	}
	#[test]
	fn cell_centre_round_trip() {
		let grid = grid_with_blocked(GridDimensions::new(5, 4, 3), &[]);
		for index in 0..grid.get_cell_count() {
			let cell = grid.cell_to_coords(index);
			let centre = grid.cell_centre(cell);
			assert_eq!(Some(cell), grid.local_to_cell(centre));
		}
	}
	#[test]
	fn surface_below_walks_down_layers() {
		let dimensions = GridDimensions::new(2, 2, 3);
		let grid = grid_with_blocked(dimensions, &[(0, 0, 2), (0, 0, 1)]);
		let heights: Vec<f32> = (0..12).map(|i| i as f32 * 0.1).collect();
		let grid = grid.with_heights(heights).unwrap();
		// half extent is (1, 1.5, 1), local y 1.4 sits in layer 2
		let result = grid.surface_below(Vec3::new(-0.5, 1.4, -0.5));
		assert_eq!(Some(0.0), result);
		let result = grid.surface_below(Vec3::new(0.5, 1.4, -0.5));
		assert_eq!(grid.get_height(grid.index(1, 0, 2)), result);
		assert_eq!(None, grid.surface_below(Vec3::new(3.0, 0.0, 0.0)));
	}
	#[test]
	#[cfg(feature = "ron")]
	fn deck_grid_file() {
		let path = env!("CARGO_MANIFEST_DIR").to_string() + "/assets/deck_grid.ron";
		let asset = NavGridAsset::from_ron(path).unwrap();
		let grid = NavGrid::from_asset(&asset).unwrap();
		assert_eq!(GridDimensions::new(4, 3, 1), grid.get_dimensions());
		assert!(!grid.is_walkable(grid.index(1, 1, 0)));
	}
}
