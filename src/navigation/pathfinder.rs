//! A* search across the voxels of a [NavGrid].
//!
//! Every step between neighbouring voxels (including diagonal and vertical
//! steps) costs `1`, the heuristic is the Manhattan distance between voxel
//! coordinates. Under 26-connectivity this heuristic can overestimate so a
//! path is always valid but not always the shortest possible
//!

use crate::prelude::*;
use bevy::prelude::*;
use thiserror::Error;

/// Reasons a path could not be produced
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum PathError {
	/// The grid failed validation and rejects all queries
	#[error("navigation grid is invalid")]
	InvalidGrid,
	/// A requested cell or point does not map onto the grid
	#[error("endpoint lies outside the navigation grid")]
	OutsideGrid,
	/// Neither the start cell nor any cell near it can be walked on
	#[error("no walkable cell found near start {0:?}")]
	NoWalkableStart(VoxelCell),
	/// Neither the end cell nor any cell near it can be walked on
	#[error("no walkable cell found near end {0:?}")]
	NoWalkableEnd(VoxelCell),
	/// Every reachable cell was explored without finding the end
	#[error("open set exhausted before reaching the end")]
	Exhausted,
}

/// Search progress of a single voxel
#[derive(Clone, Copy, PartialEq)]
enum Visit {
	/// Not yet discovered
	Unseen,
	/// Discovered and waiting in the open set
	Open,
	/// Fully expanded, never reopened
	Closed,
}

/// Sum of the absolute coordinate differences between two cells
pub fn manhattan_distance(a: VoxelCell, b: VoxelCell) -> u32 {
	(a.get_column().abs_diff(b.get_column())
		+ a.get_row().abs_diff(b.get_row())
		+ a.get_layer().abs_diff(b.get_layer())) as u32
}

/// Find a sequence of walkable cell indices leading from `start` to `end`,
/// both included. If `start` and `end` are the same the path is just that
/// cell
pub fn find_path(grid: &NavGrid, start: VoxelCell, end: VoxelCell) -> Result<Vec<usize>, PathError> {
	if !grid.is_valid() {
		error!("Pathfinding rejected, grid is invalid");
		return Err(PathError::InvalidGrid);
	}
	for cell in [start, end] {
		if !grid.in_bounds(
			cell.get_column() as isize,
			cell.get_row() as isize,
			cell.get_layer() as isize,
		) {
			return Err(PathError::OutsideGrid);
		}
	}
	let start_index = grid.cell_index(start);
	let end_index = grid.cell_index(end);
	if start_index == end_index {
		return Ok(vec![start_index]);
	}
	if !grid.is_walkable(start_index) {
		return Err(PathError::NoWalkableStart(start));
	}
	if !grid.is_walkable(end_index) {
		return Err(PathError::NoWalkableEnd(end));
	}

	let count = grid.get_cell_count();
	let mut visits = vec![Visit::Unseen; count];
	let mut g_costs = vec![u32::MAX; count];
	let mut parents: Vec<Option<usize>> = vec![None; count];
	// (cell index, g + h)
	let mut open: Vec<(usize, u32)> = vec![(start_index, manhattan_distance(start, end))];
	visits[start_index] = Visit::Open;
	g_costs[start_index] = 0;

	let mut iterations = 0;
	while !open.is_empty() {
		iterations += 1;
		// first lowest score wins ties
		let mut best = 0;
		for (i, (_, f)) in open.iter().enumerate() {
			if *f < open[best].1 {
				best = i;
			}
		}
		let (current, _) = open.swap_remove(best);
		if current == end_index {
			trace!("A* reached end after {} iterations", iterations);
			return Ok(reconstruct(&parents, current));
		}
		visits[current] = Visit::Closed;
		let next_g = g_costs[current] + 1;
		for neighbour in grid.neighbours_26(current) {
			match visits[neighbour] {
				Visit::Closed => continue,
				Visit::Unseen => {
					visits[neighbour] = Visit::Open;
					g_costs[neighbour] = next_g;
					parents[neighbour] = Some(current);
					let h = manhattan_distance(grid.cell_to_coords(neighbour), end);
					open.push((neighbour, next_g + h));
				}
				Visit::Open => {
					if next_g < g_costs[neighbour] {
						g_costs[neighbour] = next_g;
						parents[neighbour] = Some(current);
						let h = manhattan_distance(grid.cell_to_coords(neighbour), end);
						if let Some(entry) = open.iter_mut().find(|(i, _)| *i == neighbour) {
							entry.1 = next_g + h;
						}
					}
				}
			}
		}
	}
	trace!("A* exhausted after {} iterations", iterations);
	Err(PathError::Exhausted)
}

/// Walk the parent links back from `end` and reverse them into a path
fn reconstruct(parents: &[Option<usize>], end: usize) -> Vec<usize> {
	let mut path = vec![end];
	let mut current = end;
	while let Some(parent) = parents[current] {
		path.push(parent);
		current = parent;
	}
	path.reverse();
	path
}

/// Find a path between two world-space points across a platform whose
/// current world transform is `platform`. The points of the path are the
/// world-space centres of the voxels visited.
///
/// An endpoint landing in an unwalkable voxel is swapped for the nearest
/// walkable voxel within [FALLBACK_SEARCH_RADIUS] rings
pub fn find_world_path(
	grid: &NavGrid,
	platform: &Transform,
	start_world: Vec3,
	end_world: Vec3,
) -> Result<Vec<Vec3>, PathError> {
	if !grid.is_valid() {
		error!("World pathfinding rejected, grid is invalid");
		return Err(PathError::InvalidGrid);
	}
	let start_cell = grid
		.local_to_cell(to_local(platform, start_world))
		.ok_or(PathError::OutsideGrid)?;
	let end_cell = grid
		.local_to_cell(to_local(platform, end_world))
		.ok_or(PathError::OutsideGrid)?;

	let start = resolve_walkable(grid, start_cell).ok_or(PathError::NoWalkableStart(start_cell))?;
	let end = resolve_walkable(grid, end_cell).ok_or(PathError::NoWalkableEnd(end_cell))?;

	let path = find_path(grid, start, end).inspect_err(|e| {
		warn!(
			"No voxel path from {:?} to {:?}: {}",
			start.get_column_row_layer(),
			end.get_column_row_layer(),
			e
		)
	})?;
	Ok(path
		.into_iter()
		.map(|index| to_world(platform, grid.cell_centre(grid.cell_to_coords(index))))
		.collect())
}

/// The cell itself when it can be walked on, otherwise the nearest one that
/// can be
fn resolve_walkable(grid: &NavGrid, cell: VoxelCell) -> Option<VoxelCell> {
	if grid.is_walkable(grid.cell_index(cell)) {
		return Some(cell);
	}
	let substitute = grid
		.nearest_walkable(cell, FALLBACK_SEARCH_RADIUS)
		.map(|index| grid.cell_to_coords(index));
	match substitute {
		Some(found) => debug!(
			"Substituted unwalkable voxel {:?} with {:?}",
			cell.get_column_row_layer(),
			found.get_column_row_layer()
		),
		None => warn!(
			"No walkable voxel within {} rings of {:?}",
			FALLBACK_SEARCH_RADIUS,
			cell.get_column_row_layer()
		),
	}
	substitute
}
