//! Navigation across the deck of a platform that moves and rotates through
//! the world.
//!
//! A platform carries a baked [grid::NavGrid], a volume of voxels centred on
//! the platform's own origin where each voxel records whether an agent can
//! stand in it and the height of the surface found there. Because the grid
//! lives in the platform's local space it stays valid however the platform
//! is placed in the world, so every search and every route is computed
//! locally and only projected into world space when an agent needs a world
//! position.
//!
//! Definitions:
//!
//! * Voxel/cell - one discrete unit of the grid, walkable or not, with a baked surface height
//! * Local space - coordinates relative to a platform's own transform
//! * Route - the local-space polyline an agent follows, parameterised by distance travelled
//!
//! ```text
//!         world
//!           |  platform transform (inverse)
//!           v
//!         local ---floor/clamp---> voxel ---A*---> voxels
//!           ^                                        |
//!           |            voxel centres               |
//!           +----------------------------------------+
//! ```
//!

pub mod grid;
pub mod pathfinder;
pub mod route;
pub mod surface;
pub mod utilities;
