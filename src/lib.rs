//! This is a plugin for Bevy game engine to navigate agents across the decks
//! of moving, rotating platforms using baked voxel grids and 3d A*
//!

pub mod controller;
pub mod navigation;
pub mod plugin;

pub mod prelude;
