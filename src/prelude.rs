//! `use bevy_platform_nav_plugin::prelude::*;` to import common structures and methods
//!

#[doc(hidden)]
pub use crate::navigation::{
	grid::*, pathfinder::*, route::*, surface::*, utilities::*,
};

#[doc(hidden)]
pub use crate::controller::{agent::*, avoidance::*, settings::*, *};

#[doc(hidden)]
pub use crate::plugin::{deck_probe::*, motion_layer::*, platform_layer::*, *};
