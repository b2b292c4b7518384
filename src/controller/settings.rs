//! Tuning of how agents are moved, grounded and kept apart. Distances are
//! expressed as factors of an agent's dimensions or of a grid's cell pitch
//!

use bevy::prelude::*;
use thiserror::Error;

/// Reasons [NavigationSettings] could not be loaded
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
	/// The settings file could not be opened
	#[error("failed opening navigation settings {path}: {reason}")]
	Open {
		/// File requested
		path: String,
		/// Underlying io error
		reason: String,
	},
	/// The settings file was not valid
	#[error("failed parsing navigation settings {path}: {reason}")]
	Parse {
		/// File requested
		path: String,
		/// Underlying ron error
		reason: String,
	},
}

/// Which side of its facing an agent steps towards when detouring
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
pub enum AvoidanceSide {
	Left,
	#[default]
	Right,
}

impl AvoidanceSide {
	/// Multiplier applied to an agent's right vector
	pub fn sign(&self) -> f32 {
		match self {
			AvoidanceSide::Left => -1.0,
			AvoidanceSide::Right => 1.0,
		}
	}
}

/// Configuration shared by every move a controller runs
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Resource, Clone, Debug, PartialEq, Reflect)]
pub struct NavigationSettings {
	/// Rate of the exponential approach towards the route each step
	pub move_interp_speed: f32,
	/// Rate of the exponential approach towards the heading each step
	pub rotation_interp_speed: f32,
	/// Route inset from the grid boundary, times the agent radius
	pub safety_margin_factor: f32,
	/// Route inset from the grid boundary for detours, times the agent radius
	pub detour_margin_factor: f32,
	/// Reach of the detour obstruction sweep, times the agent radius
	pub detour_probe_distance_factor: f32,
	/// Sphere size of the detour obstruction sweep, times the agent radius
	pub detour_probe_radius_factor: f32,
	/// Reach of the freeze obstruction sweep, times the agent radius
	pub freeze_probe_distance_factor: f32,
	/// Sphere size of the freeze obstruction sweep, times the agent radius
	pub freeze_probe_radius_factor: f32,
	/// Sideways step of a detour, times the agent radius
	pub detour_offset_factor: f32,
	/// Seconds after a detour before another may be attempted
	pub avoidance_cooldown: f32,
	/// Seconds an agent stays frozen before it is forced to retry
	pub freeze_timeout: f32,
	/// Ground probe start above the agent's centre, times its half height
	pub ground_probe_above_factor: f32,
	/// Ground probe end below the agent's centre, times its half height
	pub ground_probe_below_factor: f32,
	/// Reach either side of the deck of the live surface probe, times the
	/// grid cell height
	pub surface_probe_factor: f32,
	/// How many leading route waypoints are laid onto the live surface
	pub surface_snap_points: usize,
	pub avoidance_side: AvoidanceSide,
	/// Movement below this length leaves the agent's heading untouched
	pub rotation_threshold: f32,
}

impl Default for NavigationSettings {
	fn default() -> Self {
		NavigationSettings {
			move_interp_speed: 20.0,
			rotation_interp_speed: 8.0,
			safety_margin_factor: 1.25,
			detour_margin_factor: 0.25,
			detour_probe_distance_factor: 1.5,
			detour_probe_radius_factor: 0.8,
			freeze_probe_distance_factor: 2.0,
			freeze_probe_radius_factor: 0.9,
			detour_offset_factor: 2.0,
			avoidance_cooldown: 1.0,
			freeze_timeout: 1.0,
			ground_probe_above_factor: 0.5,
			ground_probe_below_factor: 2.5,
			surface_probe_factor: 1.5,
			surface_snap_points: 3,
			avoidance_side: AvoidanceSide::Right,
			rotation_threshold: 1.0e-4,
		}
	}
}

impl NavigationSettings {
	/// From a `ron` file generate the [NavigationSettings]
	#[cfg(feature = "ron")]
	pub fn from_ron(path: String) -> Result<Self, SettingsError> {
		let file = std::fs::File::open(&path).map_err(|e| SettingsError::Open {
			path: path.clone(),
			reason: e.to_string(),
		})?;
		ron::de::from_reader(file).map_err(|e| SettingsError::Parse {
			path,
			reason: e.to_string(),
		})
	}
}
