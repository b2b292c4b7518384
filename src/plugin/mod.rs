//! Defines the Bevy [Plugin] for platform navigation
//!

use crate::prelude::*;
use bevy::prelude::*;

pub mod deck_probe;
pub mod motion_layer;
pub mod platform_layer;

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum NavigationSet {
	/// Keep the platform registry in step with the world
	Registry,
	/// Start and cancel moves
	Request,
	/// Step every move forward
	Advance,
}

/// The [MotionController] driving every [NavAgent] across every
/// [NavPlatform]
#[derive(Resource, Default, Deref, DerefMut)]
pub struct PlatformNavigation(pub MotionController<Entity>);

#[derive(Default)]
pub struct PlatformNavigationPlugin {
	pub settings: NavigationSettings,
}

impl Plugin for PlatformNavigationPlugin {
	#[cfg(not(tarpaulin_include))]
	fn build(&self, app: &mut App) {
		app.register_type::<VoxelCell>()
			.register_type::<GridDimensions>()
			.register_type::<NavGridAsset>()
			.register_type::<NavigationSettings>()
			.register_type::<NavPlatform>()
			.register_type::<NavAgent>()
			.register_type::<AgentVelocity>()
			.register_type::<MoveResult>()
			.insert_resource(PlatformNavigation(MotionController::new(
				self.settings.clone(),
			)))
			.add_event::<motion_layer::EventMoveRequest>()
			.add_event::<motion_layer::EventCancelMove>()
			.add_event::<motion_layer::EventMoveFinished>()
			.configure_sets(
				Update,
				(
					NavigationSet::Registry,
					NavigationSet::Request,
					NavigationSet::Advance,
				)
					.chain(),
			)
			.add_systems(
				Update,
				(
					(
						platform_layer::unbind_removed_platforms,
						platform_layer::bind_added_platforms,
						platform_layer::sync_platform_transforms,
					)
						.chain()
						.in_set(NavigationSet::Registry),
					(
						motion_layer::process_cancel_events,
						motion_layer::process_move_requests,
					)
						.chain()
						.in_set(NavigationSet::Request),
					motion_layer::advance_moves.in_set(NavigationSet::Advance),
				),
			);
	}
}
