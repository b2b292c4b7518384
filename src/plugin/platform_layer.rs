//! Logic relating to discovering [NavPlatform]s and keeping the registry of
//! the [PlatformNavigation] resource current as platforms move, appear and
//! disappear.
//!
//! Navigation runs in `Update`, before Bevy propagates `GlobalTransform`, so
//! a platform's pose is computed from its `Transform` hierarchy each frame
//! rather than read from its (one frame stale) `GlobalTransform`
//!

use crate::prelude::*;
use bevy::prelude::*;
use bevy::transform::helper::TransformHelper;
use std::sync::Arc;

/// A platform that agents can walk across, carrying its baked navigation
/// volume
#[derive(Component, Clone, Default, Reflect)]
#[require(Transform)]
pub struct NavPlatform {
	/// Baked navigation volume in the platform's local space
	asset: NavGridAsset,
}

impl NavPlatform {
	/// Create a new instance of [NavPlatform]
	pub fn new(asset: NavGridAsset) -> Self {
		NavPlatform { asset }
	}
	/// From a `ron` file generate the [NavPlatform]
	#[cfg(feature = "ron")]
	pub fn from_ron(path: String) -> Result<Self, GridError> {
		Ok(NavPlatform::new(NavGridAsset::from_ron(path)?))
	}
	pub fn get_asset(&self) -> &NavGridAsset {
		&self.asset
	}
}

/// Build the grid of each new [NavPlatform] and bind it. A platform whose grid
/// fails to build is still bound so that requests across it report
/// [MoveResult::RuntimeNavMissing]
#[cfg(not(tarpaulin_include))]
pub fn bind_added_platforms(
	platforms: Query<(Entity, &NavPlatform), Added<NavPlatform>>,
	helper: TransformHelper,
	mut nav: ResMut<PlatformNavigation>,
) {
	for (entity, platform) in platforms.iter() {
		let Some(transform) = current_transform(&helper, entity) else {
			continue;
		};
		let asset = platform.get_asset();
		let grid = match NavGrid::from_asset(asset) {
			Ok(grid) => Some(Arc::new(grid)),
			Err(e) => {
				error!("Platform {:?} has no usable grid: {}", entity, e);
				None
			}
		};
		let binding = PlatformBinding::new(
			entity,
			transform,
			asset.half_extent,
			grid,
		);
		nav.bind(binding);
	}
}

/// Unbind platforms that were despawned or lost their [NavPlatform],
/// cancelling the moves across them
#[cfg(not(tarpaulin_include))]
pub fn unbind_removed_platforms(
	mut removed: RemovedComponents<NavPlatform>,
	mut nav: ResMut<PlatformNavigation>,
	mut agents: Query<AgentQueryData>,
	mut event_finished: EventWriter<EventMoveFinished>,
) {
	for entity in removed.read() {
		let mut host = EcsAgentHost::new(&mut agents);
		for completion in nav.unbind(&mut host, entity) {
			event_finished.write(EventMoveFinished::from(completion));
		}
	}
}

/// Follow platforms as they move and rotate through the world, using the
/// pose they have this frame
#[cfg(not(tarpaulin_include))]
pub fn sync_platform_transforms(
	platforms: Query<Entity, With<NavPlatform>>,
	helper: TransformHelper,
	mut nav: ResMut<PlatformNavigation>,
) {
	for entity in platforms.iter() {
		if let Some(transform) = current_transform(&helper, entity) {
			nav.update_platform_transform(entity, transform);
		}
	}
}

/// World transform of an entity computed from its own and its ancestors'
/// `Transform`s
fn current_transform(helper: &TransformHelper, entity: Entity) -> Option<Transform> {
	match helper.compute_global_transform(entity) {
		Ok(global) => Some(global.compute_transform()),
		Err(e) => {
			error!("Cannot place platform {:?}: {}", entity, e);
			None
		}
	}
}
