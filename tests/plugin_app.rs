//! Run the plugin inside a bare `App`
//!

use bevy::prelude::*;
use bevy_platform_nav_plugin::prelude::*;
use std::time::Duration;

/// App with the plugin, a 12x12 deck at the origin and one agent
fn app_with_agent(agent_at: Vec3) -> (App, Entity, Entity) {
	let mut app = App::new();
	app.add_plugins(PlatformNavigationPlugin::default());
	app.init_resource::<Time>();
	let platform = app
		.world_mut()
		.spawn((
			NavPlatform::new(NavGridAsset::new_open_deck(12, 12, 1.0, 2.0)),
			Transform::IDENTITY,
		))
		.id();
	let agent = app
		.world_mut()
		.spawn((
			NavAgent::new(0.4, 0.9),
			AgentVelocity::default(),
			Transform::from_translation(agent_at),
		))
		.id();
	(app, platform, agent)
}

/// Step the app by a frame and collect the moves that finished
fn step(app: &mut App) -> Vec<EventMoveFinished> {
	app.world_mut()
		.resource_mut::<Time>()
		.advance_by(Duration::from_millis(16));
	app.update();
	app.world()
		.resource::<Events<EventMoveFinished>>()
		.iter_current_update_events()
		.copied()
		.collect()
}

#[test]
fn platform_is_bound() {
	let (mut app, platform, agent) = app_with_agent(Vec3::new(0.5, 0.9, 0.5));
	step(&mut app);
	let nav = app.world().resource::<PlatformNavigation>();
	assert_eq!(vec![platform], nav.list_platforms());
	assert!(nav.bindings()[0].get_grid().is_some());
	assert_ne!(platform, agent);
}

#[test]
fn agent_off_platform() {
	let (mut app, _, agent) = app_with_agent(Vec3::new(50.0, 0.9, 0.5));
	app.world_mut()
		.send_event(EventMoveRequest::new(agent, Vec3::ZERO, 0.2, 2.0));
	let finished = step(&mut app);
	assert_eq!(
		vec![EventMoveFinished {
			agent,
			result: MoveResult::NoPlatform
		}],
		finished
	);
	assert!(app
		.world()
		.resource::<PlatformNavigation>()
		.active_moves()
		.is_empty());
}

#[test]
fn agent_walks_across_deck() {
	let (mut app, _, agent) = app_with_agent(Vec3::new(-4.5, 0.9, -4.5));
	let goal = Vec3::new(4.5, 0.9, 3.5);
	app.world_mut()
		.send_event(EventMoveRequest::new(agent, goal, 0.2, 3.0));
	let mut finished = Vec::new();
	for _ in 0..600 {
		finished.extend(step(&mut app));
		if !finished.is_empty() {
			break;
		}
	}
	assert_eq!(
		vec![EventMoveFinished {
			agent,
			result: MoveResult::Success
		}],
		finished
	);
	let world = app.world();
	let location = world.get::<Transform>(agent).unwrap().translation;
	assert!(horizontal(location - goal).length() < 1.0);
	assert!((location.y - 0.9).abs() < 1.0e-4);
	assert!(!world.get::<NavAgent>(agent).unwrap().is_driven());
	assert_eq!(Vec3::ZERO, world.get::<AgentVelocity>(agent).unwrap().0);
}

#[test]
fn cancel_event() {
	let (mut app, _, agent) = app_with_agent(Vec3::new(-4.5, 0.9, -4.5));
	app.world_mut()
		.send_event(EventMoveRequest::new(agent, Vec3::new(4.5, 0.9, 4.5), 0.2, 2.0));
	assert!(step(&mut app).is_empty());
	assert!(app.world().get::<NavAgent>(agent).unwrap().is_driven());
	app.world_mut().send_event(EventCancelMove(agent));
	let finished = step(&mut app);
	assert_eq!(
		vec![EventMoveFinished {
			agent,
			result: MoveResult::Cancelled
		}],
		finished
	);
	assert!(!app.world().get::<NavAgent>(agent).unwrap().is_driven());
}

#[test]
fn despawned_platform_cancels() {
	let (mut app, platform, agent) = app_with_agent(Vec3::new(-4.5, 0.9, -4.5));
	app.world_mut()
		.send_event(EventMoveRequest::new(agent, Vec3::new(4.5, 0.9, 4.5), 0.2, 2.0));
	step(&mut app);
	app.world_mut().despawn(platform);
	let finished = step(&mut app);
	assert_eq!(
		vec![EventMoveFinished {
			agent,
			result: MoveResult::Cancelled
		}],
		finished
	);
	assert!(app
		.world()
		.resource::<PlatformNavigation>()
		.list_platforms()
		.is_empty());
}

#[test]
fn broken_grid_is_missing_nav() {
	let mut app = App::new();
	app.add_plugins(PlatformNavigationPlugin::default());
	app.init_resource::<Time>();
	let mut asset = NavGridAsset::new_open_deck(4, 4, 1.0, 2.0);
	asset.nodes.truncate(3);
	app.world_mut().spawn(NavPlatform::new(asset));
	let agent = app
		.world_mut()
		.spawn((NavAgent::new(0.4, 0.9), Transform::from_xyz(0.5, 0.9, 0.5)))
		.id();
	app.world_mut()
		.send_event(EventMoveRequest::new(agent, Vec3::new(1.5, 0.9, 1.5), 0.2, 2.0));
	let finished = step(&mut app);
	assert_eq!(
		vec![EventMoveFinished {
			agent,
			result: MoveResult::RuntimeNavMissing
		}],
		finished
	);
}

/// App with transform propagation, a deck placed away from the origin and
/// one agent standing on it
fn app_with_placed_deck(deck: Transform, agent_local: Vec3) -> (App, Entity, Entity) {
	let mut app = App::new();
	app.add_plugins((
		bevy::transform::TransformPlugin,
		PlatformNavigationPlugin::default(),
	));
	app.init_resource::<Time>();
	let platform = app
		.world_mut()
		.spawn((
			NavPlatform::new(NavGridAsset::new_open_deck(12, 12, 1.0, 2.0)),
			deck,
		))
		.id();
	let agent = app
		.world_mut()
		.spawn((
			NavAgent::new(0.4, 0.9),
			AgentVelocity::default(),
			Transform::from_translation(to_world(&deck, agent_local)),
		))
		.id();
	(app, platform, agent)
}

#[test]
fn new_platform_bound_at_its_pose() {
	let deck = Transform::from_xyz(30.0, 2.0, -8.0).with_rotation(Quat::from_rotation_y(0.7));
	let (mut app, _, agent) = app_with_placed_deck(deck, Vec3::new(-3.5, 0.9, 0.5));
	app.world_mut().send_event(EventMoveRequest::new(
		agent,
		to_world(&deck, Vec3::new(3.5, 0.9, 0.5)),
		0.2,
		2.0,
	));
	assert!(step(&mut app).is_empty());
	let nav = app.world().resource::<PlatformNavigation>();
	assert!((nav.bindings()[0].get_transform().translation - deck.translation).length() < 1.0e-5);
	assert_eq!(1, nav.active_moves().len());
}

#[test]
fn platform_moved_this_frame_is_used() {
	let deck = Transform::from_xyz(30.0, 2.0, -8.0).with_rotation(Quat::from_rotation_y(0.7));
	let (mut app, platform, agent) = app_with_placed_deck(deck, Vec3::new(-3.5, 0.9, 0.5));
	step(&mut app);
	// the ship and its passenger jump together, then a move is asked for
	let offset = Vec3::new(20.0, 0.0, 0.0);
	app.world_mut().get_mut::<Transform>(platform).unwrap().translation += offset;
	app.world_mut().get_mut::<Transform>(agent).unwrap().translation += offset;
	let mut moved = deck;
	moved.translation += offset;
	app.world_mut().send_event(EventMoveRequest::new(
		agent,
		to_world(&moved, Vec3::new(3.5, 0.9, 0.5)),
		0.2,
		2.0,
	));
	assert!(step(&mut app).is_empty());
	let nav = app.world().resource::<PlatformNavigation>();
	assert!((nav.bindings()[0].get_transform().translation - moved.translation).length() < 1.0e-5);
	assert_eq!(1, nav.active_moves().len());
}

#[test]
fn agent_rides_moving_platform_to_goal() {
	let mut deck = Transform::from_xyz(30.0, 2.0, -8.0).with_rotation(Quat::from_rotation_y(0.7));
	let (mut app, platform, agent) = app_with_placed_deck(deck, Vec3::new(-3.5, 0.9, 0.5));
	let goal_local = Vec3::new(3.5, 0.9, 0.5);
	app.world_mut().send_event(EventMoveRequest::new(
		agent,
		to_world(&deck, goal_local),
		0.2,
		3.0,
	));
	let mut finished = Vec::new();
	for _ in 0..600 {
		// the platform drifts and turns every frame, the agent is carried along
		deck.translation += Vec3::new(0.02, 0.0, 0.01);
		deck.rotate_y(0.001);
		*app.world_mut().get_mut::<Transform>(platform).unwrap() = deck;
		finished.extend(step(&mut app));
		if !finished.is_empty() {
			break;
		}
	}
	assert_eq!(
		vec![EventMoveFinished {
			agent,
			result: MoveResult::Success
		}],
		finished
	);
	let location = app.world().get::<Transform>(agent).unwrap().translation;
	let local = to_local(&deck, location);
	assert!(horizontal(local - goal_local).length() < 1.0);
}

#[test]
fn request_at_goal_stops_walking() {
	let (mut app, _, agent) = app_with_agent(Vec3::new(-4.5, 0.9, -4.5));
	app.world_mut()
		.send_event(EventMoveRequest::new(agent, Vec3::new(4.5, 0.9, 4.5), 0.2, 2.0));
	assert!(step(&mut app).is_empty());
	let here = app.world().get::<Transform>(agent).unwrap().translation;
	app.world_mut()
		.send_event(EventMoveRequest::new(agent, here, 0.2, 2.0));
	let finished = step(&mut app);
	assert_eq!(
		vec![
			EventMoveFinished {
				agent,
				result: MoveResult::AlreadyAtGoal
			},
			EventMoveFinished {
				agent,
				result: MoveResult::Cancelled
			},
		],
		finished
	);
	assert!(app
		.world()
		.resource::<PlatformNavigation>()
		.active_moves()
		.is_empty());
	step(&mut app);
	assert_eq!(here, app.world().get::<Transform>(agent).unwrap().translation);
}
