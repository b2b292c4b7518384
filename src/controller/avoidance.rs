//! Keeping agents from walking through one another. An agent probes ahead of
//! itself each step, when another agent is in the way it first tries to
//! sidestep and re-plan back to its goal (a detour). If that is not possible
//! it freezes in place until the way clears or it has waited long enough to
//! force a retry
//!

use super::build_route;
use crate::prelude::*;
use bevy::prelude::*;
use std::fmt::Debug;

/// What happened when a detour was considered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetourOutcome {
	/// Nothing is in the way
	Clear,
	/// The move now follows a new route around the obstruction
	Detoured,
	/// Something is in the way but no detour could be planned
	Rejected,
}

/// Whether a sphere swept forward from the agent touches another agent.
/// Scenery never counts as an obstruction
pub fn obstructed<Id: Copy + PartialEq>(
	probe: &impl PhysicsProbe<Id>,
	body: &AgentBody,
	agent: Id,
	distance: f32,
	radius: f32,
) -> bool {
	probe
		.sweep_sphere(body.location, body.forward(), distance, radius, agent)
		.iter()
		.any(|hit| matches!(hit.agent, Some(other) if other != agent))
}

/// Attempt to step sideways around an agent blocking the way and plan a new
/// route from there to the move's goal
pub fn try_detour<Id: Copy + PartialEq + Debug>(
	settings: &NavigationSettings,
	grid: &NavGrid,
	platform: &Transform,
	active: &mut ActiveMove<Id>,
	body: &AgentBody,
	probe: &impl PhysicsProbe<Id>,
) -> DetourOutcome {
	let radius = body.radius;
	if !obstructed(
		probe,
		body,
		active.agent,
		radius * settings.detour_probe_distance_factor,
		radius * settings.detour_probe_radius_factor,
	) {
		return DetourOutcome::Clear;
	}
	let agent_local = to_local(platform, body.location);
	let side = body.right() * settings.avoidance_side.sign();
	let mut avoid_local = to_local(
		platform,
		body.location + side * radius * settings.detour_offset_factor,
	);
	avoid_local.y = agent_local.y;

	let half_extent = grid.get_half_extent();
	if !within_horizontal_extent(avoid_local, half_extent)
		|| !within_horizontal_extent(active.goal_local, half_extent)
	{
		debug!("Detour for agent {:?} would leave the platform", active.agent);
		return DetourOutcome::Rejected;
	}
	let Ok(path) = find_world_path(
		grid,
		platform,
		to_world(platform, avoid_local),
		to_world(platform, active.goal_local),
	) else {
		return DetourOutcome::Rejected;
	};
	let waypoints: Vec<Vec3> = path
		.iter()
		.map(|p| {
			let local = to_local(platform, *p);
			Vec3::new(local.x, agent_local.y, local.z)
		})
		.collect();
	let Some(route) = build_route(
		settings,
		grid,
		platform,
		avoid_local,
		&waypoints,
		body,
		radius * settings.detour_margin_factor,
		probe,
	) else {
		return DetourOutcome::Rejected;
	};
	debug!(
		"Agent {:?} detouring via {:?}, {} points",
		active.agent,
		avoid_local,
		route.points().len()
	);
	active.route = route;
	active.progress = 0.0;
	active.avoidance_cooldown = settings.avoidance_cooldown;
	active.freeze_timer = 0.0;
	active.state = MoveState::Following;
	DetourOutcome::Detoured
}

/// Whether the agent should hold position this step. Time spent blocked is
/// accumulated and once it reaches the timeout the agent is released to try
/// again
pub fn freeze_check<Id: Copy + PartialEq + Debug>(
	settings: &NavigationSettings,
	active: &mut ActiveMove<Id>,
	body: &AgentBody,
	probe: &impl PhysicsProbe<Id>,
	delta: f32,
) -> bool {
	let blocked = obstructed(
		probe,
		body,
		active.agent,
		body.radius * settings.freeze_probe_distance_factor,
		body.radius * settings.freeze_probe_radius_factor,
	);
	if !blocked {
		active.freeze_timer = 0.0;
		return false;
	}
	active.freeze_timer += delta;
	if active.freeze_timer >= settings.freeze_timeout {
		debug!("Agent {:?} freeze timed out, retrying", active.agent);
		active.freeze_timer = 0.0;
		return false;
	}
	true
}
