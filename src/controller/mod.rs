//! The [MotionController] owns the registry of platforms and their grids
//! together with every move in flight. A move is planned synchronously when
//! it is requested and from then on is advanced once per simulation step by
//! [MotionController::advance].
//!
//! A move's life looks like:
//!
//! ```text
//!  request --plan--> Following <--------> Frozen
//!     |                  |    (obstruction)   |
//!     |                  v                    v
//!     +--failure--> Finished(result) <---cancel/vanish
//! ```
//!
//! Each move reports its [MoveResult] exactly once, through its callback and
//! through the list of completions returned by the step that finished it
//!

pub mod agent;
pub mod avoidance;
pub mod settings;

use crate::prelude::*;
use bevy::prelude::*;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// How a move ended, handed to the move's callback
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect)]
pub enum MoveResult {
	/// The agent arrived within the acceptance radius of its goal
	Success,
	/// The agent was already within the acceptance radius when asked to move
	AlreadyAtGoal,
	/// The agent is not standing within any known platform
	NoPlatform,
	/// No route could be found across the platform's grid
	NoPath,
	/// The agent's platform has no built grid
	RuntimeNavMissing,
	/// The agent does not exist
	InvalidController,
	/// The move parameters or the route built from the path were unusable
	MoveRequest,
	/// The move was cancelled, superseded, or lost its agent or platform
	Cancelled,
}

/// Reasons a move request is refused
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MoveError {
	#[error("agent does not exist")]
	InvalidController,
	#[error("agent is not within any known platform")]
	NoPlatform,
	#[error("platform has no built navigation grid")]
	RuntimeNavMissing,
	#[error("no path to goal: {0}")]
	NoPath(#[from] PathError),
	#[error("route could not be built from the path")]
	RouteUnavailable,
	#[error("speed {speed} and acceptance radius {acceptance_radius} must be finite, speed above zero")]
	InvalidParameters {
		/// Speed requested
		speed: f32,
		/// Acceptance radius requested
		acceptance_radius: f32,
	},
}

impl From<MoveError> for MoveResult {
	fn from(error: MoveError) -> Self {
		match error {
			MoveError::InvalidController => MoveResult::InvalidController,
			MoveError::NoPlatform => MoveResult::NoPlatform,
			MoveError::RuntimeNavMissing => MoveResult::RuntimeNavMissing,
			MoveError::NoPath(_) => MoveResult::NoPath,
			MoveError::RouteUnavailable | MoveError::InvalidParameters { .. } => {
				MoveResult::MoveRequest
			}
		}
	}
}

/// Invoked once with the result of a move
pub type MoveCallback = Box<dyn FnOnce(MoveResult) + Send + Sync>;

/// Immediate outcome of [MotionController::request_move]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveRequestStatus {
	/// The move is now active and will report later
	InProgress,
	/// The request finished straight away, the callback has already fired
	Finished(MoveResult),
}

/// A move that ended during a call into the controller
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveCompletion<Id> {
	pub agent: Id,
	pub result: MoveResult,
}

/// Whether a move is progressing or held by an obstruction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
pub enum MoveState {
	#[default]
	Following,
	Frozen,
}

/// A platform known to the controller with its grid and latest transform
#[derive(Clone, Debug)]
pub struct PlatformBinding<Id> {
	/// Identity of the platform
	id: Id,
	/// World transform of the platform
	transform: Transform,
	/// Half-size of the navigation volume, decides which agents stand within
	/// the platform
	half_extent: Vec3,
	/// [None] when the platform's grid failed to build
	grid: Option<Arc<NavGrid>>,
}

impl<Id: Copy> PlatformBinding<Id> {
	/// Create a new instance of [PlatformBinding]
	pub fn new(id: Id, transform: Transform, half_extent: Vec3, grid: Option<Arc<NavGrid>>) -> Self {
		PlatformBinding {
			id,
			transform,
			half_extent,
			grid,
		}
	}
	/// Bind a platform whose volume matches its grid
	pub fn with_grid(id: Id, transform: Transform, grid: Arc<NavGrid>) -> Self {
		let half_extent = grid.get_half_extent();
		PlatformBinding::new(id, transform, half_extent, Some(grid))
	}
	pub fn get_id(&self) -> Id {
		self.id
	}
	pub fn get_transform(&self) -> &Transform {
		&self.transform
	}
	pub fn get_half_extent(&self) -> Vec3 {
		self.half_extent
	}
	pub fn get_grid(&self) -> Option<&Arc<NavGrid>> {
		self.grid.as_ref()
	}
	/// Whether a world-space point lies within the platform's volume
	pub fn contains(&self, world: Vec3) -> bool {
		within_extent(to_local(&self.transform, world), self.half_extent)
	}
}

/// An agent travelling along a route across a platform
pub struct ActiveMove<Id> {
	/// The agent being moved
	agent: Id,
	/// The platform the agent is moving within
	platform: Id,
	/// Local-space polyline being followed
	route: Route,
	/// Distance travelled along `route`
	progress: f32,
	/// Travel speed along the route
	speed: f32,
	/// Distance short of the route's end that counts as arrived
	acceptance_radius: f32,
	/// Goal in the platform's local space, detours are planned back to it
	goal_local: Vec3,
	/// Time remaining before another detour may be attempted
	avoidance_cooldown: f32,
	/// Time spent frozen against the current obstruction
	freeze_timer: f32,
	/// Whether the move is progressing
	state: MoveState,
	/// Fires once when the move finishes
	on_complete: Option<MoveCallback>,
}

impl<Id: Copy + Debug> ActiveMove<Id> {
	pub fn get_agent(&self) -> Id {
		self.agent
	}
	pub fn get_platform(&self) -> Id {
		self.platform
	}
	pub fn get_route(&self) -> &Route {
		&self.route
	}
	pub fn get_progress(&self) -> f32 {
		self.progress
	}
	pub fn get_speed(&self) -> f32 {
		self.speed
	}
	pub fn get_acceptance_radius(&self) -> f32 {
		self.acceptance_radius
	}
	pub fn get_goal_local(&self) -> Vec3 {
		self.goal_local
	}
	pub fn get_avoidance_cooldown(&self) -> f32 {
		self.avoidance_cooldown
	}
	pub fn get_freeze_timer(&self) -> f32 {
		self.freeze_timer
	}
	pub fn get_state(&self) -> MoveState {
		self.state
	}
	/// Fire the callback and produce the completion record
	fn finish(mut self, result: MoveResult) -> MoveCompletion<Id> {
		debug!("Move of agent {:?} finished with {:?}", self.agent, result);
		if let Some(callback) = self.on_complete.take() {
			callback(result);
		}
		MoveCompletion {
			agent: self.agent,
			result,
		}
	}
}

/// Registry of platforms and the moves running across them
pub struct MotionController<Id> {
	/// Tuning shared by every move
	settings: NavigationSettings,
	/// Known platforms, at most one per platform id
	bindings: Vec<PlatformBinding<Id>>,
	/// Moves in flight, at most one per agent
	moves: Vec<ActiveMove<Id>>,
	/// Moves superseded by a newer request, reported on the next advance
	superseded: Vec<MoveCompletion<Id>>,
}

impl<Id: Copy + PartialEq + Debug> Default for MotionController<Id> {
	fn default() -> Self {
		MotionController::new(NavigationSettings::default())
	}
}

impl<Id: Copy + PartialEq + Debug> MotionController<Id> {
	/// Create a new instance of [MotionController]
	pub fn new(settings: NavigationSettings) -> Self {
		MotionController {
			settings,
			bindings: Vec::new(),
			moves: Vec::new(),
			superseded: Vec::new(),
		}
	}
	pub fn get_settings(&self) -> &NavigationSettings {
		&self.settings
	}
	pub fn set_settings(&mut self, settings: NavigationSettings) {
		self.settings = settings;
	}
	/// Register a platform. Binding a platform or a grid that is already
	/// registered does nothing and returns `false`
	pub fn bind(&mut self, binding: PlatformBinding<Id>) -> bool {
		let duplicate = self.bindings.iter().any(|existing| {
			existing.id == binding.id
				|| matches!(
					(&existing.grid, &binding.grid),
					(Some(a), Some(b)) if Arc::ptr_eq(a, b)
				)
		});
		if duplicate {
			debug!("Platform {:?} already bound", binding.id);
			return false;
		}
		debug!("Bound platform {:?}, has grid: {}", binding.id, binding.grid.is_some());
		self.bindings.push(binding);
		true
	}
	/// Forget a platform, every move across it is cancelled
	pub fn unbind(
		&mut self,
		host: &mut impl AgentHost<Id>,
		platform: Id,
	) -> Vec<MoveCompletion<Id>> {
		let Some(position) = self.bindings.iter().position(|b| b.id == platform) else {
			return Vec::new();
		};
		self.bindings.remove(position);
		debug!("Unbound platform {:?}", platform);
		let mut completed = Vec::new();
		for i in (0..self.moves.len()).rev() {
			if self.moves[i].platform == platform {
				let active = self.moves.remove(i);
				release(host, active.agent);
				completed.push(active.finish(MoveResult::Cancelled));
			}
		}
		completed
	}
	/// Record where a platform now is in the world, `false` if it is unknown
	pub fn update_platform_transform(&mut self, platform: Id, transform: Transform) -> bool {
		match self.bindings.iter_mut().find(|b| b.id == platform) {
			Some(binding) => {
				binding.transform = transform;
				true
			}
			None => false,
		}
	}
	pub fn bindings(&self) -> &[PlatformBinding<Id>] {
		&self.bindings
	}
	/// Ids of every known platform
	pub fn list_platforms(&self) -> Vec<Id> {
		self.bindings.iter().map(|b| b.id).collect()
	}
	/// First platform whose volume contains the world-space point
	pub fn platform_at(&self, location: Vec3) -> Option<&PlatformBinding<Id>> {
		self.bindings.iter().find(|b| b.contains(location))
	}
	/// The platform an agent is standing within
	pub fn platform_of(&self, host: &impl AgentHost<Id>, agent: Id) -> Option<Id> {
		let body = host.body(agent)?;
		self.platform_at(body.location).map(|b| b.id)
	}
	pub fn is_agent_on_any_platform(&self, host: &impl AgentHost<Id>, agent: Id) -> bool {
		self.platform_of(host, agent).is_some()
	}
	pub fn active_moves(&self) -> &[ActiveMove<Id>] {
		&self.moves
	}
	pub fn active_move(&self, agent: Id) -> Option<&ActiveMove<Id>> {
		self.moves.iter().find(|m| m.agent == agent)
	}
	/// Whether replaced moves are waiting to be returned by the next
	/// [MotionController::advance]
	pub fn has_superseded(&self) -> bool {
		!self.superseded.is_empty()
	}
	/// Ask for `agent` to walk to the world-space `goal` at `speed`, arriving
	/// once it is within `acceptance_radius` of the route's end.
	///
	/// The route is planned immediately. If planning fails, or the agent is
	/// already at the goal, the callback fires before this returns. A
	/// successful request, or one finding the agent already at its goal,
	/// replaces any move the agent already had, which then reports
	/// [MoveResult::Cancelled]
	#[allow(clippy::too_many_arguments)]
	pub fn request_move(
		&mut self,
		host: &mut impl AgentHost<Id>,
		probe: &impl PhysicsProbe<Id>,
		agent: Id,
		goal: Vec3,
		acceptance_radius: f32,
		speed: f32,
		on_complete: Option<MoveCallback>,
	) -> MoveRequestStatus {
		let result = match self.plan_move(&*host, probe, agent, goal, acceptance_radius, speed) {
			Ok(Some(mut active)) => {
				if let Some(position) = self.moves.iter().position(|m| m.agent == agent) {
					let previous = self.moves.remove(position);
					self.superseded.push(previous.finish(MoveResult::Cancelled));
				}
				debug!(
					"Agent {:?} moving to {:?} across platform {:?}, route of {} points",
					agent,
					goal,
					active.platform,
					active.route.points().len()
				);
				active.on_complete = on_complete;
				host.set_driven(agent, true);
				self.moves.push(active);
				return MoveRequestStatus::InProgress;
			}
			Ok(None) => {
				// the agent stops where it is rather than carrying on to an
				// older goal
				if let Some(position) = self.moves.iter().position(|m| m.agent == agent) {
					let previous = self.moves.remove(position);
					release(host, agent);
					self.superseded.push(previous.finish(MoveResult::Cancelled));
				}
				MoveResult::AlreadyAtGoal
			}
			Err(e) => {
				debug!("Move request for agent {:?} refused: {}", agent, e);
				MoveResult::from(e)
			}
		};
		if let Some(callback) = on_complete {
			callback(result);
		}
		MoveRequestStatus::Finished(result)
	}
	/// Plan a move, [None] when the agent is already at the goal
	fn plan_move(
		&self,
		host: &impl AgentHost<Id>,
		probe: &impl PhysicsProbe<Id>,
		agent: Id,
		goal: Vec3,
		acceptance_radius: f32,
		speed: f32,
	) -> Result<Option<ActiveMove<Id>>, MoveError> {
		let body = host.body(agent).ok_or(MoveError::InvalidController)?;
		let binding = self.platform_at(body.location).ok_or(MoveError::NoPlatform)?;
		let grid = binding.grid.as_ref().ok_or(MoveError::RuntimeNavMissing)?;
		if !(speed.is_finite() && speed > 0.0 && acceptance_radius.is_finite() && acceptance_radius >= 0.0)
		{
			return Err(MoveError::InvalidParameters {
				speed,
				acceptance_radius,
			});
		}
		let platform = &binding.transform;
		let agent_local = to_local(platform, body.location);
		let goal_local = to_local(platform, goal);
		if horizontal(goal_local - agent_local).length() <= acceptance_radius {
			return Ok(None);
		}
		let path = find_world_path(grid, platform, body.location, goal)?;
		let waypoints: Vec<Vec3> = path
			.iter()
			.map(|p| {
				let local = to_local(platform, *p);
				Vec3::new(local.x, agent_local.y, local.z)
			})
			.collect();
		let margin = body.radius * self.settings.safety_margin_factor;
		let route = build_route(
			&self.settings,
			grid,
			platform,
			agent_local,
			&waypoints,
			&body,
			margin,
			probe,
		)
		.ok_or(MoveError::RouteUnavailable)?;
		Ok(Some(ActiveMove {
			agent,
			platform: binding.id,
			route,
			progress: 0.0,
			speed,
			acceptance_radius,
			goal_local,
			avoidance_cooldown: 0.0,
			freeze_timer: 0.0,
			state: MoveState::Following,
			on_complete: None,
		}))
	}
	/// Stop an agent's move, reporting [MoveResult::Cancelled]
	pub fn cancel_move(
		&mut self,
		host: &mut impl AgentHost<Id>,
		agent: Id,
	) -> Option<MoveCompletion<Id>> {
		let position = self.moves.iter().position(|m| m.agent == agent)?;
		let active = self.moves.remove(position);
		release(host, agent);
		Some(active.finish(MoveResult::Cancelled))
	}
	/// Step every move forward by `delta` seconds, returning the moves that
	/// finished
	pub fn advance(
		&mut self,
		delta: f32,
		host: &mut impl AgentHost<Id>,
		probe: &impl PhysicsProbe<Id>,
	) -> Vec<MoveCompletion<Id>> {
		let mut completed = std::mem::take(&mut self.superseded);
		// reverse so removal never skips a move
		for i in (0..self.moves.len()).rev() {
			let finished = step_move(
				&self.settings,
				&self.bindings,
				&mut self.moves[i],
				delta,
				host,
				probe,
			);
			if let Some(result) = finished {
				let active = self.moves.remove(i);
				release(host, active.agent);
				completed.push(active.finish(result));
			}
		}
		completed
	}
}

/// Hand an agent back to normal collision and stop it
fn release<Id: Copy>(host: &mut impl AgentHost<Id>, agent: Id) {
	host.set_driven(agent, false);
	host.set_velocity(agent, Vec3::ZERO);
}

/// Lay a route onto a platform starting at `start_local` then visiting each
/// of `waypoints`. Every point is kept `margin` inside the grid horizontally.
/// The start and the first few waypoints sit on the live surface, the rest
/// keep the height they were given
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_route<Id: Copy>(
	settings: &NavigationSettings,
	grid: &NavGrid,
	platform: &Transform,
	start_local: Vec3,
	waypoints: &[Vec3],
	body: &AgentBody,
	margin: f32,
	probe: &impl PhysicsProbe<Id>,
) -> Option<Route> {
	let half_extent = grid.get_half_extent();
	let probe_distance = grid.get_cell_height() * settings.surface_probe_factor;
	let inset = |p: Vec3| {
		Vec3::new(
			clamp_with_margin(p.x, half_extent.x, margin),
			p.y,
			clamp_with_margin(p.z, half_extent.z, margin),
		)
	};
	let on_surface = |p: Vec3| {
		let height = true_surface_height(grid, platform, p, probe, probe_distance);
		Vec3::new(p.x, height + body.half_height, p.z)
	};
	let mut points = Vec::with_capacity(waypoints.len() + 1);
	points.push(on_surface(inset(start_local)));
	for (i, waypoint) in waypoints.iter().enumerate() {
		let point = inset(*waypoint);
		if i < settings.surface_snap_points {
			points.push(on_surface(point));
		} else {
			points.push(point);
		}
	}
	Route::new(points)
}

/// Progress one move by a step, the result is [Some] once the move is over
fn step_move<Id: Copy + PartialEq + Debug>(
	settings: &NavigationSettings,
	bindings: &[PlatformBinding<Id>],
	active: &mut ActiveMove<Id>,
	delta: f32,
	host: &mut impl AgentHost<Id>,
	probe: &impl PhysicsProbe<Id>,
) -> Option<MoveResult> {
	let Some(body) = host.body(active.agent) else {
		debug!("Agent {:?} vanished mid-move", active.agent);
		return Some(MoveResult::Cancelled);
	};
	let Some((platform, grid)) = bindings
		.iter()
		.find(|b| b.id == active.platform)
		.and_then(|b| b.grid.as_ref().map(|g| (b.transform, g)))
	else {
		debug!("Platform {:?} vanished mid-move", active.platform);
		return Some(MoveResult::Cancelled);
	};
	host.set_driven(active.agent, true);

	let held = if active.avoidance_cooldown <= 0.0 {
		match avoidance::try_detour(settings, grid, &platform, active, &body, probe) {
			DetourOutcome::Clear => {
				active.freeze_timer = 0.0;
				false
			}
			DetourOutcome::Detoured => false,
			DetourOutcome::Rejected => avoidance::freeze_check(settings, active, &body, probe, delta),
		}
	} else if avoidance::freeze_check(settings, active, &body, probe, delta) {
		active.avoidance_cooldown = (active.avoidance_cooldown - delta).max(0.0);
		true
	} else {
		active.avoidance_cooldown = 0.0;
		false
	};

	if held {
		if active.state != MoveState::Frozen {
			debug!("Agent {:?} frozen by an obstruction", active.agent);
		}
		active.state = MoveState::Frozen;
		let location = ground_correct(settings, &body, body.location, active.agent, probe);
		host.set_location(active.agent, location);
		host.set_velocity(active.agent, Vec3::ZERO);
		return None;
	}
	active.state = MoveState::Following;

	active.progress += active.speed * delta;
	let target = to_world(&platform, active.route.location_at(active.progress));
	let desired = Vec3::new(target.x, body.location.y, target.z);
	let moved = interp_to(body.location, desired, delta, settings.move_interp_speed);
	let location = ground_correct(settings, &body, moved, active.agent, probe);
	host.set_location(active.agent, location);
	let tangent = active.route.tangent_at(active.progress);
	host.set_velocity(active.agent, platform.rotation * tangent * active.speed);

	let travelled = horizontal(location - body.location);
	if travelled.length() > settings.rotation_threshold {
		if let Some(heading) = heading_rotation(travelled) {
			let rotation = interp_rotation_to(
				body.rotation,
				heading,
				delta,
				settings.rotation_interp_speed,
			);
			host.set_rotation(active.agent, rotation);
			host.set_aim(active.agent, rotation);
		}
	}

	if active.progress >= active.route.length() - active.acceptance_radius {
		return Some(MoveResult::Success);
	}
	None
}

/// Drop or lift `location` onto the surface beneath the agent, unchanged if
/// nothing is found
fn ground_correct<Id: Copy>(
	settings: &NavigationSettings,
	body: &AgentBody,
	location: Vec3,
	agent: Id,
	probe: &impl PhysicsProbe<Id>,
) -> Vec3 {
	let start = location + Vec3::Y * body.half_height * settings.ground_probe_above_factor;
	let end = location - Vec3::Y * body.half_height * settings.ground_probe_below_factor;
	match probe.raycast(start, end, RayFilter::ExcludeAgent(agent)) {
		Some(hit) => Vec3::new(location.x, hit.location.y + body.half_height, location.z),
		None => location,
	}
}
