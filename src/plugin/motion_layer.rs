//! Logic relating to moving [NavAgent]s, requests and cancellations arrive as
//! events and every finished move is published as an [EventMoveFinished]
//!

use crate::prelude::*;
use bevy::prelude::*;

/// An agent that can be moved across a [NavPlatform].
///
/// The agent's `Transform` is read and written as its world-space pose, so
/// the entity must be a root entity. Do not parent agents to the platform
/// they stand on, the controller already carries them with the platform
#[derive(Component, Clone, Copy, Debug, Reflect)]
#[require(Transform)]
pub struct NavAgent {
	/// Physical radius of the agent
	radius: f32,
	/// Distance from the agent's centre to its feet
	half_height: f32,
	/// `true` while a move is driving the agent, physics should treat it as
	/// query-only
	driven: bool,
}

impl NavAgent {
	/// Create a new instance of [NavAgent]
	pub fn new(radius: f32, half_height: f32) -> Self {
		NavAgent {
			radius,
			half_height,
			driven: false,
		}
	}
	pub fn get_radius(&self) -> f32 {
		self.radius
	}
	pub fn get_half_height(&self) -> f32 {
		self.half_height
	}
	pub fn is_driven(&self) -> bool {
		self.driven
	}
}

/// World-space velocity of a moving [NavAgent], zero when it is not moving
#[derive(Component, Clone, Copy, Debug, Default, Deref, DerefMut, Reflect)]
pub struct AgentVelocity(pub Vec3);

/// Ask for an agent to walk to a world-space goal
#[derive(Event, Clone, Copy, Debug)]
pub struct EventMoveRequest {
	/// The agent to move
	agent: Entity,
	/// World-space destination
	goal: Vec3,
	/// How close to the end of the route counts as arrived
	acceptance_radius: f32,
	/// Travel speed
	speed: f32,
}

impl EventMoveRequest {
	/// Create a new instance of [EventMoveRequest]
	pub fn new(agent: Entity, goal: Vec3, acceptance_radius: f32, speed: f32) -> Self {
		EventMoveRequest {
			agent,
			goal,
			acceptance_radius,
			speed,
		}
	}
	pub fn get_agent(&self) -> Entity {
		self.agent
	}
	pub fn get_goal(&self) -> Vec3 {
		self.goal
	}
}

/// Stop an agent's move
#[derive(Event, Clone, Copy, Debug)]
pub struct EventCancelMove(pub Entity);

/// An agent's move ended
#[derive(Event, Clone, Copy, Debug, PartialEq)]
pub struct EventMoveFinished {
	pub agent: Entity,
	pub result: MoveResult,
}

impl From<MoveCompletion<Entity>> for EventMoveFinished {
	fn from(completion: MoveCompletion<Entity>) -> Self {
		EventMoveFinished {
			agent: completion.agent,
			result: completion.result,
		}
	}
}

/// Components read and written while driving agents
pub type AgentQueryData = (
	Entity,
	&'static mut Transform,
	&'static mut NavAgent,
	Option<&'static mut AgentVelocity>,
);

/// [AgentHost] over the agents of a [Query], each agent's `Transform` is
/// its world-space pose
pub struct EcsAgentHost<'a, 'w, 's> {
	/// The agents available to move
	agents: &'a mut Query<'w, 's, AgentQueryData>,
}

impl<'a, 'w, 's> EcsAgentHost<'a, 'w, 's> {
	/// Create a new instance of [EcsAgentHost]
	pub fn new(agents: &'a mut Query<'w, 's, AgentQueryData>) -> Self {
		EcsAgentHost { agents }
	}
}

impl AgentHost<Entity> for EcsAgentHost<'_, '_, '_> {
	fn body(&self, agent: Entity) -> Option<AgentBody> {
		let (_, transform, nav_agent, _) = self.agents.get(agent).ok()?;
		Some(AgentBody {
			location: transform.translation,
			rotation: transform.rotation,
			radius: nav_agent.radius,
			half_height: nav_agent.half_height,
		})
	}
	fn set_location(&mut self, agent: Entity, location: Vec3) {
		if let Ok((_, mut transform, _, _)) = self.agents.get_mut(agent) {
			transform.translation = location;
		}
	}
	fn set_rotation(&mut self, agent: Entity, rotation: Quat) {
		if let Ok((_, mut transform, _, _)) = self.agents.get_mut(agent) {
			transform.rotation = rotation;
		}
	}
	fn set_velocity(&mut self, agent: Entity, velocity: Vec3) {
		if let Ok((_, _, _, Some(mut agent_velocity))) = self.agents.get_mut(agent) {
			agent_velocity.0 = velocity;
		}
	}
	fn set_driven(&mut self, agent: Entity, driven: bool) {
		if let Ok((_, _, mut nav_agent, _)) = self.agents.get_mut(agent) {
			if nav_agent.driven != driven {
				nav_agent.driven = driven;
			}
		}
	}
}

/// Snapshot the agents and decks for probing
fn probe_world(agents: &Query<AgentQueryData>, nav: &PlatformNavigation) -> DeckProbe {
	DeckProbe::snapshot(
		agents
			.iter()
			.map(|(entity, transform, agent, _)| (entity, transform.translation, agent.radius)),
		nav.bindings(),
	)
}

/// Read [EventMoveRequest] and plan each move, requests that finish
/// immediately are published as [EventMoveFinished]
#[cfg(not(tarpaulin_include))]
pub fn process_move_requests(
	mut events: EventReader<EventMoveRequest>,
	mut nav: ResMut<PlatformNavigation>,
	mut agents: Query<AgentQueryData>,
	mut event_finished: EventWriter<EventMoveFinished>,
) {
	if events.is_empty() {
		return;
	}
	let probe = probe_world(&agents, &nav);
	for event in events.read() {
		let mut host = EcsAgentHost::new(&mut agents);
		let status = nav.request_move(
			&mut host,
			&probe,
			event.agent,
			event.goal,
			event.acceptance_radius,
			event.speed,
			None,
		);
		if let MoveRequestStatus::Finished(result) = status {
			event_finished.write(EventMoveFinished {
				agent: event.agent,
				result,
			});
		}
	}
}

/// Read [EventCancelMove] and stop the agents' moves
#[cfg(not(tarpaulin_include))]
pub fn process_cancel_events(
	mut events: EventReader<EventCancelMove>,
	mut nav: ResMut<PlatformNavigation>,
	mut agents: Query<AgentQueryData>,
	mut event_finished: EventWriter<EventMoveFinished>,
) {
	for event in events.read() {
		let mut host = EcsAgentHost::new(&mut agents);
		if let Some(completion) = nav.cancel_move(&mut host, event.0) {
			event_finished.write(EventMoveFinished::from(completion));
		}
	}
}

/// Step every active move by the frame time
#[cfg(not(tarpaulin_include))]
pub fn advance_moves(
	time: Res<Time>,
	mut nav: ResMut<PlatformNavigation>,
	mut agents: Query<AgentQueryData>,
	mut event_finished: EventWriter<EventMoveFinished>,
) {
	if nav.active_moves().is_empty() && !nav.has_superseded() {
		return;
	}
	let probe = probe_world(&agents, &nav);
	let mut host = EcsAgentHost::new(&mut agents);
	for completion in nav.advance(time.delta_secs(), &mut host, &probe) {
		event_finished.write(EventMoveFinished::from(completion));
	}
}
