//! The contracts the [crate::prelude::MotionController] relies on to read and
//! drive agents and to probe the physical world around them
//!

use bevy::prelude::*;

/// Snapshot of an agent taken at the start of a move step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentBody {
	/// World-space position of the agent's centre
	pub location: Vec3,
	/// World-space orientation, forward is `-z`
	pub rotation: Quat,
	/// Physical radius of the agent's collision shape
	pub radius: f32,
	/// Distance from the agent's centre to its feet
	pub half_height: f32,
}

impl AgentBody {
	/// World-space facing direction
	pub fn forward(&self) -> Vec3 {
		self.rotation * Vec3::NEG_Z
	}
	/// World-space direction to the agent's right
	pub fn right(&self) -> Vec3 {
		self.rotation * Vec3::X
	}
}

/// Read and write access to the agents a controller moves, keyed by `Id`
pub trait AgentHost<Id> {
	/// Current state of an agent, [None] when it no longer exists
	fn body(&self, agent: Id) -> Option<AgentBody>;
	/// Place the agent at a world-space location
	fn set_location(&mut self, agent: Id, location: Vec3);
	/// Orient the agent
	fn set_rotation(&mut self, agent: Id, rotation: Quat);
	/// Orient whatever aims on behalf of the agent, when that is distinct
	/// from the agent itself
	fn set_aim(&mut self, _agent: Id, _rotation: Quat) {}
	/// Velocity reported to downstream consumers such as animation
	fn set_velocity(&mut self, agent: Id, velocity: Vec3);
	/// `true` while the controller is moving the agent, collision should
	/// then be query-only. `false` restores normal collision
	fn set_driven(&mut self, agent: Id, driven: bool);
}

/// Result of a probe against the world
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeHit<Id> {
	/// World-space point of contact
	pub location: Vec3,
	/// The agent that was hit, [None] for static scenery
	pub agent: Option<Id>,
}

/// Which agents a raycast ignores
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RayFilter<Id> {
	/// Ignore a single agent
	ExcludeAgent(Id),
	/// Ignore every agent, only scenery is hit
	ExcludeAllAgents,
}

/// Synchronous collision queries against the world
pub trait PhysicsProbe<Id> {
	/// Sweep a sphere of `radius` from `origin` along `direction` for
	/// `distance`, reporting everything touched apart from `exclude`
	fn sweep_sphere(
		&self,
		origin: Vec3,
		direction: Vec3,
		distance: f32,
		radius: f32,
		exclude: Id,
	) -> Vec<ProbeHit<Id>>;
	/// Closest hit along the segment `start` to `end`
	fn raycast(&self, start: Vec3, end: Vec3, filter: RayFilter<Id>) -> Option<ProbeHit<Id>>;
}
