//! A [PhysicsProbe] that needs no physics engine. Agents are treated as
//! spheres and platforms as the baked surface of their grids
//!

use crate::prelude::*;
use bevy::prelude::*;
use std::sync::Arc;

/// Point-in-time view of agent spheres and platform decks
#[derive(Clone, Default)]
pub struct DeckProbe {
	/// `(agent, centre, radius)`
	agents: Vec<(Entity, Vec3, f32)>,
	/// World transform and grid of every platform with a built grid
	decks: Vec<(Transform, Arc<NavGrid>)>,
}

impl DeckProbe {
	/// Capture the agents and the bound platforms as they are now
	pub fn snapshot(
		agents: impl Iterator<Item = (Entity, Vec3, f32)>,
		bindings: &[PlatformBinding<Entity>],
	) -> Self {
		DeckProbe {
			agents: agents.collect(),
			decks: bindings
				.iter()
				.filter_map(|b| b.get_grid().map(|g| (*b.get_transform(), g.clone())))
				.collect(),
		}
	}
}

impl PhysicsProbe<Entity> for DeckProbe {
	fn sweep_sphere(
		&self,
		origin: Vec3,
		direction: Vec3,
		distance: f32,
		radius: f32,
		exclude: Entity,
	) -> Vec<ProbeHit<Entity>> {
		let direction = direction.normalize_or_zero();
		let mut hits: Vec<(f32, ProbeHit<Entity>)> = self
			.agents
			.iter()
			.filter(|(entity, _, _)| *entity != exclude)
			.filter_map(|(entity, centre, agent_radius)| {
				// closest approach of the swept centre line to the sphere
				let along = (*centre - origin).dot(direction).clamp(0.0, distance);
				let closest = origin + direction * along;
				if closest.distance(*centre) <= radius + agent_radius {
					Some((
						along,
						ProbeHit {
							location: closest,
							agent: Some(*entity),
						},
					))
				} else {
					None
				}
			})
			.collect();
		hits.sort_by(|a, b| a.0.total_cmp(&b.0));
		hits.into_iter().map(|(_, hit)| hit).collect()
	}
	/// Only decks are hit, agents never block a ray so every [RayFilter] is
	/// satisfied
	fn raycast(&self, start: Vec3, end: Vec3, _filter: RayFilter<Entity>) -> Option<ProbeHit<Entity>> {
		let mut closest: Option<(f32, Vec3)> = None;
		for (transform, grid) in self.decks.iter() {
			let local_start = to_local(transform, start);
			let local_end = to_local(transform, end);
			let drop = local_start.y - local_end.y;
			if drop.abs() <= f32::EPSILON {
				continue;
			}
			let top = if drop > 0.0 { local_start } else { local_end };
			let Some(height) = grid.surface_below(top) else {
				continue;
			};
			let t = (local_start.y - height) / drop;
			if !(0.0..=1.0).contains(&t) {
				continue;
			}
			let location = to_world(transform, local_start.lerp(local_end, t));
			let range = location.distance(start);
			if closest.is_none_or(|(best, _)| range < best) {
				closest = Some((range, location));
			}
		}
		closest.map(|(_, location)| ProbeHit {
			location,
			agent: None,
		})
	}
}
