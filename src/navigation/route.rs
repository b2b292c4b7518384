//! A [Route] is the piecewise-linear polyline an agent follows across a
//! platform, expressed in the platform's local space and parameterised by
//! the distance travelled along it
//!

use bevy::prelude::*;

/// Local-space polyline with cumulative arc length at each point
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct Route {
	/// Ordered local-space points
	points: Vec<Vec3>,
	/// Distance along the route at which each point is reached
	cumulative: Vec<f32>,
}

impl Route {
	/// Build a route through `points`. [None] if there are no points or any
	/// of them is not finite
	pub fn new(points: Vec<Vec3>) -> Option<Self> {
		if points.is_empty() || points.iter().any(|p| !p.is_finite()) {
			return None;
		}
		let mut cumulative = Vec::with_capacity(points.len());
		let mut total = 0.0;
		cumulative.push(total);
		for pair in points.windows(2) {
			total += pair[0].distance(pair[1]);
			cumulative.push(total);
		}
		Some(Route { points, cumulative })
	}
	/// Get the points of the route
	pub fn points(&self) -> &[Vec3] {
		&self.points
	}
	/// Total arc length
	pub fn length(&self) -> f32 {
		self.cumulative.last().copied().unwrap_or(0.0)
	}
	/// Index of the segment containing `distance` and how far into it
	/// `distance` lies, skipping segments of zero length
	fn segment_at(&self, distance: f32) -> Option<(usize, f32)> {
		let distance = distance.clamp(0.0, self.length());
		let mut found = None;
		for i in 0..self.points.len().saturating_sub(1) {
			let span = self.cumulative[i + 1] - self.cumulative[i];
			if span <= f32::EPSILON {
				continue;
			}
			found = Some((i, ((distance - self.cumulative[i]) / span).clamp(0.0, 1.0)));
			if distance <= self.cumulative[i + 1] {
				break;
			}
		}
		found
	}
	/// Point on the route `distance` along it, clamped to the ends
	pub fn location_at(&self, distance: f32) -> Vec3 {
		match self.segment_at(distance) {
			Some((i, t)) => self.points[i].lerp(self.points[i + 1], t),
			None => self.points[0],
		}
	}
	/// Unit direction of travel at `distance`, zero for a route without
	/// length
	pub fn tangent_at(&self, distance: f32) -> Vec3 {
		match self.segment_at(distance) {
			Some((i, _)) => (self.points[i + 1] - self.points[i]).normalize_or_zero(),
			None => Vec3::ZERO,
		}
	}
}
