//! Geometry query results.
//!
//! These structures hold the results of physics queries (shape casts and
//! proximity overlaps) used by the wall contact resolver.

use bevy::prelude::*;

/// Information about a shape cast or overlap hit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionData {
    /// Distance travelled by the cast before the hit.
    pub distance: f32,
    /// Normal of the surface at hit point (points away from the surface).
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity that was hit (if any).
    pub entity: Option<Entity>,
    /// Whether the hit surface blocks movement (sensors and triggers do not).
    pub blocking: bool,
}

impl CollisionData {
    /// Create a blocking hit result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
            blocking: true,
        }
    }

    /// Builder: mark the hit as non-blocking.
    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }

    /// Whether the hit carries a normal that can be used for surface tests.
    pub fn has_usable_normal(&self) -> bool {
        self.blocking && self.normal.length_squared() > 1.0e-4
    }

    /// The normal flattened onto the horizontal plane (Y-up), normalized.
    ///
    /// Returns `Vec3::ZERO` for floor/ceiling normals.
    pub fn horizontal_normal(&self) -> Vec3 {
        Vec3::new(self.normal.x, 0.0, self.normal.z).normalize_or_zero()
    }
}

/// Proximity sensor state reported by a backend each tick.
///
/// The sensor is the avatar's wall detector volume: `overlapping` goes true
/// while any blocking surface is inside it. `sweep` carries the impact data the
/// overlap produced, when the backend has it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WallProximity {
    /// Whether the wall detector currently overlaps a surface.
    pub overlapping: bool,
    /// Impact data from the overlap, if any.
    pub sweep: Option<CollisionData>,
}

impl WallProximity {
    /// No wall in range.
    pub fn clear() -> Self {
        Self::default()
    }

    /// Overlapping a wall, optionally with impact data.
    pub fn touching(sweep: Option<CollisionData>) -> Self {
        Self {
            overlapping: true,
            sweep,
        }
    }
}
