//! Wall contact resolution.
//!
//! Turns a wall detector overlap into a validated wall contact. The overlap's
//! own impact data is preferred; when it does not describe a wall the avatar
//! is approaching head-on, short sphere probes are cast in a fixed set of
//! horizontal directions and the first valid hit wins.

use bevy::prelude::*;

use crate::collision::{CollisionData, WallProximity};
use crate::config::WallConfig;
use crate::solver::{horizontal, MovementSolver};

/// A wall the avatar may slide on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallContact {
    /// Outward wall normal, flattened to the horizontal plane.
    pub normal: Vec3,
    pub point: Vec3,
    pub entity: Option<Entity>,
}

/// Whether `normal` is steep enough to count as a wall.
pub fn is_wall_normal(normal: Vec3, config: &WallConfig) -> bool {
    let normal = normal.normalize_or_zero();
    normal != Vec3::ZERO && normal.y.abs() <= config.max_normal_up_dot()
}

/// Whether moving along `approach` hits a wall with outward `normal` head-on.
pub fn is_head_on(approach: Vec3, normal: Vec3, config: &WallConfig) -> bool {
    let approach = horizontal(approach).normalize_or_zero();
    let inward = -horizontal(normal).normalize_or_zero();
    approach != Vec3::ZERO && approach.dot(inward) >= config.min_front_dot
}

fn accept(hit: &CollisionData, approach: Vec3, config: &WallConfig) -> Option<WallContact> {
    if !hit.has_usable_normal() || !is_wall_normal(hit.normal, config) {
        return None;
    }
    if !is_head_on(approach, hit.normal, config) {
        return None;
    }
    Some(WallContact {
        normal: hit.horizontal_normal(),
        point: hit.point,
        entity: hit.entity,
    })
}

/// The direction the avatar is approaching from: horizontal velocity when it
/// is moving, otherwise its facing.
pub fn approach_direction<S: MovementSolver + ?Sized>(solver: &S) -> Vec3 {
    let velocity = horizontal(solver.velocity());
    if velocity.length_squared() > 1.0 {
        velocity.normalize()
    } else {
        horizontal(solver.forward()).normalize_or_zero()
    }
}

/// Probe directions in priority order.
fn probe_directions<S: MovementSolver + ?Sized>(solver: &S) -> Vec<Vec3> {
    let forward = horizontal(solver.forward()).normalize_or(Vec3::NEG_Z);
    let right = forward.cross(Vec3::Y);
    let mut directions = Vec::with_capacity(5);
    let velocity = horizontal(solver.velocity());
    if velocity.length_squared() > 1.0 {
        directions.push(velocity.normalize());
    }
    directions.extend([forward, -forward, right, -right]);
    directions
}

/// Resolve a wall contact for an overlap.
///
/// Overlap data is checked against the avatar's approach direction. Probe hits
/// are checked against the probe's own direction.
pub fn resolve_wall_contact<S: MovementSolver + ?Sized>(
    solver: &S,
    proximity: &WallProximity,
    config: &WallConfig,
) -> Option<WallContact> {
    // A floor or ledge normal from the overlap still falls through to the casts.
    if let Some(contact) = proximity
        .sweep
        .as_ref()
        .and_then(|sweep| accept(sweep, approach_direction(solver), config))
    {
        return Some(contact);
    }

    let origin = solver.position();
    probe_directions(solver).into_iter().find_map(|direction| {
        solver
            .shape_cast(
                origin,
                direction,
                config.trace_radius,
                config.trace_distance,
            )
            .and_then(|hit| accept(&hit, direction, config))
    })
}

/// Probe straight toward a known wall to check that it is still there.
pub fn revalidate_wall<S: MovementSolver + ?Sized>(
    solver: &S,
    wall_normal: Vec3,
    config: &WallConfig,
) -> Option<WallContact> {
    let toward = -horizontal(wall_normal).normalize_or_zero();
    if toward == Vec3::ZERO {
        return None;
    }
    solver
        .shape_cast(
            solver.position(),
            toward,
            config.trace_radius,
            config.trace_distance,
        )
        .and_then(|hit| accept(&hit, toward, config))
}
