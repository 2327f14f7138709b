//! Per-avatar view of the movement solver.
//!
//! The action machine never talks to the ECS world directly. It drives an
//! implementation of [`MovementSolver`], which the systems build on top of a
//! physics backend for one avatar at a time. Keeping this seam instance-level
//! lets the machine be exercised without an `App`.

use bevy::prelude::*;

use crate::collision::{CollisionData, WallProximity};
use crate::overlay::MovementTuning;

/// Movement mode of the solver.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovementMode {
    /// Walking on a floor.
    Grounded,
    /// Airborne, integrating gravity.
    #[default]
    Falling,
    /// Not simulated at all (e.g. the avatar is hidden during a capture).
    Inert,
}

/// Read and write access to one avatar's movement solver.
///
/// Coordinates are Y-up; "horizontal" means the XZ plane.
pub trait MovementSolver {
    /// Current movement mode.
    fn movement_mode(&self) -> MovementMode;

    /// Switch movement mode.
    fn set_movement_mode(&mut self, mode: MovementMode);

    /// Current linear velocity.
    fn velocity(&self) -> Vec3;

    /// Overwrite the linear velocity.
    fn set_velocity(&mut self, velocity: Vec3);

    /// Normal of the floor under the avatar, when grounded.
    fn floor_normal(&self) -> Option<Vec3>;

    /// World position of the avatar's capsule center.
    fn position(&self) -> Vec3;

    /// Horizontal facing direction (normalized).
    fn forward(&self) -> Vec3;

    /// Snap the facing direction. Vertical components are ignored.
    fn set_forward(&mut self, forward: Vec3);

    /// Tuning values currently applied to the solver.
    fn tuning(&self) -> MovementTuning;

    /// Apply tuning values to the solver.
    fn set_tuning(&mut self, tuning: MovementTuning);

    /// Whether the avatar is crouched.
    fn is_crouched(&self) -> bool;

    /// Crouch or stand up.
    fn set_crouched(&mut self, crouched: bool);

    /// World-space movement input for this tick (length ≤ 1).
    fn set_movement_input(&mut self, input: Vec3);

    /// Wall detector state for this tick.
    fn wall_proximity(&self) -> WallProximity;

    /// Sweep a sphere from `origin` along `direction`, ignoring the avatar.
    fn shape_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
    ) -> Option<CollisionData>;

    /// Whether the avatar is standing on a floor.
    fn is_grounded(&self) -> bool {
        self.movement_mode() == MovementMode::Grounded
    }

    /// Whether the avatar is airborne.
    fn is_falling(&self) -> bool {
        self.movement_mode() == MovementMode::Falling
    }

    /// Launch the avatar.
    ///
    /// Each override flag replaces the matching velocity component (horizontal
    /// plane, vertical axis) instead of adding to it. A launch always leaves the
    /// avatar falling.
    fn launch(&mut self, launch_velocity: Vec3, override_horizontal: bool, override_vertical: bool) {
        let current = self.velocity();
        let horizontal = if override_horizontal {
            Vec3::new(launch_velocity.x, 0.0, launch_velocity.z)
        } else {
            Vec3::new(current.x + launch_velocity.x, 0.0, current.z + launch_velocity.z)
        };
        let vertical = if override_vertical {
            launch_velocity.y
        } else {
            current.y + launch_velocity.y
        };
        self.set_velocity(horizontal + Vec3::Y * vertical);
        self.set_movement_mode(MovementMode::Falling);
    }
}

/// Drop the vertical component of a vector.
#[inline]
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}


#[cfg(test)]
mod tests {
    use super::mock::MockSolver;
    use super::*;

    struct Plain(MockSolver);

    impl MovementSolver for Plain {
        fn movement_mode(&self) -> MovementMode {
            self.0.movement_mode()
        }
        fn set_movement_mode(&mut self, mode: MovementMode) {
            self.0.set_movement_mode(mode)
        }
        fn velocity(&self) -> Vec3 {
            self.0.velocity()
        }
        fn set_velocity(&mut self, velocity: Vec3) {
            self.0.set_velocity(velocity)
        }
        fn floor_normal(&self) -> Option<Vec3> {
            self.0.floor_normal()
        }
        fn position(&self) -> Vec3 {
            self.0.position()
        }
        fn forward(&self) -> Vec3 {
            self.0.forward()
        }
        fn set_forward(&mut self, forward: Vec3) {
            self.0.set_forward(forward)
        }
        fn tuning(&self) -> MovementTuning {
            self.0.tuning()
        }
        fn set_tuning(&mut self, tuning: MovementTuning) {
            self.0.set_tuning(tuning)
        }
        fn is_crouched(&self) -> bool {
            self.0.is_crouched()
        }
        fn set_crouched(&mut self, crouched: bool) {
            self.0.set_crouched(crouched)
        }
        fn set_movement_input(&mut self, input: Vec3) {
            self.0.set_movement_input(input)
        }
        fn wall_proximity(&self) -> WallProximity {
            self.0.wall_proximity()
        }
        fn shape_cast(&self, o: Vec3, d: Vec3, r: f32, m: f32) -> Option<CollisionData> {
            self.0.shape_cast(o, d, r, m)
        }
    }

    #[test]
    fn default_launch_adds_without_overrides() {
        let mut solver = Plain(MockSolver::default());
        solver.set_velocity(Vec3::new(100.0, -50.0, 0.0));
        solver.launch(Vec3::new(10.0, 500.0, 0.0), false, false);

        assert_eq!(solver.velocity(), Vec3::new(110.0, 450.0, 0.0));
        assert_eq!(solver.movement_mode(), MovementMode::Falling);
    }

    #[test]
    fn default_launch_overrides_vertical_only() {
        let mut solver = Plain(MockSolver::default());
        solver.set_velocity(Vec3::new(100.0, -50.0, 20.0));
        solver.launch(Vec3::new(0.0, 850.0, 0.0), false, true);

        assert_eq!(solver.velocity(), Vec3::new(100.0, 850.0, 20.0));
    }

    #[test]
    fn default_launch_overrides_both() {
        let mut solver = Plain(MockSolver::default());
        solver.set_velocity(Vec3::new(100.0, -50.0, 20.0));
        solver.launch(Vec3::new(0.0, -1000.0, 0.0), true, true);

        assert_eq!(solver.velocity(), Vec3::new(0.0, -1000.0, 0.0));
    }

    #[test]
    fn mock_shape_cast_hits_facing_plane() {
        let mut solver = MockSolver::airborne();
        solver.walls.push((Vec3::new(30.0, 0.0, 0.0), Vec3::NEG_X));

        let hit = solver
            .shape_cast(Vec3::ZERO, Vec3::X, 12.0, 35.0)
            .expect("wall within range");
        assert!((hit.distance - 18.0).abs() < 1.0e-4);
        assert_eq!(hit.normal, Vec3::NEG_X);

        assert!(solver.shape_cast(Vec3::ZERO, Vec3::NEG_X, 12.0, 35.0).is_none());
        assert!(solver.shape_cast(Vec3::ZERO, Vec3::X, 12.0, 10.0).is_none());
    }
}
