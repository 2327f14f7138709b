//! Downhill speed boost and walk speed selection.

use bevy::prelude::*;

use super::{ActionMachine, MachineConfig};
use crate::intent::ActionInput;
use crate::solver::{horizontal, MovementSolver};

/// Direction gravity pulls along a floor with the given normal.
pub fn downhill_direction(floor_normal: Vec3) -> Vec3 {
    let gravity = Vec3::NEG_Y;
    (gravity - floor_normal * gravity.dot(floor_normal)).normalize_or_zero()
}

/// Slope angle of a floor in degrees.
pub fn slope_degrees(floor_normal: Vec3) -> f32 {
    floor_normal
        .normalize_or(Vec3::Y)
        .dot(Vec3::Y)
        .clamp(-1.0, 1.0)
        .acos()
        .to_degrees()
}

impl ActionMachine {
    /// Update the boost alpha and write the resulting max walk speed.
    ///
    /// The roll owns max walk speed while it runs, so nothing is written then.
    pub(super) fn update_downhill<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        input: &ActionInput,
        dt: f32,
        config: MachineConfig<'_>,
    ) {
        let action = &config.action;
        let eligible = solver.is_grounded()
            && !self.state.in_special_state()
            && !solver.is_crouched()
            && !self.state.crouch_held;

        let boosting = eligible
            && solver.floor_normal().is_some_and(|normal| {
                let velocity = solver.velocity();
                slope_degrees(normal) >= action.downhill_min_slope_degrees
                    && horizontal(velocity).length() >= action.downhill_min_speed
                    && velocity.normalize_or_zero().dot(downhill_direction(normal))
                        >= action.downhill_min_dot
            });

        let state = &mut self.state;
        state.downhill_hold_remaining = if boosting {
            action.downhill_hold_time
        } else if eligible {
            (state.downhill_hold_remaining - dt).max(0.0)
        } else {
            0.0
        };

        let (target, rate) = if state.downhill_hold_remaining > 0.0 {
            (1.0, action.downhill_rise_rate)
        } else {
            (0.0, action.downhill_decay_rate)
        };
        let step = rate * dt;
        let alpha = state.downhill_boost_alpha;
        state.downhill_boost_alpha = if alpha < target {
            (alpha + step).min(target)
        } else {
            (alpha - step).max(target)
        };

        if self.state.active.is_rolling() {
            return;
        }
        let speed = self.base_walk_speed(solver, input, config)
            + action.downhill_max_bonus * self.state.downhill_boost_alpha;
        self.apply_tuning(|tuning| tuning.max_walk_speed = speed);
    }
}
