//! Roll: start, steerable loop, end.

use bevy::prelude::*;

use super::{ActionMachine, MachineConfig};
use crate::intent::ActionInput;
use crate::overlay::TuningField;
use crate::solver::{horizontal, MovementSolver};
use crate::state::{ActiveAction, GroundPoundPhase};
use crate::timers::ActionTimer;

const ROLL_FIELDS: [TuningField; 5] = [
    TuningField::MaxAcceleration,
    TuningField::GroundFriction,
    TuningField::BrakingDecelerationWalking,
    TuningField::OrientRotationToMovement,
    TuningField::MaxWalkSpeed,
];

impl ActionMachine {
    /// Start a roll from a crouch.
    pub fn try_roll<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        input: &ActionInput,
        config: MachineConfig<'_>,
    ) -> bool {
        if !solver.is_grounded()
            || !solver.is_crouched()
            || self.state.ground_pound != GroundPoundPhase::None
            || self.state.pound_jump_pending()
            || self.state.active != ActiveAction::Idle
        {
            return false;
        }

        let action = &config.action;
        let direction = horizontal(input.move_direction)
            .try_normalize()
            .unwrap_or_else(|| horizontal(solver.forward()).normalize_or(Vec3::NEG_Z));

        self.state.roll_direction = direction;
        self.state.roll_force_input_remaining = action.roll_force_input_time;
        self.set_active(ActiveAction::RollStart);

        self.apply_tuning(|tuning| {
            tuning.max_acceleration = action.roll_max_acceleration;
            tuning.ground_friction = action.roll_ground_friction;
            tuning.braking_deceleration_walking = action.roll_braking_deceleration;
            tuning.orient_rotation_to_movement = false;
            tuning.max_walk_speed = action.roll_speed;
        });

        let vertical = solver.velocity().y;
        solver.set_velocity(direction * action.roll_speed + Vec3::Y * vertical);
        solver.set_forward(direction);

        self.timers
            .set(ActionTimer::RollPhase, action.roll_start_time, TimerMode::Once);
        true
    }

    pub(super) fn on_roll_phase_elapsed<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) {
        match self.state.active {
            ActiveAction::RollStart => {
                self.set_active(ActiveAction::RollLoop);
                if config.action.roll_loop_time > 0.0 {
                    self.timers.set(
                        ActionTimer::RollPhase,
                        config.action.roll_loop_time,
                        TimerMode::Once,
                    );
                }
            }
            ActiveAction::RollLoop => self.enter_roll_end(config),
            ActiveAction::RollEnd => self.finish_roll(solver),
            _ => {}
        }
    }

    /// Per-tick roll work: abort in the air, steer and watch the loop exits.
    pub(super) fn update_roll<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        input: &ActionInput,
        dt: f32,
        config: MachineConfig<'_>,
    ) {
        if !self.state.active.is_rolling() {
            return;
        }
        if !solver.is_grounded() {
            self.abort_roll(solver);
            return;
        }

        self.state.roll_force_input_remaining = (self.state.roll_force_input_remaining - dt).max(0.0);
        if self.state.active != ActiveAction::RollLoop {
            return;
        }

        let action = &config.action;
        let wanted = horizontal(input.move_direction).normalize_or_zero();
        if wanted != Vec3::ZERO {
            if wanted.dot(self.state.roll_direction) <= action.roll_reverse_cancel_dot {
                self.enter_roll_end(config);
                return;
            }
            let t = (action.roll_steer_rate * dt).clamp(0.0, 1.0);
            let current = self.state.roll_direction;
            let steered = current.lerp(wanted, t).normalize_or(current);
            self.state.roll_direction = steered;

            let velocity = solver.velocity();
            let speed = horizontal(velocity).length();
            solver.set_velocity(steered * speed + Vec3::Y * velocity.y);
            solver.set_forward(steered);
        }

        if horizontal(solver.velocity()).length() < action.roll_end_speed {
            self.enter_roll_end(config);
        }
    }

    /// Movement input while rolling: forced along the roll during the start
    /// window, scaled by the stick in the loop, none in the end phase.
    pub(super) fn roll_movement_input(&self, input: &ActionInput) -> Vec3 {
        let forced = self.state.active == ActiveAction::RollStart
            || self.state.roll_force_input_remaining > 0.0;
        match self.state.active {
            ActiveAction::RollEnd => Vec3::ZERO,
            _ if forced => self.state.roll_direction,
            ActiveAction::RollLoop => {
                self.state.roll_direction * horizontal(input.move_direction).length().min(1.0)
            }
            _ => Vec3::ZERO,
        }
    }

    fn enter_roll_end(&mut self, config: MachineConfig<'_>) {
        self.set_active(ActiveAction::RollEnd);
        self.timers
            .set(ActionTimer::RollPhase, config.action.roll_end_time, TimerMode::Once);
    }

    /// Tear the roll down immediately.
    pub(super) fn abort_roll<S: MovementSolver + ?Sized>(&mut self, solver: &mut S) {
        if !self.state.active.is_rolling() {
            return;
        }
        self.timers.cancel(ActionTimer::RollPhase);
        self.finish_roll(solver);
    }

    fn finish_roll<S: MovementSolver + ?Sized>(&mut self, solver: &mut S) {
        self.restore_tuning(&ROLL_FIELDS);
        self.state.roll_force_input_remaining = 0.0;
        self.set_active(ActiveAction::Idle);
        if !self.state.crouch_held {
            solver.set_crouched(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::intent::ActionInput;
    use crate::solver::MovementMode;
    use crate::state::RollPhase;
    use bevy::prelude::*;

    fn crouched_rig() -> Rig {
        let mut rig = Rig::grounded();
        rig.solver.forward = Vec3::X;
        rig.step(ActionInput::idle().crouch());
        rig
    }

    #[test]
    fn roll_requires_crouch() {
        let mut rig = Rig::grounded();
        rig.step(ActionInput::idle().roll());
        assert_eq!(rig.state().roll_phase(), RollPhase::None);
    }

    #[test]
    fn roll_starts_along_input_and_overrides_tuning() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll().moving(Vec3::Z));

        assert_eq!(rig.state().roll_phase(), RollPhase::Start);
        assert_eq!(rig.state().roll_direction, Vec3::Z);
        assert_eq!(rig.solver.velocity, Vec3::new(0.0, 0.0, 900.0));
        assert_eq!(rig.solver.forward, Vec3::Z);
        assert_eq!(rig.solver.movement_input, Vec3::Z);

        let tuning = rig.solver.tuning;
        assert_eq!(tuning.max_acceleration, 2000.0);
        assert_eq!(tuning.ground_friction, 0.25);
        assert_eq!(tuning.braking_deceleration_walking, 180.0);
        assert_eq!(tuning.max_walk_speed, 900.0);
        assert!(!tuning.orient_rotation_to_movement);
    }

    #[test]
    fn roll_without_input_uses_facing() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll());
        assert_eq!(rig.state().roll_direction, Vec3::X);
    }

    #[test]
    fn start_drives_even_without_input() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll());
        rig.step(ActionInput::idle().holding_crouch());
        assert_eq!(rig.solver.movement_input, Vec3::X);
    }

    #[test]
    fn start_promotes_to_loop() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll());
        rig.wait(0.2);
        assert_eq!(rig.state().roll_phase(), RollPhase::Loop);
    }

    #[test]
    fn reversing_input_ends_loop() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll());
        rig.wait(0.2);

        rig.step(ActionInput::idle().holding_crouch().moving(Vec3::NEG_X));
        assert_eq!(rig.state().roll_phase(), RollPhase::End);
        assert_eq!(rig.solver.movement_input, Vec3::ZERO);
    }

    #[test]
    fn slowing_down_ends_loop() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll());
        rig.wait(0.2);

        rig.solver.velocity = Vec3::new(100.0, 0.0, 0.0);
        rig.step(ActionInput::idle().holding_crouch());
        assert_eq!(rig.state().roll_phase(), RollPhase::End);
    }

    #[test]
    fn loop_steers_toward_input() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll());
        rig.wait(0.2);

        rig.step(ActionInput::idle().holding_crouch().moving(Vec3::Z));
        let direction = rig.state().roll_direction;
        assert!(direction.z > 0.0 && direction.x > direction.z, "{direction:?}");
        assert!((rig.solver.velocity.length() - 900.0).abs() < 0.1);
    }

    #[test]
    fn end_finishes_and_keeps_crouch_while_held() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll());
        rig.wait(0.2);
        rig.solver.velocity = Vec3::ZERO;
        rig.wait(0.4);

        assert_eq!(rig.state().roll_phase(), RollPhase::None);
        assert!(rig.solver.crouched, "crouch still held");
        assert_eq!(rig.solver.tuning.max_acceleration, rig.baseline().max_acceleration);
        assert_eq!(rig.solver.tuning.ground_friction, rig.baseline().ground_friction);
    }

    #[test]
    fn finishing_without_crouch_held_stands_up() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll());
        // Crouch released mid-roll: the roll keeps the crouch until it ends.
        rig.step(ActionInput::idle().release_crouch());
        assert!(rig.solver.crouched);

        rig.wait(0.2);
        rig.solver.velocity = Vec3::ZERO;
        rig.wait(0.4);
        assert_eq!(rig.state().roll_phase(), RollPhase::None);
        assert!(!rig.solver.crouched);
        assert_eq!(rig.solver.tuning, rig.baseline());
    }

    #[test]
    fn leaving_ground_aborts_roll() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll());
        rig.solver.mode = MovementMode::Falling;
        rig.step(ActionInput::idle().holding_crouch());

        assert_eq!(rig.state().roll_phase(), RollPhase::None);
        assert!(!rig.machine.timers().is_active(crate::timers::ActionTimer::RollPhase));
        assert_eq!(rig.solver.tuning.max_walk_speed, 120.0);
    }

    #[test]
    fn jump_during_roll_aborts_then_jumps() {
        let mut rig = crouched_rig();
        rig.step(ActionInput::idle().holding_crouch().roll());
        rig.step(ActionInput::idle().release_crouch());
        rig.step(ActionInput::idle().jump());

        assert_eq!(rig.state().roll_phase(), RollPhase::None);
        assert_eq!(rig.state().jump_stage, 1);
    }
}
