//! Dive out of a ground pound.

use bevy::prelude::*;

use super::{ActionMachine, MachineConfig};
use crate::events::LaunchKind;
use crate::overlay::TuningField;
use crate::solver::{horizontal, MovementMode, MovementSolver};
use crate::state::{ActiveAction, GroundPoundPhase};
use crate::timers::ActionTimer;

/// Fields the dive overrides.
const DIVE_FIELDS: [TuningField; 4] = [
    TuningField::AirControl,
    TuningField::MaxAcceleration,
    TuningField::BrakingDecelerationFalling,
    TuningField::OrientRotationToMovement,
];

impl ActionMachine {
    /// Dive, replacing an airborne pound or leaving a settled stun.
    pub fn try_dive<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) -> bool {
        let from_air_pound = solver.is_falling()
            && matches!(
                self.state.ground_pound,
                GroundPoundPhase::Preparing | GroundPoundPhase::Pounding
            );
        let from_stun = solver.is_grounded()
            && self.state.ground_pound == GroundPoundPhase::Stunned
            && !self.state.pound_jump_pending();
        if !(from_air_pound || from_stun) {
            return false;
        }

        let direction = self
            .state
            .ground_pound_facing
            .take()
            .map(horizontal)
            .and_then(|facing| facing.try_normalize())
            .unwrap_or_else(|| horizontal(solver.forward()).normalize_or(Vec3::NEG_Z));

        self.timers.cancel(ActionTimer::GroundPoundPrepare);
        self.timers.cancel(ActionTimer::GroundPoundStun);
        self.close_pound_jump_window();
        self.set_ground_pound(GroundPoundPhase::None);
        self.restore_tuning(&[TuningField::GravityScale]);
        self.set_active(ActiveAction::Dive);

        solver.set_movement_mode(MovementMode::Falling);
        self.apply_tuning(|tuning| {
            tuning.air_control = 0.0;
            tuning.max_acceleration = 0.0;
            tuning.braking_deceleration_falling = 0.0;
            tuning.orient_rotation_to_movement = false;
        });

        let action = &config.action;
        let velocity = direction * action.dive_forward_speed + Vec3::Y * action.dive_up_speed;
        self.launch(solver, LaunchKind::Dive, velocity, true, true);
        solver.set_forward(direction);
        true
    }

    /// Leave the dive and hand its fields back.
    pub(super) fn end_dive(&mut self) {
        if self.state.active != ActiveAction::Dive {
            return;
        }
        self.restore_tuning(&DIVE_FIELDS);
        self.set_active(ActiveAction::Idle);
    }
}
