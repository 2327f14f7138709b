//! Ground pound: prepare, pound, stun and the rebound jump.

use bevy::prelude::*;

use super::{ActionMachine, MachineConfig};
use crate::events::LaunchKind;
use crate::overlay::TuningField;
use crate::solver::{horizontal, MovementMode, MovementSolver};
use crate::state::{ActiveAction, GroundPoundPhase};
use crate::timers::ActionTimer;

impl ActionMachine {
    /// Start a ground pound. Airborne only, once per airtime.
    pub fn try_ground_pound<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) -> bool {
        if !solver.is_falling()
            || self.state.ground_pound != GroundPoundPhase::None
            || self.state.ground_pound_used_this_airtime
            || matches!(self.state.active, ActiveAction::LongJump | ActiveAction::Dive)
        {
            return false;
        }

        self.reset_wall();
        if self.state.active != ActiveAction::Idle {
            self.set_active(ActiveAction::Idle);
        }

        self.state.ground_pound_used_this_airtime = true;
        self.state.ground_pound_facing =
            Some(horizontal(solver.forward()).normalize_or(Vec3::NEG_Z));
        self.set_ground_pound(GroundPoundPhase::Preparing);

        solver.set_velocity(Vec3::ZERO);
        solver.set_movement_mode(MovementMode::Falling);
        self.apply_tuning(|tuning| tuning.gravity_scale = 0.0);

        self.timers.set(
            ActionTimer::GroundPoundPrepare,
            config.action.ground_pound_prepare_time,
            TimerMode::Once,
        );
        true
    }

    /// Rebound jump out of a pound stun.
    pub fn try_pound_jump<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) -> bool {
        if !self.state.pound_jump_pending() {
            return false;
        }

        self.state.pound_jump_consumed = true;
        self.state.pound_jump_window_open = false;
        self.state.ground_pound_used_this_airtime = false;
        self.timers.cancel(ActionTimer::GroundPoundStun);
        self.set_ground_pound(GroundPoundPhase::None);
        self.set_active(ActiveAction::PoundJump);

        let velocity = Vec3::Y * config.action.pound_jump_speed;
        self.launch(solver, LaunchKind::PoundJump, velocity, true, true);
        true
    }

    pub(super) fn on_ground_pound_prepare_elapsed<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) {
        if self.state.ground_pound != GroundPoundPhase::Preparing {
            return;
        }
        self.set_ground_pound(GroundPoundPhase::Pounding);
        self.restore_tuning(&[TuningField::GravityScale]);

        solver.set_movement_mode(MovementMode::Falling);
        solver.set_velocity(Vec3::ZERO);
        let velocity = Vec3::NEG_Y * config.action.ground_pound_speed;
        self.launch(solver, LaunchKind::GroundPound, velocity, true, true);
    }

    pub(super) fn land_ground_pound<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) {
        self.set_ground_pound(GroundPoundPhase::Stunned);
        solver.set_movement_mode(MovementMode::Grounded);
        self.state.pound_jump_window_open = true;
        self.state.pound_jump_consumed = false;
        self.timers.set(
            ActionTimer::GroundPoundStun,
            config.action.ground_pound_stun_time,
            TimerMode::Once,
        );
    }

    pub(super) fn on_ground_pound_stun_elapsed(&mut self) {
        if self.state.ground_pound != GroundPoundPhase::Stunned {
            return;
        }
        self.set_ground_pound(GroundPoundPhase::None);
        self.close_pound_jump_window();
        self.state.ground_pound_used_this_airtime = false;
    }

    /// Drop a pound that never left the prepare phase.
    pub(super) fn abandon_ground_pound_prepare(&mut self) {
        self.timers.cancel(ActionTimer::GroundPoundPrepare);
        self.restore_tuning(&[TuningField::GravityScale]);
        self.set_ground_pound(GroundPoundPhase::None);
    }

    pub(super) fn close_pound_jump_window(&mut self) {
        self.state.pound_jump_window_open = false;
        self.state.pound_jump_consumed = false;
    }
}
