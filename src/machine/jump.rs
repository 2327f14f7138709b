//! Jump routing: chain jumps, crouch jumps and the crouch button.

use bevy::prelude::*;

use super::{ActionMachine, MachineConfig};
use crate::events::LaunchKind;
use crate::intent::ActionInput;
use crate::solver::{horizontal, MovementSolver};
use crate::state::{ActiveAction, GroundPoundPhase};

impl ActionMachine {
    /// Route a jump press.
    ///
    /// Priority: wall kick, rebound jump, crouch jump, chain jump. A roll is
    /// aborted first and the press falls through.
    pub(super) fn handle_jump_press<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) {
        if self.state.active.is_wall_sliding() {
            self.try_wall_kick(solver, config);
            return;
        }
        if matches!(
            self.state.ground_pound,
            GroundPoundPhase::Preparing | GroundPoundPhase::Pounding
        ) {
            return;
        }
        if self.state.pound_jump_window_open {
            self.try_pound_jump(solver, config);
            return;
        }
        if self.state.ground_pound == GroundPoundPhase::Stunned {
            return;
        }
        if self.state.active.is_rolling() {
            self.abort_roll(solver);
        }
        if !solver.is_grounded() {
            return;
        }
        if self.try_crouch_derived_jump(solver, config) {
            return;
        }
        self.try_jump(solver, config);
    }

    /// Plain jump chain. Grounded only.
    pub fn try_jump<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) -> bool {
        if !solver.is_grounded()
            || self.state.ground_pound != GroundPoundPhase::None
            || self.state.active != ActiveAction::Idle
        {
            return false;
        }

        let can_chain = self
            .state
            .last_landed_time
            .is_some_and(|landed| self.clock - landed <= config.action.jump_chain_window);
        let stage = if can_chain {
            self.state.jump_stage.saturating_add(1).clamp(1, 3)
        } else {
            1
        };
        self.set_jump_stage(stage);

        let speed = config.action.jump_speed_for_stage(stage);
        self.launch(
            solver,
            LaunchKind::Jump { stage },
            Vec3::Y * speed,
            false,
            true,
        );
        debug!("jump stage {} ({} u/s)", stage, speed);
        true
    }

    /// Long jump or backflip out of a crouch. Grounded only.
    pub fn try_crouch_derived_jump<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) -> bool {
        if !solver.is_grounded()
            || self.state.ground_pound != GroundPoundPhase::None
            || self.state.active != ActiveAction::Idle
        {
            return false;
        }
        if !(solver.is_crouched() || self.state.crouch_held) {
            return false;
        }

        let speed = self
            .state
            .crouch_start_speed
            .max(horizontal(solver.velocity()).length());
        let forward = horizontal(solver.forward()).normalize_or(Vec3::NEG_Z);

        solver.set_crouched(false);
        self.set_jump_stage(0);
        self.state.last_landed_time = None;
        self.state.crouch_start_speed = 0.0;

        let action = &config.action;
        if speed >= action.long_jump_min_speed {
            self.set_active(ActiveAction::LongJump);
            let velocity =
                forward * action.long_jump_forward_speed + Vec3::Y * action.long_jump_up_speed;
            self.launch(solver, LaunchKind::LongJump, velocity, true, true);
        } else {
            self.set_active(ActiveAction::Backflip);
            let velocity =
                -forward * action.backflip_back_speed + Vec3::Y * action.backflip_up_speed;
            self.launch(solver, LaunchKind::Backflip, velocity, true, true);
        }
        true
    }

    /// Crouch press: crouch on the ground, pound or dive in the air.
    pub(super) fn handle_crouch_press<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) {
        if solver.is_grounded() {
            if self.state.ground_pound == GroundPoundPhase::Stunned
                && !self.state.pound_jump_pending()
            {
                self.try_dive(solver, config);
                return;
            }
            if self.state.ground_pound == GroundPoundPhase::Stunned
                || self.state.pound_jump_pending()
            {
                return;
            }
            self.begin_crouch_hold(solver);
            return;
        }

        match self.state.ground_pound {
            GroundPoundPhase::Preparing | GroundPoundPhase::Pounding => {
                self.try_dive(solver, config);
            }
            _ => {
                self.try_ground_pound(solver, config);
            }
        }
    }

    pub(super) fn handle_crouch_release<S: MovementSolver + ?Sized>(&mut self, solver: &mut S) {
        self.state.crouch_held = false;
        if solver.is_grounded() && solver.is_crouched() && !self.state.active.is_rolling() {
            solver.set_crouched(false);
        }
    }

    /// Pick up a crouch button that is held but not tracked, as after a
    /// reset. Only a plain grounded avatar crouches.
    pub(super) fn resume_held_crouch<S: MovementSolver + ?Sized>(&mut self, solver: &mut S) {
        if self.state.crouch_held
            || !solver.is_grounded()
            || self.state.active != ActiveAction::Idle
            || self.state.ground_pound != GroundPoundPhase::None
            || self.state.pound_jump_pending()
        {
            return;
        }
        self.begin_crouch_hold(solver);
    }

    fn begin_crouch_hold<S: MovementSolver + ?Sized>(&mut self, solver: &mut S) {
        self.state.crouch_held = true;
        self.state.crouch_start_speed = horizontal(solver.velocity()).length();
        if !solver.is_crouched() {
            solver.set_crouched(true);
        }
    }

    /// Max walk speed from the run and crouch buttons.
    pub(super) fn base_walk_speed<S: MovementSolver + ?Sized>(
        &self,
        solver: &S,
        input: &ActionInput,
        config: MachineConfig<'_>,
    ) -> f32 {
        let action = &config.action;
        if solver.is_crouched() || self.state.crouch_held {
            action.walk_speed * action.crouch_speed_scale
        } else if input.run_held {
            action.run_speed
        } else {
            action.walk_speed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::events::{ActionEventKind, LaunchKind};
    use crate::intent::ActionInput;
    use crate::state::{ActiveAction, AirAction};
    use bevy::prelude::*;

    fn jump_and_land(rig: &mut Rig) -> u8 {
        rig.step(ActionInput::idle().jump());
        let stage = rig.state().jump_stage;
        rig.land();
        stage
    }

    #[test]
    fn chain_within_window_climbs_one_two_three() {
        let mut rig = Rig::grounded();
        let stages: Vec<u8> = (0..3).map(|_| jump_and_land(&mut rig)).collect();
        assert_eq!(stages, vec![1, 2, 3]);

        let launches: Vec<f32> = rig.solver.launches.iter().map(|v| v.y).collect();
        assert_eq!(launches, vec![850.0, 890.0, 1230.0]);
    }

    #[test]
    fn landing_after_third_stage_resets_chain() {
        let mut rig = Rig::grounded();
        for _ in 0..3 {
            jump_and_land(&mut rig);
        }
        assert_eq!(rig.state().jump_stage, 0);
        assert_eq!(jump_and_land(&mut rig), 1);
    }

    #[test]
    fn press_after_window_restarts_at_one() {
        let mut rig = Rig::grounded();
        jump_and_land(&mut rig);
        rig.wait(0.4);
        assert_eq!(jump_and_land(&mut rig), 1);
    }

    #[test]
    fn first_jump_without_landing_history_is_stage_one() {
        let mut rig = Rig::grounded();
        rig.step(ActionInput::idle().jump());
        assert_eq!(rig.state().jump_stage, 1);
    }

    #[test]
    fn chain_jump_overrides_vertical_only() {
        let mut rig = Rig::grounded();
        rig.solver.velocity = Vec3::new(300.0, 0.0, 0.0);
        rig.step(ActionInput::idle().jump());
        assert_eq!(rig.solver.velocity, Vec3::new(300.0, 850.0, 0.0));
    }

    #[test]
    fn airborne_jump_press_is_ignored() {
        let mut rig = Rig::airborne();
        rig.step(ActionInput::idle().jump());
        assert!(rig.solver.launches.is_empty());
        assert_eq!(rig.state().jump_stage, 0);
    }

    #[test]
    fn jump_event_sequence_reports_stage_and_launch() {
        let mut rig = Rig::grounded();
        rig.machine.take_events();
        rig.step(ActionInput::idle().jump());
        let events = rig.machine.take_events();
        assert!(events.contains(&ActionEventKind::JumpStage { from: 0, to: 1 }));
        assert!(events.iter().any(|event| matches!(
            event,
            ActionEventKind::Launched {
                kind: LaunchKind::Jump { stage: 1 },
                ..
            }
        )));
    }

    #[test]
    fn crouch_jump_while_moving_is_long_jump() {
        let mut rig = Rig::grounded();
        rig.solver.forward = Vec3::X;
        rig.solver.velocity = Vec3::new(300.0, 0.0, 0.0);
        rig.step(ActionInput::idle().crouch());
        assert!(rig.solver.crouched);

        rig.step(ActionInput::idle().holding_crouch().jump());

        assert_eq!(rig.state().air_action(), AirAction::LongJump);
        assert_eq!(rig.state().jump_stage, 0);
        assert!(!rig.solver.crouched, "long jump stands up first");
        assert_eq!(rig.solver.velocity, Vec3::new(950.0, 800.0, 0.0));
    }

    #[test]
    fn crouch_jump_standing_still_is_backflip() {
        let mut rig = Rig::grounded();
        rig.solver.forward = Vec3::X;
        rig.step(ActionInput::idle().crouch());
        rig.step(ActionInput::idle().holding_crouch().jump());

        assert_eq!(rig.state().air_action(), AirAction::Backflip);
        assert_eq!(rig.solver.velocity, Vec3::new(-200.0, 1200.0, 0.0));
    }

    #[test]
    fn crouch_start_speed_counts_even_after_stopping() {
        let mut rig = Rig::grounded();
        rig.solver.forward = Vec3::X;
        rig.solver.velocity = Vec3::new(50.0, 0.0, 0.0);
        rig.step(ActionInput::idle().crouch());
        rig.solver.velocity = Vec3::ZERO;
        rig.step(ActionInput::idle().holding_crouch().jump());
        assert_eq!(rig.state().air_action(), AirAction::LongJump);
    }

    #[test]
    fn crouch_jump_breaks_the_chain() {
        let mut rig = Rig::grounded();
        jump_and_land(&mut rig);
        rig.step(ActionInput::idle().crouch());
        rig.step(ActionInput::idle().holding_crouch().jump());
        assert_eq!(rig.state().jump_stage, 0);
        assert_eq!(rig.state().last_landed_time, None);

        rig.land();
        assert_eq!(rig.state().active, ActiveAction::Idle);
    }

    #[test]
    fn crouch_release_stands_up_and_restores_speed() {
        let mut rig = Rig::grounded();
        rig.step(ActionInput::idle().crouch());
        assert_eq!(rig.solver.tuning.max_walk_speed, 120.0);

        rig.step(ActionInput::idle().release_crouch());
        assert!(!rig.solver.crouched);
        assert!(!rig.state().crouch_held);
        assert_eq!(rig.solver.tuning.max_walk_speed, 200.0);
    }

    #[test]
    fn run_button_raises_walk_speed() {
        let mut rig = Rig::grounded();
        rig.step(ActionInput::idle().running());
        assert_eq!(rig.solver.tuning.max_walk_speed, 690.0);
    }
}
