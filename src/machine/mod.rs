//! The avatar action state machine.
//!
//! [`ActionMachine`] owns the [`ActionState`], the timers and the movement
//! overlay of one avatar. It is driven once per tick through
//! [`ActionMachine::update`] against any [`MovementSolver`]; the ECS systems
//! build that solver from a physics backend.
//!
//! One tick runs, in order:
//! 1. solver feedback (landing, leaving the ground)
//! 2. fired timers
//! 3. input edges (jump, crouch, roll), ignored while hit stunned
//! 4. wall proximity edges
//! 5. continuous updates (roll steering, downhill boost, wall slide physics)
//! 6. overlay write-back
//! 7. movement input
//!
//! The individual entry points (`try_*`) are public and fail closed: they
//! return `false` without touching anything when their preconditions do not
//! hold.

mod dive;
mod downhill;
mod ground_pound;
mod hit;
mod jump;
mod roll;
mod wall;

use bevy::prelude::*;

use crate::config::{ActionConfig, WallConfig};
use crate::events::{ActionEventKind, LaunchKind};
use crate::intent::ActionInput;
use crate::overlay::{MovementOverlay, MovementTuning, TuningField};
use crate::solver::{horizontal, MovementSolver};
use crate::state::{ActionState, ActiveAction, GroundPoundPhase};
use crate::timers::{ActionTimer, TimerRegistry};

/// Configuration borrowed for one tick.
#[derive(Debug, Clone, Copy)]
pub struct MachineConfig<'a> {
    pub action: &'a ActionConfig,
    pub wall: &'a WallConfig,
}

impl<'a> MachineConfig<'a> {
    pub fn new(action: &'a ActionConfig, wall: &'a WallConfig) -> Self {
        Self { action, wall }
    }
}

/// Action state machine of one avatar.
#[derive(Component, Debug, Clone, Default)]
pub struct ActionMachine {
    state: ActionState,
    timers: TimerRegistry<ActionTimer>,
    overlay: Option<MovementOverlay>,
    /// Seconds accumulated from `update`.
    clock: f32,
    /// Machine clock time of the last accepted hit; survives resets.
    last_hit_time: Option<f32>,
    was_grounded: Option<bool>,
    outbox: Vec<ActionEventKind>,
}

impl ActionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ActionState {
        &self.state
    }

    pub fn timers(&self) -> &TimerRegistry<ActionTimer> {
        &self.timers
    }

    /// The overlay, once the baseline has been captured.
    pub fn overlay(&self) -> Option<&MovementOverlay> {
        self.overlay.as_ref()
    }

    /// Machine time in seconds.
    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn can_accept_movement_input(&self) -> bool {
        self.state.can_accept_movement_input()
    }

    /// Drain the changes recorded since the last call.
    pub fn take_events(&mut self) -> Vec<ActionEventKind> {
        std::mem::take(&mut self.outbox)
    }

    /// Run one tick.
    pub fn update<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        input: &ActionInput,
        dt: f32,
        config: MachineConfig<'_>,
    ) {
        self.ensure_overlay(solver);
        self.clock += dt.max(0.0);

        // Solver feedback
        let grounded = solver.is_grounded();
        match self.was_grounded {
            Some(false) if grounded => self.on_landed(solver, config),
            Some(true) if !grounded => self.on_left_ground(solver),
            _ => {}
        }

        // Timers
        for name in self.timers.tick(dt) {
            self.on_timer(name, solver, config);
        }

        // Input edges
        if !self.state.hit_stunned {
            if input.crouch_held && !input.crouch_pressed {
                self.resume_held_crouch(solver);
            }
            if input.jump_pressed {
                self.handle_jump_press(solver, config);
            }
            if input.crouch_pressed {
                self.handle_crouch_press(solver, config);
            }
            if input.crouch_released {
                self.handle_crouch_release(solver);
            }
            if input.roll_pressed {
                self.try_roll(solver, input, config);
            }
        }

        // Wall proximity
        self.update_wall_proximity(solver, config);

        // Continuous updates
        self.update_roll(solver, input, dt, config);
        self.update_downhill(solver, input, dt, config);
        self.update_wall_slide(solver, config);

        self.flush_overlay(solver);
        self.apply_movement_input(solver, input);

        self.was_grounded = Some(solver.is_grounded());
    }

    /// Return to a clean idle state.
    ///
    /// Cancels every timer, clears every phase and flag, writes the baseline
    /// tuning back to the solver and stands the avatar up. A crouch button
    /// still held afterwards crouches again on the next grounded tick.
    pub fn reset_all<S: MovementSolver + ?Sized>(&mut self, solver: &mut S) {
        self.timers.clear();

        self.set_active(ActiveAction::Idle);
        self.set_ground_pound(GroundPoundPhase::None);
        self.set_jump_stage(0);
        self.state = ActionState::default();

        if let Some(overlay) = self.overlay.as_mut() {
            overlay.restore_all();
            solver.set_tuning(*overlay.current());
            overlay.take_dirty();
        }

        solver.set_crouched(false);
        self.was_grounded = None;
        debug!("action machine reset");
    }

    // === Solver feedback ===

    fn on_landed<S: MovementSolver + ?Sized>(&mut self, solver: &mut S, config: MachineConfig<'_>) {
        match self.state.ground_pound {
            GroundPoundPhase::Pounding => self.land_ground_pound(solver, config),
            GroundPoundPhase::Preparing => {
                self.abandon_ground_pound_prepare();
                self.state.ground_pound_used_this_airtime = false;
                self.close_pound_jump_window();
            }
            GroundPoundPhase::Stunned => {}
            GroundPoundPhase::None => {
                self.state.ground_pound_used_this_airtime = false;
                self.close_pound_jump_window();
            }
        }

        self.state.last_landed_time = Some(self.clock);
        if self.state.jump_stage >= 3 {
            self.set_jump_stage(0);
        }

        self.reset_wall();
        match self.state.active {
            ActiveAction::Dive => self.end_dive(),
            ActiveAction::LongJump | ActiveAction::Backflip | ActiveAction::PoundJump => {
                self.set_active(ActiveAction::Idle)
            }
            _ => {}
        }
    }

    fn on_left_ground<S: MovementSolver + ?Sized>(&mut self, solver: &mut S) {
        if self.state.active.is_rolling() {
            self.abort_roll(solver);
        }
    }

    fn on_timer<S: MovementSolver + ?Sized>(
        &mut self,
        name: ActionTimer,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) {
        match name {
            ActionTimer::GroundPoundPrepare => self.on_ground_pound_prepare_elapsed(solver, config),
            ActionTimer::GroundPoundStun => self.on_ground_pound_stun_elapsed(),
            ActionTimer::RollPhase => self.on_roll_phase_elapsed(solver, config),
            ActionTimer::WallSlideStartToLoop => self.on_wall_slide_start_elapsed(),
            ActionTimer::WallKickState => self.on_wall_kick_state_elapsed(config),
            ActionTimer::WallKickInputLock => self.release_wall_kick_input_lock(),
            ActionTimer::WallEndOverlapGrace => self.on_wall_grace_elapsed(solver, config),
            ActionTimer::HitStun => self.on_hit_stun_elapsed(),
        }
    }

    // === Output ===

    fn flush_overlay<S: MovementSolver + ?Sized>(&mut self, solver: &mut S) {
        if let Some(tuning) = self.overlay.as_mut().and_then(MovementOverlay::take_dirty) {
            solver.set_tuning(tuning);
        }
    }

    fn apply_movement_input<S: MovementSolver + ?Sized>(&self, solver: &mut S, input: &ActionInput) {
        let direction = if !self.state.can_accept_movement_input() || self.state.wall_kick_input_locked
        {
            Vec3::ZERO
        } else if self.state.active.is_rolling() {
            self.roll_movement_input(input)
        } else {
            horizontal(input.move_direction)
        };
        solver.set_movement_input(direction);
    }

    // === Helpers ===

    fn ensure_overlay<S: MovementSolver + ?Sized>(&mut self, solver: &S) {
        if self.overlay.is_none() {
            let mut overlay = MovementOverlay::new(solver.tuning());
            // The solver already has these values.
            overlay.take_dirty();
            self.overlay = Some(overlay);
        }
    }

    fn baseline(&self) -> MovementTuning {
        self.overlay
            .as_ref()
            .map(|overlay| *overlay.baseline())
            .unwrap_or_default()
    }

    fn apply_tuning(&mut self, f: impl FnOnce(&mut MovementTuning)) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.apply(f);
        }
    }

    fn restore_tuning(&mut self, fields: &[TuningField]) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.restore(fields);
        }
    }

    fn launch<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        kind: LaunchKind,
        velocity: Vec3,
        override_horizontal: bool,
        override_vertical: bool,
    ) {
        solver.launch(velocity, override_horizontal, override_vertical);
        self.outbox
            .push(ActionEventKind::Launched { kind, velocity });
    }

    fn set_active(&mut self, next: ActiveAction) {
        let previous = self.state.active;
        if previous == next {
            return;
        }
        self.state.active = next;

        if previous.air_action() != next.air_action() {
            self.outbox.push(ActionEventKind::AirAction {
                from: previous.air_action(),
                to: next.air_action(),
            });
        }
        if previous.wall_state() != next.wall_state() {
            self.outbox.push(ActionEventKind::Wall {
                from: previous.wall_state(),
                to: next.wall_state(),
            });
        }
        if previous.roll_phase() != next.roll_phase() {
            self.outbox.push(ActionEventKind::Roll {
                from: previous.roll_phase(),
                to: next.roll_phase(),
            });
        }
        debug!("action {:?} -> {:?}", previous, next);
    }

    fn set_ground_pound(&mut self, next: GroundPoundPhase) {
        let previous = self.state.ground_pound;
        if previous == next {
            return;
        }
        self.state.ground_pound = next;
        self.outbox.push(ActionEventKind::GroundPound {
            from: previous,
            to: next,
        });
        debug!("ground pound {:?} -> {:?}", previous, next);
    }

    fn set_jump_stage(&mut self, next: u8) {
        let previous = self.state.jump_stage;
        if previous == next {
            return;
        }
        self.state.jump_stage = next;
        self.outbox.push(ActionEventKind::JumpStage {
            from: previous,
            to: next,
        });
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::state::{AirAction, RollPhase, WallState};

    #[test]
    fn first_update_captures_baseline_without_writing() {
        let rig = Rig::grounded();
        let overlay = rig.machine.overlay().expect("baseline captured");
        assert_eq!(*overlay.baseline(), MovementTuning::default());
        assert!(!overlay.is_overridden());
    }

    #[test]
    fn idle_tick_passes_movement_input_through() {
        let mut rig = Rig::grounded();
        rig.step(ActionInput::idle().moving(Vec3::X));
        assert_eq!(rig.solver.movement_input, Vec3::X);
    }

    #[test]
    fn reset_all_clears_everything_and_restores_tuning() {
        let mut rig = Rig::airborne();
        rig.step(ActionInput::idle().crouch());
        assert_eq!(rig.state().ground_pound, GroundPoundPhase::Preparing);
        assert_eq!(rig.solver.tuning.gravity_scale, 0.0);

        rig.machine.reset_all(&mut rig.solver);

        assert_eq!(*rig.state(), ActionState::default());
        assert_eq!(rig.machine.timers().active_count(), 0);
        assert_eq!(rig.solver.tuning, rig.baseline());
        assert!(!rig.solver.crouched);
        assert!(rig.machine.can_accept_movement_input());
    }

    #[test]
    fn reset_all_emits_phase_changes() {
        let mut rig = Rig::airborne();
        rig.step(ActionInput::idle().crouch());
        rig.machine.take_events();

        rig.machine.reset_all(&mut rig.solver);
        let events = rig.machine.take_events();
        assert!(events.contains(&ActionEventKind::GroundPound {
            from: GroundPoundPhase::Preparing,
            to: GroundPoundPhase::None,
        }));
    }

    #[test]
    fn held_crouch_resumes_after_reset() {
        let mut rig = Rig::grounded();
        rig.step(ActionInput::idle().crouch());
        rig.machine.reset_all(&mut rig.solver);
        assert!(!rig.solver.crouched);

        rig.step(ActionInput::idle().holding_crouch());
        assert!(rig.solver.crouched);
        assert!(rig.state().crouch_held);
        assert_eq!(rig.solver.tuning.max_walk_speed, 120.0);

        rig.step(ActionInput::idle().release_crouch());
        assert!(!rig.solver.crouched);
    }

    #[test]
    fn held_crouch_does_not_resume_in_the_air() {
        let mut rig = Rig::airborne();
        rig.step(ActionInput::idle().holding_crouch());
        assert!(!rig.solver.crouched);
        assert!(!rig.state().crouch_held);
        assert_eq!(rig.state().ground_pound, GroundPoundPhase::None);
    }

    #[test]
    fn reset_before_first_tick_is_harmless() {
        let mut machine = ActionMachine::new();
        let mut solver = crate::solver::mock::MockSolver::default();
        machine.reset_all(&mut solver);
        assert_eq!(*machine.state(), ActionState::default());
        assert!(machine.overlay().is_none());
    }

    #[test]
    fn projections_stay_exclusive_through_a_busy_sequence() {
        let mut rig = Rig::grounded();
        let inputs = [
            ActionInput::idle().jump(),
            ActionInput::idle().crouch(),
            ActionInput::idle().release_crouch(),
            ActionInput::idle().jump(),
            ActionInput::idle().roll(),
        ];
        for input in inputs {
            rig.step(input);
            let state = rig.state();
            let driving = [
                state.air_action() != AirAction::None,
                state.wall_state() != WallState::None,
                state.roll_phase() != RollPhase::None,
            ]
            .iter()
            .filter(|flag| **flag)
            .count();
            assert!(driving <= 1);
        }
    }
}
