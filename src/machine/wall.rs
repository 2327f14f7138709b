//! Wall slide and wall kick.
//!
//! Entry happens on a wall detector overlap while airborne and a candidate.
//! While overlapping without a slide, entry is retried every tick so that an
//! avatar that becomes a candidate after touching the wall still grabs it.
//!
//! The kick lockout and the re-entry window are both measured from the kick
//! start. Inside the lockout nothing may start a slide; after it, the re-entry
//! window lets a slide begin even though the kick state is still running.

use bevy::prelude::*;

use super::{ActionMachine, MachineConfig};
use crate::collision::WallProximity;
use crate::events::LaunchKind;
use crate::overlay::TuningField;
use crate::solver::{horizontal, MovementSolver};
use crate::state::{ActiveAction, GroundPoundPhase, WallState};
use crate::timers::ActionTimer;
use crate::wall_probe::{resolve_wall_contact, revalidate_wall};

/// Fields the slide overrides.
const SLIDE_FIELDS: [TuningField; 5] = [
    TuningField::GravityScale,
    TuningField::AirControl,
    TuningField::MaxAcceleration,
    TuningField::BrakingDecelerationFalling,
    TuningField::OrientRotationToMovement,
];

/// Fields the post-kick input lock overrides.
const KICK_LOCK_FIELDS: [TuningField; 2] = [TuningField::AirControl, TuningField::MaxAcceleration];

impl ActionMachine {
    /// Seconds since the last wall kick.
    fn since_wall_kick(&self) -> Option<f32> {
        self.state.last_wall_kick_time.map(|kick| self.clock - kick)
    }

    /// Whether a slide may begin right now.
    pub fn is_wall_slide_candidate<S: MovementSolver + ?Sized>(
        &self,
        solver: &S,
        config: MachineConfig<'_>,
    ) -> bool {
        let wall = &config.wall;
        if !wall.enabled || !solver.is_falling() {
            return false;
        }
        if self.state.ground_pound != GroundPoundPhase::None {
            return false;
        }

        let since_kick = self.since_wall_kick();
        if since_kick.is_some_and(|elapsed| elapsed < wall.kick_min_reenter_delay) {
            return false;
        }
        let recent_kick = since_kick.is_some_and(|elapsed| elapsed <= wall.kick_reenter_window);

        match self.state.active {
            ActiveAction::Backflip | ActiveAction::PoundJump => true,
            ActiveAction::Idle => (1..=3).contains(&self.state.jump_stage) || recent_kick,
            ActiveAction::WallKick => recent_kick,
            _ => false,
        }
    }

    /// Try to start a slide on the wall the detector reports.
    pub fn try_enter_wall_slide<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        proximity: &WallProximity,
        config: MachineConfig<'_>,
    ) -> bool {
        if !proximity.overlapping || !self.is_wall_slide_candidate(solver, config) {
            return false;
        }
        let Some(contact) = resolve_wall_contact(solver, proximity, config.wall) else {
            return false;
        };

        self.timers.cancel(ActionTimer::WallKickState);
        self.release_wall_kick_input_lock();

        self.state.wall_normal = Some(contact.normal);
        self.set_active(ActiveAction::WallSlideStart);
        solver.set_forward(-contact.normal);

        let wall = &config.wall;
        self.apply_tuning(|tuning| {
            tuning.air_control = wall.slide_air_control;
            tuning.max_acceleration = wall.slide_max_acceleration;
            tuning.braking_deceleration_falling = wall.slide_braking_deceleration_falling;
            tuning.orient_rotation_to_movement = false;
        });
        self.apply_wall_slide_physics(solver, config);

        self.timers.set(
            ActionTimer::WallSlideStartToLoop,
            wall.slide_start_time,
            TimerMode::Once,
        );
        true
    }

    /// Kick off the wall being slid on.
    pub fn try_wall_kick<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) -> bool {
        if !self.state.active.is_wall_sliding() {
            return false;
        }
        let Some(normal) = self.state.wall_normal else {
            return false;
        };

        self.timers.cancel(ActionTimer::WallSlideStartToLoop);
        self.timers.cancel(ActionTimer::WallEndOverlapGrace);
        self.restore_tuning(&SLIDE_FIELDS);

        let wall = &config.wall;
        let outward = horizontal(normal).normalize_or_zero();
        let velocity = outward * wall.kick_horizontal_speed + Vec3::Y * wall.kick_vertical_speed;
        self.launch(solver, LaunchKind::WallKick, velocity, true, true);
        solver.set_forward(outward);

        self.set_active(ActiveAction::WallKick);
        self.state.last_wall_kick_time = Some(self.clock);
        self.timers
            .set(ActionTimer::WallKickState, wall.kick_state_time, TimerMode::Once);
        true
    }

    /// Process overlap edges reported by the wall detector.
    pub(super) fn update_wall_proximity<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) {
        let proximity = solver.wall_proximity();
        let was_overlapping = self.state.wall_overlapping;
        self.state.wall_overlapping = proximity.overlapping;

        if proximity.overlapping {
            if self.state.active.is_wall_sliding() {
                self.timers.cancel(ActionTimer::WallEndOverlapGrace);
            } else {
                self.try_enter_wall_slide(solver, &proximity, config);
            }
        } else if was_overlapping && self.state.active.is_wall_sliding() {
            self.timers.set(
                ActionTimer::WallEndOverlapGrace,
                config.wall.end_overlap_grace,
                TimerMode::Once,
            );
        }
    }

    /// Slide physics, reapplied every tick.
    pub(super) fn update_wall_slide<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) {
        if !self.state.active.is_wall_sliding() {
            return;
        }
        if !solver.is_falling() {
            self.reset_wall();
            return;
        }
        self.apply_wall_slide_physics(solver, config);
    }

    /// Strip velocity along the wall normal and pick the vertical rule: a
    /// rising avatar keeps its arc under normal gravity, a falling one slides
    /// down at a fixed speed without gravity.
    fn apply_wall_slide_physics<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) {
        let Some(normal) = self.state.wall_normal else {
            return;
        };
        let mut velocity = solver.velocity();
        velocity -= normal * velocity.dot(normal);

        if velocity.y > 0.0 {
            let baseline = self.baseline().gravity_scale;
            self.apply_tuning(|tuning| tuning.gravity_scale = baseline);
        } else {
            self.apply_tuning(|tuning| tuning.gravity_scale = 0.0);
            velocity.y = -config.wall.slide_down_speed;
        }
        solver.set_velocity(velocity);
    }

    pub(super) fn on_wall_slide_start_elapsed(&mut self) {
        if self.state.active == ActiveAction::WallSlideStart {
            self.set_active(ActiveAction::WallSlideLoop);
        }
    }

    pub(super) fn on_wall_kick_state_elapsed(&mut self, config: MachineConfig<'_>) {
        if self.state.active != ActiveAction::WallKick {
            return;
        }
        self.set_active(ActiveAction::Idle);
        self.state.wall_kick_input_locked = true;
        self.apply_tuning(|tuning| {
            tuning.air_control = 0.0;
            tuning.max_acceleration = 0.0;
        });
        self.timers.set(
            ActionTimer::WallKickInputLock,
            config.wall.kick_input_lock_time,
            TimerMode::Once,
        );
    }

    pub(super) fn release_wall_kick_input_lock(&mut self) {
        self.timers.cancel(ActionTimer::WallKickInputLock);
        if self.state.wall_kick_input_locked {
            self.state.wall_kick_input_locked = false;
            self.restore_tuning(&KICK_LOCK_FIELDS);
        }
    }

    pub(super) fn on_wall_grace_elapsed<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        config: MachineConfig<'_>,
    ) {
        if !self.state.active.is_wall_sliding() || self.state.wall_overlapping {
            return;
        }
        let revalidated = self
            .state
            .wall_normal
            .and_then(|normal| revalidate_wall(solver, normal, config.wall));
        match revalidated {
            Some(contact) => self.state.wall_normal = Some(contact.normal),
            None => self.reset_wall(),
        }
    }

    /// Drop every wall state immediately, grace included.
    pub(super) fn reset_wall(&mut self) {
        self.timers.cancel(ActionTimer::WallSlideStartToLoop);
        self.timers.cancel(ActionTimer::WallEndOverlapGrace);
        self.timers.cancel(ActionTimer::WallKickState);
        self.release_wall_kick_input_lock();

        if self.state.active.is_wall_sliding() {
            self.restore_tuning(&SLIDE_FIELDS);
        }
        if self.state.active.wall_state() != WallState::None {
            self.set_active(ActiveAction::Idle);
        }
        self.state.wall_normal = None;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::collision::{CollisionData, WallProximity};
    use crate::intent::ActionInput;
    use crate::solver::mock::MockSolver;
    use crate::state::{ActiveAction, WallState};
    use crate::timers::ActionTimer;
    use bevy::prelude::*;

    /// Airborne after a stage-1 jump, moving toward a wall at +X.
    fn jumping_at_wall() -> Rig {
        let mut rig = Rig::grounded();
        rig.solver.forward = Vec3::X;
        rig.solver.walls.push((Vec3::new(30.0, 0.0, 0.0), Vec3::NEG_X));
        rig.step(ActionInput::idle().jump());
        rig.solver.velocity = Vec3::new(300.0, -100.0, 0.0);
        rig
    }

    fn touch_wall(rig: &mut Rig) {
        let sweep = CollisionData::new(0.0, Vec3::NEG_X, Vec3::new(30.0, 0.0, 0.0), None);
        rig.solver.proximity = WallProximity::touching(Some(sweep));
    }

    fn sliding() -> Rig {
        let mut rig = jumping_at_wall();
        touch_wall(&mut rig);
        rig.step(ActionInput::idle());
        assert_eq!(rig.state().wall_state(), WallState::SlideStart);
        rig
    }

    #[test]
    fn falling_contact_enters_slide_with_fixed_descent() {
        let rig = sliding();
        assert_eq!(rig.solver.velocity, Vec3::new(0.0, -220.0, 0.0));
        assert_eq!(rig.solver.forward, Vec3::X);
        assert_eq!(rig.solver.tuning.gravity_scale, 0.0);
        assert_eq!(rig.solver.tuning.air_control, 0.05);
        assert_eq!(rig.solver.tuning.max_acceleration, 200.0);
        assert_eq!(rig.solver.tuning.braking_deceleration_falling, 2048.0);
        assert!(!rig.solver.tuning.orient_rotation_to_movement);
    }

    #[test]
    fn rising_contact_keeps_arc_and_gravity() {
        let mut rig = jumping_at_wall();
        rig.solver.velocity = Vec3::new(300.0, 400.0, 0.0);
        touch_wall(&mut rig);
        rig.step(ActionInput::idle());

        assert_eq!(rig.state().wall_state(), WallState::SlideStart);
        assert_eq!(rig.solver.velocity, Vec3::new(0.0, 400.0, 0.0));
        assert_eq!(rig.solver.tuning.gravity_scale, rig.baseline().gravity_scale);
    }

    #[test]
    fn strip_is_idempotent() {
        let mut rig = sliding();
        let once = rig.solver.velocity;
        rig.step(ActionInput::idle());
        assert_eq!(rig.solver.velocity, once);
    }

    #[test]
    fn slide_start_promotes_to_loop() {
        let mut rig = sliding();
        rig.wait(0.9);
        assert_eq!(rig.state().wall_state(), WallState::SlideLoop);
        assert_eq!(rig.solver.velocity, Vec3::new(0.0, -220.0, 0.0));
    }

    #[test]
    fn grounded_overlap_never_enters() {
        let mut rig = Rig::grounded();
        rig.solver.forward = Vec3::X;
        rig.solver.walls.push((Vec3::new(30.0, 0.0, 0.0), Vec3::NEG_X));
        rig.machine.state.jump_stage = 1;
        touch_wall(&mut rig);
        rig.step(ActionInput::idle());
        assert_eq!(rig.state().wall_state(), WallState::None);
    }

    #[test]
    fn plain_fall_is_not_a_candidate() {
        let mut rig = Rig::airborne();
        rig.solver.forward = Vec3::X;
        rig.solver.velocity = Vec3::new(300.0, -100.0, 0.0);
        touch_wall(&mut rig);
        rig.step(ActionInput::idle());
        assert_eq!(rig.state().wall_state(), WallState::None);
    }

    #[test]
    fn long_jump_is_not_a_candidate() {
        let mut rig = Rig::grounded();
        rig.solver.forward = Vec3::X;
        rig.solver.velocity = Vec3::new(300.0, 0.0, 0.0);
        rig.step(ActionInput::idle().crouch());
        rig.step(ActionInput::idle().holding_crouch().jump());
        touch_wall(&mut rig);
        rig.step(ActionInput::idle().holding_crouch());
        assert_eq!(rig.state().active, ActiveAction::LongJump);
    }

    #[test]
    fn glancing_contact_is_rejected() {
        let mut rig = jumping_at_wall();
        // Only the overlap reports the wall; nothing is within cast reach.
        rig.solver.walls.clear();
        rig.solver.velocity = Vec3::new(100.0, -100.0, 300.0);
        touch_wall(&mut rig);
        rig.step(ActionInput::idle());
        assert_eq!(rig.state().wall_state(), WallState::None);
    }

    #[test]
    fn glancing_overlap_still_finds_wall_ahead() {
        let mut rig = jumping_at_wall();
        rig.solver.velocity = Vec3::new(100.0, -100.0, 300.0);
        touch_wall(&mut rig);
        rig.step(ActionInput::idle());
        assert_eq!(rig.state().wall_state(), WallState::SlideStart);
        assert_eq!(rig.state().wall_normal, Some(Vec3::NEG_X));
    }

    #[test]
    fn becoming_a_candidate_while_touching_enters() {
        let mut rig = Rig::airborne();
        rig.solver.forward = Vec3::X;
        rig.solver.velocity = Vec3::new(300.0, -100.0, 0.0);
        touch_wall(&mut rig);
        rig.step(ActionInput::idle());
        assert_eq!(rig.state().wall_state(), WallState::None);

        rig.machine.state.jump_stage = 1;
        rig.step(ActionInput::idle());
        assert_eq!(rig.state().wall_state(), WallState::SlideStart);
    }

    #[test]
    fn wall_kick_launches_outward_and_restores_slide_fields() {
        let mut rig = sliding();
        rig.step(ActionInput::idle().jump());

        assert_eq!(rig.state().wall_state(), WallState::WallKick);
        assert_eq!(rig.solver.velocity, Vec3::new(-500.0, 920.0, 0.0));
        assert_eq!(rig.solver.forward, Vec3::NEG_X);
        assert!(!rig.machine.timers().is_active(ActionTimer::WallSlideStartToLoop));
        assert_eq!(rig.solver.tuning, rig.baseline());
    }

    #[test]
    fn kick_state_is_followed_by_input_lock() {
        let mut rig = sliding();
        rig.solver.proximity = WallProximity::clear();
        rig.step(ActionInput::idle().jump());

        rig.wait(0.11);
        assert_eq!(rig.state().wall_state(), WallState::None);
        assert!(rig.state().wall_kick_input_locked);
        assert_eq!(rig.solver.tuning.air_control, 0.0);
        assert_eq!(rig.solver.tuning.max_acceleration, 0.0);

        rig.step(ActionInput::idle().moving(Vec3::Z));
        assert_eq!(rig.solver.movement_input, Vec3::ZERO);

        rig.wait(0.15);
        assert!(!rig.state().wall_kick_input_locked);
        assert_eq!(rig.solver.tuning, rig.baseline());
        rig.step(ActionInput::idle().moving(Vec3::Z));
        assert_eq!(rig.solver.movement_input, Vec3::Z);
    }

    #[test]
    fn minimum_delay_blocks_immediate_regrab() {
        let mut rig = sliding();
        rig.step(ActionInput::idle().jump());
        // Still overlapping the same wall right after the kick.
        rig.solver.velocity = Vec3::new(300.0, 500.0, 0.0);
        rig.step(ActionInput::idle());
        assert_eq!(rig.state().wall_state(), WallState::WallKick);
    }

    #[test]
    fn recent_kick_allows_reentry_after_minimum_delay() {
        let mut rig = sliding();
        rig.solver.proximity = WallProximity::clear();
        rig.step(ActionInput::idle().jump());
        rig.wait(0.05);
        assert_eq!(rig.state().wall_state(), WallState::WallKick);

        // A second wall on the other side.
        rig.solver.walls.push((Vec3::new(-30.0, 0.0, 0.0), Vec3::X));
        rig.solver.velocity = Vec3::new(-300.0, -50.0, 0.0);
        let sweep = CollisionData::new(0.0, Vec3::X, Vec3::new(-30.0, 0.0, 0.0), None);
        rig.solver.proximity = WallProximity::touching(Some(sweep));
        rig.step(ActionInput::idle());

        assert_eq!(rig.state().wall_state(), WallState::SlideStart);
        assert!(!rig.machine.timers().is_active(ActionTimer::WallKickState));
        assert_eq!(rig.state().wall_normal, Some(Vec3::X));
    }

    #[test]
    fn reentry_window_expires() {
        let mut rig = Rig::with_solver(MockSolver::airborne());
        rig.machine.state.active = ActiveAction::WallKick;
        rig.machine.state.last_wall_kick_time = Some(rig.machine.clock());

        rig.wait(0.1);
        let config = super::MachineConfig::new(&rig.action, &rig.wall);
        assert!(rig.machine.is_wall_slide_candidate(&rig.solver, config));

        rig.wait(0.3);
        let config = super::MachineConfig::new(&rig.action, &rig.wall);
        assert!(!rig.machine.is_wall_slide_candidate(&rig.solver, config));
    }

    #[test]
    fn losing_contact_ends_slide_after_grace() {
        let mut rig = sliding();
        rig.solver.proximity = WallProximity::clear();
        rig.solver.walls.clear();
        rig.step(ActionInput::idle());
        assert!(rig.machine.timers().is_active(ActionTimer::WallEndOverlapGrace));
        assert_eq!(rig.state().wall_state(), WallState::SlideStart);

        rig.wait(0.1);
        assert_eq!(rig.state().wall_state(), WallState::None);
        assert_eq!(rig.solver.tuning, rig.baseline());
    }

    #[test]
    fn probe_revalidation_keeps_slide_through_grace() {
        let mut rig = sliding();
        rig.solver.proximity = WallProximity::clear();
        rig.step(ActionInput::idle());
        rig.wait(0.1);
        assert!(rig.state().active.is_wall_sliding());
    }

    #[test]
    fn regaining_contact_cancels_grace() {
        let mut rig = sliding();
        rig.solver.proximity = WallProximity::clear();
        rig.step(ActionInput::idle());
        touch_wall(&mut rig);
        rig.step(ActionInput::idle());
        assert!(!rig.machine.timers().is_active(ActionTimer::WallEndOverlapGrace));
    }

    #[test]
    fn landing_resets_slide_immediately() {
        let mut rig = sliding();
        rig.solver.proximity = WallProximity::clear();
        rig.step(ActionInput::idle());
        rig.land();

        assert_eq!(rig.state().wall_state(), WallState::None);
        assert!(!rig.machine.timers().is_active(ActionTimer::WallEndOverlapGrace));
        assert_eq!(rig.solver.tuning, rig.baseline());
    }

    #[test]
    fn ground_pound_resets_slide() {
        let mut rig = sliding();
        rig.step(ActionInput::idle().crouch());
        assert_eq!(rig.state().wall_state(), WallState::None);
        assert_eq!(
            rig.state().ground_pound,
            crate::state::GroundPoundPhase::Preparing
        );
    }

    #[test]
    fn disabled_config_never_slides() {
        let mut rig = jumping_at_wall();
        rig.wall = crate::config::WallConfig::disabled();
        touch_wall(&mut rig);
        rig.step(ActionInput::idle());
        assert_eq!(rig.state().wall_state(), WallState::None);
    }
}
