//! Hit reaction: knockback, input stun and the damage cooldown.

use bevy::prelude::*;

use super::{ActionMachine, MachineConfig};
use crate::events::LaunchKind;
use crate::solver::{horizontal, MovementSolver};
use crate::timers::ActionTimer;

impl ActionMachine {
    /// Whether a hit landed less than `cooldown` seconds ago.
    pub fn in_damage_cooldown(&self, cooldown: f32) -> bool {
        self.last_hit_time.is_some_and(|hit| self.clock - hit < cooldown)
    }

    /// React to a hit coming from `source`.
    ///
    /// Every action is dropped, the avatar is knocked away from `source` (or
    /// backwards when there is none) and input stays blocked for the stun
    /// time. Returns `false` without doing anything inside the damage
    /// cooldown.
    pub fn take_hit<S: MovementSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        source: Option<Vec3>,
        config: MachineConfig<'_>,
    ) -> bool {
        let action = &config.action;
        if self.in_damage_cooldown(action.damage_cooldown) {
            return false;
        }

        self.reset_all(solver);
        self.last_hit_time = Some(self.clock);
        self.state.hit_stunned = true;
        self.timers
            .set(ActionTimer::HitStun, action.hit_stun_time, TimerMode::Once);

        let away = source
            .map(|source| horizontal(solver.position() - source).normalize_or_zero())
            .filter(|away| *away != Vec3::ZERO)
            .unwrap_or_else(|| -horizontal(solver.forward()).normalize_or(Vec3::NEG_Z));
        let velocity = away * action.hit_knockback_horizontal + Vec3::Y * action.hit_knockback_up;
        self.launch(solver, LaunchKind::HitKnockback, velocity, true, true);
        debug!("hit: knocked back at {:?}", velocity);
        true
    }

    pub(super) fn on_hit_stun_elapsed(&mut self) {
        self.state.hit_stunned = false;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::events::ActionEventKind;
    use crate::intent::ActionInput;
    use crate::state::{AirAction, GroundPoundPhase};

    fn hit_from(rig: &mut Rig, source: Option<Vec3>) -> bool {
        let config = MachineConfig::new(&rig.action, &rig.wall);
        rig.machine.take_hit(&mut rig.solver, source, config)
    }

    #[test]
    fn knockback_points_away_from_source() {
        let mut rig = Rig::grounded();
        assert!(hit_from(&mut rig, Some(Vec3::new(-100.0, 40.0, 0.0))));

        assert_eq!(rig.solver.velocity, Vec3::new(700.0, 320.0, 0.0));
        assert!(rig.solver.is_falling());
        assert!(rig.machine.take_events().contains(&ActionEventKind::Launched {
            kind: LaunchKind::HitKnockback,
            velocity: Vec3::new(700.0, 320.0, 0.0),
        }));
    }

    #[test]
    fn knockback_without_source_pushes_backwards() {
        let mut rig = Rig::grounded();
        rig.solver.forward = Vec3::Z;
        hit_from(&mut rig, None);
        assert_eq!(rig.solver.velocity, Vec3::new(0.0, 320.0, -700.0));
    }

    #[test]
    fn hit_cancels_running_actions() {
        let mut rig = Rig::airborne();
        rig.step(ActionInput::idle().crouch());
        assert_eq!(rig.state().ground_pound, GroundPoundPhase::Preparing);

        hit_from(&mut rig, Some(Vec3::new(0.0, 0.0, 100.0)));

        assert_eq!(rig.state().ground_pound, GroundPoundPhase::None);
        assert!(!rig.machine.timers().is_active(ActionTimer::GroundPoundPrepare));
        assert_eq!(rig.solver.tuning, rig.baseline());
    }

    #[test]
    fn stun_blocks_input_until_it_elapses() {
        let mut rig = Rig::grounded();
        hit_from(&mut rig, Some(Vec3::NEG_X));
        rig.land();

        rig.step(ActionInput::idle().jump().moving(Vec3::Z));
        assert_eq!(rig.state().jump_stage, 0);
        assert_eq!(rig.solver.movement_input, Vec3::ZERO);
        assert!(!rig.machine.can_accept_movement_input());

        rig.step(ActionInput::idle().crouch());
        assert!(!rig.solver.crouched);

        rig.wait(2.6);
        assert!(!rig.state().hit_stunned);
        rig.step(ActionInput::idle().jump().moving(Vec3::Z));
        assert_eq!(rig.state().jump_stage, 1);
        assert_eq!(rig.solver.movement_input, Vec3::Z);
    }

    #[test]
    fn air_input_is_ignored_while_stunned() {
        let mut rig = Rig::airborne();
        hit_from(&mut rig, Some(Vec3::NEG_X));
        rig.step(ActionInput::idle().crouch());
        assert_eq!(rig.state().ground_pound, GroundPoundPhase::None);
        assert_eq!(rig.state().air_action(), AirAction::None);
    }

    #[test]
    fn hits_inside_cooldown_are_ignored() {
        let mut rig = Rig::grounded();
        assert!(hit_from(&mut rig, Some(Vec3::NEG_X)));
        rig.wait(0.3);
        assert!(rig.machine.in_damage_cooldown(rig.action.damage_cooldown));
        let velocity = rig.solver.velocity;
        assert!(!hit_from(&mut rig, Some(Vec3::X)));
        assert_eq!(rig.solver.velocity, velocity);

        rig.wait(0.3);
        assert!(!rig.machine.in_damage_cooldown(rig.action.damage_cooldown));
        assert!(hit_from(&mut rig, Some(Vec3::X)));
        assert_eq!(rig.solver.velocity, Vec3::new(-700.0, 320.0, 0.0));
    }

    #[test]
    fn stun_length_comes_from_config() {
        let mut rig = Rig::grounded();
        rig.action = rig.action.clone().with_hit_timing(0.5, 0.1);
        hit_from(&mut rig, None);
        rig.wait(0.55);
        assert!(!rig.state().hit_stunned);
        assert!(hit_from(&mut rig, None));
    }

    #[test]
    fn second_hit_restarts_the_stun() {
        let mut rig = Rig::grounded();
        hit_from(&mut rig, None);
        rig.wait(1.0);
        hit_from(&mut rig, None);
        rig.wait(2.0);
        assert!(rig.state().hit_stunned, "stun measured from the second hit");
        rig.wait(0.6);
        assert!(!rig.state().hit_stunned);
    }
}
