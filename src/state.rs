//! Action state of an avatar.
//!
//! Air actions, wall actions and the roll are mutually exclusive, so they share
//! a single [`ActiveAction`]. The per-family enums ([`AirAction`],
//! [`WallState`], [`RollPhase`]) are projections of it for consumers that only
//! care about one family.

use bevy::prelude::*;

/// The special action currently driving the avatar, if any.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveAction {
    #[default]
    Idle,
    LongJump,
    Backflip,
    PoundJump,
    Dive,
    WallSlideStart,
    WallSlideLoop,
    WallKick,
    RollStart,
    RollLoop,
    RollEnd,
}

/// Airborne special action.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AirAction {
    #[default]
    None,
    LongJump,
    Backflip,
    PoundJump,
    Dive,
}

/// Ground pound sequence phase.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroundPoundPhase {
    #[default]
    None,
    Preparing,
    Pounding,
    Stunned,
}

/// Wall action phase.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WallState {
    #[default]
    None,
    SlideStart,
    SlideLoop,
    WallKick,
}

/// Roll phase.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollPhase {
    #[default]
    None,
    Start,
    Loop,
    End,
}

impl ActiveAction {
    pub fn air_action(self) -> AirAction {
        match self {
            ActiveAction::LongJump => AirAction::LongJump,
            ActiveAction::Backflip => AirAction::Backflip,
            ActiveAction::PoundJump => AirAction::PoundJump,
            ActiveAction::Dive => AirAction::Dive,
            _ => AirAction::None,
        }
    }

    pub fn wall_state(self) -> WallState {
        match self {
            ActiveAction::WallSlideStart => WallState::SlideStart,
            ActiveAction::WallSlideLoop => WallState::SlideLoop,
            ActiveAction::WallKick => WallState::WallKick,
            _ => WallState::None,
        }
    }

    pub fn roll_phase(self) -> RollPhase {
        match self {
            ActiveAction::RollStart => RollPhase::Start,
            ActiveAction::RollLoop => RollPhase::Loop,
            ActiveAction::RollEnd => RollPhase::End,
            _ => RollPhase::None,
        }
    }

    /// Whether the avatar is sliding on a wall (start or loop).
    pub fn is_wall_sliding(self) -> bool {
        matches!(self, ActiveAction::WallSlideStart | ActiveAction::WallSlideLoop)
    }

    pub fn is_rolling(self) -> bool {
        self.roll_phase() != RollPhase::None
    }
}

/// Full action state of one avatar.
///
/// Invariant: a ground pound phase other than `None` implies
/// `active == Idle`.
#[derive(Reflect, Debug, Clone, PartialEq)]
pub struct ActionState {
    pub active: ActiveAction,
    pub ground_pound: GroundPoundPhase,

    // === Jump chain ===
    /// Consecutive jump stage, 0 when not chaining.
    pub jump_stage: u8,
    /// Machine clock time of the last landing.
    pub last_landed_time: Option<f32>,

    // === Ground pound ===
    pub ground_pound_used_this_airtime: bool,
    pub pound_jump_window_open: bool,
    pub pound_jump_consumed: bool,
    /// Horizontal facing when the pound started; reused by a follow-up dive.
    pub ground_pound_facing: Option<Vec3>,

    // === Crouch ===
    pub crouch_held: bool,
    /// Horizontal speed when the current crouch began.
    pub crouch_start_speed: f32,

    // === Roll ===
    pub roll_direction: Vec3,
    /// Seconds left during which movement input is forced along the roll.
    pub roll_force_input_remaining: f32,

    // === Downhill boost ===
    pub downhill_boost_alpha: f32,
    pub downhill_hold_remaining: f32,

    // === Wall ===
    /// Outward normal of the wall being slid on or kicked from.
    pub wall_normal: Option<Vec3>,
    /// Machine clock time of the last wall kick.
    pub last_wall_kick_time: Option<f32>,
    /// Movement input and air steering suppressed after a kick.
    pub wall_kick_input_locked: bool,
    /// Wall detector overlap as of the last tick.
    pub wall_overlapping: bool,

    // === Hit reaction ===
    /// Input is blocked until the hit stun timer fires.
    pub hit_stunned: bool,
}

impl Default for ActionState {
    fn default() -> Self {
        Self {
            active: ActiveAction::Idle,
            ground_pound: GroundPoundPhase::None,
            jump_stage: 0,
            last_landed_time: None,
            ground_pound_used_this_airtime: false,
            pound_jump_window_open: false,
            pound_jump_consumed: false,
            ground_pound_facing: None,
            crouch_held: false,
            crouch_start_speed: 0.0,
            roll_direction: Vec3::ZERO,
            roll_force_input_remaining: 0.0,
            downhill_boost_alpha: 0.0,
            downhill_hold_remaining: 0.0,
            wall_normal: None,
            last_wall_kick_time: None,
            wall_kick_input_locked: false,
            wall_overlapping: false,
            hit_stunned: false,
        }
    }
}

impl ActionState {
    pub fn air_action(&self) -> AirAction {
        self.active.air_action()
    }

    pub fn wall_state(&self) -> WallState {
        self.active.wall_state()
    }

    pub fn roll_phase(&self) -> RollPhase {
        self.active.roll_phase()
    }

    /// Movement input is ignored for the whole ground pound sequence and
    /// while hit stunned.
    pub fn can_accept_movement_input(&self) -> bool {
        !self.hit_stunned
            && !matches!(
                self.ground_pound,
                GroundPoundPhase::Preparing | GroundPoundPhase::Pounding | GroundPoundPhase::Stunned
            )
    }

    /// A rebound jump is available right now.
    pub fn pound_jump_pending(&self) -> bool {
        self.pound_jump_window_open && !self.pound_jump_consumed
    }

    /// Whether any special state suppresses the downhill boost.
    pub fn in_special_state(&self) -> bool {
        self.active != ActiveAction::Idle || self.ground_pound != GroundPoundPhase::None
    }
}

/// Observable copy of an avatar's action state.
///
/// Written by the action system every tick so that animation and UI code can
/// query it without touching the machine.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct ActionStatus {
    pub air_action: AirAction,
    pub ground_pound: GroundPoundPhase,
    pub wall_state: WallState,
    pub roll_phase: RollPhase,
    pub jump_stage: u8,
    pub downhill_boost_alpha: f32,
    pub accepts_movement_input: bool,
    pub hit_stunned: bool,
}

impl ActionStatus {
    pub fn from_state(state: &ActionState) -> Self {
        Self {
            air_action: state.air_action(),
            ground_pound: state.ground_pound,
            wall_state: state.wall_state(),
            roll_phase: state.roll_phase(),
            jump_stage: state.jump_stage,
            downhill_boost_alpha: state.downhill_boost_alpha,
            accepts_movement_input: state.can_accept_movement_input(),
            hit_stunned: state.hit_stunned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_accepts_input() {
        let state = ActionState::default();
        assert!(state.can_accept_movement_input());
        assert_eq!(state.air_action(), AirAction::None);
        assert_eq!(state.wall_state(), WallState::None);
        assert_eq!(state.roll_phase(), RollPhase::None);
        assert!(!state.in_special_state());
    }

    #[test]
    fn ground_pound_phases_block_input() {
        let mut state = ActionState::default();
        for phase in [
            GroundPoundPhase::Preparing,
            GroundPoundPhase::Pounding,
            GroundPoundPhase::Stunned,
        ] {
            state.ground_pound = phase;
            assert!(!state.can_accept_movement_input(), "{phase:?} must block input");
        }
        state.ground_pound = GroundPoundPhase::None;
        assert!(state.can_accept_movement_input());
    }

    #[test]
    fn hit_stun_blocks_input_and_shows_in_status() {
        let state = ActionState {
            hit_stunned: true,
            ..default()
        };
        assert!(!state.can_accept_movement_input());
        let status = ActionStatus::from_state(&state);
        assert!(status.hit_stunned);
        assert!(!status.accepts_movement_input);
    }

    #[test]
    fn active_action_projects_to_one_family() {
        let all = [
            ActiveAction::Idle,
            ActiveAction::LongJump,
            ActiveAction::Backflip,
            ActiveAction::PoundJump,
            ActiveAction::Dive,
            ActiveAction::WallSlideStart,
            ActiveAction::WallSlideLoop,
            ActiveAction::WallKick,
            ActiveAction::RollStart,
            ActiveAction::RollLoop,
            ActiveAction::RollEnd,
        ];
        for action in all {
            let families = [
                action.air_action() != AirAction::None,
                action.wall_state() != WallState::None,
                action.roll_phase() != RollPhase::None,
            ];
            let driving = families.iter().filter(|f| **f).count();
            let expected = usize::from(action != ActiveAction::Idle);
            assert_eq!(driving, expected, "{action:?}");
        }
    }

    #[test]
    fn pound_jump_pending_requires_open_and_unconsumed() {
        let mut state = ActionState::default();
        assert!(!state.pound_jump_pending());
        state.pound_jump_window_open = true;
        assert!(state.pound_jump_pending());
        state.pound_jump_consumed = true;
        assert!(!state.pound_jump_pending());
    }
}
