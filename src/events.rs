//! Events produced for animation, audio and UI consumers.

use bevy::prelude::*;

use crate::capture::CaptureReleaseReason;
use crate::state::{AirAction, GroundPoundPhase, RollPhase, WallState};

/// What kind of launch the machine applied.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchKind {
    /// Jump chain stage 1-3.
    Jump { stage: u8 },
    LongJump,
    Backflip,
    GroundPound,
    PoundJump,
    Dive,
    WallKick,
    /// Knockback from taking a hit.
    HitKnockback,
}

/// A single observable change of an avatar's action state.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub enum ActionEventKind {
    AirAction { from: AirAction, to: AirAction },
    GroundPound { from: GroundPoundPhase, to: GroundPoundPhase },
    Wall { from: WallState, to: WallState },
    Roll { from: RollPhase, to: RollPhase },
    JumpStage { from: u8, to: u8 },
    Launched { kind: LaunchKind, velocity: Vec3 },
}

/// Action state change on `avatar`.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct ActionEvent {
    pub avatar: Entity,
    pub kind: ActionEventKind,
}

/// Capture session lifecycle.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum CaptureEvent {
    Began {
        avatar: Entity,
        target: Entity,
        pawn: Entity,
        controller: Entity,
    },
    Released {
        avatar: Entity,
        target: Entity,
        reason: CaptureReleaseReason,
        exit_location: Vec3,
    },
}

impl CaptureEvent {
    pub fn avatar(&self) -> Entity {
        match self {
            CaptureEvent::Began { avatar, .. } | CaptureEvent::Released { avatar, .. } => *avatar,
        }
    }
}
