//! # `avatar_action_controller`
//!
//! Action state machine and possession ("capture") controller for a 3D
//! platformer avatar, with physics backend abstraction.
//!
//! This crate provides:
//! - A jump chain with three stages and crouch-derived long jumps and backflips
//! - A ground pound with its prepare, pound and stun phases, a rebound jump
//!   and a dive out of it
//! - A steerable roll and a downhill speed boost
//! - Wall slide and wall kick with probe-based wall validation
//! - Capture: handing control to another actor while the camera and damage
//!   stay anchored to the avatar
//! - Hit reaction: knockback, a stun that blocks input and a damage cooldown
//!
//! ## Architecture
//!
//! The movement solver (walking and falling integration, collision response)
//! belongs to a physics backend. The action machine only configures it:
//! 1. The backend reports movement mode, velocity, floor and wall contact
//! 2. The machine reacts to input edges and solver feedback
//! 3. Special actions override solver tuning through a save/restore overlay
//!    and launch the avatar
//!
//! The capture controller sits above the machine and fully resets it on every
//! handoff.
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use avatar_action_controller::prelude::*;
//!
//! // Components for a player avatar
//! let machine = ActionMachine::new();
//! let config = ActionConfig::player();
//! let walls = WallConfig::default();
//! let intent = ActionIntent::default();
//!
//! // These can be spawned with a backend body such as `KinematicBody`
//! ```

use std::marker::PhantomData;

use bevy::ecs::schedule::{InternedScheduleLabel, ScheduleLabel};
use bevy::prelude::*;

pub mod backend;
pub mod capture;
pub mod collision;
pub mod config;
pub mod control;
pub mod damage;
pub mod events;
pub mod intent;
pub mod kinematic;
pub mod machine;
pub mod overlay;
pub mod solver;
pub mod state;
pub mod systems;
pub mod timers;
pub mod wall_probe;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{AvatarPhysicsBackend, BackendSolver};
    pub use crate::capture::{
        force_release_for_game_over, release_capture, try_capture, Capturable, CaptureCommand,
        CaptureContext, CaptureController, CaptureError, CaptureReleaseContext,
        CaptureReleaseReason, CaptureSession, CaptureTarget,
    };
    pub use crate::config::{ActionConfig, CaptureConfig, WallConfig};
    pub use crate::control::{AiController, PlayerController, PossessedBy};
    pub use crate::damage::{DamageEvent, GameOver, Health};
    pub use crate::events::{ActionEvent, ActionEventKind, CaptureEvent, LaunchKind};
    pub use crate::intent::{ActionInput, ActionIntent};
    pub use crate::kinematic::{KinematicBackend, KinematicBody, NavigationArea, StaticCollider};
    pub use crate::machine::{ActionMachine, MachineConfig};
    pub use crate::overlay::{MovementOverlay, MovementTuning, TuningField};
    pub use crate::solver::{MovementMode, MovementSolver};
    pub use crate::state::{
        ActionState, ActionStatus, ActiveAction, AirAction, GroundPoundPhase, RollPhase,
        WallState,
    };
    pub use crate::{AvatarControllerPlugin, AvatarControllerSet};
}

/// System sets of the controller, chained in this order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvatarControllerSet {
    /// Backend sensors (wall detectors).
    Sensors,
    /// Action machines.
    Actions,
    /// Damage routing and capture sessions.
    Capture,
    /// Backend write-back (attachments, transforms).
    Sync,
}

/// Main plugin for the avatar controller.
///
/// This plugin is generic over a physics backend `B` which owns the movement
/// solver and answers geometry queries.
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `KinematicBackend`)
///
/// # Examples
///
/// ```rust,no_run
/// use bevy::prelude::*;
/// use avatar_action_controller::prelude::*;
///
/// App::new()
///     .add_plugins(MinimalPlugins)
///     .add_plugins(AvatarControllerPlugin::<KinematicBackend>::default())
///     .run();
/// ```
pub struct AvatarControllerPlugin<B: backend::AvatarPhysicsBackend> {
    schedule: InternedScheduleLabel,
    _marker: PhantomData<B>,
}

impl<B: backend::AvatarPhysicsBackend> Default for AvatarControllerPlugin<B> {
    fn default() -> Self {
        Self::in_schedule(FixedUpdate)
    }
}

impl<B: backend::AvatarPhysicsBackend> AvatarControllerPlugin<B> {
    /// Run the controller in `schedule` instead of `FixedUpdate`.
    pub fn in_schedule(schedule: impl ScheduleLabel) -> Self {
        Self {
            schedule: schedule.intern(),
            _marker: PhantomData,
        }
    }
}

impl<B: backend::AvatarPhysicsBackend> Plugin for AvatarControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::ActionConfig>();
        app.register_type::<config::WallConfig>();
        app.register_type::<config::CaptureConfig>();
        app.register_type::<intent::ActionIntent>();
        app.register_type::<state::ActionStatus>();
        app.register_type::<overlay::MovementTuning>();
        app.register_type::<solver::MovementMode>();
        app.register_type::<capture::CaptureController>();
        app.register_type::<control::PlayerController>();
        app.register_type::<control::PossessedBy>();
        app.register_type::<control::AiController>();
        app.register_type::<damage::Health>();

        app.add_event::<events::ActionEvent>();
        app.add_event::<events::CaptureEvent>();
        app.add_event::<capture::CaptureCommand>();
        app.add_event::<damage::DamageEvent>();
        app.add_event::<damage::GameOver>();

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.configure_sets(
            self.schedule,
            (
                AvatarControllerSet::Sensors,
                AvatarControllerSet::Actions,
                AvatarControllerSet::Capture,
                AvatarControllerSet::Sync,
            )
                .chain(),
        );

        app.add_systems(
            self.schedule,
            systems::run_action_machines::<B>.in_set(AvatarControllerSet::Actions),
        );
        app.add_systems(
            self.schedule,
            (
                damage::route_damage::<B>,
                systems::process_capture_commands::<B>,
                systems::maintain_capture_sessions::<B>,
            )
                .chain()
                .in_set(AvatarControllerSet::Capture),
        );

        B::add_systems(app, self.schedule);
    }
}
