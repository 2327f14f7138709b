//! Capture (possession swap).
//!
//! An avatar with a [`CaptureController`] can take over another actor that
//! carries a [`CaptureTarget`]. While the session lasts, the player
//! controller possesses the target's pawn, the avatar is hidden, inert and
//! carried along with the pawn, and the camera stays on the avatar. Damage
//! the pawn takes goes to the avatar (see [`crate::damage`]).
//!
//! Both transitions are atomic: every precondition is checked before the
//! first mutation, so a failed [`try_capture`] leaves the world untouched.

use bevy::prelude::*;
use thiserror::Error;

use crate::backend::AvatarPhysicsBackend;
use crate::config::CaptureConfig;
use crate::control::{has_controller, possess, resolve_player_controller, AiController, PlayerController};
use crate::events::CaptureEvent;
use crate::solver::MovementMode;
use crate::systems::reset_action_machine;

/// Why a capture session ended.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureReleaseReason {
    /// The player let go.
    #[default]
    Manual,
    /// The avatar ran out of health while capturing.
    GameOver,
    /// The captured target or its pawn disappeared.
    InvalidPawn,
}

/// Details of a capture attempt, passed to the target.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub struct CaptureContext {
    /// The thing that made contact (a thrown cap, a projectile).
    pub source: Option<Entity>,
    /// Controller that started the attempt.
    pub instigator: Option<Entity>,
    pub hit_location: Vec3,
}

impl CaptureContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the source entity.
    pub fn with_source(mut self, source: Entity) -> Self {
        self.source = Some(source);
        self
    }

    /// Builder: set the hit location.
    pub fn with_hit_location(mut self, hit_location: Vec3) -> Self {
        self.hit_location = hit_location;
        self
    }
}

/// Details of a release, passed to the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureReleaseContext {
    pub reason: CaptureReleaseReason,
    /// The avatar that let go.
    pub released_by: Entity,
    /// Where the avatar reappeared.
    pub exit_location: Vec3,
}

/// Behavior of an actor that can be captured.
///
/// Only [`can_be_captured`](Capturable::can_be_captured) is required. The
/// callbacks let the actor react locally (hide its AI, play a stun, show a
/// hit reaction) without touching any gameplay state the capture owns.
pub trait Capturable: Send + Sync + 'static {
    /// Whether this particular attempt may succeed right now.
    fn can_be_captured(&self, context: &CaptureContext) -> bool;

    /// Entity the player controller should possess. Defaults to the target
    /// itself.
    fn capture_pawn(&self) -> Option<Entity> {
        None
    }

    /// The capture succeeded; `controller` now drives the pawn.
    fn on_captured(&mut self, _controller: Entity, _context: &CaptureContext) {}

    /// The capture ended.
    fn on_released(&mut self, _context: &CaptureReleaseContext) {}

    /// The pawn was hit while captured. The avatar took the damage.
    fn on_damaged_while_captured(
        &mut self,
        _amount: f32,
        _instigator: Option<Entity>,
        _causer: Option<Entity>,
    ) {
    }
}

/// Makes an entity capturable.
#[derive(Component)]
pub struct CaptureTarget(Box<dyn Capturable>);

impl CaptureTarget {
    pub fn new(capturable: impl Capturable) -> Self {
        Self(Box::new(capturable))
    }

    pub fn capturable(&self) -> &dyn Capturable {
        self.0.as_ref()
    }

    pub fn capturable_mut(&mut self) -> &mut dyn Capturable {
        self.0.as_mut()
    }
}

impl std::fmt::Debug for CaptureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureTarget").finish_non_exhaustive()
    }
}

/// An active capture.
///
/// All handles are non-owning; any of them may be despawned while the session
/// lasts.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct CaptureSession {
    pub avatar: Entity,
    pub target: Entity,
    /// Entity the controller possesses; the target unless it names another.
    pub pawn: Entity,
    pub controller: Entity,
    /// Controller's camera auto-management flag before the capture.
    pub previous_auto_camera_management: bool,
}

/// Capture capability of an avatar.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct CaptureController {
    session: Option<CaptureSession>,
}

impl CaptureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    /// Whether `entity` is the captured target or its pawn.
    pub fn controls(&self, entity: Entity) -> bool {
        self.session
            .is_some_and(|session| session.target == entity || session.pawn == entity)
    }
}

/// Why a capture operation was refused. Nothing changed in the world.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    #[error("entity {0} has no capture controller")]
    MissingCaptureController(Entity),
    #[error("a capture session is already active")]
    AlreadyCapturing,
    #[error("no capture session is active")]
    NotCapturing,
    #[error("no player controller to hand control to")]
    NoController,
    #[error("entity {0} is not capturable")]
    NotCapturable(Entity),
    #[error("an avatar cannot capture itself")]
    SelfCapture,
    #[error("entity {0} rejected the capture")]
    Rejected(Entity),
    #[error("capture pawn {0} does not exist")]
    MissingPawn(Entity),
}

/// Requests handled by the capture system.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum CaptureCommand {
    Capture {
        avatar: Entity,
        target: Entity,
        context: CaptureContext,
    },
    Release {
        avatar: Entity,
    },
    ForceReleaseForGameOver {
        avatar: Entity,
    },
}

/// Start capturing `target` with `avatar`.
pub fn try_capture<B: AvatarPhysicsBackend>(
    world: &mut World,
    avatar: Entity,
    target: Entity,
    context: &CaptureContext,
) -> Result<(), CaptureError> {
    let capture = world
        .get::<CaptureController>(avatar)
        .ok_or(CaptureError::MissingCaptureController(avatar))?;
    if capture.is_capturing() {
        return Err(CaptureError::AlreadyCapturing);
    }
    let controller = resolve_player_controller(world, avatar).ok_or(CaptureError::NoController)?;
    if target == avatar {
        return Err(CaptureError::SelfCapture);
    }
    let capturable = world
        .get::<CaptureTarget>(target)
        .ok_or(CaptureError::NotCapturable(target))?
        .capturable();
    if !capturable.can_be_captured(context) {
        return Err(CaptureError::Rejected(target));
    }
    let pawn = capturable.capture_pawn().unwrap_or(target);
    if world.get_entity(pawn).is_err() {
        return Err(CaptureError::MissingPawn(pawn));
    }

    if let Some(mut target) = world.get_mut::<CaptureTarget>(target) {
        target.capturable_mut().on_captured(controller, context);
    }

    reset_action_machine::<B>(world, avatar);
    B::set_velocity(world, avatar, Vec3::ZERO);
    B::set_movement_mode(world, avatar, MovementMode::Inert);
    B::set_collision_enabled(world, avatar, false);
    B::set_hidden(world, avatar, true);
    B::attach_to(world, avatar, pawn);

    let previous_auto_camera_management = world
        .get_mut::<PlayerController>(controller)
        .map(|mut player| {
            let previous = player.auto_manage_camera_target;
            player.auto_manage_camera_target = false;
            previous
        })
        .unwrap_or(true);
    possess(world, controller, pawn);
    if let Some(mut player) = world.get_mut::<PlayerController>(controller) {
        player.view_target = Some(avatar);
    }

    if let Some(mut capture) = world.get_mut::<CaptureController>(avatar) {
        capture.session = Some(CaptureSession {
            avatar,
            target,
            pawn,
            controller,
            previous_auto_camera_management,
        });
    }

    info!("avatar {:?} captured {:?} (pawn {:?})", avatar, target, pawn);
    world.send_event(CaptureEvent::Began {
        avatar,
        target,
        pawn,
        controller,
    });
    Ok(())
}

/// End the capture session of `avatar` and return where the avatar reappeared.
pub fn release_capture<B: AvatarPhysicsBackend>(
    world: &mut World,
    avatar: Entity,
    reason: CaptureReleaseReason,
) -> Result<Vec3, CaptureError> {
    let session = world
        .get::<CaptureController>(avatar)
        .ok_or(CaptureError::MissingCaptureController(avatar))?
        .session
        .ok_or(CaptureError::NotCapturing)?;

    let config = world
        .get::<CaptureConfig>(avatar)
        .cloned()
        .unwrap_or_default();
    let exit_location = resolve_exit_location::<B>(world, &session, &config);

    B::detach(world, avatar);
    B::set_position(world, avatar, exit_location);
    B::set_hidden(world, avatar, false);
    B::set_collision_enabled(world, avatar, true);
    B::set_movement_mode(world, avatar, MovementMode::Falling);

    possess(world, session.controller, avatar);
    if let Some(mut player) = world.get_mut::<PlayerController>(session.controller) {
        player.view_target = Some(avatar);
        player.auto_manage_camera_target = session.previous_auto_camera_management;
    }

    reset_action_machine::<B>(world, avatar);

    if world.get_entity(session.pawn).is_ok() && !has_controller(world, session.pawn) {
        world.entity_mut(session.pawn).insert(AiController);
    }
    if let Some(mut target) = world.get_mut::<CaptureTarget>(session.target) {
        target.capturable_mut().on_released(&CaptureReleaseContext {
            reason,
            released_by: avatar,
            exit_location,
        });
    }

    if let Some(mut capture) = world.get_mut::<CaptureController>(avatar) {
        capture.session = None;
    }

    info!(
        "avatar {:?} released {:?} ({:?}) at {}",
        avatar, session.target, reason, exit_location
    );
    world.send_event(CaptureEvent::Released {
        avatar,
        target: session.target,
        reason,
        exit_location,
    });
    Ok(exit_location)
}

/// Release because the avatar ran out of health.
pub fn force_release_for_game_over<B: AvatarPhysicsBackend>(
    world: &mut World,
    avatar: Entity,
) -> Result<Vec3, CaptureError> {
    release_capture::<B>(world, avatar, CaptureReleaseReason::GameOver)
}

/// Where the avatar should reappear when `session` ends.
///
/// In order: a point ahead of and above the pawn if the avatar's capsule fits
/// there, the nearest navigable point to it, straight above the pawn. With the
/// pawn gone, the avatar's own position.
pub fn resolve_exit_location<B: AvatarPhysicsBackend>(
    world: &World,
    session: &CaptureSession,
    config: &CaptureConfig,
) -> Vec3 {
    if world.get_entity(session.pawn).is_err() {
        return B::position(world, session.avatar);
    }

    let origin = B::position(world, session.pawn);
    let forward = B::forward(world, session.pawn);
    let desired =
        origin + forward * config.exit_forward_offset + Vec3::Y * config.exit_up_offset;

    let (radius, half_height) = B::capsule_size(world, session.avatar);
    if !B::overlap_blocking(
        world,
        desired,
        radius,
        half_height,
        &[session.avatar, session.pawn],
    ) {
        return desired;
    }
    if let Some(projected) =
        B::project_to_navigation(world, desired, config.exit_nav_search_radius)
    {
        return projected;
    }
    origin + Vec3::Y * config.exit_fallback_up
}
