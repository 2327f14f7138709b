//! Core controller systems.
//!
//! These systems drive the action machines and the capture sessions. They are
//! generic over the physics backend to allow different physics engines to be
//! used, and run as exclusive systems because every machine tick talks to the
//! backend through the world.

use bevy::ecs::event::EventCursor;
use bevy::prelude::*;

use crate::backend::{AvatarPhysicsBackend, BackendSolver};
use crate::capture::{
    release_capture, try_capture, CaptureCommand, CaptureController, CaptureReleaseReason,
};
use crate::config::{ActionConfig, WallConfig};
use crate::control::{PlayerController, PossessedBy};
use crate::events::ActionEvent;
use crate::intent::{ActionInput, ActionIntent};
use crate::machine::{ActionMachine, MachineConfig};
use crate::state::ActionStatus;

/// Run `f` on the machine of `entity` with a backend solver for it.
///
/// The machine is taken out of the world for the duration of the call, then
/// its recorded changes are published and [`ActionStatus`] is refreshed.
pub(crate) fn with_machine<B: AvatarPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    f: impl FnOnce(&mut ActionMachine, &mut BackendSolver<'_, B>),
) {
    let Some(mut machine) = world
        .get_mut::<ActionMachine>(entity)
        .map(|mut machine| std::mem::take(&mut *machine))
    else {
        return;
    };

    {
        let mut solver = BackendSolver::<B>::new(world, entity);
        f(&mut machine, &mut solver);
    }

    let events = machine.take_events();
    let status = ActionStatus::from_state(machine.state());
    if let Some(mut slot) = world.get_mut::<ActionMachine>(entity) {
        *slot = machine;
    }
    match world.get_mut::<ActionStatus>(entity) {
        Some(mut current) => {
            if *current != status {
                *current = status;
            }
        }
        None => {
            world.entity_mut(entity).insert(status);
        }
    }
    if !events.is_empty() {
        world.send_event_batch(
            events
                .into_iter()
                .map(|kind| ActionEvent { avatar: entity, kind }),
        );
    }
}

/// Fully reset the action machine of `entity`.
pub fn reset_action_machine<B: AvatarPhysicsBackend>(world: &mut World, entity: Entity) {
    with_machine::<B>(world, entity, |machine, solver| machine.reset_all(solver));
}

/// Tick every action machine.
///
/// Intent is latched against the yaw of the possessing player controller.
/// Avatars that are capturing something are skipped; their intent is still
/// latched so that stale presses do not fire on release.
pub fn run_action_machines<B: AvatarPhysicsBackend>(world: &mut World) {
    // Get delta time, with fallback for testing scenarios
    let dt = world
        .get_resource::<Time>()
        .map(|t| t.delta_secs())
        .filter(|&d| d > 0.0)
        .unwrap_or(1.0 / 60.0);

    let yaws: Vec<(Entity, f32)> = world
        .query::<(Entity, &PlayerController)>()
        .iter(world)
        .map(|(entity, player)| (entity, player.control_yaw()))
        .collect();

    let avatars: Vec<(Entity, ActionInput, ActionConfig, WallConfig)> = world
        .query_filtered::<(
            Entity,
            &mut ActionIntent,
            Option<&PossessedBy>,
            Option<&CaptureController>,
            Option<&ActionConfig>,
            Option<&WallConfig>,
        ), With<ActionMachine>>()
        .iter_mut(world)
        .filter_map(|(entity, mut intent, possessed_by, capture, action, wall)| {
            let yaw = possessed_by
                .and_then(|possessed_by| {
                    yaws.iter()
                        .find(|(controller, _)| *controller == possessed_by.0)
                        .map(|(_, yaw)| *yaw)
                })
                .unwrap_or(0.0);
            let input = intent.latch(yaw);
            if capture.is_some_and(CaptureController::is_capturing) {
                return None;
            }
            Some((
                entity,
                input,
                action.cloned().unwrap_or_default(),
                wall.cloned().unwrap_or_default(),
            ))
        })
        .collect();

    for (entity, input, action, wall) in avatars {
        with_machine::<B>(world, entity, |machine, solver| {
            machine.update(solver, &input, dt, MachineConfig::new(&action, &wall));
        });
    }
}

/// Handle pending [`CaptureCommand`]s. Rejections are logged and dropped.
pub fn process_capture_commands<B: AvatarPhysicsBackend>(
    world: &mut World,
    mut cursor: Local<EventCursor<CaptureCommand>>,
) {
    let Some(events) = world.get_resource::<Events<CaptureCommand>>() else {
        return;
    };
    let commands: Vec<CaptureCommand> = cursor.read(events).copied().collect();

    for command in commands {
        let result = match command {
            CaptureCommand::Capture {
                avatar,
                target,
                context,
            } => try_capture::<B>(world, avatar, target, &context),
            CaptureCommand::Release { avatar } => {
                release_capture::<B>(world, avatar, CaptureReleaseReason::Manual).map(|_| ())
            }
            CaptureCommand::ForceReleaseForGameOver { avatar } => {
                release_capture::<B>(world, avatar, CaptureReleaseReason::GameOver).map(|_| ())
            }
        };
        if let Err(error) = result {
            debug!("capture command {:?} rejected: {}", command, error);
        }
    }
}

/// Keep capture sessions consistent.
///
/// The camera stays on the avatar with auto management off, and a session
/// whose target or pawn disappeared is released.
pub fn maintain_capture_sessions<B: AvatarPhysicsBackend>(world: &mut World) {
    let sessions: Vec<_> = world
        .query::<&CaptureController>()
        .iter(world)
        .filter_map(|capture| capture.session().copied())
        .collect();

    for session in sessions {
        let target_gone = world.get_entity(session.target).is_err()
            || world.get_entity(session.pawn).is_err();
        if target_gone {
            if let Err(error) =
                release_capture::<B>(world, session.avatar, CaptureReleaseReason::InvalidPawn)
            {
                warn!("could not release {:?}: {}", session.avatar, error);
            }
            continue;
        }

        if let Some(mut player) = world.get_mut::<PlayerController>(session.controller) {
            if player.view_target != Some(session.avatar) {
                player.view_target = Some(session.avatar);
            }
            if player.auto_manage_camera_target {
                player.auto_manage_camera_target = false;
            }
        }
    }
}
