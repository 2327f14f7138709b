//! Control and camera authority.
//!
//! A [`PlayerController`] possesses one pawn at a time and owns the camera's
//! view target. Possession is mirrored on the pawn by [`PossessedBy`]; pawns
//! driven by AI carry an [`AiController`] instead. Possessing a pawn takes it
//! away from any other controller.

use bevy::prelude::*;

/// The player's controller.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct PlayerController {
    /// Pawn receiving this controller's input.
    pub possessed: Option<Entity>,
    /// Entity the camera follows.
    pub view_target: Option<Entity>,
    /// Move the view target to every newly possessed pawn.
    pub auto_manage_camera_target: bool,
    /// Camera orientation; its yaw turns the move stick into world space.
    pub control_rotation: Quat,
}

impl Default for PlayerController {
    fn default() -> Self {
        Self {
            possessed: None,
            view_target: None,
            auto_manage_camera_target: true,
            control_rotation: Quat::IDENTITY,
        }
    }
}

impl PlayerController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yaw of the control rotation around Y, in radians.
    pub fn control_yaw(&self) -> f32 {
        let (yaw, _, _) = self.control_rotation.to_euler(EulerRot::YXZ);
        yaw
    }

    /// Builder: set the control rotation from a yaw angle.
    pub fn with_control_yaw(mut self, yaw: f32) -> Self {
        self.control_rotation = Quat::from_rotation_y(yaw);
        self
    }
}

/// Marks a pawn as possessed by the given player controller.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct PossessedBy(pub Entity);

/// Marks a pawn as driven by AI.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct AiController;

/// Hand `pawn` to `controller`.
///
/// The previous pawn of the controller is released, and the new pawn loses
/// its AI controller or any other possession. Does nothing when either entity
/// is missing or `controller` has no [`PlayerController`].
pub fn possess(world: &mut World, controller: Entity, pawn: Entity) {
    if world.get_entity(pawn).is_err() {
        return;
    }
    let Some(previous) = world
        .get::<PlayerController>(controller)
        .map(|player| player.possessed)
    else {
        return;
    };

    if let Some(previous) = previous.filter(|previous| *previous != pawn) {
        unpossess_pawn(world, previous);
    }
    if let Some(other) = world
        .get::<PossessedBy>(pawn)
        .map(|possessed_by| possessed_by.0)
        .filter(|other| *other != controller)
    {
        if let Some(mut other) = world.get_mut::<PlayerController>(other) {
            other.possessed = None;
        }
    }

    if let Ok(mut entity) = world.get_entity_mut(pawn) {
        entity.remove::<AiController>();
        entity.insert(PossessedBy(controller));
    }
    if let Some(mut player) = world.get_mut::<PlayerController>(controller) {
        player.possessed = Some(pawn);
        if player.auto_manage_camera_target {
            player.view_target = Some(pawn);
        }
    }
    debug!("controller {:?} possessed {:?}", controller, pawn);
}

/// Drop possession of `pawn`, leaving it without a controller.
pub fn unpossess_pawn(world: &mut World, pawn: Entity) {
    if let Ok(mut entity) = world.get_entity_mut(pawn) {
        entity.remove::<PossessedBy>();
    }
}

/// Whether `pawn` is driven by anything.
pub fn has_controller(world: &World, pawn: Entity) -> bool {
    world.get::<PossessedBy>(pawn).is_some() || world.get::<AiController>(pawn).is_some()
}

/// The player controller that should act for `avatar`: the one possessing
/// it, else the first one in the world.
pub fn resolve_player_controller(world: &mut World, avatar: Entity) -> Option<Entity> {
    let possessing = world
        .get::<PossessedBy>(avatar)
        .map(|possessed_by| possessed_by.0)
        .filter(|controller| world.get::<PlayerController>(*controller).is_some());
    possessing.or_else(|| {
        world
            .query_filtered::<Entity, With<PlayerController>>()
            .iter(world)
            .next()
    })
}
