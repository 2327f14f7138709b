//! Health and damage routing.
//!
//! Damage to a captured target is paid by the avatar that captured it; the
//! target only gets a notification. Everything else takes damage on its own
//! [`Health`]. An uncaptured entity with an [`ActionMachine`] also reacts to
//! the hit: it is knocked back and stunned, and ignores further damage for the
//! configured cooldown.

use bevy::ecs::event::EventCursor;
use bevy::prelude::*;

use crate::backend::AvatarPhysicsBackend;
use crate::capture::{force_release_for_game_over, CaptureController, CaptureTarget};
use crate::config::{ActionConfig, WallConfig};
use crate::control::PlayerController;
use crate::machine::{ActionMachine, MachineConfig};
use crate::systems::with_machine;

/// A health pool.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl Health {
    /// A full pool of `max`.
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }

    /// Remove `amount` and return what was actually removed.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        let before = self.current;
        self.current = (self.current - amount.max(0.0)).max(0.0);
        before - self.current
    }
}

/// Damage dealt to `target`.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct DamageEvent {
    pub target: Entity,
    pub amount: f32,
    /// Controller responsible for the damage.
    pub instigator: Option<Entity>,
    /// The thing that dealt it (projectile, hazard).
    pub causer: Option<Entity>,
}

impl DamageEvent {
    pub fn new(target: Entity, amount: f32) -> Self {
        Self {
            target,
            amount,
            instigator: None,
            causer: None,
        }
    }

    /// Builder: set the damage causer.
    pub fn with_causer(mut self, causer: Entity) -> Self {
        self.causer = Some(causer);
        self
    }

    /// Builder: set the responsible controller.
    pub fn with_instigator(mut self, instigator: Entity) -> Self {
        self.instigator = Some(instigator);
        self
    }
}

/// An avatar ran out of health.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOver {
    pub avatar: Entity,
}

/// Apply every pending [`DamageEvent`].
pub fn route_damage<B: AvatarPhysicsBackend>(
    world: &mut World,
    mut cursor: Local<EventCursor<DamageEvent>>,
) {
    let Some(events) = world.get_resource::<Events<DamageEvent>>() else {
        return;
    };
    let pending: Vec<DamageEvent> = cursor.read(events).copied().collect();

    for event in pending {
        if event.amount <= 0.0 {
            continue;
        }
        let capturing_avatar = world
            .query::<(Entity, &CaptureController)>()
            .iter(world)
            .find(|(_, capture)| capture.controls(event.target))
            .map(|(avatar, _)| avatar);

        match capturing_avatar {
            Some(avatar) => route_to_avatar::<B>(world, avatar, &event),
            None => {
                let reacts = reacts_to_hits(world, event.target);
                if reacts && in_damage_cooldown(world, event.target) {
                    debug!("damage on {:?} ignored during cooldown", event.target);
                    continue;
                }
                apply_to_own_health(world, event.target, event.amount);
                if reacts {
                    react_to_hit::<B>(world, &event);
                }
            }
        }
    }
}

/// Uncaptured action-driven entities react to hits. A capturing avatar is
/// hidden and inert.
fn reacts_to_hits(world: &World, entity: Entity) -> bool {
    world.get::<ActionMachine>(entity).is_some()
        && !world
            .get::<CaptureController>(entity)
            .is_some_and(CaptureController::is_capturing)
}

fn in_damage_cooldown(world: &World, entity: Entity) -> bool {
    let cooldown = world
        .get::<ActionConfig>(entity)
        .map_or_else(|| ActionConfig::default().damage_cooldown, |config| config.damage_cooldown);
    world
        .get::<ActionMachine>(entity)
        .is_some_and(|machine| machine.in_damage_cooldown(cooldown))
}

/// Where a hit came from: the causer, else the instigator's pawn.
fn knockback_source<B: AvatarPhysicsBackend>(world: &World, event: &DamageEvent) -> Option<Vec3> {
    let instigator_pawn = event.instigator.map(|instigator| {
        world
            .get::<PlayerController>(instigator)
            .and_then(|player| player.possessed)
            .unwrap_or(instigator)
    });
    event
        .causer
        .into_iter()
        .chain(instigator_pawn)
        .find(|source| *source != event.target && world.get_entity(*source).is_ok())
        .map(|source| B::position(world, source))
}

fn react_to_hit<B: AvatarPhysicsBackend>(world: &mut World, event: &DamageEvent) {
    let source = knockback_source::<B>(world, event);
    let action = world
        .get::<ActionConfig>(event.target)
        .cloned()
        .unwrap_or_default();
    let wall = world
        .get::<WallConfig>(event.target)
        .cloned()
        .unwrap_or_default();
    with_machine::<B>(world, event.target, |machine, solver| {
        machine.take_hit(solver, source, MachineConfig::new(&action, &wall));
    });
}

fn route_to_avatar<B: AvatarPhysicsBackend>(world: &mut World, avatar: Entity, event: &DamageEvent) {
    let Some(session) = world
        .get::<CaptureController>(avatar)
        .and_then(|capture| capture.session().copied())
    else {
        return;
    };
    debug!(
        "damage {} on captured {:?} routed to avatar {:?}",
        event.amount, event.target, avatar
    );

    let depleted = apply_to_own_health(world, avatar, event.amount);

    if let Some(mut target) = world.get_mut::<CaptureTarget>(session.target) {
        target
            .capturable_mut()
            .on_damaged_while_captured(event.amount, event.instigator, event.causer);
    }

    if depleted {
        if let Err(error) = force_release_for_game_over::<B>(world, avatar) {
            warn!("game over release failed for {:?}: {}", avatar, error);
        }
    }
}

/// Damage an entity's own health. Returns true when this hit emptied the
/// pool of an avatar, after sending [`GameOver`].
fn apply_to_own_health(world: &mut World, entity: Entity, amount: f32) -> bool {
    let Some(mut health) = world.get_mut::<Health>(entity) else {
        return false;
    };
    if health.is_depleted() {
        return false;
    }
    health.apply_damage(amount);
    if !health.is_depleted() {
        return false;
    }
    if world.get::<CaptureController>(entity).is_none() {
        return false;
    }

    info!("avatar {:?} ran out of health", entity);
    world.send_event(GameOver { avatar: entity });
    true
}
