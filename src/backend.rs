//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement to
//! work with the avatar controller. The backend owns the movement solver
//! (walking and falling integration, collision response) and exposes the
//! handful of reads and writes the action machine and the capture controller
//! need. [`BackendSolver`] adapts it to the per-avatar [`MovementSolver`] the
//! machine is written against.

use std::marker::PhantomData;

use bevy::ecs::schedule::InternedScheduleLabel;
use bevy::prelude::*;

use crate::collision::{CollisionData, WallProximity};
use crate::overlay::MovementTuning;
use crate::solver::{MovementMode, MovementSolver};

/// Trait for physics backend implementations.
///
/// All functions are static and take the ECS world plus the entity they act
/// on, so that systems can call them from exclusive systems without holding
/// queries. Missing components are not an error: getters return neutral
/// defaults and setters do nothing.
///
/// See [`KinematicBackend`](crate::kinematic::KinematicBackend) for the
/// reference implementation.
pub trait AvatarPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Add backend systems to the schedule the controller runs in.
    ///
    /// Systems should go into
    /// [`AvatarControllerSet::Sensors`](crate::AvatarControllerSet::Sensors)
    /// or [`AvatarControllerSet::Sync`](crate::AvatarControllerSet::Sync).
    fn add_systems(_app: &mut App, _schedule: InternedScheduleLabel) {}

    /// Current movement mode of an entity.
    fn movement_mode(world: &World, entity: Entity) -> MovementMode;

    /// Switch movement mode. `Inert` must stop all simulation of the body.
    fn set_movement_mode(world: &mut World, entity: Entity, mode: MovementMode);

    /// Get the current velocity of an entity.
    fn velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the velocity of an entity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Normal of the floor the entity stands on, if grounded.
    fn floor_normal(world: &World, entity: Entity) -> Option<Vec3>;

    /// Get the current position of an entity.
    fn position(world: &World, entity: Entity) -> Vec3;

    /// Teleport an entity.
    fn set_position(world: &mut World, entity: Entity, position: Vec3);

    /// Horizontal facing direction of an entity.
    fn forward(world: &World, entity: Entity) -> Vec3;

    /// Snap the facing direction of an entity.
    fn set_forward(world: &mut World, entity: Entity, forward: Vec3);

    /// Solver tuning currently applied to an entity.
    fn tuning(world: &World, entity: Entity) -> MovementTuning;

    /// Apply solver tuning to an entity.
    fn set_tuning(world: &mut World, entity: Entity, tuning: MovementTuning);

    /// Whether the entity is crouched.
    fn is_crouched(world: &World, entity: Entity) -> bool;

    /// Crouch or stand up.
    fn set_crouched(world: &mut World, entity: Entity, crouched: bool);

    /// World-space movement input for this tick.
    fn set_movement_input(world: &mut World, entity: Entity, input: Vec3);

    /// Wall detector state of an entity for this tick.
    fn wall_proximity(world: &World, entity: Entity) -> WallProximity;

    /// Sweep a sphere from `origin` along `direction` and return the first
    /// blocking hit.
    ///
    /// # Arguments
    /// * `world` - The ECS world for queries
    /// * `origin` - Sphere center at the start of the sweep
    /// * `direction` - Cast direction (normalized by the caller)
    /// * `radius` - Sphere radius
    /// * `max_distance` - Maximum travel of the sphere center
    /// * `exclude_entity` - Entity to exclude from the cast (usually self)
    fn shape_cast(
        world: &World,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
        exclude_entity: Entity,
    ) -> Option<CollisionData>;

    /// Whether an upright capsule placed at `center` would overlap anything
    /// blocking.
    fn overlap_blocking(
        world: &World,
        center: Vec3,
        radius: f32,
        half_height: f32,
        exclude: &[Entity],
    ) -> bool;

    /// Nearest navigable point within `search_radius` of `point`.
    fn project_to_navigation(_world: &World, _point: Vec3, _search_radius: f32) -> Option<Vec3> {
        // Default implementation has no navigation data
        None
    }

    /// Capsule `(radius, half_height)` of an entity's collision footprint.
    fn capsule_size(_world: &World, _entity: Entity) -> (f32, f32) {
        (42.0, 96.0)
    }

    /// Hide or show an entity.
    fn set_hidden(world: &mut World, entity: Entity, hidden: bool);

    /// Turn collision of an entity on or off.
    fn set_collision_enabled(world: &mut World, entity: Entity, enabled: bool);

    /// Make `entity` follow `parent` until detached.
    fn attach_to(world: &mut World, entity: Entity, parent: Entity);

    /// Stop following, keeping the current world position.
    fn detach(world: &mut World, entity: Entity);
}

/// [`MovementSolver`] view of one entity through a backend.
pub struct BackendSolver<'w, B: AvatarPhysicsBackend> {
    world: &'w mut World,
    entity: Entity,
    _backend: PhantomData<B>,
}

impl<'w, B: AvatarPhysicsBackend> BackendSolver<'w, B> {
    pub fn new(world: &'w mut World, entity: Entity) -> Self {
        Self {
            world,
            entity,
            _backend: PhantomData,
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }
}

impl<B: AvatarPhysicsBackend> MovementSolver for BackendSolver<'_, B> {
    fn movement_mode(&self) -> MovementMode {
        B::movement_mode(self.world, self.entity)
    }

    fn set_movement_mode(&mut self, mode: MovementMode) {
        B::set_movement_mode(self.world, self.entity, mode);
    }

    fn velocity(&self) -> Vec3 {
        B::velocity(self.world, self.entity)
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        B::set_velocity(self.world, self.entity, velocity);
    }

    fn floor_normal(&self) -> Option<Vec3> {
        B::floor_normal(self.world, self.entity)
    }

    fn position(&self) -> Vec3 {
        B::position(self.world, self.entity)
    }

    fn forward(&self) -> Vec3 {
        B::forward(self.world, self.entity)
    }

    fn set_forward(&mut self, forward: Vec3) {
        B::set_forward(self.world, self.entity, forward);
    }

    fn tuning(&self) -> MovementTuning {
        B::tuning(self.world, self.entity)
    }

    fn set_tuning(&mut self, tuning: MovementTuning) {
        B::set_tuning(self.world, self.entity, tuning);
    }

    fn is_crouched(&self) -> bool {
        B::is_crouched(self.world, self.entity)
    }

    fn set_crouched(&mut self, crouched: bool) {
        B::set_crouched(self.world, self.entity, crouched);
    }

    fn set_movement_input(&mut self, input: Vec3) {
        B::set_movement_input(self.world, self.entity, input);
    }

    fn wall_proximity(&self) -> WallProximity {
        B::wall_proximity(self.world, self.entity)
    }

    fn shape_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
    ) -> Option<CollisionData> {
        B::shape_cast(
            self.world,
            origin,
            direction,
            radius,
            max_distance,
            self.entity,
        )
    }
}
