//! Kinematic reference backend.
//!
//! [`KinematicBackend`] keeps the whole solver state in a [`KinematicBody`]
//! component and answers geometry queries against axis-aligned boxes
//! ([`StaticCollider`]) and flat [`NavigationArea`] rectangles. It does not
//! integrate motion: the game (or a test) moves bodies and switches their
//! movement mode. That makes it a good fit for headless use, for tests and
//! for games that run their own movement integration.

use bevy::ecs::schedule::InternedScheduleLabel;
use bevy::prelude::*;

use crate::backend::AvatarPhysicsBackend;
use crate::collision::{CollisionData, WallProximity};
use crate::overlay::MovementTuning;
use crate::solver::{horizontal, MovementMode};
use crate::AvatarControllerSet;

/// Solver state of a body driven by [`KinematicBackend`].
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct KinematicBody {
    /// Capsule center in world space.
    pub position: Vec3,
    pub velocity: Vec3,
    /// Horizontal facing, normalized.
    pub forward: Vec3,
    pub mode: MovementMode,
    /// Floor normal, only reported while grounded.
    pub floor_normal: Vec3,
    pub tuning: MovementTuning,
    pub crouched: bool,
    /// Last movement input written by the action machine.
    pub movement_input: Vec3,

    // === Collision Footprint ===
    pub radius: f32,
    pub half_height: f32,
    pub collision_enabled: bool,
    pub hidden: bool,

    // === Wall Detector ===
    /// Refresh `wall_proximity` from static colliders every tick.
    pub detect_walls: bool,
    /// Extra reach of the wall detector sphere beyond the capsule radius.
    pub wall_detector_margin: f32,
    #[reflect(ignore)]
    pub wall_proximity: WallProximity,

    /// Entity this body follows while attached.
    pub attached_to: Option<Entity>,
}

impl Default for KinematicBody {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            mode: MovementMode::Grounded,
            floor_normal: Vec3::Y,
            tuning: MovementTuning::default(),
            crouched: false,
            movement_input: Vec3::ZERO,
            radius: 42.0,
            half_height: 96.0,
            collision_enabled: true,
            hidden: false,
            detect_walls: true,
            wall_detector_margin: 10.0,
            wall_proximity: WallProximity::clear(),
            attached_to: None,
        }
    }
}

impl KinematicBody {
    /// A grounded body at `position`.
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ..default()
        }
    }

    /// An airborne body at `position`.
    pub fn falling(position: Vec3) -> Self {
        Self {
            position,
            mode: MovementMode::Falling,
            ..default()
        }
    }

    /// Builder: set the capsule size.
    pub fn with_capsule(mut self, radius: f32, half_height: f32) -> Self {
        self.radius = radius;
        self.half_height = half_height;
        self
    }

    /// Builder: set the facing direction.
    pub fn with_forward(mut self, forward: Vec3) -> Self {
        self.forward = horizontal(forward).normalize_or(self.forward);
        self
    }

    /// Builder: set the solver tuning.
    pub fn with_tuning(mut self, tuning: MovementTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Builder: stop refreshing the wall detector from colliders.
    pub fn without_wall_detection(mut self) -> Self {
        self.detect_walls = false;
        self
    }

    /// Put the body on a floor.
    pub fn land(&mut self, floor_normal: Vec3) {
        self.mode = MovementMode::Grounded;
        self.floor_normal = floor_normal.normalize_or(Vec3::Y);
        self.velocity.y = 0.0;
    }

    fn half_extents(&self) -> Vec3 {
        Vec3::new(self.radius, self.half_height, self.radius)
    }
}

/// A solid axis-aligned box centered on its entity's `Transform`.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
#[require(Transform)]
pub struct StaticCollider {
    pub half_extents: Vec3,
}

impl StaticCollider {
    pub fn cuboid(half_x: f32, half_y: f32, half_z: f32) -> Self {
        Self {
            half_extents: Vec3::new(half_x, half_y, half_z),
        }
    }
}

/// A flat navigable rectangle at its entity's `Transform` height.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
#[require(Transform)]
pub struct NavigationArea {
    /// Half size on X and Z.
    pub half_extents: Vec2,
}

/// Physics backend over [`KinematicBody`] components.
pub struct KinematicBackend;

impl AvatarPhysicsBackend for KinematicBackend {
    fn plugin() -> impl Plugin {
        KinematicBackendPlugin
    }

    fn add_systems(app: &mut App, schedule: InternedScheduleLabel) {
        app.add_systems(
            schedule,
            detect_wall_contacts.in_set(AvatarControllerSet::Sensors),
        );
        app.add_systems(
            schedule,
            (follow_attachments, sync_kinematic_transforms)
                .chain()
                .in_set(AvatarControllerSet::Sync),
        );
    }

    fn movement_mode(world: &World, entity: Entity) -> MovementMode {
        world
            .get::<KinematicBody>(entity)
            .map(|body| body.mode)
            .unwrap_or(MovementMode::Inert)
    }

    fn set_movement_mode(world: &mut World, entity: Entity, mode: MovementMode) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.mode = mode;
            if mode == MovementMode::Inert {
                body.velocity = Vec3::ZERO;
            }
        }
    }

    fn velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<KinematicBody>(entity)
            .map(|body| body.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.velocity = velocity;
        }
    }

    fn floor_normal(world: &World, entity: Entity) -> Option<Vec3> {
        world
            .get::<KinematicBody>(entity)
            .filter(|body| body.mode == MovementMode::Grounded)
            .map(|body| body.floor_normal)
    }

    fn position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<KinematicBody>(entity)
            .map(|body| body.position)
            .or_else(|| world.get::<Transform>(entity).map(|t| t.translation))
            .unwrap_or(Vec3::ZERO)
    }

    fn set_position(world: &mut World, entity: Entity, position: Vec3) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.position = position;
        }
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = position;
        }
    }

    fn forward(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<KinematicBody>(entity)
            .map(|body| body.forward)
            .or_else(|| {
                world
                    .get::<Transform>(entity)
                    .map(|t| horizontal(t.rotation * Vec3::NEG_Z).normalize_or(Vec3::NEG_Z))
            })
            .unwrap_or(Vec3::NEG_Z)
    }

    fn set_forward(world: &mut World, entity: Entity, forward: Vec3) {
        let flat = horizontal(forward).normalize_or_zero();
        if flat == Vec3::ZERO {
            return;
        }
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.forward = flat;
        }
    }

    fn tuning(world: &World, entity: Entity) -> MovementTuning {
        world
            .get::<KinematicBody>(entity)
            .map(|body| body.tuning)
            .unwrap_or_default()
    }

    fn set_tuning(world: &mut World, entity: Entity, tuning: MovementTuning) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.tuning = tuning;
        }
    }

    fn is_crouched(world: &World, entity: Entity) -> bool {
        world
            .get::<KinematicBody>(entity)
            .is_some_and(|body| body.crouched)
    }

    fn set_crouched(world: &mut World, entity: Entity, crouched: bool) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.crouched = crouched;
        }
    }

    fn set_movement_input(world: &mut World, entity: Entity, input: Vec3) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.movement_input = input;
        }
    }

    fn wall_proximity(world: &World, entity: Entity) -> WallProximity {
        world
            .get::<KinematicBody>(entity)
            .map(|body| body.wall_proximity)
            .unwrap_or_default()
    }

    fn shape_cast(
        world: &World,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
        exclude_entity: Entity,
    ) -> Option<CollisionData> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }
        blocking_boxes(world, &[exclude_entity])
            .into_iter()
            .filter_map(|(entity, center, half_extents)| {
                let expanded = half_extents + Vec3::splat(radius);
                ray_aabb(origin, direction, center - expanded, center + expanded)
                    .filter(|(distance, _)| *distance <= max_distance)
                    .map(|(distance, normal)| {
                        let point = origin + direction * distance - normal * radius;
                        CollisionData::new(distance, normal, point, Some(entity))
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn overlap_blocking(
        world: &World,
        center: Vec3,
        radius: f32,
        half_height: f32,
        exclude: &[Entity],
    ) -> bool {
        let half = Vec3::new(radius, half_height, radius);
        blocking_boxes(world, exclude)
            .into_iter()
            .any(|(_, other_center, other_half)| {
                let gap = (center - other_center).abs() - (half + other_half);
                gap.max_element() < 0.0
            })
    }

    fn project_to_navigation(world: &World, point: Vec3, search_radius: f32) -> Option<Vec3> {
        let mut areas = world.try_query::<(&NavigationArea, &Transform)>()?;
        areas
            .iter(world)
            .map(|(area, transform)| {
                let center = transform.translation;
                Vec3::new(
                    point.x.clamp(center.x - area.half_extents.x, center.x + area.half_extents.x),
                    center.y,
                    point.z.clamp(center.z - area.half_extents.y, center.z + area.half_extents.y),
                )
            })
            .filter(|candidate| candidate.distance(point) <= search_radius)
            .min_by(|a, b| a.distance(point).total_cmp(&b.distance(point)))
    }

    fn capsule_size(world: &World, entity: Entity) -> (f32, f32) {
        world
            .get::<KinematicBody>(entity)
            .map(|body| (body.radius, body.half_height))
            .unwrap_or((42.0, 96.0))
    }

    fn set_hidden(world: &mut World, entity: Entity, hidden: bool) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.hidden = hidden;
        }
    }

    fn set_collision_enabled(world: &mut World, entity: Entity, enabled: bool) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.collision_enabled = enabled;
            if !enabled {
                body.wall_proximity = WallProximity::clear();
            }
        }
    }

    fn attach_to(world: &mut World, entity: Entity, parent: Entity) {
        let parent_position = Self::position(world, parent);
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.attached_to = Some(parent);
            body.position = parent_position;
        }
    }

    fn detach(world: &mut World, entity: Entity) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.attached_to = None;
        }
    }
}

/// Plugin that registers the kinematic backend types.
pub struct KinematicBackendPlugin;

impl Plugin for KinematicBackendPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<KinematicBody>();
        app.register_type::<StaticCollider>();
        app.register_type::<NavigationArea>();
    }
}

/// Every solid box in the world as `(entity, center, half_extents)`.
fn blocking_boxes(world: &World, exclude: &[Entity]) -> Vec<(Entity, Vec3, Vec3)> {
    let mut boxes = Vec::new();
    if let Some(mut colliders) = world.try_query::<(Entity, &StaticCollider, &Transform)>() {
        boxes.extend(
            colliders
                .iter(world)
                .filter(|(entity, _, _)| !exclude.contains(entity))
                .map(|(entity, collider, transform)| {
                    (entity, transform.translation, collider.half_extents)
                }),
        );
    }
    if let Some(mut bodies) = world.try_query::<(Entity, &KinematicBody)>() {
        boxes.extend(
            bodies
                .iter(world)
                .filter(|(entity, body)| body.collision_enabled && !exclude.contains(entity))
                .map(|(entity, body)| (entity, body.position, body.half_extents())),
        );
    }
    boxes
}

/// Slab test. Returns the entry distance and the outward normal of the entry
/// face; rays starting inside the box miss.
fn ray_aabb(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < 1.0e-6 {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (t0, t1) = {
            let a = (min[axis] - o) * inv;
            let b = (max[axis] - o) * inv;
            if a <= b {
                (a, b)
            } else {
                (b, a)
            }
        };
        if t0 > t_enter {
            t_enter = t0;
            normal = Vec3::ZERO;
            normal[axis] = -d.signum();
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    (t_enter >= 0.0).then_some((t_enter, normal))
}

/// Refresh each body's wall detector from the static colliders around it.
pub fn detect_wall_contacts(
    mut bodies: Query<(Entity, &mut KinematicBody)>,
    colliders: Query<(Entity, &StaticCollider, &Transform)>,
) {
    for (entity, mut body) in &mut bodies {
        if !body.detect_walls {
            continue;
        }
        if !body.collision_enabled || body.mode == MovementMode::Inert {
            body.wall_proximity = WallProximity::clear();
            continue;
        }

        let center = body.position;
        let reach = body.radius + body.wall_detector_margin;
        let nearest = colliders
            .iter()
            .filter(|(other, _, _)| *other != entity)
            .filter_map(|(other, collider, transform)| {
                let min = transform.translation - collider.half_extents;
                let max = transform.translation + collider.half_extents;
                let closest = center.clamp(min, max);
                let distance = center.distance(closest);
                (distance <= reach).then(|| {
                    let normal = (center - closest).normalize_or_zero();
                    CollisionData::new(distance, normal, closest, Some(other))
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance));

        body.wall_proximity = match nearest {
            Some(hit) => WallProximity::touching(Some(hit)),
            None => WallProximity::clear(),
        };
    }
}

/// Move attached bodies onto their parents.
pub fn follow_attachments(world: &mut World) {
    let attached: Vec<(Entity, Entity)> = world
        .query::<(Entity, &KinematicBody)>()
        .iter(world)
        .filter_map(|(entity, body)| body.attached_to.map(|parent| (entity, parent)))
        .collect();

    for (entity, parent) in attached {
        if world.get_entity(parent).is_err() {
            continue;
        }
        let position = KinematicBackend::position(world, parent);
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.position = position;
        }
    }
}

/// Copy body position and facing into `Transform`.
pub fn sync_kinematic_transforms(mut bodies: Query<(&KinematicBody, &mut Transform)>) {
    for (body, mut transform) in &mut bodies {
        transform.translation = body.position;
        if let Ok(forward) = Dir3::new(body.forward) {
            transform.look_to(forward, Dir3::Y);
        }
    }
}
