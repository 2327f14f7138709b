//! Movement parameter overlay.
//!
//! The movement solver exposes a small set of tuning values. Special actions
//! (dive, roll, wall slide, ...) temporarily override some of them and must
//! put them back when they end. [`MovementOverlay`] keeps the baseline values
//! captured from the solver and the values currently applied on top of them.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Physical tuning values the solver consumes.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementTuning {
    /// Multiplier applied to world gravity.
    pub gravity_scale: f32,
    /// Fraction of ground acceleration available while airborne (0.0-1.0).
    pub air_control: f32,
    /// Maximum acceleration the solver may apply from movement input.
    pub max_acceleration: f32,
    /// Deceleration applied without input while grounded.
    pub braking_deceleration_walking: f32,
    /// Horizontal deceleration applied without input while airborne.
    pub braking_deceleration_falling: f32,
    /// Ground friction coefficient.
    pub ground_friction: f32,
    /// Whether the solver turns the body to face its velocity.
    pub orient_rotation_to_movement: bool,
    /// Maximum speed reachable from walking input.
    pub max_walk_speed: f32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            gravity_scale: 2.0,
            air_control: 0.8,
            max_acceleration: 2048.0,
            braking_deceleration_walking: 2048.0,
            braking_deceleration_falling: 0.0,
            ground_friction: 8.0,
            orient_rotation_to_movement: true,
            max_walk_speed: 200.0,
        }
    }
}

/// Names of the individual tuning fields, for selective restore.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TuningField {
    GravityScale,
    AirControl,
    MaxAcceleration,
    BrakingDecelerationWalking,
    BrakingDecelerationFalling,
    GroundFriction,
    OrientRotationToMovement,
    MaxWalkSpeed,
}

impl TuningField {
    /// Every field, in declaration order.
    pub const ALL: [TuningField; 8] = [
        TuningField::GravityScale,
        TuningField::AirControl,
        TuningField::MaxAcceleration,
        TuningField::BrakingDecelerationWalking,
        TuningField::BrakingDecelerationFalling,
        TuningField::GroundFriction,
        TuningField::OrientRotationToMovement,
        TuningField::MaxWalkSpeed,
    ];
}

impl MovementTuning {
    /// Copy a single field from `source` into `self`.
    pub fn copy_field(&mut self, source: &MovementTuning, field: TuningField) {
        match field {
            TuningField::GravityScale => self.gravity_scale = source.gravity_scale,
            TuningField::AirControl => self.air_control = source.air_control,
            TuningField::MaxAcceleration => self.max_acceleration = source.max_acceleration,
            TuningField::BrakingDecelerationWalking => {
                self.braking_deceleration_walking = source.braking_deceleration_walking
            }
            TuningField::BrakingDecelerationFalling => {
                self.braking_deceleration_falling = source.braking_deceleration_falling
            }
            TuningField::GroundFriction => self.ground_friction = source.ground_friction,
            TuningField::OrientRotationToMovement => {
                self.orient_rotation_to_movement = source.orient_rotation_to_movement
            }
            TuningField::MaxWalkSpeed => self.max_walk_speed = source.max_walk_speed,
        }
    }

    /// Whether a single field differs between `self` and `other`.
    pub fn field_differs(&self, other: &MovementTuning, field: TuningField) -> bool {
        let mut probe = *self;
        probe.copy_field(other, field);
        probe != *self
    }
}

/// Baseline + applied tuning for one avatar.
///
/// Only one action owns a given field at a time; ownership follows the action
/// transition table, and every owner restores its fields on exit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementOverlay {
    baseline: MovementTuning,
    current: MovementTuning,
    dirty: bool,
}

impl MovementOverlay {
    /// Start an overlay with no overrides.
    pub fn new(baseline: MovementTuning) -> Self {
        Self {
            baseline,
            current: baseline,
            dirty: true,
        }
    }

    /// The cached baseline values.
    pub fn baseline(&self) -> &MovementTuning {
        &self.baseline
    }

    /// The values that should currently be applied to the solver.
    pub fn current(&self) -> &MovementTuning {
        &self.current
    }

    /// Modify the applied values.
    pub fn apply(&mut self, f: impl FnOnce(&mut MovementTuning)) {
        let before = self.current;
        f(&mut self.current);
        if before != self.current {
            self.dirty = true;
        }
    }

    /// Put the given fields back to their baseline values.
    pub fn restore(&mut self, fields: &[TuningField]) {
        let baseline = self.baseline;
        self.apply(|current| {
            for field in fields {
                current.copy_field(&baseline, *field);
            }
        });
    }

    /// Put every field back to its baseline value.
    pub fn restore_all(&mut self) {
        let baseline = self.baseline;
        self.apply(|current| *current = baseline);
    }

    /// Whether any field currently differs from the baseline.
    pub fn is_overridden(&self) -> bool {
        self.current != self.baseline
    }

    /// Whether a specific field currently differs from the baseline.
    pub fn is_field_overridden(&self, field: TuningField) -> bool {
        self.current.field_differs(&self.baseline, field)
    }

    /// Take the pending write-back, if the applied values changed since the
    /// last call.
    pub fn take_dirty(&mut self) -> Option<MovementTuning> {
        if self.dirty {
            self.dirty = false;
            Some(self.current)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_overlay_is_not_overridden() {
        let overlay = MovementOverlay::new(MovementTuning::default());
        assert!(!overlay.is_overridden());
        assert_eq!(overlay.current(), overlay.baseline());
    }

    #[test]
    fn apply_marks_override_and_restore_clears_it() {
        let mut overlay = MovementOverlay::new(MovementTuning::default());
        overlay.apply(|t| {
            t.gravity_scale = 0.0;
            t.air_control = 0.0;
        });
        assert!(overlay.is_field_overridden(TuningField::GravityScale));
        assert!(overlay.is_field_overridden(TuningField::AirControl));
        assert!(!overlay.is_field_overridden(TuningField::GroundFriction));

        overlay.restore(&[TuningField::GravityScale]);
        assert!(!overlay.is_field_overridden(TuningField::GravityScale));
        assert!(overlay.is_field_overridden(TuningField::AirControl));

        overlay.restore_all();
        assert!(!overlay.is_overridden());
    }

    #[test]
    fn take_dirty_only_reports_changes() {
        let mut overlay = MovementOverlay::new(MovementTuning::default());
        assert!(overlay.take_dirty().is_some());
        assert!(overlay.take_dirty().is_none());

        // Writing the same value does not dirty the overlay.
        overlay.apply(|t| t.gravity_scale = 2.0);
        assert!(overlay.take_dirty().is_none());

        overlay.apply(|t| t.gravity_scale = 0.5);
        let pending = overlay.take_dirty().unwrap();
        assert_eq!(pending.gravity_scale, 0.5);
    }

    #[test]
    fn copy_field_covers_every_field() {
        let source = MovementTuning {
            gravity_scale: 9.0,
            air_control: 9.0,
            max_acceleration: 9.0,
            braking_deceleration_walking: 9.0,
            braking_deceleration_falling: 9.0,
            ground_friction: 9.0,
            orient_rotation_to_movement: false,
            max_walk_speed: 9.0,
        };
        let mut target = MovementTuning::default();
        for field in TuningField::ALL {
            target.copy_field(&source, field);
        }
        assert_eq!(target, source);
    }
}
