//! Action intent components.
//!
//! [`ActionIntent`] is the raw button/axis state written by game code (player
//! input or AI). Each tick the action system turns it into an
//! [`ActionInput`]: held states plus press/release edges and a world-space
//! move direction.

use bevy::prelude::*;

/// Desired actions for an avatar.
///
/// Button fields are plain held states; edge detection happens in the
/// controller.
///
/// # Example
///
/// ```rust
/// use avatar_action_controller::prelude::*;
/// use bevy::math::Vec2;
///
/// let mut intent = ActionIntent::new();
/// intent.set_move(Vec2::new(0.0, 1.0));
/// intent.set_jump_pressed(true);
/// assert!(intent.is_moving());
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct ActionIntent {
    /// Stick axis: x is right, y is forward, relative to the control yaw.
    pub move_axis: Vec2,
    pub jump_pressed: bool,
    pub crouch_pressed: bool,
    pub run_pressed: bool,
    pub roll_pressed: bool,
    pub(crate) previous: ButtonSnapshot,
}

#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct ButtonSnapshot {
    jump: bool,
    crouch: bool,
    roll: bool,
}

impl ActionIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stick axis, clamped to the unit circle.
    pub fn set_move(&mut self, axis: Vec2) {
        self.move_axis = axis.clamp_length_max(1.0);
    }

    pub fn set_jump_pressed(&mut self, pressed: bool) {
        self.jump_pressed = pressed;
    }

    pub fn set_crouch_pressed(&mut self, pressed: bool) {
        self.crouch_pressed = pressed;
    }

    pub fn set_run_pressed(&mut self, pressed: bool) {
        self.run_pressed = pressed;
    }

    pub fn set_roll_pressed(&mut self, pressed: bool) {
        self.roll_pressed = pressed;
    }

    pub fn is_moving(&self) -> bool {
        self.move_axis.length_squared() > 1.0e-4
    }

    /// Release every button and center the stick.
    pub fn clear(&mut self) {
        let previous = self.previous;
        *self = Self {
            previous,
            ..default()
        };
    }

    /// Build this tick's input and remember the button states for the next
    /// edge comparison.
    ///
    /// `control_yaw` rotates the stick axis into world space (Y-up, yaw 0
    /// looks down -Z).
    pub fn latch(&mut self, control_yaw: f32) -> ActionInput {
        let previous = self.previous;
        let current = ButtonSnapshot {
            jump: self.jump_pressed,
            crouch: self.crouch_pressed,
            roll: self.roll_pressed,
        };
        self.previous = current;

        ActionInput {
            move_direction: world_move_direction(self.move_axis, control_yaw),
            jump_pressed: current.jump && !previous.jump,
            crouch_pressed: current.crouch && !previous.crouch,
            crouch_released: !current.crouch && previous.crouch,
            roll_pressed: current.roll && !previous.roll,
            crouch_held: current.crouch,
            run_held: self.run_pressed,
        }
    }
}

/// Rotate a stick axis into a horizontal world direction.
pub fn world_move_direction(axis: Vec2, control_yaw: f32) -> Vec3 {
    let rotation = Quat::from_rotation_y(control_yaw);
    let forward = rotation * Vec3::NEG_Z;
    let right = rotation * Vec3::X;
    (right * axis.x + forward * axis.y).clamp_length_max(1.0)
}

/// One tick of input as the action machine sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionInput {
    /// Horizontal world-space direction, length ≤ 1.
    pub move_direction: Vec3,
    /// Jump went down this tick.
    pub jump_pressed: bool,
    /// Crouch went down this tick.
    pub crouch_pressed: bool,
    /// Crouch went up this tick.
    pub crouch_released: bool,
    /// Roll went down this tick.
    pub roll_pressed: bool,
    pub crouch_held: bool,
    pub run_held: bool,
}

impl ActionInput {
    /// No buttons, no stick.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Builder: set the move direction.
    pub fn moving(mut self, direction: Vec3) -> Self {
        self.move_direction = direction.clamp_length_max(1.0);
        self
    }

    /// Builder: jump pressed this tick.
    pub fn jump(mut self) -> Self {
        self.jump_pressed = true;
        self
    }

    /// Builder: crouch pressed this tick (and held).
    pub fn crouch(mut self) -> Self {
        self.crouch_pressed = true;
        self.crouch_held = true;
        self
    }

    /// Builder: crouch held without a new press.
    pub fn holding_crouch(mut self) -> Self {
        self.crouch_held = true;
        self
    }

    /// Builder: crouch released this tick.
    pub fn release_crouch(mut self) -> Self {
        self.crouch_released = true;
        self.crouch_held = false;
        self
    }

    /// Builder: roll pressed this tick.
    pub fn roll(mut self) -> Self {
        self.roll_pressed = true;
        self
    }

    /// Builder: run held.
    pub fn running(mut self) -> Self {
        self.run_held = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_move_clamps_to_unit_circle() {
        let mut intent = ActionIntent::new();
        intent.set_move(Vec2::new(3.0, 4.0));
        assert!((intent.move_axis.length() - 1.0).abs() < 1.0e-5);
    }

    #[test]
    fn latch_reports_press_once() {
        let mut intent = ActionIntent::new();
        intent.set_jump_pressed(true);

        assert!(intent.latch(0.0).jump_pressed);
        assert!(!intent.latch(0.0).jump_pressed, "held jump is not a new press");

        intent.set_jump_pressed(false);
        intent.latch(0.0);
        intent.set_jump_pressed(true);
        assert!(intent.latch(0.0).jump_pressed);
    }

    #[test]
    fn latch_reports_crouch_release_edge() {
        let mut intent = ActionIntent::new();
        intent.set_crouch_pressed(true);
        let pressed = intent.latch(0.0);
        assert!(pressed.crouch_pressed);
        assert!(pressed.crouch_held);

        intent.set_crouch_pressed(false);
        let released = intent.latch(0.0);
        assert!(released.crouch_released);
        assert!(!released.crouch_held);
        assert!(!intent.latch(0.0).crouch_released);
    }

    #[test]
    fn clear_keeps_edge_history() {
        let mut intent = ActionIntent::new();
        intent.set_roll_pressed(true);
        intent.latch(0.0);
        intent.clear();
        intent.set_roll_pressed(true);
        assert!(!intent.latch(0.0).roll_pressed);
    }

    #[test]
    fn world_direction_follows_yaw() {
        let forward = world_move_direction(Vec2::Y, 0.0);
        assert!((forward - Vec3::NEG_Z).length() < 1.0e-5);

        let turned = world_move_direction(Vec2::Y, std::f32::consts::FRAC_PI_2);
        assert!((turned - Vec3::NEG_X).length() < 1.0e-5);

        let right = world_move_direction(Vec2::X, 0.0);
        assert!((right - Vec3::X).length() < 1.0e-5);
    }
}
