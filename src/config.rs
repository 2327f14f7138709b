//! Tuning configuration components.
//!
//! [`ActionConfig`] holds every constant of the action machine,
//! [`WallConfig`] the wall slide / wall kick tuning and [`CaptureConfig`] the
//! release exit search. All three can be loaded from RON.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Action machine tuning.
///
/// Speeds are in world units per second, durations in seconds.
#[derive(Component, Reflect, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct ActionConfig {
    // === Ground Speed Settings ===
    /// Max walk speed without the run button.
    pub walk_speed: f32,
    /// Max walk speed while run is held.
    pub run_speed: f32,
    /// Walk speed multiplier while crouched or holding crouch.
    pub crouch_speed_scale: f32,

    // === Jump Chain Settings ===
    /// Seconds after landing during which the next jump advances the chain.
    pub jump_chain_window: f32,
    /// Vertical launch speed of each chain stage.
    pub jump_stage_speeds: [f32; 3],

    // === Crouch Jump Settings ===
    /// Horizontal speed at or above which a crouch jump becomes a long jump.
    pub long_jump_min_speed: f32,
    pub long_jump_forward_speed: f32,
    pub long_jump_up_speed: f32,
    pub backflip_back_speed: f32,
    pub backflip_up_speed: f32,

    // === Ground Pound Settings ===
    /// Hang time before the pound falls.
    pub ground_pound_prepare_time: f32,
    /// Downward speed of the pound.
    pub ground_pound_speed: f32,
    /// Stun after a pound lands; also the rebound jump window.
    pub ground_pound_stun_time: f32,
    /// Vertical speed of the rebound jump.
    pub pound_jump_speed: f32,

    // === Dive Settings ===
    pub dive_forward_speed: f32,
    pub dive_up_speed: f32,

    // === Roll Settings ===
    pub roll_speed: f32,
    pub roll_start_time: f32,
    /// Maximum loop time; zero leaves the loop unbounded.
    pub roll_loop_time: f32,
    pub roll_end_time: f32,
    /// Seconds at the start of a roll during which input is forced along it.
    pub roll_force_input_time: f32,
    pub roll_ground_friction: f32,
    pub roll_braking_deceleration: f32,
    pub roll_max_acceleration: f32,
    /// Rate (per second) at which the roll direction turns toward input.
    pub roll_steer_rate: f32,
    /// Horizontal speed below which the loop ends.
    pub roll_end_speed: f32,
    /// Input · roll direction at or below which the loop ends.
    pub roll_reverse_cancel_dot: f32,

    // === Downhill Boost Settings ===
    pub downhill_min_slope_degrees: f32,
    /// Extra max walk speed at full boost.
    pub downhill_max_bonus: f32,
    pub downhill_rise_rate: f32,
    pub downhill_decay_rate: f32,
    pub downhill_hold_time: f32,
    /// Minimum velocity · downhill direction (normalized) to count as downhill.
    pub downhill_min_dot: f32,
    pub downhill_min_speed: f32,

    // === Hit Reaction Settings ===
    /// Seconds the avatar stays stunned with input blocked after a hit.
    pub hit_stun_time: f32,
    /// Horizontal knockback speed away from whatever dealt the hit.
    pub hit_knockback_horizontal: f32,
    /// Upward knockback speed.
    pub hit_knockback_up: f32,
    /// Seconds after a hit during which further damage is ignored.
    pub damage_cooldown: f32,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            // Ground speeds
            walk_speed: 200.0,
            run_speed: 690.0,
            crouch_speed_scale: 0.6,

            // Jump chain
            jump_chain_window: 0.25,
            jump_stage_speeds: [850.0, 890.0, 1230.0],

            // Crouch jumps
            long_jump_min_speed: 10.0,
            long_jump_forward_speed: 950.0,
            long_jump_up_speed: 800.0,
            backflip_back_speed: 200.0,
            backflip_up_speed: 1200.0,

            // Ground pound
            ground_pound_prepare_time: 0.77,
            ground_pound_speed: 1000.0,
            ground_pound_stun_time: 1.43,
            pound_jump_speed: 1200.0,

            // Dive
            dive_forward_speed: 1100.0,
            dive_up_speed: 450.0,

            // Roll
            roll_speed: 900.0,
            roll_start_time: 0.17,
            roll_loop_time: 0.0,
            roll_end_time: 0.27,
            roll_force_input_time: 0.18,
            roll_ground_friction: 0.25,
            roll_braking_deceleration: 180.0,
            roll_max_acceleration: 2000.0,
            roll_steer_rate: 3.0,
            roll_end_speed: 160.0,
            roll_reverse_cancel_dot: -0.35,

            // Downhill boost
            downhill_min_slope_degrees: 12.0,
            downhill_max_bonus: 400.0,
            downhill_rise_rate: 1.5,
            downhill_decay_rate: 1.0,
            downhill_hold_time: 2.35,
            downhill_min_dot: 0.55,
            downhill_min_speed: 250.0,

            // Hit reaction
            hit_stun_time: 2.57,
            hit_knockback_horizontal: 700.0,
            hit_knockback_up: 320.0,
            damage_cooldown: 0.55,
        }
    }
}

impl ActionConfig {
    /// Standard player avatar tuning.
    pub fn player() -> Self {
        Self::default()
    }

    /// Tuning for a heavier body: shorter jumps, slower roll, no downhill boost.
    pub fn heavy() -> Self {
        Self {
            run_speed: 480.0,
            jump_stage_speeds: [700.0, 730.0, 900.0],
            long_jump_forward_speed: 700.0,
            backflip_up_speed: 950.0,
            roll_speed: 650.0,
            downhill_max_bonus: 0.0,
            ..default()
        }
    }

    /// Vertical launch speed for a chain stage (1-based, clamped to 1..=3).
    pub fn jump_speed_for_stage(&self, stage: u8) -> f32 {
        let index = usize::from(stage.clamp(1, 3) - 1);
        self.jump_stage_speeds[index]
    }

    /// Builder: set walk and run speeds.
    pub fn with_speeds(mut self, walk: f32, run: f32) -> Self {
        self.walk_speed = walk;
        self.run_speed = run;
        self
    }

    /// Builder: set the jump chain window.
    pub fn with_jump_chain_window(mut self, window: f32) -> Self {
        self.jump_chain_window = window;
        self
    }

    /// Builder: set the three chain stage speeds.
    pub fn with_jump_stage_speeds(mut self, speeds: [f32; 3]) -> Self {
        self.jump_stage_speeds = speeds;
        self
    }

    /// Builder: set ground pound timings.
    pub fn with_ground_pound_timing(mut self, prepare: f32, stun: f32) -> Self {
        self.ground_pound_prepare_time = prepare;
        self.ground_pound_stun_time = stun;
        self
    }

    /// Builder: set the roll phase durations.
    pub fn with_roll_timing(mut self, start: f32, loop_time: f32, end: f32) -> Self {
        self.roll_start_time = start;
        self.roll_loop_time = loop_time;
        self.roll_end_time = end;
        self
    }

    /// Builder: set the downhill boost bonus (zero disables the boost).
    pub fn with_downhill_bonus(mut self, bonus: f32) -> Self {
        self.downhill_max_bonus = bonus;
        self
    }

    /// Builder: set the hit stun duration and the damage cooldown.
    pub fn with_hit_timing(mut self, stun: f32, cooldown: f32) -> Self {
        self.hit_stun_time = stun;
        self.damage_cooldown = cooldown;
        self
    }
}

/// Wall slide and wall kick tuning.
#[derive(Component, Reflect, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct WallConfig {
    /// Whether wall actions are available at all.
    pub enabled: bool,

    // === Probe Settings ===
    /// Sphere radius of the fallback probes.
    pub trace_radius: f32,
    /// Maximum distance of the fallback probes.
    pub trace_distance: f32,
    /// Minimum approach direction · inward normal.
    pub min_front_dot: f32,
    /// Maximum deviation of the wall normal from horizontal, in degrees.
    pub max_wall_tilt_degrees: f32,

    // === Slide Settings ===
    pub slide_start_time: f32,
    /// Fixed descent speed while sliding and falling.
    pub slide_down_speed: f32,
    pub slide_air_control: f32,
    pub slide_max_acceleration: f32,
    pub slide_braking_deceleration_falling: f32,
    /// Grace before a lost overlap ends the slide.
    pub end_overlap_grace: f32,

    // === Kick Settings ===
    pub kick_horizontal_speed: f32,
    pub kick_vertical_speed: f32,
    /// Time spent in the kick state.
    pub kick_state_time: f32,
    /// Input lock following the kick state.
    pub kick_input_lock_time: f32,
    /// Window after a kick in which a new slide may begin.
    pub kick_reenter_window: f32,
    /// Lockout after a kick during which no slide may begin.
    pub kick_min_reenter_delay: f32,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            enabled: true,

            trace_radius: 12.0,
            trace_distance: 35.0,
            min_front_dot: 0.75,
            max_wall_tilt_degrees: 20.0,

            slide_start_time: 0.83,
            slide_down_speed: 220.0,
            slide_air_control: 0.05,
            slide_max_acceleration: 200.0,
            slide_braking_deceleration_falling: 2048.0,
            end_overlap_grace: 0.08,

            kick_horizontal_speed: 500.0,
            kick_vertical_speed: 920.0,
            kick_state_time: 0.1,
            kick_input_lock_time: 0.12,
            kick_reenter_window: 0.35,
            kick_min_reenter_delay: 0.06,
        }
    }
}

impl WallConfig {
    /// Wall actions turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..default()
        }
    }

    /// Largest allowed |normal · up| for a surface to count as a wall.
    pub fn max_normal_up_dot(&self) -> f32 {
        self.max_wall_tilt_degrees.to_radians().sin()
    }

    /// Builder: set the probe shape.
    pub fn with_trace(mut self, radius: f32, distance: f32) -> Self {
        self.trace_radius = radius;
        self.trace_distance = distance;
        self
    }

    /// Builder: set the kick launch.
    pub fn with_kick(mut self, horizontal: f32, vertical: f32) -> Self {
        self.kick_horizontal_speed = horizontal;
        self.kick_vertical_speed = vertical;
        self
    }

    /// Builder: set the head-on threshold.
    pub fn with_min_front_dot(mut self, dot: f32) -> Self {
        self.min_front_dot = dot;
        self
    }
}

/// Capture exit search tuning.
#[derive(Component, Reflect, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct CaptureConfig {
    /// Forward offset of the preferred exit point from the pawn.
    pub exit_forward_offset: f32,
    /// Upward offset of the preferred exit point from the pawn.
    pub exit_up_offset: f32,
    /// Search radius when projecting the exit onto navigable ground.
    pub exit_nav_search_radius: f32,
    /// Height above the pawn used when everything else fails.
    pub exit_fallback_up: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            exit_forward_offset: 110.0,
            exit_up_offset: 60.0,
            exit_nav_search_radius: 250.0,
            exit_fallback_up: 200.0,
        }
    }
}

impl CaptureConfig {
    /// Builder: set the preferred exit offsets.
    pub fn with_exit_offset(mut self, forward: f32, up: f32) -> Self {
        self.exit_forward_offset = forward;
        self.exit_up_offset = up;
        self
    }

    /// Builder: set the navigation search radius.
    pub fn with_nav_search_radius(mut self, radius: f32) -> Self {
        self.exit_nav_search_radius = radius;
        self
    }
}
