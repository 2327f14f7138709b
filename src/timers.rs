//! Named, cancelable countdowns.
//!
//! Timers never call back into anything: [`TimerRegistry::tick`] returns the
//! names that fired and the owner dispatches them. Setting a name that is
//! already running cancels it first.

use bevy::prelude::*;

/// Timers owned by the action machine.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionTimer {
    GroundPoundPrepare,
    GroundPoundStun,
    RollPhase,
    WallSlideStartToLoop,
    WallKickState,
    WallKickInputLock,
    WallEndOverlapGrace,
    HitStun,
}

#[derive(Debug, Clone)]
struct TimerEntry<K> {
    name: K,
    duration: f32,
    remaining: f32,
    mode: TimerMode,
}

/// Registry of named countdowns, one per name at most.
#[derive(Debug, Clone)]
pub struct TimerRegistry<K> {
    entries: Vec<TimerEntry<K>>,
}

impl<K> Default for TimerRegistry<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Copy + PartialEq> TimerRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `name`, replacing any running instance.
    ///
    /// Durations are clamped to be non-negative; a zero duration fires on the
    /// next tick.
    pub fn set(&mut self, name: K, duration: f32, mode: TimerMode) {
        self.cancel(name);
        let duration = duration.max(0.0);
        self.entries.push(TimerEntry {
            name,
            duration,
            remaining: duration,
            mode,
        });
    }

    /// Stop `name`. No-op if it is not running.
    pub fn cancel(&mut self, name: K) {
        self.entries.retain(|entry| entry.name != name);
    }

    /// Stop every timer.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_active(&self, name: K) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Seconds until `name` fires next.
    pub fn remaining(&self, name: K) -> Option<f32> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.remaining)
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    /// Advance every timer by `delta` seconds and return the names that fired,
    /// in the order they were set.
    ///
    /// One-shot timers are removed when they fire. A repeating timer is
    /// reported once per period elapsed.
    pub fn tick(&mut self, delta: f32) -> Vec<K> {
        let delta = delta.max(0.0);
        let mut fired = Vec::new();

        for entry in &mut self.entries {
            entry.remaining -= delta;
            if entry.remaining > 0.0 {
                continue;
            }
            match entry.mode {
                TimerMode::Once => fired.push(entry.name),
                TimerMode::Repeating => {
                    if entry.duration <= 0.0 {
                        fired.push(entry.name);
                        entry.remaining = 0.0;
                        continue;
                    }
                    while entry.remaining <= 0.0 {
                        fired.push(entry.name);
                        entry.remaining += entry.duration;
                    }
                }
            }
        }

        self.entries
            .retain(|entry| entry.mode == TimerMode::Repeating || entry.remaining > 0.0);
        fired
    }
}
