//! Delayed per-entity callbacks driven by the simulation tick

use crate::dynamic_world::EntityKey;

#[derive(Clone, Copy, Debug)]
struct Timer {
    remaining: f32,
    entity: EntityKey,
}

/// Countdown timers keyed by entity
///
/// Timers only advance when [`TimerQueue::advance`] is called, so they
/// follow simulation time and stop while the game is paused.
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: Vec<Timer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire for `entity` after `delay` seconds
    pub fn schedule(&mut self, delay: f32, entity: EntityKey) {
        self.timers.push(Timer {
            remaining: delay.max(0.0),
            entity,
        });
    }

    /// Advance every timer by `dt` and return the entities whose timer ran out
    pub fn advance(&mut self, dt: f32) -> Vec<EntityKey> {
        let mut due = Vec::new();
        self.timers.retain_mut(|timer| {
            timer.remaining -= dt;
            if timer.remaining <= 0.0 {
                due.push(timer.entity);
                false
            } else {
                true
            }
        });
        due
    }

    pub fn cancel_entity(&mut self, entity: EntityKey) {
        self.timers.retain(|timer| timer.entity != entity);
    }

    pub fn is_pending(&self, entity: EntityKey) -> bool {
        self.timers.iter().any(|timer| timer.entity == entity)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}
