//! One-shot timers driven by the event loop
//!
//! Nothing here sleeps or reads the clock. Callers pass `now` explicitly, the
//! runner waits on the queue until [`TimerQueue::next_deadline`] and then
//! collects what [`TimerQueue::expire`] returns.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Timer<T> {
    id: TimerId,
    deadline: Instant,
    payload: T,
}

#[derive(Debug)]
pub struct TimerQueue<T> {
    timers: Vec<Timer<T>>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_id: 1,
        }
    }

    /// Arm a timer firing `duration` after `now`
    pub fn start(&mut self, now: Instant, duration: Duration, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            deadline: now + duration,
            payload,
        });
        id
    }

    /// Cancel a timer, returning its payload if it had not fired yet
    pub fn stop(&mut self, id: TimerId) -> Option<T> {
        let index = self.timers.iter().position(|timer| timer.id == id)?;
        Some(self.timers.swap_remove(index).payload)
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.timers.iter().any(|timer| timer.id == id)
    }

    pub fn deadline(&self, id: TimerId) -> Option<Instant> {
        self.timers
            .iter()
            .find(|timer| timer.id == id)
            .map(|timer| timer.deadline)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|timer| timer.deadline).min()
    }

    /// Remove every timer due at `now`, earliest first
    pub fn expire(&mut self, now: Instant) -> Vec<(TimerId, T)> {
        let mut due = Vec::new();
        let mut index = 0;
        while index < self.timers.len() {
            if self.timers[index].deadline <= now {
                due.push(self.timers.swap_remove(index));
            } else {
                index += 1;
            }
        }

        due.sort_by_key(|timer| (timer.deadline, timer.id));
        due.into_iter()
            .map(|timer| (timer.id, timer.payload))
            .collect()
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
