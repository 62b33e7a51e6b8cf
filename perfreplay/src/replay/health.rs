//! Sliding-window call-time breaker
//!
//! Tracks whether each of the last `window_size` calls was slower than the
//! cutoff. One slow call means nothing; more than `max_exceeding` slow calls
//! in the window means the target is degrading and the run should stop.
//!
//! Window and count sit behind one mutex so concurrently completing calls
//! never lose an update or share a slot.

use std::sync::{Mutex, PoisonError};

use crate::config::HealthConfig;
use crate::domain::Millis;

/// Verdict after recording one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    /// More than `max_exceeding` calls in the window were over the cutoff
    Breached,
}

#[derive(Debug)]
struct Window {
    slots: Vec<bool>,
    next: usize,
    exceeding: usize,
}

impl Window {
    fn push(&mut self, exceeded: bool, capacity: usize) {
        if self.slots.len() < capacity {
            self.slots.push(exceeded);
        } else {
            if self.slots[self.next] {
                self.exceeding -= 1;
            }
            self.slots[self.next] = exceeded;
        }
        self.next = (self.next + 1) % capacity;
        if exceeded {
            self.exceeding += 1;
        }
    }
}

/// Breaker fed by every completed call
#[derive(Debug)]
pub struct CallHealthMonitor {
    cutoff: Millis,
    max_exceeding: usize,
    window_size: usize,
    window: Mutex<Window>,
}

impl CallHealthMonitor {
    #[must_use]
    pub fn new(config: HealthConfig) -> Self {
        let window_size = config.window_size.max(1);
        Self {
            cutoff: config.cutoff,
            max_exceeding: config.max_exceeding,
            window_size,
            window: Mutex::new(Window { slots: Vec::with_capacity(window_size), next: 0, exceeding: 0 }),
        }
    }

    /// Record one call duration and report whether the breaker trips
    pub fn add_call_time(&self, duration: Millis) -> HealthVerdict {
        let exceeded = duration > self.cutoff;
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        window.push(exceeded, self.window_size);

        if window.exceeding > self.max_exceeding {
            HealthVerdict::Breached
        } else {
            HealthVerdict::Healthy
        }
    }

    /// Over-cutoff calls currently in the window
    #[must_use]
    pub fn exceeding(&self) -> usize {
        self.window.lock().unwrap_or_else(PoisonError::into_inner).exceeding
    }

    #[must_use]
    pub fn cutoff(&self) -> Millis {
        self.cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn monitor(cutoff_ms: u64, max_exceeding: usize, window_size: usize) -> CallHealthMonitor {
        CallHealthMonitor::new(HealthConfig { cutoff: Millis(cutoff_ms), max_exceeding, window_size })
    }

    #[test]
    fn test_defaults() {
        let m = CallHealthMonitor::new(HealthConfig::default());
        assert_eq!(m.cutoff(), Millis(5000));
        for _ in 0..10 {
            assert_eq!(m.add_call_time(Millis(6000)), HealthVerdict::Healthy);
        }
        assert_eq!(m.add_call_time(Millis(6000)), HealthVerdict::Breached);
    }

    #[test]
    fn test_max_exceeding_tolerated_one_more_trips() {
        let m = monitor(100, 3, 10);
        for _ in 0..3 {
            assert_eq!(m.add_call_time(Millis(150)), HealthVerdict::Healthy);
        }
        assert_eq!(m.add_call_time(Millis(20)), HealthVerdict::Healthy);
        assert_eq!(m.add_call_time(Millis(150)), HealthVerdict::Breached);
    }

    #[test]
    fn test_cutoff_is_exclusive() {
        let m = monitor(100, 0, 10);
        assert_eq!(m.add_call_time(Millis(100)), HealthVerdict::Healthy);
        assert_eq!(m.add_call_time(Millis(101)), HealthVerdict::Breached);
    }

    #[test]
    fn test_old_calls_slide_out() {
        let m = monitor(100, 1, 3);
        assert_eq!(m.add_call_time(Millis(500)), HealthVerdict::Healthy);
        assert_eq!(m.add_call_time(Millis(10)), HealthVerdict::Healthy);
        assert_eq!(m.add_call_time(Millis(10)), HealthVerdict::Healthy);
        // The first slow call drops out of the 3-slot window here
        assert_eq!(m.add_call_time(Millis(500)), HealthVerdict::Healthy);
        assert_eq!(m.exceeding(), 1);
        assert_eq!(m.add_call_time(Millis(500)), HealthVerdict::Breached);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let m = Arc::new(monitor(100, usize::MAX, 1000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        m.add_call_time(Millis(if i % 2 == 0 { 500 } else { 5 }));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(m.exceeding(), 400);
    }
}
