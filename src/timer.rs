//! Cooperative alarms
//!
//! Alarms are plain deadlines checked from the poll loop; nothing here
//! blocks or runs on another thread. Time is a monotonic millisecond
//! counter supplied by the caller.

use std::time::Duration;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Single-shot or repeating alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Alarm {
    deadline: Option<u64>,
    period: Option<u64>,
}

impl Alarm {
    /// Create a disarmed alarm
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an alarm firing every `period`, first at `now + period`
    pub fn repeating(now_ms: u64, period: Duration) -> Self {
        let mut alarm = Self::new();
        alarm.attach(now_ms, period);
        alarm
    }

    /// Arm (or re-arm) as single-shot at `now + delay`
    pub fn once(&mut self, now_ms: u64, delay: Duration) {
        self.deadline = Some(now_ms.saturating_add(millis(delay)));
        self.period = None;
    }

    /// Arm as repeating every `period`
    pub fn attach(&mut self, now_ms: u64, period: Duration) {
        let period = millis(period).max(1);
        self.deadline = Some(now_ms.saturating_add(period));
        self.period = Some(period);
    }

    /// Disarm
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.period = None;
    }

    /// Check if the alarm will fire at some point
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Next firing time
    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Fire if due
    ///
    /// A single-shot alarm disarms itself. A repeating alarm that missed
    /// several periods fires once and moves to its next future deadline.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if now_ms < deadline {
            return false;
        }
        match self.period {
            Some(period) => {
                let missed = (now_ms - deadline) / period + 1;
                self.deadline = Some(deadline.saturating_add(missed.saturating_mul(period)));
            }
            None => self.deadline = None,
        }
        true
    }
}
