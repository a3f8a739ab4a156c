//! Detection submission gate
//!
//! A frame is submitted to the detector only when the previous call has
//! completed and the minimum interval since the last submission has passed.
//! Frames arriving while the gate is shut are dropped, not queued.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct DetectionGate {
    interval: Duration,
    in_flight: bool,
    last_submit: Option<Instant>,
}

impl DetectionGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            in_flight: false,
            last_submit: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Try to start a detection call at `now`. Returns false if the frame should be dropped.
    ///
    /// Pass the scheduled tick time rather than the wakeup time when driven by
    /// a ticker whose period equals the interval.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }

        if let Some(last) = self.last_submit {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }

        self.in_flight = true;
        self.last_submit = Some(now);
        true
    }

    /// Mark the in-flight call as finished
    pub fn complete(&mut self) {
        self.in_flight = false;
    }

    /// Forget everything, e.g. when the camera restarts
    pub fn reset(&mut self) {
        self.in_flight = false;
        self.last_submit = None;
    }
}
