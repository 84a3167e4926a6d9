//! Heartbeat scheduling and acknowledgement deadline
//!
//! Pure state machine; the session loop supplies the clock and performs the sends.

use std::time::Duration;
use tokio::time::Instant;

/// What the session should do at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    Idle,
    /// A heartbeat is due
    Send,
    /// The outstanding heartbeat was not acknowledged in time
    Expired,
}

#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    ack_timeout: Duration,
    next_beat: Option<Instant>,
    /// Send time of the oldest unacknowledged heartbeat
    pending_since: Option<Instant>,
    latency: Option<Duration>,
}

impl HeartbeatMonitor {
    /// `ack_timeout` defaults to `interval`
    pub fn new(interval: Duration, ack_timeout: Option<Duration>) -> Self {
        Self {
            interval,
            ack_timeout: ack_timeout.unwrap_or(interval),
            next_beat: None,
            pending_since: None,
            latency: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    pub fn is_running(&self) -> bool {
        self.next_beat.is_some()
    }

    /// Last measured send-to-ack round trip
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    pub fn is_awaiting_ack(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Begin beating; the first heartbeat is due one interval from `now`
    pub fn start(&mut self, now: Instant) {
        self.next_beat = Some(now + self.interval);
        self.pending_since = None;
    }

    /// Cancel the schedule and any outstanding deadline
    pub fn stop(&mut self) {
        self.next_beat = None;
        self.pending_since = None;
    }

    pub fn poll(&self, now: Instant) -> HeartbeatAction {
        if let Some(sent) = self.pending_since {
            if now >= sent + self.ack_timeout {
                return HeartbeatAction::Expired;
            }
        }
        match self.next_beat {
            Some(due) if now >= due => HeartbeatAction::Send,
            _ => HeartbeatAction::Idle,
        }
    }

    /// Record a heartbeat written at `now`
    pub fn record_sent(&mut self, now: Instant) {
        self.pending_since.get_or_insert(now);
        if self.next_beat.is_some() {
            self.next_beat = Some(now + self.interval);
        }
    }

    /// Record an acknowledgement; returns the measured latency if one was pending
    pub fn on_ack(&mut self, now: Instant) -> Option<Duration> {
        let sent = self.pending_since.take()?;
        let latency = now.saturating_duration_since(sent);
        self.latency = Some(latency);
        Some(latency)
    }

    /// Earliest instant at which `poll` can change its answer
    pub fn next_wakeup(&self) -> Option<Instant> {
        let deadline = self.pending_since.map(|sent| sent + self.ack_timeout);
        match (self.next_beat, deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
