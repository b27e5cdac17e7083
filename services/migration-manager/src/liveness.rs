// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Liveness tracking for one transfer attempt
//!
//! The tracker decides when to ping and when a transfer is dead. It holds
//! no timers of its own; the owning task polls it on every tick and feeds
//! it the pongs routed to its correlation id.

use std::time::Duration;

use tokio::time::Instant;

/// What the owner should do after a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    /// Send a ping now
    SendPing,
    /// No pong within the timeout; reported once per tracker
    Expired,
    /// Nothing to do yet
    Idle,
}

#[derive(Debug, Clone)]
pub struct LivenessTracker {
    interval: Duration,
    timeout: Duration,
    first_ping: Option<Instant>,
    last_ping: Option<Instant>,
    last_pong: Option<Instant>,
    pings_sent: u32,
    expired: bool,
}

impl LivenessTracker {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            first_ping: None,
            last_ping: None,
            last_pong: None,
            pings_sent: 0,
            expired: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn pings_sent(&self) -> u32 {
        self.pings_sent
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Advance the tracker to `now`
    pub fn poll(&mut self, now: Instant) -> LivenessAction {
        if self.expired {
            return LivenessAction::Idle;
        }

        // Expiry needs at least one ping; silence before that means nothing
        if let Some(first_ping) = self.first_ping {
            let reference = self.last_pong.unwrap_or(first_ping);
            if now.saturating_duration_since(reference) >= self.timeout {
                self.expired = true;
                return LivenessAction::Expired;
            }
        }

        let due = match self.last_ping {
            None => true,
            Some(t) => now.saturating_duration_since(t) >= self.interval,
        };
        if due {
            self.first_ping.get_or_insert(now);
            self.last_ping = Some(now);
            self.pings_sent += 1;
            return LivenessAction::SendPing;
        }

        LivenessAction::Idle
    }

    /// Record a pong for this transfer
    ///
    /// Pongs that arrive before any ping or after expiry are ignored.
    pub fn on_pong(&mut self, now: Instant) {
        if self.expired || self.first_ping.is_none() {
            return;
        }
        self.last_pong = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(10);
    const TIMEOUT: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn pings_on_interval() {
        let mut tracker = LivenessTracker::new(INTERVAL, TIMEOUT);
        let start = Instant::now();

        assert_eq!(tracker.poll(start), LivenessAction::SendPing);
        assert_eq!(
            tracker.poll(start + Duration::from_secs(5)),
            LivenessAction::Idle
        );
        assert_eq!(tracker.poll(start + INTERVAL), LivenessAction::SendPing);
        assert_eq!(tracker.pings_sent(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expires_once_without_pong() {
        let mut tracker = LivenessTracker::new(INTERVAL, TIMEOUT);
        let start = Instant::now();

        assert_eq!(tracker.poll(start), LivenessAction::SendPing);
        assert_eq!(tracker.poll(start + INTERVAL), LivenessAction::SendPing);
        assert_eq!(tracker.poll(start + INTERVAL * 2), LivenessAction::SendPing);
        assert_eq!(tracker.poll(start + TIMEOUT), LivenessAction::Expired);
        assert!(tracker.is_expired());

        // Never reported again
        for i in 4..10 {
            assert_eq!(tracker.poll(start + INTERVAL * i), LivenessAction::Idle);
        }

        // A late pong does not revive it
        tracker.on_pong(start + INTERVAL * 10);
        assert_eq!(tracker.poll(start + INTERVAL * 11), LivenessAction::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn pongs_keep_transfer_alive() {
        let mut tracker = LivenessTracker::new(INTERVAL, TIMEOUT);
        let start = Instant::now();

        for i in 0..10 {
            let now = start + INTERVAL * i;
            assert_eq!(tracker.poll(now), LivenessAction::SendPing);
            tracker.on_pong(now + Duration::from_millis(5));
        }
        assert!(!tracker.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn single_lost_pong_tolerated() {
        let mut tracker = LivenessTracker::new(INTERVAL, TIMEOUT);
        let start = Instant::now();

        tracker.poll(start);
        tracker.on_pong(start);
        // Ping at 10s is lost
        tracker.poll(start + INTERVAL);
        tracker.poll(start + INTERVAL * 2);
        tracker.on_pong(start + INTERVAL * 2);

        assert_eq!(tracker.poll(start + INTERVAL * 3), LivenessAction::SendPing);
        assert!(!tracker.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn no_expiry_before_first_ping() {
        let mut tracker = LivenessTracker::new(INTERVAL, TIMEOUT);
        let start = Instant::now();

        // Pong before any ping is ignored
        tracker.on_pong(start);
        // First poll happens late: it pings rather than expiring
        assert_eq!(
            tracker.poll(start + TIMEOUT * 2),
            LivenessAction::SendPing
        );
    }
}
