//! Counters kept by the two loops, readable at any time.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated by the wire and dispatch loops.
#[derive(Debug, Default)]
pub struct ClientStats {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    heartbeats_sent: AtomicU64,
    heartbeats_received: AtomicU64,
    handshake_failures: AtomicU64,
    invalid_messages: AtomicU64,
}

/// Point-in-time view of the client counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Messages written to the socket, heartbeats included.
    pub messages_sent: u64,
    /// Application messages delivered to subscribers.
    pub messages_received: u64,
    /// Heartbeat frames emitted.
    pub heartbeats_sent: u64,
    /// Heartbeat frames observed from the host.
    pub heartbeats_received: u64,
    /// Handshake steps that ended the exchange.
    pub handshake_failures: u64,
    /// Messages that could not be classified or decrypted.
    pub invalid_messages: u64,
}

impl ClientStats {
    pub(crate) fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn heartbeat_sent(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn heartbeat_received(&self) {
        self.heartbeats_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn handshake_failure(&self) {
        self.handshake_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn invalid_message(&self) {
        self.invalid_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            heartbeats_received: self.heartbeats_received.load(Ordering::Relaxed),
            handshake_failures: self.handshake_failures.load(Ordering::Relaxed),
            invalid_messages: self.invalid_messages.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ClientStats::default();
        stats.message_sent();
        stats.message_sent();
        stats.heartbeat_received();

        let snap = stats.snapshot();
        assert_eq!(snap.messages_sent, 2);
        assert_eq!(snap.heartbeats_received, 1);
        assert_eq!(snap.invalid_messages, 0);
    }
}
