//! Event fan-out for the four client event points.
//!
//! Subscriptions may be added and removed from any thread; invocation is
//! serialized on the dispatch loop. Handlers are snapshotted out of the
//! registry before they run, so a handler may subscribe or unsubscribe
//! without deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::trace;

use crate::identity::ClientId;

/// A delivered application message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Identity of the client the message was delivered to.
    pub client_id: ClientId,
    /// Frames in receive order, decrypted when the session is secured.
    pub frames: Vec<Bytes>,
}

/// Handle returned by the subscribe operations; valid across all four
/// event points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;
type SignalHandler = Arc<dyn Fn() + Send + Sync>;

/// Registry for the four event points.
#[derive(Default)]
pub(crate) struct EventHub {
    next_id: AtomicU64,
    message_received: Mutex<Vec<(SubscriptionId, MessageHandler)>>,
    invalid_message: Mutex<Vec<(SubscriptionId, MessageHandler)>>,
    protocol_established: Mutex<Vec<(SubscriptionId, SignalHandler)>>,
    protocol_failed: Mutex<Vec<(SubscriptionId, SignalHandler)>>,
}

impl EventHub {
    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn subscribe_message_received(&self, handler: MessageHandler) -> SubscriptionId {
        let id = self.next_id();
        self.message_received.lock().expect("event registry").push((id, handler));
        id
    }

    pub(crate) fn subscribe_invalid_message(&self, handler: MessageHandler) -> SubscriptionId {
        let id = self.next_id();
        self.invalid_message.lock().expect("event registry").push((id, handler));
        id
    }

    pub(crate) fn subscribe_protocol_established(&self, handler: SignalHandler) -> SubscriptionId {
        let id = self.next_id();
        self.protocol_established.lock().expect("event registry").push((id, handler));
        id
    }

    pub(crate) fn subscribe_protocol_failed(&self, handler: SignalHandler) -> SubscriptionId {
        let id = self.next_id();
        self.protocol_failed.lock().expect("event registry").push((id, handler));
        id
    }

    /// Remove a subscription from whichever event point holds it.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for list in [&self.message_received, &self.invalid_message] {
            let mut list = list.lock().expect("event registry");
            let before = list.len();
            list.retain(|(sub, _)| *sub != id);
            removed |= list.len() != before;
        }
        for list in [&self.protocol_established, &self.protocol_failed] {
            let mut list = list.lock().expect("event registry");
            let before = list.len();
            list.retain(|(sub, _)| *sub != id);
            removed |= list.len() != before;
        }
        removed
    }

    pub(crate) fn emit_message_received(&self, message: &Message) {
        trace!("delivering message with {} frames", message.frames.len());
        for handler in Self::snapshot(&self.message_received) {
            handler(message);
        }
    }

    pub(crate) fn emit_invalid_message(&self, message: &Message) {
        for handler in Self::snapshot(&self.invalid_message) {
            handler(message);
        }
    }

    pub(crate) fn emit_protocol_established(&self) {
        for handler in Self::snapshot(&self.protocol_established) {
            handler();
        }
    }

    pub(crate) fn emit_protocol_failed(&self) {
        for handler in Self::snapshot(&self.protocol_failed) {
            handler();
        }
    }

    fn snapshot<H: Clone>(list: &Mutex<Vec<(SubscriptionId, H)>>) -> Vec<H> {
        list.lock()
            .expect("event registry")
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect()
    }
}
