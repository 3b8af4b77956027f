//! Client facade: lifecycle, readiness gate, send, and event subscription.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{ClientConfig, Credentials};
use crate::crypto::SessionCrypto;
use crate::dispatch::{Command, DispatchLoop};
use crate::error::SendError;
use crate::events::{EventHub, Message, SubscriptionId};
use crate::identity::ClientId;
use crate::socket::{MessageSocket, TcpMessageSocket};
use crate::stats::{ClientStats, StatsSnapshot};
use crate::wire_loop::WireLoop;

/// Depth of the outbound and inbound hand-off queues.
const QUEUE_DEPTH: usize = 1024;

/// State shared between the facade and the two loops.
///
/// The flags are monotonic within well-defined regions: `send_blocked`
/// clears once at handshake completion and re-sets on host-dead or
/// disposal; `host_dead` and `disposed` latch once. The crypto slot is a
/// one-shot publication from the dispatch loop to the wire loop.
pub(crate) struct Shared {
    pub(crate) client_id: ClientId,
    pub(crate) secured: bool,
    pub(crate) credentials: Option<Credentials>,
    pub(crate) heart_beat: Duration,
    pub(crate) send_blocked: AtomicBool,
    pub(crate) host_dead: AtomicBool,
    pub(crate) disposed: AtomicBool,
    pub(crate) established: AtomicBool,
    pub(crate) established_signal: Notify,
    pub(crate) crypto: Arc<OnceCell<SessionCrypto>>,
    pub(crate) events: EventHub,
    pub(crate) stats: ClientStats,
}

/// An asynchronous secured message-wire client.
///
/// One client is one point-to-point session. Construction opens the
/// transport, starts the wire and dispatch loops, and in secured mode arms
/// the heartbeat timer with sends gated until the handshake completes.
pub struct Client {
    shared: Arc<Shared>,
    outbound_tx: mpsc::Sender<Vec<Bytes>>,
    command_tx: mpsc::Sender<Command>,
    loops: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl Client {
    /// Connect over TCP using the configured endpoint.
    pub async fn connect(config: ClientConfig) -> anyhow::Result<Self> {
        let client_id = ClientId::generate();
        let socket = TcpMessageSocket::connect(&config.endpoint, client_id.as_bytes()).await?;
        Ok(Self::assemble(config, Box::new(socket), client_id))
    }

    /// Assemble a client over an already-connected socket.
    ///
    /// This is the seam the in-memory [`pair`](crate::socket::pair) plugs
    /// into for tests and simulations. Must be called inside a tokio
    /// runtime.
    pub fn with_socket(config: ClientConfig, socket: Box<dyn MessageSocket>) -> Self {
        Self::assemble(config, socket, ClientId::generate())
    }

    fn assemble(config: ClientConfig, socket: Box<dyn MessageSocket>, client_id: ClientId) -> Self {
        let secured = config.secured();
        let shared = Arc::new(Shared {
            client_id,
            secured,
            credentials: config.credentials.clone(),
            heart_beat: config.heart_beat(),
            send_blocked: AtomicBool::new(secured),
            host_dead: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            established: AtomicBool::new(false),
            established_signal: Notify::new(),
            crypto: Arc::new(OnceCell::new()),
            events: EventHub::default(),
            stats: ClientStats::default(),
        });

        let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE_DEPTH);
        let (inbound_tx, inbound_rx) = mpsc::channel(QUEUE_DEPTH);
        let (command_tx, command_rx) = mpsc::channel(8);

        let wire = WireLoop {
            socket,
            outbound_rx,
            inbound_tx,
            shared: shared.clone(),
        };
        let dispatch = DispatchLoop {
            inbound_rx,
            command_rx,
            outbound_tx: outbound_tx.clone(),
            shared: shared.clone(),
            session: None,
        };

        let wire_handle = tokio::spawn(wire.run());
        let dispatch_handle = tokio::spawn(dispatch.run());
        debug!(
            "client {} started ({} mode)",
            shared.client_id,
            if secured { "secured" } else { "plaintext" }
        );

        Self {
            shared,
            outbound_tx,
            command_tx,
            loops: Mutex::new(Some((wire_handle, dispatch_handle))),
        }
    }

    /// The identity minted at construction.
    pub fn client_id(&self) -> ClientId {
        self.shared.client_id
    }

    /// Whether `send` would currently be accepted.
    pub fn can_send(&self) -> bool {
        !self.shared.send_blocked.load(Ordering::Acquire)
    }

    /// False once heartbeat liveness has failed; never recovers within this
    /// client instance.
    pub fn is_host_alive(&self) -> bool {
        !self.shared.host_dead.load(Ordering::Acquire)
    }

    /// Snapshot of the loop counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Enqueue an application message.
    ///
    /// Frames are transmitted in enqueue order and sealed on the wire loop
    /// once the secure channel is up.
    pub async fn send(&self, frames: Vec<Bytes>) -> Result<(), SendError> {
        if self.shared.disposed.load(Ordering::Acquire) {
            return Err(SendError::Disposed);
        }
        if frames.is_empty() {
            return Err(SendError::InvalidArgument);
        }
        if self.shared.send_blocked.load(Ordering::Acquire) {
            return Err(SendError::NotReady);
        }
        self.outbound_tx
            .send(frames)
            .await
            .map_err(|_| SendError::Disposed)
    }

    /// Drive the zero-knowledge handshake.
    ///
    /// Returns false immediately in plaintext mode, true if a session is
    /// already established. Otherwise starts a fresh exchange and, when
    /// `wait_for` is set (callers typically wait 500 ms), waits up to that
    /// long for the established signal; on expiry the exchange keeps
    /// running and a later protocol-established event is authoritative.
    pub async fn secure_connection(&self, wait_for: Option<Duration>) -> bool {
        if !self.shared.secured || self.shared.disposed.load(Ordering::Acquire) {
            return false;
        }
        if self.shared.established.load(Ordering::Acquire) {
            return true;
        }
        if self.command_tx.send(Command::StartHandshake).await.is_err() {
            return false;
        }

        let Some(window) = wait_for else {
            return false;
        };
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let notified = self.shared.established_signal.notified();
            if self.shared.established.load(Ordering::Acquire) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.shared.established.load(Ordering::Acquire);
            }
        }
    }

    /// Subscribe to delivered application messages.
    pub fn on_message_received(
        &self,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared.events.subscribe_message_received(Arc::new(handler))
    }

    /// Subscribe to messages that could not be classified or decrypted.
    pub fn on_invalid_message(
        &self,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared.events.subscribe_invalid_message(Arc::new(handler))
    }

    /// Subscribe to handshake completion.
    pub fn on_protocol_established(
        &self,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared.events.subscribe_protocol_established(Arc::new(handler))
    }

    /// Subscribe to handshake failure.
    pub fn on_protocol_failed(
        &self,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared.events.subscribe_protocol_failed(Arc::new(handler))
    }

    /// Drop a subscription from whichever event point holds it.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Release the loops, queues, and socket. Idempotent and safe to call
    /// from any thread; after disposal every `send` fails with
    /// [`SendError::Disposed`].
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.send_blocked.store(true, Ordering::Release);
        if let Some((wire, dispatch)) = self.loops.lock().expect("loop handles").take() {
            wire.abort();
            dispatch.abort();
        }
        debug!("client {} disposed", self.shared.client_id);
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.dispose();
    }
}
