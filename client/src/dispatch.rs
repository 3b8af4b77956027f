//! Dispatch loop: inbound classification, handshake driving, liveness, and
//! user callback delivery.
//!
//! Every inbound batch is classified exactly once: heartbeat, handshake
//! control, or application payload. User callbacks run on this loop; a slow
//! handler delays only dispatch, never the socket.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::client::Shared;
use crate::error::HandshakeError;
use crate::events::Message;
use crate::handshake::HandshakeSession;
use zkmq_wire::{heartbeat_frame, is_heartbeat, reply_phase, ServerPhase};

/// Requests the facade hands to the dispatch loop.
pub(crate) enum Command {
    /// Begin (or restart) the zero-knowledge exchange.
    StartHandshake,
}

/// Silence tolerated before the host is declared dead, in heartbeat periods.
const DEAD_AFTER_PERIODS: u32 = 10;

pub(crate) struct DispatchLoop {
    pub(crate) inbound_rx: mpsc::Receiver<Vec<Bytes>>,
    pub(crate) command_rx: mpsc::Receiver<Command>,
    pub(crate) outbound_tx: mpsc::Sender<Vec<Bytes>>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) session: Option<HandshakeSession>,
}

impl DispatchLoop {
    pub(crate) async fn run(mut self) {
        // the heartbeat timer is armed only in secured mode
        let mut ticker = if self.shared.secured {
            let mut ticker = interval(self.shared.heart_beat);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticker)
        } else {
            None
        };

        loop {
            tokio::select! {
                biased;

                Some(command) = self.command_rx.recv() => match command {
                    Command::StartHandshake => self.start_handshake().await,
                },

                batch = self.inbound_rx.recv() => {
                    let Some(frames) = batch else {
                        debug!("inbound queue closed; dispatch loop stopping");
                        break;
                    };
                    self.handle_inbound(frames).await;
                }

                _ = tick(ticker.as_mut()) => self.on_heart_beat_tick().await,
            }
        }
    }

    async fn start_handshake(&mut self) {
        if self.shared.established.load(Ordering::Acquire) {
            return;
        }
        let Some(credentials) = self.shared.credentials.clone() else {
            return;
        };
        let mut session = HandshakeSession::new(
            credentials.identity,
            credentials.secret,
            self.shared.crypto.clone(),
        );
        let initiation = session.create_initiation_request();
        self.session = Some(session);
        self.enqueue(initiation).await;
    }

    async fn handle_inbound(&mut self, frames: Vec<Bytes>) {
        if is_heartbeat(&frames) {
            self.shared.stats.heartbeat_received();
            if let Some(session) = self.session.as_mut() {
                session.record_heart_beat();
            }
            return;
        }

        if self.shared.secured && self.shared.crypto.get().is_none() {
            self.drive_handshake(frames).await;
            return;
        }

        self.deliver(frames);
    }

    /// Route a handshake-window message by its phase octet.
    async fn drive_handshake(&mut self, frames: Vec<Bytes>) {
        let Some(phase) = reply_phase(&frames) else {
            debug!("unclassifiable message during handshake");
            self.shared.stats.invalid_message();
            self.shared.events.emit_invalid_message(&Message {
                client_id: self.shared.client_id,
                frames,
            });
            return;
        };

        match phase {
            ServerPhase::Step0 => {
                let reply = match self.session.as_mut() {
                    Some(session) => session.create_handshake_request(&frames),
                    None => Err(HandshakeError::OutOfOrder),
                };
                match reply {
                    Ok(step) => self.enqueue(step).await,
                    Err(err) => self.fail_protocol(err),
                }
            }

            ServerPhase::Step1 => {
                let reply = match self.session.as_mut() {
                    Some(session) => session.create_proof_request(&frames),
                    None => Err(HandshakeError::OutOfOrder),
                };
                match reply {
                    Ok(step) => self.enqueue(step).await,
                    Err(err) => self.fail_protocol(err),
                }
            }

            ServerPhase::Step2 => {
                let verdict = match self.session.as_mut() {
                    Some(session) => session.process_proof_reply(&frames),
                    None => Err(HandshakeError::OutOfOrder),
                };
                match verdict {
                    Ok(()) => {
                        self.shared.send_blocked.store(false, Ordering::Release);
                        self.shared.established.store(true, Ordering::Release);
                        self.shared.established_signal.notify_waiters();
                        info!("secure session established");
                        self.shared.events.emit_protocol_established();
                    }
                    Err(err) => self.fail_protocol(err),
                }
            }

            ServerPhase::FatalFail
            | ServerPhase::Fail0
            | ServerPhase::Fail1
            | ServerPhase::Fail2 => {
                if let Some(session) = self.session.as_mut() {
                    session.fail();
                }
                self.fail_protocol(HandshakeError::Rejected);
            }
        }
    }

    /// Decrypt if the channel is up, then hand the message to subscribers.
    fn deliver(&mut self, frames: Vec<Bytes>) {
        let frames = match self.shared.crypto.get() {
            Some(crypto) => {
                let mut plain = Vec::with_capacity(frames.len());
                let mut tainted = false;
                for frame in &frames {
                    match crypto.decrypt(frame) {
                        Ok(decrypted) => plain.push(decrypted),
                        Err(err) => {
                            warn!("inbound frame failed authentication: {err}");
                            tainted = true;
                            break;
                        }
                    }
                }
                if tainted {
                    self.shared.stats.invalid_message();
                    self.shared.events.emit_invalid_message(&Message {
                        client_id: self.shared.client_id,
                        frames,
                    });
                    return;
                }
                plain
            }
            None => frames,
        };

        self.shared.stats.message_received();
        self.shared.events.emit_message_received(&Message {
            client_id: self.shared.client_id,
            frames,
        });
    }

    async fn on_heart_beat_tick(&mut self) {
        if self.shared.host_dead.load(Ordering::Acquire) {
            // the latch never clears within a client instance; a straggler
            // heartbeat must not restart emission
            return;
        }

        if self.shared.crypto.get().is_none() {
            // handshake incomplete: keep the send gate closed
            self.shared.send_blocked.store(true, Ordering::Release);
            return;
        }

        let threshold = self.shared.heart_beat * DEAD_AFTER_PERIODS;
        let silent = self
            .session
            .as_ref()
            .map(|session| session.since_heart_beat() > threshold)
            .unwrap_or(true);
        if silent {
            self.shared.host_dead.store(true, Ordering::Release);
            self.shared.send_blocked.store(true, Ordering::Release);
            warn!("host declared dead after {threshold:?} of heartbeat silence");
            return;
        }

        if self.outbound_tx.send(vec![heartbeat_frame()]).await.is_ok() {
            self.shared.stats.heartbeat_sent();
            trace!("heartbeat enqueued");
        }
    }

    async fn enqueue(&mut self, frames: Vec<Bytes>) {
        if self.outbound_tx.send(frames).await.is_err() {
            debug!("outbound queue closed");
        }
    }

    fn fail_protocol(&mut self, err: HandshakeError) {
        warn!("encryption protocol failed: {err}");
        self.shared.stats.handshake_failure();
        self.shared.events.emit_protocol_failed();
    }
}

async fn tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
