//! Wire I/O loop: owns the transport socket and the outbound queue.
//!
//! The loop's sole purpose is to keep the socket moving. It never runs user
//! callbacks and never waits on the handshake driver; the only
//! cryptographic work it performs is per-frame symmetric sealing once the
//! channel is published.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::client::Shared;
use crate::socket::MessageSocket;
use zkmq_wire::is_heartbeat;

pub(crate) struct WireLoop {
    pub(crate) socket: Box<dyn MessageSocket>,
    pub(crate) outbound_rx: mpsc::Receiver<Vec<Bytes>>,
    pub(crate) inbound_tx: mpsc::Sender<Vec<Bytes>>,
    pub(crate) shared: Arc<Shared>,
}

impl WireLoop {
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                batch = self.outbound_rx.recv() => {
                    let Some(frames) = batch else {
                        debug!("outbound queue closed; wire loop stopping");
                        break;
                    };
                    if let Err(err) = self.transmit(frames).await {
                        warn!("transmit failed: {err:#}");
                        break;
                    }
                }

                message = self.socket.recv() => {
                    match message {
                        Ok(frames) => {
                            if !self.deliver(frames).await {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!("socket receive failed: {err:#}");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Prepend the empty dealer addressing frame, seal application frames
    /// when the channel is up, and put the message on the socket.
    ///
    /// Heartbeats and handshake control bypass the cipher; the latter only
    /// ever pass through here before the channel exists.
    async fn transmit(&mut self, frames: Vec<Bytes>) -> anyhow::Result<()> {
        let mut wire = Vec::with_capacity(frames.len() + 1);
        wire.push(Bytes::new());

        match self.shared.crypto.get() {
            Some(crypto) if !is_heartbeat(&frames) => {
                for frame in &frames {
                    wire.push(crypto.encrypt(frame)?);
                }
            }
            _ => wire.extend(frames),
        }

        self.socket.send(wire).await?;
        self.shared.stats.message_sent();
        Ok(())
    }

    /// Strip the leading addressing frame and hand the rest to dispatch.
    async fn deliver(&mut self, mut frames: Vec<Bytes>) -> bool {
        if frames.is_empty() {
            trace!("dropping message with no frames");
            return true;
        }
        frames.remove(0);
        if frames.is_empty() {
            trace!("dropping message with only an addressing frame");
            return true;
        }
        if self.inbound_tx.send(frames).await.is_err() {
            debug!("inbound queue closed; wire loop stopping");
            return false;
        }
        true
    }
}
