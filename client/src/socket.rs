//! Transport sockets for the message-wire client.
//!
//! The transport contract is small: a connected, reliable, bidirectional
//! multipart message socket with an attachable identity. [`TcpMessageSocket`]
//! is the production implementation; [`pair`] builds a channel-backed socket
//! pair for tests and simulations.

use std::net::{SocketAddr, ToSocketAddrs};

use anyhow::bail;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::EndpointError;
use zkmq_wire::{encode_message, MessageDecoder, DEFAULT_MAX_MESSAGE_SIZE};

/// A connected multipart message socket.
#[async_trait]
pub trait MessageSocket: Send {
    /// Send one multipart message.
    async fn send(&mut self, frames: Vec<Bytes>) -> anyhow::Result<()>;

    /// Receive one multipart message.
    async fn recv(&mut self) -> anyhow::Result<Vec<Bytes>>;
}

/// Parse a `tcp://host:port` connection string.
pub fn parse_endpoint(endpoint: &str) -> Result<SocketAddr, EndpointError> {
    let rest = endpoint
        .strip_prefix("tcp://")
        .ok_or_else(|| EndpointError::Scheme(endpoint.to_string()))?;
    rest.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| EndpointError::Address(endpoint.to_string()))
}

/// Dealer-style message socket over TCP.
///
/// On connect it announces the 16-byte client identity as a single-frame
/// greeting message, then exchanges multipart messages via the wire codec.
pub struct TcpMessageSocket {
    stream: TcpStream,
    decoder: MessageDecoder,
    read_buf: BytesMut,
}

impl TcpMessageSocket {
    /// Connect to the endpoint and attach the transport identity.
    pub async fn connect(endpoint: &str, identity: &[u8]) -> anyhow::Result<Self> {
        let addr = parse_endpoint(endpoint)?;
        let stream = TcpStream::connect(addr).await?;
        debug!("connected to {addr}");

        let mut socket = Self {
            stream,
            decoder: MessageDecoder::new(),
            read_buf: BytesMut::with_capacity(64 * 1024),
        };
        socket.send(vec![Bytes::copy_from_slice(identity)]).await?;
        Ok(socket)
    }
}

#[async_trait]
impl MessageSocket for TcpMessageSocket {
    async fn send(&mut self, frames: Vec<Bytes>) -> anyhow::Result<()> {
        let encoded = encode_message(&frames, DEFAULT_MAX_MESSAGE_SIZE)?;
        self.stream.write_all(&encoded).await?;
        Ok(())
    }

    async fn recv(&mut self) -> anyhow::Result<Vec<Bytes>> {
        loop {
            if let Some(frames) = self.decoder.decode(&mut self.read_buf)? {
                return Ok(frames);
            }
            let read = self.stream.read_buf(&mut self.read_buf).await?;
            if read == 0 {
                bail!("connection closed by peer");
            }
        }
    }
}

/// Channel-backed socket, one end of a [`pair`].
pub struct PairSocket {
    tx: mpsc::UnboundedSender<Vec<Bytes>>,
    rx: mpsc::UnboundedReceiver<Vec<Bytes>>,
}

/// Create a connected in-memory socket pair.
pub fn pair() -> (PairSocket, PairSocket) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        PairSocket { tx: a_tx, rx: b_rx },
        PairSocket { tx: b_tx, rx: a_rx },
    )
}

#[async_trait]
impl MessageSocket for PairSocket {
    async fn send(&mut self, frames: Vec<Bytes>) -> anyhow::Result<()> {
        if self.tx.send(frames).is_err() {
            bail!("peer end dropped");
        }
        Ok(())
    }

    async fn recv(&mut self) -> anyhow::Result<Vec<Bytes>> {
        match self.rx.recv().await {
            Some(frames) => Ok(frames),
            None => bail!("peer end dropped"),
        }
    }
}
