//! Asynchronous secured message-wire client.
//!
//! This crate implements the client half of a secure message-wire
//! transport: a framed-message client that establishes a mutually
//! authenticated encrypted session with a remote host through a
//! zero-knowledge challenge-response handshake, then exchanges application
//! messages as sequences of opaque byte frames over a dealer-style
//! multipart socket.
//!
//! ## Architecture
//!
//! Two independent single-threaded loops hand work to each other through
//! bounded queues:
//!
//! - the **wire loop** owns the socket and the outbound queue; it seals
//!   outbound frames once the channel is up and never runs user code,
//! - the **dispatch loop** owns the inbound queue, the heartbeat timer, and
//!   the handshake driver; it classifies every inbound message exactly once
//!   and invokes subscriber callbacks.
//!
//! The derived channel crypto is published from dispatch to wire through a
//! one-shot slot; readiness and liveness are plain atomic flags.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use zkmq_client::{Client, ClientConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::new("tcp://127.0.0.1:5700")
//!     .with_credentials("alice", "s3cret")
//!     .with_heart_beat_ms(10_000);
//!
//! let client = Client::connect(config).await?;
//! client.on_message_received(|message| {
//!     println!("{}: {} frames", message.client_id, message.frames.len());
//! });
//!
//! if client.secure_connection(Some(Duration::from_millis(500))).await {
//!     client.send(vec![bytes::Bytes::from_static(b"hello")]).await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod handshake;
pub mod identity;
pub mod socket;
pub mod stats;
pub mod zk;

mod dispatch;
mod wire_loop;

pub use client::Client;
pub use config::{
    ClientConfig, Credentials, DEFAULT_HEART_BEAT_MS, MAX_HEART_BEAT_MS, MIN_HEART_BEAT_MS,
};
pub use crypto::{CryptoError, Role, SessionCrypto, NONCE_LEN};
pub use error::{EndpointError, HandshakeError, SendError};
pub use events::{Message, SubscriptionId};
pub use handshake::{HandshakeSession, HandshakeState};
pub use identity::ClientId;
pub use socket::{pair, MessageSocket, PairSocket, TcpMessageSocket};
pub use stats::{ClientStats, StatsSnapshot};
