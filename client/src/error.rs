//! Client error types.

use thiserror::Error;

/// Errors returned by [`Client::send`](crate::Client::send).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The client has been disposed.
    #[error("client disposed")]
    Disposed,

    /// The frame batch was empty.
    #[error("empty message")]
    InvalidArgument,

    /// The session is not ready to carry application frames: the handshake
    /// has not completed, or the host was declared dead.
    #[error("session not ready")]
    NotReady,
}

/// Handshake driver failures.
///
/// Returned by the [`HandshakeSession`](crate::HandshakeSession) driver
/// operations. The facade never throws these; the dispatch loop surfaces
/// them through the protocol-failed event.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
    /// A driver operation was invoked in the wrong state.
    #[error("handshake step out of order")]
    OutOfOrder,

    /// A host step carried an unusable payload.
    #[error("malformed host step")]
    Malformed,

    /// The host signalled a failure phase.
    #[error("host rejected the exchange")]
    Rejected,

    /// The host proof did not verify.
    #[error("host proof verification failed")]
    BadProof,
}

/// Connection-string parse failures.
#[derive(Error, Debug)]
pub enum EndpointError {
    /// The connection string does not carry a supported scheme.
    #[error("unsupported scheme in {0:?}")]
    Scheme(String),

    /// The address part did not resolve.
    #[error("invalid address in {0:?}")]
    Address(String),
}
