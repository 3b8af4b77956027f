//! Control-header vocabulary for handshake and liveness traffic.
//!
//! A handshake control message is recognized by its first frame being exactly
//! four bytes: `[SOH, ACK, phase, BEL]`. The phase octet identifies which
//! step of the zero-knowledge exchange (or which failure) the message
//! carries. A heartbeat is a message whose first frame equals the fixed
//! [`HEARTBEAT`] sentinel. Any other first frame is application payload.
//!
//! The phase byte values are a contract with the host; they are opaque to
//! any other party.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Start-of-heading control byte; first byte of every control frame.
pub const SOH: u8 = 0x01;
/// Acknowledge control byte; second byte of every control frame.
pub const ACK: u8 = 0x06;
/// Bell control byte; terminator of every control frame.
pub const BEL: u8 = 0x07;
/// Enquiry control byte; body of the heartbeat sentinel.
const ENQ: u8 = 0x05;

/// Exact length of a handshake control frame.
pub const CONTROL_FRAME_LEN: usize = 4;

/// Liveness sentinel: the sole frame of a heartbeat message.
pub const HEARTBEAT: [u8; 4] = [SOH, ENQ, ENQ, BEL];

/// Handshake phases emitted by the host.
///
/// `Step*` drive the client forward; `Fail*` reject the corresponding client
/// step; [`ServerPhase::FatalFail`] aborts the exchange outright.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerPhase {
    /// Fatal failure, exchange aborted before any step completed.
    FatalFail = 0xD0,
    /// Initiation acknowledged; host ready for the identity step.
    Step0 = 0xA0,
    /// Initiation rejected.
    Fail0 = 0xE0,
    /// Salt and host public value.
    Step1 = 0xA1,
    /// Identity step rejected.
    Fail1 = 0xE1,
    /// Host proof.
    Step2 = 0xA2,
    /// Client proof rejected.
    Fail2 = 0xE2,
}

impl TryFrom<u8> for ServerPhase {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xD0 => Ok(ServerPhase::FatalFail),
            0xA0 => Ok(ServerPhase::Step0),
            0xE0 => Ok(ServerPhase::Fail0),
            0xA1 => Ok(ServerPhase::Step1),
            0xE1 => Ok(ServerPhase::Fail1),
            0xA2 => Ok(ServerPhase::Step2),
            0xE2 => Ok(ServerPhase::Fail2),
            _ => Err(crate::WireError::Malformed),
        }
    }
}

/// Handshake phases emitted by the client.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientPhase {
    /// Opens the exchange.
    Initiation = 0xC0,
    /// Identity name and client public value.
    Handshake = 0xC1,
    /// Client proof.
    Proof = 0xC2,
}

/// Build the 4-byte control frame carrying the given phase octet.
pub fn control_frame(phase: u8) -> Bytes {
    Bytes::copy_from_slice(&[SOH, ACK, phase, BEL])
}

/// Build the single-frame heartbeat sentinel.
pub fn heartbeat_frame() -> Bytes {
    Bytes::from_static(&HEARTBEAT)
}

/// True iff `frames` is a well-formed handshake reply from the host.
///
/// Requires 2 or 3 frames, a first frame of exactly four bytes with bytes
/// 0, 1, 3 equal to SOH, ACK, BEL, and a phase octet from the host table.
pub fn is_handshake_reply(frames: &[Bytes]) -> bool {
    reply_phase(frames).is_some()
}

/// Extract the host phase of a handshake reply, if `frames` is one.
pub fn reply_phase(frames: &[Bytes]) -> Option<ServerPhase> {
    if frames.len() < 2 || frames.len() > 3 {
        return None;
    }
    let head = &frames[0];
    if head.len() != CONTROL_FRAME_LEN || head[0] != SOH || head[1] != ACK || head[3] != BEL {
        return None;
    }
    ServerPhase::try_from(head[2]).ok()
}

/// True iff the leading frame of `frames` is the heartbeat sentinel.
pub fn is_heartbeat(frames: &[Bytes]) -> bool {
    frames
        .first()
        .map(|f| f.as_ref() == HEARTBEAT)
        .unwrap_or(false)
}
