//! Wire vocabulary and framing for the zkmq secure message-wire protocol.
//!
//! This crate provides the low-level pieces shared between the client and
//! the host: the control-header vocabulary that classifies a multipart
//! message as handshake control, heartbeat, or application payload, and a
//! multipart codec that carries a sequence of opaque frames over a byte
//! stream.
//!
//! ## Message classes
//!
//! - **Handshake control**: first frame is exactly `[SOH, ACK, phase, BEL]`.
//! - **Heartbeat**: first frame equals the fixed [`HEARTBEAT`] sentinel.
//! - **Application**: anything else; frames are opaque to this crate.
//!
//! ## Wire format (stream transports)
//!
//! ```text
//! +----------------------+-----------------------------+
//! | u32 msg_len          | length of bytes that follow |
//! +----------------------+-----------------------------+
//! | u32 frame_count      | number of frames            |
//! +----------------------+-----------------------------+
//! | u32 len | bytes      | repeated frame_count times  |
//! +----------------------+-----------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod header;
pub mod multipart;

pub use error::WireError;
pub use header::{
    control_frame, heartbeat_frame, is_handshake_reply, is_heartbeat, reply_phase, ClientPhase,
    ServerPhase, ACK, BEL, CONTROL_FRAME_LEN, HEARTBEAT, SOH,
};
pub use multipart::{encode_message, MessageDecoder, DEFAULT_MAX_MESSAGE_SIZE, MAX_FRAME_COUNT};
