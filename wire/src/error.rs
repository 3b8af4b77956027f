//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Message size limit exceeded
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// Frame count limit exceeded
    #[error("too many frames: {0}")]
    FrameCount(usize),

    /// Malformed message structure
    #[error("malformed message")]
    Malformed,
}
