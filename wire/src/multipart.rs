//! Multipart message framing for stream transports.
//!
//! A wire message is an ordered sequence of opaque frames. On a byte stream
//! it is carried as a u32 length prefix followed by a u32 frame count and
//! one length-prefixed frame per entry. The decoder is incremental: it
//! returns `Ok(None)` until a complete message is buffered.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::WireError;

/// Maximum encoded message size accepted by default (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Maximum number of frames in one message.
pub const MAX_FRAME_COUNT: usize = 256;

/// Encode a frame sequence into one contiguous wire message.
pub fn encode_message(frames: &[Bytes], max_size: usize) -> Result<Bytes, WireError> {
    if frames.len() > MAX_FRAME_COUNT {
        return Err(WireError::FrameCount(frames.len()));
    }

    let body_len = 4 + frames.iter().map(|f| 4 + f.len()).sum::<usize>();
    let total = 4 + body_len;
    if total > max_size {
        return Err(WireError::Size(total));
    }

    let mut buf = BytesMut::with_capacity(total);
    buf.put_u32(body_len as u32);
    buf.put_u32(frames.len() as u32);
    for frame in frames {
        buf.put_u32(frame.len() as u32);
        buf.put_slice(frame);
    }
    Ok(buf.freeze())
}

/// Incremental decoder for multipart wire messages.
#[derive(Debug)]
pub struct MessageDecoder {
    max_message_size: usize,
}

impl MessageDecoder {
    /// Create a decoder with the default size limit.
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Create a decoder with a custom size limit.
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Decode one message from the buffer.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// message. Consumed bytes are removed from `buf`.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Vec<Bytes>>, WireError> {
        if buf.len() < 4 {
            return Ok(None);
        }

        let body_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if 4 + body_len > self.max_message_size {
            return Err(WireError::Size(4 + body_len));
        }
        if buf.len() < 4 + body_len {
            return Ok(None);
        }

        buf.advance(4);
        let mut body = buf.split_to(body_len).freeze();

        if body.len() < 4 {
            return Err(WireError::Malformed);
        }
        let count = body.get_u32() as usize;
        if count > MAX_FRAME_COUNT {
            return Err(WireError::FrameCount(count));
        }

        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            if body.len() < 4 {
                return Err(WireError::Malformed);
            }
            let len = body.get_u32() as usize;
            if body.len() < len {
                return Err(WireError::Malformed);
            }
            frames.push(body.split_to(len));
        }
        if !body.is_empty() {
            return Err(WireError::Malformed);
        }

        Ok(Some(frames))
    }
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}
