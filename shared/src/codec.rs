//! Length-prefixed codec for typed message frames over byte streams
//!
//! All frames are laid out as:
//! ```text
//! [ 4 bytes: length (u32, big-endian) ][ 1 byte: kind opcode ][ N bytes: payload ]
//! ```
//!
//! The length counts the kind byte plus the payload, so an empty message is
//! still a 5-byte frame with length 1.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::connection::MessageKind;

/// Maximum message size (10 MB) to prevent memory exhaustion
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

const PREFIX_LEN: usize = 4;

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: MessageKind,
    pub payload: Bytes,
}

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("Invalid message length prefix: {0}")]
    InvalidLength(u32),

    #[error("Unknown message kind opcode: {0:#04x}")]
    UnknownKind(u8),
}

impl From<CodecError> for std::io::Error {
    fn from(err: CodecError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

/// Append one length-prefixed frame to `buf`
pub fn encode_into(kind: MessageKind, payload: &[u8], buf: &mut BytesMut) -> Result<(), CodecError> {
    let body_len = payload.len() + 1;

    if body_len > MAX_MESSAGE_SIZE as usize {
        return Err(CodecError::MessageTooLarge(payload.len()));
    }

    buf.reserve(PREFIX_LEN + body_len);
    buf.put_u32(body_len as u32);
    buf.put_u8(kind.opcode());
    buf.put_slice(payload);

    Ok(())
}

/// Try to decode a length-prefixed frame from a buffer
///
/// Returns:
/// - `Ok(Some(frame))` if a complete frame was decoded
/// - `Ok(None)` if more data is needed (nothing is consumed)
/// - `Err(...)` if the data is invalid
pub fn decode(buf: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
    if buf.len() < PREFIX_LEN {
        return Ok(None);
    }

    // Peek at the length prefix without consuming
    let body_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);

    if body_len == 0 || body_len > MAX_MESSAGE_SIZE {
        return Err(CodecError::InvalidLength(body_len));
    }

    let total_len = PREFIX_LEN + body_len as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    let opcode = buf[PREFIX_LEN];
    let kind = MessageKind::from_opcode(opcode).ok_or(CodecError::UnknownKind(opcode))?;

    buf.advance(PREFIX_LEN + 1);
    let payload = buf.split_to(body_len as usize - 1).freeze();

    Ok(Some(Frame { kind, payload }))
}

/// Decoder state machine for streaming decoding
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next(&mut self) -> Result<Option<Frame>, CodecError> {
        decode(&mut self.buffer)
    }
}
