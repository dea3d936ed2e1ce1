use crate::{
    defined::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE},
    message::Message,
};

use super::TransportError;

/// Encodes a message into a frame: a big-endian `u32` length followed by the MessagePack payload.
pub fn encode(msg: &Message) -> Result<Vec<u8>, TransportError> {
    let payload =
        rmp_serde::to_vec(msg).map_err(|e| TransportError::InvalidFrame(e.to_string()))?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(TransportError::InvalidFrame(format!(
            "payload of {} bytes exceeds the limit of {} bytes",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes the payload of a single frame (without the length prefix).
pub fn decode(payload: &[u8]) -> Result<Message, TransportError> {
    rmp_serde::from_slice(payload).map_err(|e| TransportError::InvalidFrame(e.to_string()))
}

/// Reassembles frames from a byte stream.
///
/// Bytes are fed with [`FrameDecoder::extend`]; complete frames are taken out with
/// [`FrameDecoder::next_frame`]. A partial frame stays buffered until the rest arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Appends received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// The number of buffered bytes that do not yet form a complete frame.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Takes the next complete frame out of the buffer, if any.
    pub fn next_frame(&mut self) -> Result<Option<Message>, TransportError> {
        if self.buffer.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&self.buffer[..FRAME_HEADER_SIZE]);
        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(TransportError::InvalidFrame(format!(
                "frame of {len} bytes exceeds the limit of {MAX_FRAME_SIZE} bytes"
            )));
        }
        if self.buffer.len() < FRAME_HEADER_SIZE + len {
            return Ok(None);
        }

        let msg = decode(&self.buffer[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + len]);
        self.buffer.drain(..FRAME_HEADER_SIZE + len);
        tracing::trace!("decoded frame of {} bytes", len);
        msg.map(Some)
    }
}
