//! Frame buffer for accumulating partial reads on the file channel.
//!
//! Uses `bytes::BytesMut` for buffer management and a two-state machine:
//! - `AwaitingLength`: need the 4-byte frame length prefix
//! - `AwaitingPayload`: prefix consumed, need N more payload bytes
//!
//! A single `push` may complete zero frames (fragmentation) or several
//! (coalescing); extraction runs in an explicit loop so stack usage stays
//! flat no matter how many frames one read coalesces.

use bytes::{Bytes, BytesMut};

use super::wire_format::{DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};
use crate::error::{BridgeError, Result};

/// State machine for frame extraction.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for the complete 4-byte length prefix.
    AwaitingLength,
    /// Prefix parsed, waiting for `expected` payload bytes.
    AwaitingPayload { expected: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete payloads.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current extraction state.
    state: State,
    /// Maximum allowed frame size.
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with a custom size limit.
    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::AwaitingLength,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete payloads.
    ///
    /// Returns the payloads completed by this chunk, in arrival order; an
    /// empty vector means more data is needed. Partial data is buffered for
    /// the next push.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Protocol` if a length prefix exceeds the
    /// configured maximum. The frame is unrecoverable at that point; the
    /// caller decides whether to drop the connection.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut payloads = Vec::new();
        while let Some(payload) = self.try_extract_one()? {
            payloads.push(payload);
        }
        Ok(payloads)
    }

    /// Try to extract a single payload from the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed.
    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            State::AwaitingLength => {
                if self.buffer.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }

                let expected = u32::from_be_bytes([
                    self.buffer[0],
                    self.buffer[1],
                    self.buffer[2],
                    self.buffer[3],
                ]);

                if expected > self.max_frame_size {
                    return Err(BridgeError::Protocol(format!(
                        "frame size {} exceeds maximum {}",
                        expected, self.max_frame_size
                    )));
                }

                let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);
                self.state = State::AwaitingPayload {
                    expected: expected as usize,
                };
                self.try_extract_one()
            }

            State::AwaitingPayload { expected } => {
                if self.buffer.len() < expected {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(expected).freeze();
                self.state = State::AwaitingLength;
                Ok(Some(payload))
            }
        }
    }

    /// Get the number of buffered bytes not yet part of a complete payload.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::AwaitingLength;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::AwaitingLength => "AwaitingLength",
            State::AwaitingPayload { .. } => "AwaitingPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to build a length-prefixed frame around arbitrary payload.
    fn make_frame(payload: &[u8]) -> Vec<u8> {
        let mut bytes = (payload.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frame = make_frame(b"hello");

        let payloads = buffer.push(&frame).unwrap();

        assert_eq!(payloads.len(), 1);
        assert_eq!(&payloads[0][..], b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut combined = make_frame(b"first");
        combined.extend(make_frame(b"second"));
        combined.extend(make_frame(b"third"));

        let payloads = buffer.push(&combined).unwrap();

        assert_eq!(payloads.len(), 3);
        assert_eq!(&payloads[0][..], b"first");
        assert_eq!(&payloads[1][..], b"second");
        assert_eq!(&payloads[2][..], b"third");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_length_prefix() {
        let mut buffer = FrameBuffer::new();
        let frame = make_frame(b"test");

        // Push only 2 of the 4 prefix bytes.
        let payloads = buffer.push(&frame[..2]).unwrap();
        assert!(payloads.is_empty());
        assert_eq!(buffer.state_name(), "AwaitingLength");

        let payloads = buffer.push(&frame[2..]).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(&payloads[0][..], b"test");
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let frame = make_frame(b"a longer payload that arrives in pieces");

        let split = LENGTH_PREFIX_SIZE + 10;
        let payloads = buffer.push(&frame[..split]).unwrap();
        assert!(payloads.is_empty());
        assert_eq!(buffer.state_name(), "AwaitingPayload");

        let payloads = buffer.push(&frame[split..]).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(&payloads[0][..], b"a longer payload that arrives in pieces");
    }

    #[test]
    fn test_complete_frame_plus_trailing_partial() {
        let mut buffer = FrameBuffer::new();
        let frame1 = make_frame(b"first");
        let frame2 = make_frame(b"second");

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2[..5]);

        let payloads = buffer.push(&data).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(&payloads[0][..], b"first");

        // Remainder of the second frame is preserved across calls.
        let payloads = buffer.push(&frame2[5..]).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(&payloads[0][..], b"second");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frame = make_frame(b"hi");

        let mut all = Vec::new();
        for byte in &frame {
            all.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all.len(), 1);
        assert_eq!(&all[0][..], b"hi");
    }

    #[test]
    fn test_every_split_position() {
        let frame = make_frame(b"split me anywhere");

        for split in 0..=frame.len() {
            let mut buffer = FrameBuffer::new();
            let mut all = buffer.push(&frame[..split]).unwrap();
            all.extend(buffer.push(&frame[split..]).unwrap());

            assert_eq!(all.len(), 1, "split at {}", split);
            assert_eq!(&all[0][..], b"split me anywhere", "split at {}", split);
        }
    }

    #[test]
    fn test_max_frame_size_violation() {
        let mut buffer = FrameBuffer::with_max_frame_size(100);

        // Prefix claiming a 1000-byte frame.
        let prefix = 1000u32.to_be_bytes();
        let result = buffer.push(&prefix);

        assert!(matches!(result, Err(BridgeError::Protocol(_))));
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut buffer = FrameBuffer::new();
        let payloads = buffer.push(&make_frame(b"")).unwrap();

        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].is_empty());
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let frame = make_frame(b"test");

        buffer.push(&frame[..6]).unwrap();
        assert_eq!(buffer.state_name(), "AwaitingPayload");
        assert!(!buffer.is_empty());

        buffer.clear();
        assert_eq!(buffer.state_name(), "AwaitingLength");
        assert!(buffer.is_empty());
    }
}
