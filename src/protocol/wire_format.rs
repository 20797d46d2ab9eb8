//! Wire format for the binary file channel.
//!
//! Each frame is a length-prefixed payload; the payload carries one file:
//!
//! ```text
//! Frame   := LEN4(total) Payload(total)
//! Payload := LEN2(nameLen) Name(nameLen) LEN4(contentLen) Content(contentLen)
//! ```
//!
//! All multi-byte integers are Big Endian; every length counts the bytes of
//! the field it prefixes. A payload whose name equals [`END_OF_TRANSFER`]
//! signals the end of the transfer instead of carrying a file, and no
//! content field follows it.

use bytes::Bytes;

use crate::error::{BridgeError, Result};

/// Size of the frame length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the file-name length field in bytes.
pub const NAME_LENGTH_SIZE: usize = 2;

/// Size of the content length field in bytes.
pub const CONTENT_LENGTH_SIZE: usize = 4;

/// Default maximum frame size (256 MB). Length prefixes beyond this are
/// treated as protocol violations rather than allocation requests.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 256 * 1024 * 1024;

/// Reserved file name signaling end-of-transfer.
pub const END_OF_TRANSFER: &str = "__sendFileEnd";

/// One decoded file-channel payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// Relative file name (may contain subdirectories).
    pub name: String,
    /// File content; `None` for the end-of-transfer sentinel.
    pub content: Option<Bytes>,
}

impl FilePayload {
    /// Check if this payload is the end-of-transfer sentinel.
    #[inline]
    pub fn is_end_of_transfer(&self) -> bool {
        self.name == END_OF_TRANSFER
    }

    /// Decode a complete payload (the bytes after the frame length prefix).
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Protocol` if a length field runs past the end
    /// of the buffer or the name is not valid UTF-8.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < NAME_LENGTH_SIZE {
            return Err(BridgeError::Protocol(
                "payload too short for name length".to_string(),
            ));
        }
        let name_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;

        let name_end = NAME_LENGTH_SIZE + name_len;
        if buf.len() < name_end {
            return Err(BridgeError::Protocol(format!(
                "name length {} exceeds payload size {}",
                name_len,
                buf.len()
            )));
        }
        let name = std::str::from_utf8(&buf[NAME_LENGTH_SIZE..name_end])
            .map_err(|e| BridgeError::Protocol(format!("file name is not UTF-8: {}", e)))?
            .to_string();

        if name == END_OF_TRANSFER {
            return Ok(Self {
                name,
                content: None,
            });
        }

        let content_start = name_end + CONTENT_LENGTH_SIZE;
        if buf.len() < content_start {
            return Err(BridgeError::Protocol(
                "payload too short for content length".to_string(),
            ));
        }
        let content_len = u32::from_be_bytes([
            buf[name_end],
            buf[name_end + 1],
            buf[name_end + 2],
            buf[name_end + 3],
        ]) as usize;

        let content_end = content_start + content_len;
        if buf.len() < content_end {
            return Err(BridgeError::Protocol(format!(
                "content length {} exceeds payload size {}",
                content_len,
                buf.len()
            )));
        }

        Ok(Self {
            name,
            content: Some(Bytes::copy_from_slice(&buf[content_start..content_end])),
        })
    }

    /// Encode a full frame (length prefix included) carrying one file.
    pub fn encode_frame(name: &str, content: &[u8]) -> Vec<u8> {
        let payload_len = NAME_LENGTH_SIZE + name.len() + CONTENT_LENGTH_SIZE + content.len();
        let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload_len);
        buf.extend_from_slice(&(payload_len as u32).to_be_bytes());
        buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&(content.len() as u32).to_be_bytes());
        buf.extend_from_slice(content);
        buf
    }

    /// Encode the end-of-transfer frame.
    pub fn encode_end_frame() -> Vec<u8> {
        let payload_len = NAME_LENGTH_SIZE + END_OF_TRANSFER.len();
        let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload_len);
        buf.extend_from_slice(&(payload_len as u32).to_be_bytes());
        buf.extend_from_slice(&(END_OF_TRANSFER.len() as u16).to_be_bytes());
        buf.extend_from_slice(END_OF_TRANSFER.as_bytes());
        buf
    }
}
