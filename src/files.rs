//! File receiver for the binary file channel.
//!
//! Reassembles length-prefixed frames from the connection and writes each
//! received file into a staging directory. The staging directory is purged
//! and recreated once per session, when the receiver is constructed, so no
//! stale artifacts from an earlier session survive.

use std::path::{Component, Path, PathBuf};

use crate::error::{BridgeError, Result};
use crate::protocol::{FilePayload, FrameBuffer};

/// Outcome of one completed file-channel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// A file was reassembled and written; carries its relative name.
    FileWritten(String),
    /// The sender signaled end-of-transfer; no file was written.
    TransferComplete,
}

/// Reassembles file frames and writes them under a staging directory.
pub struct FileReceiver {
    staging_dir: PathBuf,
    buffer: FrameBuffer,
}

impl FileReceiver {
    /// Create a receiver rooted at `staging_dir`.
    ///
    /// Removes any existing directory at that path and recreates it empty.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_buffer(staging_dir, FrameBuffer::new())
    }

    /// Create a receiver with a custom frame buffer (size limits).
    pub fn with_buffer(staging_dir: impl Into<PathBuf>, buffer: FrameBuffer) -> Result<Self> {
        let staging_dir = staging_dir.into();
        if staging_dir.exists() {
            std::fs::remove_dir_all(&staging_dir)?;
        }
        std::fs::create_dir_all(&staging_dir)?;

        Ok(Self {
            staging_dir,
            buffer,
        })
    }

    /// Get the staging directory path.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Feed a chunk of bytes from the connection.
    ///
    /// Returns one event per frame completed by this chunk, in arrival
    /// order; an empty vector means the frame is still incomplete and the
    /// partial data is buffered for the next call. A single chunk may
    /// complete several coalesced frames.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Protocol` for malformed frames (absurd length
    /// prefix, truncated fields, path-escaping names) and `BridgeError::Io`
    /// if the staging write fails. Both are fatal to the current frame;
    /// the caller decides whether to drop the connection.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<FileEvent>> {
        let payloads = self.buffer.push(chunk)?;

        let mut events = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let payload = FilePayload::decode(&payload)?;
            if payload.is_end_of_transfer() {
                tracing::debug!("file transfer complete");
                events.push(FileEvent::TransferComplete);
                continue;
            }

            let content = payload.content.as_deref().unwrap_or_default();
            self.write_file(&payload.name, content)?;
            tracing::debug!(name = %payload.name, bytes = content.len(), "file received");
            events.push(FileEvent::FileWritten(payload.name));
        }
        Ok(events)
    }

    /// Write one received file, creating intermediate directories.
    fn write_file(&self, name: &str, content: &[u8]) -> Result<()> {
        let relative = sanitize_name(name)?;
        let path = self.staging_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(())
    }
}

/// Reject names that would escape the staging directory.
fn sanitize_name(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let escapes = path.components().any(|c| {
        !matches!(c, Component::Normal(_) | Component::CurDir)
    });
    if name.is_empty() || escapes {
        return Err(BridgeError::Protocol(format!(
            "file name escapes staging directory: {:?}",
            name
        )));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FilePayload;

    fn receiver() -> (FileReceiver, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let receiver = FileReceiver::new(dir.path().join("staging")).unwrap();
        (receiver, dir)
    }

    #[test]
    fn test_single_file_written() {
        let (mut rx, _dir) = receiver();
        let frame = FilePayload::encode_frame("main.lua", b"print('hi')");

        let events = rx.feed(&frame).unwrap();

        assert_eq!(events, vec![FileEvent::FileWritten("main.lua".to_string())]);
        let written = std::fs::read(rx.staging_dir().join("main.lua")).unwrap();
        assert_eq!(written, b"print('hi')");
    }

    #[test]
    fn test_chunking_invariance() {
        let content = b"some file content that gets split";
        let frame = FilePayload::encode_frame("split.lua", content);

        for split in 0..=frame.len() {
            let (mut rx, _dir) = receiver();
            let mut events = rx.feed(&frame[..split]).unwrap();
            events.extend(rx.feed(&frame[split..]).unwrap());

            assert_eq!(
                events,
                vec![FileEvent::FileWritten("split.lua".to_string())],
                "split at {}",
                split
            );
            let written = std::fs::read(rx.staging_dir().join("split.lua")).unwrap();
            assert_eq!(written, content, "split at {}", split);
        }
    }

    #[test]
    fn test_coalesced_frames_in_order() {
        let (mut rx, _dir) = receiver();
        let mut data = FilePayload::encode_frame("a.lua", b"aaa");
        data.extend(FilePayload::encode_frame("b.lua", b"bbb"));
        // Trailing partial frame stays buffered.
        let third = FilePayload::encode_frame("c.lua", b"ccc");
        data.extend_from_slice(&third[..7]);

        let events = rx.feed(&data).unwrap();
        assert_eq!(
            events,
            vec![
                FileEvent::FileWritten("a.lua".to_string()),
                FileEvent::FileWritten("b.lua".to_string()),
            ]
        );

        let events = rx.feed(&third[7..]).unwrap();
        assert_eq!(events, vec![FileEvent::FileWritten("c.lua".to_string())]);
    }

    #[test]
    fn test_sentinel_yields_transfer_complete() {
        let (mut rx, _dir) = receiver();
        let frame = FilePayload::encode_end_frame();

        let events = rx.feed(&frame).unwrap();

        assert_eq!(events, vec![FileEvent::TransferComplete]);
        // Nothing written for the sentinel.
        let entries: Vec<_> = std::fs::read_dir(rx.staging_dir()).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_subdirectories_created() {
        let (mut rx, _dir) = receiver();
        let frame = FilePayload::encode_frame("lib/util/strings.lua", b"...");

        rx.feed(&frame).unwrap();

        assert!(rx.staging_dir().join("lib/util/strings.lua").is_file());
    }

    #[test]
    fn test_staging_purged_on_construction() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("stale.lua"), b"old").unwrap();

        let rx = FileReceiver::new(&staging).unwrap();

        assert!(!rx.staging_dir().join("stale.lua").exists());
    }

    #[test]
    fn test_escaping_name_rejected() {
        let (mut rx, _dir) = receiver();
        let frame = FilePayload::encode_frame("../outside.lua", b"nope");

        let result = rx.feed(&frame);

        assert!(matches!(result, Err(BridgeError::Protocol(_))));
    }

    #[test]
    fn test_incomplete_returns_no_events() {
        let (mut rx, _dir) = receiver();
        let frame = FilePayload::encode_frame("a.lua", b"aaa");

        assert!(rx.feed(&frame[..3]).unwrap().is_empty());
        assert!(rx.feed(&frame[3..6]).unwrap().is_empty());
        assert_eq!(rx.feed(&frame[6..]).unwrap().len(), 1);
    }
}
