//! Per-connection session: routing between the two sub-protocols, plus
//! the async driver for a live connection.
//!
//! Both reassembly pipelines and the pending-callback registry live in one
//! [`DebugSession`] constructed per accepted connection, so simultaneous
//! connections never share state. The driver ([`run`]) owns the read loop:
//! it reads from the socket, hands each chunk to [`DebugSession::on_read`],
//! and ticks the timeout sweep from an independent timer so an idle
//! connection still expires its requests.

use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::command::{Callback, CommandProcessor};
use crate::config::SessionConfig;
use crate::error::{BridgeError, Result};
use crate::files::{FileEvent, FileReceiver};
use crate::protocol::FrameBuffer;
use crate::runtime::DebugRuntime;
use crate::writer::spawn_writer_task;

/// Which sub-protocol currently owns inbound bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMode {
    /// Delimiter-separated JSON command text.
    Commands,
    /// Length-prefixed binary file frames.
    FileTransfer,
}

/// One debugger connection: command processor, file receiver, and routing.
pub struct DebugSession<R> {
    processor: CommandProcessor<R>,
    files: FileReceiver,
    mode: InboundMode,
    sweep_interval: Duration,
}

impl<R: DebugRuntime> DebugSession<R> {
    /// Create a session; purges and recreates the staging directory.
    pub fn new(runtime: R, config: SessionConfig) -> Result<Self> {
        let files = FileReceiver::with_buffer(
            &config.staging_dir,
            FrameBuffer::with_max_frame_size(config.max_frame_size),
        )?;
        let processor = CommandProcessor::new(runtime, &config);
        Ok(Self {
            processor,
            files,
            mode: InboundMode::Commands,
            sweep_interval: config.sweep_interval,
        })
    }

    /// Access the command processor.
    pub fn processor(&self) -> &CommandProcessor<R> {
        &self.processor
    }

    /// Mutable access to the command processor.
    pub fn processor_mut(&mut self) -> &mut CommandProcessor<R> {
        &mut self.processor
    }

    /// Access the file receiver.
    pub fn files(&self) -> &FileReceiver {
        &self.files
    }

    /// The sub-protocol currently owning inbound bytes.
    pub fn mode(&self) -> InboundMode {
        self.mode
    }

    /// Hand inbound bytes to the file channel until it reports
    /// end-of-transfer.
    pub fn begin_file_transfer(&mut self) {
        self.mode = InboundMode::FileTransfer;
    }

    /// Send a command to the debuggee (see [`CommandProcessor::send`]).
    pub fn send(
        &mut self,
        cmd: &str,
        info: serde_json::Value,
        callback: Option<Callback>,
        timeout_secs: u64,
    ) -> Result<()> {
        self.processor.send(cmd, info, callback, timeout_secs)
    }

    /// The single per-physical-read callback.
    ///
    /// Routes the chunk to whichever sub-protocol currently owns the
    /// stream. File events are returned to the caller; command dispatch
    /// happens against the runtime as a side effect. After the file
    /// channel reports end-of-transfer, inbound bytes belong to the
    /// command channel again.
    pub fn on_read(&mut self, bytes: &[u8]) -> Result<Vec<FileEvent>> {
        match self.mode {
            InboundMode::Commands => {
                let text = String::from_utf8_lossy(bytes);
                self.processor.on_data(&text)?;
                Ok(Vec::new())
            }
            InboundMode::FileTransfer => {
                let events = self.files.feed(bytes)?;
                if events.contains(&FileEvent::TransferComplete) {
                    self.mode = InboundMode::Commands;
                }
                Ok(events)
            }
        }
    }
}

/// Drive a session over a live connection until EOF or a fatal error.
///
/// Splits the stream, spawns the writer task, and loops over socket reads
/// and periodic sweep ticks. Returns `Ok(())` on orderly EOF; protocol
/// violations and I/O errors propagate so the caller can decide whether to
/// drop the connection. The writer is detached before returning.
pub async fn run<R, S>(stream: S, session: &mut DebugSession<R>) -> Result<()>
where
    R: DebugRuntime,
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, write_half) = tokio::io::split(stream);
    let (writer, writer_task) = spawn_writer_task(write_half);
    session.processor_mut().attach_writer(writer);

    let mut sweep = tokio::time::interval(session.sweep_interval);
    let mut buf = vec![0u8; 64 * 1024];

    let result = loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => break Ok(()),
                Ok(n) => {
                    if let Err(e) = session.on_read(&buf[..n]) {
                        tracing::error!(error = %e, "inbound processing failed");
                        break Err(e);
                    }
                }
                Err(e) => break Err(BridgeError::Io(e)),
            },
            _ = sweep.tick() => {
                session.processor_mut().sweep_at(Instant::now());
            }
        }
    };

    // Dropping the last handle closes the channel; the writer task drains
    // what was queued and exits.
    session.processor_mut().detach_writer();
    let _ = writer_task.await;

    result
}
