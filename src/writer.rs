//! Dedicated writer task for the outbound side of the connection.
//!
//! Command sends happen synchronously inside dispatch, so they cannot
//! block on socket writes. Instead, serialized messages go through an
//! mpsc channel to a dedicated writer task that batches ready messages
//! into a single `write_vectored` call where possible.
//!
//! ```text
//! CommandProcessor ──► mpsc::Sender<Bytes> ──► Writer Task ──► Socket
//! ```

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{BridgeError, Result};

/// Default channel capacity for queued outbound messages.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum messages to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// Handle for sending messages to the writer task.
///
/// Cheaply cloneable; the synchronous [`try_send`](Self::try_send) is what
/// the dispatch path uses, since dispatch never suspends mid-computation.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
    pending: Arc<AtomicUsize>,
}

impl WriterHandle {
    /// Queue a message without waiting.
    ///
    /// # Errors
    ///
    /// `WriteQueueFull` if the channel is at capacity (the connection is
    /// not draining), `ConnectionClosed` if the writer task is gone.
    pub fn try_send(&self, payload: Bytes) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.try_send(payload).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::Release);
            match e {
                mpsc::error::TrySendError::Full(_) => BridgeError::WriteQueueFull,
                mpsc::error::TrySendError::Closed(_) => BridgeError::ConnectionClosed,
            }
        })
    }

    /// Queue a message, waiting for channel space if necessary.
    pub async fn send(&self, payload: Bytes) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(payload).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            BridgeError::ConnectionClosed
        })
    }

    /// Number of messages queued but not yet written.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Spawn the writer task and return a handle for sending messages.
pub fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_writer_task_with_capacity(writer, DEFAULT_CHANNEL_CAPACITY)
}

/// Spawn the writer task with a custom channel capacity.
pub fn spawn_writer_task_with_capacity<W>(
    writer: W,
    capacity: usize,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle {
        tx,
        pending: pending.clone(),
    };
    let task = tokio::spawn(writer_loop(rx, writer, pending));

    (handle, task)
}

/// Main writer loop - receives messages and writes them to the socket.
async fn writer_loop<W>(
    mut rx: mpsc::Receiver<Bytes>,
    mut writer: W,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(payload) => payload,
            // Channel closed, clean shutdown.
            None => return Ok(()),
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(payload) => batch.push(payload),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        write_batch(&mut writer, &batch).await?;
        pending.fetch_sub(batch_size, Ordering::Release);
    }
}

/// Write a batch of messages with scatter/gather I/O.
async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(Bytes::len).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build the IoSlice array for data not yet written.
fn remaining_slices(batch: &[Bytes], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for payload in batch {
        let end = offset + payload.len();
        if skip_bytes < end && !payload.is_empty() {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&payload[start..]));
        }
        offset = end;
    }
    slices
}
