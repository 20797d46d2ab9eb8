//! Command-channel reassembly, dispatch, and outbound origination.
//!
//! Inbound text arrives once per read event, fragmented and coalesced
//! arbitrarily by TCP. [`CommandProcessor::on_data`] reassembles
//! delimiter-separated command strings, drains them in strict FIFO order
//! through parse + dispatch, then sweeps expired callbacks - all
//! synchronously, so command N's side effects are fully applied before
//! command N+1's parse begins.

use std::collections::VecDeque;
use std::mem;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::Rng;
use serde_json::Value;

use super::message::CommandMessage;
use super::pending::{
    unused_id, Callback, Completion, PendingCallback, PendingCallbackSet, CALLBACK_ID_MIN,
    CALLBACK_ID_MAX,
};
use crate::config::SessionConfig;
use crate::error::{BridgeError, Result};
use crate::runtime::DebugRuntime;
use crate::writer::WriterHandle;

/// Correlated command dispatcher for one connection.
pub struct CommandProcessor<R> {
    runtime: R,
    delimiter: String,
    base64_strings: bool,
    max_held_fragment: usize,
    /// Text after the last delimiter, awaiting the rest of its command.
    carry_text: String,
    /// Unparseable command held for JSON-continuation recovery.
    held_json: String,
    /// Complete command strings awaiting parse + dispatch.
    queue: VecDeque<String>,
    pending: PendingCallbackSet,
    writer: Option<WriterHandle>,
}

impl<R: DebugRuntime> CommandProcessor<R> {
    /// Create a processor for one connection.
    pub fn new(runtime: R, config: &SessionConfig) -> Self {
        Self {
            runtime,
            delimiter: config.delimiter.clone(),
            base64_strings: config.base64_strings,
            max_held_fragment: config.max_held_fragment,
            carry_text: String::new(),
            held_json: String::new(),
            queue: VecDeque::new(),
            pending: PendingCallbackSet::new(),
            writer: None,
        }
    }

    /// Attach the outbound writer once the connection is up.
    pub fn attach_writer(&mut self, writer: WriterHandle) {
        self.writer = Some(writer);
    }

    /// Detach the outbound writer (connection gone).
    pub fn detach_writer(&mut self) {
        self.writer = None;
    }

    /// Access the runtime collaborator.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Mutable access to the runtime collaborator.
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Number of callbacks currently awaiting a response.
    pub fn pending_callbacks(&self) -> usize {
        self.pending.len()
    }

    /// Correlation ids currently awaiting a response, in insertion order.
    pub fn outstanding_ids(&self) -> Vec<u32> {
        self.pending.ids()
    }

    /// Process one read event's worth of text.
    ///
    /// Splits on the configured delimiter (buffering a trailing fragment
    /// for the next call), dispatches every completed command in FIFO
    /// order, then sweeps expired callbacks.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Protocol` when the held JSON-continuation
    /// fragment outgrows its bound. Queued commands after the offending
    /// one still dispatch before the error is returned.
    pub fn on_data(&mut self, text: &str) -> Result<()> {
        let mut data = String::new();
        if !self.carry_text.is_empty() {
            data.push_str(&mem::take(&mut self.carry_text));
        }
        data.push_str(text.trim());

        // Delimiter split: every segment before an occurrence is a complete
        // command; a trailing remainder is carried to the next read. A
        // delimiter split across reads falls out naturally - its first
        // bytes sit in the carry until the rest arrives.
        let mut rest = data.as_str();
        while let Some(pos) = rest.find(&self.delimiter) {
            self.queue.push_back(rest[..pos].to_string());
            rest = &rest[pos + self.delimiter.len()..];
        }
        if !rest.trim().is_empty() {
            self.carry_text.push_str(rest);
        }

        let mut first_err = None;
        while let Some(command) = self.queue.pop_front() {
            if let Err(e) = self.parse_and_dispatch(command) {
                first_err.get_or_insert(e);
            }
        }

        self.sweep_at(Instant::now());

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Remove and fire every callback expired at `now`.
    ///
    /// Runs after every [`on_data`](Self::on_data); the session driver also
    /// calls it from a periodic timer so idle connections still time out.
    pub fn sweep_at(&mut self, now: Instant) {
        for entry in self.pending.take_expired(now) {
            tracing::warn!(id = entry.id, "request timed out before a response arrived");
            (entry.callback)(Completion::TimedOut);
        }
    }

    /// Parse one complete command string and dispatch it.
    fn parse_and_dispatch(&mut self, command: String) -> Result<()> {
        let data = if self.held_json.is_empty() {
            command
        } else {
            // The held fragment already ends with the delimiter that the
            // split consumed, so concatenation reconstructs the original
            // serialization.
            let mut data = mem::take(&mut self.held_json);
            data.push_str(&command);
            data
        };

        let mut msg: CommandMessage = match serde_json::from_str(&data) {
            Ok(msg) => msg,
            Err(e) => return self.handle_parse_failure(data, e),
        };

        if self.base64_strings {
            if let Err(e) = msg.decode_payload_strings() {
                tracing::error!(error = %e, raw = %data, "payload string decode failed");
                self.runtime
                    .show_error(&format!("payload decode failed: {}", data));
                return Ok(());
            }
        }

        self.dispatch(msg);
        Ok(())
    }

    /// A delimiter-complete string that is not valid JSON.
    fn handle_parse_failure(&mut self, data: String, error: serde_json::Error) -> Result<()> {
        if self.base64_strings {
            // Encoded payloads cannot contain the delimiter, so this is a
            // real protocol problem, not a split value.
            tracing::error!(error = %error, raw = %data, "JSON parse failed");
            self.runtime
                .show_error(&format!("JSON parse failed: {}", data));
            return Ok(());
        }

        // Permissive mode: assume a string value contained the delimiter
        // and the split fell inside it. Hold the whole input (delimiter
        // restored) and retry once the next queued string arrives.
        let mut held = data;
        held.push_str(&self.delimiter);
        if held.len() > self.max_held_fragment {
            self.held_json.clear();
            tracing::error!(
                bytes = held.len(),
                "held command fragment exceeds bound, discarding"
            );
            return Err(BridgeError::Protocol(format!(
                "held command fragment exceeds {} bytes",
                self.max_held_fragment
            )));
        }
        self.held_json = held;
        Ok(())
    }

    /// Route one parsed message to its pending callback or runtime method.
    fn dispatch(&mut self, msg: CommandMessage) {
        if let Some(id_str) = msg.response_id() {
            let id = match id_str.parse::<u32>() {
                Ok(id) => id,
                Err(_) => {
                    tracing::warn!(callback_id = %id_str, "malformed callback id");
                    return;
                }
            };
            match self.pending.take(id) {
                Some(entry) => {
                    let info = msg.info.filter(|v| !v.is_null());
                    (entry.callback)(Completion::Reply(info));
                }
                None => {
                    tracing::warn!(callback_id = id, "no pending callback for response");
                }
            }
            return;
        }

        let cmd = match msg.cmd.as_deref() {
            Some(cmd) => cmd,
            None => {
                tracing::warn!("command message without cmd tag");
                return;
            }
        };

        if CommandMessage::is_stop_command(cmd) {
            let stack = msg.stack.unwrap_or(Value::Null);
            self.runtime.stop(&stack, cmd);
            return;
        }

        match cmd {
            "refreshLuaMemory" => match msg.info.as_ref().and_then(|i| i.get("memInfo")) {
                Some(mem_info) => self.runtime.refresh_memory(mem_info),
                None => tracing::warn!("refreshLuaMemory without memInfo"),
            },
            "tip" => match log_info(&msg) {
                Some(text) => self.runtime.show_tip(text),
                None => tracing::warn!("tip without logInfo"),
            },
            "tipError" => match log_info(&msg) {
                Some(text) => self.runtime.show_error(text),
                None => tracing::warn!("tipError without logInfo"),
            },
            "log" => {
                if let Some(text) = log_info(&msg) {
                    self.runtime.print_log(text);
                }
            }
            other => {
                tracing::warn!(cmd = %other, "unknown command tag");
            }
        }
    }

    /// Send a command to the debuggee.
    ///
    /// With a callback, a fresh correlation id is drawn (retrying past
    /// collisions), the callback is registered - with an expiry when
    /// `timeout_secs > 0` - and `callbackId` rides along on the wire.
    /// Without an attached connection the message is dropped with a log
    /// line; the call never fails for that reason alone.
    pub fn send(
        &mut self,
        cmd: &str,
        info: Value,
        callback: Option<Callback>,
        timeout_secs: u64,
    ) -> Result<()> {
        let mut callback_id = None;
        if let Some(cb) = callback {
            let mut rng = rand::rng();
            let id = unused_id(&self.pending, || {
                rng.random_range(CALLBACK_ID_MIN..=CALLBACK_ID_MAX)
            });
            let expiry =
                (timeout_secs > 0).then(|| Instant::now() + Duration::from_secs(timeout_secs));
            self.pending.insert(PendingCallback {
                id,
                callback: cb,
                expiry,
            });
            callback_id = Some(id);
        }

        let msg = CommandMessage::outbound(cmd, info, callback_id);
        let line = format!("{} {}\n", serde_json::to_string(&msg)?, self.delimiter);

        match &self.writer {
            Some(writer) => {
                tracing::debug!(%cmd, ?callback_id, "send");
                writer.try_send(Bytes::from(line))
            }
            None => {
                tracing::info!(%cmd, "send while connection detached, dropping");
                Ok(())
            }
        }
    }
}

/// Extract `info.logInfo` as a string, if present.
fn log_info(msg: &CommandMessage) -> Option<&str> {
    msg.info
        .as_ref()
        .and_then(|i| i.get("logInfo"))
        .and_then(Value::as_str)
}
