//! Command-channel wire messages.
//!
//! Each command on the wire is one JSON object followed by the configured
//! delimiter. `callbackId` is a decimal string; `"0"` or absent means
//! fire-and-forget. `stack` is present only for stop-type commands.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Reserved callback id meaning "no callback expected".
pub const NO_CALLBACK: &str = "0";

/// One parsed command-channel message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Command tag; may be absent on malformed peer messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    /// Correlation id as a decimal string.
    #[serde(rename = "callbackId", skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,

    /// Command-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,

    /// Call stack, present for stop-type commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Value>,
}

impl CommandMessage {
    /// Build an outbound message.
    pub fn outbound(cmd: &str, info: Value, callback_id: Option<u32>) -> Self {
        Self {
            cmd: Some(cmd.to_string()),
            callback_id: callback_id.map(|id| id.to_string()),
            info: Some(info),
            stack: None,
        }
    }

    /// The correlation id, if this message is a response to one.
    ///
    /// Returns `None` for absent ids and for the reserved `"0"`.
    pub fn response_id(&self) -> Option<&str> {
        match self.callback_id.as_deref() {
            Some(id) if id != NO_CALLBACK => Some(id),
            _ => None,
        }
    }

    /// Check whether `cmd` is one of the stop-type tags.
    pub fn is_stop_command(cmd: &str) -> bool {
        matches!(
            cmd,
            "stopOnBreakpoint" | "stopOnEntry" | "stopOnStep" | "stopOnStepIn" | "stopOnStepOut"
        )
    }

    /// Decode base64-encoded string values inside `info`, in place.
    ///
    /// In encoded mode the debuggee base64-encodes every string value to
    /// keep delimiter-like bytes in user content off the wire. `info` is a
    /// list of variable entries; each entry with `type == "string"` has its
    /// `value` decoded. Anything else is left untouched.
    pub fn decode_payload_strings(&mut self) -> Result<()> {
        let entries = match self.info.as_mut().and_then(Value::as_array_mut) {
            Some(entries) => entries,
            None => return Ok(()),
        };

        for entry in entries {
            let is_string = entry.get("type").and_then(Value::as_str) == Some("string");
            if !is_string {
                continue;
            }
            if let Some(encoded) = entry.get("value").and_then(Value::as_str) {
                let decoded = BASE64.decode(encoded)?;
                let decoded = String::from_utf8_lossy(&decoded).into_owned();
                entry["value"] = Value::String(decoded);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_inbound_command() {
        let msg: CommandMessage =
            serde_json::from_str(r#"{"cmd":"tip","info":{"logInfo":"hi"}}"#).unwrap();

        assert_eq!(msg.cmd.as_deref(), Some("tip"));
        assert_eq!(msg.info.unwrap()["logInfo"], "hi");
        assert!(msg.callback_id.is_none());
    }

    #[test]
    fn test_response_id_reserved_zero() {
        let msg: CommandMessage =
            serde_json::from_str(r#"{"cmd":"continue","callbackId":"0"}"#).unwrap();
        assert!(msg.response_id().is_none());

        let msg: CommandMessage =
            serde_json::from_str(r#"{"cmd":"continue","callbackId":"4711"}"#).unwrap();
        assert_eq!(msg.response_id(), Some("4711"));
    }

    #[test]
    fn test_outbound_serialization_skips_absent_fields() {
        let msg = CommandMessage::outbound("continue", json!({}), None);
        let text = serde_json::to_string(&msg).unwrap();

        assert!(text.contains(r#""cmd":"continue""#));
        assert!(!text.contains("callbackId"));
        assert!(!text.contains("stack"));
    }

    #[test]
    fn test_outbound_callback_id_is_string() {
        let msg = CommandMessage::outbound("getWatchedVariable", json!({"varName":"x"}), Some(42));
        let text = serde_json::to_string(&msg).unwrap();

        assert!(text.contains(r#""callbackId":"42""#));
    }

    #[test]
    fn test_stop_command_tags() {
        for cmd in [
            "stopOnBreakpoint",
            "stopOnEntry",
            "stopOnStep",
            "stopOnStepIn",
            "stopOnStepOut",
        ] {
            assert!(CommandMessage::is_stop_command(cmd));
        }
        assert!(!CommandMessage::is_stop_command("tip"));
    }

    #[test]
    fn test_decode_payload_strings() {
        let mut msg: CommandMessage = serde_json::from_value(json!({
            "cmd": "getVariable",
            "info": [
                {"type": "string", "value": BASE64.encode("hello |*| world")},
                {"type": "number", "value": "42"},
            ]
        }))
        .unwrap();

        msg.decode_payload_strings().unwrap();

        let info = msg.info.unwrap();
        assert_eq!(info[0]["value"], "hello |*| world");
        assert_eq!(info[1]["value"], "42");
    }

    #[test]
    fn test_decode_payload_strings_non_array_info() {
        let mut msg: CommandMessage =
            serde_json::from_str(r#"{"cmd":"tip","info":{"logInfo":"plain"}}"#).unwrap();

        msg.decode_payload_strings().unwrap();
        assert_eq!(msg.info.unwrap()["logInfo"], "plain");
    }

    #[test]
    fn test_decode_payload_strings_invalid_base64() {
        let mut msg: CommandMessage = serde_json::from_value(json!({
            "info": [{"type": "string", "value": "not base64!!!"}]
        }))
        .unwrap();

        assert!(msg.decode_payload_strings().is_err());
    }
}
