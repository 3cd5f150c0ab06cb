//! MPV JSON IPC protocol types.
//!
//! Reference: https://mpv.io/manual/master/#json-ipc

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};

/// Global request ID counter for unique command identification.
static REQUEST_ID: AtomicI64 = AtomicI64::new(1);

/// Generate a unique request ID for MPV commands.
pub fn next_request_id() -> i64 {
  REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// How `seek` interprets its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
  Relative,
  Absolute,
}

impl SeekMode {
  fn as_str(self) -> &'static str {
    match self {
      SeekMode::Relative => "relative",
      SeekMode::Absolute => "absolute",
    }
  }
}

/// Command sent to MPV via IPC.
#[derive(Debug, Clone, Serialize)]
pub struct MpvCommand {
  pub command: Vec<Value>,
  pub request_id: i64,
}

impl MpvCommand {
  /// Create a new command with auto-generated request ID.
  pub fn new(args: Vec<Value>) -> Self {
    Self {
      command: args,
      request_id: next_request_id(),
    }
  }

  /// Seek by or to `seconds`.
  pub fn seek(seconds: f64, mode: SeekMode) -> Self {
    Self::new(vec!["seek".into(), seconds.into(), mode.as_str().into()])
  }

  /// Add `delta` to an integer property (e.g. `chapter`).
  pub fn add(property: &str, delta: i64) -> Self {
    Self::new(vec!["add".into(), property.into(), delta.into()])
  }

  /// Cycle (toggle) a property.
  pub fn cycle(property: &str) -> Self {
    Self::new(vec!["cycle".into(), property.into()])
  }

  /// Quit MPV.
  pub fn quit() -> Self {
    Self::new(vec!["quit".into()])
  }

  /// Arguments joined by spaces, for status messages: `seek 10 relative`.
  pub fn describe(&self) -> String {
    self
      .command
      .iter()
      .map(describe_arg)
      .collect::<Vec<_>>()
      .join(" ")
  }
}

fn describe_arg(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Number(n) => match n.as_f64() {
      Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
      _ => n.to_string(),
    },
    other => other.to_string(),
  }
}

/// Response from MPV for a command.
#[derive(Debug, Clone, Deserialize)]
pub struct MpvResponse {
  /// "success" or error message.
  pub error: String,
  /// Response data (command-specific).
  #[serde(default)]
  pub data: Option<Value>,
  /// Matching request ID, absent if the request carried none.
  #[serde(default)]
  pub request_id: Option<i64>,
}

impl MpvResponse {
  /// Check if the command succeeded.
  pub fn is_success(&self) -> bool {
    self.error == "success"
  }
}

/// Event broadcast by MPV to every connected client.
#[derive(Debug, Clone, Deserialize)]
pub struct MpvEvent {
  /// Event type (e.g., "seek", "end-file", "playback-restart").
  pub event: String,
}

/// Message received from MPV IPC (either response or event).
#[derive(Debug, Clone)]
pub enum MpvMessage {
  Response(MpvResponse),
  Event(MpvEvent),
}

impl MpvMessage {
  /// Parse a JSON line from MPV.
  pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
    let value: Value = serde_json::from_str(line)?;
    if value.get("event").is_some() {
      Ok(MpvMessage::Event(serde_json::from_value(value)?))
    } else {
      Ok(MpvMessage::Response(serde_json::from_value(value)?))
    }
  }
}
