//! Error taxonomy shared by the playback core.

use serde::Serialize;
use thiserror::Error;

use crate::mpv::{IpcError, ProcessError};

/// Coarse classification reported alongside every failed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
  /// No catalog entry matched the query.
  NotFound,
  /// No usable player, or its control socket is missing.
  PlayerUnavailable,
  /// The socket exists but the player is not accepting connections.
  IpcRefused,
  /// The player did not answer in time.
  Timeout,
  /// Spawning or terminating the player failed.
  ProcessError,
  /// The player sent something other than a success reply.
  ProtocolError,
  /// The caller supplied an unusable argument.
  InvalidArgument,
}

/// Errors produced by playback operations.
#[derive(Debug, Error)]
pub enum PlaybackError {
  #[error("No media file found matching '{query}'. Available files:\n{}", bullet_list(.available))]
  NotFound {
    query: String,
    available: Vec<String>,
  },

  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error(transparent)]
  Ipc(#[from] IpcError),

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error("Background task failed: {0}")]
  Worker(#[from] tokio::task::JoinError),
}

fn bullet_list(items: &[String]) -> String {
  if items.is_empty() {
    return "(none)".to_string();
  }
  items
    .iter()
    .map(|item| format!("- {item}"))
    .collect::<Vec<_>>()
    .join("\n")
}

impl IpcError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      IpcError::PlayerUnavailable => ErrorKind::PlayerUnavailable,
      IpcError::Refused(_) => ErrorKind::IpcRefused,
      IpcError::Timeout(_) => ErrorKind::Timeout,
      IpcError::Io(e)
        if matches!(
          e.kind(),
          std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
        ) =>
      {
        ErrorKind::IpcRefused
      }
      IpcError::Rejected(_)
      | IpcError::MalformedReply(_)
      | IpcError::Closed
      | IpcError::Encode(_)
      | IpcError::Io(_) => ErrorKind::ProtocolError,
    }
  }
}

impl ProcessError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ProcessError::NoLauncher(_) => ErrorKind::PlayerUnavailable,
      ProcessError::SpawnFailed { .. } | ProcessError::KillFailed(_) => ErrorKind::ProcessError,
    }
  }
}

impl PlaybackError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      PlaybackError::NotFound { .. } => ErrorKind::NotFound,
      PlaybackError::InvalidArgument(_) => ErrorKind::InvalidArgument,
      PlaybackError::Ipc(e) => e.kind(),
      PlaybackError::Process(e) => e.kind(),
      PlaybackError::Worker(_) => ErrorKind::ProcessError,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn not_found_lists_available_files() {
    let err = PlaybackError::NotFound {
      query: "zzqqxx".to_string(),
      available: vec!["Alien.mp4".to_string(), "Brazil.mkv".to_string()],
    };
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
      err.to_string(),
      "No media file found matching 'zzqqxx'. Available files:\n- Alien.mp4\n- Brazil.mkv"
    );
  }

  #[test]
  fn not_found_with_empty_catalog() {
    let err = PlaybackError::NotFound {
      query: "x".to_string(),
      available: Vec::new(),
    };
    assert!(err.to_string().ends_with("Available files:\n(none)"));
  }

  #[test]
  fn kinds_follow_the_source() {
    assert_eq!(
      PlaybackError::from(IpcError::PlayerUnavailable).kind(),
      ErrorKind::PlayerUnavailable
    );
    assert_eq!(
      PlaybackError::from(IpcError::Refused("refused".into())).kind(),
      ErrorKind::IpcRefused
    );
    assert_eq!(
      PlaybackError::from(IpcError::Timeout(Duration::from_secs(1))).kind(),
      ErrorKind::Timeout
    );
    assert_eq!(
      PlaybackError::from(IpcError::Rejected("nope".into())).kind(),
      ErrorKind::ProtocolError
    );
    assert_eq!(
      PlaybackError::from(IpcError::Io(std::io::ErrorKind::BrokenPipe.into())).kind(),
      ErrorKind::IpcRefused
    );
    assert_eq!(
      PlaybackError::from(ProcessError::NoLauncher("mpv".into())).kind(),
      ErrorKind::PlayerUnavailable
    );
  }
}
