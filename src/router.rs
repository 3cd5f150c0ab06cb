//! Maps playback controls onto mpv IPC primitives.

use std::sync::Arc;

use crate::error::PlaybackError;
use crate::mpv::{Delivery, MpvCommand, PlaybackSupervisor, SeekMode};

/// A control verb aimed at the running player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
  Pause,
  Stop,
  SeekForward(f64),
  SeekBackward(f64),
  NextChapter,
  PreviousChapter,
  ToggleLoop,
  Restart,
}

impl Control {
  /// The IPC command for this control. `Stop` has none: it is handled by
  /// the supervisor.
  pub fn to_command(self) -> Result<Option<MpvCommand>, PlaybackError> {
    let cmd = match self {
      Control::Pause => MpvCommand::cycle("pause"),
      Control::Stop => return Ok(None),
      Control::SeekForward(seconds) => MpvCommand::seek(check_seconds(seconds)?, SeekMode::Relative),
      Control::SeekBackward(seconds) => MpvCommand::seek(-check_seconds(seconds)?, SeekMode::Relative),
      Control::NextChapter => MpvCommand::add("chapter", 1),
      Control::PreviousChapter => MpvCommand::add("chapter", -1),
      Control::ToggleLoop => MpvCommand::cycle("loop-file"),
      Control::Restart => MpvCommand::seek(0.0, SeekMode::Absolute),
    };
    Ok(Some(cmd))
  }
}

fn check_seconds(seconds: f64) -> Result<f64, PlaybackError> {
  if seconds.is_finite() && seconds >= 0.0 {
    Ok(seconds)
  } else {
    Err(PlaybackError::InvalidArgument(format!(
      "seek seconds must be a non-negative number, got {seconds}"
    )))
  }
}

/// Stateless dispatcher from [`Control`] to the player.
#[derive(Clone)]
pub struct CommandRouter {
  supervisor: Arc<PlaybackSupervisor>,
}

impl CommandRouter {
  pub fn new(supervisor: Arc<PlaybackSupervisor>) -> Self {
    Self { supervisor }
  }

  pub async fn dispatch(&self, control: Control) -> Result<String, PlaybackError> {
    let Some(cmd) = control.to_command()? else {
      return self.supervisor.stop().await;
    };

    match self.supervisor.ipc().send(&cmd, true).await? {
      Delivery::Acknowledged(_) => Ok(format!("Command executed: {}", cmd.describe())),
      Delivery::Sent => Ok(format!("Command sent: {}", cmd.describe())),
    }
  }
}
