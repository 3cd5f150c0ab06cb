use serde::Serialize;
use std::sync::Arc;

use crate::catalog;
use crate::config::AppConfig;
use crate::error::{ErrorKind, PlaybackError};
use crate::mpv::PlaybackSupervisor;
use crate::router::{CommandRouter, Control};

/// Result of a public command: always a message, never an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
  pub success: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kind: Option<ErrorKind>,
}

impl CommandOutcome {
  pub fn ok(message: impl Into<String>) -> Self {
    Self {
      success: true,
      message: message.into(),
      kind: None,
    }
  }

  pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      success: false,
      message: message.into(),
      kind: Some(kind),
    }
  }
}

impl From<Result<String, PlaybackError>> for CommandOutcome {
  fn from(result: Result<String, PlaybackError>) -> Self {
    match result {
      Ok(message) => CommandOutcome::ok(message),
      Err(e) => {
        log::warn!("Command failed ({:?}): {}", e.kind(), e);
        CommandOutcome::failure(e.kind(), e.to_string())
      }
    }
  }
}

/// The control surface offered to callers.
pub struct MediaController {
  supervisor: Arc<PlaybackSupervisor>,
  router: CommandRouter,
  default_seek: f64,
}

impl MediaController {
  pub fn new(config: &AppConfig) -> Self {
    Self::with_supervisor(Arc::new(PlaybackSupervisor::new(config)), config.seek_seconds)
  }

  pub fn with_supervisor(supervisor: Arc<PlaybackSupervisor>, default_seek: f64) -> Self {
    Self {
      router: CommandRouter::new(supervisor.clone()),
      supervisor,
      default_seek,
    }
  }

  pub fn supervisor(&self) -> &Arc<PlaybackSupervisor> {
    &self.supervisor
  }

  pub fn list(&self) -> CommandOutcome {
    let records = self.supervisor.catalog();
    CommandOutcome::ok(catalog::format_listing(self.supervisor.media_dir(), &records))
  }

  pub async fn play(&self, query: &str, looped: bool) -> CommandOutcome {
    self
      .supervisor
      .play(query, looped)
      .await
      .map(|report| report.to_string())
      .into()
  }

  pub async fn pause(&self) -> CommandOutcome {
    self.control(Control::Pause).await
  }

  pub async fn stop(&self) -> CommandOutcome {
    self.control(Control::Stop).await
  }

  pub async fn seek_forward(&self, seconds: Option<f64>) -> CommandOutcome {
    let seconds = seconds.unwrap_or(self.default_seek);
    self.control(Control::SeekForward(seconds)).await
  }

  pub async fn seek_backward(&self, seconds: Option<f64>) -> CommandOutcome {
    let seconds = seconds.unwrap_or(self.default_seek);
    self.control(Control::SeekBackward(seconds)).await
  }

  pub async fn next_chapter(&self) -> CommandOutcome {
    self.control(Control::NextChapter).await
  }

  pub async fn previous_chapter(&self) -> CommandOutcome {
    self.control(Control::PreviousChapter).await
  }

  pub async fn toggle_loop(&self) -> CommandOutcome {
    self.control(Control::ToggleLoop).await
  }

  pub async fn restart(&self) -> CommandOutcome {
    self.control(Control::Restart).await
  }

  pub async fn currently_playing(&self) -> CommandOutcome {
    match self.supervisor.currently_playing().await {
      Some(now) => CommandOutcome::ok(format!("Currently playing: {}", now.file)),
      None => CommandOutcome::ok("No media is currently playing"),
    }
  }

  /// Stop any playback before the process exits.
  pub async fn shutdown(&self) {
    self.supervisor.shutdown().await;
  }

  async fn control(&self, control: Control) -> CommandOutcome {
    self.router.dispatch(control).await.into()
  }
}
