use std::sync::Arc;

pub mod catalog;
mod command;
mod config;
mod error;
pub mod fuzzy;
pub mod mpv;
pub mod router;
pub mod transport;

pub use command::{CommandOutcome, MediaController};
pub use config::{AppConfig, ConfigError, CONFIG_ENV};
pub use error::{ErrorKind, PlaybackError};

/// Serve tool requests on stdin/stdout until stdin closes, then stop any
/// playback that is still running.
pub async fn run(config: AppConfig) -> std::io::Result<()> {
  log::info!(
    "Media control starting (media dir {:?}, socket {:?})",
    config.media_dir,
    config.socket_path
  );

  let controller = Arc::new(MediaController::new(&config));
  let served = transport::serve(controller.clone(), tokio::io::stdin(), tokio::io::stdout()).await;

  controller.shutdown().await;
  log::info!("Media control stopped");
  served
}
