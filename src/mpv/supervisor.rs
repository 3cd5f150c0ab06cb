//! The one supervised player process.
//!
//! `PlaybackSupervisor` owns the playback state machine
//! (`Idle -> Starting -> Running -> Stopping -> Idle`). Every transition
//! runs with the state lock held, so `play`, `stop` and `currently_playing`
//! never observe a half-finished transition. A player that exits on its
//! own is noticed lazily, the next time the state is looked at.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::process::Child;

use super::ipc::IpcChannel;
use super::process::{self, Exit, Launcher};
use super::protocol::MpvCommand;
use crate::catalog::{self, MediaRecord};
use crate::config::AppConfig;
use crate::error::PlaybackError;
use crate::fuzzy;

/// How `play` picked its file.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
  /// The query equals a file name, ignoring case.
  Exact,
  /// The query was resolved by similarity.
  Fuzzy { query: String, score: f64 },
}

/// What `play` started.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayReport {
  pub file: String,
  pub launcher: String,
  pub ipc_control: bool,
  pub looped: bool,
  pub loop_supported: bool,
  pub resolution: Resolution,
}

impl fmt::Display for PlayReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let control = if self.ipc_control {
      "IPC enabled"
    } else {
      "no IPC control"
    };
    write!(f, "Playing {} with {} ({})", self.file, self.launcher, control)?;

    if self.looped {
      if self.loop_supported {
        write!(f, "\nLooping enabled")?;
      } else {
        write!(f, "\nLooping was requested but {} does not support looping", self.launcher)?;
      }
    }

    if let Resolution::Fuzzy { query, score } = &self.resolution {
      write!(
        f,
        "\n\nNote: Matched '{}' from query '{}' (confidence: {:.2})",
        self.file, query, score
      )?;
    }
    Ok(())
  }
}

/// Snapshot of the running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
  pub file: String,
  pub launcher: String,
  pub ipc_control: bool,
}

struct Session {
  file: String,
  launcher: String,
  ipc_control: bool,
  child: Child,
}

/// The current file and its process live and die together.
#[derive(Default)]
struct PlaybackState {
  session: Option<Session>,
}

/// Supervises at most one player process.
pub struct PlaybackSupervisor {
  media_dir: PathBuf,
  ipc: IpcChannel,
  launchers: Vec<Launcher>,
  mpv_path: Option<PathBuf>,
  extra_args: Vec<String>,
  grace_period: Duration,
  socket_wait: Duration,
  state: tokio::sync::Mutex<PlaybackState>,
}

impl PlaybackSupervisor {
  pub fn new(config: &AppConfig) -> Self {
    Self::with_launchers(config, process::default_launchers())
  }

  /// Supervisor that probes `launchers` in order instead of the platform
  /// defaults.
  pub fn with_launchers(config: &AppConfig, launchers: Vec<Launcher>) -> Self {
    Self {
      media_dir: config.media_dir.clone(),
      ipc: IpcChannel::new(config.socket_path.clone(), config.ipc_timeout()),
      launchers,
      mpv_path: config.mpv_path(),
      extra_args: config.mpv_args.clone(),
      grace_period: config.grace_period(),
      socket_wait: config.socket_wait(),
      state: tokio::sync::Mutex::new(PlaybackState::default()),
    }
  }

  pub fn media_dir(&self) -> &Path {
    &self.media_dir
  }

  /// Control channel of the supervised player.
  pub fn ipc(&self) -> &IpcChannel {
    &self.ipc
  }

  /// Fresh scan of the media directory.
  pub fn catalog(&self) -> Vec<MediaRecord> {
    catalog::scan(&self.media_dir)
  }

  /// Directory walk off the async workers.
  async fn scan_catalog(&self) -> Result<Vec<MediaRecord>, PlaybackError> {
    let dir = self.media_dir.clone();
    Ok(tokio::task::spawn_blocking(move || catalog::scan(&dir)).await?)
  }

  /// PATH and install-location lookups off the async workers.
  async fn probe_launcher(&self) -> Result<(Launcher, PathBuf), PlaybackError> {
    let launchers = self.launcher_table();
    let found = tokio::task::spawn_blocking(move || {
      process::probe(&launchers).map(|(launcher, path)| (launcher.clone(), path))
    })
    .await??;
    Ok(found)
  }

  /// The player table with the configured mpv path applied.
  fn launcher_table(&self) -> Vec<Launcher> {
    let mut launchers = self.launchers.clone();
    if let Some(path) = self.mpv_path.clone() {
      if let Some(mpv) = launchers.iter_mut().find(|l| l.is_ipc_capable()) {
        mpv.program = path;
      }
    }
    launchers
  }

  /// Resolve `query` against the catalog and start playing it, stopping
  /// whatever was playing before.
  pub async fn play(&self, query: &str, looped: bool) -> Result<PlayReport, PlaybackError> {
    let query = query.trim();
    if query.is_empty() {
      return Err(PlaybackError::InvalidArgument(
        "a filename or search query is required".to_string(),
      ));
    }

    let mut state = self.state.lock().await;
    self.reconcile(&mut state);

    let records = self.scan_catalog().await?;
    let (record, resolution) = if let Some(record) = catalog::find_exact(&records, query) {
      (record, Resolution::Exact)
    } else if let Some(found) = fuzzy::resolve(query, &records) {
      let resolution = Resolution::Fuzzy {
        query: query.to_string(),
        score: found.score,
      };
      (found.record, resolution)
    } else {
      return Err(PlaybackError::NotFound {
        query: query.to_string(),
        available: records.iter().map(|r| r.name.clone()).collect(),
      });
    };

    if state.session.is_some() {
      if let Err(e) = self.stop_locked(&mut state).await {
        log::warn!("Could not stop previous playback: {}", e);
      }
    }

    process::cleanup_ipc(self.ipc.socket_path());

    let (launcher, executable) = self.probe_launcher().await?;
    let args = launcher.command_args(&record.path, self.ipc.socket_path(), looped, &self.extra_args);
    let child = process::spawn(&launcher, &executable, &args)?;

    let ipc_control = launcher.is_ipc_capable();
    log::info!(
      "Playing {} with {} (pid: {:?}, ipc: {})",
      record.name,
      launcher.name,
      child.id(),
      ipc_control
    );
    state.session = Some(Session {
      file: record.name.clone(),
      launcher: launcher.name.clone(),
      ipc_control,
      child,
    });

    if ipc_control
      && !self.socket_wait.is_zero()
      && !process::wait_for_socket(self.ipc.socket_path(), self.socket_wait).await
    {
      log::warn!(
        "{} did not create its IPC socket within {:?}",
        launcher.name,
        self.socket_wait
      );
    }

    Ok(PlayReport {
      file: record.name.clone(),
      launcher: launcher.name.clone(),
      ipc_control,
      looped,
      loop_supported: launcher.supports_loop(),
      resolution,
    })
  }

  /// Stop playback. Safe to call in any state; the session is always
  /// cleared, even when killing the process fails.
  pub async fn stop(&self) -> Result<String, PlaybackError> {
    let mut state = self.state.lock().await;
    self.stop_locked(&mut state).await
  }

  async fn stop_locked(&self, state: &mut PlaybackState) -> Result<String, PlaybackError> {
    let Some(mut session) = state.session.take() else {
      return Ok("No media currently playing".to_string());
    };
    log::info!("Stopping {} ({})", session.file, session.launcher);

    let graceful = session.ipc_control && self.quit_gracefully(&mut session.child).await;
    let result = if graceful {
      Ok("Playback stopped".to_string())
    } else {
      match process::force_kill(&mut session.child).await {
        Ok(Exit::Killed) => Ok("Playback stopped".to_string()),
        Ok(Exit::AlreadyExited(status)) => {
          log::info!("{} had already exited with: {}", session.launcher, status);
          Ok(format!("Playback stopped ({} had already exited)", session.launcher))
        }
        Err(e) => {
          log::error!("Could not terminate {}, leaving it orphaned: {}", session.launcher, e);
          Err(e.into())
        }
      }
    };

    if session.ipc_control {
      process::cleanup_ipc(self.ipc.socket_path());
    }
    result
  }

  /// Ask the player to quit and wait out the grace period.
  async fn quit_gracefully(&self, child: &mut Child) -> bool {
    if let Err(e) = self.ipc.send(&MpvCommand::quit(), false).await {
      log::info!("Graceful quit not possible: {}", e);
      return false;
    }

    match tokio::time::timeout(self.grace_period, child.wait()).await {
      Ok(Ok(status)) => {
        log::info!("Player exited with: {}", status);
        true
      }
      Ok(Err(e)) => {
        log::warn!("wait() failed: {}", e);
        false
      }
      Err(_) => {
        log::warn!(
          "Player still running {:?} after quit, killing it",
          self.grace_period
        );
        false
      }
    }
  }

  /// Drop the session if its process has exited on its own.
  fn reconcile(&self, state: &mut PlaybackState) {
    let Some(session) = state.session.as_mut() else {
      return;
    };

    match session.child.try_wait() {
      Ok(Some(status)) => {
        log::info!("{} exited on its own ({})", session.launcher, status);
        let ipc_control = session.ipc_control;
        state.session = None;
        if ipc_control {
          process::cleanup_ipc(self.ipc.socket_path());
        }
      }
      Ok(None) => {}
      Err(e) => log::warn!("Could not poll player process: {}", e),
    }
  }

  /// What is playing right now, if anything.
  pub async fn currently_playing(&self) -> Option<NowPlaying> {
    let mut state = self.state.lock().await;
    self.reconcile(&mut state);
    state.session.as_ref().map(|s| NowPlaying {
      file: s.file.clone(),
      launcher: s.launcher.clone(),
      ipc_control: s.ipc_control,
    })
  }

  /// Stop playback on the way out.
  pub async fn shutdown(&self) {
    match self.stop().await {
      Ok(message) => log::info!("Shutdown: {}", message),
      Err(e) => log::error!("Shutdown: {}", e),
    }
  }
}
