//! One-shot IPC exchanges with MPV.
//!
//! Each call opens a fresh connection, writes one command line and, when
//! asked to, reads until the matching reply. The socket only exists while a
//! player is alive, so every call re-checks availability.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::protocol::{MpvCommand, MpvMessage, MpvResponse};

#[derive(Error, Debug)]
pub enum IpcError {
  #[error("MPV is not running or IPC socket not found")]
  PlayerUnavailable,
  #[error("Could not connect to MPV: {0}")]
  Refused(String),
  #[error("MPV did not respond within {0:?}")]
  Timeout(Duration),
  #[error("MPV error: {0}")]
  Rejected(String),
  #[error("Malformed reply from MPV: {0}")]
  MalformedReply(String),
  #[error("MPV closed the connection without replying")]
  Closed,
  #[error("Failed to encode command: {0}")]
  Encode(#[from] serde_json::Error),
  #[error("Error communicating with MPV: {0}")]
  Io(#[from] io::Error),
}

/// Outcome of a successful [`IpcChannel::send`].
#[derive(Debug, Clone)]
pub enum Delivery {
  /// Written without waiting for a reply.
  Sent,
  /// MPV replied with `"error": "success"`.
  Acknowledged(MpvResponse),
}

/// Client side of the MPV control socket.
#[derive(Debug, Clone)]
pub struct IpcChannel {
  socket_path: PathBuf,
  timeout: Duration,
}

impl IpcChannel {
  pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
    Self {
      socket_path: socket_path.into(),
      timeout,
    }
  }

  pub fn socket_path(&self) -> &Path {
    &self.socket_path
  }

  /// Whether the control endpoint currently exists.
  pub fn is_available(&self) -> bool {
    #[cfg(windows)]
    {
      true
    }
    #[cfg(not(windows))]
    {
      self.socket_path.exists()
    }
  }

  /// Send `cmd` to MPV, optionally waiting for its reply.
  ///
  /// Never blocks when the socket is missing, and never waits longer than
  /// the channel timeout.
  pub async fn send(&self, cmd: &MpvCommand, expect_response: bool) -> Result<Delivery, IpcError> {
    if !self.is_available() {
      return Err(IpcError::PlayerUnavailable);
    }

    log::debug!("Sending MPV command: {}", cmd.describe());
    match tokio::time::timeout(self.timeout, self.exchange(cmd, expect_response)).await {
      Ok(result) => result,
      Err(_) => {
        log::warn!(
          "MPV command timeout after {:?}, request_id={}",
          self.timeout,
          cmd.request_id
        );
        Err(IpcError::Timeout(self.timeout))
      }
    }
  }

  #[cfg(not(windows))]
  async fn exchange(&self, cmd: &MpvCommand, expect_response: bool) -> Result<Delivery, IpcError> {
    let stream = tokio::net::UnixStream::connect(&self.socket_path)
      .await
      .map_err(connect_error)?;
    converse(stream, cmd, expect_response).await
  }

  #[cfg(windows)]
  async fn exchange(&self, cmd: &MpvCommand, expect_response: bool) -> Result<Delivery, IpcError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let pipe = ClientOptions::new()
      .open(&self.socket_path)
      .map_err(connect_error)?;
    converse(pipe, cmd, expect_response).await
  }
}

fn connect_error(e: io::Error) -> IpcError {
  match e.kind() {
    io::ErrorKind::NotFound => IpcError::PlayerUnavailable,
    io::ErrorKind::ConnectionRefused => IpcError::Refused(e.to_string()),
    _ => IpcError::Io(e),
  }
}

async fn converse<S>(stream: S, cmd: &MpvCommand, expect_response: bool) -> Result<Delivery, IpcError>
where
  S: AsyncRead + AsyncWrite + Unpin,
{
  let (reader, mut writer) = tokio::io::split(stream);

  let mut line = serde_json::to_vec(cmd)?;
  line.push(b'\n');
  writer.write_all(&line).await?;
  writer.flush().await?;

  if !expect_response {
    return Ok(Delivery::Sent);
  }

  let mut reader = BufReader::new(reader);
  let mut buf = String::new();
  loop {
    buf.clear();
    if reader.read_line(&mut buf).await? == 0 {
      return Err(IpcError::Closed);
    }

    let trimmed = buf.trim();
    if trimmed.is_empty() {
      continue;
    }

    match MpvMessage::parse(trimmed) {
      Ok(MpvMessage::Response(response)) => {
        if response.request_id.is_some_and(|id| id != cmd.request_id) {
          log::debug!("Ignoring reply for request_id={:?}", response.request_id);
          continue;
        }
        return if response.is_success() {
          Ok(Delivery::Acknowledged(response))
        } else {
          Err(IpcError::Rejected(response.error))
        };
      }
      Ok(MpvMessage::Event(event)) => {
        log::debug!("Skipping MPV event while waiting for reply: {}", event.event);
      }
      Err(e) => {
        return Err(IpcError::MalformedReply(format!("{e}: {trimmed}")));
      }
    }
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::mpv::test_support::{FakeMpv, Reply};
  use serde_json::json;

  fn channel(path: &Path) -> IpcChannel {
    IpcChannel::new(path, Duration::from_millis(500))
  }

  #[tokio::test]
  async fn missing_socket_is_player_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let ipc = channel(&dir.path().join("mpv.sock"));

    let started = std::time::Instant::now();
    let err = ipc.send(&MpvCommand::cycle("pause"), true).await.unwrap_err();
    assert!(matches!(err, IpcError::PlayerUnavailable));
    assert!(started.elapsed() < Duration::from_millis(100));
  }

  #[tokio::test]
  async fn stale_socket_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mpv.sock");
    // Bound then dropped: the file stays, nobody listens.
    drop(std::os::unix::net::UnixListener::bind(&path).unwrap());

    let err = channel(&path)
      .send(&MpvCommand::cycle("pause"), true)
      .await
      .unwrap_err();
    assert!(matches!(err, IpcError::Refused(_)), "{err:?}");
  }

  #[tokio::test]
  async fn success_reply_is_acknowledged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mpv.sock");
    let mpv = FakeMpv::start(&path, Reply::Success);

    let cmd = MpvCommand::cycle("pause");
    let delivery = channel(&path).send(&cmd, true).await.unwrap();
    assert!(matches!(delivery, Delivery::Acknowledged(r) if r.request_id == Some(cmd.request_id)));

    let received = mpv.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["command"], json!(["cycle", "pause"]));
  }

  #[tokio::test]
  async fn events_before_the_reply_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mpv.sock");
    let _mpv = FakeMpv::start(&path, Reply::EventThenSuccess);

    let delivery = channel(&path)
      .send(&MpvCommand::seek(5.0, crate::mpv::SeekMode::Relative), true)
      .await
      .unwrap();
    assert!(matches!(delivery, Delivery::Acknowledged(_)));
  }

  #[tokio::test]
  async fn error_reply_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mpv.sock");
    let _mpv = FakeMpv::start(&path, Reply::Error("property unavailable"));

    let err = channel(&path)
      .send(&MpvCommand::add("chapter", 1), true)
      .await
      .unwrap_err();
    assert!(matches!(err, IpcError::Rejected(ref e) if e == "property unavailable"));
  }

  #[tokio::test]
  async fn garbage_reply_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mpv.sock");
    let _mpv = FakeMpv::start(&path, Reply::Raw("this is not json"));

    let err = channel(&path)
      .send(&MpvCommand::cycle("pause"), true)
      .await
      .unwrap_err();
    match err {
      IpcError::MalformedReply(raw) => assert!(raw.contains("this is not json")),
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn silent_player_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mpv.sock");
    let _mpv = FakeMpv::start(&path, Reply::Silent);

    let ipc = IpcChannel::new(&path, Duration::from_millis(100));
    let err = ipc.send(&MpvCommand::cycle("pause"), true).await.unwrap_err();
    assert!(matches!(err, IpcError::Timeout(_)));
  }

  #[tokio::test]
  async fn fire_and_forget_only_needs_the_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mpv.sock");
    let mpv = FakeMpv::start(&path, Reply::Silent);

    let delivery = channel(&path).send(&MpvCommand::quit(), false).await.unwrap();
    assert!(matches!(delivery, Delivery::Sent));

    let received = mpv.wait_for(1).await;
    assert_eq!(received[0]["command"], json!(["quit"]));
  }
}
