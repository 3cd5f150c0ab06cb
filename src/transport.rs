//! Line-delimited JSON tool transport.
//!
//! Each input line is one request:
//! `{"id": 1, "tool": "play_movie", "arguments": {"filename": "superman"}}`.
//! Each output line is one response:
//! `{"id": 1, "success": true, "message": "..."}`.
//!
//! Requests run concurrently; a single writer task serializes the replies,
//! so callers should match them up by `id`.

use std::io;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;

use crate::command::{CommandOutcome, MediaController};
use crate::error::ErrorKind;

#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
  #[serde(default)]
  pub id: Value,
  pub tool: String,
  #[serde(default)]
  pub arguments: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
  pub id: Value,
  #[serde(flatten)]
  pub outcome: CommandOutcome,
}

#[derive(Debug, Deserialize)]
struct PlayArgs {
  filename: Option<String>,
  #[serde(default, rename = "loop")]
  looped: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SeekArgs {
  seconds: Option<f64>,
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, CommandOutcome> {
  let arguments = if arguments.is_null() {
    Value::Object(Default::default())
  } else {
    arguments
  };
  serde_json::from_value(arguments).map_err(|e| {
    CommandOutcome::failure(ErrorKind::InvalidArgument, format!("Invalid arguments: {e}"))
  })
}

/// Run one tool call against the controller.
pub async fn dispatch(controller: &MediaController, tool: &str, arguments: Value) -> CommandOutcome {
  log::debug!("Tool call: {} {}", tool, arguments);

  match tool {
    "list_movies" => controller.list(),
    "play_movie" => match parse_args::<PlayArgs>(arguments) {
      Ok(PlayArgs {
        filename: Some(filename),
        looped,
      }) => controller.play(&filename, looped).await,
      Ok(PlayArgs { filename: None, .. }) => {
        CommandOutcome::failure(ErrorKind::InvalidArgument, "Error: filename parameter is required")
      }
      Err(outcome) => outcome,
    },
    "pause_playback" => controller.pause().await,
    "stop_playback" => controller.stop().await,
    "seek_forward" => match parse_args::<SeekArgs>(arguments) {
      Ok(args) => controller.seek_forward(args.seconds).await,
      Err(outcome) => outcome,
    },
    "seek_backward" => match parse_args::<SeekArgs>(arguments) {
      Ok(args) => controller.seek_backward(args.seconds).await,
      Err(outcome) => outcome,
    },
    "next_chapter" => controller.next_chapter().await,
    "previous_chapter" => controller.previous_chapter().await,
    "toggle_loop" => controller.toggle_loop().await,
    "restart_playback" => controller.restart().await,
    "get_current_playing" => controller.currently_playing().await,
    other => CommandOutcome::failure(ErrorKind::InvalidArgument, format!("Unknown tool: {other}")),
  }
}

async fn writer_loop<W: AsyncWrite + Unpin>(mut writer: W, rx: Receiver<ToolResponse>) -> io::Result<()> {
  while let Ok(response) = rx.recv().await {
    let mut line = serde_json::to_vec(&response)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
  }
  Ok(())
}

/// Serve requests from `reader` until EOF, writing responses to `writer`.
pub async fn serve<R, W>(controller: Arc<MediaController>, reader: R, writer: W) -> io::Result<()>
where
  R: AsyncRead + Unpin,
  W: AsyncWrite + Unpin + Send + 'static,
{
  let (tx, rx): (Sender<ToolResponse>, Receiver<ToolResponse>) = async_channel::unbounded();
  let writer_handle = tokio::spawn(writer_loop(writer, rx));

  let mut in_flight = JoinSet::new();
  let mut reader = BufReader::new(reader);
  let mut buf = Vec::new();
  let read_result = loop {
    buf.clear();
    match reader.read_until(b'\n', &mut buf).await {
      Ok(0) => break Ok(()),
      Ok(_) => {}
      Err(e) => {
        log::error!("Failed to read request: {}", e);
        break Err(e);
      }
    }

    let line = buf.trim_ascii();
    if line.is_empty() {
      continue;
    }

    match serde_json::from_slice::<ToolRequest>(line) {
      Ok(request) => {
        let controller = controller.clone();
        let tx = tx.clone();
        in_flight.spawn(async move {
          let outcome = dispatch(&controller, &request.tool, request.arguments).await;
          let _ = tx
            .send(ToolResponse {
              id: request.id,
              outcome,
            })
            .await;
        });
      }
      Err(e) => {
        log::warn!("Malformed request: {}", e);
        let outcome =
          CommandOutcome::failure(ErrorKind::InvalidArgument, format!("Malformed request: {e}"));
        let _ = tx
          .send(ToolResponse {
            id: Value::Null,
            outcome,
          })
          .await;
      }
    }
  };

  // Requests already accepted still get their replies.
  while let Some(joined) = in_flight.join_next().await {
    if let Err(e) = joined {
      log::error!("Request task failed: {}", e);
    }
  }
  drop(tx);

  let write_result = writer_handle.await.map_err(io::Error::other)?;
  read_result.and(write_result)
}
