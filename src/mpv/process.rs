//! Player detection and process spawning.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};

#[derive(Error, Debug)]
pub enum ProcessError {
  #[error("No media player found (tried: {0})")]
  NoLauncher(String),
  #[error("Failed to spawn {program}: {source}")]
  SpawnFailed {
    program: String,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to terminate player process: {0}")]
  KillFailed(std::io::Error),
}

/// One entry of the ordered player table.
///
/// The IPC flag and the loop arguments are optional and composed
/// independently onto the launch command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
  /// Name shown in status messages.
  pub name: String,
  /// Executable name (looked up on PATH) or explicit path.
  pub program: PathBuf,
  /// Arguments placed before anything else.
  pub base_args: Vec<String>,
  /// Flag prefix that binds the control socket, e.g. `--input-ipc-server=`.
  pub ipc_flag: Option<String>,
  /// Arguments that make the player loop the file forever.
  pub loop_args: Vec<String>,
  /// Install locations checked when `program` is not on PATH.
  pub fallback_paths: Vec<PathBuf>,
}

impl Launcher {
  /// A player that can only be told to open a file.
  pub fn viewer(name: &str, program: impl Into<PathBuf>) -> Self {
    Self {
      name: name.to_string(),
      program: program.into(),
      base_args: Vec::new(),
      ipc_flag: None,
      loop_args: Vec::new(),
      fallback_paths: Vec::new(),
    }
  }

  /// mpv with JSON IPC.
  pub fn mpv() -> Self {
    Self::viewer("MPV", "mpv")
      .with_ipc_flag("--input-ipc-server=")
      .with_loop_args(["--loop=inf"])
      .with_fallback_paths(mpv_common_paths())
  }

  pub fn with_base_args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.base_args = args.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_ipc_flag(mut self, flag: &str) -> Self {
    self.ipc_flag = Some(flag.to_string());
    self
  }

  pub fn with_loop_args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.loop_args = args.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_fallback_paths(mut self, paths: Vec<PathBuf>) -> Self {
    self.fallback_paths = paths;
    self
  }

  pub fn is_ipc_capable(&self) -> bool {
    self.ipc_flag.is_some()
  }

  pub fn supports_loop(&self) -> bool {
    !self.loop_args.is_empty()
  }

  /// Locate the executable, if this launcher is installed.
  pub fn resolve(&self) -> Option<PathBuf> {
    let explicit = self.program.is_absolute() || self.program.components().count() > 1;
    let found = if explicit {
      self.program.is_file().then(|| self.program.clone())
    } else {
      which::which(&self.program).ok()
    };

    found.or_else(|| self.fallback_paths.iter().find(|p| p.is_file()).cloned())
  }

  /// Full argument list for playing `file`.
  ///
  /// `extra_args` are user-supplied player options and only reach
  /// IPC-capable players.
  pub fn command_args(
    &self,
    file: &Path,
    socket: &Path,
    looped: bool,
    extra_args: &[String],
  ) -> Vec<OsString> {
    let mut args: Vec<OsString> = self.base_args.iter().map(OsString::from).collect();

    if let Some(flag) = &self.ipc_flag {
      let mut arg = OsString::from(flag);
      arg.push(socket.as_os_str());
      args.push(arg);
    }
    if looped {
      args.extend(self.loop_args.iter().map(OsString::from));
    }
    if self.is_ipc_capable() {
      args.extend(extra_args.iter().map(OsString::from));
    }

    args.push(file.as_os_str().to_os_string());
    args
  }
}

fn mpv_common_paths() -> Vec<PathBuf> {
  #[cfg(windows)]
  let paths: &[&str] = &[
    r"C:\Program Files\mpv\mpv.exe",
    r"C:\Program Files (x86)\mpv\mpv.exe",
    r"C:\mpv\mpv.exe",
  ];
  #[cfg(target_os = "macos")]
  let paths: &[&str] = &[
    "/usr/local/bin/mpv",
    "/opt/homebrew/bin/mpv",
    "/Applications/mpv.app/Contents/MacOS/mpv",
  ];
  #[cfg(not(any(windows, target_os = "macos")))]
  let paths: &[&str] = &["/usr/bin/mpv", "/usr/local/bin/mpv"];

  paths.iter().map(PathBuf::from).collect()
}

/// Platform player table, most capable first.
pub fn default_launchers() -> Vec<Launcher> {
  #[cfg(windows)]
  {
    vec![
      Launcher::mpv(),
      Launcher::viewer("the default player", "cmd").with_base_args(["/C", "start", ""]),
    ]
  }
  #[cfg(target_os = "macos")]
  {
    vec![Launcher::mpv(), Launcher::viewer("the default player", "open")]
  }
  #[cfg(not(any(windows, target_os = "macos")))]
  {
    vec![
      Launcher::mpv(),
      Launcher::viewer("vlc", "vlc").with_loop_args(["--repeat"]),
      Launcher::viewer("mplayer", "mplayer").with_loop_args(["-loop", "0"]),
      Launcher::viewer("xdg-open", "xdg-open"),
    ]
  }
}

/// First installed launcher in table order.
pub fn probe(launchers: &[Launcher]) -> Result<(&Launcher, PathBuf), ProcessError> {
  for launcher in launchers {
    match launcher.resolve() {
      Some(path) => return Ok((launcher, path)),
      None => log::debug!("Launcher {} not available", launcher.name),
    }
  }

  let tried = launchers
    .iter()
    .map(|l| l.program.display().to_string())
    .collect::<Vec<_>>()
    .join(", ");
  Err(ProcessError::NoLauncher(tried))
}

/// Spawn the player detached from our stdio. Dropping the handle kills it.
pub fn spawn(launcher: &Launcher, executable: &Path, args: &[OsString]) -> Result<Child, ProcessError> {
  log::info!("Spawning {}: {:?} {:?}", launcher.name, executable, args);

  Command::new(executable)
    .args(args)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .kill_on_drop(true)
    .spawn()
    .map_err(|source| ProcessError::SpawnFailed {
      program: launcher.name.clone(),
      source,
    })
}

/// How [`force_kill`] found the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
  AlreadyExited(ExitStatus),
  Killed,
}

/// Kill and reap `child` unless it is already gone.
pub async fn force_kill(child: &mut Child) -> Result<Exit, ProcessError> {
  if let Ok(Some(status)) = child.try_wait() {
    return Ok(Exit::AlreadyExited(status));
  }

  log::info!("Killing player process (pid: {:?})", child.id());
  child.kill().await.map_err(ProcessError::KillFailed)?;
  Ok(Exit::Killed)
}

/// Remove a leftover control socket.
pub fn cleanup_ipc(socket: &Path) {
  #[cfg(not(windows))]
  {
    match std::fs::remove_file(socket) {
      Ok(()) => log::debug!("Removed stale IPC socket {:?}", socket),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => log::warn!("Could not remove IPC socket {:?}: {}", socket, e),
    }
  }
  // Windows named pipes are cleaned up automatically
  #[cfg(windows)]
  let _ = socket;
}

/// Wait until `socket` exists, up to `max_wait`.
pub async fn wait_for_socket(socket: &Path, max_wait: Duration) -> bool {
  let deadline = tokio::time::Instant::now() + max_wait;
  loop {
    if socket.exists() {
      return true;
    }
    if tokio::time::Instant::now() >= deadline {
      return false;
    }
    tokio::time::sleep(Duration::from_millis(25)).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(v: Vec<OsString>) -> Vec<String> {
    v.into_iter().map(|a| a.into_string().unwrap()).collect()
  }

  #[test]
  fn mpv_args_compose_ipc_and_loop() {
    let file = Path::new("/movies/Alien.mp4");
    let socket = Path::new("/tmp/mpv.sock");
    let mpv = Launcher::mpv();

    assert_eq!(
      args(mpv.command_args(file, socket, false, &[])),
      vec!["--input-ipc-server=/tmp/mpv.sock", "/movies/Alien.mp4"]
    );
    assert_eq!(
      args(mpv.command_args(file, socket, true, &["--fs".to_string()])),
      vec!["--input-ipc-server=/tmp/mpv.sock", "--loop=inf", "--fs", "/movies/Alien.mp4"]
    );
  }

  #[test]
  fn viewers_only_get_the_file() {
    let file = Path::new("/movies/Alien.mp4");
    let socket = Path::new("/tmp/mpv.sock");
    let viewer = Launcher::viewer("xdg-open", "xdg-open");

    assert!(!viewer.is_ipc_capable());
    assert!(!viewer.supports_loop());
    assert_eq!(
      args(viewer.command_args(file, socket, true, &["--fs".to_string()])),
      vec!["/movies/Alien.mp4"]
    );
  }

  #[test]
  fn loop_args_apply_to_viewers_that_have_them() {
    let vlc = Launcher::viewer("vlc", "vlc").with_loop_args(["--repeat"]);
    assert_eq!(
      args(vlc.command_args(Path::new("/m/a.mkv"), Path::new("/s"), true, &[])),
      vec!["--repeat", "/m/a.mkv"]
    );
  }

  #[test]
  fn probe_skips_missing_launchers() {
    let table = vec![
      Launcher::viewer("ghost", "definitely-not-installed-player-xyz"),
      Launcher::viewer("shell", "sh"),
    ];
    let (launcher, path) = probe(&table).unwrap();
    assert_eq!(launcher.name, "shell");
    assert!(path.is_file());
  }

  #[test]
  fn probe_reports_everything_tried() {
    let table = vec![
      Launcher::viewer("ghost", "definitely-not-installed-player-xyz"),
      Launcher::viewer("other", "/no/such/dir/player"),
    ];
    let err = probe(&table).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("definitely-not-installed-player-xyz"));
    assert!(message.contains("/no/such/dir/player"));
  }

  #[test]
  fn fallback_paths_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    let exe = dir.path().join("mpv-custom");
    std::fs::write(&exe, b"").unwrap();

    let launcher = Launcher::viewer("custom", "definitely-not-installed-player-xyz")
      .with_fallback_paths(vec![dir.path().join("missing"), exe.clone()]);
    assert_eq!(launcher.resolve(), Some(exe));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn force_kill_reaps_running_and_exited_children() {
    let sh = which::which("sh").unwrap();
    let launcher = Launcher::viewer("sh", "sh");

    let mut running = spawn(&launcher, &sh, &[OsString::from("-c"), OsString::from("exec sleep 30")]).unwrap();
    assert_eq!(force_kill(&mut running).await.unwrap(), Exit::Killed);

    let mut done = spawn(&launcher, &sh, &[OsString::from("-c"), OsString::from("exit 0")]).unwrap();
    done.wait().await.unwrap();
    assert!(matches!(force_kill(&mut done).await.unwrap(), Exit::AlreadyExited(_)));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn socket_wait_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("never.sock");
    assert!(!wait_for_socket(&socket, Duration::from_millis(60)).await);

    std::fs::write(&socket, b"").unwrap();
    assert!(wait_for_socket(&socket, Duration::from_millis(60)).await);
  }
}
