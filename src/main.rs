use media_control::AppConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
  // stdout carries the protocol, so logs go to stderr
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = match AppConfig::load_or_default() {
    Ok(config) => config,
    Err(e) => {
      log::error!("{}", e);
      std::process::exit(1);
    }
  };

  if let Err(e) = media_control::run(config).await {
    log::error!("Transport failed: {}", e);
    std::process::exit(1);
  }
}
