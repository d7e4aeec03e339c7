use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use form_sentinel::config::{Config, SourceKind};
use form_sentinel::{server, StreamSession};

#[derive(Parser, Debug)]
#[command(name = "form-sentinel", about = "Exercise form feedback over a webcam stream")]
struct Args {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Address to bind, overrides the config file
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides the config file
    #[arg(long)]
    port: Option<u16>,

    /// Frame source, overrides the config file
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Write the effective configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(source) = self.source {
            config.camera.source = source;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    args.apply(&mut config);

    if let Some(path) = &args.write_default_config {
        config
            .save(path)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        info!(path = %path.display(), "configuration written");
        return Ok(());
    }

    let session = StreamSession::from_config(&config).context("failed to set up stream session")?;
    let app = server::router(session.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("form-sentinel listening on http://{addr}");

    // Video feed responses never finish on their own, so the server is
    // dropped on Ctrl-C instead of draining connections.
    tokio::select! {
        served = axum::serve(listener, app).into_future() => served.context("server error")?,
        _ = shutdown_signal() => info!("shutdown requested"),
    }

    tokio::task::spawn_blocking(move || session.stop()).await?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
    }
}
