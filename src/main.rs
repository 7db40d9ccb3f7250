use anyhow::Context;
use clap::Parser;
use mailjet_harness::config::{Config, DEFAULT_CONFIG_PATH};
use mailjet_harness::http_server::{self, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Local test server for Mailjet webhook and send API integrations
#[derive(Parser, Debug)]
#[command(name = "mailjet-harness")]
struct Args {
    /// Port to listen on
    #[arg(default_value_t = 3000)]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory holding the per-key event files
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Directory served for every path not handled by the API
    #[arg(long, default_value = "./public")]
    public_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mailjet_harness=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)?;
    info!(?config, "Read config");

    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory {}", args.data_dir.display())
    })?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;

    let state = AppState::new(config, args.data_dir)?;
    let app = http_server::router(state, &args.public_dir);
    http_server::serve(app, addr).await?;
    Ok(())
}
