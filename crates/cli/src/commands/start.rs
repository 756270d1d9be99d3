// Host a new session from a cue file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::sync::mpsc;
use tracing::info;

use cuesync_client::config::GlobalConfig;
use cuesync_client::session::SessionClient;
use cuesync_client::transport::HttpTransport;
use cuesync_common::protocol::MSG_OK;

use super::TickForwarder;

#[derive(Args)]
pub struct StartArgs {
    /// Cue file to share
    pub file: PathBuf,
    /// Session key to create
    #[arg(long)]
    pub session: String,
    /// Display name (defaults to the configured one)
    #[arg(long)]
    pub user: Option<String>,
    /// Service base URL (defaults to the configured one)
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn run(args: StartArgs) -> Result<()> {
    let config = GlobalConfig::load();
    let url = args
        .url
        .or(config.service_url)
        .context("no service url: pass --url or set service_url in ~/.cuesync/config.toml")?;
    let user = args
        .user
        .or(config.display_name)
        .context("no display name: pass --user or set display_name in the config")?;

    let lines = crate::cue_file::read(&args.file)?;
    let file_name =
        args.file.file_name().and_then(|n| n.to_str()).unwrap_or("untitled").to_string();

    let transport = Arc::new(HttpTransport::with_timeout(
        &url,
        Duration::from_secs(config.request_timeout_secs),
    )?);
    let (tick_tx, tick_rx) = mpsc::unbounded_channel();
    let client = SessionClient::new(transport, lines, None)
        .with_listener(Arc::new(TickForwarder { ticks: tick_tx }))
        .with_poll_interval(Duration::from_secs(config.poll_interval_secs));

    let message = client.start_server(&url, &args.session, &user, &file_name).await?;
    if message != MSG_OK {
        bail!("service refused to start the session: {message}");
    }

    info!(session = %args.session, user = %user, file = %file_name, "hosting session");
    super::drive(&client, tick_rx).await
}
