// Join an existing session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::sync::mpsc;
use tracing::info;

use cuesync_client::config::GlobalConfig;
use cuesync_client::session::SessionClient;
use cuesync_client::transport::HttpTransport;

use super::TickForwarder;

#[derive(Args)]
pub struct JoinArgs {
    /// Session key to join
    #[arg(long)]
    pub session: String,
    /// Display name (defaults to the configured one)
    #[arg(long)]
    pub user: Option<String>,
    /// Service base URL (defaults to the configured one)
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn run(args: JoinArgs) -> Result<()> {
    let config = GlobalConfig::load();
    let url = args
        .url
        .or(config.service_url)
        .context("no service url: pass --url or set service_url in ~/.cuesync/config.toml")?;
    let user = args
        .user
        .or(config.display_name)
        .context("no display name: pass --user or set display_name in the config")?;

    let transport = Arc::new(HttpTransport::with_timeout(
        &url,
        Duration::from_secs(config.request_timeout_secs),
    )?);
    let (tick_tx, tick_rx) = mpsc::unbounded_channel();
    let client = SessionClient::new(transport, Vec::new(), None)
        .with_listener(Arc::new(TickForwarder { ticks: tick_tx }))
        .with_poll_interval(Duration::from_secs(config.poll_interval_secs));

    let (joined, message) = client.join(&url, &user, &args.session).await?;
    if !joined {
        bail!("could not join session: {message}");
    }

    info!(
        session = %args.session,
        user = %client.current_user().map(|u| u.user_name).unwrap_or_default(),
        file = %client.file_name(),
        lines = client.working_lines().len(),
        "joined session"
    );
    super::drive(&client, tick_rx).await
}
