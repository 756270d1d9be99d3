// CLI subcommand dispatch and the shared sync loop.

use anyhow::{Context, Result};
use clap::Subcommand;
use tokio::sync::mpsc;
use tracing::{info, warn};

use cuesync_client::session::{ReconnectStatus, SessionClient, SessionListener};

pub mod join;
pub mod start;

#[derive(Subcommand)]
pub enum Command {
    /// Host a new session from a cue file
    Start(start::StartArgs),
    /// Join an existing session
    Join(join::JoinArgs),
}

pub async fn run(cmd: Command) -> Result<()> {
    match cmd {
        Command::Start(args) => start::run(args).await,
        Command::Join(args) => join::run(args).await,
    }
}

/// Forwards poll ticks onto a channel the sync loop can await.
pub struct TickForwarder {
    pub ticks: mpsc::UnboundedSender<()>,
}

impl SessionListener for TickForwarder {
    fn on_poll_tick(&self) {
        let _ = self.ticks.send(());
    }
}

/// Answer poll ticks with diff-and-push then pull-and-merge until
/// Ctrl-C. A failed sync attempts a restart before giving up.
pub async fn drive(
    client: &SessionClient,
    mut ticks: mpsc::UnboundedReceiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("leaving session");
                client.leave().await;
                return Ok(());
            }
            Some(()) = ticks.recv() => {
                if let Err(error) = sync_once(client).await {
                    warn!(%error, "sync failed; attempting to reconnect");
                    match client.restart().await {
                        Ok(ReconnectStatus::Resumed { .. }) => info!("session resumed"),
                        Ok(ReconnectStatus::ReloadRequired { .. }) => {
                            info!("rejoined; local copy replaced from the server");
                        }
                        Err(error) => {
                            return Err(error).context("could not re-establish the session");
                        }
                    }
                }
            }
        }
    }
}

async fn sync_once(client: &SessionClient) -> Result<()> {
    let pushed = client.check_for_and_submit_updates().await?;
    if pushed > 0 {
        info!(pushed, "pushed local edits");
    }
    let (updates, _message, _line_count) = client.get_updates().await?;
    for update in &updates {
        info!(
            user = %update.user_name,
            index = update.index,
            action = update.action.as_str(),
            "remote change"
        );
        client.apply_remote_update(update);
    }
    Ok(())
}
