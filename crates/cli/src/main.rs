// cuesync CLI entry point.

use clap::Parser;

mod commands;
mod cue_file;

#[derive(Parser)]
#[command(name = "cuesync", about = "Collaborative timed-text editing against a sync service")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    commands::run(cli.command).await
}
