use crate::demo::{run_demo, DemoArgs};
use crate::sync::{run_ingest, run_poll, IngestArgs, PollArgs};
use clap::{Parser, Subcommand};
use haitaton_sync::config::AppConfig;
use haitaton_sync::error::AppError;
use haitaton_sync::telemetry;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "haitaton-sync",
    about = "Drive permit applications and registry status synchronization from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk an application from draft to decision against in-memory adapters (default command)
    Demo(DemoArgs),
    /// Fold a file of registry status events into the application store
    Ingest(IngestArgs),
    /// Poll a registry status feed on an interval
    Poll(PollArgs),
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    info!(environment = ?config.environment, "haitaton sync starting");

    let command = cli
        .command
        .unwrap_or_else(|| Command::Demo(DemoArgs::default()));

    match command {
        Command::Demo(args) => run_demo(args, &config.sync),
        Command::Ingest(args) => run_ingest(args, &config.sync),
        Command::Poll(args) => run_poll(args, &config.sync).await,
    }
}
