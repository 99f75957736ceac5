use crate::demo::{run_demo, run_dispatch, run_score, DemoArgs, DispatchArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use crm_engine::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "CRM Engine",
    about = "Lead scoring and campaign scheduling for multi-tenant creator CRMs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and background campaign poller (default command)
    Serve(ServeArgs),
    /// Run a single dispatch pass over due campaigns, for cron-style schedulers
    Dispatch(DispatchArgs),
    /// Score a contact from the demo tenant and print the breakdown
    Score(ScoreArgs),
    /// Walk through scoring and campaign dispatch on in-memory data
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Preload the demo tenant's contacts and campaigns
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Dispatch(args) => run_dispatch(args).await,
        Command::Score(args) => run_score(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
