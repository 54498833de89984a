use crate::jobs::{run_digest, run_stale_scan, DigestArgs, StaleScanArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use fund_leads::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fund-leads-api",
    about = "Serve investor enquiry intake and run the lead follow-up jobs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run a scheduled lead job once and print its summary
    Jobs {
        #[command(subcommand)]
        command: JobCommand,
    },
}

#[derive(Subcommand, Debug)]
enum JobCommand {
    /// Remind managers about open or contacted leads that have gone quiet
    StaleScan(StaleScanArgs),
    /// Build and send the weekly lead digest
    Digest(DigestArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON document with funds, company profiles, manager assignments and enquiries
    #[arg(long)]
    pub(crate) fixtures: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Jobs {
            command: JobCommand::StaleScan(args),
        } => run_stale_scan(args).await,
        Command::Jobs {
            command: JobCommand::Digest(args),
        } => run_digest(args).await,
    }
}
