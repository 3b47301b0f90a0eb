use crate::commands;
use crate::server;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use yedid_tor::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "yedid-tor",
    about = "Track waiting and accepted lists for facilities and their branches",
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
    /// Print the waiting or accepted list for a facility
    List(ListArgs),
    /// Add a person to a branch waiting list
    Add(AddArgs),
    /// Remove a person from the waiting list
    Remove(RemoveArgs),
    /// Move a waiting person into an accepted list
    Promote(PromoteArgs),
    /// Move an accepted person back to a waiting list
    Demote(DemoteArgs),
    /// Print waiting-list statistics
    Stats(StatsArgs),
    /// Write every facility snapshot to a spreadsheet workbook
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ListArgs {
    pub(crate) facility: String,
    /// Branch to show; "see all" for every branch
    #[arg(long, default_value = "see all")]
    pub(crate) branch: String,
    /// Show the accepted list instead of the waiting list
    #[arg(long)]
    pub(crate) accepted: bool,
}

#[derive(Args, Debug)]
pub(crate) struct AddArgs {
    pub(crate) facility: String,
    pub(crate) branch: String,
    pub(crate) name: String,
    /// Date the person joined the list, as written on the intake form
    #[arg(long)]
    pub(crate) date: Option<String>,
    #[arg(long)]
    pub(crate) address: Option<String>,
    #[arg(long)]
    pub(crate) referrer: Option<String>,
    #[arg(long)]
    pub(crate) comments: Option<String>,
    #[arg(long)]
    pub(crate) urgent: bool,
    /// Mark every intake document as received
    #[arg(long)]
    pub(crate) complete: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RemoveArgs {
    pub(crate) facility: String,
    pub(crate) name: String,
    #[arg(long, default_value = "see all")]
    pub(crate) branch: String,
}

#[derive(Args, Debug)]
pub(crate) struct PromoteArgs {
    pub(crate) facility: String,
    pub(crate) name: String,
    /// Accepted-list branch to place the person in
    #[arg(long)]
    pub(crate) to: String,
    /// Waiting-list branch to search first
    #[arg(long, default_value = "see all")]
    pub(crate) from: String,
}

#[derive(Args, Debug)]
pub(crate) struct DemoteArgs {
    pub(crate) facility: String,
    pub(crate) name: String,
    /// Waiting-list branch to return the person to
    #[arg(long)]
    pub(crate) to: String,
}

#[derive(Args, Debug)]
pub(crate) struct StatsArgs {
    pub(crate) facility: String,
    #[arg(long, default_value = "see all")]
    pub(crate) branch: String,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Workbook directory (defaults to WAITLIST_WORKBOOK_DIR)
    #[arg(long)]
    pub(crate) dir: Option<PathBuf>,
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args),
        Command::List(args) => commands::list(args),
        Command::Add(args) => commands::add(args),
        Command::Remove(args) => commands::remove(args),
        Command::Promote(args) => commands::promote(args),
        Command::Demote(args) => commands::demote(args),
        Command::Stats(args) => commands::stats(args),
        Command::Export(args) => commands::export(args),
    }
}
