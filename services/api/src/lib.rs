mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use yedid_tor::error::AppError;

/// Parses the command line and runs the selected command. The async runtime
/// is only started by `serve`, after the backend has been built.
pub fn run() -> Result<(), AppError> {
    cli::run()
}
