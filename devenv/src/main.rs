use clap::Parser;
use tracing::debug;

mod cli;
mod commands;

use cli::Args;
use commands::execute_command;

fn main() {
    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = devenv_logging::init_subscriber();

    let args = Args::parse();
    debug!(command = ?args.command, "starting devenv");

    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
