//! SimpleBank CLI - a double-entry ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod output;

use commands::{account, doctor, entry, status, transfer};

/// SimpleBank - accounts, entries and transfers
#[derive(Parser)]
#[command(name = "sb", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Inspect entries
    Entry {
        #[command(subcommand)]
        command: entry::EntryCommands,
    },

    /// Send and inspect transfers
    Transfer {
        #[command(subcommand)]
        command: transfer::TransferCommands,
    },

    /// Show ledger totals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run ledger integrity checks
    Doctor {
        /// Show check details
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("{e:#}").red());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Account { command } => account::run(command),
        Commands::Entry { command } => entry::run(command),
        Commands::Transfer { command } => transfer::run(command),
        Commands::Status { json } => status::run(json),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
    }
}
