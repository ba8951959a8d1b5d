//! Concord command-line client.
//!
//! Drives the contract lifecycle engine against a local store. Every command
//! that acts on contracts or notifications runs as the user named by `--as`.

use clap::{Parser, Subcommand};
use std::process::ExitCode;

mod cli;

use cli::context::GlobalArgs;

#[derive(Parser, Debug)]
#[command(
    name = "concord",
    version,
    about = "Two-party contract review, approval and signing"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register, list and update users
    User {
        #[command(subcommand)]
        action: cli::user::UserAction,
    },

    /// Submit, review, approve and sign contracts
    Contract {
        #[command(subcommand)]
        action: cli::contract::ContractAction,
    },

    /// Read the acting user's notification inbox
    Notifications {
        #[command(subcommand)]
        action: cli::notifications::NotificationAction,
    },

    /// Send one request through the HTTP route table
    Api(cli::api::ApiArgs),

    /// Show resolved paths and engine settings
    Config,
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Config => cli::config::run(&cli.global),
        Commands::User { action } => cli::user::run(&cli.global, action),
        Commands::Contract { action } => cli::contract::run(&cli.global, action),
        Commands::Notifications { action } => cli::notifications::run(&cli.global, action),
        Commands::Api(args) => cli::api::run(&cli.global, args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    let _log_guard = match concord_logging::init_logging(concord_logging::LogConfig {
        app_name: "concord",
        verbose: cli.global.verbose,
        log_dir: None,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: file logging disabled: {:#}", err);
            None
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = %err, "Command failed");
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{}", cli::error::render(&err));
            }
            ExitCode::from(1)
        }
    }
}
