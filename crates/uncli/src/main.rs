mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use uncli_core::Action;

use crate::cli::{Cli, Command, MatchArgs};
use crate::error::{CliError, exit_code};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        if code != exit_code::SUCCESS {
            eprintln!("{:?}", miette::Report::new(err));
        }
        std::process::exit(code);
    }
}

/// Logs go to stderr so stdout stays clean for scripts.
fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let command = cli
        .command
        .unwrap_or(Command::List(MatchArgs { terms: Vec::new() }));
    tracing::debug!(command = ?command, "dispatching command");

    match command {
        Command::List(args) => commands::devices::handle(Action::Display, args, &cli.global).await,
        Command::Block(args) => commands::devices::handle(Action::Block, args, &cli.global).await,
        Command::Unblock(args) => {
            commands::devices::handle(Action::Unblock, args, &cli.global).await
        }
        Command::Kick(args) => commands::devices::handle(Action::Kick, args, &cli.global).await,

        Command::Kv(args) => commands::kv::handle(args, &cli.global).await,

        // Config commands don't need a controller connection
        Command::Config(args) => commands::config_cmd::handle(&args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "uncli", &mut std::io::stdout());
            Ok(())
        }
    }
}
