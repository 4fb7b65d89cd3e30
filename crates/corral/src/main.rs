mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use corral_api::ApiClient;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

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
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a backend connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "corral", &mut std::io::stdout());
            Ok(())
        }

        // Rule CRUD needs the API client only
        Command::Rules(args) => {
            let resolved = config::resolve(&cli.global)?;
            let api = build_api_client(&resolved)?;
            commands::rules::handle(&api, args, &cli.global).await
        }

        // The generation flow additionally needs the push gateway
        Command::Suggest(args) => {
            let resolved = config::resolve(&cli.global)?;
            let api = build_api_client(&resolved)?;
            let profile_name = config::active_profile_name(
                &cli.global,
                &config::load_config_or_default(),
            );
            commands::suggest::handle(&api, resolved.push, &profile_name, args, &cli.global).await
        }
    }
}

fn build_api_client(resolved: &corral_config::ResolvedProfile) -> Result<ApiClient, CliError> {
    ApiClient::new(
        resolved.api_url.clone(),
        &resolved.token,
        &resolved.transport,
    )
    .map_err(commands::util::api_err)
}
