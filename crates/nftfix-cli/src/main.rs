//! nftfix CLI - Main entry point

use clap::Parser;
use nftfix_cli::{Cli, Commands, Config};
use nftfix_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(command) = cli.command.as_ref() else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("nftfix")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli, command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli, command: &Commands) -> nftfix_cli::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }

    match command {
        Commands::Validate { cmids, refresh, run } => {
            run.apply(&mut config)?;
            nftfix_cli::commands::validate::run(&config, cmids, *refresh, !run.no_progress)
                .await
                .map(|_| ())
        },

        Commands::Upload { target } => {
            nftfix_cli::commands::upload::run(&config, target.cluster, &target.payer)
                .await
                .map(|_| ())
        },

        Commands::Update {
            target,
            update_authority,
        } => nftfix_cli::commands::update::run(
            &config,
            target.cluster,
            &target.payer,
            update_authority,
        )
        .await
        .map(|_| ()),

        Commands::Runall {
            cmids,
            run,
            target,
            update_authority,
        } => {
            run.apply(&mut config)?;
            nftfix_cli::commands::runall::run(
                &config,
                cmids,
                target.cluster,
                &target.payer,
                update_authority,
                !run.no_progress,
            )
            .await
        },

        Commands::Status => nftfix_cli::commands::status::run(&config).await,
    }
}
