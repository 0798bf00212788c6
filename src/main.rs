use anyhow::Result;
use clap::Parser;

use scopebox::cli::{self, Cli, Commands};
use scopebox::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Loaded before logging so `logging.level` applies; `config` subcommands
    // reload on their own and must work even when the file is broken.
    let config = Config::load_or_default_path(cli.config.as_deref());

    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config
            .as_ref()
            .map(|config| config.logging.level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        Commands::Run(args) => cli::run::run(args, &config?),
        Commands::Context(args) => cli::context::run(args, &config?),
        Commands::Config(args) => cli::config::run(args, cli.config.as_deref()),
    }
}
