pub mod config;
pub mod context;
pub mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "scopebox")]
#[command(author, version, about = "Run untrusted script snippets against a restricted ambient scope")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true, env = "SCOPEBOX_CONFIG")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a body against the restricted context and invoke it
    Run(run::RunArgs),

    /// List the names visible inside the restricted context
    Context(context::ContextArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}
