use anyhow::{Context, Result};
use clap::Args;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;
use crate::sandbox::Sandbox;

#[derive(Args)]
pub struct RunArgs {
    /// Function body to compile (read from --file or stdin when omitted)
    pub body: Option<String>,

    /// Read the body from a file
    #[arg(short, long, conflicts_with = "body")]
    pub file: Option<PathBuf>,

    /// Parameter name, repeatable and in order
    #[arg(short, long = "param", value_name = "NAME")]
    pub params: Vec<String>,

    /// Argument as JSON, repeatable and matched to --param by position
    #[arg(short, long = "arg", value_name = "JSON")]
    pub args: Vec<String>,
}

pub fn run(args: RunArgs, config: &Config) -> Result<()> {
    let body = read_body(&args)?;

    let mut sandbox = Sandbox::with_config(config.sandbox.clone());
    let params: Vec<&str> = args.params.iter().map(String::as_str).collect();
    let function = sandbox.compile(&params, &body)?;

    let mut values = Vec::with_capacity(args.args.len());
    for raw in &args.args {
        let json: serde_json::Value =
            serde_json::from_str(raw).with_context(|| format!("Invalid --arg JSON: {}", raw))?;
        values.push(sandbox.json_value(&json)?);
    }
    debug!("Invoking with {} argument(s)", values.len());

    let result = sandbox.call(&function, &values)?;
    println!("{}", result.display());
    Ok(())
}

fn read_body(args: &RunArgs) -> Result<String> {
    if let Some(body) = &args.body {
        return Ok(body.clone());
    }
    if let Some(path) = &args.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read body from {}", path.display()));
    }

    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .context("Failed to read body from stdin")?;
    Ok(body)
}
