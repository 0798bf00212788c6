use anyhow::Result;
use clap::Args;

use crate::config::Config;
use crate::sandbox::{BindingKind, Sandbox};

#[derive(Args)]
pub struct ContextArgs {
    /// Also list denied names
    #[arg(short, long)]
    pub all: bool,
}

pub fn run(args: ContextArgs, config: &Config) -> Result<()> {
    let mut sandbox = Sandbox::with_config(config.sandbox.clone());
    let restricted = sandbox.restricted_context().clone();
    let entries = restricted.describe(sandbox.context_mut());

    println!("Restricted context");
    println!("==================");
    println!(
        "Source:  {}",
        if restricted.is_isolated() {
            "isolated realm"
        } else {
            "real global (isolated realm unavailable or disabled)"
        }
    );
    println!(
        "Guard:   {}",
        if restricted.is_proxied() { "proxy" } else { "plain stand-in" }
    );
    println!();

    let mut shown = 0usize;
    for entry in &entries {
        if entry.kind == BindingKind::Denied && !args.all {
            continue;
        }
        let kind = match entry.kind {
            BindingKind::Wrapped => "wrapped",
            BindingKind::Scalar => "scalar",
            BindingKind::Denied => "denied",
        };
        println!("  {:<28} {}", entry.name, kind);
        shown += 1;
    }

    let denied = entries
        .iter()
        .filter(|entry| entry.kind == BindingKind::Denied)
        .count();
    println!();
    println!("{} shown, {} denied", shown, denied);
    Ok(())
}
