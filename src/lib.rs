//! scopebox - least-privilege evaluation of untrusted script snippets
//!
//! This crate embeds an ECMAScript engine and provides:
//! - Filtered, read-only stand-ins for host values
//! - A restricted ambient context, sourced from a disposable isolated realm
//! - Scope-injected compilation that resolves every free name against it
//! - A small CLI with TOML configuration

pub mod cli;
pub mod config;
pub mod paths;
pub mod sandbox;

pub use config::Config;
pub use sandbox::{Sandbox, SandboxError, SandboxedFunction};
