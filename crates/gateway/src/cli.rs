//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cvt_domain::config::Config;
use cvt_domain::error::{Error, Result};

#[derive(Parser)]
#[command(name = "cvtailor", about = "Résumé tailoring orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the config file (default: ./cvtailor.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Config inspection.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Parse the config and report problems.
    Validate,
    /// Print the effective config (env overrides applied).
    Show,
}

/// Load the config file, fill defaults, apply env overrides.
pub fn load_config(path: Option<&PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path
        .cloned()
        .or_else(|| std::env::var("CVTAILOR_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("cvtailor.toml"));

    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
    } else {
        Config::default()
    };
    config.apply_env_overrides();
    Ok((config, path))
}

/// `config validate` — returns false when the file fails to parse.
pub fn validate(path: Option<&PathBuf>) -> bool {
    match load_config(path) {
        Ok((_, path)) => {
            println!("config ok: {}", path.display());
            true
        }
        Err(e) => {
            eprintln!("config invalid: {e}");
            false
        }
    }
}

/// `config show` — print the effective config.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("could not render config: {e}"),
    }
}
