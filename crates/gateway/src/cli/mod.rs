pub mod config;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use ar_domain::config::Config;
use ar_domain::error::{Error, Result};

#[derive(Parser)]
#[command(name = "agentrelay", about = "Multi-tenant agent runtime gateway")]
pub struct Cli {
    /// Config file path (defaults to ./agentrelay.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway (default).
    Serve,
    /// Inspect or validate configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Validate,
    Show,
}

/// Load config from the given path, the default path, or built-in
/// defaults — then apply environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    let path = path.map(Path::to_path_buf).or_else(|| {
        let default = PathBuf::from("agentrelay.toml");
        default.exists().then_some(default)
    });

    let mut config = match &path {
        Some(p) => {
            let raw = std::fs::read_to_string(p).map_err(Error::Io)?;
            toml::from_str(&raw)
                .map_err(|e| Error::Config(format!("{}: {e}", p.display())))?
        }
        None => Config::default(),
    };

    config.apply_env_overrides();
    Ok((config, path))
}
