//! CLI argument definitions for the Charla application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use charla_chat::TurnProfile;
use charla_core::config::CharlaConfig;

/// Environment variable naming the config file.
pub const ENV_CONFIG: &str = "CHARLA_CONFIG";

/// Charla - a Spanish-language front-end for a hosted conversational assistant.
#[derive(Parser, Debug)]
#[command(name = "charla", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Address to bind.
        #[arg(long)]
        host: Option<String>,
        #[arg(short = 'p', long)]
        port: Option<u16>,
    },
    /// Chat with the assistant from the terminal.
    Chat {
        #[arg(long, value_enum, default_value_t = ProfileArg::Console)]
        profile: ProfileArg,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileArg {
    /// Lower-cased, space-joined, context echo and smart formatting on.
    Console,
    /// Lower-cased and concatenated, no upstream options.
    Desktop,
}

impl ProfileArg {
    pub fn turn_profile(self) -> TurnProfile {
        match self {
            ProfileArg::Console => TurnProfile::console(),
            ProfileArg::Desktop => TurnProfile::desktop(),
        }
    }
}

impl CliArgs {
    /// The subcommand to run, `serve` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            host: None,
            port: None,
        })
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CHARLA_CONFIG env var > ~/.charla/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_from(|key| std::env::var(key).ok())
    }

    fn resolve_config_path_from<F>(&self, lookup: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = lookup(ENV_CONFIG).filter(|p| !p.trim().is_empty()) {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter used when RUST_LOG is unset.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config: &CharlaConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }

    /// Apply `serve` flags on top of the file and environment values.
    pub fn apply_overrides(&self, config: &mut CharlaConfig) {
        if let Some(Command::Serve { host, port }) = &self.command {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".charla").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".charla").join("config.toml");
    }
    PathBuf::from("config.toml")
}
