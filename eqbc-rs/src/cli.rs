//! Command-line arguments.
//!
//! Usage:
//!   eqbc [--store <path>] [-d] [-r] [--host <host>] [--port <port>] [--name <name>]

use std::path::PathBuf;

use clap::Parser;

use crate::registry::{parse_port, valid_username, ConnectionTarget};

/// Host used when neither the command line nor the last connection names one.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Port used when neither the command line nor the last connection names one.
pub const DEFAULT_PORT: u16 = 2112;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default, Parser)]
#[command(name = "eqbc", version, about = "Line-mode client for EQBC broadcast servers")]
pub struct CliArgs {
    /// State file for the last connection and hotkeys.
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Server host to connect to at startup.
    #[arg(long)]
    pub host: Option<String>,

    /// Server port to connect to at startup.
    #[arg(long, value_parser = port_arg)]
    pub port: Option<u16>,

    /// Character name to log in as; connects at startup when given.
    #[arg(long, value_parser = name_arg)]
    pub name: Option<String>,

    /// Reconnect to the last server at startup.
    #[arg(short, long)]
    pub reconnect: bool,

    /// Debug logging on stderr.
    #[arg(short, long)]
    pub debug: bool,
}

/// What to do on startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupAction {
    Idle,
    Connect(ConnectionTarget),
    ReconnectLast,
}

fn port_arg(s: &str) -> Result<u16, String> {
    parse_port(s).ok_or_else(|| format!("invalid port number: {s}"))
}

fn name_arg(s: &str) -> Result<String, String> {
    if valid_username(s) {
        Ok(s.to_owned())
    } else {
        Err(format!("invalid name {s:?}: must be non-empty without ';' or control characters"))
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once("eqbc".to_owned()).chain(argv.iter().cloned()))
}

impl CliArgs {
    /// Decide the startup action.
    ///
    /// An explicit `--name` wins; missing host/port fall back to `last`,
    /// then to [`DEFAULT_HOST`] / [`DEFAULT_PORT`].
    pub fn startup(&self, last: Option<&ConnectionTarget>) -> StartupAction {
        if let Some(name) = &self.name {
            let host = self
                .host
                .clone()
                .or_else(|| last.map(|t| t.host.clone()))
                .unwrap_or_else(|| DEFAULT_HOST.to_owned());
            let port = self.port.or(last.map(|t| t.port)).unwrap_or(DEFAULT_PORT);
            return StartupAction::Connect(ConnectionTarget::new(host, port, name.clone()));
        }
        if self.reconnect {
            StartupAction::ReconnectLast
        } else {
            StartupAction::Idle
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Default state file: `EQBC_STORE`, else `<config dir>/eqbc/state`.
pub fn default_store_path() -> PathBuf {
    if let Ok(p) = std::env::var("EQBC_STORE") {
        return PathBuf::from(p);
    }
    directories::ProjectDirs::from("", "", "eqbc")
        .map(|dirs| dirs.config_dir().join("state"))
        .unwrap_or_else(|| PathBuf::from(".eqbc-state"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
