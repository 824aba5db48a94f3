use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use vitals_core::{ServiceHealth, ServiceMode};

/// Log level options for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser)]
#[command(name = "vitals")]
#[command(about = "vitals - passive health-status registry and reporting client")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (overrides config file and VITALS_LOG)
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file path (defaults to ~/.config/vitals/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the registry API server
    Serve {
        /// Listening host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Listening port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Shared store identifier; must match across cooperating processes
        #[arg(long)]
        store_name: Option<String>,
    },

    /// Report one worker's health to a running registry
    Report {
        service: String,
        worker: String,

        #[arg(long, value_enum, default_value_t = ModeArg::Running)]
        mode: ModeArg,

        #[arg(long, value_enum, default_value_t = HealthArg::Ok)]
        status: HealthArg,

        #[arg(long, default_value = "")]
        details: String,

        /// Registry base URL (defaults to the configured local daemon)
        #[arg(long)]
        url: Option<String>,

        /// Bearer token (overrides config)
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Fetch one service's aggregated verdict
    Get {
        service: String,

        #[arg(long)]
        url: Option<String>,
    },

    /// List every tracked service
    List {
        #[arg(long)]
        url: Option<String>,
    },

    /// Print the known probe kinds
    Types,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Unknown,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl From<ModeArg> for ServiceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Unknown => ServiceMode::Unknown,
            ModeArg::Starting => ServiceMode::Starting,
            ModeArg::Running => ServiceMode::Running,
            ModeArg::Stopping => ServiceMode::Stopping,
            ModeArg::Stopped => ServiceMode::Stopped,
            ModeArg::Failed => ServiceMode::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HealthArg {
    Unknown,
    Ok,
    Error,
}

impl From<HealthArg> for ServiceHealth {
    fn from(health: HealthArg) -> Self {
        match health {
            HealthArg::Unknown => ServiceHealth::Unknown,
            HealthArg::Ok => ServiceHealth::Ok,
            HealthArg::Error => ServiceHealth::Error,
        }
    }
}
