//! CLI arguments and subcommands for ipmi-power-exporter.
//!
//! This module defines the command-line interface structure using the clap
//! library, including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "ipmi-power-exporter",
    about = "Prometheus exporter for BMC power readings collected via ipmitool DCMI",
    long_about = "Prometheus exporter for BMC power readings collected via ipmitool DCMI.\n\n\
                  Polls the local host and/or remote baseboard management controllers on a \
                  fixed interval, parses the power-reading report into numeric fields, and \
                  exposes the latest values over HTTP for Prometheus to scrape.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Path to the ipmitool executable (default: discovered on PATH)
    #[arg(long)]
    pub path: Option<String>,

    /// Remote BMC connection string, repeatable: [user[:pass]@][protocol[(address)]]
    #[arg(short = 's', long = "server")]
    pub servers: Vec<String>,

    /// Force session privilege level (CALLBACK, USER, OPERATOR, ADMINISTRATOR)
    #[arg(long)]
    pub privilege: Option<String>,

    /// Timeout for the ipmitool command in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seconds between poll cycles
    #[arg(long)]
    pub interval: Option<u64>,

    /// Run ipmitool through sudo -n
    #[arg(long)]
    pub use_sudo: bool,

    /// DCMI sample period token (5_sec/15_sec/30_sec/1_min/3_min/7_min/15_min/30_min/1_hour)
    #[arg(long)]
    pub sample_period: Option<String>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Run gather cycles once and print records to stdout
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,
    },
}
