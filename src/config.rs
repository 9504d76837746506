//! Configuration management for ipmi-power-exporter.
//!
//! This module handles loading, merging, and validating configuration from
//! files and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9290;
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// Sample-period tokens ipmitool documents for `dcmi power reading`.
/// Anything else is still passed through verbatim; ipmitool reports its own
/// error for unknown tokens.
pub const SAMPLE_PERIODS: &[&str] = &[
    "5_sec", "15_sec", "30_sec", "1_min", "3_min", "7_min", "15_min", "30_min", "1_hour",
];

const PRIVILEGE_LEVELS: &[&str] = &["CALLBACK", "USER", "OPERATOR", "ADMINISTRATOR"];

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Collection
    /// Path to the ipmitool executable; discovered on PATH when unset
    pub path: Option<String>,
    /// Session privilege level passed as `-L`
    pub privilege: Option<String>,
    /// Remote BMC connection strings; empty = query the local machine
    pub servers: Option<Vec<String>>,
    /// Timeout for the ipmitool command to complete, in seconds
    #[serde(alias = "timeout")]
    pub timeout_secs: Option<u64>,
    /// Seconds between poll cycles; use a multiple of the timeout to avoid
    /// gaps or overlap in pulled data
    #[serde(alias = "interval")]
    pub interval_secs: Option<u64>,
    /// Run ipmitool through sudo; sudo must allow it without a password
    #[serde(alias = "use-sudo")]
    pub use_sudo: Option<bool>,
    /// DCMI sample period token, passed through verbatim
    #[serde(alias = "sample-period")]
    pub sample_period: Option<String>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            path: None,
            privilege: None,
            servers: None,
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            interval_secs: Some(DEFAULT_INTERVAL_SECS),
            use_sudo: Some(false),
            sample_period: None,
            log_level: Some("info".into()),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.timeout_secs == Some(0) {
        return Err("timeout_secs must be greater than zero".into());
    }
    if cfg.interval_secs == Some(0) {
        return Err("interval_secs must be greater than zero".into());
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    // Unknown tokens are not fatal: they are passed through and ipmitool
    // reports its own error.
    if let Some(period) = cfg.sample_period.as_deref() {
        if !period.is_empty() && !SAMPLE_PERIODS.contains(&period) {
            warn!(
                "sample_period '{}' is not a documented DCMI token ({})",
                period,
                SAMPLE_PERIODS.join("/")
            );
        }
    }

    if let Some(privilege) = cfg.privilege.as_deref() {
        if !privilege.is_empty() && !PRIVILEGE_LEVELS.contains(&privilege) {
            warn!(
                "privilege '{}' is not a documented level ({})",
                privilege,
                PRIVILEGE_LEVELS.join("/")
            );
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(path) = &args.path {
        config.path = Some(path.clone());
    }

    if let Some(privilege) = &args.privilege {
        config.privilege = Some(privilege.clone());
    }

    if !args.servers.is_empty() {
        config.servers = Some(args.servers.clone());
    }

    if let Some(timeout) = args.timeout {
        config.timeout_secs = Some(timeout);
    }

    if let Some(interval) = args.interval {
        config.interval_secs = Some(interval);
    }

    if args.use_sudo {
        config.use_sudo = Some(true);
    }

    if let Some(period) = &args.sample_period {
        config.sample_period = Some(period.clone());
    }

    Ok(config)
}

/// Resolves the ipmitool executable path once at startup: the configured
/// path wins, otherwise PATH is consulted. Returns an empty string when
/// nothing was found; the gatherer turns that into the fatal config error.
pub fn resolve_ipmitool_path(config: &Config) -> String {
    if let Some(path) = config.path.as_deref() {
        if !path.is_empty() {
            return path.to_string();
        }
    }

    match which::which("ipmitool") {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(_) => String::new(),
    }
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/ipmi-power-exporter/config.yaml",
            "/etc/ipmi-power-exporter/config.yml",
            "/etc/ipmi-power-exporter/config.json",
            "./ipmi-power-exporter.yaml",
            "./ipmi-power-exporter.yml",
            "./ipmi-power-exporter.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, Some(DEFAULT_PORT));
        assert_eq!(config.timeout_secs, Some(20));
        assert_eq!(config.interval_secs, Some(30));
        assert_eq!(config.use_sudo, Some(false));
        assert!(config.servers.is_none());
    }

    #[test]
    fn test_load_yaml_config() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "servers:\n  - root:passwd@lan(192.168.1.1)\ntimeout: 10\nuse-sudo: true"
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(
            config.servers,
            Some(vec!["root:passwd@lan(192.168.1.1)".to_string()])
        );
        assert_eq!(config.timeout_secs, Some(10));
        assert_eq!(config.use_sudo, Some(true));
    }

    #[test]
    fn test_load_toml_config() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "path = \"/opt/ipmitool\"\ninterval = 60").unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.path, Some("/opt/ipmitool".to_string()));
        assert_eq!(config.interval_secs, Some(60));
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "ipmi-power-exporter",
            "--no-config",
            "--timeout",
            "5",
            "--server",
            "lan(10.0.0.1)",
            "--server",
            "lan(10.0.0.2)",
            "--use-sudo",
            "--sample-period",
            "1_min",
        ]);

        let config = resolve_config(&args).unwrap();
        assert_eq!(config.timeout_secs, Some(5));
        assert_eq!(
            config.servers,
            Some(vec!["lan(10.0.0.1)".to_string(), "lan(10.0.0.2)".to_string()])
        );
        assert_eq!(config.use_sudo, Some(true));
        assert_eq!(config.sample_period, Some("1_min".to_string()));
        // Untouched values keep their defaults
        assert_eq!(config.port, Some(DEFAULT_PORT));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            timeout_secs: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_bind() {
        let config = Config {
            bind: Some("not-an-ip".to_string()),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_validate_accepts_unknown_sample_period() {
        // Out-of-set tokens only warn; they are passed through to ipmitool.
        let config = Config {
            sample_period: Some("2_fortnights".to_string()),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_ok());
    }

    #[test]
    fn test_resolve_path_prefers_configured_value() {
        let config = Config {
            path: Some("/opt/ipmitool".to_string()),
            ..Config::default()
        };
        assert_eq!(resolve_ipmitool_path(&config), "/opt/ipmitool");
    }
}
