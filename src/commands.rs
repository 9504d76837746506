//! Subcommand implementations.
//!
//! `config` generates a configuration file; `test` runs gather cycles
//! against a console sink and prints the parsed records.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ipmi_power_exporter::{Accumulator, ConsoleSink, ProcessRunner};

use crate::cli::ConfigFormat;
use crate::config::{resolve_ipmitool_path, Config};

/// Generates a configuration file (or prints it to stdout).
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let rendered = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    match output {
        Some(path) => {
            fs::write(&path, rendered)?;
            println!("Wrote configuration to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

/// Runs one or more gather cycles and prints every record.
pub async fn command_test(
    iterations: usize,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 IPMI Power Exporter - Test Mode");
    println!("==================================");

    let path = resolve_ipmitool_path(config);
    let gatherer = crate::build_gatherer(path, config, Arc::new(ProcessRunner));
    let sink: Arc<dyn Accumulator> = Arc::new(ConsoleSink);

    for iteration in 1..=iterations {
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);

        let start = Instant::now();
        gatherer.gather(Arc::clone(&sink)).await?;
        println!("   ⏱️  Cycle completed in {:?}", start.elapsed());

        if iteration < iterations {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    Ok(())
}
