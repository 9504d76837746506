//! IPMI Power Exporter Library
//!
//! This library implements the collection pipeline for BMC power-reading
//! telemetry: it invokes `ipmitool dcmi power reading` as a subprocess (locally
//! or against remote BMCs), parses the line-oriented output into numeric
//! fields, and emits one timestamped metric record per target per poll cycle.
//!
//! # Structure
//!
//! - [`connection`]: parses `[user[:pass]@][protocol[(address)]]` connection
//!   strings and renders the matching ipmitool options
//! - [`parser`]: the line grammar that turns raw ipmitool output into a
//!   field map of readings and their units
//! - [`fetcher`]: builds and executes the command for one target with a
//!   bounded timeout, via an injectable [`fetcher::CommandRunner`]
//! - [`gather`]: fans out one fetch per configured target concurrently and
//!   joins them before returning
//! - [`sink`]: the [`sink::Accumulator`] trait metric records are handed to,
//!   with Prometheus and console implementations
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ipmi_power_exporter::{Accumulator, ConsoleSink, Fetcher, Gatherer, ProcessRunner};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher {
//!     path: "/usr/bin/ipmitool".to_string(),
//!     privilege: String::new(),
//!     use_sudo: false,
//!     sample_period: String::new(),
//!     timeout: Duration::from_secs(20),
//!     runner: Arc::new(ProcessRunner),
//! };
//! let gatherer = Gatherer::new(fetcher, vec!["root:passwd@lan(192.168.1.1)".to_string()]);
//! let sink: Arc<dyn Accumulator> = Arc::new(ConsoleSink);
//! gatherer.gather(sink).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod fetcher;
pub mod gather;
pub mod parser;
pub mod sink;

// Re-export main types for convenience
pub use connection::Connection;
pub use fetcher::{build_invocation, CommandError, CommandRunner, FetchError, Fetcher, ProcessRunner};
pub use gather::{GatherError, Gatherer};
pub use parser::MEASUREMENT;
pub use sink::{Accumulator, ConsoleSink, FieldValue, PrometheusSink};
