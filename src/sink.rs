//! Metric sinks receiving finished field maps.
//!
//! The gather pipeline hands every parsed power reading to an [`Accumulator`].
//! Sinks must tolerate concurrent submission from multiple fetch tasks; each
//! call appends one independent record. Two implementations are provided:
//! [`PrometheusSink`] backing the `/metrics` endpoint and [`ConsoleSink`] for
//! the `test` subcommand.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use prometheus::{GaugeVec, IntCounter, Opts, Registry};
use std::fmt;
use std::sync::RwLock as StdRwLock;
use tracing::{debug, error};

/// A single field value: numeric readings plus their unit strings.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Destination for finished metric records and per-target errors.
///
/// `add_fields` appends one record atomically; `add_error` reports a failure
/// that did not abort the overall poll cycle. Both may be called concurrently
/// from independent fetch tasks.
pub trait Accumulator: Send + Sync {
    fn add_fields(
        &self,
        measurement: &str,
        fields: HashMap<String, FieldValue>,
        tags: Option<HashMap<String, String>>,
        timestamp: DateTime<Utc>,
    );

    fn add_error(&self, error: &dyn std::error::Error);
}

/// Sink exposing readings through a Prometheus registry.
///
/// Each measurement becomes one gauge family with `host`, `field` and `unit`
/// labels; numeric fields are paired with their `<name>_unit` companion so the
/// unit string survives as a label. Repeated polls overwrite the previous
/// sample per label set.
pub struct PrometheusSink {
    registry: Registry,
    gauges: StdRwLock<HashMap<String, GaugeVec>>,
    errors_total: IntCounter,
    last_poll: GaugeVec,
}

impl PrometheusSink {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let errors_total = IntCounter::new(
            "ipmi_exporter_errors_total",
            "Number of per-target gather errors reported since startup",
        )?;
        let last_poll = GaugeVec::new(
            Opts::new(
                "ipmi_exporter_last_poll_timestamp_seconds",
                "Unix timestamp of the last power reading received per host",
            ),
            &["host"],
        )?;

        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(last_poll.clone()))?;

        Ok(Self {
            registry: registry.clone(),
            gauges: StdRwLock::new(HashMap::new()),
            errors_total,
            last_poll,
        })
    }

    /// Returns the gauge family for a measurement, registering it on first
    /// use.
    fn measurement_gauge(&self, measurement: &str) -> Option<GaugeVec> {
        if let Some(gauge) = self.gauges.read().unwrap().get(measurement) {
            return Some(gauge.clone());
        }

        let mut gauges = self.gauges.write().unwrap();
        // Re-check under the write lock in case another task registered it.
        if let Some(gauge) = gauges.get(measurement) {
            return Some(gauge.clone());
        }

        let gauge = match GaugeVec::new(
            Opts::new(
                measurement.to_string(),
                format!("Fields reported under the '{}' measurement", measurement),
            ),
            &["host", "field", "unit"],
        ) {
            Ok(gauge) => gauge,
            Err(e) => {
                error!("Failed to create gauge for measurement '{}': {}", measurement, e);
                return None;
            }
        };

        if let Err(e) = self.registry.register(Box::new(gauge.clone())) {
            error!("Failed to register measurement '{}': {}", measurement, e);
            return None;
        }

        gauges.insert(measurement.to_string(), gauge.clone());
        Some(gauge)
    }
}

impl Accumulator for PrometheusSink {
    fn add_fields(
        &self,
        measurement: &str,
        fields: HashMap<String, FieldValue>,
        tags: Option<HashMap<String, String>>,
        timestamp: DateTime<Utc>,
    ) {
        let Some(gauge) = self.measurement_gauge(measurement) else {
            return;
        };

        let host = tags
            .as_ref()
            .and_then(|t| t.get("host"))
            .map(String::as_str)
            .unwrap_or("");

        let mut samples = 0;
        for (name, value) in &fields {
            let FieldValue::Float(v) = value else {
                continue; // unit strings are attached as labels below
            };
            let unit = match fields.get(&format!("{}_unit", name)) {
                Some(FieldValue::Text(unit)) => unit.as_str(),
                _ => "",
            };
            gauge.with_label_values(&[host, name, unit]).set(*v);
            samples += 1;
        }

        self.last_poll
            .with_label_values(&[host])
            .set(timestamp.timestamp_millis() as f64 / 1000.0);

        debug!(
            "Recorded {} samples for measurement '{}' host '{}'",
            samples, measurement, host
        );
    }

    fn add_error(&self, error: &dyn std::error::Error) {
        self.errors_total.inc();
        error!("Gather error: {}", error);
    }
}

/// Sink printing each record to stdout, used by the `test` subcommand.
pub struct ConsoleSink;

impl Accumulator for ConsoleSink {
    fn add_fields(
        &self,
        measurement: &str,
        fields: HashMap<String, FieldValue>,
        tags: Option<HashMap<String, String>>,
        timestamp: DateTime<Utc>,
    ) {
        let host = tags
            .as_ref()
            .and_then(|t| t.get("host"))
            .map(String::as_str)
            .unwrap_or("(local)");

        let mut pairs: Vec<(&String, &FieldValue)> = fields.iter().collect();
        pairs.sort_by_key(|(name, _)| name.as_str());

        println!("{} host={} time={}", measurement, host, timestamp.to_rfc3339());
        for (name, value) in pairs {
            println!("   {} = {}", name, value);
        }
    }

    fn add_error(&self, error: &dyn std::error::Error) {
        eprintln!("error: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    fn fields(entries: &[(&str, FieldValue)]) -> HashMap<String, FieldValue> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_prometheus_sink_pairs_units() {
        let registry = Registry::new();
        let sink = PrometheusSink::new(&registry).unwrap();

        sink.add_fields(
            "ipmi_power",
            fields(&[
                ("instantaneous_power_reading", FieldValue::Float(167.0)),
                (
                    "instantaneous_power_reading_unit",
                    FieldValue::Text("Watts".to_string()),
                ),
            ]),
            None,
            Utc::now(),
        );

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let exposition = String::from_utf8(buffer).unwrap();

        assert!(exposition.contains(
            r#"ipmi_power{field="instantaneous_power_reading",host="",unit="Watts"} 167"#
        ));
    }

    #[test]
    fn test_prometheus_sink_tags_host() {
        let registry = Registry::new();
        let sink = PrometheusSink::new(&registry).unwrap();

        let mut tags = HashMap::new();
        tags.insert("host".to_string(), "10.0.0.5".to_string());
        sink.add_fields(
            "ipmi_power",
            fields(&[("minimum_during_sampling_period", FieldValue::Float(124.0))]),
            Some(tags),
            Utc::now(),
        );

        let families = registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "ipmi_power")
            .unwrap();
        let labels = family.get_metric()[0].get_label();
        assert!(labels
            .iter()
            .any(|l| l.get_name() == "host" && l.get_value() == "10.0.0.5"));
    }

    #[test]
    fn test_prometheus_sink_counts_errors() {
        let registry = Registry::new();
        let sink = PrometheusSink::new(&registry).unwrap();

        let err = std::io::Error::other("boom");
        sink.add_error(&err);
        sink.add_error(&err);

        let families = registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "ipmi_exporter_errors_total")
            .unwrap();
        assert_eq!(family.get_metric()[0].get_counter().value(), 2.0);
    }
}
