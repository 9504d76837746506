//! Line grammar for ipmitool power-reading output.
//!
//! Each line of interest looks like
//!
//! ```text
//!     Instantaneous power reading:                   167 Watts
//! ```
//!
//! i.e. leading whitespace, a colon-delimited label, a whitespace-delimited
//! value token and a unit token; anything after the unit is ignored. The
//! utility also prints headers, blank lines and status rows ("Power reading
//! state is: activated"), so lines that do not match the grammar or whose
//! value token is not numeric are skipped silently rather than treated as
//! errors.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use std::io::{self, BufRead};

use crate::sink::{Accumulator, FieldValue};

/// Measurement name every power-reading record is emitted under.
pub const MEASUREMENT: &str = "ipmi_power";

/// Splits one output line into `(label, value, unit)` tokens.
///
/// Returns `None` for lines that do not match the grammar: at least one
/// leading whitespace character, a label up to the first colon, at least one
/// whitespace character after the colon, then two whitespace-delimited
/// tokens. The label is trimmed; value and unit are returned verbatim.
pub fn parse_line(line: &str) -> Option<(&str, &str, &str)> {
    let body = line.trim_start();
    if body.len() == line.len() {
        return None; // grammar requires leading whitespace
    }

    let (label, rest) = body.split_once(':')?;

    let value_part = rest.trim_start();
    if value_part.len() == rest.len() {
        return None; // whitespace required between colon and value
    }

    let mut tokens = value_part.split_whitespace();
    let value = tokens.next()?;
    let unit = tokens.next()?;

    Some((label.trim(), value, unit))
}

/// Normalizes a free-form label into a stable field name: trim, lowercase,
/// and replace each literal space with an underscore. Idempotent.
pub fn normalize(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

/// Scans raw subprocess output into a field map.
///
/// Matching lines contribute `fields[name] = value` and
/// `fields[name_unit] = unit`; the last occurrence wins if a label repeats.
/// The only error surfaced is a line-scan failure from the byte stream,
/// distinct from the silent per-line skips.
pub fn parse_fields(output: &[u8]) -> io::Result<HashMap<String, FieldValue>> {
    let mut fields = HashMap::new();

    for line in output.lines() {
        let line = line?;
        let Some((label, value, unit)) = parse_line(&line) else {
            continue;
        };
        let Ok(value) = value.parse::<f64>() else {
            continue; // status rows carry words like "activated" here
        };

        let key = normalize(label);
        fields.insert(format!("{}_unit", key), FieldValue::Text(unit.to_string()));
        fields.insert(key, FieldValue::Float(value));
    }

    Ok(fields)
}

/// Parses one invocation's output and emits it as a single record.
///
/// The hostname is not written into the field map; for remote targets it is
/// carried as a `host` tag so records from different BMCs stay
/// distinguishable.
pub fn emit_power_reading(
    acc: &dyn Accumulator,
    hostname: &str,
    output: &[u8],
    measured_at: DateTime<Utc>,
) -> io::Result<()> {
    let fields = parse_fields(output)?;

    let tags = if hostname.is_empty() {
        None
    } else {
        let mut tags = HashMap::new();
        tags.insert("host".to_string(), hostname.to_string());
        Some(tags)
    };

    acc.add_fields(MEASUREMENT, fields, tags, measured_at);
    Ok(())
}
