//! Extraction and decoding of the JSON timing payload a trial prints.
//!
//! The payload is an array of `{"name": string, "duration": number, ...}`
//! objects. Extra fields are ignored. The entry named [`ITEM_COUNT`] is not a
//! measurement: it carries the workload size the executable actually used and
//! is split out into [`ParsedTrial::item_count`].

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{HarnessError, Result};
use crate::PayloadFormat;

/// Default line prefix for [`PayloadFormat::Sentinel`].
pub const DEFAULT_SENTINEL: &str = "PERF_JSON:";

/// Reserved entry name for the workload size echoed back by the executable.
pub const ITEM_COUNT: &str = "item_count";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadLocator {
    format: PayloadFormat,
    sentinel: String,
}

impl Default for PayloadLocator {
    fn default() -> Self {
        Self::bracket()
    }
}

impl PayloadLocator {
    pub fn bracket() -> Self {
        Self {
            format: PayloadFormat::Bracket,
            sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }

    pub fn sentinel(prefix: impl Into<String>) -> Self {
        Self {
            format: PayloadFormat::Sentinel,
            sentinel: prefix.into(),
        }
    }

    pub fn new(format: PayloadFormat, sentinel: impl Into<String>) -> Self {
        Self {
            format,
            sentinel: sentinel.into(),
        }
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Return the slice of `output` holding the JSON array literal.
    pub fn locate<'a>(&self, output: &'a str) -> Result<&'a str> {
        let found = match self.format {
            PayloadFormat::Bracket => output.find('[').map(|idx| &output[idx..]),
            // Last match wins so a re-emitted payload supersedes earlier ones.
            PayloadFormat::Sentinel => output
                .lines()
                .rev()
                .find_map(|line| line.strip_prefix(self.sentinel.as_str())),
        };
        found.ok_or(HarnessError::NoPayload {
            format: self.format,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: String,
    duration: f64,
}

/// Decoded payload of one trial.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedTrial {
    /// Measurement name to duration in seconds.
    pub measurements: BTreeMap<String, f64>,
    /// Size the executable reported via [`ITEM_COUNT`], if it did.
    pub item_count: Option<u64>,
}

pub fn parse_output(output: &str, locator: &PayloadLocator) -> Result<ParsedTrial> {
    let payload = locator.locate(output)?;
    let entries: Vec<RawEntry> = serde_json::from_str(payload)?;

    let mut parsed = ParsedTrial::default();
    for entry in entries {
        if entry.name == ITEM_COUNT {
            if parsed.item_count.is_some() {
                return Err(HarnessError::DuplicateMeasurement { name: entry.name });
            }
            parsed.item_count = Some(size_from_duration_field(entry.duration));
            continue;
        }
        match parsed.measurements.entry(entry.name) {
            Entry::Occupied(slot) => {
                return Err(HarnessError::DuplicateMeasurement {
                    name: slot.key().clone(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(entry.duration);
            }
        }
    }
    Ok(parsed)
}

// Sizes travel through the `duration` field as doubles, often in exponent
// form (`1e+07`).
fn size_from_duration_field(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}
