// Vendor tool output parsers.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::GpuSample;
use crate::units::bytes_to_megabytes;

/// One GPU reading extracted from a vendor tool line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGpu {
    pub id: String,
    pub name: String,
    pub sample: GpuSample,
}

/// Parses one `nvidia-smi --format=csv,noheader,nounits` line:
/// `index, name, temperature, memory.used, memory.total, utilization, power.draw`.
///
/// Returns `None` when the line has fewer than seven fields. Unparseable numbers
/// (e.g. `[N/A]` power on some cards) read as 0.
pub fn parse_nvidia_line(line: &str) -> Option<ParsedGpu> {
    let fields: Vec<&str> = line.trim().split(", ").collect();
    if fields.len() < 7 {
        return None;
    }
    let name = fields[1].trim();
    let name = name.strip_prefix("NVIDIA ").unwrap_or(name);
    let name = name.strip_suffix(" Laptop GPU").unwrap_or(name);
    Some(ParsedGpu {
        id: fields[0].trim().to_string(),
        name: name.to_string(),
        sample: GpuSample {
            temperature: parse_f64(fields[2]),
            // nvidia-smi reports MiB
            memory_used: parse_f64(fields[3]) / 1.024,
            memory_total: parse_f64(fields[4]) / 1.024,
            usage: parse_f64(fields[5]),
            power: parse_f64(fields[6]),
        },
    })
}

#[derive(Debug, Default, Deserialize)]
struct RocmSmiCard {
    #[serde(rename = "GUID")]
    guid: Option<Value>,
    #[serde(rename = "Card series")]
    name: Option<Value>,
    #[serde(rename = "Temperature (Sensor edge) (C)")]
    temperature: Option<Value>,
    #[serde(rename = "VRAM Total Used Memory (B)")]
    memory_used: Option<Value>,
    #[serde(rename = "VRAM Total Memory (B)")]
    memory_total: Option<Value>,
    #[serde(rename = "GPU use (%)")]
    usage: Option<Value>,
    #[serde(
        rename = "Current Socket Graphics Package Power (W)",
        alias = "Average Graphics Package Power (W)"
    )]
    power: Option<Value>,
}

impl RocmSmiCard {
    fn is_gpu(&self) -> bool {
        self.name.is_some() || self.usage.is_some() || self.memory_total.is_some()
    }
}

/// Parses one `rocm-smi --json` object (one line per interval), keyed by card.
///
/// The GPU id is the card GUID, falling back to the card key. Returns an empty list
/// for anything that is not a JSON object with at least one GPU entry.
pub fn parse_rocm_line(line: &str) -> Vec<ParsedGpu> {
    let Ok(cards) = serde_json::from_str::<BTreeMap<String, Value>>(line.trim()) else {
        return Vec::new();
    };
    cards
        .into_iter()
        .filter_map(|(key, value)| {
            let card: RocmSmiCard = serde_json::from_value(value).ok()?;
            if !card.is_gpu() {
                return None;
            }
            let id = value_string(card.guid.as_ref()).unwrap_or(key);
            Some(ParsedGpu {
                id,
                name: value_string(card.name.as_ref()).unwrap_or_default(),
                sample: GpuSample {
                    temperature: value_f64(card.temperature.as_ref()),
                    memory_used: bytes_to_megabytes(value_f64(card.memory_used.as_ref())),
                    memory_total: bytes_to_megabytes(value_f64(card.memory_total.as_ref())),
                    usage: value_f64(card.usage.as_ref()),
                    power: value_f64(card.power.as_ref()),
                },
            })
        })
        .collect()
}

fn parse_f64(s: &str) -> f64 {
    s.trim().parse().unwrap_or(0.0)
}

fn value_f64(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::String(s)) => parse_f64(s),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn value_string(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
