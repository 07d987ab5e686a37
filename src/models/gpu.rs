// GPU models

use serde::{Deserialize, Serialize};

/// Running sums for one GPU since the last drain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuAccumulator {
    pub name: String,
    pub temperature: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    pub usage_sum: f64,
    pub power_sum: f64,
    pub count: u32,
}

impl GpuAccumulator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Applies one parsed sample: instantaneous fields overwrite, usage/power accumulate.
    pub fn add_sample(&mut self, sample: &GpuSample) {
        self.temperature = sample.temperature;
        self.memory_used = sample.memory_used;
        self.memory_total = sample.memory_total;
        self.usage_sum += sample.usage;
        self.power_sum += sample.power;
        self.count += 1;
    }
}

/// One parsed vendor-tool sample, already converted to MB / percent / watts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpuSample {
    pub temperature: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    pub usage: f64,
    pub power: f64,
}

/// Averaged GPU reading handed out by a drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuData {
    pub name: String,
    pub temperature: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    pub usage: f64,
    pub power: f64,
}
