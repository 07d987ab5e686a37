// Filesystem models

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::units::{bytes_per_second, bytes_to_megabytes, two_decimals};

/// Disk rates above this (MB/s) are treated as a counter reset, not a reading.
pub const MAX_DISK_MB_PER_SEC: f64 = 50_000.0;

/// One monitored filesystem, keyed in the agent by its I/O counter key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemStat {
    #[serde(skip)]
    pub is_root: bool,
    pub mountpoint: String,
    /// Key under which the OS exposes I/O counters for this filesystem.
    #[serde(skip)]
    pub io_key: String,
    #[serde(skip)]
    pub last_sample: Option<Instant>,
    #[serde(skip)]
    pub total_read: u64,
    #[serde(skip)]
    pub total_write: u64,
    pub disk_total_gb: f64,
    pub disk_used_gb: f64,
    /// MB/s read over the last interval.
    pub disk_read_ps: f64,
    /// MB/s written over the last interval.
    pub disk_write_ps: f64,
}

/// Read/write rates in bytes per second for one interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IoRates {
    pub read_bytes_per_sec: f64,
    pub write_bytes_per_sec: f64,
}

impl FilesystemStat {
    pub fn new(io_key: impl Into<String>, mountpoint: impl Into<String>, is_root: bool) -> Self {
        Self {
            is_root,
            mountpoint: mountpoint.into(),
            io_key: io_key.into(),
            ..Default::default()
        }
    }

    /// Stores the first counter sample without producing a rate.
    pub fn seed_io(&mut self, read: u64, write: u64, now: Instant) {
        self.total_read = read;
        self.total_write = write;
        self.last_sample = Some(now);
    }

    /// Records a new counter sample and returns the rates since the previous one.
    ///
    /// The stored counters are always replaced by the new sample. A counter that went
    /// backwards, or a rate above [`MAX_DISK_MB_PER_SEC`], reports zero for that
    /// interval.
    pub fn record_io(&mut self, read: u64, write: u64, now: Instant) -> IoRates {
        let Some(prev) = self.last_sample else {
            self.seed_io(read, write, now);
            return IoRates::default();
        };
        let elapsed = now.saturating_duration_since(prev);
        let read_rate = bytes_per_second(self.total_read, read, elapsed);
        let write_rate = bytes_per_second(self.total_write, write, elapsed);
        self.seed_io(read, write, now);

        let rates = match (read_rate, write_rate) {
            (Some(r), Some(w))
                if bytes_to_megabytes(r) <= MAX_DISK_MB_PER_SEC
                    && bytes_to_megabytes(w) <= MAX_DISK_MB_PER_SEC =>
            {
                IoRates {
                    read_bytes_per_sec: r,
                    write_bytes_per_sec: w,
                }
            }
            _ => {
                tracing::debug!(device = %self.io_key, "disk counters reset, re-baselining");
                IoRates::default()
            }
        };
        self.disk_read_ps = two_decimals(bytes_to_megabytes(rates.read_bytes_per_sec));
        self.disk_write_ps = two_decimals(bytes_to_megabytes(rates.write_bytes_per_sec));
        rates
    }
}
