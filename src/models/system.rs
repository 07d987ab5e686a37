// System identity, per-poll stats and the combined snapshot

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ContainerStat, FilesystemStat, GpuData};

/// General host information. Identity fields are fetched once at startup; the
/// percentages and uptime are refreshed on every poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub hostname: String,
    pub kernel_version: String,
    pub cpu_model: String,
    pub cores: u32,
    pub threads: u32,
    pub agent_version: String,
    pub uptime_secs: u64,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub disk_percent: f64,
}

/// CPU / memory / swap reading taken straight from the OS.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostReading {
    pub cpu_percent: f64,
    pub mem_total: u64,
    pub mem_used: u64,
    pub mem_buff_cache: u64,
    pub mem_free: u64,
    /// ZFS ARC size; counted as used by the kernel but reclaimable. 0 without ZFS.
    pub zfs_arc: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub uptime_secs: u64,
}

/// Resource usage for one snapshot. Sizes in GB, rates in MB/s, two decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub cpu_percent: f64,
    pub mem_total_gb: f64,
    pub mem_used_gb: f64,
    pub mem_percent: f64,
    pub mem_buff_cache_gb: f64,
    pub swap_total_gb: f64,
    pub swap_used_gb: f64,
    pub disk_total_gb: f64,
    pub disk_used_gb: f64,
    pub disk_percent: f64,
    pub disk_read_ps: f64,
    pub disk_write_ps: f64,
    pub net_sent_ps: f64,
    pub net_recv_ps: f64,
    /// Sensor label → °C.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub temperatures: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gpus: BTreeMap<String, GpuData>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_fs: BTreeMap<String, FilesystemStat>,
}

/// Everything the collector receives for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedSnapshot {
    pub info: SystemInfo,
    pub stats: SystemStats,
    #[serde(default)]
    pub containers: BTreeMap<String, ContainerStat>,
}
