// Docker container models

use serde::{Deserialize, Serialize};

/// Per-container reading for one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStat {
    pub name: String,
    /// Share of host CPU time, percent.
    pub cpu: f64,
    /// Memory in use minus reclaimable page cache, MB.
    pub memory: f64,
    /// Bytes per second sent over the last interval.
    pub network_sent: f64,
    /// Bytes per second received over the last interval.
    pub network_recv: f64,
}
