// Raw Docker stats → ContainerStat, with per-container delta tracking.

use bollard::models::ContainerStatsResponse;
use std::time::Instant;

use crate::models::ContainerStat;
use crate::units::{bytes_per_second, bytes_to_megabytes, two_decimals};

/// The counters we use from one Docker stats response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawContainerSample {
    pub cpu_total: u64,
    pub system_total: u64,
    pub memory_usage: u64,
    /// Reclaimable page cache counted in `memory_usage`.
    pub memory_cache: u64,
    pub net_sent: u64,
    pub net_recv: u64,
}

impl RawContainerSample {
    pub fn from_response(s: &ContainerStatsResponse) -> Self {
        let cpu = s.cpu_stats.as_ref();
        let cpu_total = cpu
            .and_then(|c| c.cpu_usage.as_ref())
            .and_then(|u| u.total_usage)
            .unwrap_or(0);
        let system_total = cpu.and_then(|c| c.system_cpu_usage).unwrap_or(0);

        let memory = s.memory_stats.as_ref();
        let memory_usage = memory.and_then(|m| m.usage).unwrap_or(0);
        let memory_cache = memory
            .and_then(|m| m.stats.as_ref())
            .map(|stats| {
                // cgroup v2 reports inactive_file; v1 only has cache
                let inactive = stats.get("inactive_file").copied().unwrap_or(0);
                if inactive > 0 {
                    inactive
                } else {
                    stats.get("cache").copied().unwrap_or(0)
                }
            })
            .unwrap_or(0);

        let (net_sent, net_recv) = s.networks.as_ref().map_or((0u64, 0u64), |n| {
            n.values().fold((0u64, 0u64), |(tx, rx), v| {
                (
                    tx.saturating_add(v.tx_bytes.unwrap_or(0)),
                    rx.saturating_add(v.rx_bytes.unwrap_or(0)),
                )
            })
        });

        Self {
            cpu_total,
            system_total,
            memory_usage,
            memory_cache,
            net_sent,
            net_recv,
        }
    }
}

/// Counters kept between polls for one container id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerDelta {
    pub cpu_total: u64,
    pub system_total: u64,
    pub net_sent: u64,
    pub net_recv: u64,
    pub time: Instant,
}

/// Why a sample was not reportable this poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleRejected {
    CpuOutOfRange(f64),
}

/// Computes the container's reading against its previous sample and returns the
/// delta state to keep for the next poll. The state is returned even when the
/// reading itself is rejected.
///
/// Without a previous sample CPU is measured from zero (lifetime average) and
/// network rates are 0.
pub fn compute_stat(
    name: &str,
    prev: Option<&ContainerDelta>,
    sample: &RawContainerSample,
    now: Instant,
) -> (Result<ContainerStat, SampleRejected>, ContainerDelta) {
    let next = ContainerDelta {
        cpu_total: sample.cpu_total,
        system_total: sample.system_total,
        net_sent: sample.net_sent,
        net_recv: sample.net_recv,
        time: now,
    };

    let (prev_cpu, prev_system) = prev.map_or((0, 0), |p| (p.cpu_total, p.system_total));
    let cpu_delta = sample.cpu_total.saturating_sub(prev_cpu);
    let system_delta = sample.system_total.saturating_sub(prev_system);
    let cpu = if system_delta > 0 {
        cpu_delta as f64 / system_delta as f64 * 100.0
    } else {
        0.0
    };
    if cpu > 100.0 {
        return (Err(SampleRejected::CpuOutOfRange(cpu)), next);
    }

    let (network_sent, network_recv) = match prev {
        Some(p) if p.net_sent != 0 || p.net_recv != 0 => {
            let elapsed = now.saturating_duration_since(p.time);
            (
                bytes_per_second(p.net_sent, sample.net_sent, elapsed).unwrap_or(0.0),
                bytes_per_second(p.net_recv, sample.net_recv, elapsed).unwrap_or(0.0),
            )
        }
        _ => (0.0, 0.0),
    };

    let used = sample.memory_usage.saturating_sub(sample.memory_cache);
    let stat = ContainerStat {
        name: name.to_string(),
        cpu: two_decimals(cpu),
        memory: two_decimals(bytes_to_megabytes(used as f64)),
        network_sent: two_decimals(network_sent),
        network_recv: two_decimals(network_recv),
    };
    (Ok(stat), next)
}
