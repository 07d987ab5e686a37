// Snapshot aggregator: owns the resolved disks, network state, GPU manager and
// container source, and assembles one CombinedSnapshot per request.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::config::{AgentConfig, MemoryCalc};
use crate::disk_resolver::{self, ResolvedDisks};
use crate::docker_repo::ContainerStatsSource;
use crate::gpu::GpuManager;
use crate::models::{
    CombinedSnapshot, FilesystemStat, HostReading, NetworkIoState, SystemInfo, SystemStats,
};
use crate::network_accountant;
use crate::sensors;
use crate::sysinfo_repo::HostProbe;
use crate::units::{bytes_to_gigabytes, bytes_to_megabytes, percent, two_decimals};

/// Collaborators the agent reads from. GPU and container sources are optional.
pub struct AgentDeps {
    pub probe: Arc<dyn HostProbe>,
    pub containers: Option<Arc<dyn ContainerStatsSource>>,
    pub gpu: Option<GpuManager>,
}

/// Counter baselines advanced on every gather.
struct CounterState {
    disks: ResolvedDisks,
    network: NetworkIoState,
}

/// Per-poll options fixed at startup.
#[derive(Debug, Clone, Default)]
struct SampleSettings {
    sensors: Option<BTreeSet<String>>,
    memory_calc: MemoryCalc,
}

pub struct Agent {
    probe: Arc<dyn HostProbe>,
    info: SystemInfo,
    counters: Arc<Mutex<CounterState>>,
    settings: Arc<SampleSettings>,
    containers: Option<Arc<dyn ContainerStatsSource>>,
    gpu: Option<GpuManager>,
}

/// Result of the blocking OS half of a gather.
#[derive(Default)]
struct HostSample {
    stats: SystemStats,
    extra_fs: BTreeMap<String, FilesystemStat>,
    uptime_secs: u64,
}

impl Agent {
    /// Resolves disks and network interfaces from the OS. Blocking.
    pub fn new(deps: AgentDeps, config: &AgentConfig) -> Self {
        let AgentDeps {
            probe,
            containers,
            gpu,
        } = deps;

        let info = probe.system_info().unwrap_or_else(|e| {
            warn!(error = %e, operation = "system_info", "system info failed");
            SystemInfo {
                agent_version: crate::version::VERSION.to_string(),
                ..Default::default()
            }
        });
        let disks = disk_resolver::initialize(probe.as_ref(), &config.filesystems);
        let network = network_accountant::initialize(probe.as_ref(), &config.network);
        let settings = SampleSettings {
            sensors: config.sensors.allow.clone(),
            memory_calc: config.memory.calc,
        };

        Self {
            probe,
            info,
            counters: Arc::new(Mutex::new(CounterState { disks, network })),
            settings: Arc::new(settings),
            containers,
            gpu,
        }
    }

    /// Static host identity as resolved at startup.
    pub fn system_info(&self) -> &SystemInfo {
        &self.info
    }

    /// Copy of every tracked filesystem keyed by I/O key.
    pub fn filesystems(&self) -> BTreeMap<String, FilesystemStat> {
        let state = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        state.disks.filesystems.clone()
    }

    /// Interfaces counted toward network bandwidth.
    pub fn network_interfaces(&self) -> BTreeSet<String> {
        let state = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        state.network.interfaces.clone()
    }

    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    /// Produces one snapshot and advances every rate baseline. Never fails:
    /// subsystem errors are logged and leave their part of the snapshot empty.
    #[instrument(skip(self), fields(operation = "gather_stats"))]
    pub async fn gather_stats(&self) -> CombinedSnapshot {
        let probe = self.probe.clone();
        let counters = self.counters.clone();
        let settings = self.settings.clone();
        let host = tokio::task::spawn_blocking(move || {
            let mut state = counters.lock().unwrap_or_else(PoisonError::into_inner);
            sample_host(probe.as_ref(), &mut state, &settings, Instant::now())
        })
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, operation = "sample_host", "host sampling task failed");
            HostSample::default()
        });

        let HostSample {
            mut stats,
            extra_fs,
            uptime_secs,
        } = host;

        let containers = match &self.containers {
            Some(source) => match source.container_stats().await {
                Ok(c) => c.into_iter().collect(),
                Err(e) => {
                    debug!(error = %e, "container stats unavailable");
                    BTreeMap::new()
                }
            },
            None => BTreeMap::new(),
        };

        stats.gpus = self
            .gpu
            .as_ref()
            .map(GpuManager::current_data)
            .unwrap_or_default();

        stats.extra_fs = extra_fs;

        let info = SystemInfo {
            uptime_secs,
            cpu_percent: stats.cpu_percent,
            mem_percent: stats.mem_percent,
            disk_percent: stats.disk_percent,
            ..self.info.clone()
        };
        debug!(
            containers = containers.len(),
            gpus = stats.gpus.len(),
            extra_fs = stats.extra_fs.len(),
            "stats gathered"
        );
        CombinedSnapshot {
            info,
            stats,
            containers,
        }
    }
}

/// Reads the OS counters, computes rates against `state` and advances it.
fn sample_host(
    probe: &dyn HostProbe,
    state: &mut CounterState,
    settings: &SampleSettings,
    now: Instant,
) -> HostSample {
    let reading = probe.host_reading().unwrap_or_else(|e| {
        warn!(error = %e, operation = "host_reading", "CPU/memory reading failed");
        HostReading::default()
    });
    let mut stats = memory_stats(&reading, settings.memory_calc);

    match probe.disk_io_counters() {
        Ok(io) => {
            for key in &state.disks.io_tracked {
                let Some(fs) = state.disks.filesystems.get_mut(key) else {
                    continue;
                };
                match io.get(key) {
                    Some(counter) => {
                        fs.record_io(counter.read_bytes, counter.write_bytes, now);
                    }
                    None => clear_io_rates(fs),
                }
            }
        }
        Err(e) => {
            warn!(error = %e, operation = "disk_io_counters", "disk I/O counters failed");
            state.disks.filesystems.values_mut().for_each(clear_io_rates);
        }
    }

    for fs in state.disks.filesystems.values_mut() {
        match probe.disk_usage(&fs.mountpoint) {
            Ok(usage) => {
                fs.disk_total_gb = two_decimals(bytes_to_gigabytes(usage.total as f64));
                fs.disk_used_gb = two_decimals(bytes_to_gigabytes(usage.used as f64));
            }
            Err(e) => {
                debug!(mountpoint = %fs.mountpoint, error = %e, "disk usage failed");
            }
        }
    }

    if let Some((_, root)) = state.disks.root() {
        stats.disk_total_gb = root.disk_total_gb;
        stats.disk_used_gb = root.disk_used_gb;
        stats.disk_percent = two_decimals(percent(root.disk_used_gb, root.disk_total_gb));
        stats.disk_read_ps = root.disk_read_ps;
        stats.disk_write_ps = root.disk_write_ps;
    }

    match probe.net_io_counters() {
        Ok(counters) => {
            let rates = state.network.record(&counters, now);
            stats.net_sent_ps = two_decimals(bytes_to_megabytes(rates.sent_bytes_per_sec));
            stats.net_recv_ps = two_decimals(bytes_to_megabytes(rates.recv_bytes_per_sec));
        }
        Err(e) => warn!(error = %e, operation = "net_io_counters", "network counters failed"),
    }

    match probe.components() {
        Ok(components) => {
            stats.temperatures =
                sensors::select_temperatures(&components, settings.sensors.as_ref());
        }
        Err(e) => debug!(error = %e, operation = "components", "temperature sensors failed"),
    }

    let extra_fs = state
        .disks
        .filesystems
        .iter()
        .filter(|(_, fs)| !fs.is_root && fs.disk_total_gb > 0.0)
        .map(|(name, fs)| (name.clone(), fs.clone()))
        .collect();

    HostSample {
        stats,
        extra_fs,
        uptime_secs: reading.uptime_secs,
    }
}

/// No rate for this interval; the stored counters stay as the baseline.
fn clear_io_rates(fs: &mut FilesystemStat) {
    fs.disk_read_ps = 0.0;
    fs.disk_write_ps = 0.0;
}

fn memory_stats(reading: &HostReading, calc: MemoryCalc) -> SystemStats {
    let gb = |bytes: u64| two_decimals(bytes_to_gigabytes(bytes as f64));
    let used = match calc {
        MemoryCalc::Available => reading.mem_used,
        MemoryCalc::Htop => reading
            .mem_total
            .saturating_sub(reading.mem_free)
            .saturating_sub(reading.mem_buff_cache),
    }
    .saturating_sub(reading.zfs_arc);
    SystemStats {
        cpu_percent: two_decimals(reading.cpu_percent),
        mem_total_gb: gb(reading.mem_total),
        mem_used_gb: gb(used),
        mem_percent: two_decimals(percent(used as f64, reading.mem_total as f64)),
        mem_buff_cache_gb: gb(reading.mem_buff_cache),
        swap_total_gb: gb(reading.swap_total),
        swap_used_gb: gb(reading.swap_used),
        ..Default::default()
    }
}
