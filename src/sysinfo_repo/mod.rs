// Host probing: the OS queries the resolver, accountant and aggregator depend on.

mod linux;

use crate::models::{HostReading, NetIoCounter, SystemInfo};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use sysinfo::{Components, Disks, Networks, System};
use tracing::instrument;

/// A mounted partition as the OS lists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub device: String,
    pub mountpoint: String,
    pub fs_type: String,
}

impl Partition {
    pub fn new(device: impl Into<String>, mountpoint: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            mountpoint: mountpoint.into(),
            fs_type: String::new(),
        }
    }
}

/// Cumulative block I/O counters for one low-level device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskIoCounter {
    pub name: String,
    /// Alternate name (e.g. device-mapper name) accepted for exact matches.
    pub label: Option<String>,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

impl DiskIoCounter {
    pub fn new(name: impl Into<String>, read_bytes: u64, write_bytes: u64) -> Self {
        Self {
            name: name.into(),
            label: None,
            read_bytes,
            write_bytes,
        }
    }
}

/// Capacity of a filesystem in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
}

/// One hardware sensor as the OS reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentReading {
    pub label: String,
    /// °C; `None` when the sensor has no current value.
    pub temperature: Option<f32>,
}

impl ComponentReading {
    pub fn new(label: impl Into<String>, temperature: Option<f32>) -> Self {
        Self {
            label: label.into(),
            temperature,
        }
    }
}

/// OS queries used by the agent. All methods may block.
pub trait HostProbe: Send + Sync {
    fn partitions(&self) -> anyhow::Result<Vec<Partition>>;

    /// Block device counters keyed by device name.
    fn disk_io_counters(&self) -> anyhow::Result<HashMap<String, DiskIoCounter>>;

    fn net_io_counters(&self) -> anyhow::Result<Vec<NetIoCounter>>;

    /// Capacity of the filesystem containing `path`.
    fn disk_usage(&self, path: &str) -> anyhow::Result<DiskUsage>;

    /// Names of the directories directly under `path`; empty when unreadable.
    fn list_dirs(&self, path: &str) -> Vec<String>;

    fn host_reading(&self) -> anyhow::Result<HostReading>;

    /// Temperature sensors.
    fn components(&self) -> anyhow::Result<Vec<ComponentReading>>;

    /// Static identity of the host.
    fn system_info(&self) -> anyhow::Result<SystemInfo>;
}

/// [`HostProbe`] backed by sysinfo and procfs.
pub struct SysinfoRepo {
    sys: Mutex<System>,
    networks: Mutex<Networks>,
    components: Mutex<Components>,
    last_cpu_refresh: Mutex<Option<(Instant, f64)>>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        Self {
            sys: Mutex::new(sys),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            components: Mutex::new(Components::new_with_refreshed_list()),
            last_cpu_refresh: Mutex::new(None),
        }
    }

    fn cpu_usage(&self, sys: &mut System) -> f64 {
        let now = Instant::now();
        let Ok(mut guard) = self.last_cpu_refresh.lock() else {
            sys.refresh_cpu_usage();
            return 0.0;
        };
        let last = *guard;
        match last {
            Some((prev_ts, prev_usage))
                if now.duration_since(prev_ts) < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL =>
            {
                // Too soon for a meaningful delta; reuse the last value.
                prev_usage
            }
            Some(_) => {
                sys.refresh_cpu_usage();
                let usage = (sys.global_cpu_usage() as f64).clamp(0.0, 100.0);
                *guard = Some((now, usage));
                usage
            }
            None => {
                // First call establishes the baseline.
                sys.refresh_cpu_usage();
                *guard = Some((now, 0.0));
                0.0
            }
        }
    }
}

impl HostProbe for SysinfoRepo {
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "partitions"))]
    fn partitions(&self) -> anyhow::Result<Vec<Partition>> {
        let disks = Disks::new_with_refreshed_list();
        Ok(disks
            .list()
            .iter()
            .map(|d| Partition {
                device: d.name().to_string_lossy().into_owned(),
                mountpoint: d.mount_point().to_string_lossy().into_owned(),
                fs_type: d.file_system().to_string_lossy().into_owned(),
            })
            .collect())
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "disk_io_counters"))]
    fn disk_io_counters(&self) -> anyhow::Result<HashMap<String, DiskIoCounter>> {
        linux::read_diskstats()
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "net_io_counters"))]
    fn net_io_counters(&self) -> anyhow::Result<Vec<NetIoCounter>> {
        let mut networks = self
            .networks
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo networks lock poisoned: {}", e))?;
        networks.refresh(true);
        Ok(networks
            .list()
            .iter()
            .map(|(name, data)| {
                NetIoCounter::new(name.clone(), data.total_transmitted(), data.total_received())
            })
            .collect())
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "disk_usage"))]
    fn disk_usage(&self, path: &str) -> anyhow::Result<DiskUsage> {
        statvfs_usage(path)
    }

    fn list_dirs(&self, path: &str) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(path) else {
            return Vec::new();
        };
        let mut dirs: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        dirs.sort();
        dirs
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "host_reading"))]
    fn host_reading(&self) -> anyhow::Result<HostReading> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
        let cpu_percent = self.cpu_usage(&mut sys);
        sys.refresh_memory();

        let mem_total = sys.total_memory();
        let available = sys.available_memory();
        let mem_used = mem_total.saturating_sub(available);
        let mem_buff_cache = linux::read_buff_cache_linux()
            .unwrap_or_else(|| available.saturating_sub(sys.free_memory()));

        Ok(HostReading {
            cpu_percent,
            mem_total,
            mem_used,
            mem_buff_cache,
            mem_free: sys.free_memory(),
            zfs_arc: linux::read_zfs_arc_linux().unwrap_or(0),
            swap_total: sys.total_swap(),
            swap_used: sys.used_swap(),
            uptime_secs: System::uptime(),
        })
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "components"))]
    fn components(&self) -> anyhow::Result<Vec<ComponentReading>> {
        let mut components = self
            .components
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo components lock poisoned: {}", e))?;
        components.refresh(true);
        Ok(components
            .list()
            .iter()
            .map(|c| ComponentReading::new(c.label(), c.temperature()))
            .collect())
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "system_info"))]
    fn system_info(&self) -> anyhow::Result<SystemInfo> {
        let sys = self
            .sys
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
        let cpu_model = linux::read_cpu_model_linux()
            .or_else(|| {
                sys.cpus()
                    .first()
                    .map(|c| c.brand().trim().to_string())
                    .filter(|s| !s.is_empty() && s != "cpu0")
            })
            .unwrap_or_else(|| "Unknown".into());
        Ok(SystemInfo {
            hostname: System::host_name().unwrap_or_default(),
            kernel_version: System::kernel_version().unwrap_or_default(),
            cpu_model,
            cores: System::physical_core_count().unwrap_or(0) as u32,
            threads: sys.cpus().len() as u32,
            agent_version: crate::version::VERSION.to_string(),
            uptime_secs: System::uptime(),
            ..Default::default()
        })
    }
}

#[cfg(unix)]
fn statvfs_usage(path: &str) -> anyhow::Result<DiskUsage> {
    let st = nix::sys::statvfs::statvfs(path)
        .map_err(|e| anyhow::anyhow!("statvfs {}: {}", path, e))?;
    let fragment = st.fragment_size() as u64;
    let total = (st.blocks() as u64).saturating_mul(fragment);
    let free = (st.blocks_free() as u64).saturating_mul(fragment);
    Ok(DiskUsage {
        total,
        used: total.saturating_sub(free),
    })
}

#[cfg(not(unix))]
fn statvfs_usage(path: &str) -> anyhow::Result<DiskUsage> {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new(path))
        .ok_or_else(|| anyhow::anyhow!("no filesystem mounted at {}", path))?;
    Ok(DiskUsage {
        total: disk.total_space(),
        used: disk.total_space().saturating_sub(disk.available_space()),
    })
}
