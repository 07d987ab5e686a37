// Startup-time mapping of partitions/mountpoints to I/O counter keys.
//
// Root resolution falls back to "the busiest unclaimed device" when no counter
// matches the root device by name. That guess can pick a busy secondary disk over an
// idle root disk; it is kept because there is no better signal in /proc/diskstats.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::FilesystemConfig;
use crate::models::FilesystemStat;
use crate::sysinfo_repo::{DiskIoCounter, HostProbe, Partition};

/// Mountpoint Docker bind-mounts from the host root filesystem.
const CONTAINER_ROOT_MOUNT: &str = "/etc/hosts";

/// Result of disk resolution: every registered filesystem, and the keys that
/// resolved to a live counter and therefore get I/O rates.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDisks {
    pub filesystems: BTreeMap<String, FilesystemStat>,
    pub io_tracked: BTreeSet<String>,
}

impl ResolvedDisks {
    pub fn root(&self) -> Option<(&String, &FilesystemStat)> {
        self.filesystems.iter().find(|(_, fs)| fs.is_root)
    }
}

/// Probes the OS and resolves the filesystems to monitor.
pub fn initialize(probe: &dyn HostProbe, config: &FilesystemConfig) -> ResolvedDisks {
    let partitions = probe.partitions().unwrap_or_else(|e| {
        warn!(error = %e, operation = "partitions", "listing partitions failed");
        Vec::new()
    });
    debug!(?partitions, "disk partitions");
    let counters = probe.disk_io_counters().unwrap_or_else(|e| {
        warn!(error = %e, operation = "disk_io_counters", "reading disk I/O counters failed");
        HashMap::new()
    });
    debug!(devices = counters.len(), "disk I/O counters");

    resolve(probe, config, &partitions, &counters, Instant::now())
}

/// Resolution over already-probed partitions and counters.
pub fn resolve(
    probe: &dyn HostProbe,
    config: &FilesystemConfig,
    partitions: &[Partition],
    counters: &HashMap<String, DiskIoCounter>,
    now: Instant,
) -> ResolvedDisks {
    let hint = config.root.as_deref().unwrap_or("");
    let mut resolver = Resolver {
        counters,
        hint,
        filesystems: BTreeMap::new(),
    };
    let mut has_root = false;

    if !hint.is_empty() {
        match partitions.iter().find(|p| partition_matches(p, hint)) {
            Some(p) => {
                resolver.add(&p.device, &p.mountpoint, true);
                has_root = true;
            }
            None => warn!(filesystem = hint, "root filesystem partition not found"),
        }
    }

    for fs in &config.extra {
        if let Some(p) = partitions.iter().find(|p| partition_matches(p, fs)) {
            resolver.add(&p.device, &p.mountpoint, false);
            continue;
        }
        // Not a listed partition: accept it if the path can be queried directly.
        match probe.disk_usage(fs) {
            Ok(_) => resolver.add(base_name(fs), fs, false),
            Err(e) => warn!(name = %fs, error = %e, "invalid filesystem"),
        }
    }

    let extra_dir = config.extra_dir.as_str();
    for p in partitions {
        let root_candidate = p.mountpoint == "/"
            || (p.mountpoint == CONTAINER_ROOT_MOUNT && p.device.starts_with("/dev"));
        if !has_root && root_candidate {
            let (key, exact) =
                find_io_device(base_name(&p.device), counters, &resolver.filesystems);
            if exact {
                resolver.add(&key, &p.mountpoint, true);
                has_root = true;
            }
        }
        if is_under(&p.mountpoint, extra_dir) {
            resolver.add(&p.device, &p.mountpoint, false);
        }
    }

    let mounted: BTreeSet<String> = resolver
        .filesystems
        .values()
        .map(|fs| fs.mountpoint.clone())
        .collect();
    for folder in probe.list_dirs(extra_dir) {
        let mountpoint = Path::new(extra_dir)
            .join(&folder)
            .to_string_lossy()
            .into_owned();
        debug!(mountpoint = %mountpoint, "extra filesystem directory");
        if !mounted.contains(&mountpoint) {
            resolver.add(&folder, &mountpoint, false);
        }
    }

    if !has_root {
        let (key, _) = find_io_device(base_name(hint), counters, &resolver.filesystems);
        info!(mountpoint = "/", io = %key, "root disk");
        resolver.register_root(key, "/");
    }

    seed_counters(resolver.filesystems, counters, now)
}

/// Returns the counter key matching `filesystem` by name or label, or else the
/// unclaimed device with the most bytes read. The flag is true only for a name or
/// label match. With no usable counters the key is `/`.
pub fn find_io_device(
    filesystem: &str,
    counters: &HashMap<String, DiskIoCounter>,
    claimed: &BTreeMap<String, FilesystemStat>,
) -> (String, bool) {
    let mut names: Vec<&String> = counters.keys().collect();
    names.sort();

    let mut max_read = 0u64;
    let mut max_device = "/".to_string();
    for name in names {
        let d = &counters[name];
        if d.name == filesystem || d.label.as_deref().is_some_and(|l| l == filesystem) {
            return (d.name.clone(), true);
        }
        if d.read_bytes > max_read && !claimed.contains_key(&d.name) {
            max_read = d.read_bytes;
            max_device = d.name.clone();
        }
    }
    (max_device, false)
}

struct Resolver<'a> {
    counters: &'a HashMap<String, DiskIoCounter>,
    hint: &'a str,
    filesystems: BTreeMap<String, FilesystemStat>,
}

impl Resolver<'_> {
    /// Registers a filesystem unless its key is already taken.
    fn add(&mut self, device: &str, mountpoint: &str, root: bool) {
        let mut key = base_name(device).to_string();
        if root {
            info!(name = %key, "detected root device");
            if !self.counters.contains_key(&key) {
                let (fallback, exact) = find_io_device(self.hint, self.counters, &self.filesystems);
                if !exact {
                    info!(device, mountpoint, fallback = %fallback, "using I/O fallback");
                }
                key = fallback;
            }
            self.register_root(key, mountpoint);
            return;
        }
        if self.filesystems.contains_key(&key) {
            return;
        }
        if !self.counters.contains_key(&key) {
            let mount_base = base_name(mountpoint);
            if self.counters.contains_key(mount_base) {
                key = mount_base.to_string();
            }
        }
        if self.filesystems.contains_key(&key) {
            return;
        }
        self.filesystems
            .insert(key.clone(), FilesystemStat::new(key, mountpoint, false));
    }

    /// Registers `key` as the root, promoting an existing entry instead of adding a
    /// second one. A promoted entry takes the root mountpoint.
    fn register_root(&mut self, key: String, mountpoint: &str) {
        for fs in self.filesystems.values_mut() {
            fs.is_root = false;
        }
        match self.filesystems.get_mut(&key) {
            Some(existing) => {
                existing.is_root = true;
                existing.mountpoint = mountpoint.to_string();
            }
            None => {
                self.filesystems
                    .insert(key.clone(), FilesystemStat::new(key, mountpoint, true));
            }
        }
    }
}

fn seed_counters(
    mut filesystems: BTreeMap<String, FilesystemStat>,
    counters: &HashMap<String, DiskIoCounter>,
    now: Instant,
) -> ResolvedDisks {
    let mut io_tracked = BTreeSet::new();
    for (key, fs) in filesystems.iter_mut() {
        let Some(d) = counters.get(key) else {
            warn!(name = %key, "device not found in disk I/O counters");
            continue;
        };
        fs.seed_io(d.read_bytes, d.write_bytes, now);
        io_tracked.insert(key.clone());
    }
    ResolvedDisks {
        filesystems,
        io_tracked,
    }
}

fn partition_matches(p: &Partition, name: &str) -> bool {
    p.device.ends_with(name) || p.mountpoint == name
}

fn is_under(mountpoint: &str, dir: &str) -> bool {
    mountpoint.starts_with(dir)
}

fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "" } else { "/" };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
