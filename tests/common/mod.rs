// Shared test helpers: scripted host probe, command runner and container source

#![allow(dead_code)]

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream;
use hostagent::docker_repo::{ContainerError, ContainerStatsSource};
use hostagent::gpu::{CommandRunner, CommandSpec, LineStream};
use hostagent::models::*;
use hostagent::sysinfo_repo::{ComponentReading, DiskIoCounter, DiskUsage, HostProbe, Partition};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const GB: u64 = 1024 * 1024 * 1024;

/// Host probe answering from fixed tables. Counters can be changed between polls.
#[derive(Default)]
pub struct FakeProbe {
    pub partitions: Vec<Partition>,
    pub disk_io: Mutex<HashMap<String, DiskIoCounter>>,
    pub net_io: Mutex<Vec<NetIoCounter>>,
    /// Path → capacity; unknown paths fail.
    pub usage: HashMap<String, DiskUsage>,
    pub dirs: HashMap<String, Vec<String>>,
    pub reading: HostReading,
    pub components: Vec<ComponentReading>,
    /// When set, disk counter reads fail.
    pub fail_disk_io: AtomicBool,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition(mut self, device: &str, mountpoint: &str) -> Self {
        self.partitions.push(Partition::new(device, mountpoint));
        self
    }

    pub fn disk(self, name: &str, read: u64, write: u64) -> Self {
        self.disk_io
            .lock()
            .unwrap()
            .insert(name.to_string(), DiskIoCounter::new(name, read, write));
        self
    }

    pub fn nic(self, name: &str, sent: u64, recv: u64) -> Self {
        self.net_io
            .lock()
            .unwrap()
            .push(NetIoCounter::new(name, sent, recv));
        self
    }

    pub fn usage(mut self, path: &str, total: u64, used: u64) -> Self {
        self.usage
            .insert(path.to_string(), DiskUsage { total, used });
        self
    }

    pub fn dir(mut self, path: &str, entries: &[&str]) -> Self {
        self.dirs.insert(
            path.to_string(),
            entries.iter().map(|e| e.to_string()).collect(),
        );
        self
    }

    pub fn reading(mut self, reading: HostReading) -> Self {
        self.reading = reading;
        self
    }

    pub fn sensor(mut self, label: &str, temperature: Option<f32>) -> Self {
        self.components
            .push(ComponentReading::new(label, temperature));
        self
    }

    pub fn set_disk_io_failing(&self, failing: bool) {
        self.fail_disk_io.store(failing, Ordering::SeqCst);
    }

    pub fn set_disk(&self, name: &str, read: u64, write: u64) {
        self.disk_io
            .lock()
            .unwrap()
            .insert(name.to_string(), DiskIoCounter::new(name, read, write));
    }

    pub fn set_nics(&self, counters: Vec<NetIoCounter>) {
        *self.net_io.lock().unwrap() = counters;
    }
}

impl HostProbe for FakeProbe {
    fn partitions(&self) -> anyhow::Result<Vec<Partition>> {
        Ok(self.partitions.clone())
    }

    fn disk_io_counters(&self) -> anyhow::Result<HashMap<String, DiskIoCounter>> {
        anyhow::ensure!(
            !self.fail_disk_io.load(Ordering::SeqCst),
            "diskstats unreadable"
        );
        Ok(self.disk_io.lock().unwrap().clone())
    }

    fn net_io_counters(&self) -> anyhow::Result<Vec<NetIoCounter>> {
        Ok(self.net_io.lock().unwrap().clone())
    }

    fn disk_usage(&self, path: &str) -> anyhow::Result<DiskUsage> {
        self.usage
            .get(path)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no such filesystem: {}", path))
    }

    fn list_dirs(&self, path: &str) -> Vec<String> {
        self.dirs.get(path).cloned().unwrap_or_default()
    }

    fn host_reading(&self) -> anyhow::Result<HostReading> {
        Ok(self.reading)
    }

    fn components(&self) -> anyhow::Result<Vec<ComponentReading>> {
        Ok(self.components.clone())
    }

    fn system_info(&self) -> anyhow::Result<SystemInfo> {
        Ok(SystemInfo {
            hostname: "testhost".into(),
            kernel_version: "6.1.0".into(),
            cpu_model: "Test CPU".into(),
            cores: 4,
            threads: 8,
            agent_version: hostagent::version::VERSION.into(),
            ..Default::default()
        })
    }
}

/// One scripted invocation: either a spawn failure or the lines the command prints.
pub enum Script {
    SpawnError,
    Lines(Vec<io::Result<String>>),
}

impl Script {
    pub fn lines(lines: &[&str]) -> Self {
        Script::Lines(lines.iter().map(|l| Ok(l.to_string())).collect())
    }
}

/// Command runner replaying scripted invocations in order. Once the script is used
/// up every spawn prints nothing.
pub struct FakeRunner {
    available: Vec<String>,
    scripts: Mutex<VecDeque<Script>>,
    spawns: AtomicUsize,
}

impl FakeRunner {
    pub fn new(available: &[&str], scripts: Vec<Script>) -> Self {
        Self {
            available: available.iter().map(|s| s.to_string()).collect(),
            scripts: Mutex::new(scripts.into()),
            spawns: AtomicUsize::new(0),
        }
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

impl CommandRunner for FakeRunner {
    fn probe<'a>(&'a self, program: &'a str) -> BoxFuture<'a, bool> {
        let found = self.available.iter().any(|p| p == program);
        Box::pin(async move { found })
    }

    fn spawn_lines(&self, _command: &CommandSpec) -> io::Result<LineStream> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        match self.scripts.lock().unwrap().pop_front() {
            Some(Script::SpawnError) => Err(io::Error::new(io::ErrorKind::NotFound, "not found")),
            Some(Script::Lines(lines)) => Ok(stream::iter(lines).boxed()),
            None => Ok(stream::empty().boxed()),
        }
    }
}

/// Container source returning a fixed map, or failing when built with `failing()`.
pub struct FakeContainers {
    stats: Option<HashMap<String, ContainerStat>>,
}

impl FakeContainers {
    pub fn with(stats: HashMap<String, ContainerStat>) -> Self {
        Self { stats: Some(stats) }
    }

    pub fn failing() -> Self {
        Self { stats: None }
    }
}

impl ContainerStatsSource for FakeContainers {
    fn container_stats(
        &self,
    ) -> BoxFuture<'_, Result<HashMap<String, ContainerStat>, ContainerError>> {
        let result = self
            .stats
            .clone()
            .ok_or_else(|| ContainerError::Unavailable("daemon not running".into()));
        Box::pin(async move { result })
    }
}

pub fn container(name: &str, cpu: f64) -> ContainerStat {
    ContainerStat {
        name: name.to_string(),
        cpu,
        memory: 64.0,
        network_sent: 0.0,
        network_recv: 0.0,
    }
}
