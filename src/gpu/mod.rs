// GPU monitoring through vendor command-line tools (nvidia-smi, rocm-smi).

mod collector;
pub mod parse;

pub use collector::{
    CollectError, CollectorState, CommandRunner, CommandSpec, GpuCollector, LineStream,
    TokioCommandRunner, next_state,
};

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::GpuConfig;
use crate::models::{GpuAccumulator, GpuData};
use crate::units::two_decimals;
use parse::{ParsedGpu, parse_nvidia_line, parse_rocm_line};

const NVIDIA_QUERY: &str = "--query-gpu=index,name,temperature.gpu,memory.used,memory.total,utilization.gpu,power.draw";

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no GPU found - install nvidia-smi or rocm-smi")]
    NoTools,
}

/// Supported vendor tools. The variant fixes both the command and the output parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
}

impl GpuVendor {
    pub const ALL: [GpuVendor; 2] = [GpuVendor::Nvidia, GpuVendor::Amd];

    /// Program invoked to detect the tool.
    pub fn tool(self) -> &'static str {
        match self {
            GpuVendor::Nvidia => "nvidia-smi",
            GpuVendor::Amd => "rocm-smi",
        }
    }

    /// Streaming command printing one sample per `interval`.
    pub fn command(self, interval: Duration) -> CommandSpec {
        let secs = interval.as_secs().max(1);
        match self {
            GpuVendor::Nvidia => CommandSpec::new(
                "nvidia-smi",
                [
                    "-l".to_string(),
                    secs.to_string(),
                    NVIDIA_QUERY.to_string(),
                    "--format=csv,noheader,nounits".to_string(),
                ],
            ),
            GpuVendor::Amd => CommandSpec::new(
                "/bin/sh",
                [
                    "-c".to_string(),
                    format!(
                        "while true; do rocm-smi --showid --showtemp --showuse --showpower \
                         --showproductname --showmeminfo vram --json; sleep {}; done",
                        secs
                    ),
                ],
            ),
        }
    }

    fn parse(self, line: &[u8]) -> Vec<ParsedGpu> {
        let line = String::from_utf8_lossy(line);
        match self {
            GpuVendor::Nvidia => parse_nvidia_line(&line).into_iter().collect(),
            GpuVendor::Amd => parse_rocm_line(&line),
        }
    }
}

/// Accumulators for every GPU seen, shared by the collectors and the drain.
#[derive(Debug, Default)]
pub struct GpuStore {
    gpus: Mutex<HashMap<String, GpuAccumulator>>,
}

impl GpuStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one line of `vendor` output and applies it. Returns true when the line
    /// held GPU data. The lock is taken only after parsing.
    pub fn ingest(&self, vendor: GpuVendor, line: &[u8]) -> bool {
        let parsed = vendor.parse(line);
        if parsed.is_empty() {
            return false;
        }
        let mut gpus = self.gpus.lock().unwrap_or_else(PoisonError::into_inner);
        for gpu in parsed {
            gpus.entry(gpu.id)
                .or_insert_with(|| GpuAccumulator::new(gpu.name))
                .add_sample(&gpu.sample);
        }
        true
    }

    /// Averages and resets every accumulator, returning the readings keyed by GPU id.
    ///
    /// After a drain each accumulator holds its averages with a count of 1, so an
    /// interval without new samples reports the previous values again. GPUs sharing a
    /// name get their id appended in the returned copy only.
    pub fn drain(&self) -> BTreeMap<String, GpuData> {
        let mut gpus = self.gpus.lock().unwrap_or_else(PoisonError::into_inner);

        let mut name_counts: HashMap<String, usize> = HashMap::new();
        for gpu in gpus.values() {
            *name_counts.entry(gpu.name.clone()).or_default() += 1;
        }

        let mut out = BTreeMap::new();
        for (id, gpu) in gpus.iter_mut() {
            let count = f64::from(gpu.count.max(1));
            gpu.temperature = two_decimals(gpu.temperature);
            gpu.memory_used = two_decimals(gpu.memory_used);
            gpu.memory_total = two_decimals(gpu.memory_total);
            gpu.usage_sum = two_decimals(gpu.usage_sum / count);
            gpu.power_sum = two_decimals(gpu.power_sum / count);
            gpu.count = 1;

            let name = if name_counts.get(&gpu.name).copied().unwrap_or(0) > 1 {
                format!("{} {}", gpu.name, id)
            } else {
                gpu.name.clone()
            };
            out.insert(
                id.clone(),
                GpuData {
                    name,
                    temperature: gpu.temperature,
                    memory_used: gpu.memory_used,
                    memory_total: gpu.memory_total,
                    usage: gpu.usage_sum,
                    power: gpu.power_sum,
                },
            );
        }
        out
    }

    /// Copy of the raw accumulator for `id`.
    pub fn accumulator(&self, id: &str) -> Option<GpuAccumulator> {
        let gpus = self.gpus.lock().unwrap_or_else(PoisonError::into_inner);
        gpus.get(id).cloned()
    }
}

/// Probes for each vendor tool. Fails only when none is usable.
pub async fn detect(runner: &dyn CommandRunner) -> Result<Vec<GpuVendor>, GpuError> {
    let mut found = Vec::new();
    for vendor in GpuVendor::ALL {
        if runner.probe(vendor.tool()).await {
            found.push(vendor);
        }
    }
    if found.is_empty() {
        return Err(GpuError::NoTools);
    }
    Ok(found)
}

/// Owns the GPU store and one background collector per detected vendor.
pub struct GpuManager {
    store: Arc<GpuStore>,
    vendors: Vec<GpuVendor>,
    collectors: Vec<JoinHandle<CollectorState>>,
}

impl GpuManager {
    /// Detects vendor tools and spawns their collectors on the current runtime.
    pub async fn start(runner: Arc<dyn CommandRunner>, config: &GpuConfig) -> Result<Self, GpuError> {
        let vendors = detect(runner.as_ref()).await?;
        let store = Arc::new(GpuStore::new());
        let interval = Duration::from_secs(config.sample_interval_secs);
        let restart_delay = Duration::from_millis(config.restart_delay_ms);

        let collectors = vendors
            .iter()
            .map(|&vendor| {
                info!(collector = vendor.tool(), "starting GPU collector");
                let collector = GpuCollector::new(
                    vendor,
                    vendor.command(interval),
                    runner.clone(),
                    store.clone(),
                    restart_delay,
                );
                tokio::spawn(collector.run())
            })
            .collect();

        Ok(Self {
            store,
            vendors,
            collectors,
        })
    }

    pub fn vendors(&self) -> &[GpuVendor] {
        &self.vendors
    }

    /// True while at least one collector is still running.
    pub fn is_collecting(&self) -> bool {
        self.collectors.iter().any(|h| !h.is_finished())
    }

    /// Drains the averaged readings accumulated since the previous call.
    pub fn current_data(&self) -> BTreeMap<String, GpuData> {
        self.store.drain()
    }
}

impl Drop for GpuManager {
    fn drop(&mut self) {
        for handle in &self.collectors {
            handle.abort();
        }
    }
}
