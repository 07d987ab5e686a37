// Docker container stats via bollard

pub mod stats;

use crate::models::ContainerStat;
use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, StatsOptions};
use futures_util::StreamExt;
use futures_util::future::{BoxFuture, join_all};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use stats::{ContainerDelta, RawContainerSample, SampleRejected, compute_stat};

/// Length of the short container id used as the snapshot key.
const SHORT_ID_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("listing containers failed: {0}")]
    List(#[source] bollard::errors::Error),
    #[error("container source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies per-container readings to the snapshot aggregator.
pub trait ContainerStatsSource: Send + Sync {
    /// Readings for every running container, keyed by container id.
    fn container_stats(&self) -> BoxFuture<'_, Result<HashMap<String, ContainerStat>, ContainerError>>;
}

pub struct DockerRepo {
    docker: Docker,
    deltas: Mutex<HashMap<String, ContainerDelta>>,
}

impl DockerRepo {
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker,
            deltas: Mutex::new(HashMap::new()),
        })
    }

    async fn list_running(&self) -> Result<Vec<(String, String)>, ContainerError> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let filter = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(filter))
            .await
            .map_err(ContainerError::List)?;

        Ok(containers
            .iter()
            .filter_map(|c| {
                let id = c.id.as_ref()?;
                let id: String = id.chars().take(SHORT_ID_LEN).collect();
                let name = c
                    .names
                    .as_ref()
                    .and_then(|n| n.first())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| id.clone());
                Some((id, name))
            })
            .collect())
    }

    async fn fetch_sample(&self, id: &str) -> Option<RawContainerSample> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
            ..Default::default()
        };
        let mut stream = self.docker.stats(id, Some(options));
        match stream.next().await {
            Some(Ok(s)) => Some(RawContainerSample::from_response(&s)),
            Some(Err(e)) => {
                warn!(container = id, error = %e, "container stats request failed");
                None
            }
            None => None,
        }
    }

    async fn collect(&self) -> Result<HashMap<String, ContainerStat>, ContainerError> {
        let running = self.list_running().await?;
        let samples = join_all(running.iter().map(|(id, _)| self.fetch_sample(id))).await;
        let now = Instant::now();

        let mut deltas = self.deltas.lock().unwrap_or_else(PoisonError::into_inner);
        let running_ids: HashSet<&String> = running.iter().map(|(id, _)| id).collect();
        deltas.retain(|id, _| running_ids.contains(id));

        let mut out = HashMap::with_capacity(running.len());
        for ((id, name), sample) in running.iter().zip(samples) {
            let Some(sample) = sample else {
                deltas.remove(id);
                continue;
            };
            let (stat, next) = compute_stat(name, deltas.get(id), &sample, now);
            deltas.insert(id.clone(), next);
            match stat {
                Ok(stat) => {
                    out.insert(id.clone(), stat);
                }
                Err(SampleRejected::CpuOutOfRange(cpu)) => {
                    debug!(container = %name, cpu, "skipping container with out-of-range CPU");
                }
            }
        }
        Ok(out)
    }
}

impl ContainerStatsSource for DockerRepo {
    fn container_stats(&self) -> BoxFuture<'_, Result<HashMap<String, ContainerStat>, ContainerError>> {
        Box::pin(self.collect())
    }
}
