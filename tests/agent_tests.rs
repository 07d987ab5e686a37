// Snapshot aggregation end to end over a scripted host

mod common;

use common::{FakeContainers, FakeProbe, FakeRunner, GB, Script, container};
use hostagent::agent::{Agent, AgentDeps};
use hostagent::config::{AgentConfig, FilesystemConfig, GpuConfig, MemoryCalc};
use hostagent::docker_repo::ContainerStatsSource;
use hostagent::gpu::GpuManager;
use hostagent::models::{HostReading, NetIoCounter};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

fn host() -> FakeProbe {
    FakeProbe::new()
        .partition("/dev/sda1", "/")
        .partition("/dev/sdb1", "/mnt/backup")
        .disk("sda1", 1_000, 2_000)
        .disk("sdb1", 0, 0)
        .nic("eth0", 10_000, 20_000)
        .nic("lo", 99_999, 99_999)
        .usage("/", 100 * GB, 25 * GB)
        .usage("/mnt/backup", 500 * GB, 100 * GB)
        .reading(HostReading {
            cpu_percent: 12.5,
            mem_total: 16 * GB,
            mem_used: 4 * GB,
            mem_buff_cache: 2 * GB,
            mem_free: 6 * GB,
            zfs_arc: 0,
            swap_total: 2 * GB,
            swap_used: 0,
            uptime_secs: 3600,
        })
}

fn extra_backup() -> AgentConfig {
    AgentConfig {
        filesystems: FilesystemConfig {
            extra: vec!["/mnt/backup".into()],
            ..Default::default()
        },
        ..Default::default()
    }
}

fn build_agent(
    probe: Arc<FakeProbe>,
    containers: Option<Arc<dyn ContainerStatsSource>>,
    gpu: Option<GpuManager>,
) -> Agent {
    build_agent_with(probe, containers, gpu, &extra_backup())
}

fn build_agent_with(
    probe: Arc<FakeProbe>,
    containers: Option<Arc<dyn ContainerStatsSource>>,
    gpu: Option<GpuManager>,
    config: &AgentConfig,
) -> Agent {
    Agent::new(
        AgentDeps {
            probe,
            containers,
            gpu,
        },
        config,
    )
}

#[tokio::test]
async fn snapshot_without_optional_sources() {
    let agent = build_agent(Arc::new(host()), None, None);
    assert!(!agent.has_gpu());

    let snapshot = agent.gather_stats().await;
    assert!(snapshot.stats.gpus.is_empty());
    assert!(snapshot.containers.is_empty());

    assert_eq!(snapshot.info.hostname, "testhost");
    assert_eq!(snapshot.info.uptime_secs, 3600);
    assert_eq!(snapshot.stats.cpu_percent, 12.5);
    assert_eq!(snapshot.info.cpu_percent, 12.5);
    assert_eq!(snapshot.stats.mem_total_gb, 16.0);
    assert_eq!(snapshot.stats.mem_used_gb, 4.0);
    assert_eq!(snapshot.stats.mem_percent, 25.0);
    assert_eq!(snapshot.stats.mem_buff_cache_gb, 2.0);
    assert_eq!(snapshot.stats.disk_total_gb, 100.0);
    assert_eq!(snapshot.stats.disk_used_gb, 25.0);
    assert_eq!(snapshot.stats.disk_percent, 25.0);
    assert_eq!(snapshot.info.disk_percent, 25.0);
}

#[tokio::test]
async fn failing_container_source_yields_empty_map() {
    let containers: Arc<dyn ContainerStatsSource> = Arc::new(FakeContainers::failing());
    let agent = build_agent(Arc::new(host()), Some(containers), None);

    let snapshot = agent.gather_stats().await;
    assert!(snapshot.containers.is_empty());
    assert_eq!(snapshot.stats.disk_total_gb, 100.0);
}

#[tokio::test]
async fn container_readings_are_passed_through() {
    let containers: Arc<dyn ContainerStatsSource> = Arc::new(FakeContainers::with(
        HashMap::from([
            ("abc123".to_string(), container("web", 1.5)),
            ("def456".to_string(), container("db", 3.0)),
        ]),
    ));
    let agent = build_agent(Arc::new(host()), Some(containers), None);

    let snapshot = agent.gather_stats().await;
    assert_eq!(snapshot.containers.len(), 2);
    assert_eq!(snapshot.containers["abc123"].name, "web");
}

#[tokio::test]
async fn extra_filesystems_need_capacity() {
    let probe = host().usage("/mnt/backup", 0, 0);
    let agent = build_agent(Arc::new(probe), None, None);
    assert!(agent.gather_stats().await.stats.extra_fs.is_empty());

    let agent = build_agent(Arc::new(host()), None, None);
    let snapshot = agent.gather_stats().await;
    let backup = &snapshot.stats.extra_fs["sdb1"];
    assert_eq!(backup.mountpoint, "/mnt/backup");
    assert_eq!(backup.disk_total_gb, 500.0);
    assert_eq!(backup.disk_used_gb, 100.0);
    assert!(!snapshot.stats.extra_fs.contains_key("sda1"));
}

#[tokio::test]
async fn counters_are_rebaselined_every_poll() {
    let probe = Arc::new(host());
    let agent = build_agent(probe.clone(), None, None);
    assert_eq!(agent.network_interfaces().len(), 1);

    probe.set_disk("sda1", 500, 1_000);
    probe.set_nics(vec![NetIoCounter::new("eth0", 5, 5)]);
    let snapshot = agent.gather_stats().await;
    assert_eq!(snapshot.stats.disk_read_ps, 0.0);
    assert_eq!(snapshot.stats.disk_write_ps, 0.0);
    assert_eq!(snapshot.stats.net_sent_ps, 0.0);
    assert_eq!(snapshot.stats.net_recv_ps, 0.0);

    let fs = agent.filesystems();
    assert_eq!(fs["sda1"].total_read, 500);
    assert_eq!(fs["sda1"].total_write, 1_000);

    tokio::time::sleep(Duration::from_millis(20)).await;
    probe.set_disk("sda1", 500 + 64 * 1_048_576, 1_000);
    let snapshot = agent.gather_stats().await;
    assert!(snapshot.stats.disk_read_ps > 0.0);
    assert_eq!(snapshot.stats.disk_write_ps, 0.0);
    assert_eq!(agent.filesystems()["sda1"].total_read, 500 + 64 * 1_048_576);
}

#[tokio::test]
async fn gpu_readings_are_drained_into_the_snapshot() {
    let runner = Arc::new(FakeRunner::new(
        &["nvidia-smi"],
        vec![Script::lines(&["0, NVIDIA RTX A2000, 50, 2048, 6144, 80, 60"])],
    ));
    let config = GpuConfig {
        restart_delay_ms: 1,
        ..Default::default()
    };
    let manager = GpuManager::start(runner, &config).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while manager.is_collecting() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let agent = build_agent(Arc::new(host()), None, Some(manager));
    assert!(agent.has_gpu());
    let snapshot = agent.gather_stats().await;
    let gpu = &snapshot.stats.gpus["0"];
    assert_eq!(gpu.name, "RTX A2000");
    assert_eq!(gpu.usage, 80.0);
    assert_eq!(gpu.memory_used, 2000.0);
}

#[tokio::test]
async fn failed_disk_counter_read_zeroes_rates() {
    let probe = Arc::new(host());
    let agent = build_agent(probe.clone(), None, None);

    tokio::time::sleep(Duration::from_millis(20)).await;
    probe.set_disk("sda1", 1_000 + 64 * 1_048_576, 2_000 + 64 * 1_048_576);
    let snapshot = agent.gather_stats().await;
    assert!(snapshot.stats.disk_read_ps > 0.0);
    assert!(snapshot.stats.disk_write_ps > 0.0);

    probe.set_disk_io_failing(true);
    let snapshot = agent.gather_stats().await;
    assert_eq!(snapshot.stats.disk_read_ps, 0.0);
    assert_eq!(snapshot.stats.disk_write_ps, 0.0);
    let fs = agent.filesystems();
    assert_eq!(fs["sda1"].disk_read_ps, 0.0);
    assert_eq!(fs["sda1"].total_read, 1_000 + 64 * 1_048_576);
}

#[tokio::test]
async fn missing_disk_counter_zeroes_that_disk() {
    let probe = Arc::new(host());
    let agent = build_agent(probe.clone(), None, None);

    tokio::time::sleep(Duration::from_millis(20)).await;
    probe.set_disk("sda1", 1_000 + 64 * 1_048_576, 2_000);
    assert!(agent.gather_stats().await.stats.disk_read_ps > 0.0);

    probe.disk_io.lock().unwrap().remove("sda1");
    assert_eq!(agent.gather_stats().await.stats.disk_read_ps, 0.0);
}

#[tokio::test]
async fn temperatures_follow_the_allow_list() {
    let probe = || {
        Arc::new(
            host()
                .sensor("coretemp Package id 0", Some(52.0))
                .sensor("nvme Composite", Some(38.5))
                .sensor("acpitz temp1", None),
        )
    };

    let agent = build_agent(probe(), None, None);
    let temps = agent.gather_stats().await.stats.temperatures;
    assert_eq!(temps.len(), 2);
    assert_eq!(temps["coretemp Package id 0"], 52.0);
    assert_eq!(temps["nvme Composite"], 38.5);

    let mut config = extra_backup();
    config.sensors.allow = Some(BTreeSet::from(["nvme Composite".to_string()]));
    let agent = build_agent_with(probe(), None, None, &config);
    let temps = agent.gather_stats().await.stats.temperatures;
    assert_eq!(temps.len(), 1);
    assert_eq!(temps["nvme Composite"], 38.5);
}

#[tokio::test]
async fn htop_memory_excludes_free_and_cache() {
    let mut config = extra_backup();
    config.memory.calc = MemoryCalc::Htop;
    let agent = build_agent_with(Arc::new(host()), None, None, &config);

    let stats = agent.gather_stats().await.stats;
    assert_eq!(stats.mem_used_gb, 8.0);
    assert_eq!(stats.mem_percent, 50.0);
    assert_eq!(stats.mem_buff_cache_gb, 2.0);
}

#[tokio::test]
async fn zfs_arc_is_not_counted_as_used() {
    let probe = host().reading(HostReading {
        cpu_percent: 0.0,
        mem_total: 16 * GB,
        mem_used: 8 * GB,
        mem_buff_cache: 0,
        mem_free: 8 * GB,
        zfs_arc: 4 * GB,
        swap_total: 0,
        swap_used: 0,
        uptime_secs: 1,
    });
    let agent = build_agent(Arc::new(probe), None, None);

    let stats = agent.gather_stats().await.stats;
    assert_eq!(stats.mem_used_gb, 4.0);
    assert_eq!(stats.mem_percent, 25.0);
}
