// Model serialization tests (JSON camelCase, internal fields hidden)

use hostagent::models::*;
use std::collections::BTreeMap;

#[test]
fn test_filesystem_stat_hides_counter_state() {
    let mut fs = FilesystemStat::new("sdb1", "/mnt/data", false);
    fs.disk_total_gb = 931.5;
    fs.disk_read_ps = 1.25;
    fs.total_read = 123_456;
    let json = serde_json::to_value(&fs).unwrap();
    assert_eq!(json["mountpoint"], "/mnt/data");
    assert_eq!(json["diskTotalGb"], 931.5);
    assert_eq!(json["diskReadPs"], 1.25);
    assert!(json.get("totalRead").is_none());
    assert!(json.get("ioKey").is_none());
    assert!(json.get("isRoot").is_none());
}

#[test]
fn test_gpu_data_serialization_camel_case() {
    let gpu = GpuData {
        name: "GeForce RTX 3080".into(),
        temperature: 45.0,
        memory_used: 1000.0,
        memory_total: 10000.0,
        usage: 30.0,
        power: 150.5,
    };
    let json = serde_json::to_string(&gpu).unwrap();
    assert!(json.contains("\"memoryUsed\""));
    assert!(json.contains("\"memoryTotal\""));
    let back: GpuData = serde_json::from_str(&json).unwrap();
    assert_eq!(back, gpu);
}

#[test]
fn test_container_stat_serialization() {
    let c = ContainerStat {
        name: "web".into(),
        cpu: 1.5,
        memory: 200.0,
        network_sent: 100.0,
        network_recv: 250.0,
    };
    let json = serde_json::to_string(&c).unwrap();
    assert!(json.contains("\"networkSent\""));
    assert!(json.contains("\"networkRecv\""));
}

#[test]
fn test_snapshot_omits_empty_maps() {
    let snapshot = CombinedSnapshot::default();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert!(json["stats"].get("gpus").is_none());
    assert!(json["stats"].get("extraFs").is_none());
    assert_eq!(json["containers"], serde_json::json!({}));
    assert!(json["info"].get("kernelVersion").is_some());
}

#[test]
fn test_snapshot_includes_populated_maps() {
    let mut stats = SystemStats::default();
    stats.gpus.insert(
        "0".into(),
        GpuData {
            name: "T4".into(),
            temperature: 40.0,
            memory_used: 500.0,
            memory_total: 15000.0,
            usage: 10.0,
            power: 20.0,
        },
    );
    stats
        .extra_fs
        .insert("sdb1".into(), FilesystemStat::new("sdb1", "/mnt/data", false));
    let snapshot = CombinedSnapshot {
        stats,
        containers: BTreeMap::new(),
        ..Default::default()
    };
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["stats"]["gpus"]["0"]["name"], "T4");
    assert_eq!(json["stats"]["extraFs"]["sdb1"]["mountpoint"], "/mnt/data");
}

#[test]
fn test_system_stats_temperatures_only_when_present() {
    let mut stats = SystemStats::default();
    let json = serde_json::to_value(&stats).unwrap();
    assert!(json.get("temperatures").is_none());

    stats
        .temperatures
        .insert("coretemp Package id 0".into(), 51.25);
    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["temperatures"]["coretemp Package id 0"], 51.25);
}
