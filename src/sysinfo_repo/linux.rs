// Linux-specific helpers: /proc/cpuinfo, /proc/diskstats, /proc/meminfo, ZFS arcstats, device-mapper names.

use std::collections::HashMap;

use super::DiskIoCounter;

const SECTOR_SIZE: u64 = 512;

/// Read first "model name" from /proc/cpuinfo (Linux). Prefer over sysinfo when it returns "cpu0" etc.
pub(super) fn read_cpu_model_linux() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        for line in content.lines() {
            if line.starts_with("model name") {
                let name = line
                    .find(": ")
                    .map(|i| line[i + 2..].trim())
                    .filter(|s| !s.is_empty() && *s != "cpu0")?;
                return Some(name.to_string());
            }
        }
    }
    None
}

/// Block device counters from /proc/diskstats, labelled with device-mapper names.
pub(super) fn read_diskstats() -> anyhow::Result<HashMap<String, DiskIoCounter>> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/diskstats")
            .map_err(|e| anyhow::anyhow!("read /proc/diskstats: {}", e))?;
        let mut counters = parse_diskstats(&content);
        for counter in counters.values_mut() {
            counter.label = read_dm_name(&counter.name);
        }
        Ok(counters)
    }
    #[cfg(not(target_os = "linux"))]
    Err(anyhow::anyhow!("disk I/O counters are only read from /proc/diskstats"))
}

/// Parses /proc/diskstats content.
///
/// `major minor name reads merged sectors_read ms writes merged sectors_written ...`
/// Lines with fewer than ten columns are skipped.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(super) fn parse_diskstats(content: &str) -> HashMap<String, DiskIoCounter> {
    let mut counters = HashMap::new();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            continue;
        }
        let sectors = |i: usize| parts[i].parse::<u64>().unwrap_or(0);
        let name = parts[2].to_string();
        counters.insert(
            name.clone(),
            DiskIoCounter {
                name,
                label: None,
                read_bytes: sectors(5).saturating_mul(SECTOR_SIZE),
                write_bytes: sectors(9).saturating_mul(SECTOR_SIZE),
            },
        );
    }
    counters
}

#[cfg(target_os = "linux")]
fn read_dm_name(device: &str) -> Option<String> {
    let v = std::fs::read_to_string(format!("/sys/class/block/{}/dm/name", device)).ok()?;
    let v = v.trim();
    if v.is_empty() {
        return None;
    }
    Some(v.to_string())
}

/// Buffers + Cached from /proc/meminfo, in bytes.
pub(super) fn read_buff_cache_linux() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/meminfo").ok()?;
        Some(parse_buff_cache(&content))
    }
    #[cfg(not(target_os = "linux"))]
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_buff_cache(meminfo: &str) -> u64 {
    meminfo
        .lines()
        .filter_map(|line| {
            let (key, rest) = line.split_once(':')?;
            if key != "Buffers" && key != "Cached" {
                return None;
            }
            rest.split_whitespace().next()?.parse::<u64>().ok()
        })
        .sum::<u64>()
        * 1024
}

/// Current ZFS ARC size in bytes; `None` when the ZFS module is not loaded.
pub(super) fn read_zfs_arc_linux() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/spl/kstat/zfs/arcstats").ok()?;
        parse_arc_size(&content)
    }
    #[cfg(not(target_os = "linux"))]
    None
}

/// `size` row of arcstats: `name type data`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_arc_size(arcstats: &str) -> Option<u64> {
    arcstats.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        if fields.next()? != "size" {
            return None;
        }
        fields.nth(1)?.parse().ok()
    })
}
