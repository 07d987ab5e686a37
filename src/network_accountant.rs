// Startup-time selection of the network interfaces that count toward bandwidth.

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::NetworkConfig;
use crate::models::{NetIoCounter, NetworkIoState};
use crate::sysinfo_repo::HostProbe;

/// Name prefixes of loopback, bridge and virtual-ethernet interfaces.
const SKIPPED_PREFIXES: [&str; 4] = ["lo", "docker", "br-", "veth"];

/// Probes the OS and builds the baseline network state.
pub fn initialize(probe: &dyn HostProbe, config: &NetworkConfig) -> NetworkIoState {
    match probe.net_io_counters() {
        Ok(counters) => select(&counters, config.interfaces.as_ref(), Instant::now()),
        Err(e) => {
            warn!(error = %e, operation = "net_io_counters", "reading network counters failed");
            NetworkIoState::default()
        }
    }
}

/// Picks the relevant interfaces from `counters` and seeds their totals.
///
/// With an allow-list only listed names count. Otherwise virtual/loopback names and
/// interfaces that have never both sent and received are skipped.
pub fn select(
    counters: &[NetIoCounter],
    allowlist: Option<&BTreeSet<String>>,
    now: Instant,
) -> NetworkIoState {
    let mut state = NetworkIoState {
        last_sample: Some(now),
        ..Default::default()
    };
    for c in counters {
        let include = match allowlist {
            Some(names) => names.contains(&c.name),
            None => !skip_interface(c),
        };
        if !include {
            continue;
        }
        info!(name = %c.name, sent = c.bytes_sent, recv = c.bytes_recv, "detected network interface");
        state.bytes_sent = state.bytes_sent.saturating_add(c.bytes_sent);
        state.bytes_recv = state.bytes_recv.saturating_add(c.bytes_recv);
        state.interfaces.insert(c.name.clone());
    }
    state
}

pub fn skip_interface(c: &NetIoCounter) -> bool {
    SKIPPED_PREFIXES.iter().any(|p| c.name.starts_with(p)) || c.bytes_sent == 0 || c.bytes_recv == 0
}
