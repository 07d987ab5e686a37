// Network accounting models

use std::collections::BTreeSet;
use std::time::Instant;

use crate::units::{bytes_per_second, bytes_to_megabytes};

/// Network rates above this (MB/s) are treated as a counter reset.
pub const MAX_NET_MB_PER_SEC: f64 = 10_000.0;

/// Per-interface cumulative counters as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetIoCounter {
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

impl NetIoCounter {
    pub fn new(name: impl Into<String>, bytes_sent: u64, bytes_recv: u64) -> Self {
        Self {
            name: name.into(),
            bytes_sent,
            bytes_recv,
        }
    }
}

/// Aggregate sent/received counters over the relevant interfaces.
#[derive(Debug, Clone, Default)]
pub struct NetworkIoState {
    pub last_sample: Option<Instant>,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    /// Interfaces selected at startup; others never contribute.
    pub interfaces: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NetRates {
    pub sent_bytes_per_sec: f64,
    pub recv_bytes_per_sec: f64,
}

impl NetworkIoState {
    /// Sums sent/received bytes of the tracked interfaces present in `counters`.
    pub fn totals(&self, counters: &[NetIoCounter]) -> (u64, u64) {
        counters
            .iter()
            .filter(|c| self.interfaces.contains(&c.name))
            .fold((0u64, 0u64), |(sent, recv), c| {
                (
                    sent.saturating_add(c.bytes_sent),
                    recv.saturating_add(c.bytes_recv),
                )
            })
    }

    /// Records a poll and returns the rates since the previous one. The stored
    /// totals always advance to this poll; a decrease re-baselines and reports 0.
    pub fn record(&mut self, counters: &[NetIoCounter], now: Instant) -> NetRates {
        let (sent, recv) = self.totals(counters);
        let Some(prev) = self.last_sample else {
            self.bytes_sent = sent;
            self.bytes_recv = recv;
            self.last_sample = Some(now);
            return NetRates::default();
        };
        let elapsed = now.saturating_duration_since(prev);
        let sent_rate = bytes_per_second(self.bytes_sent, sent, elapsed);
        let recv_rate = bytes_per_second(self.bytes_recv, recv, elapsed);
        self.bytes_sent = sent;
        self.bytes_recv = recv;
        self.last_sample = Some(now);

        match (sent_rate, recv_rate) {
            (Some(s), Some(r))
                if bytes_to_megabytes(s) <= MAX_NET_MB_PER_SEC
                    && bytes_to_megabytes(r) <= MAX_NET_MB_PER_SEC =>
            {
                NetRates {
                    sent_bytes_per_sec: s,
                    recv_bytes_per_sec: r,
                }
            }
            _ => {
                tracing::debug!(
                    sent,
                    recv,
                    "network counters reset, re-baselining"
                );
                NetRates::default()
            }
        }
    }
}
