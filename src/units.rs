// Unit conversions and counter delta math shared by the collectors.

use std::time::Duration;

const BYTES_PER_MB: f64 = 1_048_576.0;
const BYTES_PER_GB: f64 = 1_073_741_824.0;

/// Rounds to two decimal places (the precision reported to the collector).
pub fn two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn bytes_to_megabytes(bytes: f64) -> f64 {
    bytes / BYTES_PER_MB
}

pub fn bytes_to_gigabytes(bytes: f64) -> f64 {
    bytes / BYTES_PER_GB
}

/// Per-second rate between two samples of a monotonic counter.
///
/// Returns `None` when the counter went backwards (reset or replaced device); the
/// caller re-baselines instead of reporting a negative rate. A zero interval yields 0.
pub fn bytes_per_second(previous: u64, current: u64, elapsed: Duration) -> Option<f64> {
    let delta = current.checked_sub(previous)?;
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return Some(0.0);
    }
    Some(delta as f64 / secs)
}

/// Percentage of `part` in `total`, 0 when `total` is 0.
pub fn percent(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total * 100.0 } else { 0.0 }
}
