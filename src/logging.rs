// Tracing subscriber setup: local-time timestamps and level selection

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

/// Level used when neither `RUST_LOG` nor `LOG_LEVEL` holds a usable directive.
pub const DEFAULT_LEVEL: &str = "info";

pub struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Filter from `RUST_LOG`, then `LOG_LEVEL`, then [`DEFAULT_LEVEL`].
pub fn env_filter() -> EnvFilter {
    filter_from(
        std::env::var("RUST_LOG").ok().as_deref(),
        std::env::var("LOG_LEVEL").ok().as_deref(),
    )
}

/// First non-empty, parseable directive wins. Empty or unset values are skipped.
pub fn filter_from(rust_log: Option<&str>, log_level: Option<&str>) -> EnvFilter {
    [rust_log, log_level]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .find_map(|d| EnvFilter::try_new(d.to_lowercase()).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL))
}

pub fn init() {
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(env_filter())
        .init();
}
