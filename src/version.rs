// Build-time agent version, reported in system info and GET /version

/// Agent version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Agent name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");
