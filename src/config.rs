use serde::Deserialize;
use std::collections::BTreeSet;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:45876";
pub const DEFAULT_EXTRA_DIR: &str = "/extra-filesystems";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub filesystems: FilesystemConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub gpu: GpuConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Key the collector must present. Takes precedence over `key_file`.
    pub key: Option<String>,
    pub key_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            key: None,
            key_file: None,
        }
    }
}

fn default_listen() -> String {
    DEFAULT_LISTEN.into()
}

/// Which filesystems the disk resolver tracks.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesystemConfig {
    /// Device (suffix match) or mountpoint of the root filesystem.
    pub root: Option<String>,
    /// Extra devices or mountpoints to track.
    #[serde(default)]
    pub extra: Vec<String>,
    /// Every directory under this path is tracked as an extra filesystem.
    #[serde(default = "default_extra_dir")]
    pub extra_dir: String,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            root: None,
            extra: Vec::new(),
            extra_dir: default_extra_dir(),
        }
    }
}

fn default_extra_dir() -> String {
    DEFAULT_EXTRA_DIR.into()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    /// When set, only these interfaces are counted (no prefix heuristics).
    pub interfaces: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GpuConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Sampling period requested from the vendor tools.
    #[serde(default = "default_gpu_sample_interval_secs")]
    pub sample_interval_secs: u64,
    /// Fixed delay before restarting a vendor tool that exited after good samples.
    #[serde(default = "default_gpu_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_secs: default_gpu_sample_interval_secs(),
            restart_delay_ms: default_gpu_restart_delay_ms(),
        }
    }
}

fn default_gpu_sample_interval_secs() -> u64 {
    4
}

fn default_gpu_restart_delay_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Temperature sensors to report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorsConfig {
    /// When set, only sensors with these labels are reported.
    pub allow: Option<BTreeSet<String>>,
}

/// How "used memory" is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCalc {
    /// total - available
    #[default]
    Available,
    /// total - free - buffers - cached
    Htop,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub calc: MemoryCalc,
}

fn default_true() -> bool {
    true
}

impl AgentConfig {
    /// Loads `CONFIG_FILE` (default `agent.toml`; a missing default file means all
    /// defaults), then applies environment overrides and validates.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var("CONFIG_FILE").ok();
        let path = explicit.clone().unwrap_or_else(|| "agent.toml".into());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(s) => toml::from_str::<AgentConfig>(&s)?,
            Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => {
                AgentConfig::default()
            }
            Err(e) => return Err(anyhow::anyhow!("config file {}: {}", path, e)),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AgentConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the agent's environment variables on top of file values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("KEY").filter(|k| !k.is_empty()) {
            self.server.key = Some(key);
        }
        if let Some(path) = lookup("KEY_FILE") {
            self.server.key_file = Some(path);
        }
        if let Some(port) = lookup("PORT") {
            self.server.listen = normalize_listen(&port);
        }
        if let Some(fs) = lookup("FILESYSTEM").filter(|f| !f.is_empty()) {
            self.filesystems.root = Some(fs);
        }
        if let Some(extra) = lookup("EXTRA_FILESYSTEMS") {
            self.filesystems.extra = split_list(&extra).collect();
        }
        if let Some(nics) = lookup("NICS") {
            self.network.interfaces = Some(split_list(&nics).collect());
        }
        if let Some(sensors) = lookup("SENSORS") {
            self.sensors.allow = Some(split_list(&sensors).collect());
        }
        if let Some(calc) = lookup("MEM_CALC") {
            self.memory.calc = if calc.trim().eq_ignore_ascii_case("htop") {
                MemoryCalc::Htop
            } else {
                MemoryCalc::Available
            };
        }
    }

    /// Reads the collector key, preferring the inline value over the key file.
    pub fn load_key(&self) -> anyhow::Result<Vec<u8>> {
        if let Some(key) = &self.server.key {
            return Ok(key.trim().as_bytes().to_vec());
        }
        let path = self
            .server
            .key_file
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("server.key or server.key_file must be set"))?;
        let bytes = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("reading key file {}: {}", path, e))?;
        let key = String::from_utf8_lossy(&bytes).trim().as_bytes().to_vec();
        anyhow::ensure!(!key.is_empty(), "key file {} is empty", path);
        Ok(key)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.server.listen.is_empty(),
            "server.listen must be non-empty"
        );
        anyhow::ensure!(
            self.server.key.as_deref().is_some_and(|k| !k.is_empty())
                || self.server.key_file.is_some(),
            "server.key or server.key_file must be set"
        );
        anyhow::ensure!(
            !self.filesystems.extra_dir.is_empty(),
            "filesystems.extra_dir must be non-empty"
        );
        anyhow::ensure!(
            self.gpu.sample_interval_secs > 0,
            "gpu.sample_interval_secs must be > 0, got {}",
            self.gpu.sample_interval_secs
        );
        anyhow::ensure!(
            self.gpu.restart_delay_ms > 0,
            "gpu.restart_delay_ms must be > 0, got {}",
            self.gpu.restart_delay_ms
        );
        Ok(())
    }
}

/// Accepts a bare port ("45876"), ":port" or a full "host:port".
pub fn normalize_listen(value: &str) -> String {
    let value = value.trim();
    if let Some(port) = value.strip_prefix(':') {
        format!("0.0.0.0:{}", port)
    } else if value.contains(':') {
        value.to_string()
    } else {
        format!("0.0.0.0:{}", value)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
