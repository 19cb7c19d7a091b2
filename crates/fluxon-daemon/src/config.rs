//! Daemon configuration (§10.3): TOML, loaded via `toml` + `serde`, every
//! field defaulted so a missing config file degrades to sane behavior
//! rather than failing startup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub mesh: MeshConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Knobs for the dedup/topology/gossip/rate-limit/relay layers a real
/// transport adapter would otherwise leave at their library defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Deduplicator capacity (entries), §4.7/C7.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Deduplicator entry TTL in seconds.
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
    /// Topology edge freshness window in seconds, §4.9/C9.
    #[serde(default = "default_topology_freshness_secs")]
    pub topology_freshness_secs: u64,
    /// Maximum TTL this node will accept on an inbound packet, §4.1.
    #[serde(default = "default_max_ttl")]
    pub max_ttl: u8,
    /// Minimum relay rebroadcast jitter in milliseconds, §5.
    #[serde(default = "default_relay_jitter_min_ms")]
    pub relay_jitter_min_ms: u64,
    /// Maximum relay rebroadcast jitter in milliseconds, §5.
    #[serde(default = "default_relay_jitter_max_ms")]
    pub relay_jitter_max_ms: u64,
}

/// Persistence knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Run with an in-memory database instead of a file, for local
    /// exercising and the integration harness.
    #[serde(default)]
    pub in_memory: bool,
}

/// Logging knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_dedup_capacity() -> usize {
    4096
}

fn default_dedup_ttl_secs() -> u64 {
    300
}

fn default_topology_freshness_secs() -> u64 {
    600
}

fn default_max_ttl() -> u8 {
    fluxon_codec::packet::DEFAULT_MAX_TTL
}

fn default_relay_jitter_min_ms() -> u64 {
    50
}

fn default_relay_jitter_max_ms() -> u64 {
    400
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: default_dedup_capacity(),
            dedup_ttl_secs: default_dedup_ttl_secs(),
            topology_freshness_secs: default_topology_freshness_secs(),
            max_ttl: default_max_ttl(),
            relay_jitter_min_ms: default_relay_jitter_min_ms(),
            relay_jitter_max_ms: default_relay_jitter_max_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            in_memory: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location, falling
    /// back to defaults if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// The data directory, resolved against `FLUXON_DATA_DIR` or platform
    /// default if `storage.data_dir` is unset.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    fn config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("FLUXON_DATA_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        Self::default_data_dir().join("config.toml")
    }

    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("FLUXON_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".fluxon"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/fluxon"))
    }
}
