//! Configuration of the FAPI translation process
//!
//! Loaded from TOML or YAML, picked by file extension. Every section is
//! optional; missing keys fall back to the defaults below.

use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

pub const SCHED_FIFO: u8 = 1;
pub const SCHED_RR: u8 = 2;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FapiConfig {
    #[serde(default = "default_mac2phy_worker")]
    pub mac2phy_worker: WorkerConfig,
    #[serde(default = "default_phy2mac_worker")]
    pub phy2mac_worker: WorkerConfig,
    #[serde(default = "default_urllc_worker")]
    pub urllc_worker: WorkerConfig,
    #[serde(default)]
    pub wls: WlsConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub dpdk: DpdkConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Placement of one worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorkerConfig {
    pub core_id: u16,
    /// 1 = SCHED_FIFO, 2 = SCHED_RR
    #[serde(default = "default_sched_policy")]
    pub thread_sched_policy: u8,
    #[serde(default = "default_thread_priority")]
    pub thread_priority: u8,
}

fn default_sched_policy() -> u8 {
    SCHED_FIFO
}

fn default_thread_priority() -> u8 {
    96
}

fn default_mac2phy_worker() -> WorkerConfig {
    WorkerConfig { core_id: 7, thread_sched_policy: SCHED_FIFO, thread_priority: 96 }
}

fn default_phy2mac_worker() -> WorkerConfig {
    WorkerConfig { core_id: 8, thread_sched_policy: SCHED_FIFO, thread_priority: 96 }
}

fn default_urllc_worker() -> WorkerConfig {
    WorkerConfig { core_id: 9, thread_sched_policy: SCHED_FIFO, thread_priority: 96 }
}

/// Memory behind the buffer pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionBackend {
    #[default]
    Heap,
    Shm,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WlsConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_shmem_size")]
    pub shmem_size: usize,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default)]
    pub backend: RegionBackend,
    /// Descriptor ring depth of each channel
    #[serde(default = "default_ring_depth")]
    pub ring_depth: usize,
}

impl Default for WlsConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            shmem_size: default_shmem_size(),
            block_size: default_block_size(),
            backend: RegionBackend::default(),
            ring_depth: default_ring_depth(),
        }
    }
}

fn default_device_name() -> String {
    "wls0".to_string()
}

fn default_shmem_size() -> usize {
    // 2 GiB in the lab setup; 64 MiB covers a single cell
    64 * 1024 * 1024
}

fn default_block_size() -> usize {
    interfaces::wls::MSG_MAXSIZE
}

fn default_ring_depth() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggerConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Carried for deployments where the pool lives in a DPDK memzone
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DpdkConfig {
    /// 0 = PA, 1 = VA
    #[serde(default)]
    pub iova_mode: u8,
    #[serde(default)]
    pub memory_zone: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    /// JSON dump written on shutdown
    pub file: Option<String>,
    /// Period of the stats log; 0 disables it
    #[serde(default = "default_stats_interval")]
    pub interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { file: None, interval_secs: default_stats_interval() }
    }
}

fn default_stats_interval() -> u64 {
    10
}

impl FapiConfig {
    /// Load and validate a config file; `.yml`/`.yaml` is YAML, anything
    /// else TOML
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: FapiConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => serde_yaml::from_str(&contents)?,
            _ => toml::from_str(&contents)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, worker) in self.workers() {
            if worker.thread_sched_policy != SCHED_FIFO && worker.thread_sched_policy != SCHED_RR {
                bail!(
                    "{}: thread_sched_policy must be 1 (SCHED_FIFO) or 2 (SCHED_RR), got {}",
                    name,
                    worker.thread_sched_policy
                );
            }
            if !(1..=99).contains(&worker.thread_priority) {
                bail!("{}: thread_priority must be 1..=99, got {}", name, worker.thread_priority);
            }
        }
        if self.wls.block_size == 0 || self.wls.shmem_size < self.wls.block_size {
            bail!("wls: shmem_size {} cannot hold a block of {}", self.wls.shmem_size, self.wls.block_size);
        }
        if self.dpdk.iova_mode > 1 {
            bail!("dpdk: iova_mode must be 0 (PA) or 1 (VA), got {}", self.dpdk.iova_mode);
        }
        match self.logger.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => bail!("logger: unknown level {:?}", other),
        }
    }

    pub fn workers(&self) -> [(&'static str, WorkerConfig); 3] {
        [
            ("mac2phy_worker", self.mac2phy_worker),
            ("phy2mac_worker", self.phy2mac_worker),
            ("urllc_worker", self.urllc_worker),
        ]
    }
}
