//! Configuration for the sysinfo input.

use std::collections::BTreeMap;

use execd_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig};
use serde::{Deserialize, Serialize};

/// Complete input configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SysinfoInputConfig {
    /// Sysinfo collection settings.
    #[serde(default)]
    pub sysinfo: SysinfoConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// System information collection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysinfoConfig {
    /// Prepended to every measurement name (default: none).
    #[serde(default)]
    pub measurement_prefix: String,

    /// Value of the `host` tag.
    /// Use "auto" to detect automatically (default).
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Extra tags added to every point.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Which metrics to collect.
    #[serde(default)]
    pub collect: CollectConfig,

    /// Network interface filters.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Disk mount filters.
    #[serde(default)]
    pub disk: DiskConfig,
}

impl Default for SysinfoConfig {
    fn default() -> Self {
        Self {
            measurement_prefix: String::new(),
            hostname: default_hostname(),
            tags: BTreeMap::new(),
            collect: CollectConfig::default(),
            network: NetworkConfig::default(),
            disk: DiskConfig::default(),
        }
    }
}

fn default_hostname() -> String {
    "auto".to_string()
}

fn default_true() -> bool {
    true
}

/// Configuration for which metrics to collect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Total CPU usage.
    #[serde(default = "default_true")]
    pub cpu: bool,

    /// One extra `cpu` point per core (usage, frequency).
    #[serde(default)]
    pub per_core: bool,

    /// Memory and swap.
    #[serde(default = "default_true")]
    pub memory: bool,

    /// Disk usage per mount point.
    #[serde(default = "default_true")]
    pub disk: bool,

    /// Traffic counters per interface.
    #[serde(default = "default_true")]
    pub network: bool,

    /// Uptime, boot time, load averages.
    #[serde(default = "default_true")]
    pub system: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            cpu: true,
            per_core: false,
            memory: true,
            disk: true,
            network: true,
            system: true,
        }
    }
}

impl CollectConfig {
    fn any(&self) -> bool {
        self.cpu || self.memory || self.disk || self.network || self.system
    }
}

/// Include/exclude name lists.
///
/// A pattern ending in `*` matches by prefix, anything else must match
/// exactly. An empty include list includes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilter {
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

impl NameFilter {
    pub fn allows(&self, name: &str) -> bool {
        let matches = |pattern: &String| match pattern.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => pattern == name,
        };

        (self.include.is_empty() || self.include.iter().any(matches))
            && !self.exclude.iter().any(matches)
    }
}

/// Network interface filtering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(flatten)]
    pub names: NameFilter,

    /// Exclude loopback interfaces (default: true).
    #[serde(default = "default_true")]
    pub exclude_loopback: bool,

    /// Exclude virtual interfaces (docker, veth, etc.) (default: false).
    #[serde(default)]
    pub exclude_virtual: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            names: NameFilter::default(),
            exclude_loopback: true,
            exclude_virtual: false,
        }
    }
}

const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &["docker", "veth", "br-", "virbr", "vnet"];

impl NetworkConfig {
    /// Check if an interface should be reported.
    pub fn should_include(&self, name: &str) -> bool {
        if self.exclude_loopback && name == "lo" {
            return false;
        }
        if self.exclude_virtual && VIRTUAL_INTERFACE_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return false;
        }
        self.names.allows(name)
    }
}

/// Disk mount filtering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskConfig {
    #[serde(flatten)]
    pub mounts: NameFilter,

    /// Exclude pseudo filesystems (tmpfs, devtmpfs, etc.) (default: true).
    #[serde(default = "default_true")]
    pub exclude_pseudo: bool,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            mounts: NameFilter::default(),
            exclude_pseudo: true,
        }
    }
}

const PSEUDO_FILESYSTEMS: &[&str] = &[
    "tmpfs",
    "devtmpfs",
    "devfs",
    "sysfs",
    "proc",
    "cgroup",
    "cgroup2",
    "securityfs",
    "debugfs",
    "configfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "pstore",
    "binfmt_misc",
    "autofs",
    "overlay",
    "squashfs",
];

impl DiskConfig {
    /// Check if a mount point should be reported.
    pub fn should_include(&self, mount_point: &str, fs_type: &str) -> bool {
        if self.exclude_pseudo && PSEUDO_FILESYSTEMS.contains(&fs_type) {
            return false;
        }
        self.mounts.allows(mount_point)
    }
}

impl SysinfoInputConfig {
    /// Get the hostname to use, resolving "auto" if needed.
    pub fn get_hostname(&self) -> String {
        if self.sysinfo.hostname == "auto" {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string())
        } else {
            self.sysinfo.hostname.clone()
        }
    }
}

impl BridgeConfig for SysinfoInputConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> execd_bridge_framework::Result<()> {
        if !self.sysinfo.collect.any() {
            return Err(BridgeError::config_validation(
                "At least one metric type must be enabled",
            ));
        }
        if self.sysinfo.hostname.is_empty() {
            return Err(BridgeError::config_validation("hostname must not be empty"));
        }
        Ok(())
    }
}
