//! Configuration types for the OpenHarmony tooling
//!
//! Defines `Settings` (`.fohos/config.toml`) and its sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use fohos_core::{BuildMode, DEFAULT_FLAVOR};

/// Project settings (`.fohos/config.toml`)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub sdk: SdkSettings,

    #[serde(default)]
    pub build: BuildSettings,

    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub logs: LogSettings,
}

/// SDK location fallback, used when no SDK environment variable is set
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SdkSettings {
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// DevEco Studio home, used when `DEVECO_HOME` is unset
    #[serde(default)]
    pub deveco_home: Option<PathBuf>,
}

/// Build defaults
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BuildSettings {
    #[serde(default)]
    pub mode: BuildMode,

    #[serde(default = "default_flavor")]
    pub flavor: String,

    /// Dart entry point
    #[serde(default = "default_target_file")]
    pub target_file: String,

    /// `flutter` executable; looked up on `PATH` when unset
    #[serde(default)]
    pub flutter: Option<PathBuf>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            mode: BuildMode::default(),
            flavor: default_flavor(),
            target_file: default_target_file(),
            flutter: None,
        }
    }
}

/// Device defaults
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceSettings {
    /// Device id (or prefix) to use when several are attached
    #[serde(default)]
    pub default_device: Option<String>,

    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,

    #[serde(default = "default_vm_timeout")]
    pub vm_service_timeout_secs: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            default_device: None,
            discovery_timeout_secs: default_discovery_timeout(),
            vm_service_timeout_secs: default_vm_timeout(),
        }
    }
}

/// Log reader settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogSettings {
    /// Tag used when reading buffered logs
    #[serde(default = "default_log_tag")]
    pub past_tag: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            past_tag: default_log_tag(),
        }
    }
}

fn default_flavor() -> String {
    DEFAULT_FLAVOR.to_string()
}

fn default_target_file() -> String {
    "lib/main.dart".to_string()
}

fn default_discovery_timeout() -> u64 {
    30
}

fn default_vm_timeout() -> u64 {
    60
}

fn default_log_tag() -> String {
    "Flutter".to_string()
}
