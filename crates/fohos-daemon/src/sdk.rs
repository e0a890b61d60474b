//! OpenHarmony / HarmonyOS SDK discovery
//!
//! Two SDK flavors share the same capabilities but lay their files out
//! differently:
//!
//! | Flavor       | Variable        | hdc location                                  |
//! |--------------|-----------------|-----------------------------------------------|
//! | OpenHarmony  | `OHOS_SDK_HOME` | `<root>/<apiLevel>/toolchains/hdc`            |
//! | HarmonyOS    | `HOS_SDK_HOME`  | `<root>/default/openharmony/toolchains/hdc`   |
//!
//! Discovery runs once per command and produces an [`SdkDiscovery`] that is
//! passed to whoever needs it; there is no process-wide cache.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::process::is_executable;
use fohos_core::prelude::*;

/// OpenHarmony SDK root
pub const OHOS_SDK_HOME_ENV: &str = "OHOS_SDK_HOME";

/// HarmonyOS SDK root
pub const HOS_SDK_HOME_ENV: &str = "HOS_SDK_HOME";

/// DevEco Studio installation (hvigor, ohpm, bundled node)
pub const DEVECO_HOME_ENV: &str = "DEVECO_HOME";

/// Node.js installation used to run hvigor
pub const NODE_HOME_ENV: &str = "NODE_HOME";

#[cfg(windows)]
const HDC_BINARY: &str = "hdc.exe";
#[cfg(not(windows))]
const HDC_BINARY: &str = "hdc";

/// A located SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OhosSdk {
    OpenHarmony { root: PathBuf },
    HarmonyOs { root: PathBuf },
}

#[derive(Debug, Deserialize)]
struct SdkPackage {
    data: SdkPackageData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SdkPackageData {
    api_version: String,
}

impl OhosSdk {
    /// Locate an SDK from the environment, then from a configured path
    pub fn locate(configured: Option<&Path>) -> Option<Self> {
        if let Some(root) = env_dir(HOS_SDK_HOME_ENV) {
            return Some(OhosSdk::HarmonyOs { root });
        }
        if let Some(root) = env_dir(OHOS_SDK_HOME_ENV) {
            return Some(OhosSdk::OpenHarmony { root });
        }

        let root = configured.filter(|p| p.is_dir())?;
        if root.join("default").join("openharmony").is_dir() {
            Some(OhosSdk::HarmonyOs {
                root: root.to_path_buf(),
            })
        } else {
            Some(OhosSdk::OpenHarmony {
                root: root.to_path_buf(),
            })
        }
    }

    pub fn sdk_path(&self) -> &Path {
        match self {
            OhosSdk::OpenHarmony { root } | OhosSdk::HarmonyOs { root } => root,
        }
    }

    /// Environment variable naming this flavor's root
    pub fn env_var(&self) -> &'static str {
        match self {
            OhosSdk::OpenHarmony { .. } => OHOS_SDK_HOME_ENV,
            OhosSdk::HarmonyOs { .. } => HOS_SDK_HOME_ENV,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OhosSdk::OpenHarmony { .. } => "OpenHarmony SDK",
            OhosSdk::HarmonyOs { .. } => "HarmonyOS SDK",
        }
    }

    /// API levels available in this SDK, ascending
    pub fn api_levels(&self) -> Vec<u32> {
        let mut levels = match self {
            OhosSdk::OpenHarmony { root } => numeric_subdirectories(root),
            OhosSdk::HarmonyOs { root } => {
                harmony_api_level(&root.join("default").join("sdk-pkg.json"))
                    .into_iter()
                    .collect()
            }
        };
        levels.sort_unstable();
        levels.dedup();
        levels
    }

    /// Path of the hdc binary (highest API level for OpenHarmony)
    pub fn hdc_path(&self) -> Option<PathBuf> {
        let candidate = match self {
            OhosSdk::OpenHarmony { root } => {
                let level = self.api_levels().into_iter().last()?;
                root.join(level.to_string())
                    .join("toolchains")
                    .join(HDC_BINARY)
            }
            OhosSdk::HarmonyOs { root } => root
                .join("default")
                .join("openharmony")
                .join("toolchains")
                .join(HDC_BINARY),
        };
        candidate.exists().then_some(candidate)
    }

    /// Check the SDK is usable for device communication
    pub fn validate(&self) -> Result<()> {
        if !self.sdk_path().is_dir() {
            return Err(Error::SdkNotFound {
                env_var: self.env_var().to_string(),
            });
        }
        match self.hdc_path() {
            Some(hdc) if is_executable(&hdc) => Ok(()),
            Some(hdc) => Err(Error::tool_not_found(
                "hdc",
                format!("{} is not executable", hdc.display()),
            )),
            None => Err(Error::tool_not_found(
                "hdc",
                format!(
                    "no toolchains/hdc under {} ({})",
                    self.sdk_path().display(),
                    self.env_var()
                ),
            )),
        }
    }
}

/// Result of one SDK discovery pass
#[derive(Debug, Clone, Default)]
pub struct SdkDiscovery {
    pub sdk: Option<OhosSdk>,
    /// Transport binary, from the SDK or from `PATH`
    pub hdc: Option<PathBuf>,
    pub api_levels: Vec<u32>,
}

impl SdkDiscovery {
    /// Locate the SDK and its transport binary
    pub fn discover(configured: Option<&Path>) -> Self {
        let sdk = OhosSdk::locate(configured);
        let api_levels = sdk.as_ref().map(OhosSdk::api_levels).unwrap_or_default();
        let hdc = sdk
            .as_ref()
            .and_then(OhosSdk::hdc_path)
            .or_else(|| which::which(HDC_BINARY).ok());

        match (&sdk, &hdc) {
            (Some(sdk), _) => info!(
                "Found {} at {} (API levels {:?})",
                sdk.display_name(),
                sdk.sdk_path().display(),
                api_levels
            ),
            (None, Some(hdc)) => info!("No SDK configured, using hdc from PATH: {}", hdc.display()),
            (None, None) => warn!(
                "No SDK found; set {} or {}",
                OHOS_SDK_HOME_ENV, HOS_SDK_HOME_ENV
            ),
        }

        Self {
            sdk,
            hdc,
            api_levels,
        }
    }

    /// The transport binary, or an actionable error naming the variable to set
    pub fn require_hdc(&self) -> Result<&Path> {
        self.hdc.as_deref().ok_or_else(|| Error::SdkNotFound {
            env_var: self.env_var().to_string(),
        })
    }

    /// Variable the user should set to fix a missing SDK
    pub fn env_var(&self) -> &'static str {
        self.sdk
            .as_ref()
            .map(OhosSdk::env_var)
            .unwrap_or(OHOS_SDK_HOME_ENV)
    }

    pub fn latest_api_level(&self) -> Option<u32> {
        self.api_levels.last().copied()
    }
}

fn env_dir(name: &str) -> Option<PathBuf> {
    let value = std::env::var(name).ok()?;
    let path = PathBuf::from(value.trim());
    (!value.trim().is_empty() && path.is_dir()).then_some(path)
}

fn numeric_subdirectories(root: &Path) -> Vec<u32> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse().ok()))
        .collect()
}

fn harmony_api_level(sdk_pkg: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(sdk_pkg).ok()?;
    let pkg: SdkPackage = serde_json::from_str(&content)
        .inspect_err(|e| debug!("Unreadable {}: {}", sdk_pkg.display(), e))
        .ok()?;
    pkg.data.api_version.trim().parse().ok()
}
