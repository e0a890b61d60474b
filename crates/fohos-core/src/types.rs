//! Core domain types shared by the transport and build layers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default product flavor used when none is requested
pub const DEFAULT_FLAVOR: &str = "default";

/// Version code written when neither build info nor the descriptor carries one
pub const DEFAULT_VERSION_CODE: &str = "1000000";

/// Version name written when neither build info nor the descriptor carries one
pub const DEFAULT_VERSION_NAME: &str = "1.0.0";

// ─────────────────────────────────────────────────────────────────────────────
// Target Platform
// ─────────────────────────────────────────────────────────────────────────────

/// Target CPU architecture of an OpenHarmony device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetPlatform {
    #[serde(rename = "ohos-arm64")]
    OhosArm64,
    #[serde(rename = "ohos-x64")]
    OhosX64,
}

impl TargetPlatform {
    /// Name used by `flutter assemble -dTargetPlatform=`
    pub fn name(&self) -> &'static str {
        match self {
            TargetPlatform::OhosArm64 => "ohos-arm64",
            TargetPlatform::OhosX64 => "ohos-x64",
        }
    }

    /// ABI directory name used under `libs/`
    pub fn abi(&self) -> &'static str {
        match self {
            TargetPlatform::OhosArm64 => "arm64-v8a",
            TargetPlatform::OhosX64 => "x86_64",
        }
    }

    /// Short architecture token used in build target names
    pub fn arch(&self) -> &'static str {
        match self {
            TargetPlatform::OhosArm64 => "arm64",
            TargetPlatform::OhosX64 => "x64",
        }
    }

    /// Resolve the platform from the device's `const.product.cpu.abilist` value.
    ///
    /// Unreadable or unrecognised values resolve to [`TargetPlatform::OhosArm64`].
    pub fn from_abi_list(abi_list: &str) -> Self {
        let value = abi_list.trim().to_lowercase();
        if value.contains("arm64") {
            TargetPlatform::OhosArm64
        } else if value.contains("x86_64") {
            TargetPlatform::OhosX64
        } else {
            TargetPlatform::OhosArm64
        }
    }

    /// Parse a platform name such as `ohos-arm64`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ohos-arm64" | "arm64" => Some(TargetPlatform::OhosArm64),
            "ohos-x64" | "x64" => Some(TargetPlatform::OhosX64),
            _ => None,
        }
    }

    /// Whether a build of the given mode can run on this platform.
    ///
    /// x64 targets are emulators and only run JIT (debug) builds.
    pub fn supports_mode(&self, mode: BuildMode) -> bool {
        match self {
            TargetPlatform::OhosArm64 => true,
            TargetPlatform::OhosX64 => mode == BuildMode::Debug,
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Build Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Flutter build mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Debug,
    Profile,
    Release,
}

impl BuildMode {
    pub fn as_arg(&self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Profile => "profile",
            BuildMode::Release => "release",
        }
    }

    /// Whether this mode is compiled ahead of time
    pub fn is_aot(&self) -> bool {
        !matches!(self, BuildMode::Debug)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "debug" => Some(BuildMode::Debug),
            "profile" => Some(BuildMode::Profile),
            "release" => Some(BuildMode::Release),
            _ => None,
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module Kind
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of an OpenHarmony project module, as declared in `module.json5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// The application's primary launchable module (`entry`)
    Entry,
    /// Static library module (`har`)
    Library,
    /// Shared library module (`shared`, produces `.hsp`)
    Shared,
    Unknown,
}

impl ModuleKind {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "entry" => ModuleKind::Entry,
            "har" => ModuleKind::Library,
            "shared" => ModuleKind::Shared,
            _ => ModuleKind::Unknown,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ModuleKind::Entry => "entry",
            ModuleKind::Library => "har",
            ModuleKind::Shared => "shared",
            ModuleKind::Unknown => "unknown",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Build Info
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters of one build invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub mode: BuildMode,
    /// Product flavor; `None` means [`DEFAULT_FLAVOR`]
    pub flavor: Option<String>,
    /// Version code override (e.g. `--build-number`)
    pub build_number: Option<String>,
    /// Version name override (e.g. `--build-name`)
    pub build_name: Option<String>,
    /// Dart entry point, relative to the Flutter project
    pub target_file: String,
}

impl BuildInfo {
    pub fn new(mode: BuildMode) -> Self {
        Self {
            mode,
            flavor: None,
            build_number: None,
            build_name: None,
            target_file: "lib/main.dart".to_string(),
        }
    }

    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavor = Some(flavor.into());
        self
    }

    pub fn with_version(mut self, build_number: impl Into<String>, build_name: impl Into<String>) -> Self {
        self.build_number = Some(build_number.into());
        self.build_name = Some(build_name.into());
        self
    }

    /// The flavor to build, falling back to [`DEFAULT_FLAVOR`]
    pub fn flavor_or_default(&self) -> &str {
        self.flavor.as_deref().unwrap_or(DEFAULT_FLAVOR)
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::new(BuildMode::Debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_abi_list() {
        assert_eq!(
            TargetPlatform::from_abi_list("arm64-v8a"),
            TargetPlatform::OhosArm64
        );
        assert_eq!(
            TargetPlatform::from_abi_list("x86_64\n"),
            TargetPlatform::OhosX64
        );
    }

    #[test]
    fn test_platform_unrecognised_defaults_to_arm64() {
        assert_eq!(TargetPlatform::from_abi_list(""), TargetPlatform::OhosArm64);
        assert_eq!(
            TargetPlatform::from_abi_list("[Fail]param get failed"),
            TargetPlatform::OhosArm64
        );
    }

    #[test]
    fn test_platform_names() {
        assert_eq!(TargetPlatform::OhosArm64.name(), "ohos-arm64");
        assert_eq!(TargetPlatform::OhosX64.abi(), "x86_64");
        assert_eq!(TargetPlatform::from_name("ohos-x64"), Some(TargetPlatform::OhosX64));
        assert_eq!(TargetPlatform::from_name("android-arm"), None);
    }

    #[test]
    fn test_x64_only_supports_debug() {
        assert!(TargetPlatform::OhosX64.supports_mode(BuildMode::Debug));
        assert!(!TargetPlatform::OhosX64.supports_mode(BuildMode::Release));
        assert!(TargetPlatform::OhosArm64.supports_mode(BuildMode::Release));
    }

    #[test]
    fn test_module_kind_from_type_name() {
        assert_eq!(ModuleKind::from_type_name("entry"), ModuleKind::Entry);
        assert_eq!(ModuleKind::from_type_name("har"), ModuleKind::Library);
        assert_eq!(ModuleKind::from_type_name("shared"), ModuleKind::Shared);
        assert_eq!(ModuleKind::from_type_name("feature"), ModuleKind::Unknown);
    }

    #[test]
    fn test_build_info_flavor_default() {
        let info = BuildInfo::new(BuildMode::Release);
        assert_eq!(info.flavor_or_default(), "default");
        assert_eq!(info.with_flavor("free").flavor_or_default(), "free");
    }

    #[test]
    fn test_build_mode_parse() {
        assert_eq!(BuildMode::from_name("Release"), Some(BuildMode::Release));
        assert!(BuildMode::Profile.is_aot());
        assert!(!BuildMode::Debug.is_aot());
    }
}
