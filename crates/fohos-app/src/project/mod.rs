//! The OpenHarmony side of a Flutter project
//!
//! An application keeps its OpenHarmony project in `ohos/`; a Flutter module
//! (declared with `module:` in `pubspec.yaml`) keeps it in `.ohos/` with the
//! embeddable library in `.ohos/flutter_module`.
//!
//! Nothing here is cached: every accessor re-reads the descriptor files, since
//! a build rewrites them as it goes.

pub mod descriptor;
pub mod local_properties;
pub mod plugins;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use descriptor::{
    read_descriptor, write_descriptor, AppDescriptor, BuildProfile, ModuleDescriptor,
    PackageManifest,
};
use fohos_core::prelude::*;
use fohos_core::{BuildInfo, ModuleKind, DEFAULT_VERSION_CODE, DEFAULT_VERSION_NAME};
use fohos_daemon::OhosHap;

pub use local_properties::LocalProperties;
pub use plugins::{load_plugins, OhosPlugin};

/// `module:` nested under `flutter:` in pubspec.yaml
static PUBSPEC_MODULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s+module:\s*$").expect("Invalid pubspec module regex"));

pub const FLUTTER_MODULE_NAME: &str = "flutter_module";

/// A module listed in `build-profile.json5`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OhosModule {
    pub name: String,
    /// Absolute module directory
    pub dir: PathBuf,
    pub kind: ModuleKind,
    pub main_element: Option<String>,
}

impl OhosModule {
    /// `<dir>/build/<flavor>/outputs/<flavor>`
    pub fn outputs_dir(&self, flavor: &str) -> PathBuf {
        self.dir
            .join("build")
            .join(flavor)
            .join("outputs")
            .join(flavor)
    }
}

#[derive(Debug, Clone)]
pub struct OhosProject {
    root: PathBuf,
    ohos_dir: PathBuf,
    is_module: bool,
}

impl OhosProject {
    /// Open the OpenHarmony project of the Flutter project at `root`
    pub fn open(root: &Path) -> Result<Self> {
        let is_module = std::fs::read_to_string(root.join("pubspec.yaml"))
            .map(|pubspec| PUBSPEC_MODULE.is_match(&pubspec))
            .unwrap_or(false);
        let ohos_dir = root.join(if is_module { ".ohos" } else { "ohos" });

        if !ohos_dir.is_dir() {
            return Err(Error::NoProject {
                path: root.to_path_buf(),
            });
        }
        Ok(Self {
            root: root.to_path_buf(),
            ohos_dir,
            is_module,
        })
    }

    /// Flutter project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ohos_dir(&self) -> &Path {
        &self.ohos_dir
    }

    pub fn is_module(&self) -> bool {
        self.is_module
    }

    pub fn flutter_module_dir(&self) -> PathBuf {
        self.ohos_dir.join(FLUTTER_MODULE_NAME)
    }

    /// Staging directory for packaged `.har` files
    pub fn har_dir(&self) -> PathBuf {
        self.ohos_dir.join("har")
    }

    /// Host-side build intermediates (`<root>/build/ohos`)
    pub fn build_dir(&self) -> PathBuf {
        self.root.join("build").join("ohos")
    }

    pub fn app_descriptor_path(&self) -> PathBuf {
        self.ohos_dir.join("AppScope").join("app.json5")
    }

    pub fn build_profile_path(&self) -> PathBuf {
        self.ohos_dir.join("build-profile.json5")
    }

    pub fn package_manifest_path(&self) -> PathBuf {
        self.ohos_dir.join("oh-package.json5")
    }

    pub fn local_properties_path(&self) -> PathBuf {
        self.ohos_dir.join("local.properties")
    }

    // ─────────────────────────────────────────────────────────────
    // Descriptors
    // ─────────────────────────────────────────────────────────────

    pub fn read_app(&self) -> Result<AppDescriptor> {
        read_descriptor(&self.app_descriptor_path())
    }

    pub fn write_app(&self, app: &AppDescriptor) -> Result<()> {
        write_descriptor(&self.app_descriptor_path(), app)
    }

    pub fn read_build_profile(&self) -> Result<BuildProfile> {
        read_descriptor(&self.build_profile_path())
    }

    pub fn write_build_profile(&self, profile: &BuildProfile) -> Result<()> {
        write_descriptor(&self.build_profile_path(), profile)
    }

    pub fn read_package_manifest(&self) -> Result<PackageManifest> {
        read_descriptor(&self.package_manifest_path())
    }

    pub fn write_package_manifest(&self, manifest: &PackageManifest) -> Result<()> {
        write_descriptor(&self.package_manifest_path(), manifest)
    }

    pub fn local_properties(&self) -> Result<LocalProperties> {
        LocalProperties::load(&self.local_properties_path())
    }

    // ─────────────────────────────────────────────────────────────
    // Modules
    // ─────────────────────────────────────────────────────────────

    /// Modules in `build-profile.json5` order
    pub fn modules(&self) -> Result<Vec<OhosModule>> {
        let profile = self.read_build_profile()?;
        profile
            .modules
            .iter()
            .map(|entry| {
                let dir = self.ohos_dir.join(&entry.src_path);
                let dir = dunce::canonicalize(&dir).unwrap_or(dir);
                let descriptor_path = dir.join("src").join("main").join("module.json5");
                let descriptor: ModuleDescriptor = read_descriptor(&descriptor_path)?;
                Ok(OhosModule {
                    name: entry.name.clone(),
                    dir,
                    kind: descriptor.module.kind(),
                    main_element: descriptor.module.main_element,
                })
            })
            .collect()
    }

    pub fn modules_of_kind(&self, kind: ModuleKind) -> Result<Vec<OhosModule>> {
        Ok(self
            .modules()?
            .into_iter()
            .filter(|m| m.kind == kind)
            .collect())
    }

    /// The module an installable package is built from
    pub fn entry_module(&self) -> Result<OhosModule> {
        self.modules_of_kind(ModuleKind::Entry)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::MissingEntryModule {
                path: self.build_profile_path(),
            })
    }

    /// Bundle id for `flavor`: the product's override, else the app's
    pub fn bundle_name(&self, flavor: &str) -> Result<String> {
        let profile = self.read_build_profile()?;
        if let Some(name) = profile.product(flavor).and_then(|p| p.bundle_name.clone()) {
            return Ok(name);
        }
        Ok(self.read_app()?.app.bundle_name)
    }

    /// Stamp version code and name into `app.json5`.
    ///
    /// Each value comes from `info`, else the descriptor, else the defaults.
    pub fn update_project_version(&self, info: &BuildInfo) -> Result<()> {
        let mut app = self.read_app()?;

        let code = match (&info.build_number, app.app.version_code) {
            (Some(number), _) => number.trim().to_string(),
            (None, Some(existing)) => existing.to_string(),
            (None, None) => DEFAULT_VERSION_CODE.to_string(),
        };
        let code: u64 = code.parse().map_err(|_| {
            Error::build(format!("Version code must be a non-negative integer, got '{}'", code))
        })?;
        let name = info
            .build_name
            .clone()
            .or_else(|| app.app.version_name.clone())
            .unwrap_or_else(|| DEFAULT_VERSION_NAME.to_string());

        info!("Setting version {} ({})", name, code);
        app.app.version_code = Some(code);
        app.app.version_name = Some(name);
        self.write_app(&app)
    }

    /// Package handle for an installed build of this project
    pub fn installable_package(
        &self,
        flavor: &str,
        hap: PathBuf,
        shared: Vec<PathBuf>,
    ) -> Result<Option<OhosHap>> {
        if !hap.exists() {
            return Ok(None);
        }
        let entry = self.entry_module()?;
        let entry_ability = entry.main_element.ok_or_else(|| {
            Error::malformed(
                entry.dir.join("src").join("main").join("module.json5"),
                "entry module has no mainElement",
            )
        })?;
        Ok(Some(OhosHap {
            bundle_name: self.bundle_name(flavor)?,
            entry_ability,
            hap,
            shared,
        }))
    }
}
