//! Typed views of the json5 project descriptors
//!
//! Each descriptor keeps every key it does not model in a flattened `extra`
//! map, so a read-modify-write cycle only changes the fields it touches.
//! Files are read with `json5` and written back as pretty JSON (a json5
//! subset) under an exclusive lock.

use std::io::Write;
use std::path::Path;

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use fohos_core::prelude::*;
use fohos_core::ModuleKind;

/// Read and decode a json5 descriptor
pub fn read_descriptor<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::malformed(path, format!("cannot read: {}", e)))?;
    json5::from_str(&content).map_err(|e| Error::malformed(path, e.to_string()))
}

/// Encode and write a descriptor.
///
/// Waits for an exclusive lock on the existing file, then replaces it through
/// a temp file and rename so readers never see a partial descriptor.
pub fn write_descriptor<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');

    let target = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Opening {}", path.display()))?;
    target.lock_exclusive()?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let written = write_temp(&temp_path, &content).and_then(|_| std::fs::rename(&temp_path, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err::<(), _>(e).with_context(|| format!("Replacing {}", path.display()));
    }

    // Lock released when `target` drops
    drop(target);
    debug!("Wrote {}", path.display());
    Ok(())
}

fn write_temp(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

// ─────────────────────────────────────────────────────────────────────────────
// AppScope/app.json5
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDescriptor {
    pub app: AppSection,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSection {
    pub bundle_name: String,

    #[serde(default)]
    pub version_code: Option<u64>,

    #[serde(default)]
    pub version_name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// <module>/src/main/module.json5
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub module: ModuleSection,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSection {
    pub name: String,

    #[serde(rename = "type")]
    pub type_name: String,

    /// Ability launched by `aa start`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_element: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModuleSection {
    pub fn kind(&self) -> ModuleKind {
        ModuleKind::from_type_name(&self.type_name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// build-profile.json5
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildProfile {
    #[serde(default)]
    pub app: BuildProfileApp,

    #[serde(default)]
    pub modules: Vec<ModuleEntry>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProfileApp {
    #[serde(default)]
    pub signing_configs: Vec<Value>,

    #[serde(default)]
    pub products: Vec<Product>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A product flavor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_config: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleEntry {
    pub name: String,

    /// Relative to the `ohos` directory, or absolute
    pub src_path: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModuleEntry {
    pub fn new(name: impl Into<String>, src_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            src_path: src_path.into(),
            extra: Map::new(),
        }
    }
}

impl BuildProfile {
    pub fn product(&self, flavor: &str) -> Option<&Product> {
        self.app.products.iter().find(|p| p.name == flavor)
    }

    pub fn has_signing_config(&self) -> bool {
        !self.app.signing_configs.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// oh-package.json5
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub dependencies: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub overrides: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_waits_for_lock_and_never_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("oh-package.json5");
        let original = "{ dependencies: { foo: 'file:./foo' } }";
        std::fs::write(&path, original).unwrap();

        let holder = std::fs::File::open(&path).unwrap();
        holder.lock_exclusive().unwrap();

        let writer = {
            let path = path.clone();
            std::thread::spawn(move || {
                write_descriptor(&path, &serde_json::json!({ "dependencies": {} }))
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);

        holder.unlock().unwrap();
        writer.join().unwrap().unwrap();

        let written: Value = read_descriptor(&path).unwrap();
        assert_eq!(written, serde_json::json!({ "dependencies": {} }));
        assert!(!dir.path().join(".oh-package.json5.tmp").exists());
    }

    #[test]
    fn test_app_descriptor_with_comments_and_nulls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.json5");
        std::fs::write(
            &path,
            r#"{
  // Application scope
  app: {
    bundleName: 'com.example.demo',
    vendor: 'example',
    versionCode: null,
    versionName: null,
    icon: '$media:app_icon',
  },
}"#,
        )
        .unwrap();

        let app: AppDescriptor = read_descriptor(&path).unwrap();
        assert_eq!(app.app.bundle_name, "com.example.demo");
        assert_eq!(app.app.version_code, None);
        assert_eq!(app.app.extra["vendor"], "example");
        assert_eq!(app.app.extra["icon"], "$media:app_icon");
    }

    #[test]
    fn test_malformed_descriptor_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build-profile.json5");
        std::fs::write(&path, "{ modules: [ { name: 'entry' } ] }").unwrap();

        let err = read_descriptor::<BuildProfile>(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedDescriptor { .. }));
        assert!(err.to_string().contains("build-profile.json5"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_file_is_malformed() {
        let err = read_descriptor::<PackageManifest>(Path::new("/nonexistent/oh-package.json5"))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedDescriptor { .. }));
    }

    #[test]
    fn test_build_profile_round_trip_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build-profile.json5");
        std::fs::write(
            &path,
            r#"{
  app: {
    signingConfigs: [],
    products: [{ name: 'default', signingConfig: 'default', compatibleSdkVersion: '5.0.0(12)' }],
    buildModeSet: [{ name: 'debug' }],
  },
  modules: [{ name: 'entry', srcPath: './entry', targets: [{ name: 'default', applyToProducts: ['default'] }] }],
}"#,
        )
        .unwrap();

        let mut profile: BuildProfile = read_descriptor(&path).unwrap();
        assert!(!profile.has_signing_config());
        assert_eq!(
            profile.product("default").unwrap().signing_config.as_deref(),
            Some("default")
        );
        profile.modules.push(ModuleEntry::new("plugin", "/plugins/plugin/ohos"));
        write_descriptor(&path, &profile).unwrap();

        let reread: BuildProfile = read_descriptor(&path).unwrap();
        assert_eq!(reread, profile);
        assert!(reread.app.extra.contains_key("buildModeSet"));
        assert!(reread.modules[0].extra.contains_key("targets"));
        assert_eq!(
            reread.app.products[0].extra["compatibleSdkVersion"],
            "5.0.0(12)"
        );
    }

    #[test]
    fn test_module_kind() {
        let module: ModuleDescriptor = json5::from_str(
            "{ module: { name: 'entry', type: 'entry', mainElement: 'EntryAbility' } }",
        )
        .unwrap();
        assert_eq!(module.module.kind(), ModuleKind::Entry);
        assert_eq!(module.module.main_element.as_deref(), Some("EntryAbility"));

        let feature: ModuleDescriptor =
            json5::from_str("{ module: { name: 'f', type: 'feature' } }").unwrap();
        assert_eq!(feature.module.kind(), ModuleKind::Unknown);
    }
}
