//! Flutter plugins with OpenHarmony implementations
//!
//! Plugins are listed by `flutter pub get` in `.flutter-plugins-dependencies`.
//! During a build each plugin's `ohos` directory is wired into the project as
//! a source module, packaged into a `.har`, and then rewired to consume that
//! packaged artifact instead.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use super::descriptor::{BuildProfile, ModuleEntry, PackageManifest};
use fohos_core::prelude::*;

pub const PLUGINS_DEPENDENCIES_FILE: &str = ".flutter-plugins-dependencies";

/// One plugin with an OpenHarmony implementation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OhosPlugin {
    pub name: String,
    /// Plugin package root
    pub path: PathBuf,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl OhosPlugin {
    /// The plugin's OpenHarmony module directory
    pub fn module_dir(&self) -> PathBuf {
        self.path.join("ohos")
    }

    /// Where the packaged plugin lands in the project's staging directory
    pub fn har_file_name(&self) -> String {
        format!("{}.har", self.name)
    }
}

#[derive(Debug, Deserialize)]
struct PluginsFile {
    #[serde(default)]
    plugins: PluginsByPlatform,
}

#[derive(Debug, Default, Deserialize)]
struct PluginsByPlatform {
    #[serde(default)]
    ohos: Vec<OhosPlugin>,
}

/// Plugins of the Flutter project at `root`; none when the file is absent
pub fn load_plugins(root: &Path) -> Result<Vec<OhosPlugin>> {
    let path = root.join(PLUGINS_DEPENDENCIES_FILE);
    if !path.exists() {
        debug!("No {} in {}", PLUGINS_DEPENDENCIES_FILE, root.display());
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&path)?;
    let file: PluginsFile =
        serde_json::from_str(&content).map_err(|e| Error::malformed(&path, e.to_string()))?;

    let plugins = file
        .plugins
        .ohos
        .into_iter()
        .map(|mut plugin| {
            plugin.path = dunce::canonicalize(&plugin.path).unwrap_or(plugin.path);
            plugin
        })
        .collect::<Vec<_>>();
    debug!("Found {} OpenHarmony plugin(s)", plugins.len());
    Ok(plugins)
}

fn source_dependency(plugin: &OhosPlugin) -> Value {
    Value::String(format!("file:{}", plugin.module_dir().display()))
}

fn har_dependency(plugin: &OhosPlugin) -> Value {
    Value::String(format!("file:./har/{}", plugin.har_file_name()))
}

fn module_src_path(plugin: &OhosPlugin) -> String {
    plugin.module_dir().display().to_string()
}

/// Add each plugin as a build module; existing entries with the same name are kept
pub fn register_modules(profile: &mut BuildProfile, plugins: &[OhosPlugin]) {
    for plugin in plugins {
        if profile.modules.iter().any(|m| m.name == plugin.name) {
            continue;
        }
        profile
            .modules
            .push(ModuleEntry::new(&plugin.name, module_src_path(plugin)));
    }
}

/// Remove plugin build modules added by [`register_modules`].
///
/// Only entries pointing at a plugin's module directory are removed; a project
/// module that shares a plugin's name stays.
pub fn deregister_modules(profile: &mut BuildProfile, plugins: &[OhosPlugin]) {
    profile.modules.retain(|m| {
        !plugins
            .iter()
            .any(|p| p.name == m.name && module_src_path(p) == m.src_path)
    });
}

/// Depend on and override each plugin by its source directory
pub fn use_source_dependencies(manifest: &mut PackageManifest, plugins: &[OhosPlugin]) {
    for plugin in plugins {
        manifest
            .dependencies
            .insert(plugin.name.clone(), source_dependency(plugin));
        manifest
            .overrides
            .insert(plugin.name.clone(), source_dependency(plugin));
    }
}

/// Depend on and override each plugin by its packaged `.har`
pub fn use_har_dependencies(manifest: &mut PackageManifest, plugins: &[OhosPlugin]) {
    for plugin in plugins {
        manifest
            .dependencies
            .insert(plugin.name.clone(), har_dependency(plugin));
        manifest
            .overrides
            .insert(plugin.name.clone(), har_dependency(plugin));
    }
}

/// Wire plugins through overrides only, as a library consumed by another app
pub fn use_har_overrides(manifest: &mut PackageManifest, plugins: &[OhosPlugin]) {
    for plugin in plugins {
        manifest.dependencies.remove(&plugin.name);
        manifest
            .overrides
            .insert(plugin.name.clone(), har_dependency(plugin));
    }
}
