//! Build target descriptors for the Flutter assemble graph
//!
//! The assemble engine itself is external; this module only describes the
//! targets it knows about for OpenHarmony so the build pipeline can pick the
//! right one for a platform/mode pair and check that its dependency edges
//! are complete before invoking `flutter assemble`.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::types::{BuildMode, TargetPlatform};

/// Name of the shared kernel compilation target
pub const KERNEL_SNAPSHOT: &str = "kernel_snapshot";

/// Name of the JIT application target
pub const DEBUG_APPLICATION: &str = "debug_ohos_application";

/// One node of the assemble DAG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub name: String,
    /// Input file patterns, relative to the project or engine cache
    pub inputs: Vec<String>,
    /// Output file patterns, relative to the assemble output directory
    pub outputs: Vec<String>,
    /// Names of targets that must run first
    pub dependencies: Vec<String>,
}

impl BuildTarget {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    fn inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    fn outputs(mut self, outputs: &[&str]) -> Self {
        self.outputs = outputs.iter().map(|s| s.to_string()).collect();
        self
    }

    fn depends_on(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Name of the AOT snapshot target for a platform/mode
pub fn aot_target_name(platform: TargetPlatform, mode: BuildMode) -> String {
    format!("ohos_aot_{}_{}", mode.as_arg(), platform.arch())
}

/// Name of the AOT bundle target for a platform/mode
pub fn aot_bundle_target_name(platform: TargetPlatform, mode: BuildMode) -> String {
    format!("ohos_aot_bundle_{}_{}", mode.as_arg(), platform.arch())
}

/// The set of assemble targets for OpenHarmony builds
#[derive(Debug, Clone)]
pub struct TargetCatalog {
    targets: HashMap<String, BuildTarget>,
}

impl TargetCatalog {
    /// Catalogue of every OpenHarmony target for every platform and AOT mode
    pub fn ohos() -> Self {
        let mut targets = HashMap::new();

        let kernel = BuildTarget::new(KERNEL_SNAPSHOT)
            .inputs(&["{PROJECT_DIR}/.dart_tool/package_config.json", "{PROJECT_DIR}/lib/**"])
            .outputs(&["app.dill"]);
        targets.insert(kernel.name.clone(), kernel);

        let debug = BuildTarget::new(DEBUG_APPLICATION)
            .inputs(&["app.dill", "{FLUTTER_ROOT}/bin/cache/artifacts/engine/ohos-*/*.har"])
            .outputs(&[
                "flutter_assets/kernel_blob.bin",
                "flutter_assets/vm_snapshot_data",
                "flutter_assets/isolate_snapshot_data",
                "flutter_assets/AssetManifest.bin",
            ])
            .depends_on(&[KERNEL_SNAPSHOT]);
        targets.insert(debug.name.clone(), debug);

        for platform in [TargetPlatform::OhosArm64, TargetPlatform::OhosX64] {
            for mode in [BuildMode::Profile, BuildMode::Release] {
                let aot = BuildTarget::new(aot_target_name(platform, mode))
                    .inputs(&["app.dill", "{FLUTTER_ROOT}/bin/cache/artifacts/engine/*/gen_snapshot"])
                    .outputs(&[&format!("{}/app.so", platform.abi())])
                    .depends_on(&[KERNEL_SNAPSHOT]);
                let aot_name = aot.name.clone();
                targets.insert(aot_name.clone(), aot);

                let bundle = BuildTarget::new(aot_bundle_target_name(platform, mode))
                    .inputs(&[&format!("{}/app.so", platform.abi())])
                    .outputs(&[
                        &format!("{}/app.so", platform.abi()),
                        "flutter_assets/AssetManifest.bin",
                    ])
                    .depends_on(&[&aot_name]);
                targets.insert(bundle.name.clone(), bundle);
            }
        }

        Self { targets }
    }

    pub fn get(&self, name: &str) -> Option<&BuildTarget> {
        self.targets.get(name)
    }

    /// Select the top-level target for a platform and build mode
    pub fn select(&self, platform: TargetPlatform, mode: BuildMode) -> Result<&BuildTarget> {
        let name = match mode {
            BuildMode::Debug => DEBUG_APPLICATION.to_string(),
            _ => aot_bundle_target_name(platform, mode),
        };
        self.get(&name)
            .ok_or_else(|| Error::build(format!("No build target named {}", name)))
    }

    /// Dependencies of `name` in execution order (dependencies first, `name` last).
    ///
    /// Fails on undeclared dependencies and on cycles.
    pub fn execution_order(&self, name: &str) -> Result<Vec<&BuildTarget>> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut visiting = HashSet::new();
        self.visit(name, &mut visiting, &mut done, &mut order)?;
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        visiting: &mut HashSet<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<&'a BuildTarget>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            return Err(Error::build(format!(
                "Dependency cycle detected at build target {}",
                name
            )));
        }

        let target = self
            .get(name)
            .ok_or_else(|| Error::build(format!("Undeclared build target {}", name)))?;
        for dep in &target.dependencies {
            self.visit(dep, visiting, done, order)?;
        }

        visiting.remove(name);
        done.insert(name.to_string());
        order.push(target);
        Ok(())
    }

    #[cfg(test)]
    fn insert(&mut self, target: BuildTarget) {
        self.targets.insert(target.name.clone(), target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_debug_target() {
        let catalog = TargetCatalog::ohos();
        let target = catalog
            .select(TargetPlatform::OhosX64, BuildMode::Debug)
            .unwrap();
        assert_eq!(target.name, DEBUG_APPLICATION);
    }

    #[test]
    fn test_select_release_matches_architecture() {
        let catalog = TargetCatalog::ohos();
        let arm = catalog
            .select(TargetPlatform::OhosArm64, BuildMode::Release)
            .unwrap();
        assert_eq!(arm.name, "ohos_aot_bundle_release_arm64");
        assert!(arm.outputs.iter().any(|o| o.starts_with("arm64-v8a/")));

        let x64 = catalog
            .select(TargetPlatform::OhosX64, BuildMode::Profile)
            .unwrap();
        assert_eq!(x64.name, "ohos_aot_bundle_profile_x64");
    }

    #[test]
    fn test_execution_order_dependencies_first() {
        let catalog = TargetCatalog::ohos();
        let order: Vec<_> = catalog
            .execution_order("ohos_aot_bundle_release_arm64")
            .unwrap()
            .into_iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(
            order,
            vec![
                KERNEL_SNAPSHOT,
                "ohos_aot_release_arm64",
                "ohos_aot_bundle_release_arm64"
            ]
        );
    }

    #[test]
    fn test_execution_order_rejects_undeclared() {
        let mut catalog = TargetCatalog::ohos();
        catalog.insert(BuildTarget::new("orphan").depends_on(&["missing"]));
        let err = catalog.execution_order("orphan").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_execution_order_rejects_cycle() {
        let mut catalog = TargetCatalog::ohos();
        catalog.insert(BuildTarget::new("a").depends_on(&["b"]));
        catalog.insert(BuildTarget::new("b").depends_on(&["a"]));
        let err = catalog.execution_order("a").unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }
}
