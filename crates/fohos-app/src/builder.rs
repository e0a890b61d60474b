//! [`HapBuilder`] backed by the build pipeline, used when a launch has no package

use fohos_core::prelude::*;
use fohos_core::{BuildInfo, BuildMode, TargetPlatform};
use fohos_daemon::{HapBuilder, OhosHap, ProcessRunner};

use crate::build::BuildPipeline;

pub struct PipelineHapBuilder<'a, R> {
    pipeline: &'a BuildPipeline<R>,
    info: BuildInfo,
}

impl<'a, R> PipelineHapBuilder<'a, R> {
    /// `info` supplies flavor, version and entry point; mode comes from the launch
    pub fn new(pipeline: &'a BuildPipeline<R>, info: BuildInfo) -> Self {
        Self { pipeline, info }
    }
}

impl<R: ProcessRunner> HapBuilder for PipelineHapBuilder<'_, R> {
    async fn build_hap(&self, platform: TargetPlatform, mode: BuildMode) -> Result<Option<OhosHap>> {
        let info = BuildInfo {
            mode,
            ..self.info.clone()
        };
        let artifacts = self.pipeline.build_hap(&info, &[platform]).await?;
        self.pipeline.project().installable_package(
            info.flavor_or_default(),
            artifacts.hap,
            artifacts.shared,
        )
    }
}

/// Hands out an already-built package (`--use-application-binary`)
pub struct PrebuiltHap(pub OhosHap);

impl HapBuilder for PrebuiltHap {
    async fn build_hap(&self, platform: TargetPlatform, mode: BuildMode) -> Result<Option<OhosHap>> {
        debug!("Using prebuilt {} for {} {}", self.0.hap.display(), platform, mode);
        Ok(Some(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::build::BuildTools;
    use crate::project::{fixtures, OhosProject};
    use fohos_daemon::test_utils::FakeProcessRunner;
    use fohos_daemon::SdkDiscovery;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_builds_package_for_launch_mode() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fixtures::app_project(root, &[("entry", "entry")]);
        fixtures::write(
            &root.join("flutter/bin/cache/artifacts/engine/ohos-arm64-profile/flutter.har"),
            "x",
        );
        let intermediates = root.join("build/ohos/intermediates/flutter/profile");
        fixtures::write(&intermediates.join("flutter_assets/AssetManifest.bin"), "x");
        fixtures::write(&intermediates.join("arm64-v8a/app.so"), "x");
        let hap = root.join("ohos/entry/build/store/outputs/store/entry-store-signed.hap");
        fixtures::write(&hap, "x");

        let runner = Arc::new(FakeProcessRunner::new());
        let pipeline = BuildPipeline::new(
            OhosProject::open(root).unwrap(),
            BuildTools {
                flutter: root.join("flutter/bin/flutter"),
                node: root.join("node/bin/node"),
                hvigorw: root.join("hvigorw.js"),
                ohpm: root.join("ohpm"),
            },
            SdkDiscovery::default(),
            runner.clone(),
        );
        let builder = PipelineHapBuilder::new(&pipeline, BuildInfo::default().with_flavor("store"));

        let package = builder
            .build_hap(TargetPlatform::OhosArm64, BuildMode::Profile)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(package.bundle_name, "com.example.store");
        assert_eq!(package.entry_ability, "EntryAbility");
        assert_eq!(package.hap, hap);
        assert!(runner.calls()[0].contains("-dBuildMode=profile"));
    }
}
