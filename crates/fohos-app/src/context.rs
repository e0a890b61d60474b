//! Per-command context: settings, SDK discovery and the project root
//!
//! Created once at the start of a command and passed to whatever needs it.
//! Nothing discovered here is cached beyond the command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fohos_core::prelude::*;
use fohos_core::{BuildInfo, BuildMode};
use fohos_daemon::{
    find_device, LaunchRequest, OhosDevice, OhosDeviceRegistry, ProcessRunner, SdkDiscovery,
};

use crate::build::{BuildPipeline, BuildTools};
use crate::config::{load_settings, Settings};
use crate::project::OhosProject;

#[derive(Debug, Clone)]
pub struct BuildContext {
    pub project_root: PathBuf,
    pub settings: Settings,
    pub sdk: SdkDiscovery,
}

impl BuildContext {
    /// Load settings for `project_root` and locate the SDK
    pub fn discover(project_root: &Path) -> Self {
        let settings = load_settings(project_root);
        let sdk = SdkDiscovery::discover(settings.sdk.path.as_deref());
        Self {
            project_root: project_root.to_path_buf(),
            settings,
            sdk,
        }
    }

    pub fn project(&self) -> Result<OhosProject> {
        OhosProject::open(&self.project_root)
    }

    /// Open the project and locate the host build tools
    pub fn pipeline<R: ProcessRunner>(&self, runner: Arc<R>) -> Result<BuildPipeline<R>> {
        let project = self.project()?;
        let tools = BuildTools::locate(&self.settings, project.ohos_dir())?;
        Ok(BuildPipeline::new(project, tools, self.sdk.clone(), runner))
    }

    pub fn registry<R: ProcessRunner>(&self, runner: Arc<R>) -> OhosDeviceRegistry<R> {
        OhosDeviceRegistry::new(&self.sdk, runner)
    }

    /// Build parameters from settings, overridden by whatever the caller passes
    pub fn build_info(&self, mode: Option<BuildMode>, flavor: Option<String>) -> BuildInfo {
        let mut info = BuildInfo::new(mode.unwrap_or(self.settings.build.mode))
            .with_flavor(flavor.unwrap_or_else(|| self.settings.build.flavor.clone()));
        info.target_file = self.settings.build.target_file.clone();
        info
    }

    pub fn launch_request(&self, mode: BuildMode, debugging: bool) -> LaunchRequest {
        LaunchRequest {
            mode,
            debugging,
            discovery_timeout: Duration::from_secs(self.settings.device.vm_service_timeout_secs),
            ..LaunchRequest::default()
        }
    }

    /// The device to use: `specifier`, else `[device] default_device`, else the only one attached
    pub async fn select_device<R: ProcessRunner>(
        &self,
        runner: Arc<R>,
        specifier: Option<&str>,
    ) -> Result<OhosDevice<R>> {
        self.sdk.require_hdc()?;
        let registry = self.registry(runner);
        let timeout = Duration::from_secs(self.settings.device.discovery_timeout_secs);
        let ids = registry.discover_with_timeout(timeout).await?.device_ids;

        let specifier = specifier.or(self.settings.device.default_device.as_deref());
        let id = match specifier {
            Some(spec) => find_device(&ids, spec)
                .cloned()
                .ok_or_else(|| Error::config(format!("No attached device matches '{}'", spec)))?,
            None => match ids.as_slice() {
                [only] => only.clone(),
                [] => return Err(Error::config("No OpenHarmony devices attached")),
                _ => {
                    return Err(Error::config(format!(
                        "{} devices attached, choose one with --device: {}",
                        ids.len(),
                        ids.join(", ")
                    )))
                }
            },
        };

        registry
            .devices()
            .await?
            .into_iter()
            .find(|d| d.id() == id)
            .ok_or_else(|| Error::config(format!("Device {} disconnected", id)))
    }
}
