//! Device discovery using `hdc list targets`

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::device::OhosDevice;
use crate::hdc::HdcCommandBuilder;
use crate::process::{is_executable, ProcessRunner};
use crate::sdk::SdkDiscovery;
use fohos_core::prelude::*;

/// Default timeout for `hdc list targets`
pub const DEVICES_TIMEOUT: Duration = Duration::from_secs(30);

/// Substrings hdc prints instead of device ids when nothing is reachable
const NO_DEVICE_SENTINELS: &[&str] = &["[Empty]", "Connect server failed", "[Fail]"];

/// Result of one discovery pass
#[derive(Debug, Clone, Default)]
pub struct DeviceDiscoveryResult {
    /// Device tokens, used as both identity and display name
    pub device_ids: Vec<String>,
    /// Transport messages that were not device entries
    pub diagnostics: Vec<String>,
    pub elapsed: Duration,
}

/// Enumerates devices reachable through one transport binary
pub struct OhosDeviceRegistry<R> {
    hdc: Option<HdcCommandBuilder>,
    env_var: &'static str,
    runner: Arc<R>,
}

impl<R: ProcessRunner> OhosDeviceRegistry<R> {
    /// Registry over the discovered transport. A non-executable hdc counts as absent.
    pub fn new(sdk: &SdkDiscovery, runner: Arc<R>) -> Self {
        let hdc = sdk.hdc.as_ref().filter(|path| {
            let usable = is_executable(path);
            if !usable {
                warn!("hdc at {} is not executable", path.display());
            }
            usable
        });
        Self {
            hdc: hdc.map(HdcCommandBuilder::new),
            env_var: sdk.env_var(),
            runner,
        }
    }

    /// Registry over an explicit transport builder
    pub fn with_hdc(hdc: HdcCommandBuilder, env_var: &'static str, runner: Arc<R>) -> Self {
        Self {
            hdc: Some(hdc),
            env_var,
            runner,
        }
    }

    pub fn hdc(&self) -> Option<&HdcCommandBuilder> {
        self.hdc.as_ref()
    }

    /// Discover devices with the default timeout
    pub async fn discover(&self) -> Result<DeviceDiscoveryResult> {
        self.discover_with_timeout(DEVICES_TIMEOUT).await
    }

    /// Discover devices.
    ///
    /// Returns an empty result when no usable transport binary exists. A
    /// transport process that cannot run, exits non-zero or exceeds
    /// `timeout_duration` is an environment error naming the SDK variable.
    pub async fn discover_with_timeout(
        &self,
        timeout_duration: Duration,
    ) -> Result<DeviceDiscoveryResult> {
        let start = Instant::now();

        let Some(hdc) = self.hdc.as_ref() else {
            debug!("No hdc available, skipping device discovery");
            return Ok(DeviceDiscoveryResult::default());
        };
        let command = hdc.command(None, &["list", "targets"]);
        let unavailable = |reason: String| Error::TransportUnavailable {
            program: command.command_line(),
            env_var: self.env_var.to_string(),
            reason,
        };

        let output = match timeout(timeout_duration, self.runner.run(&command)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(unavailable(e.to_string())),
            Err(_) => {
                return Err(unavailable(format!(
                    "timed out after {}s",
                    timeout_duration.as_secs()
                )))
            }
        };
        if !output.success() {
            return Err(unavailable(output.combined().trim().to_string()));
        }

        let (device_ids, diagnostics) = parse_list_targets(&output.stdout);
        for message in &diagnostics {
            info!("hdc: {}", message);
        }

        let result = DeviceDiscoveryResult {
            device_ids,
            diagnostics,
            elapsed: start.elapsed(),
        };
        info!(
            "Discovered {} device(s) in {:?}",
            result.device_ids.len(),
            result.elapsed
        );
        Ok(result)
    }

    /// Discover devices and build a handle for each
    pub async fn devices(&self) -> Result<Vec<OhosDevice<R>>> {
        let Some(hdc) = self.hdc.as_ref() else {
            return Ok(Vec::new());
        };
        let result = self.discover().await?;
        Ok(result
            .device_ids
            .into_iter()
            .map(|id| OhosDevice::new(id, hdc.clone(), Arc::clone(&self.runner)))
            .collect())
    }
}

/// Split `list targets` output into device tokens and diagnostic messages
pub fn parse_list_targets(output: &str) -> (Vec<String>, Vec<String>) {
    let lines = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);

    if NO_DEVICE_SENTINELS.iter().any(|s| output.contains(s)) {
        return (Vec::new(), lines.collect());
    }
    (lines.collect(), Vec::new())
}

/// Find a device id by exact match, then by prefix
pub fn find_device<'a>(device_ids: &'a [String], specifier: &str) -> Option<&'a String> {
    device_ids
        .iter()
        .find(|id| id.as_str() == specifier)
        .or_else(|| device_ids.iter().find(|id| id.starts_with(specifier)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RunOutput;
    use crate::sdk::OHOS_SDK_HOME_ENV;
    use crate::test_utils::FakeProcessRunner;

    fn registry(runner: &Arc<FakeProcessRunner>) -> OhosDeviceRegistry<FakeProcessRunner> {
        OhosDeviceRegistry::with_hdc(
            HdcCommandBuilder::with_server("hdc", None),
            OHOS_SDK_HOME_ENV,
            Arc::clone(runner),
        )
    }

    #[test]
    fn test_parse_device_lines() {
        let (ids, diags) = parse_list_targets("FMR0223C13000649\n\n  127.0.0.1:5555  \n");
        assert_eq!(ids, vec!["FMR0223C13000649", "127.0.0.1:5555"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_parse_sentinels_are_diagnostics() {
        for output in ["[Empty]\n", "Connect server failed\n", "[Fail]ExecuteCommand need connect-key?\n"] {
            let (ids, diags) = parse_list_targets(output);
            assert!(ids.is_empty(), "{output}");
            assert_eq!(diags.len(), 1);
        }
    }

    #[test]
    fn test_find_device() {
        let ids = vec!["FMR0223C13000649".to_string(), "127.0.0.1:5555".to_string()];
        assert_eq!(find_device(&ids, "127.0.0.1:5555"), Some(&ids[1]));
        assert_eq!(find_device(&ids, "FMR"), Some(&ids[0]));
        assert_eq!(find_device(&ids, "nope"), None);
    }

    #[tokio::test]
    async fn test_discover_empty_sentinel() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("list targets", RunOutput::ok("[Empty]\n"));
        let result = registry(&runner).discover().await.unwrap();
        assert!(result.device_ids.is_empty());
        assert_eq!(result.diagnostics, vec!["[Empty]"]);
        assert_eq!(runner.calls(), vec!["list targets"]);
    }

    #[tokio::test]
    async fn test_discover_devices() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("list targets", RunOutput::ok("dev1\ndev2\n"));
        let reg = registry(&runner);
        let devices = reg.devices().await.unwrap();
        let ids: Vec<_> = devices.iter().map(|d| d.id().to_string()).collect();
        assert_eq!(ids, vec!["dev1", "dev2"]);
    }

    #[tokio::test]
    async fn test_discover_failure_names_env_var() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("list targets", RunOutput::failed(1, "boom"));
        let err = registry(&runner).discover().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains(OHOS_SDK_HOME_ENV));
    }

    #[tokio::test]
    async fn test_discover_without_hdc_is_empty() {
        let runner = Arc::new(FakeProcessRunner::new());
        let reg = OhosDeviceRegistry::new(&SdkDiscovery::default(), Arc::clone(&runner));
        let result = reg.discover().await.unwrap();
        assert!(result.device_ids.is_empty());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_discover_with_non_executable_hdc_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let hdc = dir.path().join("hdc");
        std::fs::write(&hdc, "").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&hdc, std::fs::Permissions::from_mode(0o644)).unwrap();
        }

        let sdk = SdkDiscovery {
            hdc: Some(hdc),
            ..Default::default()
        };
        let runner = Arc::new(FakeProcessRunner::new());
        let reg = OhosDeviceRegistry::new(&sdk, Arc::clone(&runner));
        let result = reg.discover().await.unwrap();
        assert!(result.device_ids.is_empty());
        assert!(runner.calls().is_empty());
    }
}
