//! One attached device: install lifecycle, app launch and device services
//!
//! A handle owns its transport state: a cached architecture, at most one live
//! and one past-log [`LogReader`] (created on first use), and a
//! [`PortForwarder`] whose mappings are swept by [`OhosDevice::dispose`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, OnceCell};
use url::Url;

use crate::hdc::HdcCommandBuilder;
use crate::log_reader::LogReader;
use crate::port_forwarder::PortForwarder;
use crate::process::{ProcessRunner, RunOutput};
use crate::service_discovery::{rewrite_port, ServiceUriDiscovery};
use fohos_core::prelude::*;
use fohos_core::{BuildMode, TargetPlatform};

/// Device-side directory holding artifacts while the package manager installs them
pub const INSTALL_STAGING_DIR: &str = "/data/local/tmp/fohos_install";

/// `bm dump` output for a bundle that is not installed
const NOT_INSTALLED_MARKER: &str = "error: failed to get information";

const SCREENSHOT_DEVICE_PATH: &str = "/data/local/tmp/fohos_screenshot.jpeg";

/// Comma-separated ABI list
pub const ABI_LIST_PROPERTY: &str = "const.product.cpu.abilist";

pub const API_VERSION_PROPERTY: &str = "const.ohos.apiversion";

/// Default bound on waiting for the VM service announcement
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);

// ─────────────────────────────────────────────────────────────────────────────
// Packages and launch types
// ─────────────────────────────────────────────────────────────────────────────

/// An installable application package plus the shared modules it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OhosHap {
    pub bundle_name: String,
    pub entry_ability: String,
    pub hap: PathBuf,
    pub shared: Vec<PathBuf>,
}

impl OhosHap {
    /// Artifacts in push order: shared modules first, the hap last
    pub fn artifacts(&self) -> Vec<&Path> {
        self.shared
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(self.hap.as_path()))
            .collect()
    }
}

/// Builds an installable package when a launch has none
#[trait_variant::make(HapBuilder: Send)]
pub trait LocalHapBuilder: Sync {
    /// Build for `platform`; `None` means the build produced no package
    async fn build_hap(&self, platform: TargetPlatform, mode: BuildMode)
        -> Result<Option<OhosHap>>;
}

/// Options for [`OhosDevice::start_app`]
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub mode: BuildMode,
    /// Wait for the VM service and forward it to the host
    pub debugging: bool,
    /// Host side of the VM service forward; random when `None`
    pub host_vm_port: Option<u16>,
    /// Device side of the VM service forward; taken from the announced URI when `None`
    pub device_vm_port: Option<u16>,
    pub discovery_timeout: Duration,
    pub cancel: Option<watch::Receiver<bool>>,
}

impl Default for LaunchRequest {
    fn default() -> Self {
        Self {
            mode: BuildMode::Debug,
            debugging: false,
            host_vm_port: None,
            device_vm_port: None,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            cancel: None,
        }
    }
}

impl LaunchRequest {
    pub fn debug() -> Self {
        Self {
            debugging: true,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Outcome of [`OhosDevice::start_app`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchResult {
    Succeeded { service_uri: Option<Url> },
    Failed { reason: String },
}

impl LaunchResult {
    pub fn succeeded(service_uri: Option<Url>) -> Self {
        LaunchResult::Succeeded { service_uri }
    }

    pub fn failed_with(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        error!("{}", reason);
        LaunchResult::Failed { reason }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, LaunchResult::Succeeded { .. })
    }

    pub fn service_uri(&self) -> Option<&Url> {
        match self {
            LaunchResult::Succeeded { service_uri } => service_uri.as_ref(),
            LaunchResult::Failed { .. } => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Device handle
// ─────────────────────────────────────────────────────────────────────────────

pub struct OhosDevice<R> {
    id: String,
    hdc: HdcCommandBuilder,
    runner: Arc<R>,
    platform: OnceCell<TargetPlatform>,
    log_reader: OnceCell<LogReader>,
    past_log_reader: OnceCell<LogReader>,
    port_forwarder: PortForwarder<R>,
}

impl<R: ProcessRunner> OhosDevice<R> {
    pub fn new(id: impl Into<String>, hdc: HdcCommandBuilder, runner: Arc<R>) -> Self {
        let id = id.into();
        let port_forwarder = PortForwarder::new(id.clone(), hdc.clone(), Arc::clone(&runner));
        Self {
            id,
            hdc,
            runner,
            platform: OnceCell::new(),
            log_reader: OnceCell::new(),
            past_log_reader: OnceCell::new(),
            port_forwarder,
        }
    }

    /// Device token; also its display name
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_local_emulator(&self) -> bool {
        self.id.starts_with("127.0.0.1:")
    }

    async fn hdc(&self, args: &[&str]) -> Result<RunOutput> {
        let command = self.hdc.command(Some(&self.id), args);
        self.runner.run(&command).await
    }

    async fn shell(&self, args: &[&str]) -> Result<RunOutput> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.hdc(&full).await
    }

    // ─────────────────────────────────────────────────────────────
    // Properties
    // ─────────────────────────────────────────────────────────────

    /// A system parameter, `None` when unreadable or empty
    pub async fn property(&self, key: &str) -> Result<Option<String>> {
        let output = self.shell(&["param", "get", key]).await?;
        let value = output.stdout.trim();
        if !output.success() || value.is_empty() {
            debug!("Property {} unavailable on {}", key, self.id);
            return Ok(None);
        }
        Ok(Some(value.to_string()))
    }

    /// Architecture of the device, looked up once.
    ///
    /// Unreadable or unrecognised ABI lists resolve to [`TargetPlatform::OhosArm64`].
    pub async fn target_platform(&self) -> TargetPlatform {
        *self
            .platform
            .get_or_init(|| async {
                let abi_list = match self.property(ABI_LIST_PROPERTY).await {
                    Ok(value) => value.unwrap_or_default(),
                    Err(e) => {
                        warn!("Could not read {} on {}: {}", ABI_LIST_PROPERTY, self.id, e);
                        String::new()
                    }
                };
                let platform = TargetPlatform::from_abi_list(&abi_list);
                debug!("{} reports abilist {:?} -> {}", self.id, abi_list, platform);
                platform
            })
            .await
    }

    pub async fn api_version(&self) -> Result<Option<u32>> {
        Ok(self
            .property(API_VERSION_PROPERTY)
            .await?
            .and_then(|v| v.parse().ok()))
    }

    // ─────────────────────────────────────────────────────────────
    // Install lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Whether `bundle_name` is installed, from the package manager dump
    pub async fn is_app_installed(&self, bundle_name: &str) -> Result<bool> {
        let output = self.shell(&["bm", "dump", "-n", bundle_name]).await?;
        let text = output.combined();
        if text.contains(NOT_INSTALLED_MARKER) {
            return Ok(false);
        }
        if text.contains(bundle_name) {
            return Ok(true);
        }
        Err(Error::protocol(format!(
            "Unrecognised package manager output for {}: {}",
            bundle_name,
            text.trim()
        )))
    }

    /// Install `app`, replacing an existing copy if a plain install fails.
    ///
    /// With a prior install, a failed attempt uninstalls once and retries once.
    pub async fn install_app(&self, app: &OhosHap) -> Result<bool> {
        let was_installed = self.is_app_installed(&app.bundle_name).await?;

        if self.try_install(app).await? {
            return Ok(true);
        }
        if !was_installed {
            error!("Failed to install {} on {}", app.bundle_name, self.id);
            return Ok(false);
        }

        info!(
            "Install failed, removing previous version of {} from {}",
            app.bundle_name, self.id
        );
        if !self.uninstall_app(&app.bundle_name).await? {
            error!("Failed to uninstall {} from {}", app.bundle_name, self.id);
            return Ok(false);
        }
        if !self.try_install(app).await? {
            error!(
                "Failed to install {} on {} after uninstalling",
                app.bundle_name, self.id
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Stage, install and clean up; `false` on any transport-reported failure
    async fn try_install(&self, app: &OhosHap) -> Result<bool> {
        let mkdir = self.shell(&["mkdir", "-p", INSTALL_STAGING_DIR]).await?;
        if !mkdir.success() {
            warn!("Could not create {}: {}", INSTALL_STAGING_DIR, mkdir.combined().trim());
            return Ok(false);
        }

        let installed = self.stage_and_install(app).await;

        let cleanup = self.shell(&["rm", "-rf", INSTALL_STAGING_DIR]).await;
        if let Err(e) = cleanup {
            warn!("Could not clean {}: {}", INSTALL_STAGING_DIR, e);
        }

        installed
    }

    async fn stage_and_install(&self, app: &OhosHap) -> Result<bool> {
        for artifact in app.artifacts() {
            let Some(file_name) = artifact.file_name() else {
                return Err(Error::MissingArtifact {
                    path: artifact.to_path_buf(),
                });
            };
            let local = artifact.display().to_string();
            let remote = format!("{}/{}", INSTALL_STAGING_DIR, file_name.to_string_lossy());

            let output = self.hdc(&["file", "send", &local, &remote]).await?;
            if !output.success() || output.combined().contains("[Fail]") {
                warn!("Failed to push {}: {}", local, output.combined().trim());
                return Ok(false);
            }
        }

        let output = self.shell(&["bm", "install", "-p", INSTALL_STAGING_DIR]).await?;
        let text = output.combined();
        if !output.success() || text.contains("error:") {
            warn!("bm install failed on {}: {}", self.id, text.trim());
            return Ok(false);
        }
        info!("Installed {} on {}", app.bundle_name, self.id);
        Ok(true)
    }

    pub async fn uninstall_app(&self, bundle_name: &str) -> Result<bool> {
        let output = self.hdc(&["uninstall", bundle_name]).await?;
        let text = output.combined();
        if !output.success() || text.to_lowercase().contains("error") {
            warn!("Uninstall of {} failed: {}", bundle_name, text.trim());
            return Ok(false);
        }
        info!("Uninstalled {} from {}", bundle_name, self.id);
        Ok(true)
    }

    /// Force-stop `bundle_name`. Best effort: never fails.
    pub async fn stop_app(&self, bundle_name: &str) -> bool {
        match self.shell(&["aa", "force-stop", bundle_name]).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                debug!("force-stop {}: {}", bundle_name, output.combined().trim());
                false
            }
            Err(e) => {
                debug!("force-stop {}: {}", bundle_name, e);
                false
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Launch
    // ─────────────────────────────────────────────────────────────

    /// Build if needed, install and start the app.
    ///
    /// Every step gates the next. Failures the user can act on come back as
    /// [`LaunchResult::Failed`]; a build that yields no package is an error.
    pub async fn start_app<B: HapBuilder>(
        &self,
        package: Option<&OhosHap>,
        builder: &B,
        request: LaunchRequest,
    ) -> Result<LaunchResult> {
        let platform = self.target_platform().await;
        if !platform.supports_mode(request.mode) {
            return Ok(LaunchResult::failed_with(format!(
                "{} builds are not supported on {} ({})",
                request.mode, platform, self.id
            )));
        }

        let built;
        let app = match package {
            Some(app) => app,
            None => {
                built = builder
                    .build_hap(platform, request.mode)
                    .await?
                    .ok_or_else(|| Error::build("The build did not produce an installable package"))?;
                &built
            }
        };

        if !self.stop_app(&app.bundle_name).await {
            debug!("{} was not running on {}", app.bundle_name, self.id);
        }

        if !self.install_app(app).await? {
            return Ok(LaunchResult::failed_with(format!(
                "Failed to install {} on {}",
                app.bundle_name, self.id
            )));
        }

        let discovery = if request.debugging {
            match ServiceUriDiscovery::listen(self.log_reader().await?) {
                Ok(discovery) => Some(discovery),
                Err(e) => return Ok(LaunchResult::failed_with(e.to_string())),
            }
        } else {
            None
        };

        let output = self
            .shell(&["aa", "start", "-a", &app.entry_ability, "-b", &app.bundle_name])
            .await?;
        // aa start exits 0 even when the ability fails to start.
        let text = output.combined();
        if !output.success() || text.to_lowercase().contains("error") {
            return Ok(LaunchResult::failed_with(format!(
                "Failed to start {}: {}",
                app.bundle_name,
                text.trim()
            )));
        }
        info!("Started {}/{} on {}", app.bundle_name, app.entry_ability, self.id);

        let Some(discovery) = discovery else {
            return Ok(LaunchResult::succeeded(None));
        };

        let uri = match discovery
            .wait(request.discovery_timeout, request.cancel.clone())
            .await
        {
            Ok(uri) => uri,
            Err(e) if e.is_recoverable() => return Ok(LaunchResult::failed_with(e.to_string())),
            Err(e) => return Err(e),
        };

        let Some(device_port) = request.device_vm_port.or(uri.port()) else {
            return Ok(LaunchResult::failed_with(format!(
                "VM service URI {} has no port",
                uri
            )));
        };
        match self
            .port_forwarder
            .forward(device_port, request.host_vm_port)
            .await
        {
            Ok(host_port) => Ok(LaunchResult::succeeded(Some(rewrite_port(uri, host_port)))),
            Err(e) => Ok(LaunchResult::failed_with(format!(
                "Failed to forward VM service port {}: {}",
                device_port, e
            ))),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Device services
    // ─────────────────────────────────────────────────────────────

    /// Capture the screen into `output` on the host
    pub async fn screenshot(&self, output: &Path) -> Result<()> {
        let capture = self
            .shell(&["snapshot_display", "-f", SCREENSHOT_DEVICE_PATH])
            .await?;
        if !capture.success() || capture.combined().to_lowercase().contains("error") {
            return Err(Error::transport(
                "snapshot_display",
                capture.combined().trim(),
            ));
        }

        let local = output.display().to_string();
        let recv = self
            .hdc(&["file", "recv", SCREENSHOT_DEVICE_PATH, &local])
            .await?;

        if let Err(e) = self.shell(&["rm", "-f", SCREENSHOT_DEVICE_PATH]).await {
            debug!("Could not remove {}: {}", SCREENSHOT_DEVICE_PATH, e);
        }

        if !recv.success() || recv.combined().contains("[Fail]") {
            return Err(Error::transport("file recv", recv.combined().trim()));
        }
        info!("Saved screenshot to {}", output.display());
        Ok(())
    }

    /// Live log reader, created on first use
    pub async fn log_reader(&self) -> Result<&LogReader> {
        self.log_reader
            .get_or_try_init(|| LogReader::live(&*self.runner, &self.hdc, &self.id))
            .await
    }

    /// Reader over already-buffered logs for `tag`, created on first use.
    ///
    /// The tag of the first call sticks for the lifetime of the handle.
    pub async fn past_log_reader(&self, tag: &str) -> Result<&LogReader> {
        self.past_log_reader
            .get_or_try_init(|| async { LogReader::past(&*self.runner, &self.hdc, &self.id, tag) })
            .await
    }

    pub fn port_forwarder(&self) -> &PortForwarder<R> {
        &self.port_forwarder
    }

    /// Close log readers and remove every port forward
    pub async fn dispose(&self) {
        for reader in [self.log_reader.get(), self.past_log_reader.get()]
            .into_iter()
            .flatten()
        {
            reader.dispose();
        }
        self.port_forwarder.dispose().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_reader::FLUTTER_LOG_TAG;
    use crate::test_utils::{hilog_line, FakeProcessRunner};

    const BUNDLE: &str = "com.example.demo";

    fn device(runner: &Arc<FakeProcessRunner>) -> OhosDevice<FakeProcessRunner> {
        OhosDevice::new(
            "dev1",
            HdcCommandBuilder::with_server("hdc", None),
            Arc::clone(runner),
        )
    }

    fn hap() -> OhosHap {
        OhosHap {
            bundle_name: BUNDLE.into(),
            entry_ability: "EntryAbility".into(),
            hap: PathBuf::from("/build/entry-default-signed.hap"),
            shared: vec![PathBuf::from("/build/lib-default.hsp")],
        }
    }

    fn installed() -> RunOutput {
        RunOutput::ok(format!("{}:\n{{\"bundleName\": \"{}\"}}", BUNDLE, BUNDLE))
    }

    fn not_installed() -> RunOutput {
        RunOutput::ok("error: failed to get information and the parameters may be wrong.")
    }

    struct NoBuild;

    impl HapBuilder for NoBuild {
        async fn build_hap(&self, _: TargetPlatform, _: BuildMode) -> Result<Option<OhosHap>> {
            Ok(None)
        }
    }

    struct PrebuiltBuilder(OhosHap);

    impl HapBuilder for PrebuiltBuilder {
        async fn build_hap(&self, _: TargetPlatform, _: BuildMode) -> Result<Option<OhosHap>> {
            Ok(Some(self.0.clone()))
        }
    }

    #[test]
    fn test_artifacts_shared_first() {
        let app = hap();
        assert_eq!(
            app.artifacts(),
            vec![Path::new("/build/lib-default.hsp"), Path::new("/build/entry-default-signed.hap")]
        );
    }

    #[tokio::test]
    async fn test_target_platform_cached_and_defaulted() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("param get", RunOutput::ok("x86_64\n"));
        let dev = device(&runner);
        assert_eq!(dev.target_platform().await, TargetPlatform::OhosX64);
        assert_eq!(dev.target_platform().await, TargetPlatform::OhosX64);
        assert_eq!(runner.count("param get"), 1);

        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("param get", RunOutput::failed(1, "not found"));
        assert_eq!(device(&runner).target_platform().await, TargetPlatform::OhosArm64);
    }

    #[tokio::test]
    async fn test_is_app_installed() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond_sequence(
            "bm dump",
            vec![installed(), not_installed(), RunOutput::ok("something else")],
        );
        let dev = device(&runner);
        assert!(dev.is_app_installed(BUNDLE).await.unwrap());
        assert!(!dev.is_app_installed(BUNDLE).await.unwrap());
        let err = dev.is_app_installed(BUNDLE).await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_install_pushes_shared_before_hap() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("bm dump", not_installed());
        runner.respond("bm install", RunOutput::ok("install bundle successfully."));
        let dev = device(&runner);

        assert!(dev.install_app(&hap()).await.unwrap());
        assert_eq!(
            runner.calls(),
            vec![
                format!("-t dev1 shell bm dump -n {}", BUNDLE),
                format!("-t dev1 shell mkdir -p {}", INSTALL_STAGING_DIR),
                format!(
                    "-t dev1 file send /build/lib-default.hsp {}/lib-default.hsp",
                    INSTALL_STAGING_DIR
                ),
                format!(
                    "-t dev1 file send /build/entry-default-signed.hap {}/entry-default-signed.hap",
                    INSTALL_STAGING_DIR
                ),
                format!("-t dev1 shell bm install -p {}", INSTALL_STAGING_DIR),
                format!("-t dev1 shell rm -rf {}", INSTALL_STAGING_DIR),
            ]
        );
    }

    #[tokio::test]
    async fn test_install_failure_without_prior_install_does_not_retry() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("bm dump", not_installed());
        runner.respond("bm install", RunOutput::ok("error: install failed due to grant request permissions failed"));
        let dev = device(&runner);

        assert!(!dev.install_app(&hap()).await.unwrap());
        assert_eq!(runner.count("bm install"), 1);
        assert_eq!(runner.count("uninstall"), 0);
    }

    #[tokio::test]
    async fn test_install_retries_once_after_uninstall() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("bm dump", installed());
        runner.respond_sequence(
            "bm install",
            vec![
                RunOutput::ok("error: install version downgrade"),
                RunOutput::ok("install bundle successfully."),
            ],
        );
        runner.respond("uninstall", RunOutput::ok("[Info]App uninstall path: msg:uninstall bundle successfully."));
        let dev = device(&runner);

        assert!(dev.install_app(&hap()).await.unwrap());
        assert_eq!(runner.count("uninstall"), 1);
        assert_eq!(runner.count("bm install"), 2);
    }

    #[tokio::test]
    async fn test_failed_retry_is_final() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("bm dump", installed());
        runner.respond("bm install", RunOutput::ok("error: install failed"));
        runner.respond("uninstall", RunOutput::ok("uninstall bundle successfully."));
        let dev = device(&runner);

        assert!(!dev.install_app(&hap()).await.unwrap());
        assert_eq!(runner.count("uninstall"), 1);
        assert_eq!(runner.count("bm install"), 2);
    }

    #[tokio::test]
    async fn test_start_app_without_debugging() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("param get", RunOutput::ok("arm64-v8a"));
        runner.respond("bm dump", not_installed());
        runner.respond("aa start", RunOutput::ok("start ability successfully."));
        let dev = device(&runner);

        let result = dev
            .start_app(Some(&hap()), &NoBuild, LaunchRequest::default())
            .await
            .unwrap();
        assert_eq!(result, LaunchResult::succeeded(None));

        let calls = runner.calls();
        let stop = calls.iter().position(|c| c.contains("aa force-stop")).unwrap();
        let install = calls.iter().position(|c| c.contains("bm install")).unwrap();
        let start = calls.iter().position(|c| c.contains("aa start")).unwrap();
        assert!(stop < install && install < start);
        assert!(calls[start].ends_with(&format!("aa start -a EntryAbility -b {}", BUNDLE)));
    }

    #[tokio::test]
    async fn test_start_app_error_text_is_failure() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("bm dump", not_installed());
        runner.respond(
            "aa start",
            RunOutput::ok("Error: ability not found.\nerror: failed to start ability."),
        );
        let dev = device(&runner);

        let result = dev
            .start_app(Some(&hap()), &NoBuild, LaunchRequest::default())
            .await
            .unwrap();
        assert!(!result.is_started());
    }

    #[tokio::test]
    async fn test_start_app_install_failure_skips_start() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("bm dump", not_installed());
        runner.respond("bm install", RunOutput::failed(1, "error: signature verification failed"));
        let dev = device(&runner);

        let result = dev
            .start_app(Some(&hap()), &NoBuild, LaunchRequest::default())
            .await
            .unwrap();
        assert!(!result.is_started());
        assert_eq!(runner.count("aa start"), 0);
    }

    #[tokio::test]
    async fn test_start_app_builds_when_no_package() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("bm dump", not_installed());
        let dev = device(&runner);

        let result = dev
            .start_app(None, &PrebuiltBuilder(hap()), LaunchRequest::default())
            .await
            .unwrap();
        assert!(result.is_started());

        let err = dev
            .start_app(None, &NoBuild, LaunchRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Build { .. }));
    }

    #[tokio::test]
    async fn test_release_on_x64_is_failure() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("param get", RunOutput::ok("x86_64"));
        let dev = device(&runner);

        let result = dev
            .start_app(
                Some(&hap()),
                &NoBuild,
                LaunchRequest::default().with_mode(BuildMode::Release),
            )
            .await
            .unwrap();
        assert!(!result.is_started());
        assert_eq!(runner.count("bm"), 0);
    }

    #[tokio::test]
    async fn test_start_app_debugging_forwards_service_port() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("bm dump", not_installed());
        runner.respond("fport tcp", RunOutput::ok("Forwardport result:OK"));
        runner.stream_open(
            "shell hilog",
            vec![hilog_line(
                'I',
                "Flutter",
                "flutter: The Dart VM service is listening on http://127.0.0.1:41234/tok=/",
            )],
        );
        let dev = device(&runner);

        let mut request = LaunchRequest::debug();
        request.host_vm_port = Some(50600);
        request.discovery_timeout = Duration::from_secs(5);

        let result = dev.start_app(Some(&hap()), &NoBuild, request).await.unwrap();
        assert_eq!(
            result.service_uri().map(Url::as_str),
            Some("http://127.0.0.1:50600/tok=/")
        );
        assert_eq!(runner.count("fport tcp:50600 tcp:41234"), 1);
        assert_eq!(runner.count("hilog -r"), 1);

        dev.dispose().await;
    }

    #[tokio::test]
    async fn test_start_app_log_end_is_failure() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("bm dump", not_installed());
        runner.stream("shell hilog", vec![hilog_line('I', "Flutter", "flutter: no uri")]);
        let dev = device(&runner);

        let mut request = LaunchRequest::debug();
        request.discovery_timeout = Duration::from_secs(5);

        let result = dev.start_app(Some(&hap()), &NoBuild, request).await.unwrap();
        match result {
            LaunchResult::Failed { reason } => assert!(reason.contains("stopped")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_log_readers_are_memoized() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.stream_open("hilog", vec![]);
        let dev = device(&runner);

        dev.log_reader().await.unwrap();
        dev.log_reader().await.unwrap();
        dev.past_log_reader(FLUTTER_LOG_TAG).await.unwrap();
        dev.past_log_reader(FLUTTER_LOG_TAG).await.unwrap();
        assert_eq!(
            runner.spawn_calls(),
            vec!["-t dev1 shell hilog", "-t dev1 shell hilog -x -T Flutter"]
        );
        dev.dispose().await;
        assert!(dev.log_reader().await.unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_screenshot_commands() {
        let runner = Arc::new(FakeProcessRunner::new());
        let dev = device(&runner);
        dev.screenshot(Path::new("/tmp/shot.jpeg")).await.unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                format!("-t dev1 shell snapshot_display -f {}", SCREENSHOT_DEVICE_PATH),
                format!("-t dev1 file recv {} /tmp/shot.jpeg", SCREENSHOT_DEVICE_PATH),
                format!("-t dev1 shell rm -f {}", SCREENSHOT_DEVICE_PATH),
            ]
        );
    }

    #[test]
    fn test_local_emulator() {
        let runner = Arc::new(FakeProcessRunner::new());
        let dev = OhosDevice::new(
            "127.0.0.1:5555",
            HdcCommandBuilder::with_server("hdc", None),
            runner,
        );
        assert!(dev.is_local_emulator());
    }
}
