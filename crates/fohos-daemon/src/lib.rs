//! # fohos-daemon - Device Transport
//!
//! Everything that talks to an OpenHarmony device through the `hdc`
//! transport binary, plus the SDK discovery that finds that binary.
//!
//! Depends on [`fohos_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Processes
//! - [`ProcessRunner`] - Capability for running external tools (scripted in tests)
//! - [`TokioProcessRunner`] - The real implementation over `tokio::process`
//!
//! ### Transport
//! - [`HdcCommandBuilder`] - Builds `hdc` argument vectors (`-t <device>` or `-s host:port`)
//! - [`OhosDeviceRegistry`] - Lists attached devices via `hdc list targets`
//! - [`OhosDevice`] - Install, launch, properties, screenshots, logs and forwards for one device
//! - [`PortForwarder`] - `hdc fport` mappings owned by one device
//!
//! ### Logs
//! - [`LogReader`] - A `hilog` process exposed as a classified broadcast stream
//! - [`ServiceUriDiscovery`] - Waits for the Dart VM service announcement
//!
//! ### SDK
//! - [`OhosSdk`], [`SdkDiscovery`] - Locate the SDK, its API levels and `hdc`

pub mod device;
pub mod devices;
pub mod hdc;
pub mod log_reader;
pub mod port_forwarder;
pub mod process;
pub mod sdk;
pub mod service_discovery;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use device::{
    HapBuilder, LaunchRequest, LaunchResult, LocalHapBuilder, OhosDevice, OhosHap,
    INSTALL_STAGING_DIR,
};
pub use devices::{find_device, parse_list_targets, DeviceDiscoveryResult, OhosDeviceRegistry};
pub use hdc::{build_hdc_argv, HdcCommandBuilder};
pub use log_reader::{LogLines, LogReader, FLUTTER_LOG_TAG};
pub use port_forwarder::{ForwardedPort, PortForwarder};
pub use process::{
    is_executable, LocalProcessRunner, ProcessCommand, ProcessRunner, RunOutput,
    SpawnedProcess, TokioProcessRunner,
};
pub use sdk::{
    OhosSdk, SdkDiscovery, DEVECO_HOME_ENV, HOS_SDK_HOME_ENV, NODE_HOME_ENV, OHOS_SDK_HOME_ENV,
};
pub use service_discovery::{parse_service_uri, ServiceUriDiscovery};
