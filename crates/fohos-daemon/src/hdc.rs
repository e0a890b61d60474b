//! Argument vectors for the `hdc` device transport
//!
//! `hdc` either targets one device directly (`-t <id>`) or, when a remote
//! transport server is configured through `HDC_SERVER_HOST`/`HDC_SERVER_PORT`,
//! routes everything through that server (`-s host:port`).

use std::path::{Path, PathBuf};

use crate::process::ProcessCommand;

/// Host of a remote hdc server
pub const HDC_SERVER_HOST_ENV: &str = "HDC_SERVER_HOST";

/// Port of a remote hdc server
pub const HDC_SERVER_PORT_ENV: &str = "HDC_SERVER_PORT";

/// Builds hdc invocations for one transport binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdcCommandBuilder {
    hdc_path: PathBuf,
    /// `host:port` of a remote hdc server
    server: Option<String>,
}

impl HdcCommandBuilder {
    /// Builder for `hdc_path`, reading the remote server from the environment
    pub fn new(hdc_path: impl Into<PathBuf>) -> Self {
        Self::with_server(hdc_path, remote_server_from_env())
    }

    /// Builder with an explicit remote server (`None` means direct targeting)
    pub fn with_server(hdc_path: impl Into<PathBuf>, server: Option<String>) -> Self {
        Self {
            hdc_path: hdc_path.into(),
            server,
        }
    }

    pub fn hdc_path(&self) -> &Path {
        &self.hdc_path
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Full argument vector, program first
    pub fn argv(&self, device_id: Option<&str>, args: &[&str]) -> Vec<String> {
        build_hdc_argv(&self.hdc_path, self.server.as_deref(), device_id, args)
    }

    /// The same invocation as a [`ProcessCommand`]
    pub fn command(&self, device_id: Option<&str>, args: &[&str]) -> ProcessCommand {
        ProcessCommand::from_argv(self.argv(device_id, args))
    }
}

/// `host:port` when both remote-server variables are set and non-empty
pub fn remote_server_from_env() -> Option<String> {
    let host = std::env::var(HDC_SERVER_HOST_ENV).ok()?;
    let port = std::env::var(HDC_SERVER_PORT_ENV).ok()?;
    remote_server(&host, &port)
}

fn remote_server(host: &str, port: &str) -> Option<String> {
    let (host, port) = (host.trim(), port.trim());
    if host.is_empty() || port.is_empty() {
        return None;
    }
    Some(format!("{}:{}", host, port))
}

/// Build an hdc argument vector.
///
/// A remote server replaces per-device targeting. Without one, `device_id`
/// becomes `-t <id>`; an empty id is passed through and means the default
/// device. `None` omits targeting entirely (used for `list targets`).
pub fn build_hdc_argv(
    hdc_path: &Path,
    server: Option<&str>,
    device_id: Option<&str>,
    args: &[&str],
) -> Vec<String> {
    let mut argv = vec![hdc_path.display().to_string()];

    match (server, device_id) {
        (Some(server), _) => {
            argv.push("-s".to_string());
            argv.push(server.to_string());
        }
        (None, Some(id)) => {
            argv.push("-t".to_string());
            argv.push(id.to_string());
        }
        (None, None) => {}
    }

    argv.extend(args.iter().map(|a| a.to_string()));
    argv
}
