//! Host-to-device TCP port forwarding through `hdc fport`

use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Mutex};

use rand::Rng;
use regex::Regex;

use crate::hdc::HdcCommandBuilder;
use crate::process::ProcessRunner;
use fohos_core::prelude::*;

/// Host ports are chosen from `[50000, 65535)` when the caller does not pick one
pub const RANDOM_PORT_RANGE: std::ops::Range<u16> = 50000..65535;

/// `tcp:<host> tcp:<device>` segment of an `fport ls` line
static FPORT_MAPPING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tcp:(\d+)\s+tcp:(\d+)").expect("Invalid fport regex"));

/// One host-to-device mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForwardedPort {
    pub host_port: u16,
    pub device_port: u16,
}

impl ForwardedPort {
    fn host_arg(&self) -> String {
        format!("tcp:{}", self.host_port)
    }

    fn device_arg(&self) -> String {
        format!("tcp:{}", self.device_port)
    }
}

/// Port forwarder owned by one device handle
pub struct PortForwarder<R> {
    device_id: String,
    hdc: HdcCommandBuilder,
    runner: Arc<R>,
    /// Host ports handed out by this forwarder and not yet removed
    active: Mutex<HashSet<u16>>,
}

impl<R: ProcessRunner> PortForwarder<R> {
    pub fn new(device_id: impl Into<String>, hdc: HdcCommandBuilder, runner: Arc<R>) -> Self {
        Self {
            device_id: device_id.into(),
            hdc,
            runner,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Forward `device_port` to a host port and return the host port used.
    ///
    /// `host_port` of `None` or `0` picks a random port; the device rejects 0.
    pub async fn forward(&self, device_port: u16, host_port: Option<u16>) -> Result<u16> {
        let requested = host_port.filter(|p| *p != 0);
        let mapping = ForwardedPort {
            host_port: requested.unwrap_or_else(|| self.pick_host_port()),
            device_port,
        };

        let command = self.hdc.command(
            Some(&self.device_id),
            &["fport", &mapping.host_arg(), &mapping.device_arg()],
        );
        let output = self.runner.run(&command).await?;

        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            return Err(Error::transport(command.command_line(), stderr));
        }
        if !output.success() {
            return Err(Error::transport(
                command.command_line(),
                format!("exited with code {:?}", output.exit_code),
            ));
        }
        // Only checked for explicit ports; random-port forwards print nothing reliable.
        if requested.is_some() && !output.stdout.contains("OK") {
            return Err(Error::transport(
                command.command_line(),
                format!("unexpected output: {}", output.stdout.trim()),
            ));
        }

        if let Ok(mut active) = self.active.lock() {
            active.insert(mapping.host_port);
        }
        info!(
            "Forwarded host port {} to {}:{}",
            mapping.host_port, self.device_id, device_port
        );
        Ok(mapping.host_port)
    }

    /// Remove one mapping. Failures are logged, never raised.
    pub async fn unforward(&self, mapping: ForwardedPort) {
        let command = self.hdc.command(
            Some(&self.device_id),
            &["fport", "rm", &mapping.host_arg(), &mapping.device_arg()],
        );

        match self.runner.run(&command).await {
            Ok(output) if output.success() && output.stderr.trim().is_empty() => {
                debug!("Removed forward {:?} on {}", mapping, self.device_id);
            }
            Ok(output) => warn!(
                "Failed to remove forward {:?} on {}: {}",
                mapping,
                self.device_id,
                output.combined().trim()
            ),
            Err(e) => warn!(
                "Failed to remove forward {:?} on {}: {}",
                mapping, self.device_id, e
            ),
        }

        if let Ok(mut active) = self.active.lock() {
            active.remove(&mapping.host_port);
        }
    }

    /// Mappings the transport currently reports for this device
    pub async fn forwarded_ports(&self) -> Result<Vec<ForwardedPort>> {
        let command = self.hdc.command(Some(&self.device_id), &["fport", "ls"]);
        let output = self.runner.run(&command).await?;
        if !output.success() {
            return Err(Error::transport(
                command.command_line(),
                output.combined().trim(),
            ));
        }
        Ok(parse_fport_list(&output.stdout, &self.device_id))
    }

    /// Remove every mapping the transport reports for this device
    pub async fn dispose(&self) {
        let ports = match self.forwarded_ports().await {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Could not list forwards for {}: {}", self.device_id, e);
                return;
            }
        };
        for mapping in ports {
            self.unforward(mapping).await;
        }
    }

    /// Random host port not already handed out by this forwarder
    fn pick_host_port(&self) -> u16 {
        let mut rng = rand::thread_rng();
        let Ok(active) = self.active.lock() else {
            return rng.gen_range(RANDOM_PORT_RANGE);
        };
        loop {
            let port = rng.gen_range(RANDOM_PORT_RANGE);
            if !active.contains(&port) {
                return port;
            }
        }
    }
}

/// Parse `fport ls` output, keeping lines that belong to `device_id`
pub fn parse_fport_list(output: &str, device_id: &str) -> Vec<ForwardedPort> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(device_id))
        .filter_map(|line| {
            let caps = FPORT_MAPPING.captures(line)?;
            Some(ForwardedPort {
                host_port: caps.get(1)?.as_str().parse().ok()?,
                device_port: caps.get(2)?.as_str().parse().ok()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RunOutput;
    use crate::test_utils::FakeProcessRunner;

    fn forwarder(runner: &Arc<FakeProcessRunner>) -> PortForwarder<FakeProcessRunner> {
        PortForwarder::new(
            "dev1",
            HdcCommandBuilder::with_server("hdc", None),
            Arc::clone(runner),
        )
    }

    #[tokio::test]
    async fn test_random_ports_are_distinct_and_in_range() {
        let runner = Arc::new(FakeProcessRunner::new());
        let fwd = forwarder(&runner);

        let a = fwd.forward(8080, Some(0)).await.unwrap();
        let b = fwd.forward(8080, None).await.unwrap();

        assert_ne!(a, b);
        for port in [a, b] {
            assert!(RANDOM_PORT_RANGE.contains(&port));
        }
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], format!("-t dev1 fport tcp:{} tcp:8080", a));
        assert_eq!(calls[1], format!("-t dev1 fport tcp:{} tcp:8080", b));
    }

    #[tokio::test]
    async fn test_explicit_port_requires_ok_marker() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("tcp:50100", RunOutput::ok("Forwardport result:OK\n"));
        let fwd = forwarder(&runner);
        assert_eq!(fwd.forward(9000, Some(50100)).await.unwrap(), 50100);

        runner.respond("tcp:50200", RunOutput::ok("[Fail]port busy\n"));
        let err = fwd.forward(9000, Some(50200)).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_stderr_or_exit_code_is_failure() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond(
            "fport tcp",
            RunOutput {
                exit_code: Some(0),
                stdout: "OK".into(),
                stderr: "denied".into(),
            },
        );
        let fwd = forwarder(&runner);
        assert!(fwd.forward(9000, Some(50300)).await.is_err());

        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("fport tcp", RunOutput::failed(1, ""));
        let fwd = forwarder(&runner);
        assert!(fwd.forward(9000, None).await.is_err());
    }

    #[test]
    fn test_parse_fport_list_filters_device_and_skips_malformed() {
        let output = "\
dev1    tcp:50001 tcp:8080    [Forward]
dev2    tcp:50002 tcp:8080    [Forward]
dev1    garbage
dev1    tcp:50003 tcp:9090    [Forward]
";
        let ports = parse_fport_list(output, "dev1");
        assert_eq!(
            ports,
            vec![
                ForwardedPort {
                    host_port: 50001,
                    device_port: 8080
                },
                ForwardedPort {
                    host_port: 50003,
                    device_port: 9090
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_unforward_failure_is_not_raised() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond("fport rm", RunOutput::failed(1, "no such forward"));
        let fwd = forwarder(&runner);
        fwd.unforward(ForwardedPort {
            host_port: 50001,
            device_port: 8080,
        })
        .await;
        assert_eq!(runner.calls(), vec!["-t dev1 fport rm tcp:50001 tcp:8080"]);
    }

    #[tokio::test]
    async fn test_dispose_removes_every_listed_mapping() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.respond(
            "fport ls",
            RunOutput::ok(
                "dev1    tcp:50001 tcp:8080    [Forward]\n\
                 dev1    tcp:50002 tcp:9090    [Forward]\n\
                 other   tcp:50003 tcp:8080    [Forward]\n",
            ),
        );
        let fwd = forwarder(&runner);
        fwd.dispose().await;

        assert_eq!(
            runner.calls(),
            vec![
                "-t dev1 fport ls",
                "-t dev1 fport rm tcp:50001 tcp:8080",
                "-t dev1 fport rm tcp:50002 tcp:9090",
            ]
        );
    }
}
