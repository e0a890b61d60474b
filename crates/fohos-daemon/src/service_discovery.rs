//! Dart VM service URI discovery from device logs

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::sync::watch;
use url::Url;

use crate::log_reader::{LogLines, LogReader};
use fohos_core::prelude::*;

const WAITING_FOR: &str = "Dart VM service URI";

static SERVICE_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Dart VM service|Observatory) .*listening on (http://\S+)")
        .expect("Invalid service URI regex")
});

/// Extract a service URI from one log line
pub fn parse_service_uri(line: &str) -> Option<Url> {
    let caps = SERVICE_URI.captures(line)?;
    let raw = caps.get(2)?.as_str();
    Url::parse(raw)
        .inspect_err(|e| debug!("Ignoring unparseable service URI {}: {}", raw, e))
        .ok()
}

/// Rewrite the URI's port to the forwarded host port
pub fn rewrite_port(mut uri: Url, host_port: u16) -> Url {
    if uri.set_port(Some(host_port)).is_err() {
        warn!("Could not rewrite port of {}", uri);
    }
    uri
}

/// Watches a log subscription for the service announcement.
///
/// Subscribes when created so announcements logged while the app is being
/// started are not missed.
pub struct ServiceUriDiscovery {
    lines: LogLines,
}

impl ServiceUriDiscovery {
    /// Start listening on `reader`
    pub fn listen(reader: &LogReader) -> Result<Self> {
        let lines = reader.subscribe().ok_or_else(|| Error::StreamClosed {
            waiting_for: WAITING_FOR.to_string(),
        })?;
        Ok(Self { lines })
    }

    /// Wait for the URI, bounded by `timeout` and optionally cancellable.
    ///
    /// The subscription is dropped on every exit path.
    pub async fn wait(
        mut self,
        timeout: Duration,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<Url> {
        let scan = async {
            while let Some(line) = self.lines.next_line().await {
                if let Some(uri) = parse_service_uri(&line) {
                    info!("Found {}: {}", WAITING_FOR, uri);
                    return Ok(uri);
                }
            }
            Err(Error::StreamClosed {
                waiting_for: WAITING_FOR.to_string(),
            })
        };

        let bounded = async {
            tokio::time::timeout(timeout, scan)
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Timeout {
                        waiting_for: WAITING_FOR.to_string(),
                        seconds: timeout.as_secs(),
                    })
                })
        };

        match cancel {
            Some(mut cancel) => {
                tokio::select! {
                    result = bounded => result,
                    _ = wait_cancelled(&mut cancel) => Err(Error::Cancelled {
                        waiting_for: WAITING_FOR.to_string(),
                    }),
                }
            }
            None => bounded.await,
        }
    }
}

async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone without cancelling; never resolve.
            std::future::pending::<()>().await;
        }
    }
}
