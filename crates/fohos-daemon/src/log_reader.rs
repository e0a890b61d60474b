//! Device log streaming
//!
//! Wraps one `hdc shell hilog` process as a broadcast stream of application
//! log lines. Raw output (stdout and stderr merged) goes through a
//! [`HilogClassifier`] owned by the reader, so classification state lives
//! exactly as long as the reader does.
//!
//! The process output is drained lazily: nothing is read until the first
//! listener subscribes, and draining pauses when the last listener goes away.
//! The stream closes when the process output ends while someone listens, when
//! the process exits while nobody listens, or on [`LogReader::dispose`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc, watch, Notify};

use crate::hdc::HdcCommandBuilder;
use crate::process::{ProcessKiller, ProcessRunner, SpawnedProcess};
use fohos_core::hilog::{HilogClassifier, LineVerdict};
use fohos_core::prelude::*;

/// Buffered lines per listener before it starts lagging
const BROADCAST_CAPACITY: usize = 1024;

/// Default tag for past-log readers
pub const FLUTTER_LOG_TAG: &str = "Flutter";

type SharedSender = Arc<Mutex<Option<broadcast::Sender<String>>>>;

/// A classified, broadcast hilog stream
pub struct LogReader {
    name: String,
    sender: SharedSender,
    wake: Arc<Notify>,
    killer: Mutex<Option<ProcessKiller>>,
    disposed: AtomicBool,
}

impl LogReader {
    /// Reader over new log output only; clears the device log buffer first
    pub async fn live<R: ProcessRunner>(
        runner: &R,
        hdc: &HdcCommandBuilder,
        device_id: &str,
    ) -> Result<Self> {
        let clear = hdc.command(Some(device_id), &["shell", "hilog", "-r"]);
        let output = runner.run(&clear).await?;
        if !output.success() {
            warn!(
                "Failed to clear hilog buffer on {}: {}",
                device_id,
                output.combined().trim()
            );
        }

        let command = hdc.command(Some(device_id), &["shell", "hilog"]);
        let process = runner.spawn(&command)?;
        Ok(Self::start(device_id.to_string(), process))
    }

    /// Reader over the already-buffered log, filtered to `tag`
    pub fn past<R: ProcessRunner>(
        runner: &R,
        hdc: &HdcCommandBuilder,
        device_id: &str,
        tag: &str,
    ) -> Result<Self> {
        let command = hdc.command(Some(device_id), &["shell", "hilog", "-x", "-T", tag]);
        let process = runner.spawn(&command)?;
        Ok(Self::start(format!("{} (past)", device_id), process))
    }

    /// Wrap an already-spawned log process
    pub fn start(name: String, process: SpawnedProcess) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let sender: SharedSender = Arc::new(Mutex::new(Some(tx)));
        let wake = Arc::new(Notify::new());

        tokio::spawn(pump(
            name.clone(),
            process.lines,
            process.killer.exit_signal(),
            Arc::clone(&sender),
            Arc::clone(&wake),
        ));

        Self {
            name,
            sender,
            wake,
            killer: Mutex::new(Some(process.killer)),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe to classified lines. `None` once the stream has closed.
    pub fn subscribe(&self) -> Option<LogLines> {
        let rx = {
            let guard = self.sender.lock().ok()?;
            guard.as_ref()?.subscribe()
        };
        self.wake.notify_one();
        Some(LogLines {
            rx,
            wake: Arc::clone(&self.wake),
        })
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.sender
            .lock()
            .ok()
            .and_then(|s| s.as_ref().map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().map(|s| s.is_none()).unwrap_or(true)
    }

    /// Close the stream and kill the log process. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Disposing log reader {}", self.name);

        if let Ok(mut killer) = self.killer.lock() {
            if let Some(mut killer) = killer.take() {
                killer.kill();
            }
        }
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        self.wake.notify_one();
    }
}

impl Drop for LogReader {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// One listener's view of a [`LogReader`]. Dropping it unsubscribes.
pub struct LogLines {
    rx: broadcast::Receiver<String>,
    wake: Arc<Notify>,
}

impl Drop for LogLines {
    fn drop(&mut self) {
        // Let the pump re-check whether anyone is still listening.
        self.wake.notify_one();
    }
}

impl LogLines {
    /// Next line, or `None` when the reader has closed
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(line) => return Some(line),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Log listener lagged, skipped {} lines", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

fn has_listeners(sender: &SharedSender) -> Option<bool> {
    let guard = sender.lock().ok()?;
    guard.as_ref().map(|tx| tx.receiver_count() > 0)
}

fn current_sender(sender: &SharedSender) -> Option<broadcast::Sender<String>> {
    sender.lock().ok()?.clone()
}

/// Drain the process while anyone listens; close the stream when it ends.
///
/// An emitted line that finds no listener is held back for the next one.
async fn pump(
    name: String,
    mut lines: mpsc::Receiver<String>,
    mut exited: watch::Receiver<bool>,
    sender: SharedSender,
    wake: Arc<Notify>,
) {
    let mut classifier = HilogClassifier::new();
    let mut held: Option<String> = None;

    loop {
        match has_listeners(&sender) {
            None => break,
            Some(false) => {
                if *exited.borrow_and_update() {
                    debug!("Log process for {} exited with no listeners", name);
                    break;
                }
                trace!("Log reader {} idle", name);
                tokio::select! {
                    _ = wake.notified() => {}
                    changed = exited.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            }
            Some(true) => {}
        }

        if let Some(text) = held.take() {
            let Some(tx) = current_sender(&sender) else {
                break;
            };
            if let Err(broadcast::error::SendError(text)) = tx.send(text) {
                held = Some(text);
            }
            continue;
        }

        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => {
                    if let LineVerdict::Emit(text) = classifier.classify(&line) {
                        held = Some(text);
                    }
                }
                None => {
                    debug!("Log process for {} ended", name);
                    break;
                }
            },
            _ = wake.notified() => {}
        }
    }

    if let Ok(mut guard) = sender.lock() {
        guard.take();
    }
}
